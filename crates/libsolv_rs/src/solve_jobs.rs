use crate::id::{MatchSpecId, SolvableId, StringId};

/// The things a solve should accomplish.
#[derive(Debug, Default, Clone)]
pub struct SolveJobs {
    pub(crate) install: Vec<MatchSpecId>,
    pub(crate) constrain: Vec<MatchSpecId>,
    pub(crate) lock: Vec<SolvableId>,
    pub(crate) exclude: Vec<(SolvableId, StringId)>,
}

impl SolveJobs {
    /// Requests a package that matches the spec to be installed.
    pub fn install(&mut self, spec: MatchSpecId) {
        self.install.push(spec);
    }

    /// If a package with the name of the spec is installed, it must match the spec.
    pub fn constrain(&mut self, spec: MatchSpecId) {
        self.constrain.push(spec);
    }

    /// If a package with the name of the solvable is installed, it must be this solvable.
    pub fn lock(&mut self, solvable: SolvableId) {
        self.lock.push(solvable);
    }

    /// Prevents a solvable from being installed. The reason is used when explaining conflicts.
    pub fn exclude(&mut self, solvable: SolvableId, reason: StringId) {
        self.exclude.push((solvable, reason));
    }
}
