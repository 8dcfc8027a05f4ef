use crate::RepoDataRecord;
use serde::{Deserialize, Serialize};

/// The outcome of a successful solve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverResult {
    /// The records that make up the environment, ordered so that dependencies come before the
    /// packages that depend on them. Virtual packages are never part of a solution.
    pub records: Vec<RepoDataRecord>,
}

impl SolverResult {
    /// Returns the record with the given (normalized) name, if it is part of the solution.
    pub fn find(&self, name: &str) -> Option<&RepoDataRecord> {
        self.records
            .iter()
            .find(|record| record.package_record.name.as_normalized() == name)
    }
}
