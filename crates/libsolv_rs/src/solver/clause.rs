use crate::id::{LearntClauseId, MatchSpecId, SolvableId, StringId};
use crate::solver::decision_tracker::DecisionTracker;

/// A literal is a solvable that is either installed (positive) or not installed (negated).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Literal {
    pub(crate) solvable: SolvableId,
    pub(crate) negate: bool,
}

impl Literal {
    pub(crate) fn positive(solvable: SolvableId) -> Self {
        Self {
            solvable,
            negate: false,
        }
    }

    pub(crate) fn negative(solvable: SolvableId) -> Self {
        Self {
            solvable,
            negate: true,
        }
    }

    /// The value the solvable must have for this literal to be true.
    pub(crate) fn satisfying_value(self) -> bool {
        !self.negate
    }

    /// Returns whether the literal is true, false or not yet known.
    pub(crate) fn eval(self, decisions: &DecisionTracker) -> Option<bool> {
        decisions
            .value(self.solvable)
            .map(|value| value == self.satisfying_value())
    }

    /// The index of the watch list of this literal.
    pub(crate) fn watch_index(self) -> usize {
        self.solvable.index() * 2 + usize::from(self.negate)
    }
}

/// The reason a clause exists. Every clause is a disjunction of literals, the kinds describe how
/// the literals were derived:
///
/// - `InstallRoot`: `root`
/// - `Requires(s, spec)`: `¬s ∨ c1 ∨ c2 ∨ ...` for all candidates `c` of `spec`
/// - `ForbidMultipleInstances(a, b)`: `¬a ∨ ¬b` for two solvables with the same name
/// - `Constrains(s, f, spec)`: `¬s ∨ ¬f` where `f` has the name of `spec` but does not match it
/// - `Lock(locked, other)`: `¬root ∨ ¬other`, only the locked solvable of a name may be installed
/// - `Excluded(s, reason)`: `¬s`
/// - `Learnt(id)`: a clause derived during conflict analysis
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Clause {
    InstallRoot,
    Requires(SolvableId, MatchSpecId),
    ForbidMultipleInstances(SolvableId, SolvableId),
    Constrains(SolvableId, SolvableId, MatchSpecId),
    Lock(SolvableId, SolvableId),
    Excluded(SolvableId, StringId),
    Learnt(LearntClauseId),
}

/// A clause together with its literals. The first two literals are the watched literals.
pub(crate) struct ClauseState {
    pub(crate) kind: Clause,
    pub(crate) literals: Vec<Literal>,
}

impl ClauseState {
    pub(crate) fn requires(
        parent: SolvableId,
        spec: MatchSpecId,
        candidates: &[SolvableId],
    ) -> Self {
        let literals = std::iter::once(Literal::negative(parent))
            .chain(candidates.iter().copied().map(Literal::positive))
            .collect();
        Self {
            kind: Clause::Requires(parent, spec),
            literals,
        }
    }

    pub(crate) fn install_root() -> Self {
        Self {
            kind: Clause::InstallRoot,
            literals: vec![Literal::positive(SolvableId::root())],
        }
    }

    pub(crate) fn forbid_multiple(a: SolvableId, b: SolvableId) -> Self {
        Self {
            kind: Clause::ForbidMultipleInstances(a, b),
            literals: vec![Literal::negative(a), Literal::negative(b)],
        }
    }

    pub(crate) fn constrains(
        parent: SolvableId,
        forbidden: SolvableId,
        spec: MatchSpecId,
    ) -> Self {
        Self {
            kind: Clause::Constrains(parent, forbidden, spec),
            literals: vec![Literal::negative(parent), Literal::negative(forbidden)],
        }
    }

    pub(crate) fn lock(locked: SolvableId, other: SolvableId) -> Self {
        Self {
            kind: Clause::Lock(locked, other),
            literals: vec![
                Literal::negative(SolvableId::root()),
                Literal::negative(other),
            ],
        }
    }

    pub(crate) fn excluded(solvable: SolvableId, reason: StringId) -> Self {
        Self {
            kind: Clause::Excluded(solvable, reason),
            literals: vec![Literal::negative(solvable)],
        }
    }

    pub(crate) fn learnt(id: LearntClauseId, literals: Vec<Literal>) -> Self {
        Self {
            kind: Clause::Learnt(id),
            literals,
        }
    }

    /// Clauses with at least two literals are tracked by the watch map, the others are
    /// assertions that are decided up front.
    pub(crate) fn is_watched(&self) -> bool {
        self.literals.len() >= 2
    }
}
