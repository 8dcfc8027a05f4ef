use crate::id::ClauseId;
use crate::solver::clause::{ClauseState, Literal};

/// For every literal, the clauses that watch it. A clause is revisited only when one of its two
/// watched literals becomes false.
pub(crate) struct WatchMap {
    watches: Vec<Vec<ClauseId>>,
}

impl WatchMap {
    pub(crate) fn new(solvable_count: usize) -> Self {
        Self {
            watches: vec![Vec::new(); solvable_count * 2],
        }
    }

    /// Starts watching the first two literals of a clause.
    pub(crate) fn start_watching(&mut self, clause_id: ClauseId, clause: &ClauseState) {
        for literal in &clause.literals[..2] {
            self.watches[literal.watch_index()].push(clause_id);
        }
    }

    pub(crate) fn watch(&mut self, literal: Literal, clause_id: ClauseId) {
        self.watches[literal.watch_index()].push(clause_id);
    }

    /// Removes and returns the clauses watching a literal. Clauses that keep watching it must be
    /// handed back with [`WatchMap::restore`].
    pub(crate) fn take(&mut self, literal: Literal) -> Vec<ClauseId> {
        std::mem::take(&mut self.watches[literal.watch_index()])
    }

    pub(crate) fn restore(&mut self, literal: Literal, mut clauses: Vec<ClauseId>) {
        let watches = &mut self.watches[literal.watch_index()];
        clauses.append(watches);
        *watches = clauses;
    }
}
