use crate::arena::ArenaId;
use crate::id::{ClauseId, SolvableId};

/// Keeps track of the value assigned to every solvable, the decision level at which that
/// happened and the clause that implied it. Assignments are stored on a trail so that they can
/// be undone when the solver backjumps.
pub(crate) struct DecisionTracker {
    values: Vec<Option<bool>>,
    levels: Vec<u32>,
    reasons: Vec<Option<ClauseId>>,
    trail: Vec<SolvableId>,
    level_starts: Vec<usize>,
    propagate_index: usize,
}

impl DecisionTracker {
    pub(crate) fn new(solvable_count: usize) -> Self {
        Self {
            values: vec![None; solvable_count],
            levels: vec![0; solvable_count],
            reasons: vec![None; solvable_count],
            trail: Vec::new(),
            level_starts: Vec::new(),
            propagate_index: 0,
        }
    }

    pub(crate) fn value(&self, solvable: SolvableId) -> Option<bool> {
        self.values[solvable.index()]
    }

    pub(crate) fn level_of(&self, solvable: SolvableId) -> u32 {
        self.levels[solvable.index()]
    }

    /// The clause that implied the value of a solvable, `None` for decisions.
    pub(crate) fn reason(&self, solvable: SolvableId) -> Option<ClauseId> {
        self.reasons[solvable.index()]
    }

    pub(crate) fn level(&self) -> u32 {
        self.level_starts.len() as u32
    }

    pub(crate) fn trail(&self) -> &[SolvableId] {
        &self.trail
    }

    /// Opens a new decision level.
    pub(crate) fn new_level(&mut self) {
        self.level_starts.push(self.trail.len());
    }

    pub(crate) fn assign(&mut self, solvable: SolvableId, value: bool, reason: Option<ClauseId>) {
        let idx = solvable.index();
        debug_assert!(self.values[idx].is_none(), "solvable is assigned twice");
        self.values[idx] = Some(value);
        self.levels[idx] = self.level();
        self.reasons[idx] = reason;
        self.trail.push(solvable);
    }

    /// Returns the next assignment that has not been propagated yet.
    pub(crate) fn next_unpropagated(&mut self) -> Option<SolvableId> {
        let solvable = self.trail.get(self.propagate_index).copied()?;
        self.propagate_index += 1;
        Some(solvable)
    }

    /// Undoes all assignments made after the given level.
    pub(crate) fn undo_until(&mut self, level: u32) {
        let Some(&start) = self.level_starts.get(level as usize) else {
            return;
        };
        for solvable in self.trail.drain(start..) {
            let idx = solvable.index();
            self.values[idx] = None;
            self.reasons[idx] = None;
            self.levels[idx] = 0;
        }
        self.level_starts.truncate(level as usize);
        self.propagate_index = self.propagate_index.min(start);
    }

    /// The solvables that are installed, excluding the root.
    pub(crate) fn installed(&self) -> Vec<SolvableId> {
        self.values
            .iter()
            .enumerate()
            .filter(|(idx, value)| *idx != 0 && **value == Some(true))
            .map(|(idx, _)| SolvableId::from_usize(idx))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::DecisionTracker;
    use crate::arena::ArenaId;
    use crate::id::SolvableId;

    #[test]
    fn test_backjump_restores_previous_level() {
        let mut tracker = DecisionTracker::new(4);
        let [a, b, c] = [1, 2, 3].map(SolvableId::from_usize);

        tracker.assign(SolvableId::root(), true, None);
        tracker.new_level();
        tracker.assign(a, true, None);
        tracker.new_level();
        tracker.assign(b, false, None);
        tracker.assign(c, true, None);
        assert_eq!(tracker.level(), 2);
        assert_eq!(tracker.level_of(c), 2);

        tracker.undo_until(1);
        assert_eq!(tracker.level(), 1);
        assert_eq!(tracker.value(a), Some(true));
        assert_eq!(tracker.value(b), None);
        assert_eq!(tracker.value(c), None);
        assert_eq!(tracker.trail(), &[SolvableId::root(), a]);
        assert_eq!(tracker.installed(), vec![a]);
    }
}
