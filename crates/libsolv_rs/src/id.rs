use crate::arena::ArenaId;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Returns the index of this id.
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl ArenaId for $name {
            fn from_usize(x: usize) -> Self {
                Self(u32::try_from(x).expect("the number of ids fits in a u32"))
            }

            fn to_usize(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// The id of an interned package name.
    NameId
);

arena_id!(
    /// The id of an interned match spec.
    MatchSpecId
);

arena_id!(
    /// The id of a solvable in the [`crate::Pool`].
    SolvableId
);

arena_id!(
    /// The id of an interned string, used for exclusion reasons.
    StringId
);

arena_id!(
    /// The id of a clause in the solver.
    ClauseId
);

arena_id!(
    /// The id of a learnt clause.
    LearntClauseId
);

impl SolvableId {
    /// The solvable that represents the solve request itself.
    pub fn root() -> Self {
        Self(0)
    }

    /// Returns true if this is the root solvable.
    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}
