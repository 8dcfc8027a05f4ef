use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Implemented by the typed indices that are handed out by an [`Arena`].
pub(crate) trait ArenaId: Copy {
    fn from_usize(x: usize) -> Self;
    fn to_usize(self) -> usize;
}

/// An append-only store of values addressed by a typed id.
pub(crate) struct Arena<TId: ArenaId, TValue> {
    data: Vec<TValue>,
    phantom: PhantomData<TId>,
}

impl<TId: ArenaId, TValue> Arena<TId, TValue> {
    pub(crate) fn new() -> Self {
        Self {
            data: Vec::new(),
            phantom: PhantomData,
        }
    }

    pub(crate) fn alloc(&mut self, value: TValue) -> TId {
        let id = TId::from_usize(self.data.len());
        self.data.push(value);
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (TId, &TValue)> {
        self.data
            .iter()
            .enumerate()
            .map(|(idx, value)| (TId::from_usize(idx), value))
    }
}

impl<TId: ArenaId, TValue> Index<TId> for Arena<TId, TValue> {
    type Output = TValue;

    fn index(&self, index: TId) -> &Self::Output {
        &self.data[index.to_usize()]
    }
}

impl<TId: ArenaId, TValue> IndexMut<TId> for Arena<TId, TValue> {
    fn index_mut(&mut self, index: TId) -> &mut Self::Output {
        &mut self.data[index.to_usize()]
    }
}
