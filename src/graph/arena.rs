use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Contiguous storage for many short slices, addressed by [`ArenaIndex`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Arena<T> {
    arena: Vec<T>,
}

impl<T> Arena<T> {
    /// Make an empty arena with room for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: Vec::with_capacity(capacity),
        }
    }

    /// Append a slice and return its index.
    pub fn push_slice<I: IntoIterator<Item = T>>(&mut self, items: I) -> ArenaIndex {
        let start = self.arena.len();
        self.arena.extend(items);
        ArenaIndex {
            start,
            stop: self.arena.len(),
        }
    }

    /// Total number of stored elements.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// All elements in storage order.
    pub fn as_slice(&self) -> &[T] {
        &self.arena
    }
}

impl<T> Index<ArenaIndex> for Arena<T> {
    type Output = [T];

    fn index(&self, index: ArenaIndex) -> &Self::Output {
        &self.arena[index.start..index.stop]
    }
}

impl<T> IndexMut<ArenaIndex> for Arena<T> {
    fn index_mut(&mut self, index: ArenaIndex) -> &mut Self::Output {
        &mut self.arena[index.start..index.stop]
    }
}

/// Location of one slice in an [`Arena`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArenaIndex {
    start: usize,
    stop: usize,
}

impl ArenaIndex {
    /// Offset of the first element in the arena.
    pub fn start(&self) -> usize {
        self.start
    }
}
