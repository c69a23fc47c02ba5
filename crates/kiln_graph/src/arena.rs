//! Per-unit tables keyed by dense indices.
//!
//! A graph assigns every unit a [`UnitIndex`](crate::UnitIndex) in
//! `0..len`. Anything computed per unit (edges, ranks, verdicts, scheduling
//! counters) lives in an [`Arena`] of the same length, so lookups are plain
//! vector indexing.

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// An index type that maps one-to-one onto `usize` positions.
pub trait DenseIndex: Copy {
    /// Wraps a position.
    fn new(pos: usize) -> Self;

    /// The wrapped position.
    fn pos(self) -> usize;
}

/// A vector addressed by a typed index instead of `usize`.
///
/// Entries are only ever appended, so an index handed out by
/// [`push`](Self::push) stays valid for the arena's lifetime.
#[derive(Debug, Clone)]
pub struct Arena<I, T> {
    items: Vec<T>,
    _index: PhantomData<fn(I)>,
}

impl<I: DenseIndex, T> Default for Arena<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: DenseIndex, T> Arena<I, T> {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            _index: PhantomData,
        }
    }

    /// A table of `len` clones of `value`, typically sized to a graph.
    pub fn filled(len: usize, value: T) -> Self
    where
        T: Clone,
    {
        Self {
            items: vec![value; len],
            _index: PhantomData,
        }
    }

    /// Appends `item` and returns its index.
    pub fn push(&mut self, item: T) -> I {
        let idx = I::new(self.items.len());
        self.items.push(item);
        idx
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// `(index, entry)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.items.iter().enumerate().map(|(pos, item)| (I::new(pos), item))
    }

    /// Every valid index, ascending.
    pub fn indices(&self) -> impl Iterator<Item = I> {
        (0..self.items.len()).map(I::new)
    }
}

impl<I: DenseIndex, T> Index<I> for Arena<I, T> {
    type Output = T;

    fn index(&self, idx: I) -> &T {
        &self.items[idx.pos()]
    }
}

impl<I: DenseIndex, T> IndexMut<I> for Arena<I, T> {
    fn index_mut(&mut self, idx: I) -> &mut T {
        &mut self.items[idx.pos()]
    }
}
