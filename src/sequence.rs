//! User-controlled page ordering for the rearrange tool.
//!
//! A [`PageSequence`] always holds a permutation of `0..page_count`. Mutators
//! only exist on a loaded sequence; [`PageSequenceManager`] owns the optional
//! sequence and models the `Uninitialized → Loaded → Mutated → Uninitialized`
//! lifecycle, so calling a mutator on an uninitialized manager does not compile.

use crate::params::format_page_order;
use serde::Serialize;
use tracing::debug;

/// A permutation of page indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSequence {
    order: Vec<usize>,
}

impl PageSequence {
    /// Identity ordering `[0, 1, …, page_count - 1]`.
    pub fn identity(page_count: usize) -> Self {
        Self {
            order: (0..page_count).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.order
    }

    pub fn is_identity(&self) -> bool {
        self.order.iter().enumerate().all(|(pos, &page)| pos == page)
    }

    /// Remove the entry at position `from` and reinsert it at position `to`.
    ///
    /// `to` is clamped to the last position. Returns `false` (and leaves the
    /// sequence untouched) when `from` is out of range.
    pub fn move_to(&mut self, from: usize, to: usize) -> bool {
        if from >= self.order.len() {
            return false;
        }
        let to = to.min(self.order.len() - 1);
        if from < to {
            self.order[from..=to].rotate_left(1);
        } else {
            self.order[to..=from].rotate_right(1);
        }
        true
    }

    /// Swap the entry at `pos` with its predecessor.
    pub fn move_up(&mut self, pos: usize) -> bool {
        if pos == 0 || pos >= self.order.len() {
            return false;
        }
        self.order.swap(pos - 1, pos);
        true
    }

    /// Swap the entry at `pos` with its successor.
    pub fn move_down(&mut self, pos: usize) -> bool {
        if pos + 1 >= self.order.len() {
            return false;
        }
        self.order.swap(pos, pos + 1);
        true
    }

    pub fn reverse(&mut self) {
        self.order.reverse();
    }

    pub fn reset_to_identity(&mut self) {
        for (pos, slot) in self.order.iter_mut().enumerate() {
            *slot = pos;
        }
    }

    /// Comma-separated 0-based indices, as submitted to the backend.
    pub fn to_param(&self) -> String {
        format_page_order(&self.order)
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.order
    }
}

/// Lifecycle state of a [`PageSequenceManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    Uninitialized,
    Loaded,
    Mutated,
}

/// Owns the page sequence of the currently loaded document, if any.
#[derive(Debug, Clone, Default)]
pub struct PageSequenceManager {
    sequence: Option<PageSequence>,
}

impl PageSequenceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a document with `page_count` pages; the sequence starts as identity.
    pub fn load(&mut self, page_count: usize) -> &mut PageSequence {
        debug!("Page sequence loaded with {} pages", page_count);
        self.sequence.insert(PageSequence::identity(page_count))
    }

    /// Drop the sequence (files cleared).
    pub fn clear(&mut self) {
        self.sequence = None;
    }

    pub fn state(&self) -> SequenceState {
        match &self.sequence {
            None => SequenceState::Uninitialized,
            Some(s) if s.is_identity() => SequenceState::Loaded,
            Some(_) => SequenceState::Mutated,
        }
    }

    pub fn sequence(&self) -> Option<&PageSequence> {
        self.sequence.as_ref()
    }

    /// Mutable access to the loaded sequence.
    pub fn sequence_mut(&mut self) -> Option<&mut PageSequence> {
        self.sequence.as_mut()
    }
}
