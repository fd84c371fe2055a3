use crate::command::Command;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 5;

/// Outcome of [`History::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Added,
    /// Same tokens as the most recent entry; nothing was stored.
    Unchanged,
}

/// Bounded history of executed external commands, oldest first.
///
/// Entries are owned clones, independent of the command that produced them.
/// Public numbering runs the other way: entry 1 is the most recent command.
#[derive(Debug)]
pub struct History {
    entries: VecDeque<Command>,
    capacity: usize,
}

impl History {
    /// `capacity` must be at least 1.
    pub fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity >= 1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&mut self, cmd: &Command) -> Recorded {
        if self.entries.back().is_some_and(|last| last.same_tokens(cmd)) {
            return Recorded::Unchanged;
        }
        if self.entries.len() == self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                tracing::debug!(command = %evicted, "history full, evicted oldest entry");
            }
        }
        self.entries.push_back(cmd.clone());
        Recorded::Added
    }

    /// Entry `n`, counting from 1 = most recent.
    pub fn get(&self, n: usize) -> Option<Command> {
        if n == 0 || n > self.entries.len() {
            return None;
        }
        self.entries.get(self.entries.len() - n).cloned()
    }

    /// Change the capacity, keeping only the most recent entries that still fit.
    pub fn resize(&mut self, capacity: usize) {
        debug_assert!(capacity >= 1);
        if self.entries.len() > capacity {
            let excess = self.entries.len() - capacity;
            self.entries.drain(..excess);
        }
        self.capacity = capacity;
    }

    /// Entries in display order, most recent first.
    pub fn list(&self) -> impl Iterator<Item = &Command> {
        self.entries.iter().rev()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}
