//! # Exclusivity registry.
//!
//! Mutually exclusive conditions name a **category**. At most one task per category
//! may be past condition evaluation and not yet finished, and tasks of a category run
//! in the order they were added.
//!
//! The registry only remembers the **most recent** task added per category. Adding a
//! new task swaps it in and returns the previous holder; the queue makes the new task
//! depend on that holder, so a category forms a FIFO chain:
//!
//! ```text
//! add(A, "db")  → registry["db"] = A,  prev = None
//! add(B, "db")  → registry["db"] = B,  prev = A   → B depends on A
//! add(C, "db")  → registry["db"] = C,  prev = B   → C depends on B
//! A finishes    → unregister(A): no-op (B holds the slot)
//! C finishes    → unregister(C): slot cleared
//! ```
//!
//! ## Rules
//! - Register and swap is a single atomic step per category (`DashMap` shard lock).
//! - Unregistering only clears the slot if the finishing task still holds it.
//! - One registry may be shared by several queues; groups adopt their parent's.

use std::fmt;

use dashmap::DashMap;

use crate::tasks::Task;

/// Category → most recently added exclusive task.
#[derive(Default)]
pub struct ExclusivityRegistry {
    slots: DashMap<String, Task>,
}

impl ExclusivityRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `task` as the latest holder of `category`; returns the previous holder.
    pub fn register(&self, task: &Task, category: &str) -> Option<Task> {
        self.slots
            .insert(category.to_string(), task.clone())
            .filter(|prev| prev.id() != task.id())
    }

    /// Clears `category` if `task` is still its latest holder.
    pub fn unregister(&self, task: &Task, category: &str) {
        self.slots.remove_if(category, |_, holder| holder.id() == task.id());
    }

    /// Latest holder of `category`.
    pub fn current(&self, category: &str) -> Option<Task> {
        self.slots.get(category).map(|entry| entry.value().clone())
    }

    /// Number of categories with a holder.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when no category has a holder.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Forgets every category (test isolation).
    pub fn reset(&self) {
        self.slots.clear();
    }
}

impl fmt::Debug for ExclusivityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let categories: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("ExclusivityRegistry")
            .field("categories", &categories)
            .finish()
    }
}
