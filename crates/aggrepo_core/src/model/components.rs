//! Composable behavior values owned by concrete entity types.
//!
//! Domain types embed these as plain fields and forward the matching
//! `Entity`/`Aggregate` methods to them.

use crate::events::DomainEvent;
use crate::model::entity::{ChildEntity, Entity};

/// "Has this instance ever been saved" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceState {
    is_new: bool,
}

impl PersistenceState {
    /// State of a freshly constructed entity.
    pub fn new() -> Self {
        Self { is_new: true }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn mark_as_persisted(&mut self) {
        self.is_new = false;
    }
}

impl Default for PersistenceState {
    fn default() -> Self {
        Self::new()
    }
}

/// Optimistic concurrency counter stored in the version column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateVersion(i64);

impl AggregateVersion {
    pub fn new(initial: i64) -> Self {
        Self(initial)
    }

    pub fn current(&self) -> i64 {
        self.0
    }

    /// Increments and returns the value to write. Call once per `state()`.
    pub fn next(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }

    pub fn set(&mut self, value: i64) {
        self.0 = value;
    }
}

/// Domain events recorded during this in-memory lifetime.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Box<dyn DomainEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_that<E: DomainEvent>(&mut self, event: E) {
        self.events.push(Box::new(event));
    }

    /// Returns recorded events and forgets them.
    pub fn release(&mut self) -> Vec<Box<dyn DomainEvent>> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Children detached from the aggregate since the last save.
#[derive(Default)]
pub struct DeletedChildren {
    entities: Vec<Box<dyn Entity>>,
}

impl DeletedChildren {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a child removed from the working collection.
    pub fn record<C: ChildEntity>(&mut self, child: C) {
        self.entities.push(Box::new(child));
    }

    /// Returns recorded children and forgets them.
    pub fn drain(&mut self) -> Vec<Box<dyn Entity>> {
        std::mem::take(&mut self.entities)
    }

    /// Puts drained children back, ahead of any recorded since the drain.
    pub fn restore(&mut self, mut children: Vec<Box<dyn Entity>>) {
        children.append(&mut self.entities);
        self.entities = children;
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl std::fmt::Debug for DeletedChildren {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entities.iter().map(|entity| entity.identifier()))
            .finish()
    }
}
