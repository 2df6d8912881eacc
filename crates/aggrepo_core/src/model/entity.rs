//! Entity contracts shared by aggregate roots and their child records.
//!
//! # Responsibility
//! - Describe how one persisted object maps onto one table row.
//! - Expose type-level facts (table, type name) through `dyn Entity`.
//!
//! # Invariants
//! - `identifier()` never changes after construction.
//! - `is_new()` stays `false` once `mark_as_persisted()` was called.
//! - `state()` includes every column the table requires and increments the
//!   version column when the entity carries one.

use crate::model::state::{Identifier, State};
use crate::repo::error::RepoResult;
use std::any::{type_name, Any};
use std::fmt::Display;

/// Tag grouping child entities of one type inside an aggregate.
pub type TypeTag = &'static str;

/// Returns the tag under which children of type `C` are grouped.
pub fn type_tag<C: ChildEntity>() -> TypeTag {
    type_name::<C>()
}

/// Opaque value identifying one aggregate instance.
///
/// `Display` output shows up in not-found diagnostics.
pub trait AggregateId: Display + 'static {}

/// Any object persisted as one row.
pub trait Entity: EntityMeta + 'static {
    /// Table holding rows of this entity type.
    fn table_name() -> &'static str
    where
        Self: Sized;

    /// Current column state of this entity.
    ///
    /// Entities that take part in optimistic concurrency increment their
    /// version here; the repository never does.
    fn state(&mut self) -> State;

    /// Columns and values that select exactly this entity's row.
    fn identifier(&self) -> Identifier;

    fn is_new(&self) -> bool;

    fn mark_as_persisted(&mut self);
}

/// Type-level entity facts reachable through a trait object.
///
/// Implemented for every [`Entity`]; never implement it by hand.
pub trait EntityMeta {
    fn entity_table(&self) -> &'static str;
    fn entity_type(&self) -> &'static str;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Entity> EntityMeta for T {
    fn entity_table(&self) -> &'static str {
        T::table_name()
    }

    fn entity_type(&self) -> &'static str {
        type_name::<T>()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// Record owned by exactly one aggregate and stored in its own table.
pub trait ChildEntity: Entity + Sized {
    /// Identifier type of the owning aggregate.
    type AggregateId: AggregateId;

    /// Predicate selecting every row of this type that belongs to the
    /// aggregate identified by `aggregate_id`.
    fn identifier_for_query(aggregate_id: &Self::AggregateId) -> Identifier;

    /// Rebuilds the child from its stored row.
    ///
    /// `aggregate_state` is the owning aggregate's row state (including any
    /// extra state supplied on load), for values the child derives from the
    /// root.
    fn from_state(state: State, aggregate_state: &State) -> RepoResult<Self>;
}
