//! Aggregate root contract and child-type descriptors.
//!
//! # Responsibility
//! - Describe an aggregate root together with the child rows it owns.
//! - Resolve per-child-type functions (table, predicate, reconstruction)
//!   without runtime lookups by name.
//!
//! # Invariants
//! - A child detached from the aggregate appears exactly once in
//!   `deleted_child_entities()` before the next save.
//! - `deleted_child_entities()` and `release_events()` drain on read.
//! - Children drained for a write that rolled back are handed back through
//!   `restore_deleted_child_entities()`.
//! - Loaded children that `from_state` leaves untaken are dropped with a
//!   warning per child type.

use crate::events::DomainEvent;
use crate::model::entity::{type_tag, AggregateId, ChildEntity, Entity, TypeTag};
use crate::model::state::{Identifier, State};
use crate::repo::error::{RepoError, RepoResult};
use indexmap::IndexMap;
use log::warn;

/// Reserved column signalling optimistic concurrency participation.
pub const VERSION_COLUMN: &str = "aggregate_version";

/// Currently attached children, grouped by type tag.
pub type ChildEntitiesByType<'a> = IndexMap<TypeTag, Vec<&'a mut dyn Entity>>;

/// Root entity owning a consistency boundary.
pub trait Aggregate: Entity + Sized {
    type Id: AggregateId;

    /// Predicate selecting this aggregate's own row.
    fn identifier_for_query(id: &Self::Id) -> Identifier;

    /// Every child type this aggregate owns.
    fn child_entity_types() -> Vec<ChildEntityType<Self::Id>>;

    fn child_entities_by_type(&mut self) -> ChildEntitiesByType<'_>;

    /// Rebuilds the aggregate from its row state and its reconstructed
    /// children.
    fn from_state(state: State, children: ChildEntities) -> RepoResult<Self>;

    /// Children removed since the last load or save. Drains.
    fn deleted_child_entities(&mut self) -> Vec<Box<dyn Entity>>;

    /// Takes back children drained by `deleted_child_entities()` whose
    /// deletion was rolled back.
    fn restore_deleted_child_entities(&mut self, children: Vec<Box<dyn Entity>>);

    /// Domain events recorded since the last release. Drains.
    fn release_events(&mut self) -> Vec<Box<dyn DomainEvent>>;
}

/// Type-level functions of one child entity type, scoped to the owning
/// aggregate's identifier type.
pub struct ChildEntityType<Id> {
    tag: TypeTag,
    table_name: &'static str,
    identifier_for_query: fn(&Id) -> Identifier,
    reconstruct: fn(State, &State) -> RepoResult<Box<dyn Entity>>,
}

impl<Id: AggregateId> ChildEntityType<Id> {
    pub fn of<C>() -> Self
    where
        C: ChildEntity<AggregateId = Id>,
    {
        Self {
            tag: type_tag::<C>(),
            table_name: C::table_name(),
            identifier_for_query: C::identifier_for_query,
            reconstruct: reconstruct_child::<C>,
        }
    }

    pub fn tag(&self) -> TypeTag {
        self.tag
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    pub fn identifier_for_query(&self, aggregate_id: &Id) -> Identifier {
        (self.identifier_for_query)(aggregate_id)
    }

    pub fn reconstruct(&self, state: State, aggregate_state: &State) -> RepoResult<Box<dyn Entity>> {
        (self.reconstruct)(state, aggregate_state)
    }
}

impl<Id> Clone for ChildEntityType<Id> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag,
            table_name: self.table_name,
            identifier_for_query: self.identifier_for_query,
            reconstruct: self.reconstruct,
        }
    }
}

impl<Id> std::fmt::Debug for ChildEntityType<Id> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildEntityType")
            .field("tag", &self.tag)
            .field("table_name", &self.table_name)
            .finish()
    }
}

fn reconstruct_child<C: ChildEntity>(
    state: State,
    aggregate_state: &State,
) -> RepoResult<Box<dyn Entity>> {
    let child = C::from_state(state, aggregate_state)?;
    Ok(Box::new(child))
}

/// Reconstructed children handed to [`Aggregate::from_state`].
#[derive(Default)]
pub struct ChildEntities {
    by_type: IndexMap<TypeTag, Vec<Box<dyn Entity>>>,
}

impl ChildEntities {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tag: TypeTag, entities: Vec<Box<dyn Entity>>) {
        self.by_type.entry(tag).or_default().extend(entities);
    }

    pub fn tags(&self) -> impl Iterator<Item = TypeTag> + '_ {
        self.by_type.keys().copied()
    }

    pub fn len_of(&self, tag: TypeTag) -> usize {
        self.by_type.get(tag).map_or(0, Vec::len)
    }

    /// Child types that still hold loaded rows.
    pub fn untaken_tags(&self) -> impl Iterator<Item = TypeTag> + '_ {
        self.by_type
            .iter()
            .filter(|(_, entities)| !entities.is_empty())
            .map(|(tag, _)| *tag)
    }

    /// Removes and returns all children of type `C`.
    ///
    /// # Errors
    /// - `ContractViolation` when `C` was never declared by the aggregate or
    ///   when a stored child is not a `C`.
    pub fn take<C: ChildEntity>(&mut self) -> RepoResult<Vec<C>> {
        let tag = type_tag::<C>();
        let entities = self.by_type.shift_remove(tag).ok_or_else(|| {
            RepoError::ContractViolation(format!(
                "child entity type `{tag}` was not declared in `child_entity_types()`"
            ))
        })?;

        entities
            .into_iter()
            .map(|entity| {
                let found = entity.entity_type();
                entity
                    .into_any()
                    .downcast::<C>()
                    .map(|child| *child)
                    .map_err(|_| {
                        RepoError::ContractViolation(format!(
                            "`from_state` of `{tag}` produced an instance of `{found}`"
                        ))
                    })
            })
            .collect()
    }
}

impl Drop for ChildEntities {
    fn drop(&mut self) {
        for tag in self.untaken_tags() {
            warn!(
                "event=children_untaken module=model status=warn child_type={} count={}",
                tag,
                self.len_of(tag)
            );
        }
    }
}

impl std::fmt::Debug for ChildEntities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.by_type.iter().map(|(tag, entities)| (tag, entities.len())))
            .finish()
    }
}
