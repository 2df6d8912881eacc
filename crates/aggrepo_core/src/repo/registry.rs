//! Aggregate type registry, resolved once at setup.
//!
//! # Responsibility
//! - Record which aggregate types a repository may persist.
//! - Resolve and validate each aggregate's child descriptors up front.
//!
//! # Invariants
//! - Every table is claimed by at most one registered root or child type.
//! - Child type tags are unique within one aggregate.
//! - The registry is immutable once handed to a repository.

use crate::model::aggregate::{Aggregate, ChildEntityType};
use crate::model::entity::{Entity, TypeTag};
use crate::repo::error::{RepoError, RepoResult};
use indexmap::IndexMap;
use std::any::{type_name, Any, TypeId};

/// One registered aggregate type.
pub struct RegisteredAggregate {
    type_name: &'static str,
    table_name: &'static str,
    child_tables: Vec<(TypeTag, &'static str)>,
    child_types: Box<dyn Any + Send + Sync>,
}

impl RegisteredAggregate {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn table_name(&self) -> &'static str {
        self.table_name
    }

    /// `(type tag, table)` of every declared child type.
    pub fn child_tables(&self) -> &[(TypeTag, &'static str)] {
        &self.child_tables
    }

    fn tables(&self) -> impl Iterator<Item = &'static str> + '_ {
        std::iter::once(self.table_name).chain(self.child_tables.iter().map(|(_, table)| *table))
    }
}

#[derive(Default)]
pub struct AggregateRegistry {
    entries: IndexMap<TypeId, RegisteredAggregate>,
}

impl AggregateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`AggregateRegistry::register`].
    pub fn with<A: Aggregate>(mut self) -> RepoResult<Self> {
        self.register::<A>()?;
        Ok(self)
    }

    /// Registers aggregate type `A`.
    ///
    /// # Errors
    /// - `InvalidAggregateType` when `A` is already registered, declares an
    ///   empty table name, repeats a child type, or shares a table with
    ///   another registered type.
    pub fn register<A: Aggregate>(&mut self) -> RepoResult<()> {
        let name = type_name::<A>();
        if self.entries.contains_key(&TypeId::of::<A>()) {
            return Err(RepoError::invalid_aggregate_type(name, "registered twice"));
        }

        let table_name = <A as Entity>::table_name();
        if table_name.trim().is_empty() {
            return Err(RepoError::invalid_aggregate_type(name, "table name is empty"));
        }

        let child_types: Vec<ChildEntityType<A::Id>> = A::child_entity_types();
        let mut child_tables: Vec<(TypeTag, &'static str)> = Vec::with_capacity(child_types.len());
        for child_type in &child_types {
            let (tag, table) = (child_type.tag(), child_type.table_name());
            if table.trim().is_empty() {
                return Err(RepoError::invalid_aggregate_type(
                    name,
                    format!("child type `{tag}` has an empty table name"),
                ));
            }
            if child_tables.iter().any(|(seen, _)| *seen == tag) {
                return Err(RepoError::invalid_aggregate_type(
                    name,
                    format!("child type `{tag}` is declared more than once"),
                ));
            }
            if table == table_name || child_tables.iter().any(|(_, seen)| *seen == table) {
                return Err(RepoError::invalid_aggregate_type(
                    name,
                    format!("table `{table}` is used by more than one entity type"),
                ));
            }
            child_tables.push((tag, table));
        }

        let entry = RegisteredAggregate {
            type_name: name,
            table_name,
            child_tables,
            child_types: Box::new(child_types),
        };

        for table in entry.tables() {
            if let Some(owner) = self.table_owner(table) {
                return Err(RepoError::invalid_aggregate_type(
                    name,
                    format!("table `{table}` is already used by aggregate `{owner}`"),
                ));
            }
        }

        self.entries.insert(TypeId::of::<A>(), entry);
        Ok(())
    }

    pub fn contains<A: Aggregate>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<A>())
    }

    /// Registered aggregates, in registration order.
    pub fn aggregates(&self) -> impl Iterator<Item = &RegisteredAggregate> {
        self.entries.values()
    }

    /// Looks up the registration of `A`.
    ///
    /// # Errors
    /// - `InvalidAggregateType` when `A` was never registered.
    pub fn get<A: Aggregate>(&self) -> RepoResult<&RegisteredAggregate> {
        self.entries.get(&TypeId::of::<A>()).ok_or_else(|| {
            RepoError::invalid_aggregate_type(
                type_name::<A>(),
                "not registered with this repository; register it in `AggregateRegistry`",
            )
        })
    }

    /// Child descriptors resolved for `A` at registration.
    pub fn child_entity_types<A: Aggregate>(&self) -> RepoResult<&[ChildEntityType<A::Id>]> {
        let entry = self.get::<A>()?;
        entry
            .child_types
            .downcast_ref::<Vec<ChildEntityType<A::Id>>>()
            .map(Vec::as_slice)
            .ok_or_else(|| {
                RepoError::ContractViolation(format!(
                    "child descriptors of `{}` do not match its identifier type",
                    entry.type_name
                ))
            })
    }

    fn table_owner(&self, table: &str) -> Option<&'static str> {
        self.entries
            .values()
            .find(|entry| entry.tables().any(|owned| owned == table))
            .map(|entry| entry.type_name)
    }
}

impl std::fmt::Debug for AggregateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.values().map(|entry| entry.type_name))
            .finish()
    }
}
