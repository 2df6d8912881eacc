//! Aggregate repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Save, load, and delete whole aggregate graphs (root row plus child rows).
//! - Enforce optimistic concurrency on versioned rows.
//! - Forward released domain events after a successful commit.
//!
//! # Invariants
//! - Every `save`/`delete` runs in exactly one transaction; any failure rolls
//!   the whole call back.
//! - INSERT vs UPDATE is chosen by `Entity::is_new()`, never by probing.
//! - Events are dispatched only after commit.
//! - A failed write hands drained child deletions back to the aggregate, so
//!   the same instance can be saved again.
//! - The repository keeps no per-aggregate state between calls.

use crate::config::StoreConfig;
use crate::events::EventDispatcher;
use crate::model::aggregate::{Aggregate, ChildEntities};
use crate::model::entity::{Entity, TypeTag};
use crate::model::state::State;
use crate::repo::concurrency::VersionGuard;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::registry::AggregateRegistry;
use crate::repo::sql;
use log::debug;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::any::type_name;
use std::time::Instant;

/// Persistence operations over whole aggregates.
pub trait AggregateRepository {
    /// Writes the aggregate and its children in one transaction.
    ///
    /// # Errors
    /// - `ConcurrentUpdate` when a versioned row was changed since load.
    /// - `ConstraintViolation` when the store rejects a write, e.g. inserting
    ///   a new aggregate whose identifier already exists.
    fn save<A: Aggregate>(&mut self, aggregate: &mut A) -> RepoResult<()>;

    /// Loads the aggregate identified by `id` with all of its children.
    ///
    /// # Errors
    /// - `NotFound` when no root row matches.
    fn get_by_id<A: Aggregate>(&mut self, id: &A::Id) -> RepoResult<A> {
        self.get_by_id_with_extra_state(id, State::new())
    }

    /// Like [`AggregateRepository::get_by_id`], merging `extra_state` over the
    /// loaded root state before any reconstruction runs.
    fn get_by_id_with_extra_state<A: Aggregate>(
        &mut self,
        id: &A::Id,
        extra_state: State,
    ) -> RepoResult<A>;

    /// Deletes the aggregate row and every child row it owns.
    fn delete<A: Aggregate>(&mut self, aggregate: &mut A) -> RepoResult<()>;
}

/// SQLite-backed aggregate repository.
pub struct SqliteAggregateRepository<'conn, D: EventDispatcher> {
    conn: &'conn mut Connection,
    registry: AggregateRegistry,
    dispatcher: D,
    config: StoreConfig,
}

impl<'conn, D: EventDispatcher> SqliteAggregateRepository<'conn, D> {
    pub fn new(conn: &'conn mut Connection, registry: AggregateRegistry, dispatcher: D) -> Self {
        Self {
            conn,
            registry,
            dispatcher,
            config: StoreConfig::default(),
        }
    }

    /// Replaces the default version column and write lock settings.
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &AggregateRegistry {
        &self.registry
    }

    pub fn dispatcher(&self) -> &D {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut D {
        &mut self.dispatcher
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn write_behavior(&self) -> TransactionBehavior {
        self.config.write_lock.into()
    }
}

impl<D: EventDispatcher> AggregateRepository for SqliteAggregateRepository<'_, D> {
    fn save<A: Aggregate>(&mut self, aggregate: &mut A) -> RepoResult<()> {
        let started_at = Instant::now();
        let declared: Vec<TypeTag> = self
            .registry
            .child_entity_types::<A>()?
            .iter()
            .map(|child_type| child_type.tag())
            .collect();
        let behavior = self.write_behavior();
        let version_column = self.config.version_column.as_str();

        let tx = self.conn.transaction_with_behavior(behavior)?;
        let deleted_children = aggregate.deleted_child_entities();

        let written = match write_graph(tx, aggregate, &deleted_children, &declared, version_column)
        {
            Ok(written) => written,
            Err(err) => {
                aggregate.restore_deleted_child_entities(deleted_children);
                return Err(err);
            }
        };

        aggregate.mark_as_persisted();
        for (_, children) in aggregate.child_entities_by_type() {
            for child in children {
                child.mark_as_persisted();
            }
        }

        let events = aggregate.release_events();
        debug!(
            "event=aggregate_save module=repo status=ok aggregate={} rows_written={} rows_deleted={} events={} duration_ms={}",
            type_name::<A>(),
            written,
            deleted_children.len(),
            events.len(),
            started_at.elapsed().as_millis()
        );
        self.dispatcher.dispatch(events);

        Ok(())
    }

    fn get_by_id_with_extra_state<A: Aggregate>(
        &mut self,
        id: &A::Id,
        extra_state: State,
    ) -> RepoResult<A> {
        let started_at = Instant::now();
        let child_types = self.registry.child_entity_types::<A>()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Deferred)?;

        let mut rows = sql::fetch_all(&tx, A::table_name(), &A::identifier_for_query(id))?;
        if rows.is_empty() {
            return Err(RepoError::NotFound {
                aggregate_type: type_name::<A>(),
                id: id.to_string(),
            });
        }
        let mut aggregate_state = rows.swap_remove(0);
        aggregate_state.merge(extra_state);

        let mut children = ChildEntities::new();
        let mut loaded = 0_usize;
        for child_type in child_types {
            let states = sql::fetch_all(
                &tx,
                child_type.table_name(),
                &child_type.identifier_for_query(id),
            )?;

            let mut entities = Vec::with_capacity(states.len());
            for state in states {
                let mut child = child_type.reconstruct(state, &aggregate_state)?;
                child.mark_as_persisted();
                entities.push(child);
            }
            loaded += entities.len();
            children.insert(child_type.tag(), entities);
        }

        tx.commit()?;

        let mut aggregate = A::from_state(aggregate_state, children)?;
        aggregate.mark_as_persisted();

        debug!(
            "event=aggregate_load module=repo status=ok aggregate={} children={} duration_ms={}",
            type_name::<A>(),
            loaded,
            started_at.elapsed().as_millis()
        );
        Ok(aggregate)
    }

    fn delete<A: Aggregate>(&mut self, aggregate: &mut A) -> RepoResult<()> {
        let started_at = Instant::now();
        self.registry.get::<A>()?;
        let behavior = self.write_behavior();

        let tx = self.conn.transaction_with_behavior(behavior)?;
        let deleted_children = aggregate.deleted_child_entities();

        let deleted = match delete_graph(tx, aggregate, &deleted_children) {
            Ok(deleted) => deleted,
            Err(err) => {
                aggregate.restore_deleted_child_entities(deleted_children);
                return Err(err);
            }
        };

        debug!(
            "event=aggregate_delete module=repo status=ok aggregate={} rows_deleted={} duration_ms={}",
            type_name::<A>(),
            deleted,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

/// Writes the root, removes detached children and upserts attached ones,
/// then commits. Returns the number of rows written.
fn write_graph<A: Aggregate>(
    tx: Transaction<'_>,
    aggregate: &mut A,
    deleted_children: &[Box<dyn Entity>],
    declared: &[TypeTag],
    version_column: &str,
) -> RepoResult<usize> {
    insert_or_update(&tx, &mut *aggregate, version_column)?;
    let mut written = 1_usize;

    for child in deleted_children {
        sql::delete_row(&tx, child.entity_table(), &child.identifier())?;
    }

    for (tag, children) in aggregate.child_entities_by_type() {
        if !declared.contains(&tag) {
            return Err(RepoError::ContractViolation(format!(
                "`{}` reported children of undeclared type `{tag}`",
                type_name::<A>()
            )));
        }
        for child in children {
            insert_or_update(&tx, child, version_column)?;
            written += 1;
        }
    }

    tx.commit()?;
    Ok(written)
}

/// Deletes the root row and every detached or attached child row, then
/// commits. Returns the number of rows removed.
fn delete_graph<A: Aggregate>(
    tx: Transaction<'_>,
    aggregate: &mut A,
    deleted_children: &[Box<dyn Entity>],
) -> RepoResult<usize> {
    let mut deleted = sql::delete_row(&tx, A::table_name(), &aggregate.identifier())?;

    for child in deleted_children {
        deleted += sql::delete_row(&tx, child.entity_table(), &child.identifier())?;
    }
    for (_, children) in aggregate.child_entities_by_type() {
        for child in children {
            deleted += sql::delete_row(&tx, child.entity_table(), &child.identifier())?;
        }
    }

    tx.commit()?;
    Ok(deleted)
}

/// INSERT for new entities; version-guarded UPDATE for persisted ones.
fn insert_or_update(
    conn: &Connection,
    entity: &mut dyn Entity,
    version_column: &str,
) -> RepoResult<()> {
    let table = entity.entity_table();
    let state = entity.state();

    if entity.is_new() {
        return sql::insert_row(conn, table, &state);
    }

    let identifier = entity.identifier();
    let guard = VersionGuard {
        version_column,
        entity_type: entity.entity_type(),
        table,
    };
    guard.check(conn, &state, &identifier)?;

    if sql::update_row(conn, table, &state, &identifier)? == 0 {
        return Err(guard.conflict(&identifier));
    }
    Ok(())
}
