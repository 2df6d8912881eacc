//! Persistence core for aggregate-oriented domain models.
//! Maps an aggregate root and its owned child records onto SQLite rows and
//! back, transactionally and with optimistic concurrency control.

pub mod config;
pub mod db;
pub mod events;
pub mod logging;
pub mod model;
pub mod repo;
pub mod schema;

pub use config::{StoreConfig, WriteLockMode};
pub use events::{DiscardEvents, DomainEvent, EventDispatcher, EventMeta};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::aggregate::{
    Aggregate, ChildEntities, ChildEntitiesByType, ChildEntityType, VERSION_COLUMN,
};
pub use model::components::{AggregateVersion, DeletedChildren, EventLog, PersistenceState};
pub use model::entity::{type_tag, AggregateId, ChildEntity, Entity, EntityMeta, TypeTag};
pub use model::state::{Identifier, State, StateError};
pub use repo::aggregate_repo::{AggregateRepository, SqliteAggregateRepository};
pub use repo::error::{RepoError, RepoResult};
pub use repo::registry::{AggregateRegistry, RegisteredAggregate};
pub use schema::{AggregateSchemaProvider, ColumnType, Schema, SchemaError, SpecifiesSchema};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
