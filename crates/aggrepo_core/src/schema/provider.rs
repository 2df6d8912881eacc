//! Combines the table declarations of several aggregate types.

use super::{Schema, SchemaError, SpecifiesSchema};
use crate::model::aggregate::Aggregate;
use std::any::type_name;

type SpecifyFn = fn(&mut Schema) -> Result<(), SchemaError>;

/// Setup-time collaborator producing the full schema for a set of
/// aggregate types.
#[derive(Clone, Default)]
pub struct AggregateSchemaProvider {
    specifiers: Vec<(&'static str, SpecifyFn)>,
}

impl AggregateSchemaProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<A>(mut self) -> Self
    where
        A: Aggregate + SpecifiesSchema,
    {
        self.specifiers.push((type_name::<A>(), A::specify_schema));
        self
    }

    /// Type names of the aggregates, in registration order.
    pub fn aggregate_types(&self) -> Vec<&'static str> {
        self.specifiers.iter().map(|(name, _)| *name).collect()
    }

    /// Runs every aggregate's declaration against one fresh `Schema`.
    pub fn create_schema(&self) -> Result<Schema, SchemaError> {
        let mut schema = Schema::new();
        for (_, specify) in &self.specifiers {
            specify(&mut schema)?;
        }
        Ok(schema)
    }
}

impl std::fmt::Debug for AggregateSchemaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.aggregate_types()).finish()
    }
}
