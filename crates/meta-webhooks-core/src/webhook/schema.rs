//! JSON Schema gate applied before semantic decoding.

use crate::error::ValidationError;
use jsonschema::Validator;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tracing::debug;

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

const EMBEDDED_SCHEMA: &str = include_str!("../../schema/event.schema.json");

/// Compiled embedded schema, shared by every gate in the process.
static EMBEDDED_VALIDATOR: OnceLock<Arc<Validator>> = OnceLock::new();

/// Structural validator for event documents.
///
/// A gate without a compiled schema rejects every document with
/// [`ValidationError::MissingSchema`].
#[derive(Clone, Default)]
pub struct SchemaGate {
    validator: Option<Arc<Validator>>,
}

impl SchemaGate {
    /// Gate backed by the bundled event schema, compiled once per process.
    pub fn embedded() -> Result<Self, ValidationError> {
        if let Some(validator) = EMBEDDED_VALIDATOR.get() {
            return Ok(Self {
                validator: Some(Arc::clone(validator)),
            });
        }

        let schema: Value =
            serde_json::from_str(EMBEDDED_SCHEMA).map_err(|e| ValidationError::SchemaCompile {
                message: e.to_string(),
            })?;
        let compiled = Arc::new(compile(&schema)?);
        let validator = EMBEDDED_VALIDATOR.get_or_init(|| compiled);
        debug!("Compiled embedded event schema");

        Ok(Self {
            validator: Some(Arc::clone(validator)),
        })
    }

    /// Gate backed by a caller-supplied schema.
    pub fn from_schema(schema: &Value) -> Result<Self, ValidationError> {
        Ok(Self {
            validator: Some(Arc::new(compile(schema)?)),
        })
    }

    pub fn is_loaded(&self) -> bool {
        self.validator.is_some()
    }

    pub fn validate(&self, document: &Value) -> Result<(), ValidationError> {
        let validator = self
            .validator
            .as_ref()
            .ok_or(ValidationError::MissingSchema)?;

        if validator.is_valid(document) {
            return Ok(());
        }

        let errors = validator
            .iter_errors(document)
            .map(|error| error.to_string())
            .collect();
        Err(ValidationError::InvalidPayload { errors })
    }
}

fn compile(schema: &Value) -> Result<Validator, ValidationError> {
    Validator::new(schema).map_err(|e| ValidationError::SchemaCompile {
        message: e.to_string(),
    })
}

impl std::fmt::Debug for SchemaGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaGate")
            .field("loaded", &self.is_loaded())
            .finish()
    }
}
