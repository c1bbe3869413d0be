//! Validator traits
//!
//! Validation rules are external to the reconciler. Both traits return typed
//! rejections so an expected "this claim is bad" outcome never looks like an
//! unexpected failure.

use crate::error::{InvalidNameError, SchemaError};
use crate::model::ValidatedMetadata;

/// Checks that a claim name only uses characters the URI scheme accepts
pub trait NameValidator: Send + Sync {
    fn validate_name(&self, name: &str) -> Result<(), InvalidNameError>;
}

/// Checks a resolved metadata payload against the metadata schema
pub trait MetadataValidator: Send + Sync {
    /// Validate `payload`
    ///
    /// # Returns
    ///
    /// - `Ok(ValidatedMetadata)`: The accepted (possibly normalized) fields
    /// - `Err(SchemaError)`: The payload does not conform
    fn validate(&self, payload: &serde_json::Value) -> Result<ValidatedMetadata, SchemaError>;
}
