// # Lighthouse Metadata Validators
//
// Default implementations of the reconciler's validation traits:
//
// - `UriNameValidator`: claim names usable in `lbry://` URIs
// - `SchemaValidator`: the published-content metadata schema
//
// Both are pure functions of their input; no I/O, no state.

mod name;
mod schema;

pub use name::UriNameValidator;
pub use schema::{KNOWN_VERSIONS, REQUIRED_FIELDS, SchemaValidator};
