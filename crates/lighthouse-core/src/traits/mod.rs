//! Core traits for the reconciler
//!
//! This module defines the seams between the reconciler and its collaborators.
//!
//! - [`RegistryClient`]: List claims and resolve their metadata
//! - [`NameValidator`]: Accept or reject claim names
//! - [`MetadataValidator`]: Accept or reject resolved metadata payloads
//! - [`StateStore`]: Load and save the reconciler snapshot

pub mod registry_client;
pub mod state_store;
pub mod validator;

pub use registry_client::RegistryClient;
pub use state_store::StateStore;
pub use validator::{MetadataValidator, NameValidator};
