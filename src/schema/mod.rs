//! Schemas, constructor policies and record errors
//!
//! # Design Principles
//!
//! - Schema keys are ordered; order drives output and validation order
//! - Unknown keys are dropped or rejected by policy, never kept
//! - Defaults fill missing keys only where the policy allows it
//! - Every failure is a typed `StructError` with a stable code

mod errors;
mod loader;
mod types;
mod validator;

pub use errors::{Failure, Severity, StructError, StructResult};
pub use loader::{
    AttributeDefinition, DefinitionFile, DefinitionLoader, TypeDefinition, UnionDefinition,
};
pub use types::{normalize_name, ConstructorPolicy, Schema, SchemaKey};
pub use validator::SchemaValidator;
