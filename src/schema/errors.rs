//! Record construction error types
//!
//! Error codes:
//! - AERO_STRUCT_DUPLICATE_FIELD (FATAL)
//! - AERO_STRUCT_MISSING_FIELD (REJECT)
//! - AERO_STRUCT_UNEXPECTED_FIELDS (REJECT)
//! - AERO_STRUCT_INVALID_TYPE (REJECT)
//! - AERO_STRUCT_CONSTRAINT_VIOLATION (REJECT)
//! - AERO_STRUCT_INVALID_FIELD (REJECT)
//! - AERO_STRUCT_CONSTRUCTION_FAILED (REJECT)
//! - AERO_STRUCT_MISSING_ATTRIBUTE (REJECT)
//! - AERO_STRUCT_NAME_COLLISION (FATAL)
//! - AERO_STRUCT_CANDIDATE_NOT_FOUND (FATAL)
//! - AERO_STRUCT_NO_CANDIDATES (REJECT)
//! - AERO_STRUCT_RECYCLED_TYPE (FATAL)
//! - AERO_STRUCT_MALFORMED_AST (FATAL)
//! - AERO_STRUCT_UNKNOWN_TYPE (FATAL)
//! - AERO_STRUCT_BINDING (FATAL)
//! - AERO_STRUCT_INVALID_DEFINITION (FATAL)

use std::fmt;

use thiserror::Error;

use crate::value::Value;

/// Severity levels for record errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Input rejected; the definitions are fine
    Reject,
    /// Definition or usage bug; retrying with other input cannot succeed
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Error type shared by every subsystem of the crate.
///
/// Field-level failures raised while building a record are wrapped first in
/// [`StructError::InvalidField`] (naming the key) and then in
/// [`StructError::Construction`] (naming the record type), so callers see a
/// single construction error with the cause chain preserved.
#[derive(Debug, Error)]
pub enum StructError {
    /// A field was declared twice at the same inheritance level
    #[error("attribute '{field}' has already been defined on {type_name}")]
    DuplicateField { type_name: String, field: String },

    /// A required key was absent and no default applied
    #[error("{field} is missing in input")]
    MissingField { field: String },

    /// Keys not declared by the schema were supplied to a strict type
    #[error("unexpected keys [{}] in input", .fields.join(", "))]
    UnexpectedFields { fields: Vec<String> },

    /// A value could not be coerced to the expected type
    #[error("{value} ({actual}) has invalid type, expected {expected}")]
    InvalidType {
        value: String,
        actual: &'static str,
        expected: String,
    },

    /// A value was well-typed but violated a constraint
    #[error("{value} violates {rule}")]
    ConstraintViolation { value: String, rule: String },

    /// Failure of a single field, with the key for context
    #[error("invalid value for {field}: {source}")]
    InvalidField {
        field: String,
        #[source]
        source: Box<StructError>,
    },

    /// Aggregate failure of a record type's constructor
    #[error("[{type_name}.new] {source}")]
    Construction {
        type_name: String,
        #[source]
        source: Box<StructError>,
    },

    /// An undeclared name was read off a record
    #[error("missing attribute: {attribute} on {type_name}")]
    MissingAttribute { attribute: String, type_name: String },

    /// A nested type or scope member would shadow an existing one
    #[error("can't create nested attribute - `{qualified_name}` already defined")]
    NameCollision { qualified_name: String },

    /// A union names a candidate its scope does not hold
    #[error("candidate [{name}] not defined in [{scope}]")]
    CandidateNotFound { name: String, scope: String },

    /// A union resolved to no instantiable candidate
    #[error("no constructors found in [{scope}]")]
    NoCandidates { scope: String },

    /// An AST outlived the type it references
    #[error("reference to {name} was reclaimed")]
    RecycledType { name: String },

    /// The AST is well-formed data but cannot be compiled
    #[error("malformed AST: {reason}")]
    MalformedAst { reason: String },

    /// A field type name is not registered
    #[error("unknown field type '{name}'")]
    UnknownType { name: String },

    /// A scope was bound twice or used before binding
    #[error("scope [{scope}] {reason}")]
    Binding { scope: String, reason: String },

    /// A type, union or configuration definition is unusable
    #[error("invalid definition '{origin}': {reason}")]
    InvalidDefinition { origin: String, reason: String },
}

impl StructError {
    /// Create a type mismatch error for `value`
    pub fn invalid_type(value: &Value, expected: impl Into<String>) -> Self {
        StructError::InvalidType {
            value: value.to_string(),
            actual: value.type_name(),
            expected: expected.into(),
        }
    }

    /// Create a constraint violation error for `value`
    pub fn constraint(value: &Value, rule: impl Into<String>) -> Self {
        StructError::ConstraintViolation {
            value: value.to_string(),
            rule: rule.into(),
        }
    }

    /// Wrap an error with the key it was raised for
    pub fn in_field(self, field: impl Into<String>) -> Self {
        StructError::InvalidField {
            field: field.into(),
            source: Box::new(self),
        }
    }

    /// Wrap an error as the failure of `type_name`'s constructor
    pub fn in_construction(self, type_name: impl Into<String>) -> Self {
        StructError::Construction {
            type_name: type_name.into(),
            source: Box::new(self),
        }
    }

    /// Create an invalid definition error
    pub fn invalid_definition(origin: impl Into<String>, reason: impl Into<String>) -> Self {
        StructError::InvalidDefinition {
            origin: origin.into(),
            reason: reason.into(),
        }
    }

    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StructError::DuplicateField { .. } => "AERO_STRUCT_DUPLICATE_FIELD",
            StructError::MissingField { .. } => "AERO_STRUCT_MISSING_FIELD",
            StructError::UnexpectedFields { .. } => "AERO_STRUCT_UNEXPECTED_FIELDS",
            StructError::InvalidType { .. } => "AERO_STRUCT_INVALID_TYPE",
            StructError::ConstraintViolation { .. } => "AERO_STRUCT_CONSTRAINT_VIOLATION",
            StructError::InvalidField { .. } => "AERO_STRUCT_INVALID_FIELD",
            StructError::Construction { .. } => "AERO_STRUCT_CONSTRUCTION_FAILED",
            StructError::MissingAttribute { .. } => "AERO_STRUCT_MISSING_ATTRIBUTE",
            StructError::NameCollision { .. } => "AERO_STRUCT_NAME_COLLISION",
            StructError::CandidateNotFound { .. } => "AERO_STRUCT_CANDIDATE_NOT_FOUND",
            StructError::NoCandidates { .. } => "AERO_STRUCT_NO_CANDIDATES",
            StructError::RecycledType { .. } => "AERO_STRUCT_RECYCLED_TYPE",
            StructError::MalformedAst { .. } => "AERO_STRUCT_MALFORMED_AST",
            StructError::UnknownType { .. } => "AERO_STRUCT_UNKNOWN_TYPE",
            StructError::Binding { .. } => "AERO_STRUCT_BINDING",
            StructError::InvalidDefinition { .. } => "AERO_STRUCT_INVALID_DEFINITION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StructError::DuplicateField { .. }
            | StructError::NameCollision { .. }
            | StructError::CandidateNotFound { .. }
            | StructError::RecycledType { .. }
            | StructError::MalformedAst { .. }
            | StructError::UnknownType { .. }
            | StructError::Binding { .. }
            | StructError::InvalidDefinition { .. } => Severity::Fatal,
            StructError::InvalidField { source, .. } | StructError::Construction { source, .. } => {
                source.severity()
            }
            _ => Severity::Reject,
        }
    }

    /// Follows field and construction wrappers down to the original failure
    pub fn root_cause(&self) -> &StructError {
        match self {
            StructError::InvalidField { source, .. } | StructError::Construction { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

/// Result type for record operations
pub type StructResult<T> = Result<T, StructError>;

/// Failure payload of the non-raising `try_call` entry points.
///
/// Carries the input exactly as it was handed over, so callers can retry or
/// report without keeping their own copy.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Failure {
    /// The rejected input
    pub input: Value,
    /// Why it was rejected
    #[source]
    pub error: StructError,
}

impl Failure {
    pub fn new(input: Value, error: StructError) -> Self {
        Self { input, error }
    }

    /// Discards the input and keeps the error
    pub fn into_error(self) -> StructError {
        self.error
    }
}
