//! Observable events of the record engine
//!
//! Events are explicit and typed; each maps to one stable string.

use std::fmt;

use super::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Definition
    /// A record type was created
    TypeDefined,
    /// Fields were declared on a record type
    AttributesDeclared,
    /// Declared fields were copied into existing subtypes
    AttributesPropagated,
    /// A nested record type was synthesized from an inline block
    NestedTypeSynthesized,

    // Construction
    /// A record type rejected its input
    ConstructionFailed,

    // Unions
    /// A scope was bound to its resolver
    UnionBound,
    /// A union computed a fresh candidate set for a new member snapshot
    UnionResolved,

    // AST
    /// An AST pointed at a record type that no longer exists
    RecycledTypeDetected,

    // Configuration
    /// Definition files were loaded
    DefinitionsLoaded,
    /// Engine configuration loaded
    ConfigLoaded,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::TypeDefined => "TYPE_DEFINED",
            Event::AttributesDeclared => "ATTRIBUTES_DECLARED",
            Event::AttributesPropagated => "ATTRIBUTES_PROPAGATED",
            Event::NestedTypeSynthesized => "NESTED_TYPE_SYNTHESIZED",
            Event::ConstructionFailed => "CONSTRUCTION_FAILED",
            Event::UnionBound => "UNION_BOUND",
            Event::UnionResolved => "UNION_RESOLVED",
            Event::RecycledTypeDetected => "RECYCLED_TYPE_DETECTED",
            Event::DefinitionsLoaded => "DEFINITIONS_LOADED",
            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::RecycledTypeDetected => Severity::Error,
            Event::ConstructionFailed | Event::UnionResolved | Event::AttributesPropagated => {
                Severity::Trace
            }
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
