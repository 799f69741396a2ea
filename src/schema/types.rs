//! Schema type definitions
//!
//! A schema is an ordered map of keys. Order is significant: it drives
//! attribute output order and the order in which fields are validated.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compiler::Ast;
use crate::types::FieldTypeRef;

/// Strictness rules applied when building a record from an input map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstructorPolicy {
    /// Every declared key must be present unless it has a default.
    /// Unknown keys are dropped.
    Permissive,
    /// Missing keys take defaults, omittable keys may be absent.
    /// Unknown keys are dropped.
    #[default]
    Schema,
    /// Unknown keys are rejected and defaults are never substituted.
    Strict,
    /// Unknown keys are rejected and missing keys take defaults.
    StrictWithDefaults,
}

impl ConstructorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructorPolicy::Permissive => "permissive",
            ConstructorPolicy::Schema => "schema",
            ConstructorPolicy::Strict => "strict",
            ConstructorPolicy::StrictWithDefaults => "strict_with_defaults",
        }
    }

    /// Whether keys the schema does not declare fail construction
    pub fn rejects_unknown_keys(&self) -> bool {
        matches!(
            self,
            ConstructorPolicy::Strict | ConstructorPolicy::StrictWithDefaults
        )
    }

    /// Whether a missing key may be filled from the field's default
    pub fn fills_defaults(&self) -> bool {
        !matches!(self, ConstructorPolicy::Strict)
    }
}

impl fmt::Display for ConstructorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One schema entry
#[derive(Debug, Clone)]
pub struct SchemaKey {
    /// Attribute name, without any `?` suffix
    pub name: String,
    /// Whether the key must be present in input
    pub required: bool,
    pub field_type: FieldTypeRef,
}

impl SchemaKey {
    pub fn new(name: impl Into<String>, required: bool, field_type: FieldTypeRef) -> Self {
        Self {
            name: name.into(),
            required,
            field_type,
        }
    }

    /// Build a key from a possibly `?`-suffixed name
    pub fn parse(name: &str, field_type: FieldTypeRef) -> Self {
        let (name, required) = normalize_name(name);
        Self::new(name, required, field_type)
    }

    pub fn to_ast(&self) -> Ast {
        Ast::Key {
            name: self.name.clone(),
            required: self.required,
            field_type: Box::new(self.field_type.to_ast()),
        }
    }
}

/// Splits a trailing `?` off a declared name.
///
/// Returns the bare name and whether the key is required.
pub fn normalize_name(name: &str) -> (&str, bool) {
    match name.strip_suffix('?') {
        Some(bare) => (bare, false),
        None => (name, true),
    }
}

/// Ordered field name to key mapping
#[derive(Debug, Clone, Default)]
pub struct Schema {
    keys: IndexMap<String, SchemaKey>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a key. A replaced key keeps its position.
    pub fn insert(&mut self, key: SchemaKey) {
        self.keys.insert(key.name.clone(), key);
    }

    pub fn get(&self, name: &str) -> Option<&SchemaKey> {
        self.keys.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keys.contains_key(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SchemaKey> {
        self.keys.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn to_ast(&self, policy: ConstructorPolicy) -> Ast {
        Ast::Schema {
            keys: self.keys().map(SchemaKey::to_ast).collect(),
            policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("bar?"), ("bar", false));
        assert_eq!(normalize_name("foo"), ("foo", true));
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut schema = Schema::new();
        schema.insert(SchemaKey::parse("name", types::string()));
        schema.insert(SchemaKey::parse("age", types::integer()));
        schema.insert(SchemaKey::parse("email?", types::string()));

        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["name", "age", "email"]);
        assert!(!schema.get("email").unwrap().required);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut schema = Schema::new();
        schema.insert(SchemaKey::parse("a", types::string()));
        schema.insert(SchemaKey::parse("b", types::string()));
        schema.insert(SchemaKey::parse("a", types::integer()));

        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(schema.get("a").unwrap().field_type.name(), "integer");
    }

    #[test]
    fn test_policy_flags() {
        assert!(!ConstructorPolicy::Schema.rejects_unknown_keys());
        assert!(ConstructorPolicy::Strict.rejects_unknown_keys());
        assert!(!ConstructorPolicy::Strict.fills_defaults());
        assert!(ConstructorPolicy::StrictWithDefaults.fills_defaults());
        assert_eq!(ConstructorPolicy::default(), ConstructorPolicy::Schema);
    }

    #[test]
    fn test_policy_serde_names() {
        let policy: ConstructorPolicy = serde_json::from_str("\"strict_with_defaults\"").unwrap();
        assert_eq!(policy, ConstructorPolicy::StrictWithDefaults);
        assert_eq!(policy.to_string(), "strict_with_defaults");
    }
}
