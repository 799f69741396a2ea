//! Field types
//!
//! A field type validates or coerces one attribute value. Record types,
//! sum types and union scopes are field types too, which is how records
//! compose recursively.
//!
//! The built-in set in [`builtin`] is intentionally small: nominal
//! primitives in strict and coercible flavours plus a handful of
//! combinators. Anything implementing [`FieldType`] can be used in a schema.

pub mod builtin;

use std::fmt;
use std::sync::Arc;

pub use builtin::{
    any, array, array_of, boolean, coercible, constant, constrained, default, enumeration, float,
    format, hash, integer, lookup, nil, optional, string, time, Coercion, Primitive, Rule,
};

use crate::compiler::Ast;
use crate::record::RecordType;
use crate::schema::StructResult;
use crate::value::Value;

/// Shared handle to a field type
pub type FieldTypeRef = Arc<dyn FieldType>;

/// Contract every attribute type fulfils
pub trait FieldType: fmt::Debug + Send + Sync {
    /// Human-readable type name
    fn name(&self) -> String;

    /// Validate `value`, possibly converting it
    fn validate_or_coerce(&self, value: Value) -> StructResult<Value>;

    /// Structural description of this type
    fn to_ast(&self) -> Ast;

    /// Whether a default is available when the key is missing
    fn has_default(&self) -> bool {
        false
    }

    /// The default value, if any
    fn default_value(&self) -> Option<Value> {
        None
    }

    /// Whether `nil` is an accepted value
    fn is_optional(&self) -> bool {
        false
    }

    /// Member type when this is an array type
    fn is_array_of(&self) -> Option<FieldTypeRef> {
        None
    }

    /// Wrapped type when this is an optional type
    fn is_optional_of(&self) -> Option<FieldTypeRef> {
        None
    }

    /// The record type behind this field type, if it is one
    fn as_record_type(&self) -> Option<RecordType> {
        None
    }

    /// Containment check without coercion
    fn is_instance(&self, value: &Value) -> bool {
        match self.validate_or_coerce(value.clone()) {
            Ok(coerced) => &coerced == value,
            Err(_) => false,
        }
    }
}

/// Strips array and optional wrappers down to a record type, if one is there
pub fn unwrap_record_type(field_type: &FieldTypeRef) -> Option<RecordType> {
    if let Some(member) = field_type.is_array_of() {
        return unwrap_record_type(&member);
    }
    if let Some(inner) = field_type.is_optional_of() {
        return unwrap_record_type(&inner);
    }
    field_type.as_record_type()
}

/// Rebuilds the array/optional wrappers of `template` around `built`
pub fn rewrap(template: &FieldTypeRef, built: FieldTypeRef) -> FieldTypeRef {
    if let Some(member) = template.is_array_of() {
        return array_of(rewrap(&member, built));
    }
    if let Some(inner) = template.is_optional_of() {
        return optional(rewrap(&inner, built));
    }
    built
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrap_nested_wrappers() {
        let template = optional(array_of(any()));
        let rebuilt = rewrap(&template, integer());

        assert_eq!(rebuilt.name(), "optional<array<integer>>");
        let inner = rebuilt.is_optional_of().unwrap();
        assert_eq!(inner.is_array_of().unwrap().name(), "integer");
    }

    #[test]
    fn test_unwrap_record_type_none_for_primitives() {
        assert!(unwrap_record_type(&array_of(string())).is_none());
        assert!(unwrap_record_type(&optional(integer())).is_none());
    }

    #[test]
    fn test_default_is_instance_uses_coercion_result() {
        assert!(string().is_instance(&Value::from("x")));
        assert!(!string().is_instance(&Value::Int(1)));
    }
}
