//! Constructor policy enforcement
//!
//! Validation order:
//! 1. Undeclared keys (rejected by strict policies, dropped otherwise)
//! 2. Declared keys in schema order: present values are validated, missing
//!    ones are defaulted, skipped or reported according to the policy
//!
//! The first violation aborts; the output map is only returned whole.

use super::errors::{StructError, StructResult};
use super::types::{ConstructorPolicy, Schema, SchemaKey};
use crate::value::{Attributes, Value};

/// Applies a schema under a constructor policy.
///
/// The validator borrows the schema snapshot it was created with and does
/// not mutate its input beyond consuming it.
pub struct SchemaValidator<'a> {
    schema: &'a Schema,
    policy: ConstructorPolicy,
}

impl<'a> SchemaValidator<'a> {
    pub fn new(schema: &'a Schema, policy: ConstructorPolicy) -> Self {
        Self { schema, policy }
    }

    /// Builds the full attribute map for a new record.
    ///
    /// # Errors
    ///
    /// - `UnexpectedFields` when a strict policy sees undeclared keys
    /// - `MissingField` when a key the policy requires is absent
    /// - `InvalidField` wrapping the field type's own failure
    pub fn apply(&self, mut input: Attributes) -> StructResult<Attributes> {
        self.check_unknown_keys(&input)?;

        let mut output = Attributes::with_capacity(self.schema.len());

        for key in self.schema.keys() {
            match input.swap_remove(&key.name) {
                Some(value) => {
                    output.insert(key.name.clone(), self.validate_present(key, value)?);
                }
                None => {
                    if let Some(value) = self.fill_missing(key)? {
                        output.insert(key.name.clone(), value);
                    }
                }
            }
        }

        Ok(output)
    }

    /// Validates only the keys present in `changes`.
    ///
    /// Used when evolving an existing record: missing keys keep their old
    /// values, so neither defaults nor missing-key checks apply.
    pub fn apply_changeset(&self, mut changes: Attributes) -> StructResult<Attributes> {
        self.check_unknown_keys(&changes)?;

        let mut output = Attributes::with_capacity(changes.len());
        for key in self.schema.keys() {
            if let Some(value) = changes.swap_remove(&key.name) {
                output.insert(key.name.clone(), self.validate_present(key, value)?);
            }
        }
        Ok(output)
    }

    fn check_unknown_keys(&self, input: &Attributes) -> StructResult<()> {
        if !self.policy.rejects_unknown_keys() {
            return Ok(());
        }

        let unexpected: Vec<String> = input
            .keys()
            .filter(|k| !self.schema.contains(k))
            .cloned()
            .collect();

        if unexpected.is_empty() {
            Ok(())
        } else {
            Err(StructError::UnexpectedFields { fields: unexpected })
        }
    }

    fn validate_present(&self, key: &SchemaKey, value: Value) -> StructResult<Value> {
        // Under the schema policy an explicit nil on a defaulted key counts as missing
        if value.is_nil() && self.policy == ConstructorPolicy::Schema {
            if let Some(default) = key.field_type.default_value() {
                return Ok(default);
            }
        }

        key.field_type
            .validate_or_coerce(value)
            .map_err(|e| e.in_field(&key.name))
    }

    fn fill_missing(&self, key: &SchemaKey) -> StructResult<Option<Value>> {
        if self.policy.fills_defaults() {
            if let Some(default) = key.field_type.default_value() {
                return Ok(Some(default));
            }
        }

        let must_be_present = match self.policy {
            ConstructorPolicy::Permissive => true,
            _ => key.required,
        };

        if must_be_present {
            Err(StructError::MissingField {
                field: key.name.clone(),
            })
        } else {
            Ok(None)
        }
    }
}
