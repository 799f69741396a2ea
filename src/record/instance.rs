//! Record instances
//!
//! A record is immutable. Evolving it produces a new record that shares
//! nothing mutable with the old one.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use super::record_type::RecordType;
use crate::schema::{StructError, StructResult};
use crate::value::{serialize_attributes, Attributes, Value};

struct RecordInner {
    record_type: RecordType,
    attributes: Attributes,
}

/// An immutable value built by a [`RecordType`].
///
/// Cloning is cheap and preserves identity: [`Record::ptr_eq`] holds for
/// clones, and record types return an instance of their own type unchanged.
#[derive(Clone)]
pub struct Record {
    inner: Arc<RecordInner>,
}

impl Record {
    pub(crate) fn new(record_type: RecordType, attributes: Attributes) -> Self {
        Self {
            inner: Arc::new(RecordInner {
                record_type,
                attributes,
            }),
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.inner.record_type
    }

    /// Stored attributes in schema order
    pub fn attributes(&self) -> &Attributes {
        &self.inner.attributes
    }

    /// Field accessor. `None` when the type declares no such field; a
    /// declared field that was omitted reads as `nil`.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        let accessor = self.inner.record_type.accessor(name)?;
        Some(accessor(&self.inner.attributes))
    }

    /// Like [`Record::attribute`] but undeclared names are an error
    pub fn get(&self, name: &str) -> StructResult<&Value> {
        self.attribute(name)
            .ok_or_else(|| StructError::MissingAttribute {
                attribute: name.to_string(),
                type_name: self.inner.record_type.display_name().to_string(),
            })
    }

    /// Recursive attribute map; nested records become maps
    pub fn to_h(&self) -> Attributes {
        self.inner
            .attributes
            .iter()
            .map(|(key, value)| (key.clone(), value.hashify()))
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// New record with the listed top-level fields replaced.
    ///
    /// The changeset is validated against the schema; nested records are
    /// replaced wholesale, never merged.
    pub fn evolve(&self, changeset: Attributes) -> StructResult<Record> {
        let record_type = &self.inner.record_type;
        let attributes = record_type.evolve_attributes(&self.inner.attributes, changeset)?;
        Ok(Record::new(record_type.clone(), attributes))
    }

    pub fn ptr_eq(&self, other: &Record) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether this record's type is `record_type` or one of its subtypes
    pub fn is_a(&self, record_type: &RecordType) -> bool {
        self.inner.record_type.is_subtype_of(record_type)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.inner.record_type.ptr_eq(&other.inner.record_type)
                && self.inner.attributes == other.inner.attributes)
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("type", &self.inner.record_type.display_name())
            .field("attributes", &self.inner.attributes)
            .finish()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<{}", self.inner.record_type.display_name())?;
        for (key, value) in &self.inner.attributes {
            write!(f, " {}={}", key, value)?;
        }
        write!(f, ">")
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serialize_attributes(&self.inner.attributes, serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;
    use serde_json::json;

    fn user_type() -> RecordType {
        let user = RecordType::define("User");
        user.attribute("name", types::string())
            .unwrap()
            .attribute("email?", types::string())
            .unwrap();
        user.nested_attribute("address", None, |address| {
            address.attribute("city", types::string())?;
            Ok(())
        })
        .unwrap();
        user
    }

    fn changes(json: serde_json::Value) -> Attributes {
        match Value::from(json) {
            Value::Map(map) => map,
            other => panic!("expected map, got {}", other),
        }
    }

    #[test]
    fn test_get_declared_and_undeclared() {
        let user = user_type();
        let record = user
            .call(json!({"name": "Jane", "address": {"city": "Oslo"}}))
            .unwrap();

        assert_eq!(record.get("name").unwrap(), &Value::from("Jane"));
        assert_eq!(record.get("email").unwrap(), &Value::Nil);

        let err = record.get("phone").unwrap_err();
        assert_eq!(err.code(), "AERO_STRUCT_MISSING_ATTRIBUTE");
        assert!(record.attribute("phone").is_none());
    }

    #[test]
    fn test_to_h_recurses_into_records() {
        let user = user_type();
        let record = user
            .call(json!({"name": "Jane", "address": {"city": "Oslo"}}))
            .unwrap();

        let hash = record.to_h();
        assert_eq!(
            Value::Map(hash),
            Value::from(json!({"name": "Jane", "address": {"city": "Oslo"}}))
        );
        assert!(record.attributes()["address"].as_record().is_some());
    }

    #[test]
    fn test_evolve_is_shallow() {
        let user = user_type();
        let record = user
            .call(json!({"name": "Jane", "address": {"city": "Oslo"}}))
            .unwrap();

        let moved = record
            .evolve(changes(json!({"address": {"city": "Bergen"}})))
            .unwrap();
        assert_eq!(moved.get("name").unwrap(), &Value::from("Jane"));
        assert_eq!(
            moved.to_json(),
            json!({"name": "Jane", "address": {"city": "Bergen"}})
        );
        assert_eq!(
            record.to_json(),
            json!({"name": "Jane", "address": {"city": "Oslo"}})
        );

        let err = record
            .evolve(changes(json!({"address": {"zip": "0150"}})))
            .unwrap_err();
        assert_eq!(err.code(), "AERO_STRUCT_CONSTRUCTION_FAILED");
    }

    #[test]
    fn test_evolve_keeps_schema_order() {
        let user = user_type();
        let record = user
            .call(json!({"name": "Jane", "address": {"city": "Oslo"}}))
            .unwrap();
        let with_email = record.evolve(changes(json!({"email": "j@x.io"}))).unwrap();

        let keys: Vec<_> = with_email.attributes().keys().cloned().collect();
        assert_eq!(keys, vec!["name", "email", "address"]);
    }

    #[test]
    fn test_equality_by_type_and_attributes() {
        let user = user_type();
        let a = user
            .call(json!({"name": "Jane", "address": {"city": "Oslo"}}))
            .unwrap();
        let b = user
            .call(json!({"name": "Jane", "address": {"city": "Oslo"}}))
            .unwrap();
        assert!(!a.ptr_eq(&b));
        assert_eq!(a, b);

        let other = RecordType::define("Other");
        other.attribute("name", types::string()).unwrap();
        let c = other.call(json!({"name": "Jane"})).unwrap();
        let d = user
            .call(json!({"name": "Jane", "address": {"city": "Oslo"}}))
            .unwrap();
        assert_ne!(c, d);
    }

    #[test]
    fn test_display() {
        let t = RecordType::define("Point");
        t.attributes(vec![("x", types::integer()), ("y", types::integer())])
            .unwrap();
        let p = t.call(json!({"x": 1, "y": 2})).unwrap();
        assert_eq!(p.to_string(), "#<Point x=1 y=2>");
    }
}
