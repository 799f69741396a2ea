//! Record types with an input preprocessing step

use std::fmt;
use std::sync::Arc;

use super::instance::Record;
use super::record_type::RecordType;
use crate::compiler::Ast;
use crate::schema::{Failure, StructResult};
use crate::types::{FieldType, FieldTypeRef};
use crate::value::Value;

/// Input rewrite run before the wrapped type sees the value
pub type InputFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// A record type whose input is passed through a function first.
///
/// The function runs on every input, including existing records, so it
/// decides itself what to leave untouched.
#[derive(Clone)]
pub struct Constructor {
    record_type: RecordType,
    func: InputFn,
}

impl Constructor {
    pub fn new<F>(record_type: RecordType, func: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Self {
            record_type,
            func: Arc::new(func),
        }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    pub fn call(&self, input: impl Into<Value>) -> StructResult<Record> {
        self.record_type.construct((self.func)(input.into()))
    }

    /// Non-raising form of [`Constructor::call`]; the failure carries the
    /// input as given, before the rewrite
    pub fn try_call(&self, input: impl Into<Value>) -> Result<Record, Failure> {
        let input = input.into();
        match self.call(input.clone()) {
            Ok(record) => Ok(record),
            Err(error) => Err(Failure::new(input, error)),
        }
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Constructor({})", self.record_type.display_name())
    }
}

impl FieldType for Constructor {
    fn name(&self) -> String {
        self.record_type.display_name().to_string()
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        self.call(value).map(Value::Record)
    }

    /// Functions have no structural form; the node describes the wrapped type
    fn to_ast(&self) -> Ast {
        self.record_type.to_ast()
    }

    fn as_record_type(&self) -> Option<RecordType> {
        Some(self.record_type.clone())
    }

    fn is_instance(&self, value: &Value) -> bool {
        self.record_type.is_instance(value)
    }
}

impl From<Constructor> for FieldTypeRef {
    fn from(constructor: Constructor) -> Self {
        Arc::new(constructor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;
    use serde_json::json;

    fn point() -> RecordType {
        let point = RecordType::define("Point");
        point.attribute("x", types::integer()).unwrap();
        point.attribute("y", types::integer()).unwrap();
        point
    }

    /// `[x, y]` pairs become `{x, y}` maps; anything else passes through
    fn from_pair(input: Value) -> Value {
        match input {
            Value::Array(items) if items.len() == 2 => {
                let mut map = crate::value::Attributes::new();
                map.insert("x".into(), items[0].clone());
                map.insert("y".into(), items[1].clone());
                Value::Map(map)
            }
            other => other,
        }
    }

    #[test]
    fn test_input_is_rewritten_before_construction() {
        let point = point();
        let pair = point.constructor(from_pair);

        let record = pair.call(json!([1, 2])).unwrap();
        assert!(record.record_type().ptr_eq(&point));
        assert_eq!(record.get("y").unwrap(), &Value::Int(2));

        let record = pair.call(json!({"x": 3, "y": 4})).unwrap();
        assert_eq!(record.get("x").unwrap(), &Value::Int(3));
    }

    #[test]
    fn test_failure_keeps_original_input() {
        let pair = point().constructor(from_pair);
        let failure = pair.try_call(json!([1])).unwrap_err();

        assert_eq!(failure.input, Value::from(json!([1])));
        assert_eq!(failure.error.code(), "AERO_STRUCT_CONSTRUCTION_FAILED");
    }

    #[test]
    fn test_usable_as_attribute_type() {
        let point = point();
        let segment = RecordType::define("Segment");
        segment
            .attribute("from", point.constructor(from_pair).into())
            .unwrap();
        segment
            .attribute("to", point.constructor(from_pair).into())
            .unwrap();

        let record = segment
            .call(json!({"from": [0, 0], "to": {"x": 5, "y": 5}}))
            .unwrap();
        let to = record.get("to").unwrap().as_record().unwrap();
        assert!(to.record_type().ptr_eq(&point));

        let field = segment.schema().get("from").unwrap().field_type.clone();
        assert_eq!(field.name(), "Point");
        assert!(field.as_record_type().unwrap().ptr_eq(&point));
        assert_eq!(field.to_ast(), point.to_ast());
    }
}
