//! Sum types
//!
//! `A | B` dispatches in two phases. A record that already is an `A` or a
//! `B` (or a subtype of either) passes through untouched. Anything else is
//! built as `A`, falling back to `B`; when both fail the error from `B` is
//! reported.

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use crate::compiler::Ast;
use crate::record::{Record, RecordType};
use crate::schema::{Failure, StructResult};
use crate::types::{FieldType, FieldTypeRef};
use crate::value::Value;

/// One side of a sum
#[derive(Clone)]
pub enum Branch {
    Record(RecordType),
    Sum(SumType),
}

impl Branch {
    fn call(&self, input: Value) -> StructResult<Record> {
        match self {
            Branch::Record(t) => t.construct(input),
            Branch::Sum(s) => s.dispatch(input),
        }
    }

    fn is_instance(&self, value: &Value) -> bool {
        match self {
            Branch::Record(t) => matches!(value, Value::Record(r) if r.is_a(t)),
            Branch::Sum(s) => s.is_instance(value),
        }
    }

    fn collect_types(&self, out: &mut Vec<RecordType>) {
        match self {
            Branch::Record(t) => out.push(t.clone()),
            Branch::Sum(s) => {
                s.node.left.collect_types(out);
                s.node.right.collect_types(out);
            }
        }
    }

    fn name(&self) -> String {
        match self {
            Branch::Record(t) => t.display_name().to_string(),
            Branch::Sum(s) => s.name(),
        }
    }

    fn to_ast(&self) -> Ast {
        match self {
            Branch::Record(t) => t.to_ast(),
            Branch::Sum(s) => s.to_ast(),
        }
    }
}

impl From<RecordType> for Branch {
    fn from(record_type: RecordType) -> Self {
        Branch::Record(record_type)
    }
}

impl From<SumType> for Branch {
    fn from(sum: SumType) -> Self {
        Branch::Sum(sum)
    }
}

struct SumNode {
    left: Branch,
    right: Branch,
}

/// Ordered binary choice between record types
#[derive(Clone)]
pub struct SumType {
    node: Arc<SumNode>,
}

impl SumType {
    pub fn new(left: impl Into<Branch>, right: impl Into<Branch>) -> Self {
        Self {
            node: Arc::new(SumNode {
                left: left.into(),
                right: right.into(),
            }),
        }
    }

    pub fn left(&self) -> &Branch {
        &self.node.left
    }

    pub fn right(&self) -> &Branch {
        &self.node.right
    }

    /// Append `other` as the lowest-priority alternative
    pub fn or(&self, other: impl Into<Branch>) -> SumType {
        SumType::new(self.clone(), other)
    }

    pub fn call(&self, input: impl Into<Value>) -> StructResult<Record> {
        self.dispatch(input.into())
    }

    pub fn try_call(&self, input: impl Into<Value>) -> Result<Record, Failure> {
        let input = input.into();
        match self.dispatch(input.clone()) {
            Ok(record) => Ok(record),
            Err(error) => Err(Failure::new(input, error)),
        }
    }

    pub(crate) fn dispatch(&self, input: Value) -> StructResult<Record> {
        if let Value::Record(record) = &input {
            if self.is_instance(&input) {
                return Ok(record.clone());
            }
        }

        match self.node.left.call(input.clone()) {
            Ok(record) => Ok(record),
            Err(_) => self.node.right.call(input),
        }
    }

    /// Containment without coercion
    pub fn is_instance(&self, value: &Value) -> bool {
        self.node.left.is_instance(value) || self.node.right.is_instance(value)
    }

    /// Member record types in dispatch order
    pub fn types(&self) -> Vec<RecordType> {
        let mut out = Vec::new();
        self.node.left.collect_types(&mut out);
        self.node.right.collect_types(&mut out);
        out
    }

    pub fn name(&self) -> String {
        format!("{} | {}", self.node.left.name(), self.node.right.name())
    }

    pub fn to_ast(&self) -> Ast {
        Ast::Sum(
            Box::new(self.node.left.to_ast()),
            Box::new(self.node.right.to_ast()),
        )
    }
}

impl fmt::Debug for SumType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SumType({})", self.name())
    }
}

impl FieldType for SumType {
    fn name(&self) -> String {
        SumType::name(self)
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        self.dispatch(value).map(Value::Record)
    }

    fn to_ast(&self) -> Ast {
        SumType::to_ast(self)
    }

    fn is_instance(&self, value: &Value) -> bool {
        SumType::is_instance(self, value)
    }
}

impl From<SumType> for FieldTypeRef {
    fn from(sum: SumType) -> Self {
        Arc::new(sum)
    }
}

impl BitOr<RecordType> for RecordType {
    type Output = SumType;

    fn bitor(self, rhs: RecordType) -> SumType {
        SumType::new(self, rhs)
    }
}

impl BitOr<SumType> for RecordType {
    type Output = SumType;

    fn bitor(self, rhs: SumType) -> SumType {
        SumType::new(self, rhs)
    }
}

impl BitOr<RecordType> for SumType {
    type Output = SumType;

    fn bitor(self, rhs: RecordType) -> SumType {
        SumType::new(self, rhs)
    }
}

impl BitOr<SumType> for SumType {
    type Output = SumType;

    fn bitor(self, rhs: SumType) -> SumType {
        SumType::new(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ConstructorPolicy;
    use crate::types;
    use serde_json::json;

    fn shapes() -> (RecordType, RecordType, RecordType) {
        let circle = RecordType::define("Circle").with_policy(ConstructorPolicy::Strict);
        circle.attribute("radius", types::float()).unwrap();

        let square = RecordType::define("Square").with_policy(ConstructorPolicy::Strict);
        square.attribute("side", types::float()).unwrap();

        let label = RecordType::define("Label");
        label.attribute("text?", types::string()).unwrap();

        (circle, square, label)
    }

    #[test]
    fn test_left_biased_coercion() {
        let (circle, square, _) = shapes();
        let shape = circle.clone() | square.clone();

        let c = shape.call(json!({"radius": 1.5})).unwrap();
        assert!(c.record_type().ptr_eq(&circle));

        let s = shape.call(json!({"side": 2})).unwrap();
        assert!(s.record_type().ptr_eq(&square));
    }

    #[test]
    fn test_identity_beats_coercion() {
        let (circle, _, label) = shapes();
        let sum = label.clone() | circle.clone();

        // A Circle would also build as a Label after rematerialization
        let existing = circle.call(json!({"radius": 3.0})).unwrap();
        let out = sum.call(existing.clone()).unwrap();
        assert!(out.ptr_eq(&existing));
    }

    #[test]
    fn test_subtype_instance_passes_through() {
        let (circle, square, _) = shapes();
        let big = circle.subtype("BigCircle");
        let record = big.call(json!({"radius": 100.0})).unwrap();

        let sum = square | circle;
        assert!(sum.call(record.clone()).unwrap().ptr_eq(&record));
    }

    #[test]
    fn test_right_error_surfaces() {
        let (circle, square, _) = shapes();
        let sum = circle | square;
        let err = sum.call(json!({"edge": 1})).unwrap_err();
        assert!(err.to_string().starts_with("[Square.new]"));

        let failure = sum.try_call(json!({"edge": 1})).unwrap_err();
        assert_eq!(failure.input, Value::from(json!({"edge": 1})));
    }

    #[test]
    fn test_bitor_nests_on_the_right() {
        let (circle, square, label) = shapes();
        let sum = circle.clone() | square.clone() | label.clone();

        assert!(matches!(sum.right(), Branch::Record(t) if t.ptr_eq(&label)));
        let names: Vec<_> = sum.types().iter().map(|t| t.display_name().to_string()).collect();
        assert_eq!(names, vec!["Circle", "Square", "Label"]);
        assert_eq!(sum.name(), "Circle | Square | Label");
    }

    #[test]
    fn test_containment() {
        let (circle, square, label) = shapes();
        let sum = circle.clone() | square;
        let c = circle.call(json!({"radius": 1.0})).unwrap();
        let l = label.call(json!({})).unwrap();

        assert!(sum.is_instance(&Value::Record(c)));
        assert!(!sum.is_instance(&Value::Record(l)));
        assert!(!sum.is_instance(&Value::from(json!({"radius": 1.0}))));
    }

    #[test]
    fn test_sum_as_field_type() {
        let (circle, square, _) = shapes();
        let drawing = RecordType::define("Drawing");
        drawing
            .attribute("shapes", types::array_of((circle | square).into()))
            .unwrap();

        let d = drawing
            .call(json!({"shapes": [{"radius": 1.0}, {"side": 2.0}]}))
            .unwrap();
        let shapes = d.get("shapes").unwrap().as_array().unwrap();
        assert_eq!(shapes[1].as_record().unwrap().record_type().display_name(), "Square");
    }
}
