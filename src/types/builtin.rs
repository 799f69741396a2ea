//! Built-in field types
//!
//! Nominal primitives come in two flavours. Strict types accept only the
//! matching value variant (floats also accept integers). Coercible types
//! additionally convert from the obvious textual or numeric forms.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;

use super::{FieldType, FieldTypeRef};
use crate::compiler::Ast;
use crate::schema::{StructError, StructResult};
use crate::value::Value;

/// Primitive value kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Any,
    Nil,
    String,
    Integer,
    Float,
    Bool,
    Time,
    Hash,
    Array,
}

impl Primitive {
    pub fn as_str(&self) -> &'static str {
        match self {
            Primitive::Any => "any",
            Primitive::Nil => "nil",
            Primitive::String => "string",
            Primitive::Integer => "integer",
            Primitive::Float => "float",
            Primitive::Bool => "bool",
            Primitive::Time => "time",
            Primitive::Hash => "hash",
            Primitive::Array => "array",
        }
    }

    pub fn from_name(name: &str) -> Option<Primitive> {
        match name {
            "any" => Some(Primitive::Any),
            "nil" => Some(Primitive::Nil),
            "string" => Some(Primitive::String),
            "integer" => Some(Primitive::Integer),
            "float" => Some(Primitive::Float),
            "bool" => Some(Primitive::Bool),
            "time" => Some(Primitive::Time),
            "hash" => Some(Primitive::Hash),
            "array" => Some(Primitive::Array),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Strict,
    Coercible,
}

/// A primitive type, strict or coercible
#[derive(Debug, Clone, Copy)]
pub struct Nominal {
    primitive: Primitive,
    coercion: Coercion,
}

impl Nominal {
    fn check(&self, value: Value) -> StructResult<Value> {
        let ok = match (&self.primitive, &value) {
            (Primitive::Any, _) => true,
            (Primitive::Nil, Value::Nil) => true,
            (Primitive::String, Value::Str(_)) => true,
            (Primitive::Integer, Value::Int(_)) => true,
            (Primitive::Float, Value::Float(_)) => true,
            (Primitive::Float, Value::Int(i)) => return Ok(Value::Float(*i as f64)),
            (Primitive::Bool, Value::Bool(_)) => true,
            (Primitive::Time, Value::Time(_)) => true,
            (Primitive::Hash, Value::Map(_)) => true,
            (Primitive::Array, Value::Array(_)) => true,
            _ => false,
        };
        if ok {
            Ok(value)
        } else {
            Err(StructError::invalid_type(&value, self.name()))
        }
    }

    fn coerce(&self, value: Value) -> StructResult<Value> {
        let coerced = match (&self.primitive, &value) {
            (Primitive::String, Value::Int(i)) => Some(Value::Str(i.to_string())),
            (Primitive::String, Value::Float(x)) => Some(Value::Str(x.to_string())),
            (Primitive::String, Value::Bool(b)) => Some(Value::Str(b.to_string())),
            (Primitive::String, Value::Time(t)) => Some(Value::Str(
                t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            )),
            (Primitive::Integer, Value::Float(x)) if x.is_finite() => {
                Some(Value::Int(x.trunc() as i64))
            }
            (Primitive::Integer, Value::Str(s)) => parse_integer(s).map(Value::Int),
            (Primitive::Float, Value::Str(s)) => s.trim().parse::<f64>().ok().map(Value::Float),
            (Primitive::Bool, Value::Str(s)) => match s.trim() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (Primitive::Bool, Value::Int(1)) => Some(Value::Bool(true)),
            (Primitive::Bool, Value::Int(0)) => Some(Value::Bool(false)),
            (Primitive::Time, Value::Str(s)) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|t| Value::Time(t.with_timezone(&Utc))),
            (Primitive::Time, Value::Int(secs)) => {
                DateTime::from_timestamp(*secs, 0).map(Value::Time)
            }
            (Primitive::Hash, Value::Record(record)) => Some(Value::Map(record.to_h())),
            _ => None,
        };
        match coerced {
            Some(value) => Ok(value),
            None => self.check(value),
        }
    }
}

fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .map(|x| x.trunc() as i64)
    })
}

impl FieldType for Nominal {
    fn name(&self) -> String {
        match self.coercion {
            Coercion::Strict => self.primitive.as_str().to_string(),
            Coercion::Coercible => format!("coercible.{}", self.primitive.as_str()),
        }
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        match self.coercion {
            Coercion::Strict => self.check(value),
            Coercion::Coercible => self.coerce(value),
        }
    }

    fn to_ast(&self) -> Ast {
        Ast::Nominal { name: self.name() }
    }

    fn is_optional(&self) -> bool {
        matches!(self.primitive, Primitive::Any | Primitive::Nil)
    }

    fn is_array_of(&self) -> Option<FieldTypeRef> {
        match self.primitive {
            Primitive::Array => Some(any()),
            _ => None,
        }
    }

    fn is_instance(&self, value: &Value) -> bool {
        match (&self.primitive, value) {
            (Primitive::Float, Value::Int(_)) => false,
            _ => self.check(value.clone()).is_ok(),
        }
    }
}

/// Homogeneous array
#[derive(Debug)]
pub struct ArrayOf {
    member: FieldTypeRef,
}

impl FieldType for ArrayOf {
    fn name(&self) -> String {
        format!("array<{}>", self.member.name())
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    self.member
                        .validate_or_coerce(item)
                        .map_err(|e| e.in_field(format!("[{}]", i)))
                })
                .collect::<StructResult<Vec<_>>>()
                .map(Value::Array),
            other => Err(StructError::invalid_type(&other, self.name())),
        }
    }

    fn to_ast(&self) -> Ast {
        Ast::Array(Box::new(self.member.to_ast()))
    }

    fn is_array_of(&self) -> Option<FieldTypeRef> {
        Some(Arc::clone(&self.member))
    }

    fn is_instance(&self, value: &Value) -> bool {
        match value {
            Value::Array(items) => items.iter().all(|item| self.member.is_instance(item)),
            _ => false,
        }
    }
}

/// Accepts `nil` in addition to the wrapped type
#[derive(Debug)]
pub struct Optional {
    inner: FieldTypeRef,
}

impl FieldType for Optional {
    fn name(&self) -> String {
        format!("optional<{}>", self.inner.name())
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        match value {
            Value::Nil => Ok(Value::Nil),
            other => self.inner.validate_or_coerce(other),
        }
    }

    fn to_ast(&self) -> Ast {
        Ast::Optional(Box::new(self.inner.to_ast()))
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn is_optional_of(&self) -> Option<FieldTypeRef> {
        Some(Arc::clone(&self.inner))
    }

    fn is_instance(&self, value: &Value) -> bool {
        value.is_nil() || self.inner.is_instance(value)
    }
}

/// Supplies a value when the key is missing
#[derive(Debug)]
pub struct WithDefault {
    inner: FieldTypeRef,
    value: Value,
}

impl FieldType for WithDefault {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        self.inner.validate_or_coerce(value)
    }

    fn to_ast(&self) -> Ast {
        Ast::Default {
            inner: Box::new(self.inner.to_ast()),
            value: self.value.clone(),
        }
    }

    fn has_default(&self) -> bool {
        true
    }

    fn default_value(&self) -> Option<Value> {
        Some(self.value.clone())
    }

    fn is_optional(&self) -> bool {
        self.inner.is_optional()
    }

    fn is_instance(&self, value: &Value) -> bool {
        self.inner.is_instance(value)
    }
}

/// Accepts exactly one value
#[derive(Debug)]
pub struct Constant {
    value: Value,
}

impl FieldType for Constant {
    fn name(&self) -> String {
        format!("constant({})", self.value)
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        if value == self.value {
            Ok(value)
        } else {
            Err(StructError::constraint(&value, format!("eql?({})", self.value)))
        }
    }

    fn to_ast(&self) -> Ast {
        Ast::Constant(self.value.clone())
    }
}

/// Restricts the wrapped type to a fixed set of values
#[derive(Debug)]
pub struct Enumeration {
    inner: FieldTypeRef,
    values: Vec<Value>,
}

impl FieldType for Enumeration {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        let value = self.inner.validate_or_coerce(value)?;
        if self.values.contains(&value) {
            Ok(value)
        } else {
            Err(StructError::constraint(
                &value,
                format!("included_in?({})", Value::Array(self.values.clone())),
            ))
        }
    }

    fn to_ast(&self) -> Ast {
        Ast::Enum {
            inner: Box::new(self.inner.to_ast()),
            values: self.values.clone(),
        }
    }
}

/// Single-value predicate applied after the wrapped type
#[derive(Debug, Clone)]
pub enum Rule {
    Format(Regex),
    MinSize(usize),
    MaxSize(usize),
    Gteq(f64),
    Lteq(f64),
}

impl Rule {
    fn holds(&self, value: &Value) -> bool {
        match self {
            Rule::Format(re) => value.as_str().map_or(false, |s| re.is_match(s)),
            Rule::MinSize(min) => value.size().map_or(false, |n| n >= *min),
            Rule::MaxSize(max) => value.size().map_or(false, |n| n <= *max),
            Rule::Gteq(bound) => value.as_float().map_or(false, |x| x >= *bound),
            Rule::Lteq(bound) => value.as_float().map_or(false, |x| x <= *bound),
        }
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Rule::Format(a), Rule::Format(b)) => a.as_str() == b.as_str(),
            (Rule::MinSize(a), Rule::MinSize(b)) | (Rule::MaxSize(a), Rule::MaxSize(b)) => a == b,
            (Rule::Gteq(a), Rule::Gteq(b)) | (Rule::Lteq(a), Rule::Lteq(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Format(re) => write!(f, "format?(/{}/)", re.as_str()),
            Rule::MinSize(n) => write!(f, "min_size?({})", n),
            Rule::MaxSize(n) => write!(f, "max_size?({})", n),
            Rule::Gteq(x) => write!(f, "gteq?({})", x),
            Rule::Lteq(x) => write!(f, "lteq?({})", x),
        }
    }
}

#[derive(Debug)]
pub struct Constrained {
    inner: FieldTypeRef,
    rule: Rule,
}

impl FieldType for Constrained {
    fn name(&self) -> String {
        self.inner.name()
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        let value = self.inner.validate_or_coerce(value)?;
        if self.rule.holds(&value) {
            Ok(value)
        } else {
            Err(StructError::constraint(&value, self.rule.to_string()))
        }
    }

    fn to_ast(&self) -> Ast {
        Ast::Constrained {
            inner: Box::new(self.inner.to_ast()),
            rule: self.rule.clone(),
        }
    }

    fn is_optional(&self) -> bool {
        self.inner.is_optional()
    }
}

fn nominal(primitive: Primitive, coercion: Coercion) -> FieldTypeRef {
    Arc::new(Nominal { primitive, coercion })
}

pub fn any() -> FieldTypeRef {
    nominal(Primitive::Any, Coercion::Strict)
}

pub fn nil() -> FieldTypeRef {
    nominal(Primitive::Nil, Coercion::Strict)
}

pub fn string() -> FieldTypeRef {
    nominal(Primitive::String, Coercion::Strict)
}

pub fn integer() -> FieldTypeRef {
    nominal(Primitive::Integer, Coercion::Strict)
}

pub fn float() -> FieldTypeRef {
    nominal(Primitive::Float, Coercion::Strict)
}

pub fn boolean() -> FieldTypeRef {
    nominal(Primitive::Bool, Coercion::Strict)
}

pub fn time() -> FieldTypeRef {
    nominal(Primitive::Time, Coercion::Strict)
}

pub fn hash() -> FieldTypeRef {
    nominal(Primitive::Hash, Coercion::Strict)
}

/// Untyped array
pub fn array() -> FieldTypeRef {
    nominal(Primitive::Array, Coercion::Strict)
}

/// Coercible flavour of a primitive
pub fn coercible(primitive: Primitive) -> FieldTypeRef {
    nominal(primitive, Coercion::Coercible)
}

pub fn array_of(member: FieldTypeRef) -> FieldTypeRef {
    Arc::new(ArrayOf { member })
}

pub fn optional(inner: FieldTypeRef) -> FieldTypeRef {
    Arc::new(Optional { inner })
}

/// Attach a default; the value must itself be valid for `inner`
pub fn default(inner: FieldTypeRef, value: impl Into<Value>) -> StructResult<FieldTypeRef> {
    let value = inner.validate_or_coerce(value.into()).map_err(|e| {
        StructError::invalid_definition(inner.name(), format!("default value rejected: {}", e))
    })?;
    Ok(Arc::new(WithDefault { inner, value }))
}

pub fn constant(value: impl Into<Value>) -> FieldTypeRef {
    Arc::new(Constant {
        value: value.into(),
    })
}

pub fn enumeration(inner: FieldTypeRef, values: Vec<Value>) -> FieldTypeRef {
    Arc::new(Enumeration { inner, values })
}

pub fn constrained(inner: FieldTypeRef, rule: Rule) -> FieldTypeRef {
    Arc::new(Constrained { inner, rule })
}

/// String matching `pattern`
pub fn format(pattern: &str) -> StructResult<FieldTypeRef> {
    let re = Regex::new(pattern)
        .map_err(|e| StructError::invalid_definition(pattern, e.to_string()))?;
    Ok(constrained(string(), Rule::Format(re)))
}

/// Resolve a registered type name.
///
/// Accepts `name`, `strict.name`, `coercible.name`, `array<T>` and
/// `optional<T>`, nesting freely.
pub fn lookup(name: &str) -> StructResult<FieldTypeRef> {
    let name = name.trim();
    let unknown = || StructError::UnknownType {
        name: name.to_string(),
    };

    if let Some(inner) = strip_generic(name, "array") {
        return Ok(array_of(lookup(inner)?));
    }
    if let Some(inner) = strip_generic(name, "optional") {
        return Ok(optional(lookup(inner)?));
    }

    let (coercion, base) = match name.split_once('.') {
        Some(("strict", base)) => (Coercion::Strict, base),
        Some(("coercible", base)) => (Coercion::Coercible, base),
        Some(_) => return Err(unknown()),
        None => (Coercion::Strict, name),
    };
    let primitive = Primitive::from_name(base).ok_or_else(unknown)?;
    Ok(nominal(primitive, coercion))
}

fn strip_generic<'a>(name: &'a str, wrapper: &str) -> Option<&'a str> {
    name.strip_prefix(wrapper)?
        .strip_prefix('<')?
        .strip_suffix('>')
}
