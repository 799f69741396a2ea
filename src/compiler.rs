//! Structural descriptions of field types
//!
//! Record and scope nodes hold weak references: an AST never keeps the type
//! it describes alive. Compiling a node whose target has been reclaimed
//! fails with `RecycledType`, which is distinct from `MalformedAst`.

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::json;

use crate::observability::{log_event_with_fields, metrics, Event};
use crate::record::{RecordType, TypeNode};
use crate::schema::{ConstructorPolicy, StructError, StructResult};
use crate::sum::{Branch, SumType};
use crate::types::{self, FieldTypeRef, Rule};
use crate::union::{Scope, ScopeInner};
use crate::value::Value;

/// Non-owning handle to a record type
#[derive(Clone)]
pub struct TypeRef {
    weak: Weak<TypeNode>,
    name: String,
}

impl TypeRef {
    pub fn new(record_type: &RecordType) -> Self {
        Self {
            weak: record_type.downgrade(),
            name: record_type.display_name().to_string(),
        }
    }

    /// Name of the referenced type at the time the reference was taken
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alive(&self) -> bool {
        self.weak.strong_count() > 0
    }

    pub fn upgrade(&self) -> Option<RecordType> {
        self.weak.upgrade().map(RecordType::from_node)
    }

    /// Whether this handle points at `record_type`
    pub fn refers_to(&self, record_type: &RecordType) -> bool {
        Weak::ptr_eq(&self.weak, &record_type.downgrade())
    }
}

impl PartialEq for TypeRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.weak, &other.weak)
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.name)
    }
}

/// Non-owning handle to a union scope
#[derive(Clone)]
pub struct ScopeRef {
    weak: Weak<ScopeInner>,
    name: String,
}

impl ScopeRef {
    pub fn new(scope: &Scope) -> Self {
        Self {
            weak: scope.downgrade(),
            name: scope.name().to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn upgrade(&self) -> Option<Scope> {
        self.weak.upgrade().map(Scope::from_inner)
    }
}

impl PartialEq for ScopeRef {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.weak, &other.weak)
    }
}

impl fmt::Debug for ScopeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeRef({})", self.name)
    }
}

/// AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Ast {
    Record {
        type_ref: TypeRef,
        schema: Box<Ast>,
    },
    Schema {
        keys: Vec<Ast>,
        policy: ConstructorPolicy,
    },
    Key {
        name: String,
        required: bool,
        field_type: Box<Ast>,
    },
    Nominal {
        name: String,
    },
    Array(Box<Ast>),
    Optional(Box<Ast>),
    Default {
        inner: Box<Ast>,
        value: Value,
    },
    Constant(Value),
    Enum {
        inner: Box<Ast>,
        values: Vec<Value>,
    },
    Constrained {
        inner: Box<Ast>,
        rule: Rule,
    },
    Sum(Box<Ast>, Box<Ast>),
    Scope(ScopeRef),
}

impl Ast {
    pub fn tag(&self) -> &'static str {
        match self {
            Ast::Record { .. } => "record",
            Ast::Schema { .. } => "schema",
            Ast::Key { .. } => "key",
            Ast::Nominal { .. } => "nominal",
            Ast::Array(_) => "array",
            Ast::Optional(_) => "optional",
            Ast::Default { .. } => "default",
            Ast::Constant(_) => "constant",
            Ast::Enum { .. } => "enum",
            Ast::Constrained { .. } => "constrained",
            Ast::Sum(..) => "sum",
            Ast::Scope(_) => "scope",
        }
    }

    /// Tagged-array rendering, e.g. `["nominal", "string"]`
    pub fn to_json(&self) -> serde_json::Value {
        let value_json = |v: &Value| serde_json::to_value(v).unwrap_or(serde_json::Value::Null);
        match self {
            Ast::Record { type_ref, schema } => {
                json!([self.tag(), type_ref.name(), schema.to_json()])
            }
            Ast::Schema { keys, policy } => json!([
                self.tag(),
                keys.iter().map(Ast::to_json).collect::<Vec<_>>(),
                policy.as_str()
            ]),
            Ast::Key {
                name,
                required,
                field_type,
            } => json!([self.tag(), name, required, field_type.to_json()]),
            Ast::Nominal { name } => json!([self.tag(), name]),
            Ast::Array(inner) | Ast::Optional(inner) => json!([self.tag(), inner.to_json()]),
            Ast::Default { inner, value } => {
                json!([self.tag(), inner.to_json(), value_json(value)])
            }
            Ast::Constant(value) => json!([self.tag(), value_json(value)]),
            Ast::Enum { inner, values } => json!([
                self.tag(),
                inner.to_json(),
                values.iter().map(value_json).collect::<Vec<_>>()
            ]),
            Ast::Constrained { inner, rule } => {
                json!([self.tag(), inner.to_json(), rule.to_string()])
            }
            Ast::Sum(left, right) => json!([self.tag(), left.to_json(), right.to_json()]),
            Ast::Scope(scope_ref) => json!([self.tag(), scope_ref.name()]),
        }
    }
}

/// Predicate consulted before dereferencing a record reference
pub type Liveness = Arc<dyn Fn(&TypeRef) -> bool + Send + Sync>;

/// Rebuilds field types from their ASTs
#[derive(Clone, Default)]
pub struct Compiler {
    liveness: Option<Liveness>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `liveness` instead of the reference count to decide whether a
    /// referenced type is still alive
    pub fn with_liveness<F>(liveness: F) -> Self
    where
        F: Fn(&TypeRef) -> bool + Send + Sync + 'static,
    {
        Self {
            liveness: Some(Arc::new(liveness)),
        }
    }

    /// Resolve a `record` node to the type it references.
    ///
    /// # Errors
    ///
    /// - `RecycledType` if the referenced type no longer exists
    /// - `MalformedAst` for any other node
    pub fn from_ast(&self, ast: &Ast) -> StructResult<RecordType> {
        match ast {
            Ast::Record { type_ref, .. } => self.resolve_type(type_ref),
            other => Err(StructError::MalformedAst {
                reason: format!("expected a record node, got '{}'", other.tag()),
            }),
        }
    }

    /// Rebuild any field type node
    pub fn visit(&self, ast: &Ast) -> StructResult<FieldTypeRef> {
        match ast {
            Ast::Record { type_ref, .. } => Ok(self.resolve_type(type_ref)?.into()),
            Ast::Nominal { name } => types::lookup(name),
            Ast::Array(member) => Ok(types::array_of(self.visit(member)?)),
            Ast::Optional(inner) => Ok(types::optional(self.visit(inner)?)),
            Ast::Default { inner, value } => types::default(self.visit(inner)?, value.clone()),
            Ast::Constant(value) => Ok(types::constant(value.clone())),
            Ast::Enum { inner, values } => {
                Ok(types::enumeration(self.visit(inner)?, values.clone()))
            }
            Ast::Constrained { inner, rule } => {
                Ok(types::constrained(self.visit(inner)?, rule.clone()))
            }
            Ast::Sum(left, right) => Ok(SumType::new(
                self.visit_branch(left)?,
                self.visit_branch(right)?,
            )
            .into()),
            Ast::Scope(scope_ref) => match scope_ref.upgrade() {
                Some(scope) => Ok(scope.into()),
                None => Err(self.recycled(scope_ref.name())),
            },
            Ast::Schema { .. } | Ast::Key { .. } => Err(StructError::MalformedAst {
                reason: format!("'{}' node does not describe a field type", ast.tag()),
            }),
        }
    }

    fn visit_branch(&self, ast: &Ast) -> StructResult<Branch> {
        match ast {
            Ast::Record { type_ref, .. } => Ok(Branch::Record(self.resolve_type(type_ref)?)),
            Ast::Sum(left, right) => Ok(Branch::Sum(SumType::new(
                self.visit_branch(left)?,
                self.visit_branch(right)?,
            ))),
            other => Err(StructError::MalformedAst {
                reason: format!("sum branch must be a record or sum, got '{}'", other.tag()),
            }),
        }
    }

    fn resolve_type(&self, type_ref: &TypeRef) -> StructResult<RecordType> {
        let alive = match &self.liveness {
            Some(liveness) => liveness(type_ref),
            None => true,
        };
        let resolved = if alive { type_ref.upgrade() } else { None };
        resolved.ok_or_else(|| self.recycled(type_ref.name()))
    }

    fn recycled(&self, name: &str) -> StructError {
        metrics().increment_recycled_lookups();
        log_event_with_fields(Event::RecycledTypeDetected, &[("type", name)]);
        StructError::RecycledType {
            name: name.to_string(),
        }
    }
}
