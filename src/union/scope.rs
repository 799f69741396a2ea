//! Named registries of candidate record types

use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use indexmap::IndexMap;

use super::resolver::UnionResolver;
use crate::compiler::{Ast, ScopeRef};
use crate::record::{Record, RecordType};
use crate::schema::{Failure, StructError, StructResult};
use crate::types::{FieldType, FieldTypeRef};
use crate::value::Value;

/// Member set shared between a scope and its resolver
#[derive(Debug, Default)]
pub(crate) struct Members {
    entries: RwLock<IndexMap<String, RecordType>>,
}

/// Consistent view of a scope's members at one instant
pub(crate) struct MemberSnapshot {
    /// Sorted member names; the resolver cache key
    pub names: Vec<String>,
    /// Members in registration order
    pub entries: IndexMap<String, RecordType>,
}

impl Members {
    fn register(&self, scope: &str, name: &str, record_type: RecordType) -> StructResult<()> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(name) {
            return Err(StructError::NameCollision {
                qualified_name: format!("{}::{}", scope, name),
            });
        }
        entries.insert(name.to_string(), record_type);
        Ok(())
    }

    fn names(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    fn get(&self, name: &str) -> Option<RecordType> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub(crate) fn snapshot(&self) -> MemberSnapshot {
        let entries = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let mut names: Vec<String> = entries.keys().cloned().collect();
        names.sort();
        MemberSnapshot { names, entries }
    }
}

pub(crate) struct ScopeInner {
    name: String,
    members: Arc<Members>,
    resolver: OnceLock<Arc<UnionResolver>>,
}

/// A named, growable registry of record types.
///
/// Once bound with [`UnionResolver::bind`], calling the scope builds a
/// record through the union of its current members.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                name: name.into(),
                members: Arc::new(Members::default()),
                resolver: OnceLock::new(),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<ScopeInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<ScopeInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn shared_members(&self) -> Arc<Members> {
        Arc::clone(&self.inner.members)
    }

    pub(crate) fn install(&self, resolver: Arc<UnionResolver>) -> StructResult<()> {
        self.inner
            .resolver
            .set(resolver)
            .map_err(|_| StructError::Binding {
                scope: self.inner.name.clone(),
                reason: "is already bound to a union".into(),
            })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn ptr_eq(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Add a candidate under `name`
    pub fn register(&self, name: &str, record_type: RecordType) -> StructResult<()> {
        self.inner
            .members
            .register(&self.inner.name, name, record_type)
    }

    /// Member names in registration order
    pub fn members(&self) -> Vec<String> {
        self.inner.members.names()
    }

    pub fn resolve(&self, name: &str) -> StructResult<RecordType> {
        self.inner
            .members
            .get(name)
            .ok_or_else(|| StructError::CandidateNotFound {
                name: name.to_string(),
                scope: self.inner.name.clone(),
            })
    }

    pub fn is_bound(&self) -> bool {
        self.inner.resolver.get().is_some()
    }

    /// The resolver this scope delegates to
    pub fn resolver(&self) -> StructResult<Arc<UnionResolver>> {
        self.inner
            .resolver
            .get()
            .cloned()
            .ok_or_else(|| StructError::Binding {
                scope: self.inner.name.clone(),
                reason: "is not bound to a union".into(),
            })
    }

    /// Build a record through the union of the current members
    pub fn call(&self, input: impl Into<Value>) -> StructResult<Record> {
        self.resolver()?.call(input.into())
    }

    pub fn try_call(&self, input: impl Into<Value>) -> Result<Record, Failure> {
        let input = input.into();
        match self.call(input.clone()) {
            Ok(record) => Ok(record),
            Err(error) => Err(Failure::new(input, error)),
        }
    }

    pub fn is_instance(&self, value: &Value) -> bool {
        self.resolver()
            .and_then(|resolver| resolver.sum())
            .map_or(false, |sum| sum.is_instance(value))
    }

    pub fn to_ast(&self) -> Ast {
        Ast::Scope(ScopeRef::new(self))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({})", self.inner.name)
    }
}

impl FieldType for Scope {
    fn name(&self) -> String {
        match self.resolver().and_then(|resolver| resolver.name()) {
            Ok(name) => name,
            Err(_) => self.inner.name.clone(),
        }
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        self.call(value).map(Value::Record)
    }

    fn to_ast(&self) -> Ast {
        Scope::to_ast(self)
    }

    fn is_instance(&self, value: &Value) -> bool {
        Scope::is_instance(self, value)
    }
}

impl From<Scope> for FieldTypeRef {
    fn from(scope: Scope) -> Self {
        Arc::new(scope)
    }
}
