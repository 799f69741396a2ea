//! Record types
//!
//! A record type owns a schema, a constructor policy and a factory for
//! [`Record`]s. Types form an explicit inheritance graph: each node holds
//! its parent strongly and its subtypes weakly, so dropping the last handle
//! to a subtype reclaims it even while the parent lives on.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use indexmap::{IndexMap, IndexSet};

use super::builder::NestedTypeBuilder;
use super::constructor::Constructor;
use super::instance::Record;
use crate::compiler::{Ast, Compiler, TypeRef};
use crate::observability::{log_event_with_fields, metrics, Event, Logger};
use crate::schema::{
    normalize_name, ConstructorPolicy, Failure, Schema, SchemaKey, SchemaValidator, StructError,
    StructResult,
};
use crate::types::{FieldType, FieldTypeRef};
use crate::value::{Attributes, Value, NIL};

/// Input key transform run before the constructor policy
pub type KeyTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Rewrites the type of every attribute declared after it is installed
pub type TypeTransform = Arc<dyn Fn(FieldTypeRef) -> FieldTypeRef + Send + Sync>;

/// Getter over a record's attribute map
pub(crate) type Accessor = Arc<dyn for<'a> Fn(&'a Attributes) -> &'a Value + Send + Sync>;

fn getter<F>(f: F) -> F
where
    F: for<'a> Fn(&'a Attributes) -> &'a Value,
{
    f
}

fn accessor_for(name: &str) -> Accessor {
    let name = name.to_string();
    Arc::new(getter(move |attrs| attrs.get(&name).unwrap_or(&NIL)))
}

pub(crate) struct TypeNode {
    name: Option<String>,
    parent: Option<RecordType>,
    state: RwLock<TypeState>,
    subtypes: RwLock<Vec<Weak<TypeNode>>>,
}

struct TypeState {
    schema: Schema,
    /// Names declared directly on this type, as opposed to inherited
    declared: IndexSet<String>,
    policy: ConstructorPolicy,
    is_abstract: bool,
    meta: Attributes,
    key_transform: Option<KeyTransform>,
    type_transform: Option<TypeTransform>,
    namespace: IndexMap<String, RecordType>,
    accessors: IndexMap<String, Accessor>,
}

impl TypeState {
    fn root(policy: ConstructorPolicy) -> Self {
        Self {
            schema: Schema::new(),
            declared: IndexSet::new(),
            policy,
            is_abstract: false,
            meta: Attributes::new(),
            key_transform: None,
            type_transform: None,
            namespace: IndexMap::new(),
            accessors: IndexMap::new(),
        }
    }

    /// State a fresh subtype starts from
    fn inherited(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            declared: IndexSet::new(),
            policy: self.policy,
            is_abstract: false,
            meta: self.meta.clone(),
            key_transform: self.key_transform.clone(),
            type_transform: self.type_transform.clone(),
            namespace: IndexMap::new(),
            accessors: self.accessors.clone(),
        }
    }

    fn insert_key(&mut self, key: SchemaKey) {
        self.accessors
            .insert(key.name.clone(), accessor_for(&key.name));
        self.schema.insert(key);
    }
}

thread_local! {
    static AST_IN_PROGRESS: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Handle to a record type. Cloning shares the same type.
#[derive(Clone)]
pub struct RecordType {
    node: Arc<TypeNode>,
}

impl RecordType {
    /// Create a named root type with the default policy
    pub fn define(name: impl Into<String>) -> RecordType {
        Self::create(Some(name.into()), None)
    }

    /// Create an unnamed root type
    pub fn anonymous() -> RecordType {
        Self::create(None, None)
    }

    /// Create a named subtype inheriting this type's schema, policy,
    /// transforms and metadata
    pub fn subtype(&self, name: impl Into<String>) -> RecordType {
        Self::create(Some(name.into()), Some(self))
    }

    fn create(name: Option<String>, parent: Option<&RecordType>) -> RecordType {
        let node = match parent {
            // The parent's state stays read-locked until the child is listed
            // as a subtype, so a concurrent declaration either lands in the
            // inherited schema or finds the child when it propagates.
            Some(parent) => {
                let parent_state = parent.state();
                let node = Arc::new(TypeNode {
                    name,
                    parent: Some(parent.clone()),
                    state: RwLock::new(parent_state.inherited()),
                    subtypes: RwLock::new(Vec::new()),
                });
                let mut subtypes = parent
                    .node
                    .subtypes
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                subtypes.retain(|weak| weak.strong_count() > 0);
                subtypes.push(Arc::downgrade(&node));
                node
            }
            None => Arc::new(TypeNode {
                name,
                parent: None,
                state: RwLock::new(TypeState::root(ConstructorPolicy::default())),
                subtypes: RwLock::new(Vec::new()),
            }),
        };

        let record_type = RecordType { node };
        metrics().increment_types_defined();
        log_event_with_fields(
            Event::TypeDefined,
            &[
                ("type", record_type.display_name()),
                (
                    "parent",
                    parent.map_or("", |p| p.display_name()),
                ),
            ],
        );
        record_type
    }

    pub(crate) fn from_node(node: Arc<TypeNode>) -> RecordType {
        RecordType { node }
    }

    pub(crate) fn downgrade(&self) -> Weak<TypeNode> {
        Arc::downgrade(&self.node)
    }

    fn state(&self) -> RwLockReadGuard<'_, TypeState> {
        self.node
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, TypeState> {
        self.node
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Declared name, `None` for anonymous types
    pub fn name(&self) -> Option<&str> {
        self.node.name.as_deref()
    }

    /// Name used in messages; anonymous types borrow their nearest named
    /// ancestor's name
    pub fn display_name(&self) -> &str {
        match (&self.node.name, &self.node.parent) {
            (Some(name), _) => name,
            (None, Some(parent)) => parent.display_name(),
            (None, None) => "Unknown",
        }
    }

    pub fn ptr_eq(&self, other: &RecordType) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    pub fn parent(&self) -> Option<RecordType> {
        self.node.parent.clone()
    }

    /// Subtypes that are still alive, in creation order
    pub fn subtypes(&self) -> Vec<RecordType> {
        self.node
            .subtypes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(Weak::upgrade)
            .map(RecordType::from_node)
            .collect()
    }

    /// Whether this type is `other` or derives from it
    pub fn is_subtype_of(&self, other: &RecordType) -> bool {
        let mut current = Some(self);
        while let Some(t) = current {
            if t.ptr_eq(other) {
                return true;
            }
            current = t.node.parent.as_ref();
        }
        false
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn policy(&self) -> ConstructorPolicy {
        self.state().policy
    }

    pub fn set_policy(&self, policy: ConstructorPolicy) -> &Self {
        self.state_mut().policy = policy;
        self
    }

    /// Builder form of [`RecordType::set_policy`]
    pub fn with_policy(self, policy: ConstructorPolicy) -> Self {
        self.set_policy(policy);
        self
    }

    /// Mark the type as non-instantiable for unions and as the base of
    /// nested types synthesized beneath it
    pub fn make_abstract(&self) -> &Self {
        self.state_mut().is_abstract = true;
        self
    }

    pub fn is_abstract(&self) -> bool {
        self.state().is_abstract
    }

    /// Nearest abstract type among self and ancestors
    pub fn abstract_class(&self) -> Option<RecordType> {
        if self.is_abstract() {
            return Some(self.clone());
        }
        self.node.parent.as_ref().and_then(RecordType::abstract_class)
    }

    /// Transform every input key before the policy runs
    pub fn transform_keys<F>(&self, transform: F) -> &Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.state_mut().key_transform = Some(Arc::new(transform));
        self
    }

    /// Rewrite the type of every attribute declared from now on.
    ///
    /// Keys already in the schema keep their types. Subtypes created later
    /// and nested types synthesized without an explicit parent inherit the
    /// transform.
    pub fn transform_types<F>(&self, transform: F) -> &Self
    where
        F: Fn(FieldTypeRef) -> FieldTypeRef + Send + Sync + 'static,
    {
        self.state_mut().type_transform = Some(Arc::new(transform));
        self
    }

    /// Wrap this type so every input passes through `func` first
    pub fn constructor<F>(&self, func: F) -> Constructor
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Constructor::new(self.clone(), func)
    }

    pub fn meta(&self) -> Attributes {
        self.state().meta.clone()
    }

    /// Anonymous subtype carrying `meta` merged over the current metadata.
    ///
    /// An empty map returns this type itself.
    pub fn with_meta(&self, meta: Attributes) -> RecordType {
        if meta.is_empty() {
            return self.clone();
        }
        let derived = Self::create(None, Some(self));
        derived.state_mut().meta.extend(meta);
        derived
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Declare one attribute. A trailing `?` makes the key omittable.
    pub fn attribute(&self, name: &str, field_type: FieldTypeRef) -> StructResult<&Self> {
        self.add_keys(vec![SchemaKey::parse(name, field_type)])
    }

    /// Declare an omittable attribute
    pub fn attribute_optional(&self, name: &str, field_type: FieldTypeRef) -> StructResult<&Self> {
        let (bare, _) = normalize_name(name);
        self.add_keys(vec![SchemaKey::new(bare, false, field_type)])
    }

    /// Declare several attributes at once, in order
    pub fn attributes<I, S>(&self, fields: I) -> StructResult<&Self>
    where
        I: IntoIterator<Item = (S, FieldTypeRef)>,
        S: AsRef<str>,
    {
        let keys = fields
            .into_iter()
            .map(|(name, field_type)| SchemaKey::parse(name.as_ref(), field_type))
            .collect();
        self.add_keys(keys)
    }

    /// Copy every key of `other` (with its required flag) onto this type
    pub fn attributes_from(&self, other: &RecordType) -> StructResult<&Self> {
        let keys = other.schema().keys().cloned().collect();
        self.add_keys(keys)
    }

    /// Declare an attribute whose type is synthesized from `block`.
    ///
    /// `explicit` may be a record type to derive from, or an array/optional
    /// wrapper around one; the synthesized type is wrapped back the same way.
    pub fn nested_attribute<F>(
        &self,
        name: &str,
        explicit: Option<FieldTypeRef>,
        block: F,
    ) -> StructResult<&Self>
    where
        F: FnOnce(&RecordType) -> StructResult<()>,
    {
        let (bare, required) = normalize_name(name);
        let field_type = NestedTypeBuilder::new(self).build(bare, explicit, block)?;
        self.add_keys(vec![SchemaKey::new(bare, required, field_type)])
    }

    /// Fails when `field` is already declared on this type itself
    pub(crate) fn ensure_undeclared(&self, field: &str) -> StructResult<()> {
        if self.state().declared.contains(field) {
            return Err(self.duplicate_field(field));
        }
        Ok(())
    }

    fn duplicate_field(&self, field: &str) -> StructError {
        StructError::DuplicateField {
            type_name: self.display_name().to_string(),
            field: field.to_string(),
        }
    }

    fn add_keys(&self, keys: Vec<SchemaKey>) -> StructResult<&Self> {
        // The transform may inspect this type, so it runs without the lock
        let type_transform = self.state().type_transform.clone();
        let keys: Vec<SchemaKey> = match type_transform {
            Some(transform) => keys
                .into_iter()
                .map(|key| SchemaKey::new(key.name, key.required, transform(key.field_type)))
                .collect(),
            None => keys,
        };

        {
            let mut state = self.state_mut();

            let mut seen = IndexSet::new();
            for key in &keys {
                if state.declared.contains(&key.name) || !seen.insert(key.name.as_str()) {
                    return Err(self.duplicate_field(&key.name));
                }
            }

            for key in &keys {
                state.declared.insert(key.name.clone());
                state.insert_key(key.clone());
            }
        }

        let names: Vec<&str> = keys.iter().map(|k| k.name.as_str()).collect();
        log_event_with_fields(
            Event::AttributesDeclared,
            &[("type", self.display_name()), ("fields", &names.join(","))],
        );

        self.propagate(keys);
        Ok(self)
    }

    /// Breadth-first copy of new keys into live subtypes.
    ///
    /// A subtype that declares a key itself keeps its own and shields its
    /// descendants from the incoming one.
    fn propagate(&self, keys: Vec<SchemaKey>) {
        let mut queue: VecDeque<(RecordType, Arc<Vec<SchemaKey>>)> = VecDeque::new();
        let keys = Arc::new(keys);
        for sub in self.subtypes() {
            queue.push_back((sub, Arc::clone(&keys)));
        }

        while let Some((sub, incoming)) = queue.pop_front() {
            let applied: Vec<SchemaKey> = {
                let mut state = sub.state_mut();
                let applied: Vec<SchemaKey> = incoming
                    .iter()
                    .filter(|key| !state.declared.contains(&key.name))
                    .cloned()
                    .collect();
                for key in &applied {
                    state.insert_key(key.clone());
                }
                applied
            };

            if applied.is_empty() {
                continue;
            }

            metrics().add_fields_propagated(applied.len() as u64);
            log_event_with_fields(
                Event::AttributesPropagated,
                &[
                    ("from", self.display_name()),
                    ("to", sub.display_name()),
                    ("count", &applied.len().to_string()),
                ],
            );

            let applied = Arc::new(applied);
            for child in sub.subtypes() {
                queue.push_back((child, Arc::clone(&applied)));
            }
        }
    }

    /// Snapshot of the effective schema
    pub fn schema(&self) -> Schema {
        self.state().schema.clone()
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.state().schema.names().map(str::to_string).collect()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.state().schema.contains(name)
    }

    /// Names declared on this type itself
    pub fn declared_names(&self) -> Vec<String> {
        self.state().declared.iter().cloned().collect()
    }

    pub(crate) fn accessor(&self, name: &str) -> Option<Accessor> {
        self.state().accessors.get(name).cloned()
    }

    // ========================================================================
    // Nested type namespace
    // ========================================================================

    /// Nested type registered directly under this type
    pub fn nested_type(&self, name: &str) -> Option<RecordType> {
        self.state().namespace.get(name).cloned()
    }

    pub fn nested_types(&self) -> Vec<(String, RecordType)> {
        self.state()
            .namespace
            .iter()
            .map(|(name, t)| (name.clone(), t.clone()))
            .collect()
    }

    pub(crate) fn register_nested(&self, name: &str, nested: RecordType) -> StructResult<()> {
        let mut state = self.state_mut();
        if state.namespace.contains_key(name) {
            return Err(StructError::NameCollision {
                qualified_name: format!("{}::{}", self.display_name(), name),
            });
        }
        state.namespace.insert(name.to_string(), nested);
        Ok(())
    }

    /// Start over with an empty schema, taking policy and transforms
    /// from `owner`
    pub(crate) fn reset_from(&self, owner: &RecordType) {
        let (policy, key_transform, type_transform) = {
            let owner_state = owner.state();
            (
                owner_state.policy,
                owner_state.key_transform.clone(),
                owner_state.type_transform.clone(),
            )
        };
        let mut state = self.state_mut();
        state.schema = Schema::new();
        state.declared.clear();
        state.accessors.clear();
        state.policy = policy;
        state.key_transform = key_transform;
        state.type_transform = type_transform;
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Build a record from `input`.
    ///
    /// A record of exactly this type is returned as-is. Any other record is
    /// re-validated from its attribute map. Maps go through the key
    /// transform and the constructor policy.
    pub fn call(&self, input: impl Into<Value>) -> StructResult<Record> {
        self.construct(input.into())
    }

    /// Non-raising form of [`RecordType::call`]; the failure carries the input
    pub fn try_call(&self, input: impl Into<Value>) -> Result<Record, Failure> {
        let input = input.into();
        match self.construct(input.clone()) {
            Ok(record) => Ok(record),
            Err(error) => Err(Failure::new(input, error)),
        }
    }

    /// Build a record with no input, letting defaults resolve.
    ///
    /// Nested record keys without a default receive empty maps so their
    /// own defaults apply.
    pub fn new_default(&self) -> StructResult<Record> {
        let mut path = Vec::new();
        self.call(Value::Map(self.default_attributes(&mut path)))
    }

    fn default_attributes(&self, path: &mut Vec<RecordType>) -> Attributes {
        let mut attrs = Attributes::new();
        if path.iter().any(|t| t.ptr_eq(self)) {
            return attrs;
        }
        path.push(self.clone());
        for key in self.schema().keys() {
            if key.field_type.has_default() {
                continue;
            }
            if let Some(nested) = key.field_type.as_record_type() {
                attrs.insert(
                    key.name.clone(),
                    Value::Map(nested.default_attributes(path)),
                );
            }
        }
        path.pop();
        attrs
    }

    pub(crate) fn construct(&self, input: Value) -> StructResult<Record> {
        if let Value::Record(record) = &input {
            if record.record_type().ptr_eq(self) {
                return Ok(record.clone());
            }
        }

        match self.build(input) {
            Ok(record) => {
                metrics().increment_records_constructed();
                Ok(record)
            }
            Err(error) => {
                let error = error.in_construction(self.display_name());
                metrics().increment_construction_failures();
                // Sum dispatch fails here once per rejected branch
                if Logger::enabled(Event::ConstructionFailed.severity()) {
                    log_event_with_fields(
                        Event::ConstructionFailed,
                        &[
                            ("type", self.display_name()),
                            ("code", error.root_cause().code()),
                            ("error", &error.to_string()),
                        ],
                    );
                }
                Err(error)
            }
        }
    }

    fn build(&self, input: Value) -> StructResult<Record> {
        let map = match input {
            Value::Map(map) => map,
            Value::Record(record) => record.to_h(),
            other => return Err(StructError::invalid_type(&other, "hash")),
        };

        // Field types may re-enter this type, so no lock is held while validating
        let (schema, policy, key_transform) = {
            let state = self.state();
            (state.schema.clone(), state.policy, state.key_transform.clone())
        };

        let map = match key_transform {
            Some(transform) => map
                .into_iter()
                .map(|(key, value)| (transform(&key), value))
                .collect(),
            None => map,
        };

        let attributes = SchemaValidator::new(&schema, policy).apply(map)?;
        Ok(Record::new(self.clone(), attributes))
    }

    /// Apply a changeset to an existing record's attributes
    pub(crate) fn evolve_attributes(
        &self,
        current: &Attributes,
        changeset: Attributes,
    ) -> StructResult<Attributes> {
        let (schema, policy, key_transform) = {
            let state = self.state();
            (state.schema.clone(), state.policy, state.key_transform.clone())
        };

        let changeset = match key_transform {
            Some(transform) => changeset
                .into_iter()
                .map(|(key, value)| (transform(&key), value))
                .collect(),
            None => changeset,
        };

        let mut changes = SchemaValidator::new(&schema, policy)
            .apply_changeset(changeset)
            .map_err(|e| e.in_construction(self.display_name()))?;

        let mut merged = Attributes::with_capacity(schema.len());
        for name in schema.names() {
            if let Some(value) = changes.swap_remove(name) {
                merged.insert(name.to_string(), value);
            } else if let Some(value) = current.get(name) {
                merged.insert(name.to_string(), value.clone());
            }
        }
        Ok(merged)
    }

    // ========================================================================
    // AST
    // ========================================================================

    /// Structural description holding a weak reference to this type
    pub fn to_ast(&self) -> Ast {
        let key = Arc::as_ptr(&self.node) as usize;
        let reentered = AST_IN_PROGRESS.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&key) {
                true
            } else {
                stack.push(key);
                false
            }
        });

        let (schema, policy) = {
            let state = self.state();
            (state.schema.clone(), state.policy)
        };

        // A self-referencing type describes its inner occurrences by reference only
        let schema_ast = if reentered {
            Schema::new().to_ast(policy)
        } else {
            let ast = schema.to_ast(policy);
            AST_IN_PROGRESS.with(|stack| {
                stack.borrow_mut().retain(|k| *k != key);
            });
            ast
        };

        Ast::Record {
            type_ref: TypeRef::new(self),
            schema: Box::new(schema_ast),
        }
    }

    /// Resolve a record node back to its type
    pub fn from_ast(ast: &Ast) -> StructResult<RecordType> {
        Compiler::new().from_ast(ast)
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for RecordType {}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordType({})", self.display_name())
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FieldType for RecordType {
    fn name(&self) -> String {
        self.display_name().to_string()
    }

    fn validate_or_coerce(&self, value: Value) -> StructResult<Value> {
        self.construct(value).map(Value::Record)
    }

    fn to_ast(&self) -> Ast {
        RecordType::to_ast(self)
    }

    fn as_record_type(&self) -> Option<RecordType> {
        Some(self.clone())
    }

    fn is_instance(&self, value: &Value) -> bool {
        matches!(value, Value::Record(record) if record.is_a(self))
    }
}

impl From<RecordType> for FieldTypeRef {
    fn from(record_type: RecordType) -> Self {
        Arc::new(record_type)
    }
}
