//! Definition loader for building record types from JSON files
//!
//! - Definitions live in `<definitions_dir>/*.json`, read in file-name order
//! - Each file holds `{"unions": [...], "types": [...]}`
//! - Unions of a file are bound before its types are defined
//! - Redefining a name is an `InvalidDefinition` error
//!
//! The loader owns everything it builds, so ASTs of loaded types stay
//! resolvable for as long as the loader lives.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;

use super::errors::{StructError, StructResult};
use super::types::ConstructorPolicy;
use crate::observability::{log_event_with_fields, Event};
use crate::record::RecordType;
use crate::types::{self, FieldTypeRef};
use crate::union::{Scope, UnionOptions, UnionResolver};

/// Contents of one definitions file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefinitionFile {
    pub unions: Vec<UnionDefinition>,
    pub types: Vec<TypeDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnionDefinition {
    pub name: String,
    #[serde(default)]
    pub include: Option<Vec<String>>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDefinition {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub policy: Option<ConstructorPolicy>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Union scope the type joins under its own name
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeDefinition>,
}

/// How an attribute's type is written
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AttributeDefinition {
    /// `"string"`, `"coercible.integer"`, `"User"`, `"Weather"`
    Named(String),
    /// `["string"]` or `[{...}]`: an array of the single element
    Collection(Vec<AttributeDefinition>),
    /// `{...}`: an inline nested type
    Block(IndexMap<String, AttributeDefinition>),
}

/// Loads definition files and keeps the types and scopes they declare.
#[derive(Debug)]
pub struct DefinitionLoader {
    definitions_dir: PathBuf,
    default_policy: ConstructorPolicy,
    types: IndexMap<String, RecordType>,
    scopes: IndexMap<String, Scope>,
}

impl DefinitionLoader {
    pub fn new(definitions_dir: &Path) -> Self {
        Self {
            definitions_dir: definitions_dir.to_path_buf(),
            default_policy: ConstructorPolicy::default(),
            types: IndexMap::new(),
            scopes: IndexMap::new(),
        }
    }

    /// Policy for root types that do not name one
    pub fn with_default_policy(mut self, policy: ConstructorPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    pub fn definitions_dir(&self) -> &Path {
        &self.definitions_dir
    }

    /// Loads every `*.json` file of the definitions directory.
    ///
    /// A missing directory loads nothing.
    pub fn load_all(&mut self) -> StructResult<()> {
        if !self.definitions_dir.exists() {
            return Ok(());
        }

        let origin = self.definitions_dir.display().to_string();
        let entries = fs::read_dir(&self.definitions_dir).map_err(|e| {
            StructError::invalid_definition(&origin, format!("Failed to read directory: {}", e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                StructError::invalid_definition(
                    &origin,
                    format!("Failed to read directory entry: {}", e),
                )
            })?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        for path in &paths {
            self.load_file(path)?;
        }

        log_event_with_fields(
            Event::DefinitionsLoaded,
            &[
                ("dir", &origin),
                ("files", &paths.len().to_string()),
                ("types", &self.types.len().to_string()),
                ("unions", &self.scopes.len().to_string()),
            ],
        );
        Ok(())
    }

    /// Loads a single definitions file.
    pub fn load_file(&mut self, path: &Path) -> StructResult<()> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| {
            StructError::invalid_definition(&origin, format!("Failed to read file: {}", e))
        })?;
        self.load_source(&origin, &content)
    }

    /// Loads definitions from a JSON string. `origin` names the source in
    /// errors.
    pub fn load_source(&mut self, origin: &str, content: &str) -> StructResult<()> {
        let file: DefinitionFile = serde_json::from_str(content).map_err(|e| {
            StructError::invalid_definition(origin, format!("Invalid JSON: {}", e))
        })?;

        for union in &file.unions {
            self.define_union(origin, union)?;
        }
        for definition in &file.types {
            self.define_type(origin, definition)?;
        }
        Ok(())
    }

    pub fn record_type(&self, name: &str) -> Option<&RecordType> {
        self.types.get(name)
    }

    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.get(name)
    }

    /// Type names in definition order
    pub fn type_names(&self) -> Vec<&str> {
        self.types.keys().map(String::as_str).collect()
    }

    pub fn union_names(&self) -> Vec<&str> {
        self.scopes.keys().map(String::as_str).collect()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    fn ensure_unused(&self, origin: &str, name: &str) -> StructResult<()> {
        if self.types.contains_key(name) || self.scopes.contains_key(name) {
            return Err(StructError::invalid_definition(
                origin,
                format!("'{}' is already defined", name),
            ));
        }
        Ok(())
    }

    fn define_union(&mut self, origin: &str, definition: &UnionDefinition) -> StructResult<()> {
        self.ensure_unused(origin, &definition.name)?;

        let scope = Scope::new(definition.name.as_str());
        let options = UnionOptions {
            include: definition.include.clone(),
            exclude: definition.exclude.clone(),
        };
        UnionResolver::bind(&scope, options)?;
        self.scopes.insert(definition.name.clone(), scope);
        Ok(())
    }

    fn define_type(&mut self, origin: &str, definition: &TypeDefinition) -> StructResult<()> {
        self.ensure_unused(origin, &definition.name)?;

        let record_type = match &definition.parent {
            Some(parent) => {
                let parent = self.types.get(parent).ok_or_else(|| {
                    StructError::invalid_definition(
                        origin,
                        format!("unknown parent '{}' of '{}'", parent, definition.name),
                    )
                })?;
                parent.subtype(definition.name.as_str())
            }
            None => RecordType::define(definition.name.as_str()).with_policy(self.default_policy),
        };

        if let Some(policy) = definition.policy {
            record_type.set_policy(policy);
        }
        if definition.is_abstract {
            record_type.make_abstract();
        }

        // Registered first so attributes may refer to the type itself
        self.types
            .insert(definition.name.clone(), record_type.clone());

        if let Err(error) = self.complete_type(origin, &record_type, definition) {
            self.types.shift_remove(&definition.name);
            return Err(error);
        }
        Ok(())
    }

    /// Declares the attributes of a registered type and joins its scope
    fn complete_type(
        &self,
        origin: &str,
        record_type: &RecordType,
        definition: &TypeDefinition,
    ) -> StructResult<()> {
        self.declare_all(origin, record_type, &definition.attributes)?;

        if let Some(scope_name) = &definition.scope {
            let scope = self.scopes.get(scope_name).ok_or_else(|| {
                StructError::invalid_definition(
                    origin,
                    format!("unknown scope '{}' for '{}'", scope_name, definition.name),
                )
            })?;
            scope.register(&definition.name, record_type.clone())?;
        }
        Ok(())
    }

    fn declare_all(
        &self,
        origin: &str,
        owner: &RecordType,
        attributes: &IndexMap<String, AttributeDefinition>,
    ) -> StructResult<()> {
        for (name, definition) in attributes {
            self.declare(origin, owner, name, definition)?;
        }
        Ok(())
    }

    fn declare(
        &self,
        origin: &str,
        owner: &RecordType,
        name: &str,
        definition: &AttributeDefinition,
    ) -> StructResult<()> {
        match definition {
            AttributeDefinition::Block(fields) => {
                owner.nested_attribute(name, None, |nested| {
                    self.declare_all(origin, nested, fields)
                })?;
            }
            AttributeDefinition::Collection(items) => match items.as_slice() {
                [AttributeDefinition::Block(fields)] => {
                    owner.nested_attribute(name, Some(types::array()), |nested| {
                        self.declare_all(origin, nested, fields)
                    })?;
                }
                _ => {
                    owner.attribute(name, self.field_type(origin, definition)?)?;
                }
            },
            AttributeDefinition::Named(_) => {
                owner.attribute(name, self.field_type(origin, definition)?)?;
            }
        }
        Ok(())
    }

    fn field_type(&self, origin: &str, definition: &AttributeDefinition) -> StructResult<FieldTypeRef> {
        match definition {
            AttributeDefinition::Named(name) => self.resolve(name),
            AttributeDefinition::Collection(items) => match items.as_slice() {
                [member] => Ok(types::array_of(self.field_type(origin, member)?)),
                _ => Err(StructError::invalid_definition(
                    origin,
                    format!("array definitions take exactly one member, got {}", items.len()),
                )),
            },
            AttributeDefinition::Block(_) => Err(StructError::invalid_definition(
                origin,
                "inline blocks may only appear directly under an attribute or a one-element list",
            )),
        }
    }

    /// Loaded types first, then scopes, then the built-in registry
    fn resolve(&self, name: &str) -> StructResult<FieldTypeRef> {
        if let Some(record_type) = self.types.get(name) {
            return Ok(record_type.clone().into());
        }
        if let Some(scope) = self.scopes.get(name) {
            return Ok(scope.clone().into());
        }
        types::lookup(name)
    }
}
