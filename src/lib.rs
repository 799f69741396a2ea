//! aerostruct - typed, immutable records built from loosely-typed input
//!
//! Record types declare ordered schemas of field types, inherit and
//! propagate attributes along a subtype graph, synthesize nested types from
//! inline blocks, and combine into sums and dynamic unions.
//!
//! ```ignore
//! use aerostruct::{types, RecordType};
//! use serde_json::json;
//!
//! let user = RecordType::define("User");
//! user.attribute("name", types::string())?;
//! user.attribute("age?", types::coercible(types::Primitive::Integer))?;
//!
//! let jane = user.call(json!({"name": "Jane", "age": "31"}))?;
//! assert_eq!(jane.get("age")?.as_int(), Some(31));
//! ```

pub mod cli;
pub mod compiler;
pub mod config;
pub mod observability;
pub mod record;
pub mod schema;
pub mod sum;
pub mod types;
pub mod union;
pub mod value;

pub use compiler::{Ast, Compiler, ScopeRef, TypeRef};
pub use config::EngineConfig;
pub use record::{Constructor, Record, RecordType};
pub use schema::{ConstructorPolicy, Failure, StructError, StructResult};
pub use sum::{Branch, SumType};
pub use types::{FieldType, FieldTypeRef};
pub use union::{Scope, UnionOptions, UnionResolver};
pub use value::{Attributes, Value};
