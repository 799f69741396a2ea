//! Record types and their instances
//!
//! ```ignore
//! use aerostruct::{types, RecordType};
//!
//! let user = RecordType::define("User");
//! user.attribute("name", types::string())?
//!     .attribute("age", types::default(types::integer(), 18)?)?;
//! user.nested_attribute("roles", Some(types::array()), |role| {
//!     role.attribute("id", types::integer())?;
//!     Ok(())
//! })?;
//!
//! let jane = user.call(serde_json::json!({"name": "Jane", "roles": [{"id": 1}]}))?;
//! ```

mod builder;
mod constructor;
mod inflector;
mod instance;
mod record_type;

pub use builder::NestedTypeBuilder;
pub use constructor::{Constructor, InputFn};
pub use inflector::{camelize, singularize};
pub use instance::Record;
pub use record_type::{KeyTransform, RecordType, TypeTransform};

pub(crate) use record_type::TypeNode;
