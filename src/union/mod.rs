//! Dynamic unions over named scopes
//!
//! A [`Scope`] is an explicit registry of candidate record types. Binding
//! it with [`UnionResolver::bind`] turns the scope into a callable type that
//! dispatches across whichever candidates are registered at call time.
//!
//! ```ignore
//! let weather = Scope::new("Weather");
//! UnionResolver::bind(&weather, UnionOptions::new())?;
//! weather.register("Sunny", sunny)?;
//! weather.register("Rainy", rainy)?;
//!
//! let today = weather.call(json!({"millimeters": 4.5}))?;
//! ```

mod resolver;
mod scope;

pub use resolver::{ResolvedSum, UnionOptions, UnionResolver};
pub use scope::Scope;

pub(crate) use scope::ScopeInner;
