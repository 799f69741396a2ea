//! Union resolution over a scope's live member set
//!
//! Every lookup takes a snapshot of the scope's members. The sorted member
//! names key a cache of resolutions, so registering a new candidate simply
//! produces a new key; stale entries are never consulted again and need no
//! eviction. Concurrent misses on the same key may each compute a
//! resolution, but only the first one inserted is ever returned.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Deserialize;

use super::scope::{MemberSnapshot, Members, Scope};
use crate::observability::{log_event_with_fields, metrics, Event};
use crate::record::{Record, RecordType};
use crate::schema::{StructError, StructResult};
use crate::sum::SumType;
use crate::value::Value;

/// Include/exclude lists of a union
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnionOptions {
    /// Ordered allow-list; all current members when absent
    pub include: Option<Vec<String>>,
    /// Names removed after the include list is applied
    pub exclude: Vec<String>,
}

impl UnionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = names.into_iter().map(Into::into).collect();
        self
    }

    fn validate(&self, scope: &str) -> StructResult<()> {
        match &self.include {
            Some(include) if include.is_empty() => Err(StructError::invalid_definition(
                scope,
                "include list must not be empty",
            )),
            _ => Ok(()),
        }
    }
}

/// The combined type a union resolves to.
///
/// An empty resolution is still a value: it rejects every input with
/// `NoCandidates` instead of failing at resolution time.
#[derive(Debug, Clone)]
pub enum ResolvedSum {
    Single(RecordType),
    Sum(SumType),
    Empty { scope: String },
}

impl ResolvedSum {
    fn fold(scope: &str, types: &[RecordType]) -> ResolvedSum {
        let mut iter = types.iter().cloned();
        let first = match iter.next() {
            Some(first) => first,
            None => {
                return ResolvedSum::Empty {
                    scope: scope.to_string(),
                }
            }
        };
        iter.fold(ResolvedSum::Single(first), |acc, next| match acc {
            ResolvedSum::Single(t) => ResolvedSum::Sum(t | next),
            ResolvedSum::Sum(s) => ResolvedSum::Sum(s | next),
            empty => empty,
        })
    }

    pub fn call(&self, input: impl Into<Value>) -> StructResult<Record> {
        match self {
            ResolvedSum::Single(t) => t.construct(input.into()),
            ResolvedSum::Sum(s) => s.dispatch(input.into()),
            ResolvedSum::Empty { scope } => Err(StructError::NoCandidates {
                scope: scope.clone(),
            }),
        }
    }

    pub fn is_instance(&self, value: &Value) -> bool {
        match self {
            ResolvedSum::Single(t) => matches!(value, Value::Record(r) if r.is_a(t)),
            ResolvedSum::Sum(s) => s.is_instance(value),
            ResolvedSum::Empty { .. } => false,
        }
    }
}

/// Everything computed for one member snapshot
#[derive(Debug)]
struct Resolution {
    types: Vec<RecordType>,
    sum: ResolvedSum,
    name: String,
}

/// Computes the candidate union of a scope
#[derive(Debug)]
pub struct UnionResolver {
    scope_name: String,
    members: Arc<Members>,
    options: UnionOptions,
    cache: DashMap<Vec<String>, Arc<Resolution>>,
}

impl UnionResolver {
    /// Bind `scope` to a new resolver. A scope can be bound only once.
    pub fn bind(scope: &Scope, options: UnionOptions) -> StructResult<Arc<UnionResolver>> {
        options.validate(scope.name())?;

        let resolver = Arc::new(UnionResolver {
            scope_name: scope.name().to_string(),
            members: scope.shared_members(),
            options,
            cache: DashMap::new(),
        });
        scope.install(Arc::clone(&resolver))?;

        log_event_with_fields(Event::UnionBound, &[("scope", scope.name())]);
        Ok(resolver)
    }

    pub fn scope_name(&self) -> &str {
        &self.scope_name
    }

    pub fn options(&self) -> &UnionOptions {
        &self.options
    }

    /// Instantiable candidates, in include order (or sorted by member name)
    pub fn types(&self) -> StructResult<Vec<RecordType>> {
        Ok(self.resolution()?.types.clone())
    }

    /// Candidates folded left to right with `|`
    pub fn sum(&self) -> StructResult<ResolvedSum> {
        Ok(self.resolution()?.sum.clone())
    }

    /// `Scope<[A | B]>`; anonymous candidates render as `Unknown`
    pub fn name(&self) -> StructResult<String> {
        Ok(self.resolution()?.name.clone())
    }

    pub fn call(&self, input: impl Into<Value>) -> StructResult<Record> {
        self.sum()?.call(input)
    }

    /// Number of snapshots resolved so far
    pub fn cached_snapshots(&self) -> usize {
        self.cache.len()
    }

    fn resolution(&self) -> StructResult<Arc<Resolution>> {
        let snapshot = self.members.snapshot();

        if let Some(hit) = self.cache.get(&snapshot.names) {
            metrics().increment_union_cache_hits();
            return Ok(Arc::clone(hit.value()));
        }

        metrics().increment_union_cache_misses();
        let resolution = self.resolve_snapshot(&snapshot)?;

        log_event_with_fields(
            Event::UnionResolved,
            &[
                ("scope", &self.scope_name),
                ("members", &snapshot.names.len().to_string()),
                ("union", &resolution.name),
            ],
        );

        let stored = self
            .cache
            .entry(snapshot.names)
            .or_insert_with(|| Arc::new(resolution));
        Ok(Arc::clone(stored.value()))
    }

    fn resolve_snapshot(&self, snapshot: &MemberSnapshot) -> StructResult<Resolution> {
        let entries = &snapshot.entries;
        let candidates: Vec<&String> = match &self.options.include {
            Some(include) => include.iter().collect(),
            None => snapshot.names.iter().collect(),
        };

        let mut types = Vec::with_capacity(candidates.len());
        for name in candidates {
            if self.options.exclude.contains(name) {
                continue;
            }
            let record_type =
                entries
                    .get(name)
                    .cloned()
                    .ok_or_else(|| StructError::CandidateNotFound {
                        name: name.clone(),
                        scope: self.scope_name.clone(),
                    })?;
            if !record_type.is_abstract() {
                types.push(record_type);
            }
        }

        let names: Vec<&str> = types
            .iter()
            .map(|t| t.name().unwrap_or("Unknown"))
            .collect();
        let name = format!("{}<[{}]>", self.scope_name, names.join(" | "));

        Ok(Resolution {
            sum: ResolvedSum::fold(&self.scope_name, &types),
            types,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types;
    use serde_json::json;

    fn weather_scope() -> Scope {
        let scope = Scope::new("Weather");
        let base = RecordType::define("Weather::Base");
        base.make_abstract();
        scope.register("Base", base.clone()).unwrap();

        let sunny = base.subtype("Weather::Sunny");
        sunny.attribute("uv_index", types::integer()).unwrap();
        scope.register("Sunny", sunny).unwrap();

        let rainy = base.subtype("Weather::Rainy");
        rainy.attribute("millimeters", types::float()).unwrap();
        scope.register("Rainy", rainy).unwrap();
        scope
    }

    #[test]
    fn test_abstract_members_are_filtered() {
        let scope = weather_scope();
        let resolver = UnionResolver::bind(&scope, UnionOptions::new()).unwrap();

        let names: Vec<_> = resolver
            .types()
            .unwrap()
            .iter()
            .map(|t| t.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["Weather::Rainy", "Weather::Sunny"]);
        assert_eq!(
            resolver.name().unwrap(),
            "Weather<[Weather::Rainy | Weather::Sunny]>"
        );
    }

    #[test]
    fn test_overlapping_members_dispatch_in_name_order() {
        let scope = Scope::new("Weather");
        for name in ["Sunny", "Rainy"] {
            let t = RecordType::define(name);
            t.attribute("temp", types::integer()).unwrap();
            scope.register(name, t).unwrap();
        }
        let resolver = UnionResolver::bind(&scope, UnionOptions::new()).unwrap();

        assert_eq!(resolver.name().unwrap(), "Weather<[Rainy | Sunny]>");
        let record = resolver.call(json!({"temp": 12})).unwrap();
        assert_eq!(record.record_type().display_name(), "Rainy");
        assert_eq!(scope.members(), vec!["Sunny", "Rainy"]);
    }

    #[test]
    fn test_include_order_and_exclude() {
        let scope = weather_scope();
        let resolver = UnionResolver::bind(
            &scope,
            UnionOptions::new()
                .include(["Rainy", "Sunny"])
                .exclude(["Sunny"]),
        )
        .unwrap();

        let types = resolver.types().unwrap();
        assert_eq!(types.len(), 1);
        assert_eq!(types[0].display_name(), "Weather::Rainy");
        assert!(matches!(resolver.sum().unwrap(), ResolvedSum::Single(_)));
    }

    #[test]
    fn test_include_of_unknown_member() {
        let scope = weather_scope();
        let resolver =
            UnionResolver::bind(&scope, UnionOptions::new().include(["Snowy"])).unwrap();
        let err = resolver.types().unwrap_err();
        assert!(matches!(err, StructError::CandidateNotFound { ref name, .. } if name == "Snowy"));
    }

    #[test]
    fn test_empty_include_rejected() {
        let scope = weather_scope();
        let err =
            UnionResolver::bind(&scope, UnionOptions::new().include(Vec::<String>::new()))
                .unwrap_err();
        assert_eq!(err.code(), "AERO_STRUCT_INVALID_DEFINITION");
        assert!(!scope.is_bound());
    }

    #[test]
    fn test_empty_union_fails_lazily() {
        let scope = Scope::new("Nothing");
        let resolver = UnionResolver::bind(&scope, UnionOptions::new()).unwrap();

        let sum = resolver.sum().unwrap();
        let err = sum.call(json!({})).unwrap_err();
        assert_eq!(err.code(), "AERO_STRUCT_NO_CANDIDATES");
        assert_eq!(resolver.name().unwrap(), "Nothing<[]>");
    }

    #[test]
    fn test_bind_once() {
        let scope = weather_scope();
        UnionResolver::bind(&scope, UnionOptions::new()).unwrap();
        let err = UnionResolver::bind(&scope, UnionOptions::new()).unwrap_err();
        assert_eq!(err.code(), "AERO_STRUCT_BINDING");
    }

    #[test]
    fn test_anonymous_members_render_unknown() {
        let scope = Scope::new("Things");
        scope.register("A", RecordType::anonymous()).unwrap();
        let resolver = UnionResolver::bind(&scope, UnionOptions::new()).unwrap();
        assert_eq!(resolver.name().unwrap(), "Things<[Unknown]>");
    }

    #[test]
    fn test_cache_reused_for_same_snapshot() {
        let scope = weather_scope();
        let resolver = UnionResolver::bind(&scope, UnionOptions::new()).unwrap();

        resolver.sum().unwrap();
        resolver.name().unwrap();
        resolver.types().unwrap();
        assert_eq!(resolver.cached_snapshots(), 1);

        scope.register("Foggy", RecordType::define("Weather::Foggy")).unwrap();
        resolver.types().unwrap();
        assert_eq!(resolver.cached_snapshots(), 2);
    }
}
