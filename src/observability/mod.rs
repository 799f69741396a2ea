//! Observability subsystem
//!
//! - Structured logging (JSON, one line per event)
//! - Process-wide counters
//!
//! Observability is read-only: nothing here influences construction results.
//!
//! ```ignore
//! use aerostruct::observability::{log_event_with_fields, metrics, Event};
//!
//! log_event_with_fields(Event::TypeDefined, &[("type", "User")]);
//! metrics().increment_types_defined();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{metrics, MetricsRegistry, MetricsSnapshot};

/// Log a lifecycle event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // This just verifies no panic
        log_event(Event::DefinitionsLoaded);
        log_event(Event::UnionBound);
    }

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::ConfigLoaded, &[("definitions_dir", "/tmp/test")]);
    }
}
