//! CLI command implementations
//!
//! Every command boots the same way: load the configuration (or the
//! defaults), install the log threshold, then load all definitions.

use std::path::Path;

use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::record::RecordType;
use crate::schema::{DefinitionLoader, StructResult};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_input, write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.config.as_deref(), cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(config_path: Option<&Path>, cmd: Command) -> CliResult<()> {
    let loader = boot(config_path)?;
    match cmd {
        Command::Check { type_name, input } => check(&loader, &type_name, input.as_deref()),
        Command::Describe { type_name } => describe(&loader, &type_name),
        Command::List => list(&loader),
    }
}

/// Load configuration and definitions
pub fn boot(config_path: Option<&Path>) -> CliResult<DefinitionLoader> {
    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.apply();

    let mut loader = config.loader();
    loader.load_all()?;
    Ok(loader)
}

/// Build a record from the input document.
///
/// A rejected input is reported on stdout as an error response; only
/// unknown names and I/O problems fail the command.
pub fn check(loader: &DefinitionLoader, type_name: &str, input: Option<&Path>) -> CliResult<()> {
    let input = read_input(input)?;
    match build(loader, type_name, input)? {
        Ok(data) => write_response(data),
        Err(e) => write_error(e.code(), &e.to_string()),
    }
}

/// Outer result: the name lookup. Inner result: construction.
pub fn build(
    loader: &DefinitionLoader,
    type_name: &str,
    input: Value,
) -> CliResult<StructResult<Value>> {
    if let Some(record_type) = loader.record_type(type_name) {
        return Ok(record_type.call(input).map(|record| record.to_json()));
    }
    if let Some(scope) = loader.scope(type_name) {
        return Ok(scope.call(input).map(|record| record.to_json()));
    }
    Err(CliError::unknown_type(type_name))
}

/// Print a type's description
pub fn describe(loader: &DefinitionLoader, type_name: &str) -> CliResult<()> {
    let record_type = loader
        .record_type(type_name)
        .ok_or_else(|| CliError::unknown_type(type_name))?;
    write_response(describe_type(record_type))
}

pub fn describe_type(record_type: &RecordType) -> Value {
    let keys: Vec<Value> = record_type
        .schema()
        .keys()
        .map(|key| {
            json!({
                "name": key.name,
                "required": key.required,
                "type": key.field_type.name(),
            })
        })
        .collect();
    let nested: Vec<String> = record_type
        .nested_types()
        .into_iter()
        .map(|(name, _)| name)
        .collect();

    json!({
        "name": record_type.display_name(),
        "parent": record_type.parent().map(|p| p.display_name().to_string()),
        "policy": record_type.policy().as_str(),
        "abstract": record_type.is_abstract(),
        "keys": keys,
        "nested": nested,
        "ast": record_type.to_ast().to_json(),
    })
}

/// Print loaded type and union names
pub fn list(loader: &DefinitionLoader) -> CliResult<()> {
    write_response(json!({
        "types": loader.type_names(),
        "unions": loader.union_names(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DefinitionLoader) {
        let temp_dir = TempDir::new().unwrap();
        let defs = temp_dir.path().join("definitions");
        fs::create_dir_all(&defs).unwrap();
        fs::write(
            defs.join("shapes.json"),
            r#"{
                "unions": [{"name": "Shape"}],
                "types": [
                    {"name": "Circle", "scope": "Shape", "policy": "strict",
                     "attributes": {"radius": "float"}},
                    {"name": "Square", "scope": "Shape", "policy": "strict",
                     "attributes": {"side": "float", "label?": "string"}}
                ]
            }"#,
        )
        .unwrap();

        let config_path = temp_dir.path().join("aerostruct.json");
        fs::write(
            &config_path,
            format!(
                r#"{{"definitions_dir": {}, "log_level": "FATAL"}}"#,
                serde_json::to_string(&defs).unwrap()
            ),
        )
        .unwrap();

        let loader = boot(Some(&config_path)).unwrap();
        (temp_dir, loader)
    }

    #[test]
    fn test_boot_loads_definitions() {
        let (_dir, loader) = setup();
        assert_eq!(loader.type_names(), vec!["Circle", "Square"]);
        assert_eq!(loader.union_names(), vec!["Shape"]);
    }

    #[test]
    fn test_build_through_union() {
        let (_dir, loader) = setup();
        let data = build(&loader, "Shape", json!({"side": 2})).unwrap().unwrap();
        assert_eq!(data, json!({"side": 2.0}));
    }

    #[test]
    fn test_build_rejection_is_inner_error() {
        let (_dir, loader) = setup();
        let err = build(&loader, "Circle", json!({"radius": "big"}))
            .unwrap()
            .unwrap_err();
        assert_eq!(err.root_cause().code(), "AERO_STRUCT_INVALID_TYPE");
    }

    #[test]
    fn test_build_unknown_name() {
        let (_dir, loader) = setup();
        let err = build(&loader, "Hexagon", json!({})).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_UNKNOWN_TYPE");
    }

    #[test]
    fn test_describe_type() {
        let (_dir, loader) = setup();
        let description = describe_type(loader.record_type("Square").unwrap());

        assert_eq!(description["policy"], "strict");
        assert_eq!(description["abstract"], false);
        assert_eq!(
            description["keys"],
            json!([
                {"name": "side", "required": true, "type": "float"},
                {"name": "label", "required": false, "type": "string"}
            ])
        );
        assert_eq!(description["ast"][0], "record");
    }

    #[test]
    fn test_boot_with_bad_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("aerostruct.json");
        fs::write(&config_path, "{not json").unwrap();

        let err = boot(Some(&config_path)).unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_CONFIG_ERROR");
    }
}
