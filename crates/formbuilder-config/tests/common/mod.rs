// crates/formbuilder-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config and form reader tests.
// Purpose: Reduce duplication across integration tests for formbuilder-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::path::Path;
use std::path::PathBuf;

use formbuilder_config::ConfigError;
use formbuilder_config::FormBuilderConfig;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Parses a TOML string into a `FormBuilderConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<FormBuilderConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<FormBuilderConfig, toml::de::Error> {
    config_from_toml("")
}

/// Writes `contents` to `name` under `dir` and returns the path.
pub fn write_file(dir: &Path, name: &str, contents: &str) -> Result<PathBuf, String> {
    let path = dir.join(name);
    std::fs::write(&path, contents).map_err(|err| err.to_string())?;
    Ok(path)
}

/// Asserts that `result` failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
