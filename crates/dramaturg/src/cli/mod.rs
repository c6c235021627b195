//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the dramaturg binary.

mod analyze;
mod commands;
mod compare;
mod stats;
mod validate;

pub use analyze::{AnalyzeOptions, analyze_script};
pub use commands::{Cli, Commands, OutputFormat};
pub use compare::compare_variants;
pub use stats::show_stats;
pub use validate::validate_script;

use dramaturg::{DramaturgConfig, DramaturgResult, JsonError, Script, ScriptError, ScriptErrorKind};
use serde::Serialize;
use std::path::Path;

/// Loads the configuration from an explicit file or the layered lookup.
pub fn load_config(path: Option<&Path>) -> DramaturgResult<DramaturgConfig> {
    match path {
        Some(path) => DramaturgConfig::from_file(path),
        None => DramaturgConfig::load(),
    }
}

/// Reads and decodes a script file. Invariants are checked later.
pub(crate) fn read_script(path: &Path) -> DramaturgResult<Script> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        ScriptError::new(ScriptErrorKind::Io(format!("{}: {}", path.display(), e)))
    })?;
    Ok(Script::from_json(&text)?)
}

/// File name used to label a script in history and reports.
pub(crate) fn script_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> DramaturgResult<String> {
    Ok(serde_json::to_string_pretty(value).map_err(|e| JsonError::new(e.to_string()))?)
}
