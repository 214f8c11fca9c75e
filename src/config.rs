//! Compile options, loadable from a JSON file.

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{errors::CompileError, macros::MAX_MACRO_RECURSION_DEPTH};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Extension that marks an import specifier as a source module.
    pub source_extension: String,
    /// Specifier generated modules import the runtime helpers from.
    pub runtime_module: String,
    /// Emit the runtime helpers into every module instead of importing them.
    pub inline_runtime: bool,
    pub max_expansion_depth: usize,
    /// Load the built-in global macros.
    pub include_prelude: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            source_extension: "sprig".to_string(),
            runtime_module: "./sprig-runtime.js".to_string(),
            inline_runtime: false,
            max_expansion_depth: MAX_MACRO_RECURSION_DEPTH,
            include_prelude: true,
        }
    }
}

impl CompileOptions {
    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, CompileError> {
        serde_json::from_str(text).map_err(|error| CompileError::Config {
            path: origin.to_string(),
            error,
        })
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CompileError> {
        let text = fs::read_to_string(path).map_err(|error| CompileError::Io {
            path: path.display().to_string(),
            error,
        })?;
        Self::from_json_str(&text, &path.display().to_string())
    }
}
