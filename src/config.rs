//! Compiler configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::assets::DEFAULT_BUCKET;
use crate::error::{CompilerError, Result};
use crate::resolve::DEFAULT_EXTENSION;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// Directory every component path is relative to. Imports may not leave it.
    pub project_root: PathBuf,
    /// Suffix appended to bare package or directory references.
    pub file_extension: String,
    /// Import aliases, `name` → root-relative directory. `npm` is always defined.
    pub aliases: IndexMap<String, String>,
    /// Render sibling subtrees on the rayon pool.
    pub concurrent: bool,
    /// Bucket receiving fragments without a `webc:bucket`.
    pub default_bucket: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            file_extension: DEFAULT_EXTENSION.to_string(),
            aliases: IndexMap::new(),
            concurrent: true,
            default_bucket: DEFAULT_BUCKET.to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CompilerError::Parse {
            file: "<config>".to_string(),
            message: format!("Invalid compiler configuration: {}", e),
        })
    }
}
