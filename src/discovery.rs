//! Component discovery.
//!
//! A component map can be given three ways: a glob over the project (`components/**/*.webc`),
//! a list of files, or an explicit `tag → path` map. Globs and lists name each component after
//! its file stem.

use glob::{MatchOptions, Pattern};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use walkdir::WalkDir;

use crate::error::{CompilerError, Result};
use crate::resolve::{file_stem, normalize_path, SourceLoader};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentSource {
    Glob(String),
    List(Vec<String>),
    Map(IndexMap<String, String>),
}

impl From<&str> for ComponentSource {
    fn from(pattern: &str) -> Self {
        ComponentSource::Glob(pattern.to_string())
    }
}

impl From<Vec<String>> for ComponentSource {
    fn from(paths: Vec<String>) -> Self {
        ComponentSource::List(paths)
    }
}

impl From<IndexMap<String, String>> for ComponentSource {
    fn from(map: IndexMap<String, String>) -> Self {
        ComponentSource::Map(map)
    }
}

/// Every regular file below `root`, as sorted `/`-separated paths relative to it.
pub fn walk_files(root: &Path) -> Vec<String> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .flatten()
    {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push(key);
        }
    }

    files
}

/// Compile a component glob. `*` and `?` stay within one path segment, `**/` spans any
/// number of directories.
pub fn compile_glob(pattern: &str) -> Result<Pattern> {
    let pattern = pattern.trim_start_matches("./");
    Pattern::new(pattern).map_err(|e| CompilerError::InvalidReference {
        reference: pattern.to_string(),
        reason: format!("invalid glob: {}", e),
    })
}

fn glob_matches(pattern: &Pattern, path: &str) -> bool {
    pattern.matches_with(
        path,
        MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        },
    )
}

/// Tag names for a list of component files, in list order.
pub fn map_from_paths<I, S>(paths: I) -> Result<IndexMap<String, String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut map = IndexMap::new();
    for path in paths {
        let path = path.as_ref();
        let key = normalize_path(path).map_err(|reason| CompilerError::InvalidReference {
            reference: path.to_string(),
            reason,
        })?;
        map.insert(file_stem(&key).to_ascii_lowercase(), key);
    }
    Ok(map)
}

/// Resolve a component source into a `tag → path` map.
pub fn discover(source: &ComponentSource, loader: &dyn SourceLoader) -> Result<IndexMap<String, String>> {
    let map = match source {
        ComponentSource::Glob(pattern) => {
            let matcher = compile_glob(pattern)?;
            let matched: Vec<String> = loader
                .list()?
                .into_iter()
                .filter(|path| glob_matches(&matcher, path))
                .collect();
            map_from_paths(matched)?
        }
        ComponentSource::List(paths) => map_from_paths(paths)?,
        ComponentSource::Map(map) => {
            let mut normalized = IndexMap::new();
            for (tag, path) in map {
                let key = normalize_path(path).map_err(|reason| CompilerError::InvalidReference {
                    reference: path.clone(),
                    reason,
                })?;
                normalized.insert(tag.to_ascii_lowercase(), key);
            }
            normalized
        }
    };
    tracing::debug!("Discovered {} component(s) from {:?}", map.len(), source);
    Ok(map)
}
