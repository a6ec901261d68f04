//! File resolution and source loading.
//!
//! Component paths are canonical, `/`-separated keys relative to the project root. A
//! [`Resolver`] turns an import reference into such a key and a [`SourceLoader`] turns a key
//! into source text.

use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::discovery::walk_files;
use crate::error::{CompilerError, Result};

pub const DEFAULT_EXTENSION: &str = ".webc";
pub const DEFAULT_ALIAS: &str = "npm";
pub const DEFAULT_ALIAS_TARGET: &str = "node_modules";

// ═══════════════════════════════════════════════════════════════════════════════
// LOADERS
// ═══════════════════════════════════════════════════════════════════════════════

pub trait SourceLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<String>;

    fn exists(&self, path: &str) -> bool;

    /// Every file the loader can see, as canonical keys. Used for glob discovery.
    fn list(&self) -> Result<Vec<String>>;
}

/// Reads component sources from disk below a project root.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, path: &str) -> PathBuf {
        self.root.join(Path::new(path))
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, path: &str) -> Result<String> {
        std::fs::read_to_string(self.full_path(path)).map_err(|e| CompilerError::io(path, e))
    }

    fn exists(&self, path: &str) -> bool {
        self.full_path(path).is_file()
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(walk_files(&self.root))
    }
}

/// Virtual file system, mostly for tests and for content supplied directly by the caller.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    files: RwLock<HashMap<String, String>>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&self, path: &str, content: &str) {
        let key = normalize_path(path).unwrap_or_else(|_| path.to_string());
        self.files.write().insert(key, content.to_string());
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.read().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl SourceLoader for MemoryLoader {
    fn load(&self, path: &str) -> Result<String> {
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| CompilerError::io(path, "no such file"))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.paths())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATHS
// ═══════════════════════════════════════════════════════════════════════════════

/// Collapse `.`/`..` segments and separators. Fails when the path climbs above the root.
pub fn normalize_path(path: &str) -> std::result::Result<String, String> {
    let unified = path.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(format!("`{}` resolves outside the project root", path));
                }
            }
            other => segments.push(other),
        }
    }
    Ok(segments.join("/"))
}

/// Directory part of a canonical key (`a/b/c.webc` → `a/b`).
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(index) => &path[..index],
        None => "",
    }
}

/// File name without extension (`a/my-card.webc` → `my-card`).
pub fn file_stem(path: &str) -> &str {
    let name = match path.rfind('/') {
        Some(index) => &path[index + 1..],
        None => path,
    };
    match name.find('.') {
        Some(index) if index > 0 => &name[..index],
        _ => name,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RESOLVER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct Resolver {
    aliases: IndexMap<String, String>,
    extension: String,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new(IndexMap::new(), DEFAULT_EXTENSION)
    }
}

impl Resolver {
    /// `aliases` maps an alias name (without the trailing `:`) to a root-relative directory.
    /// The `npm` alias is always available unless overridden.
    pub fn new(aliases: IndexMap<String, String>, extension: &str) -> Self {
        let mut all = IndexMap::new();
        all.insert(DEFAULT_ALIAS.to_string(), DEFAULT_ALIAS_TARGET.to_string());
        for (name, target) in aliases {
            all.insert(name.trim_end_matches(':').to_string(), target);
        }
        let extension = if extension.starts_with('.') || extension.is_empty() {
            extension.to_string()
        } else {
            format!(".{}", extension)
        };
        Self {
            aliases: all,
            extension,
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Resolve `reference` as written in `from_file` into a canonical key.
    pub fn resolve(&self, reference: &str, from_file: Option<&str>) -> Result<String> {
        let invalid = |reason: String| CompilerError::InvalidReference {
            reference: reference.to_string(),
            reason,
        };
        let reference_trimmed = reference.trim();

        let joined = match split_alias(reference_trimmed) {
            Some((alias, rest)) => {
                let target = self
                    .aliases
                    .get(alias)
                    .ok_or_else(|| invalid(format!("unknown alias `{}:`", alias)))?;
                format!("{}/{}", target, rest)
            }
            None => match reference_trimmed.strip_prefix('/') {
                Some(absolute) => absolute.to_string(),
                None => {
                    let base = from_file.map(parent_dir).unwrap_or("");
                    if base.is_empty() {
                        reference_trimmed.to_string()
                    } else {
                        format!("{}/{}", base, reference_trimmed)
                    }
                }
            },
        };

        let mut resolved = normalize_path(&joined).map_err(invalid)?;
        if resolved.is_empty() {
            return Err(invalid("empty reference".to_string()));
        }

        let last = resolved.rsplit('/').next().unwrap_or("").to_string();
        if !last.contains('.') {
            resolved = format!("{}/{}{}", resolved, last, self.extension);
        }

        tracing::debug!("Resolved `{}` from {:?} to `{}`", reference, from_file, resolved);
        Ok(resolved)
    }
}

/// `npm:pkg/x` → `("npm", "pkg/x")`. Windows drive letters and plain paths yield `None`.
fn split_alias(reference: &str) -> Option<(&str, &str)> {
    let colon = reference.find(':')?;
    let alias = &reference[..colon];
    let is_alias_name = alias.len() > 1
        && alias
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '@');
    if is_alias_name {
        Some((alias, &reference[colon + 1..]))
    } else {
        None
    }
}
