//! Compiler error taxonomy.
//!
//! Every failure is fatal for the enclosing `compile`/`stream` call. Errors are `Clone` so a
//! memoized precompilation failure can be handed to every caller waiting on the same path.

use serde::Serialize;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_CIRCULAR_DEPENDENCY: &str = "W-ERR-CIRCULAR";
pub const ERR_SCOPE_COLLISION: &str = "W-ERR-SCOPE-COLLISION";
pub const ERR_UNREGISTERED_COMPONENT: &str = "W-ERR-UNREGISTERED";
pub const ERR_INVALID_REFERENCE: &str = "W-ERR-REFERENCE";
pub const ERR_ORPHANED_DIRECTIVE: &str = "W-ERR-ORPHAN";
pub const ERR_CONFLICTING_CONTENT: &str = "W-ERR-CONTENT-CONFLICT";
pub const ERR_EVALUATION: &str = "W-ERR-EVAL";
pub const ERR_NOT_ITERABLE: &str = "W-ERR-NOT-ITERABLE";
pub const ERR_PARSE: &str = "W-ERR-PARSE";
pub const ERR_IO: &str = "W-ERR-IO";
pub const ERR_TRANSFORM: &str = "W-ERR-TRANSFORM";
pub const ERR_UNKNOWN_TRANSFORM: &str = "W-ERR-UNKNOWN-TRANSFORM";
pub const ERR_WORKER: &str = "W-ERR-WORKER";

pub type Result<T> = std::result::Result<T, CompilerError>;

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CompilerError {
    #[error("Circular dependency error: `{owner}` cannot use `{target}` because `{target}` already depends on it")]
    CircularDependency { owner: String, target: String },

    #[error("Scope id `{scope_id}` is claimed by both `{first}` and `{second}`")]
    ScopeCollision {
        scope_id: String,
        first: String,
        second: String,
    },

    #[error("Component at `{path}` is not registered")]
    UnregisteredComponent { path: String },

    #[error("Invalid reference `{reference}`: {reason}")]
    InvalidReference { reference: String, reason: String },

    #[error("`{directive}` has no preceding `webc:if` or `webc:elseif` sibling in `{file}`")]
    OrphanedDirective { directive: String, file: String },

    #[error("`<{tag}>` in `{file}` uses more than one of {directives:?}; only one content directive is allowed")]
    ConflictingContentDirectives {
        tag: String,
        directives: Vec<String>,
        file: String,
    },

    #[error("{message}")]
    Evaluation {
        message: String,
        source_text: String,
        file: String,
        cause: String,
    },

    #[error("`{expression}` in `{file}` is not iterable (got {found})")]
    NotIterable {
        expression: String,
        found: String,
        file: String,
    },

    #[error("Failed to parse `{file}`: {message}")]
    Parse { file: String, message: String },

    #[error("Failed to read `{path}`: {message}")]
    Io { path: String, message: String },

    #[error("Transform `{name}` failed in `{file}`: {message}")]
    Transform {
        name: String,
        message: String,
        file: String,
    },

    #[error("Unknown transform `{name}` requested by `webc:type` in `{file}`")]
    UnknownTransform { name: String, file: String },

    #[error("Streaming worker failed: {message}")]
    Worker { message: String },
}

impl CompilerError {
    pub fn code(&self) -> &'static str {
        match self {
            CompilerError::CircularDependency { .. } => ERR_CIRCULAR_DEPENDENCY,
            CompilerError::ScopeCollision { .. } => ERR_SCOPE_COLLISION,
            CompilerError::UnregisteredComponent { .. } => ERR_UNREGISTERED_COMPONENT,
            CompilerError::InvalidReference { .. } => ERR_INVALID_REFERENCE,
            CompilerError::OrphanedDirective { .. } => ERR_ORPHANED_DIRECTIVE,
            CompilerError::ConflictingContentDirectives { .. } => ERR_CONFLICTING_CONTENT,
            CompilerError::Evaluation { .. } => ERR_EVALUATION,
            CompilerError::NotIterable { .. } => ERR_NOT_ITERABLE,
            CompilerError::Parse { .. } => ERR_PARSE,
            CompilerError::Io { .. } => ERR_IO,
            CompilerError::Transform { .. } => ERR_TRANSFORM,
            CompilerError::UnknownTransform { .. } => ERR_UNKNOWN_TRANSFORM,
            CompilerError::Worker { .. } => ERR_WORKER,
        }
    }

    /// Remediation text shown alongside the message.
    pub fn hint(&self) -> &'static str {
        match self {
            CompilerError::CircularDependency { .. } => {
                "Components may not use themselves, directly or through another component."
            }
            CompilerError::ScopeCollision { .. } => {
                "Each `webc:scoped` override value must be unique to one component file."
            }
            CompilerError::UnregisteredComponent { .. } => {
                "Components must be precompiled before they are instantiated."
            }
            CompilerError::InvalidReference { .. } => {
                "Imports must resolve inside the project root through a known alias."
            }
            CompilerError::OrphanedDirective { .. } => {
                "`webc:else` and `webc:elseif` must directly follow a conditional sibling."
            }
            CompilerError::ConflictingContentDirectives { .. } => {
                "Use only one of `@html`, `@text` or `@raw` on a single element."
            }
            CompilerError::Evaluation { .. } | CompilerError::NotIterable { .. } => {
                "Check the expression against the data available to this component."
            }
            CompilerError::Parse { .. } => "The source could not be parsed.",
            CompilerError::Io { .. } => "The source file could not be read.",
            CompilerError::Transform { .. } | CompilerError::UnknownTransform { .. } => {
                "Register the transform with `Compiler::set_transform` before compiling."
            }
            CompilerError::Worker { .. } => "The background compilation thread stopped unexpectedly.",
        }
    }

    pub(crate) fn circular(owner: &str, target: &str) -> Self {
        CompilerError::CircularDependency {
            owner: owner.to_string(),
            target: target.to_string(),
        }
    }

    pub(crate) fn io(path: &str, err: impl std::fmt::Display) -> Self {
        CompilerError::Io {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}
