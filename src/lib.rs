//! # Weft
//!
//! Compiler for component-based markup. Custom tags resolve to component files, caller content
//! is distributed into slots, and inline styles and scripts are collected into deduplicated,
//! dependency-ordered bundles.
//!
//! ## Pipeline
//!
//! 1. **Discovery**: a glob, a file list or an explicit map produces `tag → path` entries.
//! 2. **Registry**: each component file is parsed and analysed once per run (scope id, host tag
//!    policy, declared slots, setup bindings). Concurrent requests share one in-flight build.
//! 3. **Serializer**: a depth-first walk over the input document resolves components, applies
//!    `webc:*` directives, evaluates dynamic attributes and diverts styles and scripts into
//!    asset fragments. Usage edges are cycle-checked as they are recorded.
//! 4. **Aggregation**: fragments are deduplicated per bucket and shared ones are elevated to the
//!    nearest component using every owner.
//!
//! ## Invariants
//!
//! - Parsed trees are never mutated. Per-instance attributes travel in side-tables keyed by
//!   [`node::NodeId`].
//! - Output order follows document order, never completion order.
//! - Every error aborts the whole run. There is no partial result.

pub mod assets;
pub mod attributes;
pub mod cascade;
pub mod compiler;
pub mod config;
pub mod css;
pub mod directives;
pub mod discovery;
pub mod error;
pub mod expression;
pub mod graph;
pub mod node;
pub mod parse;
pub mod registry;
pub mod resolve;
pub mod scope;
pub mod serializer;
pub mod static_eval;
pub mod stream;
pub mod transform;

#[cfg(test)]
mod compile_tests;
#[cfg(test)]
mod safety_tests;

pub use assets::{AssetBundle, AssetKind};
pub use cascade::DataCascade;
pub use compiler::{CompilationResult, Compiler, RunSummary};
pub use config::CompilerConfig;
pub use css::{scope_hash, CssPrefixer};
pub use discovery::ComponentSource;
pub use error::{CompilerError, Result};
pub use expression::{EvaluationError, ExpressionEvaluator, Helper};
pub use registry::{ComponentDefinition, HostTagPolicy};
pub use resolve::{FsLoader, MemoryLoader, Resolver, SourceLoader};
pub use static_eval::StaticEvaluator;
pub use stream::{CompilationStream, StreamedOutput};
pub use transform::Transform;
