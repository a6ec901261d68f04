//! Compiler entry points.
//!
//! [`Compiler`] collects the input, component map, helpers, transforms and global data, then
//! runs either a buffering [`Compiler::compile`] or a streaming [`Compiler::stream`]. Every run
//! gets a fresh [`ComponentRegistry`], so precompiled definitions and the scope-override table
//! never leak between runs.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::assets::{aggregate, AssetBundle, AssetKind};
use crate::cascade::DataCascade;
use crate::config::CompilerConfig;
use crate::discovery::{discover, ComponentSource};
use crate::error::{CompilerError, Result};
use crate::expression::{ExpressionEvaluator, Helper, HelperMap};
use crate::graph::DependencyGraph;
use crate::parse::parse_template;
use crate::registry::ComponentRegistry;
use crate::resolve::{normalize_path, FsLoader, Resolver, SourceLoader};
use crate::serializer::{Rendered, Serializer};
use crate::static_eval::StaticEvaluator;
use crate::stream::CompilationStream;
use crate::transform::{Transform, TransformMap};

/// Path given to content supplied without one.
pub const INLINE_INPUT_PATH: &str = "<content>.webc";

#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Path(String),
    Content { content: String, path: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationResult {
    pub markup: String,
    pub styles: AssetBundle,
    pub scripts: AssetBundle,
    /// Component paths, closest-used-first, starting with the input itself.
    pub components_used: Vec<String>,
}

/// Everything a run produces besides markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub styles: AssetBundle,
    pub scripts: AssetBundle,
    pub components_used: Vec<String>,
}

pub struct Compiler {
    config: CompilerConfig,
    loader: Arc<dyn SourceLoader>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    resolver: Resolver,
    input: Option<Input>,
    components: IndexMap<String, String>,
    helpers: HelperMap,
    transforms: TransformMap,
    globals: Map<String, Value>,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(CompilerConfig::default())
    }
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        let loader: Arc<dyn SourceLoader> = Arc::new(FsLoader::new(config.project_root.clone()));
        let resolver = Resolver::new(config.aliases.clone(), &config.file_extension);
        Self {
            config,
            loader,
            evaluator: Arc::new(StaticEvaluator::new()),
            resolver,
            input: None,
            components: IndexMap::new(),
            helpers: HelperMap::new(),
            transforms: TransformMap::new(),
            globals: Map::new(),
        }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn set_source_loader(&mut self, loader: Arc<dyn SourceLoader>) {
        self.loader = loader;
    }

    pub fn set_evaluator(&mut self, evaluator: Arc<dyn ExpressionEvaluator>) {
        self.evaluator = evaluator;
    }

    pub fn set_input_path(&mut self, path: &str) -> Result<()> {
        let key = normalize_path(path).map_err(|reason| CompilerError::InvalidReference {
            reference: path.to_string(),
            reason,
        })?;
        self.input = Some(Input::Path(key));
        Ok(())
    }

    /// Compile `content` directly. `path` gives it an identity for relative imports and
    /// error messages.
    pub fn set_input_content(&mut self, content: &str, path: Option<&str>) {
        let path = path
            .and_then(|p| normalize_path(p).ok())
            .unwrap_or_else(|| INLINE_INPUT_PATH.to_string());
        self.input = Some(Input::Content {
            content: content.to_string(),
            path,
        });
    }

    /// Merge components into the map. Later definitions of a tag win.
    pub fn define_components(&mut self, source: impl Into<ComponentSource>) -> Result<()> {
        let discovered = discover(&source.into(), self.loader.as_ref())?;
        self.components.extend(discovered);
        Ok(())
    }

    pub fn component_map(&self) -> &IndexMap<String, String> {
        &self.components
    }

    pub fn set_helper<F>(&mut self, name: &str, helper: F)
    where
        F: Fn(&[Value]) -> std::result::Result<Value, String> + Send + Sync + 'static,
    {
        let helper: Helper = Arc::new(helper);
        self.helpers.insert(name.to_string(), helper);
    }

    pub fn set_transform<F>(&mut self, name: &str, transform: F)
    where
        F: Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        let transform: Transform = Arc::new(transform);
        self.transforms.insert(name.to_string(), transform);
    }

    pub fn set_global_data(&mut self, data: Map<String, Value>) {
        self.globals = data;
    }

    fn job(&self) -> Result<CompileJob> {
        let input = self.input.clone().ok_or_else(|| CompilerError::InvalidReference {
            reference: String::new(),
            reason: "no input was set; call `set_input_path` or `set_input_content`".to_string(),
        })?;
        Ok(CompileJob {
            config: self.config.clone(),
            loader: self.loader.clone(),
            evaluator: self.evaluator.clone(),
            resolver: self.resolver.clone(),
            input,
            components: self.components.clone(),
            helpers: Arc::new(self.helpers.clone()),
            transforms: Arc::new(self.transforms.clone()),
            globals: Arc::new(self.globals.clone()),
        })
    }

    pub fn compile(&self) -> Result<CompilationResult> {
        let job = self.job()?;
        let mut out = Rendered::buffer();
        let summary = job.run(&mut out)?;
        Ok(CompilationResult {
            markup: out.into_markup(),
            styles: summary.styles,
            scripts: summary.scripts,
            components_used: summary.components_used,
        })
    }

    pub fn stream(&self) -> Result<CompilationStream> {
        CompilationStream::spawn(self.job()?)
    }
}

/// Owned snapshot of a compiler, movable onto a worker thread.
pub(crate) struct CompileJob {
    config: CompilerConfig,
    loader: Arc<dyn SourceLoader>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    resolver: Resolver,
    input: Input,
    components: IndexMap<String, String>,
    helpers: Arc<HelperMap>,
    transforms: Arc<TransformMap>,
    globals: Arc<Map<String, Value>>,
}

impl CompileJob {
    pub(crate) fn run(&self, out: &mut Rendered) -> Result<RunSummary> {
        let registry = ComponentRegistry::new(
            self.loader.clone(),
            self.evaluator.clone(),
            self.globals.clone(),
            self.helpers.clone(),
        );
        registry.register(&self.components)?;

        let (path, tree) = match &self.input {
            Input::Path(path) => {
                let source = self.loader.load(path)?;
                (path.clone(), parse_template(&source, path)?)
            }
            Input::Content { content, path } => (path.clone(), parse_template(content, path)?),
        };
        let root = registry.precompile(&path, Some(tree))?;
        tracing::debug!("Compiling {} with {} component(s)", root.path, self.components.len());

        let environment = DataCascade::new(self.globals.clone(), self.helpers.clone());
        let serializer = Serializer::new(
            &registry,
            &self.resolver,
            self.evaluator.as_ref(),
            &self.transforms,
            self.config.concurrent,
            &self.config.default_bucket,
        );
        serializer.render_root(&root, &environment, out)?;

        let graph = DependencyGraph::from_edges(Some(&root.path), &out.edges);
        let bucket = self.config.default_bucket.as_str();
        Ok(RunSummary {
            styles: aggregate(AssetKind::Style, &out.assets, &graph, &root.path, bucket),
            scripts: aggregate(AssetKind::Script, &out.assets, &graph, &root.path, bucket),
            components_used: graph.components_used(),
        })
    }
}
