//! Component Registry
//!
//! Every component file is parsed and analysed at most once per compilation run. The memo
//! table maps a path to either a pending cell, which concurrent callers block on, or the
//! finished definition. Definitions are immutable once built.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::attributes::{evaluation_error, is_directive};
use crate::cascade::DataCascade;
use crate::css::scope_hash;
use crate::error::{CompilerError, Result};
use crate::expression::{ExpressionEvaluator, HelperMap};
use crate::node::{Attribute, Node, NodeId};
use crate::parse::parse_template;
use crate::resolve::SourceLoader;

pub const SCOPED_MARKER: &str = "webc:scoped";
pub const SETUP_MARKER: &str = "webc:setup";
pub const ROOT_MARKER: &str = "webc:root";
pub const ROOT_OVERRIDE: &str = "override";

/// What happens to the host tag a component is instantiated through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HostTagPolicy {
    /// Only the component's content is rendered.
    Elide,
    /// The host tag is rendered around the content.
    Keep,
    /// The component's root element replaces the host tag and receives its attributes.
    Override,
}

#[derive(Debug)]
pub struct ComponentDefinition {
    pub path: String,
    pub tree: Arc<Node>,
    pub host_policy: HostTagPolicy,
    pub scope_id: Option<String>,
    /// Attributes of a top-level `webc:root` element, merged onto every host.
    pub root_attributes: Vec<Attribute>,
    /// Element standing in for the host in override mode.
    pub override_root: Option<NodeId>,
    pub slots: Vec<String>,
    pub setup: Arc<Map<String, Value>>,
    pub has_shadow_root: bool,
}

impl ComponentDefinition {
    pub fn keeps_host(&self) -> bool {
        self.host_policy == HostTagPolicy::Keep
    }
}

/// Result of looking a tag name up in the component map.
#[derive(Debug, Clone)]
pub enum TagResolution {
    Plain,
    Component(Arc<ComponentDefinition>),
}

enum Entry {
    Pending(Arc<OnceLock<Result<Arc<ComponentDefinition>>>>),
    Ready(Arc<ComponentDefinition>),
}

pub struct ComponentRegistry {
    loader: Arc<dyn SourceLoader>,
    evaluator: Arc<dyn ExpressionEvaluator>,
    globals: Arc<Map<String, Value>>,
    helpers: Arc<HelperMap>,
    components: Mutex<HashMap<String, Entry>>,
    tags: RwLock<IndexMap<String, String>>,
    scope_overrides: Mutex<HashMap<String, String>>,
}

impl ComponentRegistry {
    pub fn new(
        loader: Arc<dyn SourceLoader>,
        evaluator: Arc<dyn ExpressionEvaluator>,
        globals: Arc<Map<String, Value>>,
        helpers: Arc<HelperMap>,
    ) -> Self {
        Self {
            loader,
            evaluator,
            globals,
            helpers,
            components: Mutex::new(HashMap::new()),
            tags: RwLock::new(IndexMap::new()),
            scope_overrides: Mutex::new(HashMap::new()),
        }
    }

    pub fn has_component(&self, path: &str) -> bool {
        matches!(self.components.lock().get(path), Some(Entry::Ready(_)))
    }

    pub fn get_component(&self, path: &str) -> Result<Arc<ComponentDefinition>> {
        let components = self.components.lock();
        match components.get(path) {
            Some(Entry::Ready(definition)) => Ok(definition.clone()),
            Some(Entry::Pending(cell)) => match cell.get() {
                Some(Ok(definition)) => Ok(definition.clone()),
                _ => Err(CompilerError::UnregisteredComponent {
                    path: path.to_string(),
                }),
            },
            None => Err(CompilerError::UnregisteredComponent {
                path: path.to_string(),
            }),
        }
    }

    pub fn path_for_tag(&self, tag: &str) -> Option<String> {
        self.tags.read().get(&tag.to_ascii_lowercase()).cloned()
    }

    pub fn component_map(&self) -> IndexMap<String, String> {
        self.tags.read().clone()
    }

    /// Merge `tag → path` entries and precompile every newly introduced path in parallel.
    pub fn register(&self, map: &IndexMap<String, String>) -> Result<()> {
        let new_paths: Vec<String> = {
            let mut tags = self.tags.write();
            let mut fresh = Vec::new();
            for (tag, path) in map {
                tags.insert(tag.to_ascii_lowercase(), path.clone());
                if !fresh.contains(path) {
                    fresh.push(path.clone());
                }
            }
            fresh
                .into_iter()
                .filter(|path| !self.has_component(path))
                .collect()
        };

        tracing::debug!("Registering {} component(s)", new_paths.len());
        new_paths
            .par_iter()
            .map(|path| self.precompile(path, None).map(|_| ()))
            .collect::<Result<Vec<()>>>()?;
        Ok(())
    }

    /// Map one tag to `path` and precompile it.
    pub fn register_tag(&self, tag: &str, path: &str) -> Result<Arc<ComponentDefinition>> {
        self.tags
            .write()
            .insert(tag.to_ascii_lowercase(), path.to_string());
        self.precompile(path, None)
    }

    pub fn resolve_tag(&self, tag: &str) -> Result<TagResolution> {
        match self.path_for_tag(tag) {
            Some(path) => Ok(TagResolution::Component(self.get_component(&path)?)),
            None => Ok(TagResolution::Plain),
        }
    }

    /// Build (or join the in-flight build of) the definition for `path`.
    pub fn precompile(
        &self,
        path: &str,
        tree: Option<Arc<Node>>,
    ) -> Result<Arc<ComponentDefinition>> {
        let cell = {
            let mut components = self.components.lock();
            match components.get(path) {
                Some(Entry::Ready(definition)) => return Ok(definition.clone()),
                Some(Entry::Pending(cell)) => cell.clone(),
                None => {
                    let cell = Arc::new(OnceLock::new());
                    components.insert(path.to_string(), Entry::Pending(cell.clone()));
                    cell
                }
            }
        };

        let result = cell.get_or_init(|| self.build_definition(path, tree)).clone();
        if let Ok(definition) = &result {
            self.components
                .lock()
                .insert(path.to_string(), Entry::Ready(definition.clone()));
        }
        result
    }

    fn build_definition(
        &self,
        path: &str,
        tree: Option<Arc<Node>>,
    ) -> Result<Arc<ComponentDefinition>> {
        let tree = match tree {
            Some(tree) => tree,
            None => {
                let source = self.loader.load(path)?;
                parse_template(&source, path)?
            }
        };

        let scope_id = self.compute_scope_id(&tree, path)?;
        let setup = self.evaluate_setup(&tree, path)?;
        let (host_policy, root_attributes, override_root) = host_policy_of(&tree);
        let slots = declared_slots(&tree);
        let has_shadow_root = tree.any_descendant(&is_shadow_root);

        tracing::debug!(
            "Precompiled {} (scope: {:?}, host: {:?}, slots: {:?})",
            path,
            scope_id,
            host_policy,
            slots
        );

        Ok(Arc::new(ComponentDefinition {
            path: path.to_string(),
            tree,
            host_policy,
            scope_id,
            root_attributes,
            override_root,
            slots,
            setup: Arc::new(setup),
            has_shadow_root,
        }))
    }

    /// Explicit override wins, otherwise a hash of all root-level scoped style text.
    fn compute_scope_id(&self, tree: &Node, path: &str) -> Result<Option<String>> {
        let scoped: Vec<&Arc<Node>> = tree
            .children
            .iter()
            .filter(|n| n.is_tag("style") && n.has_attribute(SCOPED_MARKER))
            .collect();
        if scoped.is_empty() {
            return Ok(None);
        }

        let explicit = scoped
            .iter()
            .filter_map(|n| n.attribute(SCOPED_MARKER))
            .map(str::trim)
            .find(|value| !value.is_empty());
        if let Some(id) = explicit {
            let mut overrides = self.scope_overrides.lock();
            if let Some(first) = overrides.get(id) {
                if first != path {
                    return Err(CompilerError::ScopeCollision {
                        scope_id: id.to_string(),
                        first: first.clone(),
                        second: path.to_string(),
                    });
                }
            }
            overrides.insert(id.to_string(), path.to_string());
            return Ok(Some(id.to_string()));
        }

        let text: String = scoped.iter().map(|n| n.text_content()).collect();
        Ok(Some(scope_hash(&text)))
    }

    /// Evaluate the component's setup script once, against globals and helpers only.
    fn evaluate_setup(&self, tree: &Node, path: &str) -> Result<Map<String, Value>> {
        let Some(script) = tree
            .children
            .iter()
            .find(|n| n.is_tag("script") && n.has_attribute(SETUP_MARKER))
        else {
            return Ok(Map::new());
        };

        let source = script.text_content();
        let data = DataCascade::new(self.globals.clone(), self.helpers.clone()).with_file_path(path);
        self.evaluator
            .evaluate_bindings(&source, &data)
            .map_err(|e| evaluation_error("setup script", &source, path, e))
    }
}

fn is_shadow_root(node: &Node) -> bool {
    node.is_tag("template")
        && (node.has_attribute("shadowrootmode") || node.has_attribute("shadowroot"))
}

fn host_policy_of(tree: &Node) -> (HostTagPolicy, Vec<Attribute>, Option<NodeId>) {
    let top: Vec<&Arc<Node>> = tree.children.iter().filter(|n| n.is_element()).collect();

    if let Some(root) = top
        .iter()
        .find(|n| n.attribute(ROOT_MARKER) == Some(ROOT_OVERRIDE))
    {
        return (HostTagPolicy::Override, Vec::new(), Some(root.id));
    }

    let mut keep = false;
    let mut root_attributes = Vec::new();
    for node in &top {
        if node.has_attribute(ROOT_MARKER) {
            keep = true;
            root_attributes.extend(
                node.attributes()
                    .iter()
                    .filter(|a| !is_directive(&a.name))
                    .cloned(),
            );
        } else if is_top_level_asset(node) {
            keep = true;
        }
    }

    if keep || tree.any_descendant(&is_shadow_root) {
        (HostTagPolicy::Keep, root_attributes, None)
    } else {
        (HostTagPolicy::Elide, root_attributes, None)
    }
}

/// Inline or external style/script content that makes a component keep its host tag.
fn is_top_level_asset(node: &Node) -> bool {
    if node.is_tag("style") || node.is_tag("script") {
        return !node.has_attribute(SETUP_MARKER)
            && (!node.text_content().trim().is_empty() || node.has_attribute("src"));
    }
    node.is_tag("link")
        && node.has_attribute("href")
        && node.attribute("rel").map_or(false, |rel| {
            rel.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
        })
}

fn declared_slots(tree: &Node) -> Vec<String> {
    fn walk(node: &Node, slots: &mut Vec<String>) {
        if node.is_tag("slot") {
            let name = node.attribute("name").unwrap_or("default").to_string();
            if !slots.contains(&name) {
                slots.push(name);
            }
        }
        for child in node.children.iter().chain(node.template_content()) {
            walk(child, slots);
        }
    }
    let mut slots = Vec::new();
    walk(tree, &mut slots);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::MemoryLoader;
    use crate::static_eval::StaticEvaluator;
    use serde_json::json;

    fn registry(loader: MemoryLoader) -> ComponentRegistry {
        let mut globals = Map::new();
        globals.insert("site".to_string(), json!("Docs"));
        ComponentRegistry::new(
            Arc::new(loader),
            Arc::new(StaticEvaluator::new()),
            Arc::new(globals),
            Arc::default(),
        )
    }

    #[test]
    fn test_precompile_is_memoized() {
        let reg = registry(MemoryLoader::new().with_file("a.webc", "<p>a</p>"));
        let first = reg.precompile("a.webc", None).unwrap();
        let second = reg.precompile("a.webc", None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(reg.has_component("a.webc"));
    }

    #[test]
    fn test_concurrent_precompile_shares_one_definition() {
        let reg = registry(MemoryLoader::new().with_file("a.webc", "<p>a</p>"));
        let defs: Vec<_> = (0..8)
            .into_par_iter()
            .map(|_| reg.precompile("a.webc", None).unwrap())
            .collect();
        assert!(defs.iter().all(|d| Arc::ptr_eq(d, &defs[0])));
    }

    #[test]
    fn test_unregistered() {
        let reg = registry(MemoryLoader::new());
        assert!(matches!(
            reg.get_component("x.webc"),
            Err(CompilerError::UnregisteredComponent { .. })
        ));
        assert!(reg.precompile("x.webc", None).is_err());
    }

    #[test]
    fn test_host_policy() {
        let reg = registry(
            MemoryLoader::new()
                .with_file("empty-style.webc", "<style></style><p>x</p>")
                .with_file("styled.webc", "<style>p { color: red }</style><p>x</p>")
                .with_file("linked.webc", r#"<link rel="stylesheet" href="a.css"><p>x</p>"#)
                .with_file("icon.webc", r#"<link rel="icon" href="a.ico"><p>x</p>"#)
                .with_file("external.webc", r#"<script src="a.js"></script><p>x</p>"#)
                .with_file("setup.webc", "<script webc:setup>const a = 1;</script><p>x</p>")
                .with_file("rooted.webc", "<div webc:root class=\"r\">x</div>")
                .with_file("override.webc", "<a webc:root=\"override\">x</a>")
                .with_file(
                    "shadow.webc",
                    "<div><template shadowrootmode=\"open\"><slot></slot></template></div>",
                ),
        );
        let policy = |p: &str| reg.precompile(p, None).unwrap().host_policy;
        assert_eq!(policy("empty-style.webc"), HostTagPolicy::Elide);
        assert_eq!(policy("styled.webc"), HostTagPolicy::Keep);
        assert_eq!(policy("linked.webc"), HostTagPolicy::Keep);
        assert_eq!(policy("icon.webc"), HostTagPolicy::Elide);
        assert_eq!(policy("external.webc"), HostTagPolicy::Keep);
        assert_eq!(policy("setup.webc"), HostTagPolicy::Elide);
        assert_eq!(policy("rooted.webc"), HostTagPolicy::Keep);
        assert_eq!(policy("override.webc"), HostTagPolicy::Override);
        assert_eq!(policy("shadow.webc"), HostTagPolicy::Keep);

        let rooted = reg.get_component("rooted.webc").unwrap();
        assert_eq!(rooted.root_attributes, vec![Attribute::new("class", "r")]);
    }

    #[test]
    fn test_scope_ids() {
        let reg = registry(
            MemoryLoader::new()
                .with_file("a.webc", "<style webc:scoped>p{color:red}</style>")
                .with_file("b.webc", "<style webc:scoped>p{color:red}</style>")
                .with_file("c.webc", "<style webc:scoped=\"my-id\">p{}</style>")
                .with_file("d.webc", "<style webc:scoped=\"my-id\">q{}</style>")
                .with_file("e.webc", "<style>p{}</style>"),
        );
        let a = reg.precompile("a.webc", None).unwrap();
        let b = reg.precompile("b.webc", None).unwrap();
        assert_eq!(a.scope_id, b.scope_id);
        assert_eq!(a.scope_id.as_deref().map(str::len), Some(8));
        assert_eq!(
            reg.precompile("c.webc", None).unwrap().scope_id.as_deref(),
            Some("my-id")
        );
        assert!(matches!(
            reg.precompile("d.webc", None),
            Err(CompilerError::ScopeCollision { .. })
        ));
        assert_eq!(reg.precompile("e.webc", None).unwrap().scope_id, None);
    }

    #[test]
    fn test_setup_runs_against_globals() {
        let reg = registry(MemoryLoader::new().with_file(
            "s.webc",
            "<script webc:setup>const title = site + '!';</script><p></p>",
        ));
        let def = reg.precompile("s.webc", None).unwrap();
        assert_eq!(def.setup.get("title"), Some(&json!("Docs!")));
        assert_eq!(def.host_policy, HostTagPolicy::Elide);
    }

    #[test]
    fn test_declared_slots() {
        let reg = registry(MemoryLoader::new().with_file(
            "s.webc",
            "<header><slot name=\"title\"></slot></header><slot></slot>",
        ));
        let def = reg.precompile("s.webc", None).unwrap();
        assert_eq!(def.slots, vec!["title".to_string(), "default".to_string()]);
    }

    #[test]
    fn test_register_and_resolve_tag() {
        let reg = registry(MemoryLoader::new().with_file("card.webc", "<p>card</p>"));
        let mut map = IndexMap::new();
        map.insert("my-card".to_string(), "card.webc".to_string());
        reg.register(&map).unwrap();
        assert!(matches!(
            reg.resolve_tag("my-card").unwrap(),
            TagResolution::Component(_)
        ));
        assert!(matches!(reg.resolve_tag("div").unwrap(), TagResolution::Plain));
    }
}
