//! AST Compiler / Serializer
//!
//! Walks a component tree depth-first and writes markup. Custom tags are resolved against the
//! [`ComponentRegistry`], light content is distributed into slots, control-flow directives are
//! applied and inline styles and scripts are diverted into asset fragments owned by the closest
//! enclosing component.
//!
//! Per-branch state lives in [`RenderOptions`], which is cloned and overridden for every
//! recursive call. Shared state is the registry and the live dependency graph used for cycle
//! checks. Everything else (markup, fragments, usage edges) is returned through [`Rendered`] and
//! concatenated in document order, so parallel children never change the output.

use parking_lot::Mutex;
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use std::sync::Arc;

use crate::assets::{AssetKind, Fragment, BUCKET_DIRECTIVE};
use crate::attributes::{
    escape_attribute, escape_text, evaluate_attributes, evaluate_expression, evaluation_error,
    merge_attributes, serialize_attributes, spread_attributes, to_cascade, to_raw_map,
    EvaluatedAttribute, HTML_DIRECTIVE, RAW_DIRECTIVE, SPREAD_DIRECTIVE, TEXT_DIRECTIVE,
};
use crate::cascade::DataCascade;
use crate::directives::{
    expand_loop, parse_loop, schedule_children, test_condition, FOR_DIRECTIVE, IF_DIRECTIVE,
};
use crate::error::{CompilerError, Result};
use crate::expression::{to_display_string, ExpressionEvaluator};
use crate::graph::{DependencyGraph, Edge, EdgeKind};
use crate::node::{is_raw_text_element, is_void_element, Node, NodeData, NodeId};
use crate::parse::parse_fragment;
use crate::registry::{
    ComponentDefinition, ComponentRegistry, HostTagPolicy, TagResolution, ROOT_MARKER,
    ROOT_OVERRIDE, SETUP_MARKER,
};
use crate::resolve::Resolver;
use crate::transform::{
    apply_transforms, is_render_type, transform_types, TransformMap, TYPE_DIRECTIVE,
};

pub const KEEP_DIRECTIVE: &str = "webc:keep";
pub const NOKEEP_DIRECTIVE: &str = "webc:nokeep";
pub const RAW_MODE_DIRECTIVE: &str = "webc:raw";
pub const IS_DIRECTIVE: &str = "webc:is";
pub const IMPORT_DIRECTIVE: &str = "webc:import";
pub const SLOT_ATTRIBUTE: &str = "slot";
pub const DEFAULT_SLOT: &str = "default";

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

/// Where markup goes: an in-memory buffer or a channel receiving chunks as they are produced.
#[derive(Debug)]
pub enum Markup {
    Buffer(String),
    Channel(Sender<String>),
}

/// Output of one walk: markup plus everything the walk recorded on the way.
#[derive(Debug)]
pub struct Rendered {
    pub markup: Markup,
    pub assets: Vec<Fragment>,
    /// Usage edges in document order.
    pub edges: Vec<Edge>,
}

impl Rendered {
    pub fn buffer() -> Self {
        Self {
            markup: Markup::Buffer(String::new()),
            assets: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn channel(sender: Sender<String>) -> Self {
        Self {
            markup: Markup::Channel(sender),
            assets: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self.markup, Markup::Buffer(_))
    }

    pub fn push(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        match &mut self.markup {
            Markup::Buffer(buffer) => buffer.push_str(chunk),
            Markup::Channel(sender) => {
                if sender.send(chunk.to_string()).is_err() {
                    tracing::warn!("Markup receiver dropped, discarding {} bytes", chunk.len());
                }
            }
        }
    }

    /// Append a buffered result after everything written so far.
    pub fn append(&mut self, other: Rendered) {
        if let Markup::Buffer(text) = &other.markup {
            self.push(text);
        }
        self.assets.extend(other.assets);
        self.edges.extend(other.edges);
    }

    /// Buffered markup. Always empty for a channel.
    pub fn markup(&self) -> &str {
        match &self.markup {
            Markup::Buffer(buffer) => buffer,
            Markup::Channel(_) => "",
        }
    }

    fn has_markup(&self) -> bool {
        !self.markup().trim().is_empty()
    }

    pub fn into_markup(self) -> String {
        match self.markup {
            Markup::Buffer(buffer) => buffer,
            Markup::Channel(_) => String::new(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Light content handed to a component, keyed by slot name, with the caller's options so it
/// renders exactly as it would have at the call site. Only slots the component declares are
/// assigned; content aimed at any other name is never rendered.
#[derive(Clone)]
pub struct SlotAssignment {
    assigned: HashMap<String, Vec<Arc<Node>>>,
    caller: RenderOptions,
}

impl SlotAssignment {
    fn new(light: &[Arc<Node>], declared: &[String], caller: RenderOptions) -> Self {
        let mut assigned: HashMap<String, Vec<Arc<Node>>> = HashMap::new();
        for child in light {
            let name = if child.is_element() {
                child.attribute(SLOT_ATTRIBUTE).unwrap_or(DEFAULT_SLOT)
            } else {
                DEFAULT_SLOT
            };
            if !declared.iter().any(|slot| slot == name) {
                continue;
            }
            assigned.entry(name.to_string()).or_default().push(child.clone());
        }
        Self { assigned, caller }
    }

    /// Assigned nodes for `name`, or `None` when nothing but whitespace was assigned.
    fn content(&self, name: &str) -> Option<&[Arc<Node>]> {
        self.assigned
            .get(name)
            .filter(|nodes| !nodes.iter().all(|n| n.is_whitespace_text()))
            .map(Vec::as_slice)
    }
}

#[derive(Clone)]
pub struct RenderOptions {
    pub data: DataCascade,
    /// Verbatim mode: no directives, no components. Sticky for descendants.
    pub raw: bool,
    /// Text children of `<style>`/`<script>` and friends are written unescaped.
    pub raw_text: bool,
    /// Closest enclosing component path, or the root document.
    pub owner: Arc<str>,
    pub component: Option<Arc<ComponentDefinition>>,
    pub is_slot_content: bool,
    pub slots: Option<Arc<SlotAssignment>>,
    /// Host attributes applied to an override root, keyed by the root's node.
    pub host_attributes: Arc<HashMap<NodeId, Vec<EvaluatedAttribute>>>,
    pub bucket: Option<Arc<str>>,
    /// Component instances enclosing this branch, outermost first.
    pub ancestry: Arc<Vec<String>>,
}

impl RenderOptions {
    pub fn for_root(root: &Arc<ComponentDefinition>, environment: &DataCascade) -> Self {
        Self {
            data: environment.for_component(&root.path, root.setup.clone(), Map::new(), Map::new()),
            raw: false,
            raw_text: false,
            owner: Arc::from(root.path.as_str()),
            component: Some(root.clone()),
            is_slot_content: false,
            slots: None,
            host_attributes: Arc::default(),
            bucket: None,
            ancestry: Arc::new(vec![root.path.clone()]),
        }
    }

    fn with_data(&self, data: DataCascade) -> Self {
        Self {
            data,
            ..self.clone()
        }
    }

    fn as_slot_content(&self) -> Self {
        Self {
            is_slot_content: true,
            ..self.clone()
        }
    }

    fn nested(&self, raw: bool, raw_text: bool, bucket: Option<Arc<str>>) -> Self {
        Self {
            raw,
            raw_text,
            bucket,
            ..self.clone()
        }
    }

    fn file(&self) -> &str {
        self.data.file_path()
    }

    fn scope_id(&self) -> Option<&str> {
        self.component.as_ref().and_then(|c| c.scope_id.as_deref())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct Serializer<'c> {
    registry: &'c ComponentRegistry,
    resolver: &'c Resolver,
    evaluator: &'c dyn ExpressionEvaluator,
    transforms: &'c TransformMap,
    graph: Mutex<DependencyGraph>,
    concurrent: bool,
    default_bucket: &'c str,
}

impl<'c> Serializer<'c> {
    pub fn new(
        registry: &'c ComponentRegistry,
        resolver: &'c Resolver,
        evaluator: &'c dyn ExpressionEvaluator,
        transforms: &'c TransformMap,
        concurrent: bool,
        default_bucket: &'c str,
    ) -> Self {
        Self {
            registry,
            resolver,
            evaluator,
            transforms,
            graph: Mutex::new(DependencyGraph::new()),
            concurrent,
            default_bucket,
        }
    }

    /// Snapshot of the live graph.
    pub fn graph(&self) -> DependencyGraph {
        self.graph.lock().clone()
    }

    /// Render the root document, already precompiled as a component.
    pub fn render_root(
        &self,
        root: &Arc<ComponentDefinition>,
        environment: &DataCascade,
        out: &mut Rendered,
    ) -> Result<()> {
        self.graph.lock().add_node(&root.path);
        let options = RenderOptions::for_root(root, environment);
        self.render_children(&root.tree.children, &options, out)
    }

    fn render_children(
        &self,
        children: &[Arc<Node>],
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        let scheduled: Vec<&Arc<Node>> = if options.raw {
            children.iter().collect()
        } else {
            schedule_children(children, &options.data, self.evaluator, options.file())?
        };

        if self.concurrent && out.is_buffered() && scheduled.len() > 1 {
            let parts = scheduled
                .par_iter()
                .map(|child| {
                    let mut part = Rendered::buffer();
                    self.render_node(child, options, &mut part).map(|_| part)
                })
                .collect::<Result<Vec<Rendered>>>()?;
            for part in parts {
                out.append(part);
            }
        } else {
            for child in scheduled {
                self.render_node(child, options, out)?;
            }
        }
        Ok(())
    }

    fn render_node(
        &self,
        node: &Arc<Node>,
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        match &node.data {
            NodeData::Document => self.render_children(&node.children, options, out),
            NodeData::Doctype { name } => {
                out.push(&format!("<!doctype {}>", name));
                Ok(())
            }
            NodeData::Text { value } => {
                if options.raw_text {
                    out.push(value);
                } else {
                    out.push(&escape_text(value));
                }
                Ok(())
            }
            NodeData::Comment { value } => {
                out.push(&format!("<!--{}-->", value));
                Ok(())
            }
            NodeData::Element { .. } => self.render_element(node, options, out),
        }
    }

    fn render_element(
        &self,
        node: &Arc<Node>,
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        if options.raw {
            return self.render_verbatim(node, options, out);
        }

        let Some(value) = node.attribute(FOR_DIRECTIVE) else {
            return self.render_instance(node, options, out);
        };

        let file = options.file().to_string();
        let spec = parse_loop(value).ok_or_else(|| CompilerError::Evaluation {
            message: format!(
                "Invalid `webc:for` value `{}` in `{}`: expected `<bindings> of <source>` or `<bindings> in <source>`",
                value, file
            ),
            source_text: value.to_string(),
            file: file.clone(),
            cause: "missing ` of ` or ` in ` separator".to_string(),
        })?;
        let condition = node.attribute(IF_DIRECTIVE);

        for bindings in expand_loop(&spec, &options.data, self.evaluator, &file)? {
            let iteration = options.with_data(options.data.with_locals(bindings));
            if let Some(expr) = condition {
                if !test_condition(expr, &iteration.data, self.evaluator, &file)? {
                    continue;
                }
            }
            self.render_instance(node, &iteration, out)?;
        }
        Ok(())
    }

    fn render_instance(
        &self,
        node: &Arc<Node>,
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        let Some(own_tag) = node.tag_name() else {
            return Ok(());
        };
        let file = options.file().to_string();
        let tag = node
            .attribute(IS_DIRECTIVE)
            .unwrap_or(own_tag)
            .to_ascii_lowercase();
        tracing::trace!("Rendering <{}> in {}", tag, file);

        if own_tag == "script" && node.has_attribute(SETUP_MARKER) {
            return Ok(());
        }

        if let Some(reference) = node.attribute(IMPORT_DIRECTIVE) {
            let path = self.resolver.resolve(reference, Some(&file))?;
            tracing::debug!("Importing <{}> from {} in {}", tag, path, file);
            self.registry.register_tag(&tag, &path)?;
        }

        let types = transform_types(node);
        if is_render_type(&types) {
            return self.render_scripted(node, options, out);
        }

        let mut attributes = evaluate_attributes(node.attributes(), &options.data, self.evaluator, &file)?;
        if let Some(spread) = node.attribute(SPREAD_DIRECTIVE) {
            let value = if spread.trim().is_empty() {
                Value::Object(options.data.raw_attributes().clone())
            } else {
                evaluate_expression(
                    spread,
                    "attribute `@attributes`",
                    &options.data,
                    self.evaluator,
                    &file,
                )?
            };
            attributes.extend(spread_attributes(&value));
        }
        if let Some(extra) = options.host_attributes.get(&node.id) {
            attributes.extend(extra.iter().cloned());
        }
        let attributes = merge_attributes(attributes);

        if !node.has_attribute(RAW_MODE_DIRECTIVE) {
            if let TagResolution::Component(definition) = self.registry.resolve_tag(&tag)? {
                return self.render_component(node, &tag, definition, attributes, options, out);
            }
        }

        if node.is_tag("slot") && options.slots.is_some() && !node.has_attribute(KEEP_DIRECTIVE) {
            return self.render_slot(node, options, out);
        }

        if let Some(kind) = asset_kind(node) {
            if !node.has_attribute(KEEP_DIRECTIVE) {
                return self.render_asset(node, kind, &types, options, out);
            }
        }

        self.render_plain(node, &tag, &attributes, &types, options, out)
    }

    fn render_plain(
        &self,
        node: &Arc<Node>,
        tag: &str,
        attributes: &[EvaluatedAttribute],
        types: &[String],
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        let file = options.file().to_string();
        let directive = content_directive_of(node, tag, &file)?;

        let is_template = node.is_tag("template");
        let processed_template = node.attributes().iter().any(|a| {
            matches!(
                a.name.as_str(),
                NOKEEP_DIRECTIVE | ROOT_MARKER | TYPE_DIRECTIVE | IS_DIRECTIVE
            )
        });
        let raw_children =
            node.has_attribute(RAW_MODE_DIRECTIVE) || (is_template && !processed_template);
        let suppress_tag = node.has_attribute(NOKEEP_DIRECTIVE)
            || (options.component.is_some()
                && node
                    .attribute(ROOT_MARKER)
                    .map_or(false, |value| value != ROOT_OVERRIDE))
            || (is_template
                && node.has_attribute(TYPE_DIRECTIVE)
                && !node.has_attribute(KEEP_DIRECTIVE));

        let bucket = node
            .attribute(BUCKET_DIRECTIVE)
            .map(Arc::from)
            .or_else(|| options.bucket.clone());
        let child_options = options.nested(raw_children, is_raw_text_element(tag), bucket);
        let children: &[Arc<Node>] = match node.template_content() {
            Some(content) => &content.children,
            None => &node.children,
        };

        if !suppress_tag {
            out.push(&format!("<{}{}>", tag, serialize_attributes(attributes)));
        }
        if is_void_element(tag) {
            return Ok(());
        }

        let own = options.data.with_own(to_cascade(attributes));
        if types.is_empty() {
            self.render_content(children, directive, &own, &child_options, out)?;
        } else {
            let mut content = Rendered::buffer();
            self.render_content(children, directive, &own, &child_options, &mut content)?;
            let transformed = apply_transforms(
                types,
                content.markup().to_string(),
                options.scope_id(),
                self.transforms,
                &file,
            )?;
            out.push(&transformed);
            out.assets.append(&mut content.assets);
            out.edges.append(&mut content.edges);
        }

        if !suppress_tag {
            out.push(&format!("</{}>", tag));
        }
        Ok(())
    }

    /// Children, or the replacement produced by a content directive.
    fn render_content(
        &self,
        children: &[Arc<Node>],
        directive: Option<(&str, &str)>,
        data: &DataCascade,
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        let Some((name, expression)) = directive else {
            return self.render_children(children, options, out);
        };

        let file = options.file().to_string();
        let context = format!("attribute `{}`", name);
        let value = evaluate_expression(expression, &context, data, self.evaluator, &file)?;
        let text = to_display_string(&value);
        match name {
            TEXT_DIRECTIVE => out.push(&escape_text(&text)),
            HTML_DIRECTIVE if !options.raw => {
                let fragment = parse_fragment(&text, &file)?;
                self.render_children(&fragment.children, options, out)?;
            }
            _ => out.push(&text),
        }
        Ok(())
    }

    fn render_slot(
        &self,
        node: &Arc<Node>,
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        let name = node.attribute("name").unwrap_or(DEFAULT_SLOT);
        let assignment = options.slots.as_ref();
        match assignment.and_then(|a| a.content(name).map(|nodes| (a, nodes))) {
            Some((assignment, nodes)) => {
                tracing::trace!("Filling slot `{}` in {}", name, options.file());
                let caller = assignment.caller.as_slot_content();
                self.render_children(nodes, &caller, out)
            }
            None => self.render_children(&node.children, options, out),
        }
    }

    fn render_asset(
        &self,
        node: &Arc<Node>,
        kind: AssetKind,
        types: &[String],
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        let file = options.file().to_string();
        let mut content = Rendered::buffer();
        let child_options = options.nested(options.raw, true, options.bucket.clone());
        self.render_children(&node.children, &child_options, &mut content)?;

        let text = apply_transforms(
            types,
            content.into_markup(),
            options.scope_id(),
            self.transforms,
            &file,
        )?;
        if text.trim().is_empty() {
            return Ok(());
        }

        let bucket = node
            .attribute(BUCKET_DIRECTIVE)
            .map(String::from)
            .or_else(|| options.bucket.as_deref().map(String::from))
            .unwrap_or_else(|| self.default_bucket.to_string());
        tracing::trace!("Collected {:?} fragment for {} into `{}`", kind, options.owner, bucket);
        out.assets.push(Fragment {
            kind,
            owner: options.owner.to_string(),
            bucket,
            text,
        });
        Ok(())
    }

    /// `webc:type="render"`: the block's default export replaces the element.
    fn render_scripted(
        &self,
        node: &Arc<Node>,
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        let file = options.file().to_string();
        let source = match node.template_content() {
            Some(content) => content.text_content(),
            None => node.text_content(),
        };
        let value = self
            .evaluator
            .evaluate_default_export(&source, &options.data)
            .map_err(|e| evaluation_error("render script", &source, &file, e))?;
        let markup = to_display_string(&value);

        if node.has_attribute(RAW_MODE_DIRECTIVE) {
            out.push(&markup);
            return Ok(());
        }
        let fragment = parse_fragment(&markup, &file)?;
        self.render_children(&fragment.children, options, out)
    }

    /// Verbatim mode: tags, attributes and text are written as parsed.
    fn render_verbatim(
        &self,
        node: &Arc<Node>,
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        let Some(tag) = node.tag_name() else {
            return Ok(());
        };
        let mut start = format!("<{}", tag);
        for attribute in node.attributes() {
            start.push(' ');
            start.push_str(&attribute.name);
            if !attribute.value.is_empty() {
                start.push_str("=\"");
                start.push_str(&escape_attribute(&attribute.value));
                start.push('"');
            }
        }
        start.push('>');
        out.push(&start);
        if is_void_element(tag) {
            return Ok(());
        }

        let children: &[Arc<Node>] = match node.template_content() {
            Some(content) => &content.children,
            None => &node.children,
        };
        let child_options = options.nested(true, is_raw_text_element(tag), options.bucket.clone());
        self.render_children(children, &child_options, out)?;
        out.push(&format!("</{}>", tag));
        Ok(())
    }

    fn render_component(
        &self,
        host: &Arc<Node>,
        tag: &str,
        definition: Arc<ComponentDefinition>,
        attributes: Vec<EvaluatedAttribute>,
        options: &RenderOptions,
        out: &mut Rendered,
    ) -> Result<()> {
        if options.ancestry.iter().any(|path| *path == definition.path) {
            return Err(CompilerError::circular(&options.owner, &definition.path));
        }
        let kind = if options.is_slot_content {
            EdgeKind::Slotted
        } else {
            EdgeKind::Structural
        };
        self.graph.lock().add_edge(&options.owner, &definition.path, kind)?;
        out.edges.push(Edge {
            owner: options.owner.to_string(),
            target: definition.path.clone(),
            kind,
        });
        tracing::trace!("<{}> in {} resolves to {}", tag, options.file(), definition.path);

        let data = options.data.for_component(
            &definition.path,
            definition.setup.clone(),
            to_cascade(&attributes),
            to_raw_map(&attributes),
        );
        let root_attributes = evaluate_attributes(
            &definition.root_attributes,
            &data,
            self.evaluator,
            &definition.path,
        )?;
        let scope_class = definition
            .scope_id
            .as_deref()
            .map(|id| EvaluatedAttribute::literal("class", id));
        let host_attributes =
            merge_attributes(root_attributes.into_iter().chain(attributes).chain(scope_class));

        let mut side_table = HashMap::new();
        if let (HostTagPolicy::Override, Some(root)) =
            (definition.host_policy, definition.override_root)
        {
            side_table.insert(root, host_attributes.clone());
        }
        let mut ancestry = (*options.ancestry).clone();
        ancestry.push(definition.path.clone());

        let component_options = RenderOptions {
            data,
            raw: false,
            raw_text: false,
            owner: Arc::from(definition.path.as_str()),
            component: Some(definition.clone()),
            is_slot_content: false,
            slots: Some(Arc::new(SlotAssignment::new(
                &host.children,
                &definition.slots,
                options.as_slot_content(),
            ))),
            host_attributes: Arc::new(side_table),
            bucket: host
                .attribute(BUCKET_DIRECTIVE)
                .map(Arc::from)
                .or_else(|| options.bucket.clone()),
            ancestry: Arc::new(ancestry),
        };

        let mut inner = Rendered::buffer();
        self.render_children(&definition.tree.children, &component_options, &mut inner)?;

        let keep_host = definition.keeps_host() && !host.has_attribute(NOKEEP_DIRECTIVE);
        // Light content stays when the component renders nothing, or next to a shadow root
        let light_content = !inner.has_markup() || definition.has_shadow_root;

        if keep_host {
            out.push(&format!("<{}{}>", tag, serialize_attributes(&host_attributes)));
        }
        out.append(inner);
        if light_content {
            self.render_children(&host.children, &options.as_slot_content(), out)?;
        }
        if keep_host && !is_void_element(tag) {
            out.push(&format!("</{}>", tag));
        }
        Ok(())
    }
}

fn asset_kind(node: &Node) -> Option<AssetKind> {
    match node.tag_name()? {
        "style" => Some(AssetKind::Style),
        "script" if node.has_attribute("src") => None,
        "script" => match node.attribute("type") {
            None | Some("") | Some("module") | Some("text/javascript")
            | Some("application/javascript") => Some(AssetKind::Script),
            Some(_) => None,
        },
        _ => None,
    }
}

fn content_directive_of<'n>(
    node: &'n Node,
    tag: &str,
    file: &str,
) -> Result<Option<(&'n str, &'n str)>> {
    let found: Vec<_> = node
        .attributes()
        .iter()
        .filter(|a| {
            matches!(
                a.name.as_str(),
                HTML_DIRECTIVE | TEXT_DIRECTIVE | RAW_DIRECTIVE
            )
        })
        .collect();
    match found.as_slice() {
        [] => Ok(None),
        [one] => Ok(Some((one.name.as_str(), one.value.as_str()))),
        many => Err(CompilerError::ConflictingContentDirectives {
            tag: tag.to_string(),
            directives: many.iter().map(|a| a.name.clone()).collect(),
            file: file.to_string(),
        }),
    }
}
