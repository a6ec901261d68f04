//! Data cascade: the layered, read-only context visible to expressions.
//!
//! Precedence, lowest first: global data, helpers, setup bindings, host attributes, own
//! attributes, loop bindings. Every `with_*` call produces a new view; existing views are
//! never mutated.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::expression::{Helper, HelperMap};

/// Name of the reserved namespace exposing raw attributes and globals.
pub const RESERVED_NAMESPACE: &str = "webc";

#[derive(Clone, Default)]
pub struct DataCascade {
    globals: Arc<Map<String, Value>>,
    helpers: Arc<HelperMap>,
    setup: Arc<Map<String, Value>>,
    host: Arc<Map<String, Value>>,
    own: Arc<Map<String, Value>>,
    locals: Arc<Map<String, Value>>,
    raw_attributes: Arc<Map<String, Value>>,
    file_path: Arc<str>,
}

impl fmt::Debug for DataCascade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataCascade")
            .field("globals", &self.globals)
            .field("helpers", &self.helpers.keys().collect::<Vec<_>>())
            .field("setup", &self.setup)
            .field("host", &self.host)
            .field("own", &self.own)
            .field("locals", &self.locals)
            .field("file_path", &self.file_path)
            .finish()
    }
}

impl DataCascade {
    pub fn new(globals: Arc<Map<String, Value>>, helpers: Arc<HelperMap>) -> Self {
        Self {
            globals,
            helpers,
            ..Default::default()
        }
    }

    /// A fresh view for a component instance: setup bindings and host attributes replace the
    /// caller's, while globals and helpers carry over.
    pub fn for_component(
        &self,
        file_path: &str,
        setup: Arc<Map<String, Value>>,
        host: Map<String, Value>,
        raw_attributes: Map<String, Value>,
    ) -> Self {
        Self {
            globals: self.globals.clone(),
            helpers: self.helpers.clone(),
            setup,
            host: Arc::new(host),
            own: Arc::default(),
            locals: Arc::default(),
            raw_attributes: Arc::new(raw_attributes),
            file_path: Arc::from(file_path),
        }
    }

    pub fn with_file_path(&self, file_path: &str) -> Self {
        Self {
            file_path: Arc::from(file_path),
            ..self.clone()
        }
    }

    pub fn with_setup(&self, setup: Arc<Map<String, Value>>) -> Self {
        Self {
            setup,
            ..self.clone()
        }
    }

    pub fn with_own(&self, own: Map<String, Value>) -> Self {
        if own.is_empty() {
            return self.clone();
        }
        Self {
            own: Arc::new(own),
            ..self.clone()
        }
    }

    /// Loop bindings shadow outer bindings for this view only.
    pub fn with_locals(&self, bindings: Map<String, Value>) -> Self {
        let mut locals = (*self.locals).clone();
        locals.extend(bindings);
        Self {
            locals: Arc::new(locals),
            ..self.clone()
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let layered = [&self.locals, &self.own, &self.host, &self.setup]
            .into_iter()
            .find_map(|layer| layer.get(name));
        if let Some(value) = layered {
            return Some(value.clone());
        }
        if name == RESERVED_NAMESPACE {
            return Some(self.reserved_namespace());
        }
        self.globals.get(name).cloned()
    }

    pub fn helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn helpers(&self) -> &Arc<HelperMap> {
        &self.helpers
    }

    pub fn globals(&self) -> &Arc<Map<String, Value>> {
        &self.globals
    }

    pub fn host_attributes(&self) -> &Map<String, Value> {
        &self.host
    }

    pub fn raw_attributes(&self) -> &Map<String, Value> {
        &self.raw_attributes
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    fn reserved_namespace(&self) -> Value {
        let mut namespace = Map::new();
        namespace.insert(
            "attributes".to_string(),
            Value::Object((*self.raw_attributes).clone()),
        );
        namespace.insert(
            "filePath".to_string(),
            Value::String(self.file_path.to_string()),
        );
        namespace.insert(
            "globals".to_string(),
            Value::Object((*self.globals).clone()),
        );
        Value::Object(namespace)
    }

    /// Flattened view of every data layer, used as `this` inside scripts.
    pub fn to_object(&self) -> Value {
        let mut merged = (*self.globals).clone();
        for layer in [&self.setup, &self.host, &self.own, &self.locals] {
            for (key, value) in layer.iter() {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged.insert(RESERVED_NAMESPACE.to_string(), self.reserved_namespace());
        Value::Object(merged)
    }
}
