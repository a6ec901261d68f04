//! Asset Aggregation
//!
//! Inline styles and scripts are collected per owning component during the walk. Afterwards
//! each kind is deduplicated into buckets. A fragment that shows up in two different buckets is
//! elevated into the bucket of the nearest component that uses both owners, so it is emitted
//! once at the narrowest scope covering every consumer.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashMap;

use crate::graph::DependencyGraph;

pub const DEFAULT_BUCKET: &str = "default";
pub const BUCKET_DIRECTIVE: &str = "webc:bucket";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetKind {
    Style,
    Script,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    pub kind: AssetKind,
    /// Closest enclosing component, or the root document.
    pub owner: String,
    pub bucket: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBundle {
    /// Contents of the default bucket.
    pub fragments: Vec<String>,
    /// Named, non-empty buckets in first-use order.
    pub buckets: IndexMap<String, Vec<String>>,
}

impl AssetBundle {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty() && self.buckets.is_empty()
    }

    /// Every fragment, default bucket first.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.fragments
            .iter()
            .chain(self.buckets.values().flatten())
    }
}

struct Placement {
    bucket: String,
    owner: String,
}

/// Deduplicate and elevate the fragments of one kind.
pub fn aggregate(
    kind: AssetKind,
    fragments: &[Fragment],
    graph: &DependencyGraph,
    root: &str,
    default_bucket: &str,
) -> AssetBundle {
    let mut by_owner: IndexMap<&str, Vec<&Fragment>> = IndexMap::new();
    for fragment in fragments.iter().filter(|f| f.kind == kind) {
        by_owner.entry(fragment.owner.as_str()).or_default().push(fragment);
    }

    // Closest-used-first, then owners the graph never saw
    let mut owners: Vec<String> = graph
        .components_used()
        .into_iter()
        .filter(|path| by_owner.contains_key(path.as_str()))
        .collect();
    for owner in by_owner.keys() {
        if !owners.iter().any(|o| o == owner) {
            owners.push(owner.to_string());
        }
    }

    let mut buckets: IndexMap<String, IndexSet<String>> = IndexMap::new();
    buckets.insert(default_bucket.to_string(), IndexSet::new());
    let mut placed: HashMap<String, Placement> = HashMap::new();
    let mut component_bucket: HashMap<String, String> = HashMap::new();

    for owner in &owners {
        let Some(owned) = by_owner.get(owner.as_str()) else {
            continue;
        };
        for fragment in owned {
            component_bucket
                .entry(owner.clone())
                .or_insert_with(|| fragment.bucket.clone());

            match placed.get(&fragment.text) {
                None => {
                    buckets
                        .entry(fragment.bucket.clone())
                        .or_default()
                        .insert(fragment.text.clone());
                    placed.insert(
                        fragment.text.clone(),
                        Placement {
                            bucket: fragment.bucket.clone(),
                            owner: owner.clone(),
                        },
                    );
                }
                Some(previous) if previous.bucket == fragment.bucket => {}
                Some(previous) => {
                    let ancestor = graph
                        .nearest_common_ancestor(&previous.owner, owner)
                        .unwrap_or_else(|| root.to_string());
                    let target = component_bucket
                        .get(&ancestor)
                        .cloned()
                        .unwrap_or_else(|| default_bucket.to_string());

                    tracing::debug!(
                        "Elevating {:?} fragment shared by {} and {} into bucket `{}` ({})",
                        kind,
                        previous.owner,
                        owner,
                        target,
                        ancestor
                    );

                    if target != previous.bucket {
                        if let Some(bucket) = buckets.get_mut(&previous.bucket) {
                            bucket.shift_remove(&fragment.text);
                        }
                        buckets
                            .entry(target.clone())
                            .or_default()
                            .insert(fragment.text.clone());
                    }
                    placed.insert(
                        fragment.text.clone(),
                        Placement {
                            bucket: target,
                            owner: ancestor,
                        },
                    );
                }
            }
        }
    }

    let mut bundle = AssetBundle::default();
    for (name, contents) in buckets {
        if name == default_bucket {
            bundle.fragments = contents.into_iter().collect();
        } else if !contents.is_empty() {
            bundle.buckets.insert(name, contents.into_iter().collect());
        }
    }
    bundle
}
