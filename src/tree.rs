//! Declarative construction of bucket hierarchies.
//!
//! A [`BucketSpec`] is the nested description of a tree, one record per
//! node with its children inline, deserializable from any serde format.
//! [`build_hierarchy`] turns it into live buckets and returns a flat
//! name→bucket map for lookup.

use crate::error::RateLimitError;
use crate::hierarchy::HierarchicalTokenBucket;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Declarative description of one node and its subtree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketSpec {
    pub name: String,
    pub capacity: f64,
    pub fill_rate: f64,
    #[serde(default)]
    pub children: Vec<BucketSpec>,
}

impl BucketSpec {
    /// A leaf spec; attach children with [`BucketSpec::child`].
    pub fn new(name: impl Into<String>, capacity: f64, fill_rate: f64) -> Self {
        Self { name: name.into(), capacity, fill_rate, children: Vec::new() }
    }

    /// Append a child subtree.
    pub fn child(mut self, child: BucketSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Build the tree described by `spec`, top-down, and return every node
/// keyed by name.
///
/// Parents are constructed and linked before their children, so each node's
/// parent reference is valid before the node can be used. Names are expected
/// to be unique across the tree; on a duplicate the **last node constructed
/// wins** in the returned map (document-order traversal), which can silently
/// hide an earlier node. Defined behavior, not an error.
///
/// Fails on the first node with an invalid capacity or fill rate; no buckets
/// are returned in that case.
pub fn build_hierarchy(
    spec: &BucketSpec,
) -> Result<HashMap<String, Arc<HierarchicalTokenBucket>>, RateLimitError> {
    let mut buckets = HashMap::new();
    build_node(spec, None, &mut buckets)?;
    tracing::debug!(nodes = buckets.len(), root = %spec.name, "bucket hierarchy built");
    Ok(buckets)
}

fn build_node(
    spec: &BucketSpec,
    parent: Option<Arc<HierarchicalTokenBucket>>,
    out: &mut HashMap<String, Arc<HierarchicalTokenBucket>>,
) -> Result<(), RateLimitError> {
    let node =
        HierarchicalTokenBucket::new(spec.capacity, spec.fill_rate, parent, spec.name.clone())?;
    out.insert(spec.name.clone(), node.clone());
    for child in &spec.children {
        build_node(child, Some(node.clone()), out)?;
    }
    Ok(())
}
