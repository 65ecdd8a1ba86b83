//! Link quality from the meshviewer graph.
//!
//! Links in `batadv.links` refer to nodes by their index into
//! `batadv.nodes`. Each link is canonicalized to an unordered index pair,
//! its endpoints are resolved to node ids and then to known nodes, and the
//! surviving links are emitted as `link.<source>.<target>.tq = 1 / tq`.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde_json::Value;
use tracing::debug;

use meshstat_common::{MetricMap, MetricValue};

use crate::census::{IdentityTable, NodeIdentity};

/// One end of a link, at each stage of resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// Index into the graph's node array.
    Index(usize),
    /// Node id not present in the identity table.
    NodeId(String),
    /// Fully resolved node.
    Node(NodeIdentity),
}

impl Endpoint {
    fn hostname(&self) -> Option<&str> {
        match self {
            Endpoint::Node(node) => Some(&node.hostname),
            _ => None,
        }
    }
}

/// A link between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: Endpoint,
    pub target: Endpoint,
    /// Transmit quality as reported, if numeric.
    pub tq: Option<f64>,
}

/// Unordered index pair, stored as `(min, max)`.
pub type EdgeKey = (usize, usize);

fn endpoint_index(link: &Value, field: &str) -> Option<usize> {
    link.get(field)
        .and_then(Value::as_u64)
        .and_then(|i| usize::try_from(i).ok())
}

/// Collapse links to at most one edge per unordered index pair.
///
/// The first link seen for a pair wins. Links without integer endpoints
/// are skipped.
pub fn canonical_edges(links: &[Value]) -> BTreeMap<EdgeKey, Edge> {
    let mut edges = BTreeMap::new();

    for link in links {
        let (Some(source), Some(target)) =
            (endpoint_index(link, "source"), endpoint_index(link, "target"))
        else {
            debug!(link = %link, "Skipping link without integer endpoints");
            continue;
        };

        if let Entry::Vacant(slot) = edges.entry((source.min(target), source.max(target))) {
            slot.insert(Edge {
                source: Endpoint::Index(source),
                target: Endpoint::Index(target),
                tq: link.get("tq").and_then(Value::as_f64),
            });
        }
    }

    edges
}

/// Resolve an index to a node id, then to a known node if there is one.
///
/// Returns `None` when the index does not name a graph node with an id.
fn resolve_endpoint(
    endpoint: &Endpoint,
    graph_nodes: &[Value],
    identities: &IdentityTable,
) -> Option<Endpoint> {
    let Endpoint::Index(index) = endpoint else {
        return Some(endpoint.clone());
    };

    let node_id = graph_nodes
        .get(*index)?
        .get("node_id")
        .and_then(Value::as_str)?;

    Some(match identities.get(node_id) {
        Some(node) => Endpoint::Node(node.clone()),
        None => Endpoint::NodeId(node_id.to_string()),
    })
}

/// Resolve every edge's endpoints in place.
///
/// Edges with an endpoint that cannot be mapped to a node id are removed.
pub fn resolve(
    edges: &mut BTreeMap<EdgeKey, Edge>,
    graph_nodes: &[Value],
    identities: &IdentityTable,
) {
    let mut unresolved = Vec::new();

    for (key, edge) in edges.iter_mut() {
        let source = resolve_endpoint(&edge.source, graph_nodes, identities);
        let target = resolve_endpoint(&edge.target, graph_nodes, identities);

        match (source, target) {
            (Some(source), Some(target)) => {
                edge.source = source;
                edge.target = target;
            }
            _ => unresolved.push(*key),
        }
    }

    for key in unresolved {
        debug!(source = key.0, target = key.1, "Dropping link with unknown endpoint");
        edges.remove(&key);
    }
}

/// Emit `link.<source>.<target>.tq` for edges between known nodes.
///
/// The value is the inverse of `tq`; edges with a missing or non-positive
/// `tq` are skipped.
pub fn edge_metrics(edges: &BTreeMap<EdgeKey, Edge>) -> MetricMap {
    let mut metrics = MetricMap::new();

    for edge in edges.values() {
        let (Some(source), Some(target)) = (edge.source.hostname(), edge.target.hostname())
        else {
            continue;
        };
        let Some(tq) = edge.tq.filter(|tq| *tq > 0.0) else {
            continue;
        };

        metrics.insert(
            format!("link.{}.{}.tq", source, target),
            MetricValue::Gauge(1.0 / tq),
        );
    }

    metrics
}

/// Correlate a graph document with the census identity table.
pub fn link_quality(graph: &Value, identities: &IdentityTable) -> MetricMap {
    let batadv = graph.get("batadv");
    let links = batadv
        .and_then(|b| b.get("links"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let graph_nodes = batadv
        .and_then(|b| b.get("nodes"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut edges = canonical_edges(links);
    resolve(&mut edges, graph_nodes, identities);

    let metrics = edge_metrics(&edges);
    debug!(links = links.len(), edges = edges.len(), metrics = metrics.len(), "Correlated graph");
    metrics
}
