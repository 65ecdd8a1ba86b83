//! Node census over a meshviewer node list.
//!
//! The node list comes in three schema versions:
//!
//! | version | shape                                   |
//! |---------|-----------------------------------------|
//! | 2       | `{"version": 2, "nodes": [node, ...]}`  |
//! | 1       | `{"version": 1, "nodes": {mac: node}}`  |
//! | 0       | `{mac: node, ...}`                      |
//!
//! All three are reduced to one [`NodeList`] before any node is looked at,
//! so the per-node extraction never sees the version.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use meshstat_common::{MetricMap, MetricValue};

/// Traffic directions reported per node.
pub const TRAFFIC_DIRECTIONS: [&str; 5] = ["tx", "rx", "mgmt_tx", "mgmt_rx", "forward"];

/// Statistics copied verbatim when present.
const PASSTHROUGH_STATISTICS: [&str; 4] = ["memory_usage", "rootfs_usage", "uptime", "loadavg"];

/// Errors that abandon a whole census pass.
#[derive(Error, Debug)]
pub enum CensusError {
    #[error("Invalid version: {0}")]
    UnsupportedVersion(String),

    #[error("Malformed node list: {0}")]
    Format(String),
}

/// Errors that exclude a single node from the census.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NodeError {
    #[error("missing field `{0}`")]
    Missing(&'static str),
}

/// Node list container, resolved once from the document's version.
#[derive(Debug, Clone, Copy)]
pub enum NodeList<'a> {
    Array(&'a [Value]),
    Map(&'a Map<String, Value>),
}

impl<'a> NodeList<'a> {
    /// Resolve the container for a node list document.
    pub fn from_document(doc: &'a Value) -> Result<Self, CensusError> {
        match document_version(doc)? {
            2 => doc
                .get("nodes")
                .and_then(Value::as_array)
                .map(|nodes| NodeList::Array(nodes.as_slice()))
                .ok_or_else(|| CensusError::Format("version 2 expects a `nodes` array".into())),
            1 => doc
                .get("nodes")
                .and_then(Value::as_object)
                .map(NodeList::Map)
                .ok_or_else(|| CensusError::Format("version 1 expects a `nodes` object".into())),
            0 => doc
                .as_object()
                .map(NodeList::Map)
                .ok_or_else(|| CensusError::Format("version 0 expects an object".into())),
            other => Err(CensusError::UnsupportedVersion(other.to_string())),
        }
    }

    /// Iterate the node objects. Each call starts from the beginning.
    pub fn nodes(&self) -> Nodes<'a> {
        match *self {
            NodeList::Array(nodes) => Nodes::Array(nodes.iter()),
            NodeList::Map(nodes) => Nodes::Map(nodes.values()),
        }
    }
}

/// Iterator over the nodes of a [`NodeList`].
pub enum Nodes<'a> {
    Array(std::slice::Iter<'a, Value>),
    Map(serde_json::map::Values<'a>),
}

impl<'a> Iterator for Nodes<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Nodes::Array(iter) => iter.next(),
            Nodes::Map(iter) => iter.next(),
        }
    }
}

/// Read the `version` field: an integer, a numeric string, or absent (0).
fn document_version(doc: &Value) -> Result<u64, CensusError> {
    match doc.get("version") {
        None => Ok(0),
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| CensusError::UnsupportedVersion(n.to_string())),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| CensusError::UnsupportedVersion(s.clone())),
        Some(other) => Err(CensusError::UnsupportedVersion(other.to_string())),
    }
}

/// Identity of a node as needed to label graph links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    pub node_id: String,
    /// Hostname as reported, without gateway truncation.
    pub hostname: String,
}

/// Node id to identity.
pub type IdentityTable = BTreeMap<String, NodeIdentity>;

/// Cluster-wide totals of one census pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CensusSummary {
    /// Every node in the list, including ones that failed extraction.
    pub known_nodes: u64,
    pub online_nodes: u64,
    pub clients: u64,
    /// Hostnames of nodes flagged as gateways.
    pub gateways: Vec<String>,
}

impl CensusSummary {
    pub fn gateway_count(&self) -> u64 {
        self.gateways.len() as u64
    }
}

/// Result of a census pass.
#[derive(Debug, Clone, Default)]
pub struct CensusReport {
    pub metrics: MetricMap,
    pub summary: CensusSummary,
    pub identities: IdentityTable,
}

/// Everything one node contributes.
#[derive(Debug, Default)]
struct NodeReport {
    hostname: String,
    metrics: MetricMap,
    online: bool,
    gateway: bool,
    clients: u64,
    firmware: Vec<String>,
}

/// Run a census over a node list document.
///
/// Nodes missing required fields are logged and left out; only an
/// unsupported version or a container of the wrong shape fails the pass.
pub fn census(
    doc: &Value,
    now: DateTime<Utc>,
    offline_threshold: chrono::Duration,
) -> Result<CensusReport, CensusError> {
    let nodes = NodeList::from_document(doc)?;

    let mut report = CensusReport::default();
    let mut firmware: BTreeMap<String, u64> = BTreeMap::new();

    for node in nodes.nodes() {
        report.summary.known_nodes += 1;

        // Links only need the identity, so it is kept even if extraction fails.
        if let Some(identity) = node_identity(node) {
            report.identities.insert(identity.node_id.clone(), identity);
        }

        let extracted = match extract_node(node, now, offline_threshold) {
            Ok(extracted) => extracted,
            Err(e) => {
                warn!(error = %e, node = %node, "Skipping malformed node");
                continue;
            }
        };

        if extracted.online {
            report.summary.online_nodes += 1;
        }
        if extracted.gateway {
            report.summary.gateways.push(extracted.hostname.clone());
        }
        report.summary.clients += extracted.clients;

        for key in extracted.firmware {
            *firmware.entry(key).or_insert(0) += 1;
        }

        report.metrics.extend(extracted.metrics);
    }

    report.metrics.extend(
        firmware
            .into_iter()
            .map(|(key, count)| (key, MetricValue::Counter(count))),
    );

    let summary = &report.summary;
    for (key, value) in [
        ("clients", summary.clients),
        ("known_nodes", summary.known_nodes),
        ("online_nodes", summary.online_nodes),
        ("gateways", summary.gateway_count()),
    ] {
        report
            .metrics
            .insert(key.to_string(), MetricValue::Counter(value));
    }

    debug!(
        known = summary.known_nodes,
        online = summary.online_nodes,
        clients = summary.clients,
        gateways = ?summary.gateways,
        "Census complete"
    );

    Ok(report)
}

/// Gateway hostnames (`gw…`) are reported without their domain.
fn display_hostname(hostname: &str) -> String {
    if hostname.starts_with("gw") {
        hostname
            .split_once('.')
            .map_or(hostname, |(short, _)| short)
            .to_string()
    } else {
        hostname.to_string()
    }
}

/// Interpret a client count: an unsigned number or a numeric string.
fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse a `lastupdate` timestamp. Values without an offset are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// `nodeinfo.node_id` and the raw `nodeinfo.hostname`, if both are strings.
fn node_identity(node: &Value) -> Option<NodeIdentity> {
    let nodeinfo = node.get("nodeinfo")?;
    Some(NodeIdentity {
        node_id: nodeinfo.get("node_id")?.as_str()?.to_string(),
        hostname: nodeinfo.get("hostname")?.as_str()?.to_string(),
    })
}

/// Online check for nodes without flags.
fn recently_updated(node: &Value, now: DateTime<Utc>, threshold: chrono::Duration) -> bool {
    let Some(raw) = node
        .get("lastupdate")
        .and_then(|l| l.get("statistics"))
        .and_then(Value::as_str)
    else {
        return false;
    };

    match parse_timestamp(raw) {
        Some(updated) => now - updated < threshold,
        None => {
            debug!(lastupdate = raw, "Unparseable lastupdate timestamp");
            false
        }
    }
}

fn extract_node(
    node: &Value,
    now: DateTime<Utc>,
    offline_threshold: chrono::Duration,
) -> Result<NodeReport, NodeError> {
    let nodeinfo = node.get("nodeinfo").ok_or(NodeError::Missing("nodeinfo"))?;
    let raw_hostname = nodeinfo
        .get("hostname")
        .and_then(Value::as_str)
        .ok_or(NodeError::Missing("nodeinfo.hostname"))?;
    let hostname = display_hostname(raw_hostname);

    let (online, gateway) = match node.get("flags") {
        Some(flags) => {
            let online = flags
                .get("online")
                .and_then(Value::as_bool)
                .ok_or(NodeError::Missing("flags.online"))?;
            let gateway = flags
                .get("gateway")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            (online, gateway)
        }
        None => (recently_updated(node, now, offline_threshold), false),
    };

    let statistics = node
        .get("statistics")
        .ok_or(NodeError::Missing("statistics"))?;

    let mut report = NodeReport {
        online,
        gateway,
        ..NodeReport::default()
    };
    let metrics = &mut report.metrics;

    match statistics.get("clients") {
        Some(Value::Object(clients)) => {
            if let Some(total) = clients.get("total").and_then(as_count) {
                report.clients = total;
                metrics.insert(format!("{}.clients", hostname), total.into());
                for band in ["wifi5", "wifi24"] {
                    let count = clients.get(band).and_then(as_count).unwrap_or(0);
                    metrics.insert(format!("{}.clients.{}", hostname, band), count.into());
                }
            } else {
                debug!(hostname = %hostname, "Client statistics without total");
            }
        }
        Some(other) => {
            if let Some(total) = as_count(other) {
                report.clients = total;
                metrics.insert(format!("{}.clients", hostname), total.into());
            }
        }
        None => {}
    }

    match statistics.get("traffic").and_then(Value::as_object) {
        Some(traffic) => {
            for direction in TRAFFIC_DIRECTIONS {
                let Some(counters) = traffic
                    .get(direction)
                    .and_then(Value::as_object)
                    .filter(|c| !c.is_empty())
                else {
                    continue;
                };
                for field in ["packets", "bytes"] {
                    if let Some(value) = counters.get(field).and_then(MetricValue::from_json) {
                        metrics.insert(
                            format!("{}.traffic.{}.{}", hostname, direction, field),
                            value,
                        );
                    }
                }
            }
        }
        None => debug!(hostname = %hostname, "Node has no traffic statistics"),
    }

    let firmware = nodeinfo
        .get("software")
        .and_then(|s| s.get("firmware"));
    for field in ["release", "base"] {
        if let Some(version) = firmware.and_then(|f| f.get(field)).and_then(Value::as_str) {
            report.firmware.push(format!("firmware.{}.{}", field, version));
        }
    }

    if let Some(memory) = statistics.get("memory").and_then(Value::as_object) {
        let total = memory.get("total").and_then(Value::as_f64);
        let free = memory.get("free").and_then(Value::as_f64);
        match (total, free) {
            (Some(total), Some(free)) if total > 0.0 => {
                metrics.insert(
                    format!("{}.memory_usage", hostname),
                    MetricValue::Gauge((total - free) / total),
                );
            }
            _ => debug!(hostname = %hostname, "Unusable memory statistics"),
        }
    }

    for key in PASSTHROUGH_STATISTICS {
        if let Some(value) = statistics.get(key).and_then(MetricValue::from_json) {
            metrics.insert(format!("{}.{}", hostname, key), value);
        }
    }

    report.hostname = hostname;
    Ok(report)
}
