//! meshstat bridge for the meshviewer API.
//!
//! This bridge fetches the meshviewer node list, counts nodes, clients and
//! firmware versions, and optionally correlates the link graph with the
//! node list to report link quality.
//!
//! # Metric Keys
//!
//! ```text
//! known_nodes | online_nodes | clients | gateways
//! <hostname>.clients[.wifi24|.wifi5]
//! <hostname>.traffic.<direction>.<packets|bytes>
//! <hostname>.<memory_usage|rootfs_usage|uptime|loadavg>
//! firmware.<release|base>.<version>
//! link.<source>.<target>.tq
//! ```

pub mod census;
pub mod collector;
pub mod config;
pub mod fetch;
pub mod graph;
