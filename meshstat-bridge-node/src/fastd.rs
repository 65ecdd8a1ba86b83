//! fastd status socket and process drop counters.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;

use meshstat_common::{MetricMap, MetricValue};

/// Errors reading a fastd status socket.
#[derive(Error, Debug)]
pub enum FastdError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid status document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Status document written by fastd on its status socket.
#[derive(Debug, Deserialize)]
struct Status {
    statistics: Statistics,
    peers: BTreeMap<String, Peer>,
}

#[derive(Debug, Deserialize)]
struct Statistics {
    rx: Counters,
    rx_reordered: Counters,
    tx: Counters,
    tx_dropped: Counters,
}

#[derive(Debug, Deserialize)]
struct Counters {
    packets: u64,
    bytes: u64,
}

#[derive(Debug, Deserialize)]
struct Peer {
    /// Present but null for peers without an established connection.
    connection: serde_json::Value,
}

/// JSON truthiness: null, false, zero and empty containers are false.
fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Turn a status document into peer and traffic counters.
pub fn parse_status(raw: &[u8]) -> Result<MetricMap, FastdError> {
    let status: Status = serde_json::from_slice(raw)?;
    let stats = &status.statistics;

    let online = status
        .peers
        .values()
        .filter(|peer| is_truthy(&peer.connection))
        .count();

    let pairs: [(&str, u64); 10] = [
        ("peers.count", status.peers.len() as u64),
        ("peers.online", online as u64),
        ("rx.packets", stats.rx.packets),
        ("rx.bytes", stats.rx.bytes),
        ("rx.reordered.packets", stats.rx_reordered.packets),
        ("rx.reordered.bytes", stats.rx_reordered.bytes),
        ("tx.packets", stats.tx.packets),
        ("tx.bytes", stats.tx.bytes),
        ("tx.dropped.packets", stats.tx_dropped.packets),
        ("tx.dropped.bytes", stats.tx_dropped.bytes),
    ];

    Ok(pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), MetricValue::Counter(value)))
        .collect())
}

/// Connect to a status socket and read until fastd closes it.
pub async fn read_status(path: &Path, timeout: Duration) -> Result<Vec<u8>, FastdError> {
    let read = async {
        let mut stream = UnixStream::connect(path).await?;
        let mut buf = Vec::with_capacity(8096);
        stream.read_to_end(&mut buf).await?;
        Ok::<_, FastdError>(buf)
    };

    tokio::time::timeout(timeout, read)
        .await
        .map_err(|_| FastdError::Timeout(timeout))?
}

/// Read and parse one status socket; any failure yields an empty map.
pub async fn peer_stats(path: &Path, timeout: Duration) -> MetricMap {
    read_status(path, timeout)
        .await
        .and_then(|raw| parse_status(&raw))
        .unwrap_or_else(|e| {
            tracing::warn!(socket = %path.display(), error = %e, "Failed to read fastd status");
            MetricMap::new()
        })
}

/// Sum the drops column (the last one) of a `/proc/<pid>/net/udp{,6}` table.
///
/// The header line and lines whose last column is not a number are skipped.
pub fn parse_udp_drops(content: &str) -> u64 {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("sl"))
        .filter_map(|line| line.split_whitespace().last()?.parse::<u64>().ok())
        .sum()
}

/// Sum the UDP socket drops of the first process named `process_name`.
///
/// Returns `None` when no such process runs.
#[cfg(target_os = "linux")]
pub fn process_drops(proc_root: &Path, process_name: &str) -> Option<u64> {
    let processes = match procfs::process::all_processes_with_root(proc_root) {
        Ok(processes) => processes,
        Err(e) => {
            tracing::warn!(root = %proc_root.display(), error = %e, "Failed to list processes");
            return None;
        }
    };

    let process = processes
        .flatten()
        .find(|p| p.stat().is_ok_and(|stat| stat.comm == process_name))?;

    let mut drops = 0;
    for table in ["udp", "udp6"] {
        let path = proc_root
            .join(process.pid.to_string())
            .join("net")
            .join(table);
        match std::fs::read_to_string(&path) {
            Ok(content) => drops += parse_udp_drops(&content),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Failed to read UDP table");
            }
        }
    }

    Some(drops)
}

#[cfg(not(target_os = "linux"))]
pub fn process_drops(_proc_root: &Path, _process_name: &str) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixListener;

    const STATUS: &str = r#"{
        "uptime": 123456,
        "interface": "ffda-vpn",
        "statistics": {
            "rx": { "packets": 100, "bytes": 20000 },
            "rx_reordered": { "packets": 3, "bytes": 600 },
            "tx": { "packets": 90, "bytes": 18000 },
            "tx_dropped": { "packets": 1, "bytes": 200 },
            "tx_error": { "packets": 0, "bytes": 0 }
        },
        "peers": {
            "aa": { "name": "p1", "address": "[2001:db8::1]:10000", "connection": { "established": 1000 } },
            "bb": { "name": "p2", "address": null, "connection": null }
        }
    }"#;

    #[test]
    fn test_parse_status() {
        let metrics = parse_status(STATUS.as_bytes()).unwrap();

        assert_eq!(metrics.len(), 10);
        assert_eq!(metrics.get("peers.count"), Some(&MetricValue::Counter(2)));
        assert_eq!(metrics.get("peers.online"), Some(&MetricValue::Counter(1)));
        assert_eq!(metrics.get("rx.packets"), Some(&MetricValue::Counter(100)));
        assert_eq!(
            metrics.get("rx.reordered.bytes"),
            Some(&MetricValue::Counter(600))
        );
        assert_eq!(
            metrics.get("tx.dropped.packets"),
            Some(&MetricValue::Counter(1))
        );
    }

    #[test]
    fn test_parse_status_missing_statistics() {
        let result = parse_status(br#"{ "peers": {} }"#);
        assert!(matches!(result, Err(FastdError::Json(_))));
    }

    #[test]
    fn test_parse_status_missing_peers() {
        let result = parse_status(
            br#"{
                "statistics": {
                    "rx": { "packets": 1, "bytes": 1 },
                    "rx_reordered": { "packets": 0, "bytes": 0 },
                    "tx": { "packets": 1, "bytes": 1 },
                    "tx_dropped": { "packets": 0, "bytes": 0 }
                }
            }"#,
        );
        assert!(matches!(result, Err(FastdError::Json(_))));
    }

    #[test]
    fn test_parse_status_peer_without_connection() {
        let raw = STATUS.replace(r#""address": null, "connection": null"#, r#""address": null"#);
        assert!(parse_status(raw.as_bytes()).is_err());
    }

    #[tokio::test]
    async fn test_peer_stats_incomplete_document_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fastd.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream
                .write_all(br#"{ "statistics": {}, "peers": {} }"#)
                .await
                .unwrap();
            stream.shutdown().await.unwrap();
        });

        let metrics = peer_stats(&path, Duration::from_secs(1)).await;
        server.await.unwrap();

        assert!(metrics.is_empty());
    }

    #[test]
    fn test_truthy() {
        use serde_json::json;

        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!({})));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!({ "established": 1 })));
        assert!(is_truthy(&json!(true)));
    }

    #[test]
    fn test_parse_udp_drops() {
        let content = "\
   sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops
 1234: 00000000:2710 00000000:0000 07 00000000:00000000 00:00000000 00000000     0        0 4469598 2 ffff880519be5100 5
 1235: 00000000:2711 00000000:0000 07 00000000:00000000 00:00000000 00000000     0        0 4469599 2 ffff880519be5200 7
";
        assert_eq!(parse_udp_drops(content), 12);
        assert_eq!(parse_udp_drops(""), 0);
    }

    #[tokio::test]
    async fn test_peer_stats_from_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fastd.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(STATUS.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
        });

        let metrics = peer_stats(&path, Duration::from_secs(1)).await;
        server.await.unwrap();

        assert_eq!(metrics.get("peers.count"), Some(&MetricValue::Counter(2)));
        assert_eq!(metrics.get("tx.bytes"), Some(&MetricValue::Counter(18000)));
    }

    #[tokio::test]
    async fn test_peer_stats_missing_socket() {
        let metrics = peer_stats(Path::new("/nonexistent/fastd.sock"), Duration::from_secs(1)).await;
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn test_read_status_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("silent.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(stream);
        });

        let result = read_status(&path, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(FastdError::Timeout(_))));
        server.await.unwrap();
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_process_drops_no_match() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(process_drops(dir.path(), "fastd"), None);
    }
}
