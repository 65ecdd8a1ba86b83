//! Neighbour table state counts from `ip neigh`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use std::time::Duration;

use tokio::process::Command;

use meshstat_common::{MetricMap, MetricValue};

/// NUD states reported by `ip neigh show nud all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NeighbourState {
    Permanent,
    Noarp,
    Reachable,
    Stale,
    None,
    Incomplete,
    Delay,
    Probe,
    Failed,
}

impl NeighbourState {
    pub const ALL: [NeighbourState; 9] = [
        NeighbourState::Permanent,
        NeighbourState::Noarp,
        NeighbourState::Reachable,
        NeighbourState::Stale,
        NeighbourState::None,
        NeighbourState::Incomplete,
        NeighbourState::Delay,
        NeighbourState::Probe,
        NeighbourState::Failed,
    ];

    /// Name as printed by iproute2.
    pub fn as_str(&self) -> &'static str {
        match self {
            NeighbourState::Permanent => "PERMANENT",
            NeighbourState::Noarp => "NOARP",
            NeighbourState::Reachable => "REACHABLE",
            NeighbourState::Stale => "STALE",
            NeighbourState::None => "NONE",
            NeighbourState::Incomplete => "INCOMPLETE",
            NeighbourState::Delay => "DELAY",
            NeighbourState::Probe => "PROBE",
            NeighbourState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for NeighbourState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NeighbourState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NeighbourState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or(())
    }
}

/// Address family of a neighbour table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Inet,
    Inet6,
}

impl AddressFamily {
    /// Parse a configured family name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "inet" => Some(AddressFamily::Inet),
            "inet6" => Some(AddressFamily::Inet6),
            _ => None,
        }
    }

    /// `ip` command line flag.
    pub fn flag(&self) -> &'static str {
        match self {
            AddressFamily::Inet => "-4",
            AddressFamily::Inet6 => "-6",
        }
    }

    /// Metric key prefix.
    pub fn metric_prefix(&self) -> &'static str {
        match self {
            AddressFamily::Inet => "ipv4.Neigh",
            AddressFamily::Inet6 => "ipv6.Neigh",
        }
    }
}

/// Per-state entry counts of one neighbour table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighbourCounts(BTreeMap<NeighbourState, u64>);

impl Default for NeighbourCounts {
    fn default() -> Self {
        Self(NeighbourState::ALL.into_iter().map(|s| (s, 0)).collect())
    }
}

impl NeighbourCounts {
    pub fn get(&self, state: NeighbourState) -> u64 {
        self.0.get(&state).copied().unwrap_or(0)
    }

    /// Every state, including empty ones, as `<prefix>.<state>` counters.
    pub fn to_metrics(&self, family: AddressFamily) -> MetricMap {
        self.0
            .iter()
            .map(|(state, count)| {
                (
                    format!(
                        "{}.{}",
                        family.metric_prefix(),
                        state.as_str().to_lowercase()
                    ),
                    MetricValue::Counter(*count),
                )
            })
            .collect()
    }
}

/// Count the trailing state token of each line of `ip neigh` output.
///
/// Lines ending in anything outside the known states are ignored.
pub fn parse_neighbour_table(output: &str) -> NeighbourCounts {
    let mut counts = NeighbourCounts::default();

    for line in output.lines() {
        let Some(last) = line.split_whitespace().last() else {
            continue;
        };
        if let Ok(state) = last.parse::<NeighbourState>() {
            *counts.0.entry(state).or_insert(0) += 1;
        }
    }

    counts
}

/// Run `<ip> <-4|-6> neigh show nud all` and count the states.
///
/// Returns `None` if the command cannot be run, exits non-zero, or does not
/// finish within `timeout`.
pub async fn sample(
    command: &Path,
    family: AddressFamily,
    timeout: Duration,
) -> Option<NeighbourCounts> {
    let child = Command::new(command)
        .args([family.flag(), "neigh", "show", "nud", "all"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            tracing::warn!(command = %command.display(), error = %e, "Failed to run neighbour command");
            return None;
        }
        Err(_) => {
            tracing::warn!(
                command = %command.display(),
                timeout_secs = timeout.as_secs(),
                "Neighbour command timed out"
            );
            return None;
        }
    };

    if !output.status.success() {
        tracing::warn!(
            command = %command.display(),
            family = family.flag(),
            status = %output.status,
            "Neighbour command failed"
        );
        return None;
    }

    Some(parse_neighbour_table(&String::from_utf8_lossy(&output.stdout)))
}
