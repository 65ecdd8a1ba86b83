//! Parsers for kernel counter tables under `/proc`.
//!
//! Every parser is a pure function from file contents to a [`MetricMap`];
//! reading the files is left to the collector.

use once_cell::sync::Lazy;
use regex::Regex;

use meshstat_common::{MetricMap, MetricValue};

use crate::config::DeviceConfig;

/// Counter columns of `/proc/net/dev`, per direction.
pub const FIELDS: [&str; 8] = [
    "bytes",
    "packets",
    "errs",
    "drop",
    "fifo",
    "frame",
    "compressed",
    "multicast",
];

/// Directions of `/proc/net/dev`, in column order.
pub const DIRECTIONS: [&str; 2] = ["rx", "tx"];

/// Line grammar for `/proc/net/dev`: the device name followed by one named
/// capture per direction and field.
static NET_DEV_LINE: Lazy<Regex> = Lazy::new(|| {
    let columns: Vec<String> = DIRECTIONS
        .iter()
        .flat_map(|direction| {
            FIELDS
                .iter()
                .map(move |field| format!(r"(?P<{}_{}>\d+)", direction, field))
        })
        .collect();

    let pattern = format!(r"^\s*(?P<device_name>[\w-]+):\s*{}", columns.join(r"\s+"));
    Regex::new(&pattern).expect("net/dev grammar is valid")
});

/// Parse `/proc/net/dev` into `<device>.<direction>.<field>` counters.
///
/// Header lines and anything else the grammar does not match are skipped.
/// Device names are translated through the alias table first and must then
/// pass the allow-list.
pub fn parse_net_dev(content: &str, devices: &DeviceConfig) -> MetricMap {
    let mut metrics = MetricMap::new();

    for line in content.lines() {
        let Some(caps) = NET_DEV_LINE.captures(line) else {
            continue;
        };

        let device = devices.translate(&caps["device_name"]);
        if !devices.should_include(device) {
            continue;
        }

        for direction in DIRECTIONS {
            for field in FIELDS {
                let group = format!("{}_{}", direction, field);
                if let Some(value) = caps.name(&group) {
                    metrics.insert(
                        format!("{}.{}.{}", device, direction, field),
                        MetricValue::parse_numeric(value.as_str()),
                    );
                }
            }
        }
    }

    metrics
}

/// Parse `/proc/loadavg`.
///
/// The first three fields land in `load.15`, `load.5` and `load.1`
/// respectively; dashboards depend on these names.
pub fn parse_loadavg(content: &str) -> MetricMap {
    let mut metrics = MetricMap::new();
    let fields: Vec<&str> = content.split_whitespace().take(3).collect();

    for (key, value) in ["load.15", "load.5", "load.1"].iter().zip(fields) {
        metrics.insert(key.to_string(), MetricValue::parse_numeric(value));
    }

    metrics
}

/// Parse `/proc/net/snmp` into `ipv4.<Section>.<Column>`.
///
/// The file is a sequence of heading/value line pairs sharing a section
/// prefix; columns are zipped positionally.
pub fn parse_snmp(content: &str) -> MetricMap {
    let mut metrics = MetricMap::new();
    let mut lines = content.lines().filter(|l| !l.trim().is_empty());

    while let (Some(heading), Some(values)) = (lines.next(), lines.next()) {
        let Some((section, columns)) = heading.split_once(':') else {
            tracing::debug!(line = heading, "Skipping malformed snmp heading");
            continue;
        };
        let Some((value_section, values)) = values.split_once(':') else {
            tracing::debug!(line = values, "Skipping malformed snmp values");
            continue;
        };
        if section != value_section {
            tracing::debug!(section, value_section, "snmp heading and values disagree");
            continue;
        }

        for (column, value) in columns.split_whitespace().zip(values.split_whitespace()) {
            metrics.insert(
                format!("ipv4.{}.{}", section.trim(), column),
                MetricValue::parse_numeric(value),
            );
        }
    }

    metrics
}

/// Parse `/proc/net/snmp6` into `ipv6.<Key>`.
pub fn parse_snmp6(content: &str) -> MetricMap {
    content
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let key = parts.next()?;
            let value = parts.next()?;
            Some((format!("ipv6.{}", key), MetricValue::parse_numeric(value)))
        })
        .collect()
}

/// Extract the context switch counter from `/proc/stat`.
pub fn parse_stat(content: &str) -> MetricMap {
    let mut metrics = MetricMap::new();

    let ctxt = content.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        (parts.next()? == "ctxt").then(|| parts.next()).flatten()
    });

    if let Some(value) = ctxt {
        metrics.insert(
            "context_switches".to_string(),
            MetricValue::parse_numeric(value),
        );
    }

    metrics
}

/// Turn a single-value sysctl file into a metric, if it holds one.
pub fn parse_single_value(key: &str, content: &str) -> MetricMap {
    let mut metrics = MetricMap::new();
    let value = content.trim();
    if !value.is_empty() {
        metrics.insert(key.to_string(), MetricValue::parse_numeric(value));
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;

    const NET_DEV: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1296042   12046    0    0    0     0          0         0  1296042   12046    0    0    0     0       0          0
  eth0: 987654321 654321    1    2    0     0          0      1234 123456789 234567    0    3    0     0       0          0
freifunk: 5555 66 0 0 0 0 0 7 8888 99 0 0 0 0 0 0
 wlan0: 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16
";

    #[test]
    fn test_grammar_has_all_columns() {
        assert_eq!(NET_DEV_LINE.captures_len(), 1 + 1 + 16);
        for direction in DIRECTIONS {
            for field in FIELDS {
                let name = format!("{}_{}", direction, field);
                assert!(NET_DEV_LINE.capture_names().flatten().any(|n| n == name));
            }
        }
    }

    #[test]
    fn test_parse_net_dev_filters_and_translates() {
        let metrics = parse_net_dev(NET_DEV, &DeviceConfig::default());

        assert_eq!(
            metrics.get("eth0.rx.bytes"),
            Some(&MetricValue::Counter(987654321))
        );
        assert_eq!(
            metrics.get("eth0.rx.multicast"),
            Some(&MetricValue::Counter(1234))
        );
        assert_eq!(
            metrics.get("eth0.tx.packets"),
            Some(&MetricValue::Counter(234567))
        );
        assert_eq!(metrics.get("eth0.tx.drop"), Some(&MetricValue::Counter(3)));

        // freifunk is reported under its alias
        assert_eq!(
            metrics.get("ffda-br.rx.multicast"),
            Some(&MetricValue::Counter(7))
        );
        assert!(!metrics.keys().any(|k| k.starts_with("freifunk.")));

        assert!(!metrics.keys().any(|k| k.starts_with("lo.")));
        assert!(!metrics.keys().any(|k| k.starts_with("wlan0.")));

        assert_eq!(metrics.len(), 32);
    }

    #[test]
    fn test_parse_net_dev_suffix_allow() {
        let content = " ffmz-vpn: 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15 16\n";
        let metrics = parse_net_dev(content, &DeviceConfig::default());

        assert_eq!(metrics.get("ffmz-vpn.rx.bytes"), Some(&MetricValue::Counter(1)));
        assert_eq!(
            metrics.get("ffmz-vpn.tx.multicast"),
            Some(&MetricValue::Counter(16))
        );
    }

    #[test]
    fn test_parse_net_dev_garbage() {
        let metrics = parse_net_dev("eth0: not numbers\n\n", &DeviceConfig::default());
        assert!(metrics.is_empty());
    }

    #[test]
    fn test_parse_loadavg() {
        let metrics = parse_loadavg("0.10 0.20 0.30 1/200 1234\n");

        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics.get("load.15"), Some(&MetricValue::Gauge(0.1)));
        assert_eq!(metrics.get("load.5"), Some(&MetricValue::Gauge(0.2)));
        assert_eq!(metrics.get("load.1"), Some(&MetricValue::Gauge(0.3)));
    }

    #[test]
    fn test_parse_loadavg_short() {
        let metrics = parse_loadavg("0.10\n");
        assert_eq!(metrics.len(), 1);
        assert!(parse_loadavg("").is_empty());
    }

    #[test]
    fn test_parse_snmp() {
        let content = "\
Ip: Forwarding DefaultTTL InReceives
Ip: 1 64 123456
Icmp: InMsgs InErrors
Icmp: 42 0
";
        let metrics = parse_snmp(content);

        assert_eq!(
            metrics.get("ipv4.Ip.Forwarding"),
            Some(&MetricValue::Counter(1))
        );
        assert_eq!(
            metrics.get("ipv4.Ip.InReceives"),
            Some(&MetricValue::Counter(123456))
        );
        assert_eq!(metrics.get("ipv4.Icmp.InMsgs"), Some(&MetricValue::Counter(42)));
        assert_eq!(metrics.len(), 5);
    }

    #[test]
    fn test_parse_snmp_negative_value() {
        let content = "Tcp: RtoAlgorithm MaxConn\nTcp: 1 -1\n";
        let metrics = parse_snmp(content);
        assert_eq!(metrics.get("ipv4.Tcp.MaxConn"), Some(&MetricValue::Gauge(-1.0)));
    }

    #[test]
    fn test_parse_snmp6() {
        let content = "Ip6InReceives                   \t1234\nIp6InHdrErrors                  \t0\n\n";
        let metrics = parse_snmp6(content);

        assert_eq!(
            metrics.get("ipv6.Ip6InReceives"),
            Some(&MetricValue::Counter(1234))
        );
        assert_eq!(
            metrics.get("ipv6.Ip6InHdrErrors"),
            Some(&MetricValue::Counter(0))
        );
        assert_eq!(metrics.len(), 2);
    }

    #[test]
    fn test_parse_stat() {
        let content = "cpu  1 2 3 4\nintr 99 1 2\nctxt 987654\nbtime 1700000000\n";
        let metrics = parse_stat(content);

        assert_eq!(metrics.len(), 1);
        assert_eq!(
            metrics.get("context_switches"),
            Some(&MetricValue::Counter(987654))
        );

        assert!(parse_stat("cpu 1 2 3\n").is_empty());
    }

    #[test]
    fn test_parse_single_value() {
        let metrics = parse_single_value("netfilter.count", "512\n");
        assert_eq!(metrics.get("netfilter.count"), Some(&MetricValue::Counter(512)));
        assert!(parse_single_value("netfilter.max", "  \n").is_empty());
    }
}
