//! Mapping from flat dotted metric names to Prometheus exposition syntax.

/// Replace characters `keep` rejects with `_` and collapse underscore runs.
///
/// Trailing underscores are dropped, so a key ending in a separator does
/// not leave a dangling `_`.
fn squash(name: &str, keep: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(name.len() + 1);

    for c in name.chars().map(|c| if keep(c) { c } else { '_' }) {
        if c != '_' || !out.ends_with('_') {
            out.push(c);
        }
    }

    let trimmed = out.trim_end_matches('_').len();
    out.truncate(trimmed);
    out
}

/// Sanitize a metric name to be Prometheus-compatible.
///
/// Prometheus metric names must match `[a-zA-Z_:][a-zA-Z0-9_:]*`. Names
/// here are built from dotted metric keys, so the dots (and any `-` in
/// interface names) become single underscores.
pub fn sanitize_metric_name(name: &str) -> String {
    let mut result = squash(name, |c| c.is_ascii_alphanumeric() || c == '_' || c == ':');

    // `load.15` with an empty prefix would otherwise start with a digit
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }

    if result.is_empty() {
        result.push_str("unnamed");
    }

    result
}

/// Sanitize a relabel group name for use as a label name.
///
/// Group names may contain `.` and brackets, which labels may not.
/// Collapsing underscore runs also keeps labels out of the reserved `__`
/// namespace.
pub fn sanitize_label_name(name: &str) -> String {
    let mut result = squash(name, |c| c.is_ascii_alphanumeric() || c == '_');

    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }

    if result.is_empty() {
        return "label".to_string();
    }

    result
}

/// Build a full Prometheus metric name from a relabel match.
///
/// Format: `{prefix}_{key}[_{sub_key}]`, with dots in `key` turned into
/// underscores.
pub fn build_metric_name(prefix: &str, key: &str, sub_key: Option<&str>) -> String {
    let mut name = key.replace('.', "_");

    let prefix = prefix.trim_end_matches('_');
    if !prefix.is_empty() {
        name = format!("{}_{}", prefix, name);
    }

    if let Some(sub_key) = sub_key.filter(|s| !s.is_empty()) {
        name.push('_');
        name.push_str(sub_key);
    }

    sanitize_metric_name(&name)
}

/// Escape special characters in label values.
pub fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Format a floating point value for Prometheus.
pub fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format.
pub fn format_labels(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }

    let parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    format!("{{{}}}", parts.join(","))
}
