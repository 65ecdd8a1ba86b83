//! Regex relabel rules for the textfile sink.
//!
//! Each rule is a regular expression with named capture groups. The first
//! rule that matches a flat metric name decides how it is exported:
//!
//! - `key` (mandatory) becomes the metric name
//! - `sub_key` (optional) is appended to the metric name
//! - every other group that took part in the match becomes a label
//!
//! Metric names no rule matches are not exported.

use regex::Regex;

use crate::SinkError;
use crate::mapping::{build_metric_name, sanitize_label_name};

const KEY_GROUP: &str = "key";
const SUB_KEY_GROUP: &str = "sub_key";

/// Result of relabeling one metric name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relabeled {
    /// Prometheus metric name, prefix included.
    pub name: String,
    /// Labels in the order their groups appear in the pattern.
    pub labels: Vec<(String, String)>,
}

/// Ordered, compiled relabel rule set.
#[derive(Debug, Clone)]
pub struct RelabelRules {
    rules: Vec<Regex>,
}

impl RelabelRules {
    /// Compile the rule patterns, rejecting any without a `key` group.
    pub fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, SinkError> {
        let rules = patterns
            .iter()
            .map(|p| {
                let pattern = p.as_ref();
                let regex = Regex::new(pattern).map_err(|e| SinkError::Rule {
                    pattern: pattern.to_string(),
                    message: e.to_string(),
                })?;

                if !regex.capture_names().flatten().any(|n| n == KEY_GROUP) {
                    return Err(SinkError::Rule {
                        pattern: pattern.to_string(),
                        message: format!("missing named group `{}`", KEY_GROUP),
                    });
                }

                Ok(regex)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Relabel a metric name with the first matching rule.
    ///
    /// Matching is anchored at the start of the name, like the rules are
    /// usually written; a rule whose `key` group did not participate is
    /// treated as a miss.
    pub fn apply(&self, prefix: &str, metric: &str) -> Option<Relabeled> {
        for rule in &self.rules {
            let Some(caps) = rule.captures(metric) else {
                continue;
            };
            if caps.get(0).map(|m| m.start()) != Some(0) {
                continue;
            }
            let Some(key) = caps.name(KEY_GROUP) else {
                continue;
            };

            let sub_key = caps.name(SUB_KEY_GROUP).map(|m| m.as_str());
            let labels = rule
                .capture_names()
                .flatten()
                .filter(|name| *name != KEY_GROUP && *name != SUB_KEY_GROUP)
                .filter_map(|name| {
                    caps.name(name)
                        .map(|m| (sanitize_label_name(name), m.as_str().to_string()))
                })
                .collect();

            return Some(Relabeled {
                name: build_metric_name(prefix, key.as_str(), sub_key),
                labels,
            });
        }

        None
    }
}
