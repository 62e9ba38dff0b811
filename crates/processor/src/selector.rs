// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Label selector parsing and matching.
//!
//! Grammar: `metricName ( "{" (ident "=" quotedString ("," …)*)? "}" )?`.
//! A selector without braces matches purely by metric name (legacy form).
//! Label values are compared verbatim against the string rendering of the
//! data point attribute.

use crate::pdata::attr_value_string;
use opentelemetry_proto::tonic::common::v1::KeyValue;
use std::collections::BTreeMap;

/// Typed parse errors for selector strings. The message names the offending
/// construct so config mistakes are actionable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The selector string is empty or whitespace.
    #[error("empty selector")]
    Empty,

    /// A `{` without a matching trailing `}`, or a `}` in the wrong place.
    #[error("missing or misplaced closing brace")]
    UnbalancedBrace,

    /// The part before `{` is empty.
    #[error("empty metric name")]
    EmptyMetricName,

    /// A label pair without a `=` separator.
    #[error("missing '=' in label pair `{pair}`")]
    MissingEquals {
        /// The offending pair as written.
        pair: String,
    },

    /// A label pair whose key is empty.
    #[error("empty label key in pair `{pair}`")]
    EmptyLabelKey {
        /// The offending pair as written.
        pair: String,
    },
}

/// A parsed selector: a metric name plus zero or more exact-match label
/// filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelSelector {
    /// The metric name to match exactly.
    pub metric_name: String,
    /// Label filters; every filter must match for a data point to be selected.
    pub label_filters: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Parses a selector string.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }

        let Some(open) = trimmed.find('{') else {
            // Legacy unbraced form: the entire string is the metric name.
            if trimmed.contains('}') {
                return Err(SelectorError::UnbalancedBrace);
            }
            return Ok(LabelSelector {
                metric_name: trimmed.to_string(),
                label_filters: BTreeMap::new(),
            });
        };

        if !trimmed.ends_with('}') {
            return Err(SelectorError::UnbalancedBrace);
        }
        let metric_name = trimmed[..open].trim();
        if metric_name.is_empty() {
            return Err(SelectorError::EmptyMetricName);
        }

        let body = &trimmed[open + 1..trimmed.len() - 1];
        if body.contains('{') || unquoted_brace(body) {
            return Err(SelectorError::UnbalancedBrace);
        }

        let mut label_filters = BTreeMap::new();
        for pair in split_pairs(body) {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some(eq) = pair.find('=') else {
                return Err(SelectorError::MissingEquals {
                    pair: pair.to_string(),
                });
            };
            let key = pair[..eq].trim();
            if key.is_empty() {
                return Err(SelectorError::EmptyLabelKey {
                    pair: pair.to_string(),
                });
            }
            let value = unquote(pair[eq + 1..].trim());
            let _ = label_filters.insert(key.to_string(), value);
        }

        Ok(LabelSelector {
            metric_name: metric_name.to_string(),
            label_filters,
        })
    }

    /// True when the metric name matches this selector.
    #[must_use]
    pub fn matches_metric(&self, metric_name: &str) -> bool {
        self.metric_name == metric_name
    }

    /// True when every label filter matches the given attribute set.
    /// A selector with zero filters matches any data point.
    #[must_use]
    pub fn matches_attributes(&self, attributes: &[KeyValue]) -> bool {
        self.label_filters.iter().all(|(key, expected)| {
            attributes.iter().any(|kv| {
                kv.key == *key
                    && kv
                        .value
                        .as_ref()
                        .map(attr_value_string)
                        .unwrap_or_default()
                        == *expected
            })
        })
    }
}

/// Splits the brace body at commas that are not inside a double-quoted value.
fn split_pairs(body: &str) -> Vec<&str> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in body.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                pairs.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pairs.push(&body[start..]);
    pairs
}

/// True when a `}` occurs outside of a quoted value.
fn unquoted_brace(body: &str) -> bool {
    let mut in_quotes = false;
    for c in body.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            '}' if !in_quotes => return true,
            _ => {}
        }
    }
    false
}

/// Strips one pair of surrounding double quotes, if present.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::attr;

    #[test]
    fn parses_unbraced_legacy_form() {
        let sel = LabelSelector::parse("cpu.usage").unwrap();
        assert_eq!(sel.metric_name, "cpu.usage");
        assert!(sel.label_filters.is_empty());
    }

    #[test]
    fn parses_empty_braces() {
        let sel = LabelSelector::parse("cpu.usage{}").unwrap();
        assert_eq!(sel.metric_name, "cpu.usage");
        assert!(sel.label_filters.is_empty());
    }

    #[test]
    fn parses_filters_with_whitespace() {
        let sel = LabelSelector::parse(r#"mem.bytes{ state = "used" , host = "a" }"#).unwrap();
        assert_eq!(sel.metric_name, "mem.bytes");
        assert_eq!(sel.label_filters.get("state").map(String::as_str), Some("used"));
        assert_eq!(sel.label_filters.get("host").map(String::as_str), Some("a"));
    }

    #[test]
    fn commas_inside_quoted_values_do_not_split() {
        let sel = LabelSelector::parse(r#"m{k="a,b",j="c"}"#).unwrap();
        assert_eq!(sel.label_filters.get("k").map(String::as_str), Some("a,b"));
        assert_eq!(sel.label_filters.get("j").map(String::as_str), Some("c"));
    }

    #[test]
    fn empty_values_are_legal() {
        let sel = LabelSelector::parse(r#"m{k=""}"#).unwrap();
        assert_eq!(sel.label_filters.get("k").map(String::as_str), Some(""));
    }

    #[test]
    fn rejects_empty_selector() {
        assert_eq!(LabelSelector::parse("   "), Err(SelectorError::Empty));
    }

    #[test]
    fn rejects_missing_closing_brace() {
        assert_eq!(
            LabelSelector::parse(r#"m{k="v""#),
            Err(SelectorError::UnbalancedBrace)
        );
    }

    #[test]
    fn rejects_stray_closing_brace() {
        assert_eq!(LabelSelector::parse("m}"), Err(SelectorError::UnbalancedBrace));
        assert_eq!(
            LabelSelector::parse(r#"m{k="v"}x"#),
            Err(SelectorError::UnbalancedBrace)
        );
    }

    #[test]
    fn rejects_empty_metric_name() {
        assert_eq!(
            LabelSelector::parse(r#"{k="v"}"#),
            Err(SelectorError::EmptyMetricName)
        );
    }

    #[test]
    fn rejects_pair_without_equals() {
        let err = LabelSelector::parse("m{kv}").unwrap_err();
        assert!(matches!(err, SelectorError::MissingEquals { .. }));
    }

    #[test]
    fn rejects_empty_label_key() {
        let err = LabelSelector::parse(r#"m{="v"}"#).unwrap_err();
        assert!(matches!(err, SelectorError::EmptyLabelKey { .. }));
    }

    #[test]
    fn matches_attributes_with_filters() {
        let sel = LabelSelector::parse(r#"mem.bytes{state="used"}"#).unwrap();
        assert!(sel.matches_attributes(&[attr("state", "used"), attr("host", "a")]));
        assert!(!sel.matches_attributes(&[attr("state", "free")]));
        assert!(!sel.matches_attributes(&[]));
    }

    #[test]
    fn zero_filters_match_any_point() {
        let sel = LabelSelector::parse("mem.bytes").unwrap();
        assert!(sel.matches_attributes(&[]));
        assert!(sel.matches_attributes(&[attr("state", "used")]));
    }
}
