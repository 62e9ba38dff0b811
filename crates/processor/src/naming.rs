// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Output metric naming: the intelligent name generator and the
//! `output_pattern` template engine.
//!
//! Names are pure functions of the rule inputs, the model coordinates and
//! the target output tensor name, so identical configuration always yields
//! identical output metric names. The generator heuristics sit behind
//! [`NamingConfig`] flags so the documented test vectors stay authoritative.

use serde::Deserialize;

/// First-level name components that are dropped when `skip_common_domains`
/// is set and the input name is deep enough to survive the cut.
const COMMON_DOMAINS: &[&str] = &[
    "system",
    "app",
    "service",
    "network",
    "container",
    "process",
    "host",
    "cloud",
    "k8s",
];

/// Maximum length of a joined-stem suffix before abbreviation falls back to
/// stem initials.
const MAX_JOINED_SUFFIX: usize = 20;

/// Stem length used by the truncation fallback.
const TRUNCATED_STEM: usize = 4;

/// Tuning knobs for the intelligent name generator.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamingConfig {
    /// How many trailing name components make up a stem.
    #[serde(default = "default_max_stem_parts")]
    pub max_stem_parts: usize,

    /// Drop a leading well-known domain component (`system`, `k8s`, …) from
    /// input names with more than two components.
    #[serde(default = "default_skip_common_domains")]
    pub skip_common_domains: bool,

    /// When abbreviating many stems without a common prefix, bucket them by
    /// resource-category keywords instead of truncating.
    #[serde(default = "default_enable_category_grouping")]
    pub enable_category_grouping: bool,

    /// Up to this many unique stems are joined verbatim; above it the
    /// abbreviation strategies kick in.
    #[serde(default = "default_abbreviation_threshold")]
    pub abbreviation_threshold: usize,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            max_stem_parts: default_max_stem_parts(),
            skip_common_domains: default_skip_common_domains(),
            enable_category_grouping: default_enable_category_grouping(),
            abbreviation_threshold: default_abbreviation_threshold(),
        }
    }
}

const fn default_max_stem_parts() -> usize {
    2
}

const fn default_skip_common_domains() -> bool {
    true
}

const fn default_enable_category_grouping() -> bool {
    true
}

const fn default_abbreviation_threshold() -> usize {
    3
}

/// Why an `output_pattern` could not be applied.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// A `{` without a matching `}` (or the reverse).
    #[error("unbalanced braces")]
    UnbalancedBraces,

    /// The pattern is empty.
    #[error("empty pattern")]
    EmptyPattern,

    /// A `{…}` token that is not one of the defined placeholders.
    #[error("unrecognized placeholder `{{{token}}}`")]
    UnrecognizedPlaceholder {
        /// The token between the braces.
        token: String,
    },
}

/// Structural validation applied at rule-compile time: the pattern must be
/// non-empty with balanced, non-nested braces. Placeholder names are checked
/// when the pattern is applied, where an unknown token falls back to the
/// intelligent name with a warning.
pub fn validate_pattern(pattern: &str) -> Result<(), PatternError> {
    if pattern.trim().is_empty() {
        return Err(PatternError::EmptyPattern);
    }
    let mut open = false;
    for c in pattern.chars() {
        match c {
            '{' if open => return Err(PatternError::UnbalancedBraces),
            '{' => open = true,
            '}' if !open => return Err(PatternError::UnbalancedBraces),
            '}' => open = false,
            _ => {}
        }
    }
    if open {
        return Err(PatternError::UnbalancedBraces);
    }
    Ok(())
}

/// Applies an output pattern. Placeholders: `{output}`, `{model}`,
/// `{version}`, `{input}` (alias of `{input[0]}`) and `{input[N]}` with a
/// 0-based index; an out-of-range index falls back to input 0.
pub fn apply_pattern(
    pattern: &str,
    output_tensor: &str,
    model: &str,
    version: Option<&str>,
    inputs: &[&str],
) -> Result<String, PatternError> {
    validate_pattern(pattern)?;

    let mut result = String::with_capacity(pattern.len());
    let mut rest = pattern;
    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or(PatternError::UnbalancedBraces)?;
        let token = &after[..close];
        match token {
            "output" => result.push_str(output_tensor),
            "model" => result.push_str(model),
            "version" => result.push_str(version.unwrap_or("")),
            "input" => result.push_str(inputs.first().copied().unwrap_or("")),
            _ => {
                if let Some(index) = parse_input_index(token) {
                    let input = inputs
                        .get(index)
                        .or_else(|| inputs.first())
                        .copied()
                        .unwrap_or("");
                    result.push_str(input);
                } else {
                    return Err(PatternError::UnrecognizedPlaceholder {
                        token: token.to_string(),
                    });
                }
            }
        }
        rest = &after[close + 1..];
    }
    result.push_str(rest);
    Ok(result)
}

/// Parses the `input[N]` token form.
fn parse_input_index(token: &str) -> Option<usize> {
    let inner = token.strip_prefix("input[")?.strip_suffix(']')?;
    inner.parse().ok()
}

/// Produces a deterministic output metric name from the rule's input metric
/// names and the target output tensor name. See the module docs and the
/// algorithm steps below.
#[must_use]
pub fn intelligent_name(inputs: &[&str], output_tensor: &str, config: &NamingConfig) -> String {
    if inputs.is_empty() {
        return output_tensor.to_string();
    }

    let processed: Vec<Vec<&str>> = inputs
        .iter()
        .map(|input| preprocess(input, config))
        .collect();

    if processed.len() == 1 {
        let stem = stem_of(&processed[0], config.max_stem_parts);
        return format!("{stem}.{output_tensor}");
    }

    // Strip the longest dotwise common prefix, then stem each remainder.
    let prefix_len = common_prefix_len(&processed);
    let mut stems: Vec<String> = Vec::with_capacity(processed.len());
    for parts in &processed {
        let remainder = &parts[prefix_len.min(parts.len().saturating_sub(1))..];
        let stem = stem_of(remainder, config.max_stem_parts);
        if !stems.contains(&stem) {
            stems.push(stem);
        }
    }

    if stems.len() <= config.abbreviation_threshold {
        return format!("{}.{}", stems.join("_"), output_tensor);
    }

    let abbreviated = if prefix_len > 0 {
        let base = processed[0][prefix_len - 1];
        let joined = stems.join("_");
        if joined.len() <= MAX_JOINED_SUFFIX {
            format!("{base}_{joined}")
        } else {
            let initials: String = stems
                .iter()
                .filter_map(|s| s.chars().next())
                .collect();
            format!("{base}_{initials}")
        }
    } else if config.enable_category_grouping {
        categorize(&stems)
    } else {
        truncate_stems(&stems)
    };

    format!("{abbreviated}.{output_tensor}")
}

/// Splits an input name on dots, optionally dropping a leading common domain.
fn preprocess<'a>(input: &'a str, config: &NamingConfig) -> Vec<&'a str> {
    let parts: Vec<&str> = input.split('.').collect();
    if config.skip_common_domains && parts.len() > 2 && COMMON_DOMAINS.contains(&parts[0]) {
        parts[1..].to_vec()
    } else {
        parts
    }
}

/// The last `max_parts` components joined by underscores. An empty component
/// list falls back to a single empty stem, which callers never produce for
/// non-empty input names.
fn stem_of(parts: &[&str], max_parts: usize) -> String {
    let take = max_parts.max(1).min(parts.len());
    parts[parts.len() - take..].join("_")
}

/// Number of leading components shared by every processed input.
fn common_prefix_len(processed: &[Vec<&str>]) -> usize {
    let mut len = 0;
    let first = &processed[0];
    'outer: loop {
        if len >= first.len() {
            break;
        }
        for parts in &processed[1..] {
            if len >= parts.len() || parts[len] != first[len] {
                break 'outer;
            }
        }
        len += 1;
    }
    // Never consume an entire input; at least one component must remain to
    // form a stem.
    if processed.iter().any(|p| p.len() <= len) {
        len.saturating_sub(1)
    } else {
        len
    }
}

/// Buckets stems by resource-category keywords into `{cat}{N}` tokens,
/// in first-seen category order; uncategorized stems are truncated.
fn categorize(stems: &[String]) -> String {
    const CATEGORIES: &[(&str, &[&str])] = &[
        ("cpu", &["cpu", "core", "processor"]),
        ("mem", &["mem", "memory", "heap", "rss"]),
        ("net", &["net", "network", "tcp", "udp", "http"]),
        ("disk", &["disk", "io", "fs", "filesystem"]),
        ("app", &["app", "application", "request", "latency"]),
        ("db", &["db", "database", "sql", "query"]),
    ];

    let mut order: Vec<&str> = Vec::new();
    let mut counts: Vec<usize> = Vec::new();
    let mut leftovers: Vec<&String> = Vec::new();

    for stem in stems {
        let lowered = stem.to_ascii_lowercase();
        let category = CATEGORIES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(name, _)| *name);
        match category {
            Some(cat) => {
                if let Some(pos) = order.iter().position(|c| *c == cat) {
                    counts[pos] += 1;
                } else {
                    order.push(cat);
                    counts.push(1);
                }
            }
            None => leftovers.push(stem),
        }
    }

    let mut tokens: Vec<String> = order
        .iter()
        .zip(&counts)
        .map(|(cat, n)| format!("{cat}{n}"))
        .collect();
    for stem in leftovers {
        tokens.push(stem.chars().take(TRUNCATED_STEM).collect());
    }
    tokens.join("_")
}

fn truncate_stems(stems: &[String]) -> String {
    stems
        .iter()
        .map(|s| s.chars().take(TRUNCATED_STEM).collect::<String>())
        .collect::<Vec<_>>()
        .join("_")
}
