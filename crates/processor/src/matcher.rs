// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! The broadcast matcher: turns a rule's selected data points into an
//! ordered sequence of aligned groups, one per inference row.
//!
//! Data points of each input are partitioned by attribute-set equality,
//! keyed by the canonical attribute key. Inputs with a single partition are
//! broadcast across every group; inputs with multiple partitions constrain
//! the group set. Groups are emitted in lexicographic canonical-key order,
//! and that order is load-bearing: tensor values are emitted and output
//! attributes attached in exactly this sequence.

use crate::pdata::NumericPoint;
use std::collections::{BTreeMap, BTreeSet};

/// One aligned group: a data point per rule input, all agreeing on the
/// discriminating attribute partition.
#[derive(Debug, Clone)]
pub struct PointGroup {
    /// The canonical attribute key that identifies this group.
    pub key: String,
    /// One selected data point per input, in rule input order.
    pub points: Vec<NumericPoint>,
}

/// Partitions of one input's data points, keyed canonically. Only the first
/// point of each partition participates in matching.
struct InputPartitions<'a> {
    partitions: BTreeMap<String, &'a NumericPoint>,
}

impl<'a> InputPartitions<'a> {
    fn build(points: &'a [NumericPoint]) -> Self {
        let mut partitions = BTreeMap::new();
        for point in points {
            let _ = partitions.entry(point.canonical_key()).or_insert(point);
        }
        Self { partitions }
    }

    fn is_broadcast(&self) -> bool {
        self.partitions.len() == 1
    }

    fn sole_point(&self) -> Option<&'a NumericPoint> {
        self.partitions.values().next().copied()
    }
}

/// Aligns the selected data points of a rule's inputs into ordered groups.
///
/// `inputs` carries one entry per rule input, in declaration order, each with
/// the data points that survived selector filtering. Inputs with no points
/// must be rejected by the caller beforehand (missing-input handling).
#[must_use]
pub fn align_groups(inputs: &[(String, Vec<NumericPoint>)]) -> Vec<PointGroup> {
    if inputs.is_empty() || inputs.iter().any(|(_, points)| points.is_empty()) {
        return Vec::new();
    }

    let partitioned: Vec<InputPartitions<'_>> = inputs
        .iter()
        .map(|(_, points)| InputPartitions::build(points))
        .collect();

    let multi: Vec<&InputPartitions<'_>> = partitioned
        .iter()
        .filter(|p| !p.is_broadcast())
        .collect();

    // Target key set: one empty-keyed group when everything broadcasts,
    // otherwise the intersection of the discriminating inputs' partition
    // keys, falling back to their union when the intersection is empty.
    let targets: BTreeSet<String> = if multi.is_empty() {
        let mut set = BTreeSet::new();
        let _ = set.insert(String::new());
        set
    } else {
        let mut intersection: BTreeSet<String> =
            multi[0].partitions.keys().cloned().collect();
        for input in &multi[1..] {
            intersection.retain(|key| input.partitions.contains_key(key));
        }
        if intersection.is_empty() {
            multi
                .iter()
                .flat_map(|input| input.partitions.keys().cloned())
                .collect()
        } else {
            intersection
        }
    };

    let mut groups = Vec::with_capacity(targets.len());
    for target in targets {
        let mut points = Vec::with_capacity(inputs.len());
        for partitions in &partitioned {
            let point = if partitions.is_broadcast() {
                partitions.sole_point()
            } else {
                partitions.partitions.get(&target).copied()
            };
            match point {
                Some(point) => points.push(point.clone()),
                // A discriminating input without this partition: the group
                // cannot reach full arity, drop it.
                None => break,
            }
        }
        if points.len() == inputs.len() {
            groups.push(PointGroup {
                key: target,
                points,
            });
        }
    }
    groups
}
