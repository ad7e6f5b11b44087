use std::collections::HashMap;

use crate::models::{AggregatedEdge, DateRange, Edge};
use crate::registry::GroupId;

/// Sums edge values per (source, target, channel, group) inside the window
/// and drops groups that sum to zero. Output follows first-seen order.
pub fn aggregate(edges: &[Edge], range: DateRange) -> Vec<AggregatedEdge> {
    let mut slots: HashMap<(&str, &str, &str, GroupId), usize> = HashMap::new();
    let mut sums: Vec<AggregatedEdge> = Vec::new();

    for edge in edges.iter().filter(|edge| range.contains(edge.date)) {
        let key = (
            edge.source.as_str(),
            edge.target.as_str(),
            edge.channel.as_str(),
            edge.group,
        );
        let idx = *slots.entry(key).or_insert_with(|| {
            sums.push(AggregatedEdge {
                source: edge.source.clone(),
                target: edge.target.clone(),
                group: edge.group,
                channel: edge.channel.clone(),
                value: 0.0,
            });
            sums.len() - 1
        });
        sums[idx].value += edge.value;
    }

    sums.retain(|edge| edge.value > 0.0);
    sums
}

/// Total inflow per target node.
pub fn inflow_by_target(edges: &[AggregatedEdge]) -> HashMap<&str, f64> {
    let mut totals = HashMap::new();
    for edge in edges {
        *totals.entry(edge.target.as_str()).or_insert(0.0) += edge.value;
    }
    totals
}

/// Total outflow per source node.
pub fn outflow_by_source(edges: &[AggregatedEdge]) -> HashMap<&str, f64> {
    let mut totals = HashMap::new();
    for edge in edges {
        *totals.entry(edge.source.as_str()).or_insert(0.0) += edge.value;
    }
    totals
}
