use chrono::NaiveDate;
use serde::Serialize;

use crate::registry::{Color, GroupId, Site};

/// One input row after its timestamp has been validated.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub channel: String,
    pub date: NaiveDate,
    pub exposure: f64,
    pub click: f64,
    pub sales: f64,
}

/// A single hop of one record's funnel, before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub value: f64,
    pub date: NaiveDate,
    pub channel: String,
    pub group: GroupId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedEdge {
    pub source: String,
    pub target: String,
    pub group: GroupId,
    pub channel: String,
    pub value: f64,
}

/// Inclusive date window; reversed bounds are swapped on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start > end {
            tracing::warn!(%start, %end, "start date is after end date, swapping");
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkMeta {
    pub source: String,
    pub target: String,
    pub original_value: f64,
    /// Percent of the target's total inflow.
    pub ratio: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenderLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub color: Color,
    pub meta: LinkMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeMeta {
    pub inflow: f64,
    pub outflow: f64,
    /// Empty when suppressed (Total* nodes, unclassified nodes, zero totals).
    pub share: String,
}

/// Node and link arrays in the shape a Sankey renderer consumes.
#[derive(Debug, Clone, Serialize)]
pub struct Diagram {
    pub title: String,
    pub labels: Vec<String>,
    pub node_colors: Vec<Color>,
    pub node_meta: Vec<NodeMeta>,
    pub links: Vec<RenderLink>,
}

#[derive(Debug, Clone)]
pub struct ChannelSummary {
    pub channel: String,
    pub total_value: f64,
    pub edge_count: usize,
}

#[derive(Debug, Clone)]
pub struct SiteSummary {
    pub site: Site,
    pub exposure: f64,
    pub click: f64,
    pub sales: f64,
}

#[derive(Debug, Clone, Default)]
pub struct SummaryStats {
    pub record_count: usize,
    pub edge_count: usize,
    pub channel_count: usize,
    pub total_exposure: f64,
    pub total_click: f64,
    pub total_sales: f64,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}
