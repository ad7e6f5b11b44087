use tracing::{debug, warn};

use crate::error::FlowError;
use crate::models::{Edge, RawRecord};
use crate::registry::{Channel, ChannelRegistry, Stage};

/// Edges produced from the accepted records plus the rows that were skipped.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub records: Vec<RawRecord>,
    pub edges: Vec<Edge>,
    pub skipped: Vec<FlowError>,
}

/// Expands one record into the nine hops of its funnel:
/// channel, own node, site node and total node for exposure, then the same
/// three hops for click and for sales.
pub fn normalize(registry: &ChannelRegistry, record: &RawRecord) -> Result<Vec<Edge>, FlowError> {
    let channel = registry.resolve(&record.channel)?;
    let mut edges = Vec::with_capacity(9);

    let mut upstream = channel.name.as_str();
    for stage in Stage::ALL {
        let value = stage_value(record, stage);
        let own = channel.own_node(stage);
        let site = channel.site_node(stage);
        edges.push(edge(channel, record, upstream, own, value));
        edges.push(edge(channel, record, own, site, value));
        edges.push(edge(channel, record, site, stage.total_node(), value));
        upstream = stage.total_node();
    }

    Ok(edges)
}

/// Normalizes a batch, absorbing per-record anomalies.
pub fn normalize_all(registry: &ChannelRegistry, records: Vec<RawRecord>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    for record in records {
        if registry.is_ignored(&record.channel) {
            debug!(channel = %record.channel, "skipping summary row");
            continue;
        }
        match normalize(registry, &record) {
            Ok(edges) => {
                batch.edges.extend(edges);
                batch.records.push(record);
            }
            Err(err) => {
                warn!(%err, "record skipped");
                batch.skipped.push(err);
            }
        }
    }

    batch
}

fn stage_value(record: &RawRecord, stage: Stage) -> f64 {
    match stage {
        Stage::Exposure => record.exposure,
        Stage::Click => record.click,
        Stage::Sales => record.sales,
    }
}

fn edge(channel: &Channel, record: &RawRecord, source: &str, target: &str, value: f64) -> Edge {
    Edge {
        source: source.to_string(),
        target: target.to_string(),
        value,
        date: record.date,
        channel: channel.name.clone(),
        group: channel.group,
    }
}
