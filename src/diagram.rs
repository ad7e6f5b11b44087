use tracing::info;

use crate::aggregate::aggregate;
use crate::error::FlowError;
use crate::highlight;
use crate::layout::plan_order;
use crate::models::{DateRange, Diagram, Edge};
use crate::registry::{ChannelRegistry, Site};
use crate::style::{style, Scales};

/// Runs one full pass from normalized edges to renderer-ready arrays.
pub fn build_diagram(
    registry: &ChannelRegistry,
    edges: &[Edge],
    range: DateRange,
    keyword: &str,
    scales: Scales,
) -> Result<Diagram, FlowError> {
    let aggregated = aggregate(edges, range);
    if aggregated.is_empty() {
        return Err(FlowError::EmptyResult {
            start: range.start,
            end: range.end,
        });
    }

    let order = plan_order(registry, &Site::ALL);
    let highlight = highlight::resolve(keyword, registry);
    let styled = style(registry, &aggregated, &highlight, &order, scales);

    info!(
        nodes = order.len(),
        links = styled.links.len(),
        matched = highlight.channels.len(),
        "diagram built"
    );

    Ok(Diagram {
        title: title(range, keyword),
        labels: order.into_iter().collect(),
        node_colors: styled.node_colors,
        node_meta: styled.node_meta,
        links: styled.links,
    })
}

pub fn title(range: DateRange, keyword: &str) -> String {
    let mut title = format!(
        "Multi-site traffic conversion paths ({} to {})",
        range.start, range.end
    );
    let keyword = keyword.trim();
    if !keyword.is_empty() {
        title.push_str(&format!(" | highlight: {}", keyword.to_lowercase()));
    }
    title
}
