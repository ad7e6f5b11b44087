use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use crate::highlight::Highlight;
use crate::models::{ChannelSummary, DateRange, Edge, RawRecord, SiteSummary, SummaryStats};
use crate::registry::{ChannelRegistry, Site};

pub fn summarize(records: &[RawRecord], edges: &[Edge], range: DateRange) -> SummaryStats {
    let in_range: Vec<&RawRecord> = records.iter().filter(|r| range.contains(r.date)).collect();
    let channels: HashSet<&str> = in_range.iter().map(|r| r.channel.as_str()).collect();

    SummaryStats {
        record_count: in_range.len(),
        edge_count: edges.iter().filter(|e| range.contains(e.date)).count(),
        channel_count: channels.len(),
        total_exposure: in_range.iter().map(|r| r.exposure).sum(),
        total_click: in_range.iter().map(|r| r.click).sum(),
        total_sales: in_range.iter().map(|r| r.sales).sum(),
        first_date: in_range.iter().map(|r| r.date).min(),
        last_date: in_range.iter().map(|r| r.date).max(),
    }
}

pub fn summarize_by_channel(edges: &[Edge], range: DateRange) -> Vec<ChannelSummary> {
    let mut map: HashMap<&str, (f64, usize)> = HashMap::new();

    for edge in edges.iter().filter(|e| range.contains(e.date)) {
        let entry = map.entry(edge.channel.as_str()).or_insert((0.0, 0));
        entry.0 += edge.value;
        entry.1 += 1;
    }

    let mut summaries: Vec<ChannelSummary> = map
        .into_iter()
        .map(|(channel, (total_value, edge_count))| ChannelSummary {
            channel: channel.to_string(),
            total_value,
            edge_count,
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.total_value
            .partial_cmp(&a.total_value)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.channel.cmp(&b.channel))
    });
    summaries
}

pub fn summarize_by_site(
    registry: &ChannelRegistry,
    records: &[RawRecord],
    range: DateRange,
) -> Vec<SiteSummary> {
    let mut summaries: Vec<SiteSummary> = Site::ALL
        .into_iter()
        .map(|site| SiteSummary {
            site,
            exposure: 0.0,
            click: 0.0,
            sales: 0.0,
        })
        .collect();

    for record in records.iter().filter(|r| range.contains(r.date)) {
        let Some(channel) = registry.get(&record.channel) else {
            continue;
        };
        if let Some(summary) = summaries.iter_mut().find(|s| s.site == channel.site) {
            summary.exposure += record.exposure;
            summary.click += record.click;
            summary.sales += record.sales;
        }
    }

    summaries
}

pub fn build_report(
    registry: &ChannelRegistry,
    records: &[RawRecord],
    edges: &[Edge],
    range: DateRange,
    keyword: &str,
    highlight: &Highlight,
) -> String {
    let stats = summarize(records, edges, range);
    let channels = summarize_by_channel(edges, range);
    let sites = summarize_by_site(registry, records, range);

    let mut output = String::new();

    let _ = writeln!(output, "# Traffic Flow Report");
    let _ = writeln!(output, "Window {} to {}", range.start, range.end);
    let keyword = keyword.trim();
    if !keyword.is_empty() {
        let _ = writeln!(output, "Highlight: {}", keyword);
    }
    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");

    if stats.record_count == 0 {
        let _ = writeln!(output, "No records in this window.");
    } else {
        let _ = writeln!(output, "- Records: {}", stats.record_count);
        let _ = writeln!(output, "- Links: {}", stats.edge_count);
        let _ = writeln!(output, "- Channels: {}", stats.channel_count);
        let _ = writeln!(output, "- Exposure: {:.0}", stats.total_exposure);
        let _ = writeln!(output, "- Clicks: {:.0}", stats.total_click);
        let _ = writeln!(output, "- Sales: {:.0}", stats.total_sales);
        if let (Some(first), Some(last)) = (stats.first_date, stats.last_date) {
            let _ = writeln!(output, "- Dates present: {} to {}", first, last);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Channels");

    if channels.is_empty() {
        let _ = writeln!(output, "No channel flows in this window.");
    } else {
        for summary in &channels {
            let _ = writeln!(
                output,
                "- {}: {:.2} across {} links",
                summary.channel, summary.total_value, summary.edge_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Sites");
    for summary in &sites {
        let _ = writeln!(
            output,
            "- {} ({}): exposure {:.0}, clicks {:.0}, sales {:.0}",
            summary.site,
            summary.site.label(),
            summary.exposure,
            summary.click,
            summary.sales
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "Channels configured: {}", registry.channels().len());
    let _ = writeln!(output, "Channels matched: {}", highlight.channels.len());

    output
}
