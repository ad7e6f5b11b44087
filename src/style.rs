//! Link widths, colours and percentage annotations.
//!
//! Everything here is a pure function of the aggregated edges and the
//! current parameters; nothing is carried between calls.

use indexmap::IndexSet;
use tracing::warn;

use crate::aggregate::{inflow_by_target, outflow_by_source};
use crate::error::FlowError;
use crate::highlight::Highlight;
use crate::models::{AggregatedEdge, LinkMeta, NodeMeta, RenderLink};
use crate::registry::{ChannelRegistry, Color, Site, Stage, DIMMED_GRAY, TOTAL_NODE_GRAY};

/// Width multiplier for flows of channels the keyword did not select.
pub const DIM_FACTOR: f64 = 0.05;

pub const EXPOSURE_SCALE_RANGE: (f64, f64) = (0.01, 10.0);
pub const LATER_SCALE_RANGE: (f64, f64) = (0.01, 50.0);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scales {
    pub exposure: f64,
    pub later: f64,
}

impl Scales {
    pub fn new(exposure: f64, later: f64) -> Result<Self, FlowError> {
        check_scale("exposure", exposure, EXPOSURE_SCALE_RANGE)?;
        check_scale("later", later, LATER_SCALE_RANGE)?;
        Ok(Self { exposure, later })
    }
}

impl Default for Scales {
    fn default() -> Self {
        Self {
            exposure: 0.5,
            later: 5.0,
        }
    }
}

fn check_scale(name: &'static str, value: f64, (min, max): (f64, f64)) -> Result<(), FlowError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(FlowError::InvalidScale {
            name,
            value,
            min,
            max,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Styled {
    pub links: Vec<RenderLink>,
    pub node_colors: Vec<Color>,
    pub node_meta: Vec<NodeMeta>,
}

pub fn style(
    registry: &ChannelRegistry,
    edges: &[AggregatedEdge],
    highlight: &Highlight,
    order: &IndexSet<String>,
    scales: Scales,
) -> Styled {
    let inflow = inflow_by_target(edges);
    let outflow = outflow_by_source(edges);
    let exposure_hops = registry.exposure_transitions();

    let mut links = Vec::with_capacity(edges.len());
    for edge in edges {
        let (Some(source), Some(target)) = (
            order.get_index_of(edge.source.as_str()),
            order.get_index_of(edge.target.as_str()),
        ) else {
            warn!(source = %edge.source, target = %edge.target, "edge outside node layout, skipped");
            continue;
        };

        let matched = highlight.matches_channel(&edge.channel);
        let scale = if exposure_hops.contains(&(edge.source.as_str(), edge.target.as_str())) {
            scales.exposure
        } else {
            scales.later
        };
        let mut value = edge.value * scale;
        if !matched {
            value *= DIM_FACTOR;
        }

        let color = match registry.get(&edge.channel) {
            Some(channel) if matched => channel.color,
            _ => DIMMED_GRAY,
        };

        // Zero inflow falls back to a denominator of 1 rather than failing.
        let target_total = inflow
            .get(edge.target.as_str())
            .copied()
            .filter(|total| *total != 0.0)
            .unwrap_or(1.0);

        links.push(RenderLink {
            source,
            target,
            value,
            color,
            meta: LinkMeta {
                source: edge.source.clone(),
                target: edge.target.clone(),
                original_value: edge.value,
                ratio: round2(edge.value / target_total * 100.0),
            },
        });
    }

    let node_colors = order
        .iter()
        .map(|node| node_color(registry, highlight, node))
        .collect();

    let node_meta = order
        .iter()
        .map(|node| {
            let node_out = outflow.get(node.as_str()).copied().unwrap_or(0.0);
            NodeMeta {
                inflow: inflow.get(node.as_str()).copied().unwrap_or(0.0),
                outflow: node_out,
                share: node_share(node, node_out, |total| {
                    inflow.get(total).copied().unwrap_or(0.0)
                }),
            }
        })
        .collect();

    Styled {
        links,
        node_colors,
        node_meta,
    }
}

fn node_color(registry: &ChannelRegistry, highlight: &Highlight, node: &str) -> Color {
    if !highlight.matches_node(node) {
        return DIMMED_GRAY;
    }
    if let Some(channel) = registry.owner_of_node(node) {
        return channel.color;
    }
    Site::ALL
        .into_iter()
        .find(|site| node.contains(site.name()))
        .map(Site::color)
        .unwrap_or(TOTAL_NODE_GRAY)
}

fn node_share(node: &str, outflow: f64, stage_total: impl Fn(&str) -> f64) -> String {
    if Stage::is_total_node(node) {
        return String::new();
    }
    let Some(stage) = Stage::classify(node) else {
        return String::new();
    };
    let total = stage_total(stage.total_node());
    if total > 0.0 {
        // `{:?}` keeps the trailing `.0` on whole percentages.
        format!("Share of {}: {:?}%", stage.total_node(), round2(outflow / total * 100.0))
    } else {
        String::new()
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::aggregate::aggregate;
    use crate::highlight::resolve;
    use crate::layout::plan_order;
    use crate::models::{DateRange, RawRecord};
    use crate::normalize::normalize_all;
    use crate::registry::GroupId;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 10).expect("valid date")
    }

    fn record(channel: &str, exposure: f64, click: f64, sales: f64) -> RawRecord {
        RawRecord {
            channel: channel.to_string(),
            date: day(),
            exposure,
            click,
            sales,
        }
    }

    fn styled(records: Vec<RawRecord>, keyword: &str, scales: Scales) -> (IndexSet<String>, Styled) {
        let registry = ChannelRegistry::builtin();
        let batch = normalize_all(&registry, records);
        let edges = aggregate(&batch.edges, DateRange::new(day(), day()));
        let order = plan_order(&registry, &Site::ALL);
        let highlight = resolve(keyword, &registry);
        let styled = style(&registry, &edges, &highlight, &order, scales);
        (order, styled)
    }

    fn link<'a>(order: &IndexSet<String>, styled: &'a Styled, source: &str, target: &str) -> &'a RenderLink {
        let source = order.get_index_of(source).expect("source in layout");
        let target = order.get_index_of(target).expect("target in layout");
        styled
            .links
            .iter()
            .find(|l| l.source == source && l.target == target)
            .expect("link present")
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn unmatched_click_link_is_dimmed() {
        let scales = Scales::new(0.5, 5.0).expect("valid scales");
        let (order, styled) = styled(
            vec![record("Amazon Ads", 100.0, 10.0, 0.0), record("SP-GG", 50.0, 4.0, 0.0)],
            "Shopify",
            scales,
        );

        let amazon = link(&order, &styled, "TotalExposure", "Ads Click");
        assert!(close(amazon.value, 2.5));
        assert_eq!(amazon.color, DIMMED_GRAY);
        assert!(close(amazon.meta.original_value, 10.0));

        let shopify = link(&order, &styled, "TotalExposure", "SP-GG Click");
        assert!(close(shopify.value, 20.0));
        assert_eq!(shopify.color.to_css(), "#ffa726");
    }

    #[test]
    fn exposure_hops_use_the_exposure_scale() {
        let (order, styled) = styled(vec![record("SP-FB", 100.0, 10.0, 1.0)], "", Scales::default());
        for (source, target) in [
            ("SP-FB", "SP-FB Exposure"),
            ("SP-FB Exposure", "Shopify Exposure"),
            ("Shopify Exposure", "TotalExposure"),
        ] {
            assert!(close(link(&order, &styled, source, target).value, 50.0));
        }
        assert!(close(link(&order, &styled, "SP-FB Click", "Shopify Click").value, 50.0));
        assert!(close(link(&order, &styled, "TotalClick", "SP-FB Sales").value, 5.0));
    }

    #[test]
    fn link_ratio_is_share_of_target_inflow() {
        let (order, styled) = styled(
            vec![record("SP-GG", 300.0, 0.0, 0.0), record("SP-FB", 100.0, 0.0, 0.0)],
            "",
            Scales::default(),
        );
        let gg = link(&order, &styled, "Shopify Exposure", "TotalExposure");
        let ratios: Vec<f64> = styled
            .links
            .iter()
            .filter(|l| l.target == gg.target)
            .map(|l| l.meta.ratio)
            .collect();
        assert_eq!(ratios.len(), 2);
        assert!(ratios.contains(&75.0));
        assert!(ratios.contains(&25.0));
    }

    #[test]
    fn zero_inflow_target_uses_unit_denominator() {
        let registry = ChannelRegistry::builtin();
        let order = plan_order(&registry, &Site::ALL);
        let highlight = resolve("", &registry);
        // Hand-built edge whose value cancels the target's inflow to zero.
        let edges = vec![
            AggregatedEdge {
                source: "SP-GG".to_string(),
                target: "SP-GG Exposure".to_string(),
                group: GroupId(5),
                channel: "SP-GG".to_string(),
                value: 0.3,
            },
            AggregatedEdge {
                source: "SP-GG".to_string(),
                target: "SP-GG Exposure".to_string(),
                group: GroupId(5),
                channel: "SP-FB".to_string(),
                value: -0.3,
            },
        ];
        let styled = style(&registry, &edges, &highlight, &order, Scales::default());
        assert!(close(styled.links[0].meta.ratio, 30.0));
    }

    #[test]
    fn node_colors_follow_highlight() {
        let (order, styled) = styled(vec![record("Amazon-DSP", 10.0, 1.0, 1.0)], "dsp", Scales::default());
        let color_of = |node: &str| styled.node_colors[order.get_index_of(node).expect("node in layout")];

        assert_eq!(color_of("Amazon-DSP").to_css(), "#4ecdc4");
        assert_eq!(color_of("DSP Click").to_css(), "#4ecdc4");
        assert_eq!(color_of("Amazon-US Click"), Site::AmazonUs.color());
        assert_eq!(color_of("SP-GG"), DIMMED_GRAY);
        assert_eq!(color_of("Shopify Sales"), DIMMED_GRAY);
        assert_eq!(color_of("TotalClick"), DIMMED_GRAY);
    }

    #[test]
    fn node_share_against_stage_total() {
        let (order, styled) = styled(
            vec![record("SP-GG", 300.0, 30.0, 0.0), record("Amazon Ads", 100.0, 10.0, 0.0)],
            "",
            Scales::default(),
        );
        let meta_of = |node: &str| &styled.node_meta[order.get_index_of(node).expect("node in layout")];

        assert_eq!(meta_of("SP-GG Exposure").share, "Share of TotalExposure: 75.0%");
        assert_eq!(meta_of("Amazon-US Click").share, "Share of TotalClick: 25.0%");
        assert_eq!(meta_of("TotalExposure").share, "");
        assert_eq!(meta_of("SP-GG").share, "");
        // no sales anywhere in the window
        assert_eq!(meta_of("SP-GG Sales").share, "");
        assert!(close(meta_of("TotalExposure").inflow, 400.0));
        assert!(close(meta_of("TotalExposure").outflow, 40.0));
    }

    #[test]
    fn scales_outside_bounds_are_rejected() {
        assert!(Scales::new(0.0, 5.0).is_err());
        assert!(Scales::new(0.5, 51.0).is_err());
        assert!(Scales::new(f64::NAN, 5.0).is_err());
        assert_eq!(Scales::new(0.5, 5.0), Ok(Scales::default()));
    }

    #[test]
    fn rounds_to_two_places() {
        assert_eq!(round2(33.33333), 33.33);
        assert_eq!(round2(66.666), 66.67);
    }
}
