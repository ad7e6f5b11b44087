use indexmap::IndexSet;

use crate::registry::{ChannelRegistry, Site, Stage};

/// Deterministic node order for the diagram.
///
/// For each stage, every site contributes its nodes in turn (channel nodes
/// first for exposure, then own-stage nodes in declared channel order, then
/// the site node), and the stage's total node closes the column. Site nodes
/// shared between channels are kept at their first occurrence.
pub fn plan_order(registry: &ChannelRegistry, sites: &[Site]) -> IndexSet<String> {
    let mut order = IndexSet::new();

    for stage in Stage::ALL {
        for &site in sites {
            let mut channels: Vec<_> = registry.channels_for(site).collect();
            channels.sort_by_key(|channel| channel.ordinal);

            if stage == Stage::Exposure {
                for channel in &channels {
                    order.insert(channel.name.clone());
                }
            }
            for channel in &channels {
                order.insert(channel.own_node(stage).to_string());
            }
            for channel in &channels {
                order.insert(channel.site_node(stage).to_string());
            }
        }
        order.insert(stage.total_node().to_string());
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn orders_by_stage_then_site() {
        let registry = ChannelRegistry::builtin();
        let order = plan_order(&registry, &Site::ALL);
        let names: Vec<&str> = order.iter().map(String::as_str).collect();

        assert_eq!(
            &names[..15],
            &[
                "Amazon Ads",
                "Amazon-DSP",
                "Amazon Organic",
                "Amazon-FB",
                "Ads Exposure",
                "DSP Exposure",
                "Amazon Organic Exposure",
                "FB Exposure",
                "Amazon-US Exposure",
                "SP-GG",
                "SP-FB",
                "SP-Organic",
                "SP-Other",
                "SP-GG Exposure",
                "SP-FB Exposure",
            ]
        );
        assert_eq!(names[17], "Shopify Exposure");
        assert_eq!(names[18], "TotalExposure");
        assert_eq!(names[19], "Ads Click");
        assert_eq!(names.last(), Some(&"TotalSales"));
        // 8 channels + 3 stages * (8 own + 2 site + 1 total)
        assert_eq!(names.len(), 8 + 3 * 11);
    }

    #[test]
    fn names_are_unique_and_stable() {
        let registry = ChannelRegistry::builtin();
        let first = plan_order(&registry, &Site::ALL);
        let second = plan_order(&registry, &Site::ALL);

        let unique: HashSet<&String> = first.iter().collect();
        assert_eq!(unique.len(), first.len());
        assert!(first.iter().eq(second.iter()));
    }

    #[test]
    fn site_order_drives_layout() {
        let registry = ChannelRegistry::builtin();
        let order = plan_order(&registry, &[Site::Shopify, Site::AmazonUs]);
        assert_eq!(order.get_index(0).map(String::as_str), Some("SP-GG"));
        let shopify = order.get_index_of("Shopify Click");
        let amazon = order.get_index_of("Amazon-US Click");
        assert!(shopify < amazon);
    }
}
