use std::collections::HashSet;

use indexmap::IndexSet;

use crate::registry::{ChannelRegistry, Site};

/// Channels and nodes selected by a search keyword.
#[derive(Debug, Clone, Default)]
pub struct Highlight {
    pub channels: IndexSet<String>,
    pub nodes: HashSet<String>,
}

impl Highlight {
    pub fn matches_channel(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    pub fn matches_node(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }
}

/// Resolves a keyword against site names first and channel names second.
///
/// An empty keyword matches everything. A keyword hitting any site name or
/// label selects exactly that site's channels and never falls back to
/// channel-name matching.
pub fn resolve(keyword: &str, registry: &ChannelRegistry) -> Highlight {
    let keyword = keyword.trim().to_lowercase();

    let channels: IndexSet<String> = if keyword.is_empty() {
        registry.channels().iter().map(|c| c.name.clone()).collect()
    } else {
        let sites: Vec<Site> = Site::ALL
            .into_iter()
            .filter(|site| {
                site.name().to_lowercase().contains(&keyword)
                    || site.label().to_lowercase().contains(&keyword)
            })
            .collect();

        if sites.is_empty() {
            registry
                .channels()
                .iter()
                .filter(|c| c.name.to_lowercase().contains(&keyword))
                .map(|c| c.name.clone())
                .collect()
        } else {
            registry
                .channels()
                .iter()
                .filter(|c| sites.contains(&c.site))
                .map(|c| c.name.clone())
                .collect()
        }
    };

    let nodes = channels
        .iter()
        .filter_map(|name| registry.get(name))
        .flat_map(|channel| channel.node_names().map(String::from))
        .collect();

    Highlight { channels, nodes }
}
