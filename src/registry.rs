//! Channel registry: which storefront each traffic channel belongs to, the
//! colour its flows are drawn in, and the names of its funnel-stage nodes.
//!
//! The registry is built once at start-up, either from the built-in table or
//! from a JSON file, and is read-only afterwards.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::FlowError;

/// RGBA colour as handed to the renderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Parses `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    pub fn to_css(self) -> String {
        if (self.a - 1.0).abs() < 0.001 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Shared by dimmed nodes and dimmed links.
pub const DIMMED_GRAY: Color = Color::rgba(200, 200, 200, 0.2);
/// CSS `lightgray`, used for the Total* nodes.
pub const TOTAL_NODE_GRAY: Color = Color::rgb(211, 211, 211);

/// Supported storefronts, in layout order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Site {
    #[serde(rename = "Amazon-US")]
    AmazonUs,
    #[serde(rename = "Amazon-JP")]
    AmazonJp,
    #[serde(rename = "Amazon-UK")]
    AmazonUk,
    Shopify,
}

impl Site {
    pub const ALL: [Site; 4] = [Site::AmazonUs, Site::AmazonJp, Site::AmazonUk, Site::Shopify];

    pub fn name(self) -> &'static str {
        match self {
            Site::AmazonUs => "Amazon-US",
            Site::AmazonJp => "Amazon-JP",
            Site::AmazonUk => "Amazon-UK",
            Site::Shopify => "Shopify",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Site::AmazonUs => "Amazon US Store",
            Site::AmazonJp => "Amazon Japan Store",
            Site::AmazonUk => "Amazon UK Store",
            Site::Shopify => "Shopify Storefront",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Site::AmazonUs => Color::rgb(0x87, 0xce, 0xeb),
            Site::AmazonJp => Color::rgb(0xff, 0x6b, 0x6b),
            Site::AmazonUk => Color::rgb(0x4e, 0xcd, 0xc4),
            Site::Shopify => Color::rgb(0xdd, 0xa0, 0xdd),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Site::ALL
            .into_iter()
            .find(|site| site.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| value.to_string())
    }
}

/// Funnel stages, in conversion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Exposure,
    Click,
    Sales,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Exposure, Stage::Click, Stage::Sales];

    pub fn keyword(self) -> &'static str {
        match self {
            Stage::Exposure => "exposure",
            Stage::Click => "click",
            Stage::Sales => "sales",
        }
    }

    pub fn total_node(self) -> &'static str {
        match self {
            Stage::Exposure => "TotalExposure",
            Stage::Click => "TotalClick",
            Stage::Sales => "TotalSales",
        }
    }

    pub fn is_total_node(node: &str) -> bool {
        Stage::ALL.iter().any(|stage| stage.total_node() == node)
    }

    /// Stage whose keyword appears in the node name. A name carrying none
    /// or several keywords has no stage.
    pub fn classify(node: &str) -> Option<Stage> {
        let lowered = node.to_lowercase();
        let mut hits = Stage::ALL
            .into_iter()
            .filter(|stage| lowered.contains(stage.keyword()));
        match (hits.next(), hits.next()) {
            (Some(stage), None) => Some(stage),
            _ => None,
        }
    }
}

/// Colour group of a channel (`G1`, `G2`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub u8);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G{}", self.0)
    }
}

impl Serialize for GroupId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// The six stage nodes a channel's flow passes through.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StageNodes {
    pub exposure: String,
    pub site_exposure: String,
    pub click: String,
    pub site_click: String,
    pub sales: String,
    pub site_sales: String,
}

#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub site: Site,
    /// 1-based position in declared order.
    pub ordinal: usize,
    pub group: GroupId,
    pub color: Color,
    pub nodes: StageNodes,
}

impl Channel {
    pub fn own_node(&self, stage: Stage) -> &str {
        match stage {
            Stage::Exposure => &self.nodes.exposure,
            Stage::Click => &self.nodes.click,
            Stage::Sales => &self.nodes.sales,
        }
    }

    pub fn site_node(&self, stage: Stage) -> &str {
        match stage {
            Stage::Exposure => &self.nodes.site_exposure,
            Stage::Click => &self.nodes.site_click,
            Stage::Sales => &self.nodes.site_sales,
        }
    }

    /// Channel node, the three own-stage nodes, then the three site nodes.
    pub fn node_names(&self) -> [&str; 7] {
        [
            self.name.as_str(),
            self.nodes.exposure.as_str(),
            self.nodes.click.as_str(),
            self.nodes.sales.as_str(),
            self.nodes.site_exposure.as_str(),
            self.nodes.site_click.as_str(),
            self.nodes.site_sales.as_str(),
        ]
    }
}

struct ChannelSpec {
    name: String,
    site: String,
    group: u8,
    color: Color,
    nodes: StageNodes,
}

#[derive(Deserialize)]
struct RegistryFile {
    channels: Vec<ChannelEntry>,
    #[serde(default)]
    ignored: Vec<String>,
}

#[derive(Deserialize)]
struct ChannelEntry {
    name: String,
    site: String,
    group: u8,
    color: String,
    nodes: StageNodes,
}

#[derive(Debug, Clone)]
pub struct ChannelRegistry {
    channels: Vec<Channel>,
    by_name: HashMap<String, usize>,
    node_owner: HashMap<String, usize>,
    orphaned: HashMap<String, String>,
    ignored: HashSet<String>,
}

impl ChannelRegistry {
    pub fn builtin() -> Self {
        let specs = vec![
            builtin_channel("Amazon Ads", Site::AmazonUs, 1, Color::rgb(0x92, 0x90, 0xe6), "Ads"),
            builtin_channel("Amazon-DSP", Site::AmazonUs, 2, Color::rgb(0x4e, 0xcd, 0xc4), "DSP"),
            builtin_channel(
                "Amazon Organic",
                Site::AmazonUs,
                3,
                Color::rgb(0x45, 0xb7, 0xd1),
                "Amazon Organic",
            ),
            builtin_channel("Amazon-FB", Site::AmazonUs, 4, Color::rgb(0x96, 0xce, 0xb4), "FB"),
            builtin_channel("SP-GG", Site::Shopify, 5, Color::rgb(0xff, 0xa7, 0x26), "SP-GG"),
            builtin_channel("SP-FB", Site::Shopify, 6, Color::rgb(0xab, 0x47, 0xbc), "SP-FB"),
            builtin_channel("SP-Organic", Site::Shopify, 7, Color::rgb(0x1c, 0x36, 0x3f), "SP-Organic"),
            builtin_channel("SP-Other", Site::Shopify, 8, Color::rgb(0xf0, 0x0b, 0x0b), "SP-Other"),
        ];
        let ignored = ["Amazon Page Total Clicks", "TotalExposure", "TotalClick", "TotalSales"]
            .into_iter()
            .map(String::from)
            .collect();
        Self::assemble(specs, ignored)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let file: RegistryFile = serde_json::from_str(text).context("invalid registry JSON")?;
        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(file.channels.len());

        for entry in file.channels {
            if !seen.insert(entry.name.clone()) {
                bail!("channel {} is declared twice", entry.name);
            }
            let color = Color::from_hex(&entry.color)
                .with_context(|| format!("channel {}: bad color {:?}", entry.name, entry.color))?;
            specs.push(ChannelSpec {
                name: entry.name,
                site: entry.site,
                group: entry.group,
                color,
                nodes: entry.nodes,
            });
        }

        Ok(Self::assemble(specs, file.ignored))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read registry {}", path.display()))?;
        Self::from_json(&text)
    }

    fn assemble(specs: Vec<ChannelSpec>, ignored: Vec<String>) -> Self {
        let mut channels = Vec::with_capacity(specs.len());
        let mut orphaned = HashMap::new();

        for spec in specs {
            match spec.site.parse::<Site>() {
                Ok(site) => channels.push(Channel {
                    name: spec.name,
                    site,
                    ordinal: channels.len() + 1,
                    group: GroupId(spec.group),
                    color: spec.color,
                    nodes: spec.nodes,
                }),
                Err(site) => {
                    orphaned.insert(spec.name, site);
                }
            }
        }

        let by_name = channels
            .iter()
            .enumerate()
            .map(|(idx, channel)| (channel.name.clone(), idx))
            .collect();

        let mut node_owner = HashMap::new();
        for (idx, channel) in channels.iter().enumerate() {
            for node in [
                channel.name.as_str(),
                channel.own_node(Stage::Exposure),
                channel.own_node(Stage::Click),
                channel.own_node(Stage::Sales),
            ] {
                node_owner.entry(node.to_string()).or_insert(idx);
            }
        }

        Self {
            channels,
            by_name,
            node_owner,
            orphaned,
            ignored: ignored.into_iter().collect(),
        }
    }

    /// Channels in declared order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channels_for(&self, site: Site) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(move |channel| channel.site == site)
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.by_name.get(name).map(|&idx| &self.channels[idx])
    }

    /// Resolves a row's channel, reporting why it cannot be used.
    pub fn resolve(&self, name: &str) -> Result<&Channel, FlowError> {
        if let Some(channel) = self.get(name) {
            return Ok(channel);
        }
        match self.orphaned.get(name) {
            Some(site) => Err(FlowError::UnregisteredSite {
                channel: name.to_string(),
                site: site.clone(),
            }),
            None => Err(FlowError::UnknownChannel(name.to_string())),
        }
    }

    /// Pre-aggregated summary rows that the source sheets mix in.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.ignored.contains(name)
    }

    /// Channel owning a channel node or own-stage node. Site and total nodes
    /// have no owner.
    pub fn owner_of_node(&self, node: &str) -> Option<&Channel> {
        self.node_owner.get(node).map(|&idx| &self.channels[idx])
    }

    /// The (source, target) pairs of every channel's three exposure hops.
    pub fn exposure_transitions(&self) -> HashSet<(&str, &str)> {
        let mut pairs = HashSet::new();
        for channel in &self.channels {
            let own = channel.own_node(Stage::Exposure);
            let site = channel.site_node(Stage::Exposure);
            pairs.insert((channel.name.as_str(), own));
            pairs.insert((own, site));
            pairs.insert((site, Stage::Exposure.total_node()));
        }
        pairs
    }
}

fn builtin_channel(name: &str, site: Site, group: u8, color: Color, prefix: &str) -> ChannelSpec {
    let site_name = site.name();
    ChannelSpec {
        name: name.to_string(),
        site: site_name.to_string(),
        group,
        color,
        nodes: StageNodes {
            exposure: format!("{prefix} Exposure"),
            site_exposure: format!("{site_name} Exposure"),
            click: format!("{prefix} Click"),
            site_click: format!("{site_name} Click"),
            sales: format!("{prefix} Sales"),
            site_sales: format!("{site_name} Sales"),
        },
    }
}
