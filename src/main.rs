use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use traffic_flow::diagram::build_diagram;
use traffic_flow::error::FlowError;
use traffic_flow::highlight;
use traffic_flow::ingest::{IngestCache, IngestedTable};
use traffic_flow::layout::plan_order;
use traffic_flow::models::DateRange;
use traffic_flow::registry::{ChannelRegistry, Site};
use traffic_flow::report;
use traffic_flow::style::Scales;

const REGISTRY_ENV: &str = "FLOW_REGISTRY";

#[derive(Parser)]
#[command(name = "traffic-flow")]
#[command(about = "Multi-site traffic to sales flow diagrams", long_about = None)]
struct Cli {
    /// JSON channel registry replacing the built-in one
    #[arg(long, global = true)]
    registry: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct Window {
    #[arg(long)]
    input: PathBuf,
    /// First day to include (defaults to the earliest date in the file)
    #[arg(long)]
    start: Option<NaiveDate>,
    /// Last day to include (defaults to the latest date in the file)
    #[arg(long)]
    end: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write diagram-ready node and link arrays as JSON
    Render {
        #[command(flatten)]
        window: Window,
        /// Site or channel keyword to highlight; repeat for several diagrams
        #[arg(long)]
        keyword: Vec<String>,
        #[arg(long, default_value_t = 0.5)]
        exposure_scale: f64,
        #[arg(long, default_value_t = 5.0)]
        later_scale: f64,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown summary report
    Summary {
        #[command(flatten)]
        window: Window,
        #[arg(long, default_value = "")]
        keyword: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// List configured channels in layout order
    Channels,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = load_registry(cli.registry)?;
    let mut cache = IngestCache::new();

    match cli.command {
        Commands::Render {
            window,
            keyword,
            exposure_scale,
            later_scale,
            out,
        } => {
            let scales = Scales::new(exposure_scale, later_scale)?;
            let table = cache.load_file(&registry, &window.input)?;
            let range = resolve_range(&window, table);
            let keywords = if keyword.is_empty() {
                vec![String::new()]
            } else {
                keyword
            };

            let mut diagrams = Vec::with_capacity(keywords.len());
            for keyword in &keywords {
                match build_diagram(&registry, &table.batch.edges, range, keyword, scales) {
                    Ok(diagram) => diagrams.push(diagram),
                    Err(err @ FlowError::EmptyResult { .. }) => {
                        println!("{err}: adjust the date range or use a different file.");
                        return Ok(());
                    }
                    Err(err) => return Err(err.into()),
                }
            }

            let json = if diagrams.len() == 1 {
                serde_json::to_string_pretty(&diagrams[0])
            } else {
                serde_json::to_string_pretty(&diagrams)
            }
            .context("failed to serialize diagram")?;

            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Diagram written to {}.", path.display());
                }
                None => println!("{json}"),
            }
        }
        Commands::Summary {
            window,
            keyword,
            out,
        } => {
            let table = cache.load_file(&registry, &window.input)?;
            let range = resolve_range(&window, table);
            let highlight = highlight::resolve(&keyword, &registry);
            let report = report::build_report(
                &registry,
                &table.batch.records,
                &table.batch.edges,
                range,
                &keyword,
                &highlight,
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Channels => {
            for channel in registry.channels() {
                println!(
                    "{}. {} [{}] site {} color {}",
                    channel.ordinal, channel.name, channel.group, channel.site, channel.color
                );
            }
            let nodes = plan_order(&registry, &Site::ALL);
            println!("{} nodes in layout.", nodes.len());
        }
    }

    Ok(())
}

fn load_registry(flag: Option<PathBuf>) -> anyhow::Result<ChannelRegistry> {
    let path = flag.or_else(|| std::env::var_os(REGISTRY_ENV).map(PathBuf::from));
    match path {
        Some(path) => {
            let registry = ChannelRegistry::load(&path)?;
            info!(path = %path.display(), channels = registry.channels().len(), "registry loaded");
            Ok(registry)
        }
        None => Ok(ChannelRegistry::builtin()),
    }
}

fn resolve_range(window: &Window, table: &IngestedTable) -> DateRange {
    let (first, last) = table.date_span().unwrap_or_else(|| {
        warn!("no dated rows found, using fallback window");
        (fallback_day(5), fallback_day(19))
    });
    DateRange::new(window.start.unwrap_or(first), window.end.unwrap_or(last))
}

fn fallback_day(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, day).unwrap_or_default()
}
