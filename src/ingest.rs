use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::FlowError;
use crate::models::RawRecord;
use crate::normalize::{normalize_all, NormalizedBatch};
use crate::registry::ChannelRegistry;

#[derive(serde::Deserialize)]
struct CsvRow {
    channel: String,
    time: Option<String>,
    exposure: Option<String>,
    click: Option<String>,
    sales: Option<String>,
}

/// Result of reading one traffic table.
#[derive(Debug, Clone, Default)]
pub struct IngestedTable {
    pub rows_read: usize,
    pub batch: NormalizedBatch,
}

impl IngestedTable {
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.batch.records.iter().map(|r| r.date).min()?;
        let last = self.batch.records.iter().map(|r| r.date).max()?;
        Some((first, last))
    }
}

/// Parses CSV bytes into validated records, dropping rows that cannot be
/// decoded or whose timestamp cannot be read.
pub fn read_records(bytes: &[u8]) -> (Vec<RawRecord>, Vec<FlowError>) {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);
    let mut records = Vec::new();
    let mut dropped = Vec::new();

    for (idx, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                let err = FlowError::MalformedRow {
                    row: idx + 1,
                    reason: err.to_string(),
                };
                warn!(%err, "row dropped");
                dropped.push(err);
                continue;
            }
        };
        let raw_time = row.time.unwrap_or_default();
        let Some(date) = parse_date(&raw_time) else {
            let err = FlowError::InvalidDate {
                row: idx + 1,
                value: raw_time,
            };
            debug!(%err, "row dropped");
            dropped.push(err);
            continue;
        };

        records.push(RawRecord {
            channel: row.channel,
            date,
            exposure: parse_amount(row.exposure.as_deref()),
            click: parse_amount(row.click.as_deref()),
            sales: parse_amount(row.sales.as_deref()),
        });
    }

    (records, dropped)
}

/// Accepts `2026-01-05`, `2026/01/05`, and either with a time part after a
/// space or `T`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if matches!(value, "" | "nan" | "NaT") {
        return None;
    }
    let day = value.split([' ', 'T']).next()?.replace('/', "-");
    NaiveDate::parse_from_str(&day, "%Y-%m-%d").ok()
}

/// Missing, unparseable, non-finite and negative amounts count as zero.
pub fn parse_amount(value: Option<&str>) -> f64 {
    value
        .and_then(|text| text.trim().replace(',', "").parse::<f64>().ok())
        .filter(|amount| amount.is_finite() && *amount >= 0.0)
        .unwrap_or(0.0)
}

/// Memoizes ingest results by the SHA-256 of the file contents.
#[derive(Default)]
pub struct IngestCache {
    tables: HashMap<[u8; 32], IngestedTable>,
}

impl IngestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, registry: &ChannelRegistry, bytes: &[u8]) -> anyhow::Result<&IngestedTable> {
        let key: [u8; 32] = Sha256::digest(bytes).into();
        if !self.tables.contains_key(&key) {
            let table = ingest(registry, bytes)?;
            self.tables.insert(key, table);
        } else {
            debug!("reusing cached ingest result");
        }
        self.tables
            .get(&key)
            .context("ingest cache lost an entry it just stored")
    }

    pub fn load_file(&mut self, registry: &ChannelRegistry, path: &Path) -> anyhow::Result<&IngestedTable> {
        let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        self.load(registry, &bytes)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn ingest(registry: &ChannelRegistry, bytes: &[u8]) -> anyhow::Result<IngestedTable> {
    let (records, dropped) = read_records(bytes);
    let rows_read = records.len() + dropped.len();
    info!(rows = rows_read, "traffic table read");

    let mut batch = normalize_all(registry, records);
    batch.skipped.extend(dropped);
    info!(edges = batch.edges.len(), skipped = batch.skipped.len(), "links generated");

    let table = IngestedTable { rows_read, batch };
    if let Some((first, last)) = table.date_span() {
        info!(%first, %last, "date range detected");
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
channel,time,exposure,click,sales
Amazon Ads,2026-01-05 00:00:00,1200,80,6
SP-GG,2026/01/07,500,,2
SP-FB,,300,10,1
Billboard,2026-01-08,10,1,0
TotalExposure,2026-01-08,9999,0,0
SP-Organic,2026-01-19T08:30:00,n/a,12,1
";

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).expect("valid date")
    }

    #[test]
    fn parses_date_variants() {
        assert_eq!(parse_date("2026-01-05"), Some(day(5)));
        assert_eq!(parse_date("2026/01/05 13:00:00"), Some(day(5)));
        assert_eq!(parse_date("2026-01-05T13:00:00"), Some(day(5)));
        assert_eq!(parse_date("NaT"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn bad_amounts_become_zero() {
        assert_eq!(parse_amount(Some("1,250.5")), 1250.5);
        assert_eq!(parse_amount(Some("n/a")), 0.0);
        assert_eq!(parse_amount(Some("-3")), 0.0);
        assert_eq!(parse_amount(None), 0.0);
    }

    #[test]
    fn reads_rows_and_drops_bad_dates() {
        let (records, dropped) = read_records(SAMPLE.as_bytes());
        assert_eq!(records.len(), 5);
        assert_eq!(dropped.len(), 1);
        assert_eq!(records[1].channel, "SP-GG");
        assert_eq!(records[1].click, 0.0);
        assert_eq!(records[4].exposure, 0.0);
    }

    #[test]
    fn undecodable_row_does_not_discard_its_neighbours() {
        let mut bytes = b"channel,time,exposure,click,sales\nSP-GG,2026-01-05,100,10,1\nSP-FB,2026-01-06,".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(b",5,1\nSP-GG,2026-01-07,50,5,1\n");

        let (records, dropped) = read_records(&bytes);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].exposure, 100.0);
        assert_eq!(records[1].date, day(7));
        assert_eq!(dropped.len(), 1);
        assert!(matches!(dropped[0], FlowError::MalformedRow { row: 2, .. }));
    }

    #[test]
    fn ingest_normalizes_known_channels() {
        let registry = ChannelRegistry::builtin();
        let mut cache = IngestCache::new();
        let table = cache.load(&registry, SAMPLE.as_bytes()).expect("ingest succeeds");

        assert_eq!(table.rows_read, 6);
        assert_eq!(table.batch.records.len(), 3);
        assert_eq!(table.batch.edges.len(), 27);
        // Billboard (unknown) and SP-FB (no date)
        assert_eq!(table.batch.skipped.len(), 2);
        assert_eq!(table.date_span(), Some((day(5), day(19))));
    }

    #[test]
    fn cache_is_keyed_by_content() {
        let registry = ChannelRegistry::builtin();
        let mut cache = IngestCache::new();
        cache.load(&registry, SAMPLE.as_bytes()).expect("ingest succeeds");
        cache.load(&registry, SAMPLE.as_bytes()).expect("ingest succeeds");
        assert_eq!(cache.len(), 1);

        let other = "channel,time,exposure,click,sales\nSP-GG,2026-01-09,1,1,1\n";
        cache.load(&registry, other.as_bytes()).expect("ingest succeeds");
        assert_eq!(cache.len(), 2);
    }
}
