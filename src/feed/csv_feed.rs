//! CSV bar files
//!
//! One file per instrument, `<dir>/<instrument>.csv`, with a header row and
//! columns `time,open,high,low,close,volume`. Time is RFC 3339. Files are
//! re-read on every call so an external candle updater can append to them.

use super::{Bar, FeedError, InstrumentMeta, MarketDataSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Market data source backed by a directory of CSV files
pub struct CsvFeed {
    dir: PathBuf,
    category: String,
}

impl CsvFeed {
    /// Create a feed over `dir`; every instrument gets commission `category`
    pub fn new(dir: impl Into<PathBuf>, category: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            category: category.into(),
        }
    }

    fn path_for(&self, instrument: &str) -> PathBuf {
        self.dir.join(format!("{instrument}.csv"))
    }

    /// Load every bar of an instrument, sorted by time with duplicates dropped
    pub fn load(&self, instrument: &str) -> Result<Vec<Bar>, FeedError> {
        let path = self.path_for(instrument);
        if !path.exists() {
            return Err(FeedError::UnknownInstrument(instrument.to_string()));
        }
        let mut bars = read_bars(&path)?;
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Ok(bars)
    }

    /// Instrument ids, one per CSV file, sorted
    pub fn instrument_ids(&self) -> Result<Vec<String>, FeedError> {
        let mut ids = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn read_bars(path: &Path) -> Result<Vec<Bar>, FeedError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut bars = Vec::new();

    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let field = |idx: usize, name: &'static str| -> Result<&str, FeedError> {
            record.get(idx).map(str::trim).ok_or(FeedError::InvalidField {
                line,
                field: name,
                value: String::new(),
            })
        };
        let decimal = |idx: usize, name: &'static str| -> Result<Decimal, FeedError> {
            let raw = field(idx, name)?;
            Decimal::from_str(raw)
                .or_else(|_| Decimal::from_scientific(raw))
                .map_err(|_| FeedError::InvalidField {
                    line,
                    field: name,
                    value: raw.to_string(),
                })
        };

        let raw_time = field(0, "time")?;
        let timestamp = DateTime::parse_from_rfc3339(raw_time)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| FeedError::InvalidField {
                line,
                field: "time",
                value: raw_time.to_string(),
            })?;

        bars.push(Bar {
            timestamp,
            open: decimal(1, "open")?,
            high: decimal(2, "high")?,
            low: decimal(3, "low")?,
            close: decimal(4, "close")?,
            volume: decimal(5, "volume")?,
        });
    }

    Ok(bars)
}

#[async_trait]
impl MarketDataSource for CsvFeed {
    async fn instruments(&self) -> anyhow::Result<Vec<InstrumentMeta>> {
        Ok(self
            .instrument_ids()?
            .into_iter()
            .map(|id| InstrumentMeta::new(id, self.category.clone()))
            .collect())
    }

    async fn bars(
        &self,
        instrument: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Bar>> {
        let bars = self.load(instrument)?;
        Ok(bars
            .into_iter()
            .filter(|b| b.timestamp >= from && b.timestamp <= to)
            .collect())
    }

    async fn last_price(&self, instrument: &str) -> anyhow::Result<Decimal> {
        let bars = self.load(instrument)?;
        bars.last()
            .map(|b| b.close)
            .ok_or_else(|| anyhow::anyhow!("no bars for {instrument}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_csv(dir: &Path, name: &str, body: &str) {
        let mut file = std::fs::File::create(dir.join(name)).unwrap();
        file.write_all(body.as_bytes()).unwrap();
    }

    const HEADER: &str = "time,open,high,low,close,volume\n";

    #[test]
    fn test_load_sorts_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{HEADER}\
             2024-01-01T02:00:00Z,11,12,10,11.5,300\n\
             2024-01-01T01:00:00Z,10,11,9,10.5,200\n\
             2024-01-01T01:00:00Z,10,11,9,10.5,200\n"
        );
        write_csv(dir.path(), "SBER.csv", &body);

        let feed = CsvFeed::new(dir.path(), "stocks");
        let bars = feed.load("SBER").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(10.5));
        assert_eq!(bars[1].close, dec!(11.5));
        assert_eq!(bars[1].volume, dec!(300));
    }

    #[test]
    fn test_invalid_field_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("{HEADER}2024-01-01T01:00:00Z,10,11,9,oops,200\n");
        write_csv(dir.path(), "GAZP.csv", &body);

        let feed = CsvFeed::new(dir.path(), "stocks");
        let err = feed.load("GAZP").unwrap_err();
        assert!(matches!(
            err,
            FeedError::InvalidField { field: "close", line: 2, .. }
        ));
    }

    #[test]
    fn test_unknown_instrument() {
        let dir = tempfile::tempdir().unwrap();
        let feed = CsvFeed::new(dir.path(), "stocks");
        assert!(matches!(
            feed.load("NOPE"),
            Err(FeedError::UnknownInstrument(_))
        ));
    }

    #[tokio::test]
    async fn test_instruments_from_file_names() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "LKOH.csv", HEADER);
        write_csv(dir.path(), "AFLT.csv", HEADER);
        write_csv(dir.path(), "notes.txt", "ignore me");

        let feed = CsvFeed::new(dir.path(), "stocks");
        let instruments = feed.instruments().await.unwrap();
        let ids: Vec<&str> = instruments.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["AFLT", "LKOH"]);
        assert!(instruments.iter().all(|m| m.category == "stocks"));
    }

    #[tokio::test]
    async fn test_bars_time_range_and_last_price() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!(
            "{HEADER}\
             2024-01-01T00:00:00Z,10,10,10,10,1\n\
             2024-01-01T01:00:00Z,11,11,11,11,1\n\
             2024-01-01T02:00:00Z,12,12,12,12,1\n"
        );
        write_csv(dir.path(), "MOEX.csv", &body);
        let feed = CsvFeed::new(dir.path(), "stocks");

        let from = Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 1, 2, 0, 0).unwrap();
        let bars = feed.bars("MOEX", from, to).await.unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, dec!(11));

        assert_eq!(feed.last_price("MOEX").await.unwrap(), dec!(12));
    }
}
