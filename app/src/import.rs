// In app/src/import.rs

use std::io::Read;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use core_types::{PriceBar, Ticker};
use rust_decimal::Decimal;
use serde::Deserialize;

/// One row of a daily price file: `date,ticker,open,high,low,close,volume`.
#[derive(Debug, Deserialize)]
struct BarRecord {
    date: String,
    ticker: String,
    open: String,
    high: String,
    low: String,
    close: String,
    #[serde(default)]
    volume: Option<String>,
}

fn decimal(field: &str, value: &str, line: usize) -> Result<Decimal> {
    Decimal::from_str(value.trim()).with_context(|| format!("line {line}: invalid {field} '{value}'"))
}

/// Parses daily bars from CSV with a header row. An empty volume is kept as missing.
pub fn read_price_bars<R: Read>(reader: R) -> Result<Vec<PriceBar>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut bars = Vec::new();
    for (idx, result) in reader.deserialize::<BarRecord>().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let record = result.with_context(|| format!("line {line}: malformed row"))?;
        let date = NaiveDate::parse_from_str(record.date.trim(), "%Y-%m-%d")
            .with_context(|| format!("line {line}: invalid date '{}'", record.date))?;
        let volume = match record.volume.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(v) => Some(decimal("volume", v, line)?),
        };
        bars.push(PriceBar {
            date,
            ticker: Ticker::new(record.ticker.trim()),
            open: decimal("open", &record.open, line)?,
            high: decimal("high", &record.high, line)?,
            low: decimal("low", &record.low, line)?,
            close: decimal("close", &record.close, line)?,
            volume,
        });
    }
    Ok(bars)
}
