//! Transaction records and CSV ingestion.
//!
//! Columns are resolved by header name, so column order is free.
//! Required columns are checked once up front; a missing one fails
//! the whole load before any row is parsed.

use crate::{
    config::ScoringConfig,
    error::{RiskError, ScorerResult},
    types::{Mcc, MerchantId},
};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

pub const REQUIRED_COLUMNS: [&str; 10] = [
    "transaction_id",
    "timestamp",
    "merchant_id",
    "mcc",
    "amount",
    "is_3d_secure",
    "is_chargeback",
    "is_refund",
    "card_country",
    "ip_address",
];

/// Country code assigned to IPs outside the local prefix when the input
/// has no `ip_country` column.
const UNKNOWN_FOREIGN_COUNTRY: &str = "ZZ";

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// One card-payment transaction. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub timestamp: NaiveDateTime,
    pub merchant_id: MerchantId,
    pub mcc: Mcc,
    pub amount: f64,
    pub is_3d_secure: bool,
    pub is_chargeback: bool,
    pub is_refund: bool,
    pub card_country: String,
    pub ip_address: String,
    pub ip_country: String,
    pub device_id: Option<String>,
    /// Declined or failed authorisation.
    pub is_failed: bool,
    /// Mail-order / telephone-order entry.
    pub is_moto: bool,
}

/// Load transactions from a CSV file.
pub fn load_transactions(path: impl AsRef<Path>, config: &ScoringConfig) -> ScorerResult<Vec<Transaction>> {
    let path = path.as_ref();
    let file = File::open(path)
        .map_err(|e| anyhow::anyhow!("Cannot open {}: {e}", path.display()))?;
    let txns = read_transactions(file, config)?;
    log::info!("ingest: loaded {} transactions from {}", txns.len(), path.display());
    Ok(txns)
}

/// Parse transactions from any CSV source.
pub fn read_transactions<R: Read>(source: R, config: &ScoringConfig) -> ScorerResult<Vec<Transaction>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);

    let headers = reader.headers()?.clone();
    let index: HashMap<&str, usize> = headers.iter().enumerate().map(|(i, h)| (h, i)).collect();

    for column in REQUIRED_COLUMNS {
        if !index.contains_key(column) {
            return Err(RiskError::MissingColumn {
                column: column.to_string(),
            });
        }
    }

    let mut txns = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // Header is line 1.
        let row = RowReader {
            record: &record,
            index: &index,
            row: i + 2,
        };

        let ip_address = row.text("ip_address")?;
        let ip_country = match row.optional("ip_country") {
            Some(country) => country.to_string(),
            None if ip_address.starts_with(config.local_ip_prefix.as_str()) => {
                config.home_country.clone()
            }
            None => UNKNOWN_FOREIGN_COUNTRY.to_string(),
        };

        txns.push(Transaction {
            transaction_id: row.text("transaction_id")?,
            timestamp: row.timestamp("timestamp")?,
            merchant_id: row.text("merchant_id")?,
            mcc: row.text("mcc")?,
            amount: row.number("amount")?,
            is_3d_secure: row.flag("is_3d_secure")?,
            is_chargeback: row.flag("is_chargeback")?,
            is_refund: row.flag("is_refund")?,
            card_country: row.text("card_country")?,
            ip_address,
            ip_country,
            device_id: row.optional("device_id").map(str::to_string),
            is_failed: row.optional_flag("is_failed")?,
            is_moto: row.optional_flag("is_moto")?,
        });
    }

    Ok(txns)
}

/// Column order produced by [`write_transactions`].
pub const WRITTEN_COLUMNS: [&str; 14] = [
    "transaction_id",
    "timestamp",
    "merchant_id",
    "mcc",
    "amount",
    "is_3d_secure",
    "is_chargeback",
    "is_refund",
    "card_country",
    "ip_address",
    "ip_country",
    "device_id",
    "is_failed",
    "is_moto",
];

/// Write transactions as CSV. The header row is written even when
/// `txns` is empty.
pub fn write_transactions<W: Write>(txns: &[Transaction], sink: W) -> ScorerResult<()> {
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(sink);
    writer.write_record(WRITTEN_COLUMNS)?;
    for txn in txns {
        writer.serialize(txn)?;
    }
    writer.flush()?;
    Ok(())
}

struct RowReader<'a> {
    record: &'a csv::StringRecord,
    index: &'a HashMap<&'a str, usize>,
    row: usize,
}

impl RowReader<'_> {
    fn raw(&self, column: &str) -> &str {
        self.index
            .get(column)
            .and_then(|&i| self.record.get(i))
            .unwrap_or("")
    }

    fn invalid(&self, column: &str) -> RiskError {
        RiskError::InvalidField {
            row: self.row,
            column: column.to_string(),
            value: self.raw(column).to_string(),
        }
    }

    fn text(&self, column: &str) -> ScorerResult<String> {
        let value = self.raw(column);
        if value.is_empty() {
            return Err(self.invalid(column));
        }
        Ok(value.to_string())
    }

    fn optional(&self, column: &str) -> Option<&str> {
        Some(self.raw(column)).filter(|v| !v.is_empty())
    }

    fn number(&self, column: &str) -> ScorerResult<f64> {
        self.raw(column)
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| self.invalid(column))
    }

    fn flag(&self, column: &str) -> ScorerResult<bool> {
        parse_flag(self.raw(column)).ok_or_else(|| self.invalid(column))
    }

    fn optional_flag(&self, column: &str) -> ScorerResult<bool> {
        match self.optional(column) {
            Some(value) => parse_flag(value).ok_or_else(|| self.invalid(column)),
            None => Ok(false),
        }
    }

    fn timestamp(&self, column: &str) -> ScorerResult<NaiveDateTime> {
        parse_timestamp(self.raw(column)).ok_or_else(|| self.invalid(column))
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "yes" => Some(true),
        "0" | "0.0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.naive_utc()))
}
