//! CSV export of high-risk merchants.

use crate::{error::ScorerResult, scorer::RiskReport};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    merchant_id: &'a str,
    risk_score: u32,
    risk_reasons: String,
    total_amount: f64,
    failure_rate: f64,
}

/// Write every merchant scoring at least `min_score` (floored at 1) in
/// report order. Returns the number of rows written.
pub fn export_high_risk<W: Write>(report: &RiskReport, min_score: u32, sink: W) -> ScorerResult<usize> {
    let min_score = min_score.max(1);
    // Header written by hand so an empty export still carries it.
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(sink);
    writer.write_record(["merchant_id", "risk_score", "risk_reasons", "total_amount", "failure_rate"])?;

    let mut written = 0;
    for m in report.merchants.iter().filter(|m| m.result.score >= min_score) {
        writer.serialize(ExportRow {
            merchant_id: &m.aggregate.merchant_id,
            risk_score: m.result.score,
            risk_reasons: m.result.reasons_joined(),
            total_amount: m.aggregate.total_amount,
            failure_rate: m.aggregate.failure_rate,
        })?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

pub fn export_high_risk_to_file(report: &RiskReport, min_score: u32, path: impl AsRef<Path>) -> ScorerResult<usize> {
    let path = path.as_ref();
    let file = File::create(path)
        .map_err(|e| anyhow::anyhow!("Cannot create {}: {e}", path.display()))?;
    let written = export_high_risk(report, min_score, file)?;
    log::info!("export: {written} merchants written to {}", path.display());
    Ok(written)
}
