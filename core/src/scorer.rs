//! The merchant risk scorer: benchmarks → aggregates → rules → report.
//!
//! Every call to `score` is a full batch recomputation. Nothing is
//! cached between calls, so a parameter change is applied by scoring
//! again with the updated config.

use crate::{
    aggregate::{aggregate_merchants, ranked_counts, MerchantAggregate},
    benchmark::{compute_benchmarks, MccBenchmark},
    config::ScoringConfig,
    rules::{RiskResult, RuleSet},
    transaction::Transaction,
    types::{Mcc, MerchantId},
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Number of risky merchants offered for drill-down.
pub const DRILL_DOWN_CANDIDATES: usize = 50;
const DRILL_DOWN_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMerchant {
    pub aggregate: MerchantAggregate,
    pub result: RiskResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_merchants: usize,
    pub risky_merchants: usize,
    pub configured_mccs: usize,
    /// Risky merchants with a chargeback-related reason.
    pub chargeback_flags: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub benchmarks: BTreeMap<Mcc, MccBenchmark>,
    /// Sorted by score descending, ties by merchant id.
    pub merchants: Vec<ScoredMerchant>,
    configured_mccs: usize,
}

impl RiskReport {
    /// Merchants with a score above zero, riskiest first.
    pub fn flagged(&self) -> impl Iterator<Item = &ScoredMerchant> {
        self.merchants.iter().filter(|m| m.result.is_risky())
    }

    pub fn top_flagged(&self, n: usize) -> Vec<MerchantId> {
        self.flagged()
            .take(n)
            .map(|m| m.aggregate.merchant_id.clone())
            .collect()
    }

    pub fn merchant(&self, merchant_id: &str) -> Option<&ScoredMerchant> {
        self.merchants
            .iter()
            .find(|m| m.aggregate.merchant_id == merchant_id)
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total_merchants: self.merchants.len(),
            risky_merchants: self.flagged().count(),
            configured_mccs: self.configured_mccs,
            chargeback_flags: self
                .flagged()
                .filter(|m| m.result.reasons.iter().any(|r| r.contains("CB")))
                .count(),
        }
    }
}

/// Transaction breakdown for one merchant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantDrillDown {
    pub merchant_id: MerchantId,
    pub txn_count: usize,
    pub total_amount: f64,
    pub chargebacks: usize,
    pub top_ips: Vec<(String, usize)>,
    pub top_devices: Vec<(String, usize)>,
    pub card_countries: Vec<(String, usize)>,
}

pub struct MerchantRiskScorer {
    config: ScoringConfig,
    rules: RuleSet,
}

impl MerchantRiskScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self::with_rules(config, RuleSet::standard())
    }

    pub fn with_rules(config: ScoringConfig, rules: RuleSet) -> Self {
        Self { config, rules }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Mutable access for parameter changes between scoring runs.
    pub fn config_mut(&mut self) -> &mut ScoringConfig {
        &mut self.config
    }

    pub fn score(&self, txns: &[Transaction]) -> RiskReport {
        let benchmarks = compute_benchmarks(txns, &self.config.home_country);
        let aggregates = aggregate_merchants(txns, &benchmarks, &self.config);

        let mut merchants: Vec<ScoredMerchant> = aggregates
            .into_iter()
            .map(|aggregate| {
                let result = self.rules.evaluate(&aggregate, &self.config);
                ScoredMerchant { aggregate, result }
            })
            .collect();

        // Aggregates arrive in merchant-id order; a stable sort keeps that
        // order among equal scores.
        merchants.sort_by(|a, b| b.result.score.cmp(&a.result.score));

        let report = RiskReport {
            benchmarks,
            merchants,
            configured_mccs: self.config.mccs.len(),
        };
        let summary = report.summary();
        log::info!(
            "score: {} of {} merchants flagged ({} chargeback-related)",
            summary.risky_merchants,
            summary.total_merchants,
            summary.chargeback_flags
        );
        report
    }
}

/// Break down one merchant's transactions. Returns `None` when the
/// merchant has no transactions.
pub fn drill_down(txns: &[Transaction], merchant_id: &str) -> Option<MerchantDrillDown> {
    let own: Vec<&Transaction> = txns.iter().filter(|t| t.merchant_id == merchant_id).collect();
    if own.is_empty() {
        return None;
    }

    let owned = |ranked: Vec<(&str, usize)>| -> Vec<(String, usize)> {
        ranked.into_iter().map(|(v, n)| (v.to_string(), n)).collect()
    };

    let mut top_ips = owned(ranked_counts(own.iter().map(|t| t.ip_address.as_str())));
    top_ips.truncate(DRILL_DOWN_TOP_N);
    let mut top_devices = owned(ranked_counts(own.iter().filter_map(|t| t.device_id.as_deref())));
    top_devices.truncate(DRILL_DOWN_TOP_N);

    Some(MerchantDrillDown {
        merchant_id: merchant_id.to_string(),
        txn_count: own.len(),
        total_amount: own.iter().map(|t| t.amount).sum(),
        chargebacks: own.iter().filter(|t| t.is_chargeback).count(),
        top_ips,
        top_devices,
        card_countries: owned(ranked_counts(own.iter().map(|t| t.card_country.as_str()))),
    })
}
