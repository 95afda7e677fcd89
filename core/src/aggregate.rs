//! Per-merchant aggregation, joined with the merchant's category benchmark.

use crate::{
    benchmark::MccBenchmark,
    config::ScoringConfig,
    transaction::Transaction,
    types::{Mcc, MerchantId, NOT_AVAILABLE},
};
use chrono::Duration;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const VELOCITY_WINDOW_MINUTES: i64 = 60;

/// Aggregate statistics for one merchant. Ratios are in percent unless
/// noted otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantAggregate {
    pub merchant_id: MerchantId,
    /// First category observed for the merchant.
    pub mcc: Mcc,
    pub txn_count: usize,
    pub total_amount: f64,
    pub avg_ticket: f64,
    pub total_cb: usize,
    pub total_refund: usize,
    pub total_failed: usize,
    pub cb_ratio: f64,
    pub refund_ratio: f64,
    /// Fraction of 3D Secure transactions, in [0, 1].
    pub three_ds_rate: f64,
    pub non_3d_ratio: f64,
    /// Share of the single most frequent IP, in [0, 1].
    pub ip_concentration: f64,
    pub top_ip: String,
    pub top_device: String,
    pub foreign_card_ratio: f64,
    pub foreign_ip_ratio: f64,
    pub failure_rate: f64,
    pub mail_order_share: f64,
    /// Most transactions seen inside any rolling 60-minute window.
    pub peak_velocity: usize,
    pub expected_avg_ticket: f64,
    pub ticket_variance_pct: f64,
    pub benchmark: Option<MccBenchmark>,
}

/// Aggregate every merchant in `txns`, ordered by merchant id.
pub fn aggregate_merchants(
    txns: &[Transaction],
    benchmarks: &BTreeMap<Mcc, MccBenchmark>,
    config: &ScoringConfig,
) -> Vec<MerchantAggregate> {
    let mut groups: BTreeMap<&str, Vec<&Transaction>> = BTreeMap::new();
    for txn in txns {
        groups.entry(txn.merchant_id.as_str()).or_default().push(txn);
    }

    let merchants: Vec<MerchantAggregate> = groups
        .into_iter()
        .map(|(merchant_id, group)| aggregate_one(merchant_id, &group, benchmarks, config))
        .collect();

    log::info!("aggregate: {} merchants", merchants.len());
    merchants
}

fn aggregate_one(
    merchant_id: &str,
    group: &[&Transaction],
    benchmarks: &BTreeMap<Mcc, MccBenchmark>,
    config: &ScoringConfig,
) -> MerchantAggregate {
    let home = config.home_country.as_str();
    let n = group.len() as f64;
    let count = |pred: fn(&Transaction) -> bool| group.iter().filter(|t| pred(t)).count();

    let total_amount: f64 = group.iter().map(|t| t.amount).sum();
    let avg_ticket = total_amount / n;
    let total_cb = count(|t| t.is_chargeback);
    let total_refund = count(|t| t.is_refund);
    let total_failed = count(|t| t.is_failed);
    let total_3ds = count(|t| t.is_3d_secure);
    let total_moto = count(|t| t.is_moto);
    let foreign_card = group.iter().filter(|t| t.card_country != home).count();
    let foreign_ip = group.iter().filter(|t| t.ip_country != home).count();

    let (top_ip, top_ip_count) = most_frequent(group.iter().map(|t| t.ip_address.as_str()))
        .unwrap_or((NOT_AVAILABLE, 0));
    let top_device = most_frequent(group.iter().filter_map(|t| t.device_id.as_deref()))
        .map(|(device, _)| device)
        .unwrap_or(NOT_AVAILABLE);

    let mcc = group[0].mcc.clone();
    let expected_avg_ticket = config.expected_avg_ticket(&mcc);
    let ticket_variance_pct = if expected_avg_ticket > 0.0 {
        (avg_ticket - expected_avg_ticket) / expected_avg_ticket * 100.0
    } else {
        0.0
    };
    let three_ds_rate = total_3ds as f64 / n;

    MerchantAggregate {
        merchant_id: merchant_id.to_string(),
        benchmark: benchmarks.get(&mcc).copied(),
        mcc,
        txn_count: group.len(),
        total_amount,
        avg_ticket,
        total_cb,
        total_refund,
        total_failed,
        cb_ratio: total_cb as f64 / n * 100.0,
        refund_ratio: total_refund as f64 / n * 100.0,
        three_ds_rate,
        non_3d_ratio: (1.0 - three_ds_rate) * 100.0,
        ip_concentration: top_ip_count as f64 / n,
        top_ip: top_ip.to_string(),
        top_device: top_device.to_string(),
        foreign_card_ratio: foreign_card as f64 / n * 100.0,
        foreign_ip_ratio: foreign_ip as f64 / n * 100.0,
        failure_rate: total_failed as f64 / n * 100.0,
        mail_order_share: total_moto as f64 / n * 100.0,
        peak_velocity: peak_velocity(group),
        expected_avg_ticket,
        ticket_variance_pct,
    }
}

/// Most frequent value and its count. Ties go to the value seen first.
pub(crate) fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<(&'a str, usize)> {
    ranked_counts(values).into_iter().next()
}

/// Value counts sorted by count descending, ties by first appearance.
pub(crate) fn ranked_counts<'a>(values: impl Iterator<Item = &'a str>) -> Vec<(&'a str, usize)> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (pos, value) in values.enumerate() {
        counts.entry(value).or_insert((0, pos)).0 += 1;
    }
    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().map(|(value, (count, _))| (value, count)).collect()
}

fn peak_velocity(group: &[&Transaction]) -> usize {
    let mut times: Vec<_> = group.iter().map(|t| t.timestamp).collect();
    times.sort_unstable();

    let window = Duration::minutes(VELOCITY_WINDOW_MINUTES);
    let mut start = 0;
    let mut peak = 0;
    for end in 0..times.len() {
        while times[end] - times[start] >= window {
            start += 1;
        }
        peak = peak.max(end - start + 1);
    }
    peak
}
