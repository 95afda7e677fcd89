//! Peer benchmarks: the average risk profile of every merchant category.

use crate::{transaction::Transaction, types::Mcc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Sector averages for one MCC, all ratios in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MccBenchmark {
    pub txn_count: usize,
    pub cb_ratio: f64,
    pub refund_ratio: f64,
    pub non_3d_ratio: f64,
    pub foreign_card_ratio: f64,
    pub foreign_ip_ratio: f64,
}

#[derive(Default)]
struct Tally {
    txns: usize,
    chargebacks: usize,
    refunds: usize,
    non_3d: usize,
    foreign_card: usize,
    foreign_ip: usize,
}

impl Tally {
    fn add(&mut self, txn: &Transaction, home_country: &str) {
        self.txns += 1;
        self.chargebacks += usize::from(txn.is_chargeback);
        self.refunds += usize::from(txn.is_refund);
        self.non_3d += usize::from(!txn.is_3d_secure);
        self.foreign_card += usize::from(txn.card_country != home_country);
        self.foreign_ip += usize::from(txn.ip_country != home_country);
    }

    fn finish(&self) -> MccBenchmark {
        let pct = |n: usize| n as f64 / self.txns as f64 * 100.0;
        MccBenchmark {
            txn_count: self.txns,
            cb_ratio: pct(self.chargebacks),
            refund_ratio: pct(self.refunds),
            non_3d_ratio: pct(self.non_3d),
            foreign_card_ratio: pct(self.foreign_card),
            foreign_ip_ratio: pct(self.foreign_ip),
        }
    }
}

/// Group transactions by MCC and compute each category's averages.
/// Every group holds at least one transaction, so no division by zero.
pub fn compute_benchmarks(txns: &[Transaction], home_country: &str) -> BTreeMap<Mcc, MccBenchmark> {
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    for txn in txns {
        tallies.entry(txn.mcc.as_str()).or_default().add(txn, home_country);
    }

    let benchmarks: BTreeMap<Mcc, MccBenchmark> = tallies
        .into_iter()
        .map(|(mcc, tally)| (mcc.to_string(), tally.finish()))
        .collect();

    log::info!("benchmark: {} categories from {} transactions", benchmarks.len(), txns.len());
    benchmarks
}
