//! Shared builders for integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use merchant_risk_core::{
    aggregate::MerchantAggregate, benchmark::MccBenchmark, transaction::Transaction,
};

pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 12, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

/// A clean domestic transaction, one hour after the previous index, on a
/// unique IP. Tests flip the fields they care about.
pub fn clean_txn(merchant_id: &str, mcc: &str, index: usize) -> Transaction {
    Transaction {
        transaction_id: format!("{merchant_id}-{index}"),
        timestamp: t0() + Duration::hours(index as i64),
        merchant_id: merchant_id.to_string(),
        mcc: mcc.to_string(),
        amount: 100.0,
        is_3d_secure: true,
        is_chargeback: false,
        is_refund: false,
        card_country: "TR".into(),
        ip_address: format!("10.0.{}.{}", index / 256, index % 256),
        ip_country: "TR".into(),
        device_id: Some(format!("DEV_{index}")),
        is_failed: false,
        is_moto: false,
    }
}

/// `n` clean transactions for one merchant.
pub fn clean_merchant(merchant_id: &str, mcc: &str, n: usize) -> Vec<Transaction> {
    (0..n).map(|i| clean_txn(merchant_id, mcc, i)).collect()
}

/// A quiet aggregate on an unconfigured MCC that fires no rule.
pub fn quiet_aggregate() -> MerchantAggregate {
    MerchantAggregate {
        merchant_id: "M_TEST".into(),
        mcc: "0000".into(),
        txn_count: 100,
        total_amount: 10_000.0,
        avg_ticket: 100.0,
        total_cb: 0,
        total_refund: 0,
        total_failed: 0,
        cb_ratio: 0.0,
        refund_ratio: 0.0,
        three_ds_rate: 1.0,
        non_3d_ratio: 0.0,
        ip_concentration: 0.01,
        top_ip: "10.0.0.1".into(),
        top_device: "DEV_1".into(),
        foreign_card_ratio: 0.0,
        foreign_ip_ratio: 0.0,
        failure_rate: 0.0,
        mail_order_share: 0.0,
        peak_velocity: 1,
        expected_avg_ticket: 0.0,
        ticket_variance_pct: 0.0,
        benchmark: None,
    }
}

pub fn benchmark(cb: f64, refund: f64, non_3d: f64, foreign_card: f64, foreign_ip: f64) -> MccBenchmark {
    MccBenchmark {
        txn_count: 1_000,
        cb_ratio: cb,
        refund_ratio: refund,
        non_3d_ratio: non_3d,
        foreign_card_ratio: foreign_card,
        foreign_ip_ratio: foreign_ip,
    }
}
