//! Synthetic transaction generator.
//!
//! Produces a labelled test population: mostly clean merchants plus a
//! handful of planted fraud scenarios, each of which the standard rule
//! set is expected to flag.
//!
//!   SAFE          clean traffic on 5411/5812
//!   HIGH_CB       15% chargebacks
//!   NO_3DS        85% of traffic without 3D Secure
//!   BOT_ATTACK    one IP, one device, foreign IP country
//!   OFFSHORE      5094 wholesale with large tickets and offshore cards
//!   CARD_TESTING  bursts of failed mail-order attempts

use crate::{rng::SeededRng, transaction::Transaction};
use chrono::{Duration, NaiveDate, NaiveDateTime};

const SAFE_COUNTRIES: [&str; 5] = ["TR", "US", "DE", "UK", "FR"];
const SAFE_COUNTRY_WEIGHTS: [f64; 5] = [0.90, 0.04, 0.02, 0.02, 0.02];
const HIGH_RISK_COUNTRIES: [&str; 5] = ["CY", "MT", "PA", "VG", "KY"];

const BOT_IP: &str = "192.168.1.105";
const BOT_DEVICE: &str = "DEV_BOT_01";

const GENERATION_WINDOW_MINUTES: u64 = 43_200; // 30 days
const CARD_TESTING_BURST_MINUTES: u64 = 180;

const REFUND_RATE: f64 = 0.02;
const BASE_FAILURE_RATE: f64 = 0.03;
const BASE_MOTO_RATE: f64 = 0.05;
const FOREIGN_IP_RATE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Safe,
    HighChargeback,
    No3ds,
    BotAttack,
    Offshore,
    CardTesting,
}

impl Scenario {
    pub const ALL: [Scenario; 6] = [
        Scenario::Safe,
        Scenario::HighChargeback,
        Scenario::No3ds,
        Scenario::BotAttack,
        Scenario::Offshore,
        Scenario::CardTesting,
    ];

    /// Share of generated transactions that belong to this scenario.
    fn weight(self) -> f64 {
        match self {
            Self::Safe => 0.62,
            Self::HighChargeback => 0.10,
            Self::No3ds => 0.10,
            Self::BotAttack => 0.08,
            Self::Offshore => 0.07,
            Self::CardTesting => 0.03,
        }
    }

    fn merchant_prefix(self) -> &'static str {
        match self {
            Self::Safe => "MERC_SAFE",
            Self::HighChargeback => "MERC_CB",
            Self::No3ds => "MERC_NO3D",
            Self::BotAttack => "MERC_BOT",
            Self::Offshore => "MERC_OFF",
            Self::CardTesting => "MERC_TEST",
        }
    }

    fn merchant_count(self) -> usize {
        match self {
            Self::Safe => 39,
            Self::HighChargeback | Self::No3ds => 4,
            Self::BotAttack => 3,
            Self::Offshore | Self::CardTesting => 2,
        }
    }

    /// Merchant ids for the scenario, e.g. `MERC_CB_01`.
    pub fn merchant_ids(self) -> Vec<String> {
        (1..=self.merchant_count())
            .map(|i| format!("{}_{i:02}", self.merchant_prefix()))
            .collect()
    }

    /// Scenario a generated merchant id belongs to.
    pub fn of_merchant(merchant_id: &str) -> Option<Scenario> {
        Self::ALL.into_iter().find(|s| {
            merchant_id
                .strip_prefix(s.merchant_prefix())
                .is_some_and(|rest| rest.starts_with('_'))
        })
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub txn_count: usize,
    pub start: NaiveDateTime,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            txn_count: 8_500,
            start: NaiveDate::from_ymd_opt(2024, 12, 1)
                .and_then(|d| d.and_hms_opt(8, 0, 0))
                .unwrap_or_default(),
        }
    }
}

pub fn generate(config: &GeneratorConfig) -> Vec<Transaction> {
    let mut rng = SeededRng::new(config.seed);
    let weights: Vec<f64> = Scenario::ALL.iter().map(|s| s.weight()).collect();
    let merchants: Vec<Vec<String>> = Scenario::ALL.iter().map(|s| s.merchant_ids()).collect();

    let txns: Vec<Transaction> = (0..config.txn_count)
        .map(|i| {
            let slot = rng.pick_weighted(&weights);
            let merchant_id = rng.pick(&merchants[slot]).clone();
            generate_one(&mut rng, Scenario::ALL[slot], merchant_id, i, config.start)
        })
        .collect();

    log::info!("generator: {} transactions (seed {})", txns.len(), config.seed);
    txns
}

fn generate_one(
    rng: &mut SeededRng,
    scenario: Scenario,
    merchant_id: String,
    index: usize,
    start: NaiveDateTime,
) -> Transaction {
    let (mcc, amount) = match scenario {
        Scenario::Offshore => ("5094", rng.exponential(15_000.0) + 1_000.0),
        Scenario::Safe => (*rng.pick(&["5411", "5812"]), rng.exponential(400.0) + 20.0),
        _ => (*rng.pick(&["5411", "5812", "7995"]), rng.exponential(600.0) + 50.0),
    };

    let is_3d_secure = match scenario {
        Scenario::No3ds => rng.chance(0.15),
        _ => rng.chance(0.95),
    };
    let is_chargeback = scenario == Scenario::HighChargeback && rng.chance(0.15);

    let (ip_address, device_id, ip_country) = if scenario == Scenario::BotAttack {
        (BOT_IP.to_string(), BOT_DEVICE.to_string(), "US")
    } else {
        let ip = format!(
            "{}.{}.{}.{}",
            rng.range_inclusive(1, 255),
            rng.range_inclusive(0, 255),
            rng.range_inclusive(0, 255),
            rng.range_inclusive(0, 255)
        );
        let device = format!("DEV_{}", rng.range_inclusive(10_000, 99_999));
        let country = if rng.chance(FOREIGN_IP_RATE) { "US" } else { "TR" };
        (ip, device, country)
    };

    let card_country = match scenario {
        Scenario::Offshore => *rng.pick(&HIGH_RISK_COUNTRIES),
        _ => SAFE_COUNTRIES[rng.pick_weighted(&SAFE_COUNTRY_WEIGHTS)],
    };

    let is_refund = rng.chance(REFUND_RATE);

    let (is_failed, is_moto, minutes) = match scenario {
        Scenario::CardTesting => (
            rng.chance(0.40),
            rng.chance(0.60),
            rng.next_u64_below(CARD_TESTING_BURST_MINUTES),
        ),
        _ => (
            rng.chance(BASE_FAILURE_RATE),
            rng.chance(BASE_MOTO_RATE),
            rng.next_u64_below(GENERATION_WINDOW_MINUTES),
        ),
    };

    Transaction {
        transaction_id: (10_000 + index).to_string(),
        timestamp: start + Duration::minutes(minutes as i64),
        merchant_id,
        mcc: mcc.to_string(),
        amount: (amount * 100.0).round() / 100.0,
        is_3d_secure,
        is_chargeback,
        is_refund,
        card_country: card_country.to_string(),
        ip_address,
        ip_country: ip_country.to_string(),
        device_id: Some(device_id),
        is_failed,
        is_moto,
    }
}
