//! Risk scoring rule set.
//!
//! RULE: every rule is independent. A rule reads one merchant aggregate
//! and the active config, and either fires with a fixed point value and a
//! reason, or stays silent. Rules never see each other's results.
//!
//! EVALUATION ORDER (fixed, reasons are reported in this order):
//!   1. Static MCC limits          (family: static_limits)
//!   2. Peer deviation             (family: peer_deviation)
//!   3. Ticket variance            (always on)
//!   4. IP concentration           (always on)
//!   5. Failure / velocity / MOTO  (family: generic_fraud)

use crate::{
    aggregate::MerchantAggregate,
    benchmark::MccBenchmark,
    config::{RuleProfile, ScoringConfig, StaticLimits},
};
use serde::Serialize;

// ── Weights ──────────────────────────────────────────────────────────────────

const TICKET_VARIANCE_POINTS: u32 = 45;
const IP_CONCENTRATION_POINTS: u32 = 50;
const FAILURE_RATE_POINTS: u32 = 50;
const VELOCITY_POINTS: u32 = 30;
const MAIL_ORDER_POINTS: u32 = 20;

/// Foreign-IP peer deviation needs a sector average above this floor.
const FOREIGN_IP_BENCHMARK_FLOOR: f64 = 0.01;

// ── Result types ─────────────────────────────────────────────────────────────

/// One fired rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleHit {
    pub rule: &'static str,
    pub points: u32,
    pub reason: String,
}

/// Final verdict for a merchant: the weighted tally of fired rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskResult {
    pub score: u32,
    pub reasons: Vec<String>,
}

impl RiskResult {
    pub fn from_hits(hits: &[RuleHit]) -> Self {
        Self {
            score: hits.iter().map(|h| h.points).sum(),
            reasons: hits.iter().map(|h| h.reason.clone()).collect(),
        }
    }

    pub fn reasons_joined(&self) -> String {
        self.reasons.join(" | ")
    }

    pub fn is_risky(&self) -> bool {
        self.score > 0
    }
}

// ── Metrics ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Chargeback,
    Refund,
    Non3ds,
    ForeignCard,
    ForeignIp,
}

impl Metric {
    pub fn label(self) -> &'static str {
        match self {
            Self::Chargeback => "CB",
            Self::Refund => "REFUND",
            Self::Non3ds => "NON-3DS",
            Self::ForeignCard => "FOREIGN CARD",
            Self::ForeignIp => "FOREIGN IP",
        }
    }

    pub fn of_merchant(self, m: &MerchantAggregate) -> f64 {
        match self {
            Self::Chargeback => m.cb_ratio,
            Self::Refund => m.refund_ratio,
            Self::Non3ds => m.non_3d_ratio,
            Self::ForeignCard => m.foreign_card_ratio,
            Self::ForeignIp => m.foreign_ip_ratio,
        }
    }

    pub fn of_benchmark(self, b: &MccBenchmark) -> f64 {
        match self {
            Self::Chargeback => b.cb_ratio,
            Self::Refund => b.refund_ratio,
            Self::Non3ds => b.non_3d_ratio,
            Self::ForeignCard => b.foreign_card_ratio,
            Self::ForeignIp => b.foreign_ip_ratio,
        }
    }

    fn of_limits(self, l: &StaticLimits) -> f64 {
        match self {
            Self::Chargeback => l.cb_ratio,
            Self::Refund => l.refund_ratio,
            Self::Non3ds => l.non_3d_ratio,
            Self::ForeignCard => l.foreign_card_ratio,
            Self::ForeignIp => l.foreign_ip_ratio,
        }
    }
}

// ── Rule trait ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFamily {
    StaticLimits,
    PeerDeviation,
    Global,
    GenericFraud,
}

impl RuleFamily {
    fn enabled(self, profile: &RuleProfile) -> bool {
        match self {
            Self::StaticLimits => profile.static_limits,
            Self::PeerDeviation => profile.peer_deviation,
            Self::Global => true,
            Self::GenericFraud => profile.generic_fraud,
        }
    }
}

/// The contract every scoring rule fulfils.
pub trait ScoringRule {
    /// Stable rule name, used in logs and hit records.
    fn name(&self) -> &'static str;

    fn family(&self) -> RuleFamily;

    /// Returns a hit if the rule fires for this merchant.
    fn evaluate(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> Option<RuleHit>;
}

// ── Rules ────────────────────────────────────────────────────────────────────

/// Merchant ratio above the category's configured ceiling.
pub struct StaticLimitRule {
    metric: Metric,
    points: u32,
    name: &'static str,
}

impl ScoringRule for StaticLimitRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::StaticLimits
    }

    fn evaluate(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> Option<RuleHit> {
        let limits = &config.mccs.get(&merchant.mcc)?.limits;
        let limit = self.metric.of_limits(limits);
        if limit > 0.0 && self.metric.of_merchant(merchant) > limit {
            return Some(RuleHit {
                rule: self.name,
                points: self.points,
                reason: format!("LIMIT EXCEEDED ({})", self.metric.label()),
            });
        }
        None
    }
}

/// Merchant ratio above the sector average times the peer multiplier.
pub struct PeerDeviationRule {
    metric: Metric,
    points: u32,
    name: &'static str,
    benchmark_floor: f64,
}

impl ScoringRule for PeerDeviationRule {
    fn name(&self) -> &'static str {
        self.name
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::PeerDeviation
    }

    fn evaluate(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> Option<RuleHit> {
        let average = self.metric.of_benchmark(merchant.benchmark.as_ref()?);
        if average <= self.benchmark_floor {
            return None;
        }

        let multiplier = config.peer_multiplier;
        if self.metric.of_merchant(merchant) <= average * multiplier {
            return None;
        }

        let shown = multiplier_label(multiplier);
        let reason = match self.metric {
            Metric::Chargeback => {
                format!("CB DEVIATION ({shown}X): sector avg {average:.2}%")
            }
            other => format!("{} DEVIATION ({shown}X)", other.label()),
        };
        Some(RuleHit {
            rule: self.name,
            points: self.points,
            reason,
        })
    }
}

/// The multiplier exactly as compared: `2.0`, `2.25`, `1.9`.
fn multiplier_label(multiplier: f64) -> String {
    if multiplier.fract() == 0.0 {
        format!("{multiplier:.1}")
    } else {
        multiplier.to_string()
    }
}

/// Average ticket too far above the category's expected average.
pub struct TicketVarianceRule;

impl ScoringRule for TicketVarianceRule {
    fn name(&self) -> &'static str {
        "ticket_variance"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Global
    }

    fn evaluate(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> Option<RuleHit> {
        (merchant.ticket_variance_pct > config.avg_ticket_variance_pct).then(|| RuleHit {
            rule: self.name(),
            points: TICKET_VARIANCE_POINTS,
            reason: "TICKET VARIANCE".to_string(),
        })
    }
}

/// Traffic dominated by one IP address (bot pattern).
pub struct IpConcentrationRule;

impl ScoringRule for IpConcentrationRule {
    fn name(&self) -> &'static str {
        "ip_concentration"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::Global
    }

    fn evaluate(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> Option<RuleHit> {
        (merchant.ip_concentration > config.ip_concentration_pct / 100.0).then(|| RuleHit {
            rule: self.name(),
            points: IP_CONCENTRATION_POINTS,
            reason: format!("BOT ({}%+ single IP)", config.ip_concentration_pct),
        })
    }
}

pub struct FailureRateRule;

impl ScoringRule for FailureRateRule {
    fn name(&self) -> &'static str {
        "failure_rate"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::GenericFraud
    }

    fn evaluate(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> Option<RuleHit> {
        (merchant.failure_rate > config.failure_rate_pct).then(|| RuleHit {
            rule: self.name(),
            points: FAILURE_RATE_POINTS,
            reason: "HIGH FAILURE RATE".to_string(),
        })
    }
}

pub struct VelocityRule;

impl ScoringRule for VelocityRule {
    fn name(&self) -> &'static str {
        "velocity"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::GenericFraud
    }

    fn evaluate(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> Option<RuleHit> {
        (merchant.peak_velocity as f64 > config.velocity_per_hour).then(|| RuleHit {
            rule: self.name(),
            points: VELOCITY_POINTS,
            reason: format!("VELOCITY ({}/h)", merchant.peak_velocity),
        })
    }
}

pub struct MailOrderShareRule;

impl ScoringRule for MailOrderShareRule {
    fn name(&self) -> &'static str {
        "mail_order_share"
    }

    fn family(&self) -> RuleFamily {
        RuleFamily::GenericFraud
    }

    fn evaluate(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> Option<RuleHit> {
        (merchant.mail_order_share > config.mail_order_share_pct).then(|| RuleHit {
            rule: self.name(),
            points: MAIL_ORDER_POINTS,
            reason: "MAIL ORDER SHARE".to_string(),
        })
    }
}

// ── Rule set ─────────────────────────────────────────────────────────────────

pub struct RuleSet {
    rules: Vec<Box<dyn ScoringRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Build the standard rule set in the documented evaluation order.
    pub fn standard() -> Self {
        let mut set = RuleSet::new();

        for (metric, points, name) in [
            (Metric::Chargeback, 80, "static_cb"),
            (Metric::Refund, 40, "static_refund"),
            (Metric::Non3ds, 30, "static_non_3ds"),
            (Metric::ForeignCard, 20, "static_foreign_card"),
            (Metric::ForeignIp, 20, "static_foreign_ip"),
        ] {
            set.register(Box::new(StaticLimitRule { metric, points, name }));
        }

        for (metric, points, name, benchmark_floor) in [
            (Metric::Chargeback, 80, "peer_cb", 0.0),
            (Metric::Refund, 45, "peer_refund", 0.0),
            (Metric::Non3ds, 30, "peer_non_3ds", 0.0),
            (Metric::ForeignIp, 25, "peer_foreign_ip", FOREIGN_IP_BENCHMARK_FLOOR),
        ] {
            set.register(Box::new(PeerDeviationRule {
                metric,
                points,
                name,
                benchmark_floor,
            }));
        }

        set.register(Box::new(TicketVarianceRule));
        set.register(Box::new(IpConcentrationRule));
        set.register(Box::new(FailureRateRule));
        set.register(Box::new(VelocityRule));
        set.register(Box::new(MailOrderShareRule));
        set
    }

    /// Append a rule. Reasons are reported in registration order.
    pub fn register(&mut self, rule: Box<dyn ScoringRule>) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule that fires for `merchant`, in evaluation order.
    /// Merchants below the minimum transaction count fire nothing.
    pub fn hits(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> Vec<RuleHit> {
        if merchant.txn_count < config.min_txn_count {
            return Vec::new();
        }

        self.rules
            .iter()
            .filter(|rule| rule.family().enabled(&config.profile))
            .filter_map(|rule| rule.evaluate(merchant, config))
            .collect()
    }

    pub fn evaluate(&self, merchant: &MerchantAggregate, config: &ScoringConfig) -> RiskResult {
        let hits = self.hits(merchant, config);
        for hit in &hits {
            log::debug!("{}: {} +{}", merchant.merchant_id, hit.rule, hit.points);
        }
        RiskResult::from_hits(&hits)
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::standard()
    }
}
