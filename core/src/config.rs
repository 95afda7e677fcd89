use crate::{
    error::{RiskError, ScorerResult},
    types::Mcc,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

// ── Static MCC limits ──────────────────────────────────────────────

/// Per-category ceilings, all in percent. A ceiling of 0 disables the check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticLimits {
    pub cb_ratio: f64,
    pub non_3d_ratio: f64,
    pub refund_ratio: f64,
    pub foreign_card_ratio: f64,
    pub foreign_ip_ratio: f64,
}

impl Default for StaticLimits {
    fn default() -> Self {
        Self {
            cb_ratio: 1.0,
            non_3d_ratio: 10.0,
            refund_ratio: 3.0,
            foreign_card_ratio: 5.0,
            foreign_ip_ratio: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MccProfile {
    /// Expected average ticket for the category, in local currency.
    pub expected_avg_ticket: f64,
    pub limits: StaticLimits,
}

impl Default for MccProfile {
    fn default() -> Self {
        Self {
            expected_avg_ticket: 1000.0,
            limits: StaticLimits::default(),
        }
    }
}

// ── Rule profile ───────────────────────────────────────────────────

/// Which rule families are evaluated. Ticket variance and IP
/// concentration are always on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleProfile {
    pub static_limits: bool,
    pub peer_deviation: bool,
    pub generic_fraud: bool,
}

impl Default for RuleProfile {
    fn default() -> Self {
        Self {
            static_limits: true,
            peer_deviation: true,
            generic_fraud: true,
        }
    }
}

// ── Scoring config ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub min_txn_count: usize,
    pub avg_ticket_variance_pct: f64,
    pub ip_concentration_pct: f64,
    pub peer_multiplier: f64,
    pub home_country: String,
    /// IP addresses with this prefix count as domestic when the input
    /// carries no `ip_country` column.
    pub local_ip_prefix: String,
    pub failure_rate_pct: f64,
    pub velocity_per_hour: f64,
    pub mail_order_share_pct: f64,
    pub profile: RuleProfile,
    pub mccs: BTreeMap<Mcc, MccProfile>,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        let mut mccs = BTreeMap::new();
        for (code, expected) in [("5411", 450.0), ("5812", 1000.0), ("5094", 15000.0), ("7995", 1000.0)] {
            mccs.insert(
                code.to_string(),
                MccProfile {
                    expected_avg_ticket: expected,
                    limits: StaticLimits::default(),
                },
            );
        }

        Self {
            min_txn_count: 10,
            avg_ticket_variance_pct: 50.0,
            ip_concentration_pct: 80.0,
            peer_multiplier: 2.0,
            home_country: "TR".into(),
            local_ip_prefix: "192".into(),
            failure_rate_pct: 20.0,
            velocity_per_hour: 30.0,
            mail_order_share_pct: 30.0,
            profile: RuleProfile::default(),
            mccs,
        }
    }
}

/// Accepted ranges for the global numeric parameters.
const GLOBAL_RANGES: [(&str, f64, f64); 7] = [
    ("min_txn_count", 1.0, 100.0),
    ("avg_ticket_variance_pct", 20.0, 200.0),
    ("ip_concentration_pct", 50.0, 100.0),
    ("peer_multiplier", 1.0, 5.0),
    ("failure_rate_pct", 0.0, 100.0),
    ("velocity_per_hour", 1.0, 10_000.0),
    ("mail_order_share_pct", 0.0, 100.0),
];

const MCC_FIELDS: [&str; 6] = [
    "expected_avg_ticket",
    "cb_ratio",
    "non_3d_ratio",
    "refund_ratio",
    "foreign_card_ratio",
    "foreign_ip_ratio",
];

impl ScoringConfig {
    /// Load from a JSON file. Missing fields fall back to defaults; values
    /// are held to the same ranges as [`ScoringConfig::set_param`].
    pub fn load(path: impl AsRef<Path>) -> ScorerResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: ScoringConfig = serde_json::from_str(&content)?;
        config.validate()?;
        log::info!(
            "config: loaded {} with {} MCC profiles",
            path.display(),
            config.mccs.len()
        );
        Ok(config)
    }

    /// Config with hardcoded defaults for use in tests.
    pub fn default_test() -> Self {
        Self::default()
    }

    /// Check every numeric parameter against its accepted range.
    pub fn validate(&self) -> ScorerResult<()> {
        for (name, min, max) in GLOBAL_RANGES {
            let value = self.global(name).unwrap_or_default();
            if !value.is_finite() {
                return Err(out_of_range(name, value));
            }
            check_range(name, value, min, max)?;
        }
        for (code, profile) in &self.mccs {
            for field in MCC_FIELDS {
                let value = profile.field(field).unwrap_or_default();
                if !value.is_finite() || value < 0.0 {
                    return Err(out_of_range(&format!("mcc.{code}.{field}"), value));
                }
            }
        }
        Ok(())
    }

    /// Current value of a global numeric parameter.
    pub fn global(&self, name: &str) -> Option<f64> {
        let value = match name {
            "min_txn_count" => self.min_txn_count as f64,
            "avg_ticket_variance_pct" => self.avg_ticket_variance_pct,
            "ip_concentration_pct" => self.ip_concentration_pct,
            "peer_multiplier" => self.peer_multiplier,
            "failure_rate_pct" => self.failure_rate_pct,
            "velocity_per_hour" => self.velocity_per_hour,
            "mail_order_share_pct" => self.mail_order_share_pct,
            _ => return None,
        };
        Some(value)
    }

    /// Expected average ticket for `mcc`, or 0 when the category is not configured.
    pub fn expected_avg_ticket(&self, mcc: &str) -> f64 {
        self.mccs.get(mcc).map(|p| p.expected_avg_ticket).unwrap_or(0.0)
    }

    /// Register a category with default limits. Returns false if it already exists.
    pub fn add_mcc(&mut self, mcc: &str) -> bool {
        let mcc = mcc.trim();
        if mcc.is_empty() || self.mccs.contains_key(mcc) {
            return false;
        }
        self.mccs.insert(mcc.to_string(), MccProfile::default());
        true
    }

    pub fn remove_mcc(&mut self, mcc: &str) -> bool {
        self.mccs.remove(mcc).is_some()
    }

    /// Update one named parameter.
    ///
    /// Global names: `min_txn_count`, `avg_ticket_variance_pct`,
    /// `ip_concentration_pct`, `peer_multiplier`, `failure_rate_pct`,
    /// `velocity_per_hour`, `mail_order_share_pct`.
    /// Per-category names take the form `mcc.<code>.<field>` where field is
    /// `expected_avg_ticket` or one of the [`StaticLimits`] fields.
    /// Rule families switch with `profile.<family>` and a value of 0 or 1.
    pub fn set_param(&mut self, name: &str, value: f64) -> ScorerResult<()> {
        if !value.is_finite() {
            return Err(out_of_range(name, value));
        }

        if let Some(rest) = name.strip_prefix("mcc.") {
            return self.set_mcc_param(name, rest, value);
        }
        if let Some(family) = name.strip_prefix("profile.") {
            return self.set_profile_param(name, family, value);
        }

        let (_, min, max) = GLOBAL_RANGES
            .iter()
            .find(|(known, _, _)| *known == name)
            .copied()
            .ok_or_else(|| RiskError::UnknownParameter {
                name: name.to_string(),
            })?;
        check_range(name, value, min, max)?;

        match name {
            "min_txn_count" => {
                if value.fract() != 0.0 {
                    return Err(out_of_range(name, value));
                }
                self.min_txn_count = value as usize;
            }
            "avg_ticket_variance_pct" => self.avg_ticket_variance_pct = value,
            "ip_concentration_pct" => self.ip_concentration_pct = value,
            "peer_multiplier" => self.peer_multiplier = value,
            "failure_rate_pct" => self.failure_rate_pct = value,
            "velocity_per_hour" => self.velocity_per_hour = value,
            _ => self.mail_order_share_pct = value,
        }
        log::debug!("config: {name} = {value}");
        Ok(())
    }

    fn set_mcc_param(&mut self, name: &str, rest: &str, value: f64) -> ScorerResult<()> {
        let unknown = || RiskError::UnknownParameter {
            name: name.to_string(),
        };
        let (code, field) = rest.split_once('.').ok_or_else(unknown)?;
        let profile = self.mccs.get_mut(code).ok_or_else(unknown)?;
        if value < 0.0 {
            return Err(out_of_range(name, value));
        }

        match field {
            "expected_avg_ticket" => profile.expected_avg_ticket = value,
            "cb_ratio" => profile.limits.cb_ratio = value,
            "non_3d_ratio" => profile.limits.non_3d_ratio = value,
            "refund_ratio" => profile.limits.refund_ratio = value,
            "foreign_card_ratio" => profile.limits.foreign_card_ratio = value,
            "foreign_ip_ratio" => profile.limits.foreign_ip_ratio = value,
            _ => return Err(unknown()),
        }
        log::debug!("config: {name} = {value}");
        Ok(())
    }

    fn set_profile_param(&mut self, name: &str, family: &str, value: f64) -> ScorerResult<()> {
        let switch = match family {
            "static_limits" => &mut self.profile.static_limits,
            "peer_deviation" => &mut self.profile.peer_deviation,
            "generic_fraud" => &mut self.profile.generic_fraud,
            _ => {
                return Err(RiskError::UnknownParameter {
                    name: name.to_string(),
                })
            }
        };
        if value != 0.0 && value != 1.0 {
            return Err(out_of_range(name, value));
        }
        *switch = value == 1.0;
        log::debug!("config: {name} = {}", *switch);
        Ok(())
    }
}

impl MccProfile {
    fn field(&self, name: &str) -> Option<f64> {
        let value = match name {
            "expected_avg_ticket" => self.expected_avg_ticket,
            "cb_ratio" => self.limits.cb_ratio,
            "non_3d_ratio" => self.limits.non_3d_ratio,
            "refund_ratio" => self.limits.refund_ratio,
            "foreign_card_ratio" => self.limits.foreign_card_ratio,
            "foreign_ip_ratio" => self.limits.foreign_ip_ratio,
            _ => return None,
        };
        Some(value)
    }
}

fn check_range(name: &str, value: f64, min: f64, max: f64) -> ScorerResult<()> {
    if value < min || value > max {
        return Err(out_of_range(name, value));
    }
    Ok(())
}

fn out_of_range(name: &str, value: f64) -> RiskError {
    RiskError::ParameterOutOfRange {
        name: name.to_string(),
        value,
    }
}
