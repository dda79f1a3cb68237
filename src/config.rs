//! Run configuration.
//!
//! Loaded once per run from a JSON document and immutable thereafter.
//! Every knob has a default so the engine runs without a config file;
//! an explicitly supplied file that is missing or malformed is fatal.

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;

/// Engine configuration: keyword sets, scoring weights, funnel day
/// thresholds, and the owned-domain set used for direction detection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Email domains considered "ours"; a sender in one of these makes
    /// a message outbound. Empty set means everything is inbound.
    pub owned_domains: Vec<String>,
    pub keywords: SignalKeywords,
    pub weights: ScoringWeights,
    pub thresholds: FunnelThresholds,
}

/// Per-signal keyword sets, matched case-insensitively against
/// subject + body. The hidden-opportunity families emit `hidden_`
/// prefixed signals.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SignalKeywords {
    pub stalled: Vec<String>,
    pub jd_shared: Vec<String>,
    pub proposal_sent: Vec<String>,
    pub negotiation: Vec<String>,
    pub reconnect_later: Vec<String>,
    pub inbound: Vec<String>,
    pub referral: Vec<String>,
    pub job_change: Vec<String>,
    pub keep_in_touch: Vec<String>,
}

impl Default for SignalKeywords {
    fn default() -> Self {
        fn set(words: &[&str]) -> Vec<String> {
            words.iter().map(|w| (*w).to_string()).collect()
        }
        Self {
            stalled: set(&[
                "no response",
                "gone quiet",
                "circle back",
                "any update on",
                "checking in again",
            ]),
            jd_shared: set(&["job description", "jd attached", "sharing the jd", "requirement doc"]),
            proposal_sent: set(&["proposal", "our quote", "pricing attached", "commercials"]),
            negotiation: set(&["budget", "rate card", "negotiate", "revised terms"]),
            reconnect_later: set(&[
                "reconnect",
                "reach out later",
                "next quarter",
                "touch base in",
            ]),
            inbound: set(&[
                "reaching out to you",
                "came across your",
                "interested in your services",
            ]),
            referral: set(&["referred", "referral", "recommended you"]),
            job_change: set(&["new role", "i've joined", "moved to", "new position"]),
            keep_in_touch: set(&["keep in touch", "stay in touch", "stay connected"]),
        }
    }
}

/// Weights for the five priority-score factors. Each factor is computed
/// in its own 0–100 range and multiplied by its weight.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringWeights {
    pub recency: f64,
    pub relationship_depth: f64,
    pub engagement_level: f64,
    pub seniority: f64,
    /// Weighted but currently always scored 0: no populated data
    /// source exists for company size in this engine's inputs.
    pub company_size: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            recency: 0.30,
            relationship_depth: 0.25,
            engagement_level: 0.20,
            seniority: 0.15,
            company_size: 0.10,
        }
    }
}

/// Day boundaries for deriving client status from engagement recency
/// when a CRM export carries no status column.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FunnelThresholds {
    /// Last contact within this many days → active.
    pub active_days: i64,
    /// Last contact within this many days (but past active) → dormant_warm.
    pub dormant_max_days: i64,
}

impl Default for FunnelThresholds {
    fn default() -> Self {
        Self {
            active_days: 90,
            dormant_max_days: 365,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file. Any failure here is fatal.
    pub fn load(path: &Path) -> std::result::Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Pre-flight validation. Runs before any processing; an invalid
    /// configuration aborts the whole run.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let weights = [
            ("weights.recency", self.weights.recency),
            ("weights.relationship_depth", self.weights.relationship_depth),
            ("weights.engagement_level", self.weights.engagement_level),
            ("weights.seniority", self.weights.seniority),
            ("weights.company_size", self.weights.company_size),
        ];
        for (key, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: format!("must be a non-negative finite number, got {value}"),
                });
            }
        }

        // A blank domain would substring-match every sender and flip the
        // whole archive to outbound.
        if self.owned_domains.iter().any(|d| d.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "owned_domains".into(),
                message: "entries must be non-empty".into(),
            });
        }

        if self.thresholds.active_days <= 0 {
            return Err(ConfigError::InvalidValue {
                key: "thresholds.active_days".into(),
                message: "must be positive".into(),
            });
        }
        if self.thresholds.dormant_max_days <= self.thresholds.active_days {
            return Err(ConfigError::InvalidValue {
                key: "thresholds.dormant_max_days".into(),
                message: format!(
                    "must be greater than active_days ({})",
                    self.thresholds.active_days
                ),
            });
        }

        let families = [
            ("keywords.stalled", &self.keywords.stalled),
            ("keywords.jd_shared", &self.keywords.jd_shared),
            ("keywords.proposal_sent", &self.keywords.proposal_sent),
            ("keywords.negotiation", &self.keywords.negotiation),
            ("keywords.reconnect_later", &self.keywords.reconnect_later),
            ("keywords.inbound", &self.keywords.inbound),
            ("keywords.referral", &self.keywords.referral),
            ("keywords.job_change", &self.keywords.job_change),
            ("keywords.keep_in_touch", &self.keywords.keep_in_touch),
        ];
        for (key, words) in families {
            if words.iter().any(|w| w.trim().is_empty()) {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "keyword entries must be non-empty".into(),
                });
            }
        }

        Ok(())
    }
}
