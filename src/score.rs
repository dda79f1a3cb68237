//! Weighted priority scoring for classified contacts.
//!
//! Five factors on a 0–100 scale, combined by configured weights, then
//! shaped by a per-stage multiplier and clamped to 100. The clock is
//! injected so recency buckets are reproducible in tests.

use chrono::{DateTime, Utc};

use crate::config::ScoringWeights;
use crate::model::{Contact, FunnelStage};

/// Per-contact factor breakdown, kept for report logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub recency: f64,
    pub relationship_depth: f64,
    pub engagement: f64,
    pub seniority: f64,
    pub company_size: f64,
    pub multiplier: f64,
    pub total: f64,
}

/// Computes priority scores. One instance per run; `now` is fixed at
/// construction so every contact in a run shares the same reference
/// point.
pub struct PriorityScorer {
    weights: ScoringWeights,
    now: DateTime<Utc>,
}

impl PriorityScorer {
    pub fn new(weights: ScoringWeights, now: DateTime<Utc>) -> Self {
        Self { weights, now }
    }

    /// Score a classified contact and record the total on it.
    pub fn apply(&self, contact: &mut Contact) {
        contact.priority_score = self.breakdown(contact).total;
    }

    /// Full factor breakdown for one contact.
    pub fn breakdown(&self, contact: &Contact) -> ScoreBreakdown {
        let recency = self.recency_factor(contact.last_contact_date);
        let relationship_depth = contact.client_value_score.unwrap_or(0.0).clamp(0.0, 100.0);
        let engagement = (contact.engagement_ratio.unwrap_or(0.0) * 100.0).clamp(0.0, 100.0);
        let seniority = seniority_factor(contact.title.as_deref());
        // No sizing data source yet; the weight stays reserved so the
        // other factors are not silently re-normalized.
        let company_size = 0.0;

        let w = &self.weights;
        let base = w.recency * recency
            + w.relationship_depth * relationship_depth
            + w.engagement_level * engagement
            + w.seniority * seniority
            + w.company_size * company_size;

        let multiplier = stage_multiplier(contact.funnel_stage);
        let total = (base * multiplier).min(100.0);

        ScoreBreakdown {
            recency,
            relationship_depth,
            engagement,
            seniority,
            company_size,
            multiplier,
            total,
        }
    }

    /// Bucketed days-since-last-contact. Contacts with no known date
    /// score zero rather than inheriting the stalest bucket.
    fn recency_factor(&self, last_contact: Option<DateTime<Utc>>) -> f64 {
        let Some(last) = last_contact else {
            return 0.0;
        };
        let days = (self.now - last).num_days();
        match days {
            d if d < 30 => 100.0,
            d if d < 90 => 80.0,
            d if d < 180 => 60.0,
            d if d < 365 => 40.0,
            _ => 20.0,
        }
    }
}

/// First matching tier wins; tiers are checked from most senior down so
/// "Senior VP" reads as executive, not as senior-prefixed staff.
fn seniority_factor(title: Option<&str>) -> f64 {
    let Some(title) = title else {
        return 0.0;
    };
    let title = title.to_lowercase();
    const EXECUTIVE: [&str; 7] = ["ceo", "cto", "cfo", "coo", "president", "vp", "director"];
    const LEADERSHIP: [&str; 4] = ["head", "lead", "manager", "senior"];
    const STAFF: [&str; 3] = ["coordinator", "specialist", "analyst"];
    if EXECUTIVE.iter().any(|k| title.contains(k)) {
        100.0
    } else if LEADERSHIP.iter().any(|k| title.contains(k)) {
        70.0
    } else if STAFF.iter().any(|k| title.contains(k)) {
        40.0
    } else {
        0.0
    }
}

/// Stage-level boost or damping applied after the weighted base.
fn stage_multiplier(stage: FunnelStage) -> f64 {
    match stage {
        FunnelStage::BottomActive => 1.5,
        FunnelStage::HiddenJobChange => 1.4,
        FunnelStage::BottomDormantWarm => 1.3,
        FunnelStage::MiddleReconnectLater | FunnelStage::HiddenReferral => 1.2,
        FunnelStage::MiddleProposalSent => 1.1,
        FunnelStage::TopCold => 0.8,
        _ => 1.0,
    }
}
