//! Typed records for the resolution and classification engine.
//!
//! Every entity that crosses a stage boundary is an explicit struct with
//! declared optional fields; nothing is inferred at read time. `Signal`
//! and `FunnelStage` are closed enums; set semantics use `BTreeSet` so
//! exported joined lists are stably ordered.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalize an email address for use as the cross-source join key.
///
/// Lower-case + trim. This is the *only* identity rule in the engine;
/// normalizing an already-normalized address is a no-op.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

// ── Signals ─────────────────────────────────────────────────────────

/// A detected or assigned funnel signal.
///
/// The first nine are detected from correspondence text by the
/// `SignalDetector`. The last three (`ActiveClient`, `DormantWarmClient`,
/// `JobChange`) are provenance signals assigned by the classifier when a
/// non-textual rule fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    Stalled,
    JdShared,
    ProposalSent,
    Negotiation,
    ReconnectLater,
    HiddenInbound,
    HiddenReferral,
    HiddenJobChange,
    HiddenKeepInTouch,
    ActiveClient,
    DormantWarmClient,
    JobChange,
}

impl Signal {
    /// Stable snake_case name, used in exports and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stalled => "stalled",
            Self::JdShared => "jd_shared",
            Self::ProposalSent => "proposal_sent",
            Self::Negotiation => "negotiation",
            Self::ReconnectLater => "reconnect_later",
            Self::HiddenInbound => "hidden_inbound",
            Self::HiddenReferral => "hidden_referral",
            Self::HiddenJobChange => "hidden_job_change",
            Self::HiddenKeepInTouch => "hidden_keep_in_touch",
            Self::ActiveClient => "active_client",
            Self::DormantWarmClient => "dormant_warm_client",
            Self::JobChange => "job_change",
        }
    }

    /// Whether this is a hidden-opportunity signal.
    pub fn is_hidden(&self) -> bool {
        matches!(
            self,
            Self::HiddenInbound
                | Self::HiddenReferral
                | Self::HiddenJobChange
                | Self::HiddenKeepInTouch
        )
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Join a signal set into the exported ordered list form.
pub fn join_signals(signals: &BTreeSet<Signal>) -> String {
    signals
        .iter()
        .map(Signal::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Funnel stages ───────────────────────────────────────────────────

/// Stage family, used for segment views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunnelFamily {
    Bottom,
    Middle,
    Hidden,
    Top,
}

/// One of the 12 terminal funnel stages.
///
/// Closed set: classification always lands on exactly one of these,
/// never an "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    BottomActive,
    BottomDormantWarm,
    MiddleStalled,
    MiddleJdShared,
    MiddleProposalSent,
    MiddleNegotiation,
    MiddleReconnectLater,
    HiddenInbound,
    HiddenReferral,
    HiddenJobChange,
    HiddenKeepInTouch,
    TopCold,
}

impl FunnelStage {
    /// Stable snake_case name, used in exports and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BottomActive => "bottom_active",
            Self::BottomDormantWarm => "bottom_dormant_warm",
            Self::MiddleStalled => "middle_stalled",
            Self::MiddleJdShared => "middle_jd_shared",
            Self::MiddleProposalSent => "middle_proposal_sent",
            Self::MiddleNegotiation => "middle_negotiation",
            Self::MiddleReconnectLater => "middle_reconnect_later",
            Self::HiddenInbound => "hidden_inbound",
            Self::HiddenReferral => "hidden_referral",
            Self::HiddenJobChange => "hidden_job_change",
            Self::HiddenKeepInTouch => "hidden_keep_in_touch",
            Self::TopCold => "top_cold",
        }
    }

    /// Which segment view this stage belongs to.
    pub fn family(&self) -> FunnelFamily {
        match self {
            Self::BottomActive | Self::BottomDormantWarm => FunnelFamily::Bottom,
            Self::MiddleStalled
            | Self::MiddleJdShared
            | Self::MiddleProposalSent
            | Self::MiddleNegotiation
            | Self::MiddleReconnectLater => FunnelFamily::Middle,
            Self::HiddenInbound
            | Self::HiddenReferral
            | Self::HiddenJobChange
            | Self::HiddenKeepInTouch => FunnelFamily::Hidden,
            Self::TopCold => FunnelFamily::Top,
        }
    }
}

impl std::fmt::Display for FunnelStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Client status ───────────────────────────────────────────────────

/// Relationship status carried on CRM-derived fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Active,
    DormantWarm,
    DormantCold,
}

impl ClientStatus {
    /// Parse a CRM status cell. Unknown strings map to `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "active" => Some(Self::Active),
            "dormant_warm" => Some(Self::DormantWarm),
            "dormant_cold" => Some(Self::DormantCold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::DormantWarm => "dormant_warm",
            Self::DormantCold => "dormant_cold",
        }
    }
}

// ── Messages and threads ────────────────────────────────────────────

/// Message direction relative to the owned domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// A single parsed archive message. Scan-scoped: consumed into contact
/// and thread accumulators, never persisted.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub from_address: String,
    pub from_name: Option<String>,
    pub to_addresses: Vec<String>,
    pub cc_addresses: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub body_text: String,
    pub direction: Direction,
    pub extracted_companies: BTreeSet<String>,
    pub extracted_roles: BTreeSet<String>,
    pub detected_signals: BTreeSet<Signal>,
}

/// Derived status of a conversation thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    Stalled,
    ActiveButNotClosed,
    HiddenOpportunity,
    Unknown,
}

impl ThreadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stalled => "stalled",
            Self::ActiveButNotClosed => "active_but_not_closed",
            Self::HiddenOpportunity => "hidden_opportunity",
            Self::Unknown => "unknown",
        }
    }
}

/// Aggregate over all messages sharing a thread key.
#[derive(Debug, Clone)]
pub struct ConversationThread {
    pub thread_id: String,
    pub participants: BTreeSet<String>,
    pub email_count: usize,
    pub start_date: Option<DateTime<Utc>>,
    pub last_date: Option<DateTime<Utc>>,
    pub aggregated_signals: BTreeSet<Signal>,
}

impl ConversationThread {
    /// Derive thread status from the aggregated signal set.
    ///
    /// Stalled-type signals outrank active-but-not-closed, which outrank
    /// hidden-opportunity; threads with no signals are unknown.
    pub fn status(&self) -> ThreadStatus {
        let s = &self.aggregated_signals;
        if s.contains(&Signal::Stalled) || s.contains(&Signal::ReconnectLater) {
            ThreadStatus::Stalled
        } else if s.contains(&Signal::JdShared) || s.contains(&Signal::ProposalSent) {
            ThreadStatus::ActiveButNotClosed
        } else if s.iter().any(Signal::is_hidden) {
            ThreadStatus::HiddenOpportunity
        } else {
            ThreadStatus::Unknown
        }
    }
}

// ── Contact fragments ───────────────────────────────────────────────

/// Which provider a fragment came from. Variant order is the fixed
/// ingestion order and the resolver's tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Archive,
    Crm,
    Enrichment,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Crm => "crm",
            Self::Enrichment => "enrichment",
        }
    }
}

/// One contact record as seen by a single provider, pre-resolution.
#[derive(Debug, Clone)]
pub struct ContactFragment {
    /// Already normalized; constructors go through `normalize_email`.
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub linkedin_url: Option<String>,
    pub client_status: Option<ClientStatus>,
    pub client_value_score: Option<f64>,
    pub engagement_ratio: Option<f64>,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub job_change_detected: bool,
    pub source: SourceTag,
    pub signals: BTreeSet<Signal>,
}

fn filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl ContactFragment {
    /// Empty fragment for a normalized email and provider.
    pub fn new(email: &str, source: SourceTag) -> Self {
        Self {
            email: normalize_email(email),
            name: None,
            company: None,
            title: None,
            linkedin_url: None,
            client_status: None,
            client_value_score: None,
            engagement_ratio: None,
            last_contact_date: None,
            job_change_detected: false,
            source,
            signals: BTreeSet::new(),
        }
    }

    /// Count of populated identity fields among
    /// {email, name, company, title, linkedin_url}. Used to pick the
    /// winning fragment during resolution.
    pub fn completeness(&self) -> u8 {
        let mut score = 0;
        if !self.email.is_empty() {
            score += 1;
        }
        for field in [&self.name, &self.company, &self.title, &self.linkedin_url] {
            if filled(field) {
                score += 1;
            }
        }
        score
    }
}

// ── Resolved contacts ───────────────────────────────────────────────

/// The durable unit of work: exactly one per normalized email after
/// resolution.
///
/// Lifecycle: created by the resolver, mutated in place by the
/// classifier (stage + fired provenance) and the scorer, then read-only.
#[derive(Debug, Clone)]
pub struct Contact {
    pub email: String,
    pub name: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
    pub linkedin_url: Option<String>,
    pub client_status: Option<ClientStatus>,
    pub client_value_score: Option<f64>,
    pub engagement_ratio: Option<f64>,
    pub last_contact_date: Option<DateTime<Utc>>,
    pub job_change_detected: bool,
    /// Union of signals from every contributing fragment.
    pub funnel_signals: BTreeSet<Signal>,
    pub funnel_stage: FunnelStage,
    /// Which signal the winning classification rule recorded.
    /// `None` only for the top_cold fallback.
    pub fired_signal: Option<Signal>,
    pub priority_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_email_lowercases_and_trims() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn normalize_email_is_idempotent() {
        let once = normalize_email("  Bob@X.io");
        assert_eq!(normalize_email(&once), once);
    }

    #[test]
    fn signal_names_are_snake_case() {
        assert_eq!(Signal::JdShared.as_str(), "jd_shared");
        assert_eq!(Signal::HiddenKeepInTouch.as_str(), "hidden_keep_in_touch");
    }

    #[test]
    fn hidden_signals_are_flagged() {
        assert!(Signal::HiddenReferral.is_hidden());
        assert!(!Signal::ProposalSent.is_hidden());
        assert!(!Signal::ActiveClient.is_hidden());
    }

    #[test]
    fn join_signals_is_ordered_and_deduplicated() {
        let mut set = BTreeSet::new();
        set.insert(Signal::ReconnectLater);
        set.insert(Signal::Stalled);
        set.insert(Signal::Stalled);
        assert_eq!(join_signals(&set), "stalled, reconnect_later");
    }

    #[test]
    fn stage_families_cover_all_twelve() {
        use FunnelFamily::*;
        let cases = [
            (FunnelStage::BottomActive, Bottom),
            (FunnelStage::BottomDormantWarm, Bottom),
            (FunnelStage::MiddleStalled, Middle),
            (FunnelStage::MiddleJdShared, Middle),
            (FunnelStage::MiddleProposalSent, Middle),
            (FunnelStage::MiddleNegotiation, Middle),
            (FunnelStage::MiddleReconnectLater, Middle),
            (FunnelStage::HiddenInbound, Hidden),
            (FunnelStage::HiddenReferral, Hidden),
            (FunnelStage::HiddenJobChange, Hidden),
            (FunnelStage::HiddenKeepInTouch, Hidden),
            (FunnelStage::TopCold, Top),
        ];
        for (stage, family) in cases {
            assert_eq!(stage.family(), family, "{stage}");
        }
    }

    #[test]
    fn client_status_parse_known_and_unknown() {
        assert_eq!(ClientStatus::parse(" Active "), Some(ClientStatus::Active));
        assert_eq!(
            ClientStatus::parse("dormant_warm"),
            Some(ClientStatus::DormantWarm)
        );
        assert_eq!(ClientStatus::parse("prospect"), None);
        assert_eq!(ClientStatus::parse(""), None);
    }

    #[test]
    fn fragment_completeness_counts_identity_fields() {
        let mut frag = ContactFragment::new("a@x.com", SourceTag::Crm);
        assert_eq!(frag.completeness(), 1);
        frag.name = Some("Ana".into());
        frag.company = Some("Acme Inc".into());
        assert_eq!(frag.completeness(), 3);
        frag.title = Some("  ".into()); // whitespace-only does not count
        assert_eq!(frag.completeness(), 3);
        frag.linkedin_url = Some("https://linkedin.com/in/ana".into());
        assert_eq!(frag.completeness(), 4);
    }

    #[test]
    fn fragment_new_normalizes_email() {
        let frag = ContactFragment::new(" Ana@Acme.COM ", SourceTag::Archive);
        assert_eq!(frag.email, "ana@acme.com");
    }

    #[test]
    fn thread_status_precedence() {
        let mut thread = ConversationThread {
            thread_id: "t1".into(),
            participants: BTreeSet::new(),
            email_count: 2,
            start_date: None,
            last_date: None,
            aggregated_signals: BTreeSet::new(),
        };
        assert_eq!(thread.status(), ThreadStatus::Unknown);

        thread.aggregated_signals.insert(Signal::HiddenReferral);
        assert_eq!(thread.status(), ThreadStatus::HiddenOpportunity);

        thread.aggregated_signals.insert(Signal::JdShared);
        assert_eq!(thread.status(), ThreadStatus::ActiveButNotClosed);

        thread.aggregated_signals.insert(Signal::ReconnectLater);
        assert_eq!(thread.status(), ThreadStatus::Stalled);
    }
}
