//! Keyword-driven signal detection.
//!
//! Two independently configurable families are checked against a
//! message's subject + body, case-insensitively:
//! - middle-funnel: stalled, jd_shared, proposal_sent, negotiation,
//!   reconnect_later
//! - hidden-opportunity: inbound, referral, job_change, keep_in_touch
//!   (emitted with a `hidden_` prefix)
//!
//! Every matching family is recorded; there is no early exit on first
//! match. The per-message funnel tag (distinct from a contact's eventual
//! stage) is hidden_opportunity > middle > unknown.

use std::collections::BTreeSet;

use crate::config::SignalKeywords;
use crate::model::Signal;

/// A message-level funnel tag derived from its detected signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTag {
    HiddenOpportunity,
    Middle,
    Unknown,
}

impl MessageTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HiddenOpportunity => "hidden_opportunity",
            Self::Middle => "middle",
            Self::Unknown => "unknown",
        }
    }
}

/// One keyword family: the signal it emits and its lowercased keywords.
#[derive(Debug, Clone)]
struct KeywordFamily {
    signal: Signal,
    keywords: Vec<String>,
}

/// Keyword-set signal detector. Built once from configuration; keywords
/// are lowercased at construction so detection is a plain containment
/// check.
#[derive(Debug, Clone)]
pub struct SignalDetector {
    families: Vec<KeywordFamily>,
}

impl SignalDetector {
    pub fn from_config(keywords: &SignalKeywords) -> Self {
        fn family(signal: Signal, words: &[String]) -> KeywordFamily {
            KeywordFamily {
                signal,
                keywords: words.iter().map(|w| w.to_lowercase()).collect(),
            }
        }
        Self {
            families: vec![
                family(Signal::Stalled, &keywords.stalled),
                family(Signal::JdShared, &keywords.jd_shared),
                family(Signal::ProposalSent, &keywords.proposal_sent),
                family(Signal::Negotiation, &keywords.negotiation),
                family(Signal::ReconnectLater, &keywords.reconnect_later),
                family(Signal::HiddenInbound, &keywords.inbound),
                family(Signal::HiddenReferral, &keywords.referral),
                family(Signal::HiddenJobChange, &keywords.job_change),
                family(Signal::HiddenKeepInTouch, &keywords.keep_in_touch),
            ],
        }
    }

    /// Detect all matching signals in a message's subject + body.
    pub fn detect(&self, subject: &str, body: &str) -> BTreeSet<Signal> {
        let text = format!("{subject} {body}").to_lowercase();
        self.families
            .iter()
            .filter(|f| f.keywords.iter().any(|k| text.contains(k.as_str())))
            .map(|f| f.signal)
            .collect()
    }

    /// Per-message funnel tag from a detected signal set.
    pub fn message_tag(signals: &BTreeSet<Signal>) -> MessageTag {
        if signals.iter().any(Signal::is_hidden) {
            MessageTag::HiddenOpportunity
        } else if !signals.is_empty() {
            MessageTag::Middle
        } else {
            MessageTag::Unknown
        }
    }
}
