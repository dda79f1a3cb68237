//! Mail archive extraction.
//!
//! Scans a concatenated-messages mailbox file (sequential RFC 2822
//! messages, each preceded by a `From ` envelope separator), parses each
//! message with `mail-parser`, and incrementally builds per-contact
//! fragments and per-thread aggregates. A malformed message is logged
//! and skipped; it never aborts the scan.
//!
//! Thread identity is the In-Reply-To header when present, else the
//! message's own id. Replies therefore chain to their immediate parent
//! only, an accepted approximation in the absence of full threading
//! metadata.

pub mod patterns;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use mail_parser::MessageParser;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::ArchiveError;
use crate::model::{
    ContactFragment, ConversationThread, Direction, RawMessage, Signal, SourceTag, normalize_email,
};
use crate::signals::SignalDetector;
use patterns::EntityPatterns;

/// Result of one archive scan: contact fragments, thread aggregates, and
/// scan counters. The per-message records themselves are consumed into
/// the accumulators and not retained.
#[derive(Debug)]
pub struct ArchiveScan {
    pub fragments: Vec<ContactFragment>,
    pub threads: Vec<ConversationThread>,
    pub parsed: usize,
    pub skipped: usize,
}

/// Per-contact accumulator, keyed by normalized email during the scan.
#[derive(Debug, Default)]
struct ContactAccum {
    name: Option<String>,
    companies: BTreeSet<String>,
    roles: BTreeSet<String>,
    last_contact: Option<DateTime<Utc>>,
    total_emails: usize,
    inbound_count: usize,
    signals: BTreeSet<Signal>,
}

/// Per-thread accumulator, keyed by thread id during the scan.
#[derive(Debug, Default)]
struct ThreadAccum {
    participants: BTreeSet<String>,
    email_count: usize,
    start_date: Option<DateTime<Utc>>,
    last_date: Option<DateTime<Utc>>,
    signals: BTreeSet<Signal>,
}

/// Mailbox extractor: header parsing, body cleanup, direction detection,
/// entity extraction, and signal detection per message.
pub struct MailArchiveExtractor {
    detector: SignalDetector,
    patterns: EntityPatterns,
    owned_domains: Vec<String>,
}

impl MailArchiveExtractor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            detector: SignalDetector::from_config(&config.keywords),
            patterns: EntityPatterns::new(),
            owned_domains: config
                .owned_domains
                .iter()
                .map(|d| d.to_lowercase())
                .collect(),
        }
    }

    /// Scan an archive file into fragments and thread aggregates.
    pub fn scan(&self, path: &Path) -> Result<ArchiveScan, ArchiveError> {
        let bytes = std::fs::read(path).map_err(|e| ArchiveError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        // Undecodable byte runs degrade to replacement characters rather
        // than failing the whole archive.
        let content = String::from_utf8_lossy(&bytes);

        let mut contacts: BTreeMap<String, ContactAccum> = BTreeMap::new();
        let mut threads: BTreeMap<String, ThreadAccum> = BTreeMap::new();
        let mut parsed = 0usize;
        let mut skipped = 0usize;

        for (index, chunk) in split_envelope(&content).into_iter().enumerate() {
            match self.parse_message(&chunk, index) {
                Ok(message) => {
                    parsed += 1;
                    accumulate_contact(&mut contacts, &message);
                    accumulate_thread(&mut threads, &message);
                    if parsed % 100 == 0 {
                        debug!(parsed, "archive scan progress");
                    }
                }
                Err(e) => {
                    skipped += 1;
                    warn!(index, error = %e, "skipping malformed message");
                }
            }
        }

        debug!(parsed, skipped, "archive scan complete");

        let fragments = contacts
            .into_iter()
            .map(|(email, accum)| finish_fragment(email, accum))
            .collect();
        let threads = threads
            .into_iter()
            .map(|(thread_id, accum)| ConversationThread {
                thread_id,
                participants: accum.participants,
                email_count: accum.email_count,
                start_date: accum.start_date,
                last_date: accum.last_date,
                aggregated_signals: accum.signals,
            })
            .collect();

        Ok(ArchiveScan {
            fragments,
            threads,
            parsed,
            skipped,
        })
    }

    /// Parse a single raw RFC 2822 message into a `RawMessage`.
    pub fn parse_message(&self, raw: &str, index: usize) -> Result<RawMessage, ArchiveError> {
        let parsed =
            MessageParser::default()
                .parse(raw.as_bytes())
                .ok_or(ArchiveError::Message {
                    index,
                    reason: "not parseable as an RFC 2822 message".into(),
                })?;

        let from_address = parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.address())
            .map(normalize_email)
            .ok_or_else(|| ArchiveError::Message {
                index,
                reason: "missing From address".into(),
            })?;
        let from_name = parsed
            .from()
            .and_then(|addr| addr.first())
            .and_then(|a| a.name())
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let id = parsed
            .message_id()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("gen-{}", Uuid::new_v4()));
        let thread_id = parsed
            .in_reply_to()
            .as_text()
            .map(|s| s.to_string())
            .unwrap_or_else(|| id.clone());

        let subject = parsed.subject().unwrap_or("").to_string();
        let to_addresses = address_list(parsed.to());
        let cc_addresses = address_list(parsed.cc());
        let timestamp = parsed.date().and_then(header_datetime);

        let body_raw = parsed
            .body_text(0)
            .map(|t| t.to_string())
            .or_else(|| parsed.body_html(0).map(|h| strip_html(h.as_ref())))
            .unwrap_or_default();
        let body_text = collapse_whitespace(strip_signature(&body_raw));

        let direction = self.direction(&from_address);

        let mention_text = format!("{body_text} {subject}");
        let extracted_companies = self.patterns.companies(&mention_text);
        let extracted_roles = self.patterns.roles(&mention_text);
        let detected_signals = self.detector.detect(&subject, &body_text);

        Ok(RawMessage {
            id,
            thread_id,
            subject,
            from_address,
            from_name,
            to_addresses,
            cc_addresses,
            timestamp,
            body_text,
            direction,
            extracted_companies,
            extracted_roles,
            detected_signals,
        })
    }

    /// Outbound iff the sender's domain is one of the owned domains.
    fn direction(&self, from_email: &str) -> Direction {
        let domain = from_email.split_once('@').map(|(_, d)| d).unwrap_or("");
        if self.owned_domains.iter().any(|d| domain.contains(d.as_str())) {
            Direction::Outbound
        } else {
            Direction::Inbound
        }
    }
}

/// Split mailbox content on `From ` envelope separator lines.
///
/// Content before the first separator (or the whole file when there is
/// none) is treated as a single message.
fn split_envelope(content: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in content.lines() {
        if line.starts_with("From ") {
            if !current.is_empty() {
                chunks.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        chunks.push(current.join("\n"));
    }
    chunks
}

/// Truncate everything after a signature separator: a line consisting
/// solely of `--` (trailing whitespace allowed).
fn strip_signature(text: &str) -> &str {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);
        if content.starts_with("--") && content.trim_end() == "--" {
            return &text[..offset];
        }
        offset += line.len();
    }
    text
}

/// Collapse runs of whitespace into single spaces and trim.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip HTML tags from content (basic), normalizing whitespace.
fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result
}

/// Normalized addresses from a To/Cc header.
fn address_list(addr: Option<&mail_parser::Address<'_>>) -> Vec<String> {
    addr.map(|a| {
        a.iter()
            .filter_map(|x| x.address())
            .map(normalize_email)
            .collect()
    })
    .unwrap_or_default()
}

/// Convert a parsed header date into a UTC timestamp.
fn header_datetime(d: &mail_parser::DateTime) -> Option<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(i32::from(d.year), u32::from(d.month), u32::from(d.day))
        .and_then(|date| {
            date.and_hms_opt(
                u32::from(d.hour),
                u32::from(d.minute),
                u32::from(d.second),
            )
        })
        .map(|naive| naive.and_utc())
}

/// Fold one message into the per-contact accumulator map.
///
/// The sender's fragment absorbs the message's signal set; recipients
/// share the company/role mentions and date bookkeeping only, matching
/// the original attribution of signals to the From address.
fn accumulate_contact(contacts: &mut BTreeMap<String, ContactAccum>, message: &RawMessage) {
    update_contact(
        contacts,
        &message.from_address,
        message.from_name.clone(),
        message,
        message.direction == Direction::Inbound,
        true,
    );
    for recipient in message.to_addresses.iter().chain(&message.cc_addresses) {
        update_contact(
            contacts,
            recipient,
            None,
            message,
            message.direction == Direction::Outbound,
            false,
        );
    }
}

fn update_contact(
    contacts: &mut BTreeMap<String, ContactAccum>,
    email: &str,
    name: Option<String>,
    message: &RawMessage,
    counts_inbound: bool,
    is_sender: bool,
) {
    if email.is_empty() {
        return;
    }
    let accum = contacts.entry(email.to_string()).or_default();

    if accum.name.is_none() {
        accum.name = name;
    }
    accum
        .companies
        .extend(message.extracted_companies.iter().cloned());
    accum.roles.extend(message.extracted_roles.iter().cloned());
    accum.total_emails += 1;
    if counts_inbound {
        accum.inbound_count += 1;
    }
    if is_sender {
        accum.signals.extend(message.detected_signals.iter());
    }
    if let Some(ts) = message.timestamp
        && accum.last_contact.is_none_or(|last| ts > last)
    {
        accum.last_contact = Some(ts);
    }
}

/// Fold one message into the per-thread accumulator map.
fn accumulate_thread(threads: &mut BTreeMap<String, ThreadAccum>, message: &RawMessage) {
    let accum = threads.entry(message.thread_id.clone()).or_default();
    accum.participants.insert(message.from_address.clone());
    accum
        .participants
        .extend(message.to_addresses.iter().cloned());
    accum
        .participants
        .extend(message.cc_addresses.iter().cloned());
    accum.email_count += 1;
    accum.signals.extend(message.detected_signals.iter());
    if let Some(ts) = message.timestamp {
        if accum.start_date.is_none_or(|start| ts < start) {
            accum.start_date = Some(ts);
        }
        if accum.last_date.is_none_or(|last| ts > last) {
            accum.last_date = Some(ts);
        }
    }
}

/// Project a finished accumulator into an archive-source fragment.
fn finish_fragment(email: String, accum: ContactAccum) -> ContactFragment {
    let engagement = accum.inbound_count as f64 / accum.total_emails.max(1) as f64;
    let mut fragment = ContactFragment::new(&email, SourceTag::Archive);
    fragment.name = accum.name;
    fragment.company = accum.companies.first().cloned();
    fragment.title = accum.roles.first().cloned();
    fragment.engagement_ratio = Some(engagement);
    fragment.last_contact_date = accum.last_contact;
    fragment.signals = accum.signals;
    fragment
}
