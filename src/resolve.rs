//! Contact resolution: many noisy fragments in, one contact per person
//! out.
//!
//! The sole join key is the normalized email. Within a group the single
//! most complete fragment wins outright: whole-record selection, not
//! field-level merging. Fields present only on losing fragments are
//! discarded by contract; only the signal sets union across the group.
//!
//! Ties on completeness break by the fixed provider ingestion order
//! (archive, then CRM, then enrichment) and then first occurrence, which
//! makes resolution deterministic under any input reordering.

use std::collections::BTreeMap;

use tracing::debug;

use crate::model::{Contact, ContactFragment, FunnelStage, normalize_email};

/// Group accumulator owned by the resolution stage.
#[derive(Debug)]
struct Group {
    winner: ContactFragment,
    signals: std::collections::BTreeSet<crate::model::Signal>,
    fragment_count: usize,
}

/// Resolve fragments from all providers into exactly one contact per
/// normalized email.
///
/// Callers pass fragments in any order; the provider tag on each
/// fragment carries the tie-break order, so the outcome does not depend
/// on iteration order.
pub fn resolve(fragments: Vec<ContactFragment>) -> Vec<Contact> {
    let mut groups: BTreeMap<String, Group> = BTreeMap::new();

    for mut fragment in fragments {
        fragment.email = normalize_email(&fragment.email);
        if fragment.email.is_empty() {
            continue;
        }
        let key = fragment.email.clone();
        match groups.get_mut(&key) {
            None => {
                let signals = fragment.signals.clone();
                groups.insert(
                    key,
                    Group {
                        winner: fragment,
                        signals,
                        fragment_count: 1,
                    },
                );
            }
            Some(group) => {
                group.signals.extend(fragment.signals.iter());
                group.fragment_count += 1;
                if beats(&fragment, &group.winner) {
                    group.winner = fragment;
                }
            }
        }
    }

    debug!(contacts = groups.len(), "resolution complete");

    groups
        .into_values()
        .map(|group| {
            let f = group.winner;
            Contact {
                email: f.email,
                name: f.name,
                company: f.company,
                title: f.title,
                linkedin_url: f.linkedin_url,
                client_status: f.client_status,
                client_value_score: f.client_value_score,
                engagement_ratio: f.engagement_ratio,
                last_contact_date: f.last_contact_date,
                job_change_detected: f.job_change_detected,
                funnel_signals: group.signals,
                // Placeholder until the classifier runs; classification
                // is total, so every contact is re-staged.
                funnel_stage: FunnelStage::TopCold,
                fired_signal: None,
                priority_score: 0.0,
            }
        })
        .collect()
}

/// Whether `challenger` replaces the current winner: strictly higher
/// completeness, or equal completeness from a strictly earlier provider.
/// Equal completeness from the same provider keeps the incumbent
/// (first occurrence wins).
fn beats(challenger: &ContactFragment, incumbent: &ContactFragment) -> bool {
    let (c, i) = (challenger.completeness(), incumbent.completeness());
    c > i || (c == i && challenger.source < incumbent.source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Signal, SourceTag};

    fn fragment(email: &str, source: SourceTag) -> ContactFragment {
        ContactFragment::new(email, source)
    }

    #[test]
    fn one_contact_per_normalized_email() {
        let contacts = resolve(vec![
            fragment(" A@X.com ", SourceTag::Archive),
            fragment("a@x.com", SourceTag::Crm),
            fragment("b@y.com", SourceTag::Crm),
        ]);
        assert_eq!(contacts.len(), 2);
        assert!(contacts.iter().any(|c| c.email == "a@x.com"));
        assert!(contacts.iter().any(|c| c.email == "b@y.com"));
    }

    #[test]
    fn most_complete_fragment_wins() {
        // Scenario C: fragment1 {email,name} vs fragment2 {email,name,company,title}
        let mut f1 = fragment("a@x.com", SourceTag::Archive);
        f1.name = Some("A. Person".into());
        let mut f2 = fragment("a@x.com", SourceTag::Crm);
        f2.name = Some("Ana Person".into());
        f2.company = Some("Acme Inc".into());
        f2.title = Some("Director".into());

        let contacts = resolve(vec![f1.clone(), f2.clone()]);
        assert_eq!(contacts[0].name.as_deref(), Some("Ana Person"));
        assert_eq!(contacts[0].company.as_deref(), Some("Acme Inc"));

        // Same winner regardless of ingestion order.
        let reversed = resolve(vec![f2, f1]);
        assert_eq!(reversed[0].name.as_deref(), Some("Ana Person"));
        assert_eq!(reversed[0].company.as_deref(), Some("Acme Inc"));
    }

    #[test]
    fn completeness_tie_breaks_by_provider_order() {
        let mut archive = fragment("a@x.com", SourceTag::Archive);
        archive.name = Some("From Mail".into());
        let mut enrichment = fragment("a@x.com", SourceTag::Enrichment);
        enrichment.name = Some("From Feed".into());

        // Same completeness either way round: archive provider wins.
        let contacts = resolve(vec![enrichment.clone(), archive.clone()]);
        assert_eq!(contacts[0].name.as_deref(), Some("From Mail"));
        let contacts = resolve(vec![archive, enrichment]);
        assert_eq!(contacts[0].name.as_deref(), Some("From Mail"));
    }

    #[test]
    fn losing_fragment_fields_are_discarded() {
        // Whole-record selection: the loser's LinkedIn URL is lost.
        let mut loser = fragment("a@x.com", SourceTag::Enrichment);
        loser.linkedin_url = Some("https://linkedin.com/in/ana".into());
        let mut winner = fragment("a@x.com", SourceTag::Crm);
        winner.name = Some("Ana".into());
        winner.company = Some("Acme".into());

        let contacts = resolve(vec![loser, winner]);
        assert_eq!(contacts[0].linkedin_url, None);
        assert_eq!(contacts[0].name.as_deref(), Some("Ana"));
    }

    #[test]
    fn signals_union_across_all_fragments() {
        let mut loser = fragment("a@x.com", SourceTag::Archive);
        loser.signals.insert(Signal::Stalled);
        let mut winner = fragment("a@x.com", SourceTag::Crm);
        winner.name = Some("Ana".into());
        winner.signals.insert(Signal::HiddenReferral);

        let contacts = resolve(vec![loser, winner]);
        assert!(contacts[0].funnel_signals.contains(&Signal::Stalled));
        assert!(contacts[0].funnel_signals.contains(&Signal::HiddenReferral));
    }

    #[test]
    fn empty_email_fragments_dropped() {
        let contacts = resolve(vec![fragment("   ", SourceTag::Crm)]);
        assert!(contacts.is_empty());
    }

    #[test]
    fn resolution_deterministic_under_reordering() {
        let mut a = fragment("a@x.com", SourceTag::Archive);
        a.name = Some("Mail Ana".into());
        a.signals.insert(Signal::ProposalSent);
        let mut b = fragment("a@x.com", SourceTag::Crm);
        b.name = Some("CRM Ana".into());
        b.company = Some("Acme".into());
        let mut c = fragment("a@x.com", SourceTag::Enrichment);
        c.job_change_detected = true;

        let forward = resolve(vec![a.clone(), b.clone(), c.clone()]);
        let backward = resolve(vec![c, b, a]);
        assert_eq!(forward[0].name, backward[0].name);
        assert_eq!(forward[0].company, backward[0].company);
        assert_eq!(forward[0].funnel_signals, backward[0].funnel_signals);
    }
}
