//! Company and role mention extraction.
//!
//! A small fixed pattern family, not NLP: legal-suffix company names,
//! prepositional "at X" / "for X" mentions, and a seniority/function
//! role vocabulary. Results are deduplicated sets per message.

use std::collections::BTreeSet;

use regex::Regex;

/// Compiled extraction patterns. Built once per extractor.
#[derive(Debug)]
pub struct EntityPatterns {
    company: Vec<Regex>,
    role: Regex,
}

impl EntityPatterns {
    pub fn new() -> Self {
        let company = vec![
            // "Acme Technologies", "Globex Inc": legal/descriptive suffix
            Regex::new(
                r"\b([A-Z][A-Za-z0-9 &]+(?:Inc|LLC|Ltd|Corp|Corporation|Company|Technologies|Systems|Solutions|Services|Group))\b",
            )
            .unwrap(),
            // "at Hooli", "for Initech"
            Regex::new(r"\bat ([A-Z][A-Za-z0-9&][A-Za-z0-9 &]{1,29})\b").unwrap(),
            Regex::new(r"\bfor ([A-Z][A-Za-z0-9&][A-Za-z0-9 &]{1,29})\b").unwrap(),
        ];

        let role = Regex::new(
            r"(?i)\b((?:senior |junior |lead )?(?:engineer|developer|manager|director|analyst|designer|architect|consultant|specialist|coordinator|administrator|officer|executive|recruiter|vp|cto|ceo|cfo|coo|head of [a-z]+))\b",
        )
        .unwrap();

        Self { company, role }
    }

    /// Extract deduplicated company mentions. Matches of three or fewer
    /// characters are discarded as noise.
    pub fn companies(&self, text: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        for pattern in &self.company {
            for caps in pattern.captures_iter(text) {
                if let Some(m) = caps.get(1) {
                    let name = m.as_str().trim();
                    if name.len() > 3 {
                        found.insert(name.to_string());
                    }
                }
            }
        }
        found
    }

    /// Extract deduplicated role mentions, lowercased.
    pub fn roles(&self, text: &str) -> BTreeSet<String> {
        self.role
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_lowercase())
            .collect()
    }
}

impl Default for EntityPatterns {
    fn default() -> Self {
        Self::new()
    }
}
