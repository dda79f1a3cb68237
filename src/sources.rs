//! Tabular contact sources: the CRM export and the enrichment feed.
//!
//! Both are comma-separated files with a header row. Loading is
//! forgiving at row level (a row without an email is skipped with a
//! warning, a malformed cell degrades to absent) and at file level (a
//! missing file yields zero fragments plus a warning, so a run can
//! proceed on the archive alone). Only an unreadable-but-present file
//! is a hard error.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{info, warn};

use crate::config::FunnelThresholds;
use crate::error::SourceError;
use crate::model::{ClientStatus, ContactFragment, SourceTag};

/// Outcome of loading one tabular source.
#[derive(Debug, Default)]
pub struct TableLoad {
    pub fragments: Vec<ContactFragment>,
    pub rows: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

// ── CSV primitives ──────────────────────────────────────────────────

/// Split one CSV line into fields, honoring double-quoted cells and
/// doubled-quote escapes. No multi-line cells; the sources here never
/// produce them.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}

/// A parsed table: header column positions plus data rows.
struct Table {
    columns: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn parse(text: &str) -> Option<Self> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());
        let header = lines.next()?;
        let columns = split_csv_line(header)
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();
        let rows = lines.map(split_csv_line).collect();
        Some(Self { columns, rows })
    }

    /// Cell by column name; `None` when the column is absent from the
    /// header or the row is short. Blank cells also read as `None`.
    fn cell<'a>(&self, row: &'a [String], column: &str) -> Option<&'a str> {
        let index = *self.columns.get(column)?;
        let value = row.get(index)?.trim();
        (!value.is_empty()).then_some(value)
    }

    fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }
}

// ── Cell parsers ────────────────────────────────────────────────────

/// Accept RFC 3339 timestamps or bare `YYYY-MM-DD` dates.
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Recency-derived status used when a CRM export predates the status
/// column.
fn derive_status(
    last_contact: DateTime<Utc>,
    thresholds: &FunnelThresholds,
    now: DateTime<Utc>,
) -> ClientStatus {
    let days = (now - last_contact).num_days();
    if days <= thresholds.active_days {
        ClientStatus::Active
    } else if days <= thresholds.dormant_max_days {
        ClientStatus::DormantWarm
    } else {
        ClientStatus::DormantCold
    }
}

fn read_table(path: &Path, table_name: &str) -> Result<Option<Table>, SourceError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(SourceError::Read {
                table: table_name.into(),
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }
    };
    Ok(Table::parse(&text))
}

// ── Loaders ─────────────────────────────────────────────────────────

/// Load the CRM export. When the file carries no `client_status` column
/// (or a row's cell is blank/unknown) the status is derived from
/// `last_contact_date` against the configured day thresholds.
pub fn load_crm_export(
    path: &Path,
    thresholds: &FunnelThresholds,
    now: DateTime<Utc>,
) -> Result<TableLoad, SourceError> {
    let mut load = TableLoad::default();

    let Some(table) = read_table(path, "crm")? else {
        let msg = format!("crm export not found at {}, continuing without it", path.display());
        warn!("{msg}");
        load.warnings.push(msg);
        return Ok(load);
    };

    for expected in [
        "name",
        "company",
        "title",
        "linkedin_url",
        "client_status",
        "client_value_score",
        "last_contact_date",
    ] {
        if !table.has_column(expected) {
            let msg = format!("crm export is missing column '{expected}'");
            warn!("{msg}");
            load.warnings.push(msg);
        }
    }

    for row in &table.rows {
        load.rows += 1;
        let Some(email) = table.cell(row, "email") else {
            load.skipped += 1;
            continue;
        };

        let mut fragment = ContactFragment::new(email, SourceTag::Crm);
        fragment.name = table.cell(row, "name").map(str::to_string);
        fragment.company = table.cell(row, "company").map(str::to_string);
        fragment.title = table.cell(row, "title").map(str::to_string);
        fragment.linkedin_url = table.cell(row, "linkedin_url").map(str::to_string);
        fragment.client_value_score = table
            .cell(row, "client_value_score")
            .and_then(|v| v.parse::<f64>().ok());
        fragment.last_contact_date = table.cell(row, "last_contact_date").and_then(parse_date);

        fragment.client_status = table
            .cell(row, "client_status")
            .and_then(ClientStatus::parse)
            .or_else(|| {
                fragment
                    .last_contact_date
                    .map(|last| derive_status(last, thresholds, now))
            });

        load.fragments.push(fragment);
    }

    info!(
        rows = load.rows,
        fragments = load.fragments.len(),
        skipped = load.skipped,
        "crm export loaded"
    );
    Ok(load)
}

/// Load the enrichment feed: current company/title, LinkedIn URL and
/// the job-change flag.
pub fn load_enrichment_feed(path: &Path) -> Result<TableLoad, SourceError> {
    let mut load = TableLoad::default();

    let Some(table) = read_table(path, "enrichment")? else {
        let msg = format!(
            "enrichment feed not found at {}, continuing without it",
            path.display()
        );
        warn!("{msg}");
        load.warnings.push(msg);
        return Ok(load);
    };

    for expected in [
        "current_company",
        "current_title",
        "linkedin_url",
        "job_change_detected",
    ] {
        if !table.has_column(expected) {
            let msg = format!("enrichment feed is missing column '{expected}'");
            warn!("{msg}");
            load.warnings.push(msg);
        }
    }

    for row in &table.rows {
        load.rows += 1;
        let Some(email) = table.cell(row, "email") else {
            load.skipped += 1;
            continue;
        };

        let mut fragment = ContactFragment::new(email, SourceTag::Enrichment);
        fragment.company = table.cell(row, "current_company").map(str::to_string);
        fragment.title = table.cell(row, "current_title").map(str::to_string);
        fragment.linkedin_url = table.cell(row, "linkedin_url").map(str::to_string);
        fragment.job_change_detected = table
            .cell(row, "job_change_detected")
            .is_some_and(parse_flag);

        load.fragments.push(fragment);
    }

    info!(
        rows = load.rows,
        fragments = load.fragments.len(),
        skipped = load.skipped,
        "enrichment feed loaded"
    );
    Ok(load)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn split_csv_line_handles_quotes_and_escapes() {
        assert_eq!(split_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(
            split_csv_line(r#"a,"b, with comma",c"#),
            vec!["a", "b, with comma", "c"]
        );
        assert_eq!(split_csv_line(r#""say ""hi""",x"#), vec![r#"say "hi""#, "x"]);
        assert_eq!(split_csv_line("a,,c"), vec!["a", "", "c"]);
    }

    #[test]
    fn crm_rows_become_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "crm.csv",
            "email,name,company,title,linkedin_url,client_status,client_value_score,last_contact_date\n\
             Ana@Acme.com,Ana Person,\"Acme, Inc\",Director,https://linkedin.com/in/ana,active,88,2025-05-20\n",
        );
        let load = load_crm_export(&path, &FunnelThresholds::default(), fixed_now()).unwrap();
        assert_eq!(load.fragments.len(), 1);
        let f = &load.fragments[0];
        assert_eq!(f.email, "ana@acme.com");
        assert_eq!(f.company.as_deref(), Some("Acme, Inc"));
        assert_eq!(f.client_status, Some(ClientStatus::Active));
        assert_eq!(f.client_value_score, Some(88.0));
        assert!(f.last_contact_date.is_some());
    }

    #[test]
    fn crm_row_without_email_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "crm.csv",
            "email,name\n,No Email\nb@x.com,Has Email\n",
        );
        let load = load_crm_export(&path, &FunnelThresholds::default(), fixed_now()).unwrap();
        assert_eq!(load.rows, 2);
        assert_eq!(load.skipped, 1);
        assert_eq!(load.fragments.len(), 1);
    }

    #[test]
    fn crm_status_derived_from_last_contact_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "crm.csv",
            "email,last_contact_date\n\
             recent@x.com,2025-05-01\n\
             warm@x.com,2024-09-01\n\
             cold@x.com,2022-01-01\n",
        );
        let load = load_crm_export(&path, &FunnelThresholds::default(), fixed_now()).unwrap();
        let by_email = |email: &str| {
            load.fragments
                .iter()
                .find(|f| f.email == email)
                .unwrap()
                .client_status
        };
        assert_eq!(by_email("recent@x.com"), Some(ClientStatus::Active));
        assert_eq!(by_email("warm@x.com"), Some(ClientStatus::DormantWarm));
        assert_eq!(by_email("cold@x.com"), Some(ClientStatus::DormantCold));
        assert!(load.warnings.iter().any(|w| w.contains("client_status")));
    }

    #[test]
    fn crm_unknown_status_string_falls_back_to_derivation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "crm.csv",
            "email,client_status,last_contact_date\na@x.com,prospect,2025-05-25\n",
        );
        let load = load_crm_export(&path, &FunnelThresholds::default(), fixed_now()).unwrap();
        assert_eq!(load.fragments[0].client_status, Some(ClientStatus::Active));
    }

    #[test]
    fn every_absent_crm_column_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "crm.csv", "email\na@x.com\n");
        let load = load_crm_export(&path, &FunnelThresholds::default(), fixed_now()).unwrap();
        for column in [
            "name",
            "company",
            "title",
            "linkedin_url",
            "client_status",
            "client_value_score",
            "last_contact_date",
        ] {
            assert!(
                load.warnings.iter().any(|w| w.contains(column)),
                "no warning for {column}"
            );
        }
    }

    #[test]
    fn every_absent_enrichment_column_warns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "feed.csv", "email\na@x.com\n");
        let load = load_enrichment_feed(&path).unwrap();
        for column in [
            "current_company",
            "current_title",
            "linkedin_url",
            "job_change_detected",
        ] {
            assert!(
                load.warnings.iter().any(|w| w.contains(column)),
                "no warning for {column}"
            );
        }
    }

    #[test]
    fn missing_crm_file_is_a_warning_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let load = load_crm_export(
            &dir.path().join("absent.csv"),
            &FunnelThresholds::default(),
            fixed_now(),
        )
        .unwrap();
        assert!(load.fragments.is_empty());
        assert_eq!(load.warnings.len(), 1);
        assert!(load.warnings[0].contains("not found"));
    }

    #[test]
    fn enrichment_rows_become_fragments() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "feed.csv",
            "email,current_company,current_title,linkedin_url,job_change_detected\n\
             ana@acme.com,Hooli,VP Engineering,https://linkedin.com/in/ana,true\n\
             bob@x.com,Initech,Analyst,,no\n",
        );
        let load = load_enrichment_feed(&path).unwrap();
        assert_eq!(load.fragments.len(), 2);
        assert_eq!(load.fragments[0].company.as_deref(), Some("Hooli"));
        assert!(load.fragments[0].job_change_detected);
        assert!(!load.fragments[1].job_change_detected);
        assert_eq!(load.fragments[1].linkedin_url, None);
    }

    #[test]
    fn enrichment_flag_accepts_numeric_and_yes() {
        assert!(parse_flag("1"));
        assert!(parse_flag("Yes"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("maybe"));
    }

    #[test]
    fn date_cell_accepts_rfc3339_and_bare_date() {
        assert!(parse_date("2025-05-20T10:30:00Z").is_some());
        assert!(parse_date("2025-05-20").is_some());
        assert!(parse_date("05/20/2025").is_none());
    }

    #[test]
    fn unreadable_directory_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_crm_export(dir.path(), &FunnelThresholds::default(), fixed_now());
        assert!(err.is_err());
    }
}
