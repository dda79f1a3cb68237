//! CSV output tables.
//!
//! One master table, four segment views keyed by stage family, and the
//! per-thread conversation table. Files are assembled in memory and
//! written whole; a failed write names the path. Segment rows sort by
//! priority score descending with email as the stable tie-break, so
//! reruns over the same inputs produce byte-identical files.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::ExportError;
use crate::model::{Contact, ConversationThread, FunnelFamily, join_signals};

const MASTER_HEADER: &str =
    "email,name,company,title,funnel_stage,funnel_signals,fired_signal,priority_score";
const THREAD_HEADER: &str =
    "thread_id,participants,email_count,start_date,last_date,signals,status";

/// Quote a cell when it needs it; doubled quotes escape embedded ones.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn contact_row(contact: &Contact) -> String {
    let cells = [
        contact.email.as_str(),
        contact.name.as_deref().unwrap_or(""),
        contact.company.as_deref().unwrap_or(""),
        contact.title.as_deref().unwrap_or(""),
        contact.funnel_stage.as_str(),
        &join_signals(&contact.funnel_signals),
        contact.fired_signal.map(|s| s.as_str()).unwrap_or(""),
        &format!("{:.1}", contact.priority_score),
    ];
    cells.map(csv_field).join(",")
}

fn thread_row(thread: &ConversationThread) -> String {
    let participants = thread
        .participants
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("; ");
    let date = |d: Option<chrono::DateTime<chrono::Utc>>| {
        d.map(|d| d.to_rfc3339()).unwrap_or_default()
    };
    let cells = [
        thread.thread_id.as_str(),
        &participants,
        &thread.email_count.to_string(),
        &date(thread.start_date),
        &date(thread.last_date),
        &join_signals(&thread.aggregated_signals),
        thread.status().as_str(),
    ];
    cells.map(csv_field).join(",")
}

fn write_table(path: &Path, header: &str, rows: &[String]) -> Result<(), ExportError> {
    let mut text = String::with_capacity(header.len() + rows.iter().map(|r| r.len() + 1).sum::<usize>() + 1);
    text.push_str(header);
    text.push('\n');
    for row in rows {
        text.push_str(row);
        text.push('\n');
    }
    std::fs::write(path, text).map_err(|source| ExportError::Write {
        path: path.display().to_string(),
        source,
    })
}

/// Contacts ordered for export: score descending, email ascending.
fn ordered<'a>(contacts: &'a [Contact]) -> Vec<&'a Contact> {
    let mut out: Vec<&Contact> = contacts.iter().collect();
    out.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| a.email.cmp(&b.email))
    });
    out
}

/// Writes every output table under one directory.
pub struct CsvExporter {
    out_dir: PathBuf,
}

impl CsvExporter {
    /// Create the output directory if needed.
    pub fn new(out_dir: &Path) -> Result<Self, ExportError> {
        std::fs::create_dir_all(out_dir).map_err(|source| ExportError::Write {
            path: out_dir.display().to_string(),
            source,
        })?;
        Ok(Self {
            out_dir: out_dir.to_path_buf(),
        })
    }

    /// The master table: every resolved contact.
    pub fn write_master(&self, contacts: &[Contact]) -> Result<PathBuf, ExportError> {
        let rows: Vec<String> = ordered(contacts).into_iter().map(contact_row).collect();
        let path = self.out_dir.join("master_contacts.csv");
        write_table(&path, MASTER_HEADER, &rows)?;
        info!(path = %path.display(), rows = rows.len(), "master table written");
        Ok(path)
    }

    /// Segment views, one file per stage family. All four files are
    /// written even when empty so downstream consumers see a stable set.
    pub fn write_segments(&self, contacts: &[Contact]) -> Result<Vec<PathBuf>, ExportError> {
        let segments = [
            (FunnelFamily::Bottom, "bottom_funnel.csv"),
            (FunnelFamily::Middle, "middle_funnel.csv"),
            (FunnelFamily::Hidden, "hidden_opportunities.csv"),
            (FunnelFamily::Top, "top_funnel.csv"),
        ];
        let mut written = Vec::with_capacity(segments.len());
        for (family, file_name) in segments {
            let rows: Vec<String> = ordered(contacts)
                .into_iter()
                .filter(|c| c.funnel_stage.family() == family)
                .map(contact_row)
                .collect();
            let path = self.out_dir.join(file_name);
            write_table(&path, MASTER_HEADER, &rows)?;
            info!(path = %path.display(), rows = rows.len(), "segment written");
            written.push(path);
        }
        Ok(written)
    }

    /// The conversation table with derived thread status.
    pub fn write_threads(&self, threads: &[ConversationThread]) -> Result<PathBuf, ExportError> {
        let mut ordered: Vec<&ConversationThread> = threads.iter().collect();
        ordered.sort_by(|a, b| a.thread_id.cmp(&b.thread_id));
        let rows: Vec<String> = ordered.into_iter().map(thread_row).collect();
        let path = self.out_dir.join("conversations.csv");
        write_table(&path, THREAD_HEADER, &rows)?;
        info!(path = %path.display(), rows = rows.len(), "conversation table written");
        Ok(path)
    }
}
