//! The staged run: ingest, resolve, classify, score, export.
//!
//! Every stage hands an explicit value to the next; nothing is shared
//! mutably across stages. The three providers load concurrently on
//! blocking worker threads and join before resolution, so the resolver
//! always sees the complete fragment set.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::Utc;
use tokio::task;
use tracing::info;

use crate::archive::MailArchiveExtractor;
use crate::classify::FunnelClassifier;
use crate::config::EngineConfig;
use crate::error::{ExportError, Result};
use crate::export::CsvExporter;
use crate::score::PriorityScorer;
use crate::{resolve, sources};

/// Input locations for one run.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub mbox: PathBuf,
    pub crm: PathBuf,
    pub enrichment: Option<PathBuf>,
    pub out_dir: PathBuf,
}

/// Counters and diagnostics accumulated across a run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub messages_parsed: usize,
    pub messages_skipped: usize,
    pub archive_fragments: usize,
    pub crm_fragments: usize,
    pub enrichment_fragments: usize,
    pub contacts_resolved: usize,
    pub threads: usize,
    pub stage_counts: BTreeMap<&'static str, usize>,
    pub warnings: Vec<String>,
}

impl RunReport {
    /// Human-readable run summary, printed at the end of a CLI run.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Funnel run complete");
        let _ = writeln!(
            out,
            "  messages parsed: {} ({} skipped)",
            self.messages_parsed, self.messages_skipped
        );
        let _ = writeln!(
            out,
            "  fragments: archive {}, crm {}, enrichment {}",
            self.archive_fragments, self.crm_fragments, self.enrichment_fragments
        );
        let _ = writeln!(out, "  contacts resolved: {}", self.contacts_resolved);
        let _ = writeln!(out, "  conversation threads: {}", self.threads);
        let _ = writeln!(out, "  stages:");
        for (stage, count) in &self.stage_counts {
            let _ = writeln!(out, "    {stage}: {count}");
        }
        if !self.warnings.is_empty() {
            let _ = writeln!(out, "  warnings:");
            for warning in &self.warnings {
                let _ = writeln!(out, "    - {warning}");
            }
        }
        out
    }
}

/// Execute a full run. Configuration is validated before any input is
/// touched; provider loads run concurrently and join before resolution.
pub async fn run(config: EngineConfig, inputs: PipelineInputs) -> Result<RunReport> {
    config.validate()?;
    let now = Utc::now();

    let archive_task = {
        let config = config.clone();
        let path = inputs.mbox.clone();
        task::spawn_blocking(move || MailArchiveExtractor::new(&config).scan(&path))
    };
    let crm_task = {
        let thresholds = config.thresholds.clone();
        let path = inputs.crm.clone();
        task::spawn_blocking(move || sources::load_crm_export(&path, &thresholds, now))
    };
    let enrichment_task = {
        let path = inputs.enrichment.clone();
        task::spawn_blocking(move || match path {
            Some(path) => sources::load_enrichment_feed(&path).map(Some),
            None => Ok(None),
        })
    };

    // Resolution barrier: all three providers must land first.
    let (archive, crm, enrichment) = tokio::join!(archive_task, crm_task, enrichment_task);
    let scan = archive??;
    let crm = crm??;
    let enrichment = enrichment??.unwrap_or_default();

    let mut report = RunReport {
        messages_parsed: scan.parsed,
        messages_skipped: scan.skipped,
        archive_fragments: scan.fragments.len(),
        crm_fragments: crm.fragments.len(),
        enrichment_fragments: enrichment.fragments.len(),
        threads: scan.threads.len(),
        ..RunReport::default()
    };
    report.warnings.extend(crm.warnings);
    report.warnings.extend(enrichment.warnings);

    let mut fragments = scan.fragments;
    fragments.extend(crm.fragments);
    fragments.extend(enrichment.fragments);

    let mut contacts = resolve::resolve(fragments);
    report.contacts_resolved = contacts.len();

    let classifier = FunnelClassifier::new();
    let scorer = PriorityScorer::new(config.weights.clone(), now);
    for contact in &mut contacts {
        classifier.apply(contact);
        scorer.apply(contact);
        *report.stage_counts.entry(contact.funnel_stage.as_str()).or_insert(0) += 1;
    }

    let exporter = CsvExporter::new(&inputs.out_dir)?;
    exporter.write_master(&contacts)?;
    exporter.write_segments(&contacts)?;
    exporter.write_threads(&scan.threads)?;

    // The summary lands next to the tables as well as on stdout.
    let report_path = inputs.out_dir.join("run_report.txt");
    std::fs::write(&report_path, report.render()).map_err(|source| ExportError::Write {
        path: report_path.display().to_string(),
        source,
    })?;

    info!(
        contacts = report.contacts_resolved,
        threads = report.threads,
        out_dir = %inputs.out_dir.display(),
        "run complete"
    );
    Ok(report)
}
