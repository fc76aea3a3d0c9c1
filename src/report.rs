//! Report sink: console text and the JSON verdict report.
//!
//! Rendering only reads verdicts; nothing here changes a record.
use crate::detect::TriggerKind;
use crate::pipeline::{DetectionReport, TraceVerdicts};
use crate::verdict::{Outcome, VerdictRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use sha2::Digest;
use std::fs;
use std::path::Path;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// JSON document written by `check --json` / `--out`.
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub schema_version: u32,
    pub tool_version: &'static str,
    pub app: &'a str,
    pub trace: String,
    /// SHA-256 of the serialized records; equal digests mean identical verdicts.
    pub records_sha256: String,
    #[serde(flatten)]
    pub verdicts: &'a TraceVerdicts,
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub fn records_digest(records: &[VerdictRecord]) -> Result<String> {
    let bytes = serde_json::to_vec(records).context("serialize verdict records")?;
    Ok(sha256_hex(&bytes))
}

/// Path relative to `base` when it lies below it.
pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn build_report<'a>(
    app: &'a str,
    trace_path: &Path,
    trace_root: &Path,
    verdicts: &'a TraceVerdicts,
) -> Result<Report<'a>> {
    Ok(Report {
        schema_version: REPORT_SCHEMA_VERSION,
        tool_version: env!("CARGO_PKG_VERSION"),
        app,
        trace: display_path(trace_path, Some(trace_root)),
        records_sha256: records_digest(&verdicts.records)?,
        verdicts,
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(value).context("serialize report")?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("write {}", path.display()))
}

fn outcome_label(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Passed => "PASS",
        Outcome::Failed => "FAIL",
        Outcome::Inconclusive => "INCONCLUSIVE",
    }
}

fn record_line(record: &VerdictRecord) -> String {
    let scores = record
        .scores
        .iter()
        .map(|(name, value)| format!("{name}={value:.3}"))
        .collect::<Vec<_>>()
        .join(" ");
    let mut line = format!(
        "  step {:<4} {:<20} {:<12}",
        record.trigger_index,
        record.metric.as_str(),
        outcome_label(record.outcome)
    );
    if !scores.is_empty() {
        line.push_str(&format!(" {scores}"));
    }
    if let Some(screen) = &record.screen {
        line.push_str(&format!("  [{screen}]"));
    }
    line
}

/// Console rendering of a trace evaluation.
pub fn render_text(app: &str, verdicts: &TraceVerdicts) -> String {
    let summary = &verdicts.summary;
    let mut out = format!(
        "{app} run {}: {} trigger(s), {} passed, {} failed, {} inconclusive\n",
        verdicts.run_id,
        summary.totals.triggers,
        summary.totals.passed,
        summary.totals.failed,
        summary.totals.inconclusive
    );

    for (kind, counts) in &summary.by_kind {
        out.push('\n');
        if counts.triggers == 0 {
            out.push_str(&format!("{kind}: not detected\n"));
            continue;
        }
        out.push_str(&format!(
            "{kind}: {} trigger(s), {} passed, {} failed, {} inconclusive\n",
            counts.triggers, counts.passed, counts.failed, counts.inconclusive
        ));
        for record in verdicts.records.iter().filter(|record| record.kind == *kind) {
            out.push_str(&record_line(record));
            out.push('\n');
            for item in &record.detail.items {
                out.push_str(&format!("      - {}: {}\n", item.label, item.value));
            }
            if record.detail.omitted > 0 {
                out.push_str(&format!("      ... {} more\n", record.detail.omitted));
            }
            if let Some(reason) = &record.detail.reason {
                out.push_str(&format!("      reason [{}]: {}\n", reason.code, reason.message));
            }
        }
    }

    if !verdicts.skipped.is_empty() {
        out.push_str(&format!("\nskipped: {}\n", verdicts.skipped.len()));
        for reason in &verdicts.skipped {
            out.push_str(&format!(
                "  step {:<4} [{}] {}\n",
                reason.sequence_index, reason.code, reason.message
            ));
        }
    }
    out
}

/// Console rendering of the detect-only command.
pub fn render_detection_text(report: &DetectionReport) -> String {
    let mut out = format!("run {}: {} step(s)\n", report.run_id, report.steps);
    for kind in &report.kinds {
        out.push_str(&format!(
            "\n{}: {} trigger(s)\n",
            kind.kind,
            kind.triggers.len()
        ));
        for window in &kind.windows {
            let affected = window
                .affected
                .iter()
                .map(|screen| screen.sequence_index.to_string())
                .collect::<Vec<_>>();
            out.push_str(&format!("  step {:<4}", window.trigger.trigger_index));
            if matches!(kind.kind, TriggerKind::ThemeToggle | TriggerKind::LanguageSelection) {
                out.push_str(&format!(" affected steps: [{}]", affected.join(", ")));
            }
            out.push('\n');
        }
        for reason in &kind.skipped {
            out.push_str(&format!(
                "  skipped step {} [{}] {}\n",
                reason.sequence_index, reason.code, reason.message
            ));
        }
    }
    out
}
