//! Structured data-quality diagnostics. Findings flow through an
//! [`IssueSink`] into a deduplicating [`IssueLog`] that keeps a bounded
//! display list alongside the full export history.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use log::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }

    fn log_level(self) -> Level {
        match self {
            Severity::Info => Level::Info,
            Severity::Warning => Level::Warn,
            Severity::Error => Level::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One data finding. `column` may be empty for table-scoped findings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    pub column: String,
    pub description: String,
    pub row: Option<usize>,
    pub raw_value: Option<String>,
    pub source: Option<String>,
    pub context: Option<String>,
}

impl Issue {
    pub fn new(
        severity: Severity,
        column: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Issue {
            severity,
            column: column.into(),
            description: description.into(),
            row: None,
            raw_value: None,
            source: None,
            context: None,
        }
    }

    pub fn info(column: impl Into<String>, description: impl Into<String>) -> Self {
        Issue::new(Severity::Info, column, description)
    }

    pub fn warning(column: impl Into<String>, description: impl Into<String>) -> Self {
        Issue::new(Severity::Warning, column, description)
    }

    pub fn error(column: impl Into<String>, description: impl Into<String>) -> Self {
        Issue::new(Severity::Error, column, description)
    }

    /// Physical line number in the source file, header counted as line 1.
    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_raw_value(mut self, raw_value: impl Into<String>) -> Self {
        self.raw_value = Some(raw_value.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    fn render(&self) -> String {
        let mut line = String::new();
        if let Some(source) = &self.source {
            line.push_str(&format!("[{source}] "));
        }
        if let Some(row) = self.row {
            line.push_str(&format!("row {row}, "));
        }
        if !self.column.is_empty() {
            line.push_str(&format!("{}: ", self.column));
        }
        line.push_str(&self.description);
        if let Some(raw_value) = &self.raw_value {
            line.push_str(&format!(" (value '{raw_value}')"));
        }
        if let Some(context) = &self.context {
            line.push_str(&format!(" [{context}]"));
        }
        line
    }
}

/// Destination for data findings. Engines report through this trait so
/// tests can substitute a [`CollectingSink`].
pub trait IssueSink: Send + Sync {
    fn record(&self, issue: Issue);
}

type DedupKey = (Severity, String, String);

#[derive(Debug)]
struct DedupState {
    occurrences: usize,
    summary_index: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct LoggedIssue {
    pub at: DateTime<Utc>,
    pub issue: Issue,
}

#[derive(Debug, Default)]
struct LogState {
    history: Vec<LoggedIssue>,
    display: Vec<Issue>,
    dedup: HashMap<DedupKey, DedupState>,
}

/// Deduplicating issue log. Repeats of the same (severity, column,
/// description) beyond `max_detail_rows` collapse into a single updating
/// summary entry in the display list; the history keeps every occurrence
/// for export.
#[derive(Debug)]
pub struct IssueLog {
    max_detail_rows: usize,
    state: Mutex<LogState>,
}

impl IssueLog {
    pub fn new(max_detail_rows: usize) -> Self {
        IssueLog {
            max_detail_rows,
            state: Mutex::new(LogState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LogState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bounded display entries, in first-occurrence order.
    pub fn entries(&self) -> Vec<Issue> {
        self.lock().display.clone()
    }

    /// Every recorded finding with its timestamp.
    pub fn history(&self) -> Vec<LoggedIssue> {
        self.lock().history.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().history.is_empty()
    }

    pub fn severity_total(&self, severity: Severity) -> usize {
        self.lock()
            .history
            .iter()
            .filter(|logged| logged.issue.severity == severity)
            .count()
    }

    /// Routes the display entries through the process logger at their
    /// respective levels.
    pub fn emit_display(&self) {
        for issue in self.entries() {
            log::log!(issue.severity.log_level(), "{}", issue.render());
        }
    }

    /// Writes the full history as CSV with the fixed diagnostic header.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .from_path(path)
            .with_context(|| format!("Failed to create issue log '{}'", path.display()))?;
        writer.write_record([
            "timestamp",
            "severity",
            "row",
            "column",
            "description",
            "raw_value",
            "source",
            "context",
        ])?;
        for logged in self.history() {
            let issue = &logged.issue;
            writer.write_record([
                logged.at.to_rfc3339_opts(SecondsFormat::Millis, true),
                issue.severity.to_string(),
                issue.row.map(|row| row.to_string()).unwrap_or_default(),
                issue.column.clone(),
                issue.description.clone(),
                issue.raw_value.clone().unwrap_or_default(),
                issue.source.clone().unwrap_or_default(),
                issue.context.clone().unwrap_or_default(),
            ])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to flush issue log '{}'", path.display()))?;
        Ok(())
    }
}

impl IssueSink for IssueLog {
    fn record(&self, issue: Issue) {
        let mut state = self.lock();
        state.history.push(LoggedIssue {
            at: Utc::now(),
            issue: issue.clone(),
        });
        let key = (
            issue.severity,
            issue.column.clone(),
            issue.description.clone(),
        );
        let (occurrences, summary_index) = {
            let entry = state.dedup.entry(key.clone()).or_insert(DedupState {
                occurrences: 0,
                summary_index: None,
            });
            entry.occurrences += 1;
            (entry.occurrences, entry.summary_index)
        };
        if occurrences <= self.max_detail_rows {
            state.display.push(issue);
            return;
        }
        let additional = occurrences - self.max_detail_rows;
        let noun = if additional == 1 { "row" } else { "rows" };
        let description = format!("{} ({additional} additional {noun})", issue.description);
        match summary_index {
            Some(index) => {
                if let Some(summary) = state.display.get_mut(index) {
                    summary.description = description;
                }
            }
            None => {
                let summary = Issue {
                    severity: issue.severity,
                    column: issue.column.clone(),
                    description,
                    row: None,
                    raw_value: None,
                    source: issue.source.clone(),
                    context: None,
                };
                state.display.push(summary);
                let index = state.display.len() - 1;
                if let Some(entry) = state.dedup.get_mut(&key) {
                    entry.summary_index = Some(index);
                }
            }
        }
    }
}

/// Test double that stores findings verbatim.
#[derive(Debug, Default)]
pub struct CollectingSink {
    issues: Mutex<Vec<Issue>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        CollectingSink::default()
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl IssueSink for CollectingSink {
    fn record(&self, issue: Issue) {
        self.issues
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_n(log: &IssueLog, n: usize) {
        for row in 1..=n {
            log.record(
                Issue::warning("ChargeStartDate", "Unparsable date value")
                    .with_row(row)
                    .with_raw_value("13/13/2024"),
            );
        }
    }

    #[test]
    fn repeats_collapse_into_updating_summary() {
        let log = IssueLog::new(2);
        record_n(&log, 5);

        let entries = log.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].row, Some(1));
        assert_eq!(entries[1].row, Some(2));
        assert_eq!(entries[2].row, None);
        assert!(entries[2].description.contains("3 additional rows"));
        assert_eq!(log.history().len(), 5);
    }

    #[test]
    fn summary_uses_singular_noun_for_one_extra() {
        let log = IssueLog::new(1);
        record_n(&log, 2);
        let entries = log.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].description.contains("1 additional row"));
        assert!(!entries[1].description.contains("rows"));
    }

    #[test]
    fn distinct_findings_do_not_collapse() {
        let log = IssueLog::new(2);
        log.record(Issue::warning("Quantity", "Unparsable numeric value").with_row(4));
        log.record(Issue::warning("UnitPrice", "Unparsable numeric value").with_row(4));
        log.record(Issue::error("Quantity", "Unparsable numeric value").with_row(5));
        assert_eq!(log.entries().len(), 3);
    }

    #[test]
    fn severity_totals_count_history() {
        let log = IssueLog::new(1);
        record_n(&log, 3);
        log.record(Issue::error("Total", "Negative total value").with_row(9));
        assert_eq!(log.severity_total(Severity::Warning), 3);
        assert_eq!(log.severity_total(Severity::Error), 1);
        assert_eq!(log.severity_total(Severity::Info), 0);
    }

    #[test]
    fn export_writes_fixed_header_and_full_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.csv");
        let log = IssueLog::new(2);
        record_n(&log, 4);
        log.export_csv(&path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let header = reader.headers().unwrap().clone();
        assert_eq!(
            header.iter().collect::<Vec<_>>(),
            vec![
                "timestamp",
                "severity",
                "row",
                "column",
                "description",
                "raw_value",
                "source",
                "context"
            ]
        );
        assert_eq!(reader.records().count(), 4);
    }

    #[test]
    fn collecting_sink_stores_issues_verbatim() {
        let sink = CollectingSink::new();
        sink.record(Issue::info("", "Applying partner filter 'P-100'"));
        let issues = sink.issues();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Info);
    }

    #[test]
    fn render_includes_location_and_raw_value() {
        let issue = Issue::warning("Quantity", "Unparsable numeric value")
            .with_row(12)
            .with_raw_value("1,2,3")
            .with_source("hub_june.csv");
        assert_eq!(
            issue.render(),
            "[hub_june.csv] row 12, Quantity: Unparsable numeric value (value '1,2,3')"
        );
    }
}
