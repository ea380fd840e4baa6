use crate::error::{Result, UnlockError};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl ItemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Succeeded => "OK",
            ItemStatus::Failed => "FAILED",
            ItemStatus::Skipped => "SKIPPED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub filename: String,
    pub source: PathBuf,
    pub status: ItemStatus,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<PathBuf>,
}

impl ReportEntry {
    fn new<S: Into<String>>(source: &Path, status: ItemStatus, outcome: S) -> Self {
        Self {
            filename: source
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| source.display().to_string()),
            source: source.to_path_buf(),
            status,
            outcome: outcome.into(),
            account: None,
            output: None,
            backup: None,
        }
    }

    pub fn succeeded<S: Into<String>>(source: &Path, outcome: S) -> Self {
        Self::new(source, ItemStatus::Succeeded, outcome)
    }

    pub fn failed<S: Into<String>>(source: &Path, reason: S) -> Self {
        Self::new(source, ItemStatus::Failed, reason)
    }

    pub fn skipped<S: Into<String>>(source: &Path, reason: S) -> Self {
        Self::new(source, ItemStatus::Skipped, reason)
    }

    pub fn with_account<S: Into<String>>(mut self, account: S) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_output(mut self, output: PathBuf, backup: Option<PathBuf>) -> Self {
        self.output = Some(output);
        self.backup = backup;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Append-only record of one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingReport {
    pub run_timestamp: String,
    pub started_at: DateTime<Local>,
    pub duration: Duration,
    pub cancelled: bool,
    pub summary: ReportSummary,
    pub entries: Vec<ReportEntry>,
}

impl ProcessingReport {
    pub fn new<S: Into<String>>(run_timestamp: S) -> Self {
        Self {
            run_timestamp: run_timestamp.into(),
            started_at: Local::now(),
            duration: Duration::ZERO,
            cancelled: false,
            summary: ReportSummary::default(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: ReportEntry) {
        self.summary.total += 1;
        match entry.status {
            ItemStatus::Succeeded => self.summary.succeeded += 1,
            ItemStatus::Failed => self.summary.failed += 1,
            ItemStatus::Skipped => self.summary.skipped += 1,
        }
        self.entries.push(entry);
    }

    pub fn extend<I: IntoIterator<Item = ReportEntry>>(&mut self, entries: I) {
        for entry in entries {
            self.push(entry);
        }
    }

    pub fn has_failures(&self) -> bool {
        self.summary.failed > 0
    }

    pub fn entries_with(&self, status: ItemStatus) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(move |e| e.status == status)
    }

    pub fn text_path(&self, log_dir: &Path) -> PathBuf {
        log_dir.join(format!("processing_report_{}.txt", self.run_timestamp))
    }

    pub fn json_path(&self, log_dir: &Path) -> PathBuf {
        log_dir.join(format!("processing_report_{}.json", self.run_timestamp))
    }

    /// Writes the text report and its JSON twin into `log_dir`. Returns the text path.
    pub fn save(&self, log_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(log_dir)?;
        self.save_json(&self.json_path(log_dir))?;
        let text_path = self.text_path(log_dir);
        self.save_text(&text_path)?;
        Ok(text_path)
    }

    fn save_json(&self, path: &Path) -> Result<()> {
        let json_content = serde_json::to_string_pretty(self).map_err(|e| UnlockError::Config {
            message: format!("Failed to serialize report to JSON: {}", e),
        })?;
        fs::write(path, json_content)?;
        Ok(())
    }

    fn save_text(&self, path: &Path) -> Result<()> {
        let mut file = BufWriter::new(fs::File::create(path)?);

        writeln!(file, "Processing Report")?;
        writeln!(file, "=================")?;
        writeln!(file)?;
        writeln!(
            file,
            "Started: {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(file, "Duration: {:.1}s", self.duration.as_secs_f64())?;
        if self.cancelled {
            writeln!(file, "Run was cancelled before all files were processed.")?;
        }
        writeln!(file)?;

        writeln!(file, "Summary:")?;
        writeln!(file, "  Total: {}", self.summary.total)?;
        writeln!(file, "  Succeeded: {}", self.summary.succeeded)?;
        writeln!(file, "  Failed: {}", self.summary.failed)?;
        writeln!(file, "  Skipped: {}", self.summary.skipped)?;
        writeln!(file)?;

        writeln!(file, "Items:")?;
        for entry in &self.entries {
            write!(file, "  [{}] {}", entry.status.label(), entry.filename)?;
            if let Some(ref output) = entry.output {
                let new_name = output
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                write!(file, " → {}", new_name)?;
            }
            write!(file, ": {}", entry.outcome)?;
            if let Some(ref backup) = entry.backup {
                write!(file, " (previous file moved to {})", backup.display())?;
            }
            writeln!(file)?;
        }

        file.flush()?;
        Ok(())
    }
}
