use crate::batch::{ItemStatus, PlannedItem, ProcessingReport};
use crate::error::{UnlockError, UserFriendlyError};
use crate::ui::progress::format_duration;
use console::{style, Emoji, Term};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Human,
    Json,
    Plain,
}

static CHECKMARK: Emoji = Emoji("✅ ", "v ");
static CROSS: Emoji = Emoji("❌ ", "x ");
static INFO: Emoji = Emoji("ℹ️  ", "i ");
static WARNING: Emoji = Emoji("⚠️  ", "! ");
static KEY: Emoji = Emoji("🔑 ", "> ");
static SPARKLES: Emoji = Emoji("✨ ", "* ");

/// Terminal output in one of three modes. JSON mode prints one object per line.
pub struct OutputFormatter {
    mode: OutputMode,
    use_colors: bool,
    verbose_level: u8,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(mode: OutputMode, verbose: u8, quiet: bool) -> Self {
        let use_colors = match mode {
            OutputMode::Human => Term::stdout().features().colors_supported() && !quiet,
            _ => false,
        };

        Self {
            mode,
            use_colors,
            verbose_level: if quiet { 0 } else { verbose },
            quiet,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Success, message),
            OutputMode::Json => self.print_json_message("success", message),
            OutputMode::Plain => println!("SUCCESS: {}", message),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Human => self.print_human_message(MessageType::Error, message),
            OutputMode::Json => self.print_json_message("error", message),
            OutputMode::Plain => eprintln!("ERROR: {}", message),
        }
    }

    pub fn warning(&self, message: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Warning, message),
                OutputMode::Json => self.print_json_message("warning", message),
                OutputMode::Plain => println!("WARNING: {}", message),
            }
        }
    }

    pub fn info(&self, message: &str) {
        if self.should_show_message(1) {
            match self.mode {
                OutputMode::Human => self.print_human_message(MessageType::Info, message),
                OutputMode::Json => self.print_json_message("info", message),
                OutputMode::Plain => println!("INFO: {}", message),
            }
        }
    }

    pub fn start_operation(&self, operation: &str) {
        if self.should_show_message(0) {
            match self.mode {
                OutputMode::Human => {
                    if self.use_colors {
                        println!("{}{}", KEY, style(operation).bold());
                    } else {
                        println!("> {}", operation);
                    }
                }
                OutputMode::Json => self.print_json_message("operation_start", operation),
                OutputMode::Plain => println!("STARTING: {}", operation),
            }
        }
    }

    pub fn print_user_friendly_error(&self, error: &UnlockError) {
        self.error(&error.user_message());

        if let Some(suggestion) = error.suggestion() {
            match self.mode {
                OutputMode::Human => {
                    eprintln!();
                    if self.use_colors {
                        eprintln!(
                            "{}{}",
                            INFO,
                            style(format!("Suggestion: {}", suggestion)).cyan()
                        );
                    } else {
                        eprintln!("Suggestion: {}", suggestion);
                    }
                }
                OutputMode::Json => self.print_json_object(&serde_json::json!({
                    "type": "suggestion",
                    "message": suggestion
                })),
                OutputMode::Plain => eprintln!("SUGGESTION: {}", suggestion),
            }
        }
    }

    /// Counts, failed items with their reasons, and where the report was written.
    pub fn print_batch_summary(&self, report: &ProcessingReport, report_path: &Path) {
        match self.mode {
            OutputMode::Json => {
                self.print_json_object(&serde_json::json!({
                    "type": "summary",
                    "run": report.run_timestamp,
                    "total": report.summary.total,
                    "succeeded": report.summary.succeeded,
                    "failed": report.summary.failed,
                    "skipped": report.summary.skipped,
                    "cancelled": report.cancelled,
                    "duration_ms": report.duration.as_millis(),
                    "report": report_path.display().to_string(),
                    "entries": report.entries,
                }));
            }
            OutputMode::Plain => {
                if self.quiet {
                    return;
                }
                println!("COMPLETED: {}", report.run_timestamp);
                println!("Total: {}", report.summary.total);
                println!("Succeeded: {}", report.summary.succeeded);
                println!("Failed: {}", report.summary.failed);
                println!("Skipped: {}", report.summary.skipped);
                for entry in report.entries_with(ItemStatus::Failed) {
                    println!("FAILED: {}: {}", entry.source.display(), entry.outcome);
                }
                println!("Report: {}", report_path.display());
            }
            OutputMode::Human => {
                if self.quiet {
                    return;
                }
                self.print_human_summary(report, report_path);
            }
        }
    }

    fn print_human_summary(&self, report: &ProcessingReport, report_path: &Path) {
        println!();
        self.print_separator();

        let headline = if report.cancelled {
            "Batch cancelled"
        } else if report.has_failures() {
            "Batch finished with failures"
        } else {
            "Batch finished"
        };
        if self.use_colors {
            let styled = if report.has_failures() || report.cancelled {
                style(headline).yellow().bold()
            } else {
                style(headline).green().bold()
            };
            println!("{}{}", SPARKLES, styled);
        } else {
            println!("* {}", headline);
        }

        println!();
        let rows = [
            ("Files", report.summary.total),
            ("Unlocked", report.summary.succeeded),
            ("Failed", report.summary.failed),
            ("Skipped", report.summary.skipped),
        ];
        for (label, count) in rows {
            let value = if self.use_colors {
                style(count).cyan().bold().to_string()
            } else {
                count.to_string()
            };
            println!("  {:<10} {}", format!("{}:", label), value);
        }
        println!("  {:<10} {}", "Time:", format_duration(report.duration));

        let failed: Vec<_> = report.entries_with(ItemStatus::Failed).collect();
        if !failed.is_empty() {
            println!();
            println!("Failed files:");
            for entry in failed {
                if self.use_colors {
                    println!("  {}{}: {}", CROSS, entry.source.display(), style(&entry.outcome).red());
                } else {
                    println!("  - {}: {}", entry.source.display(), entry.outcome);
                }
            }
        }

        if self.verbose_level >= 1 {
            let unlocked: Vec<_> = report.entries_with(ItemStatus::Succeeded).collect();
            if !unlocked.is_empty() {
                println!();
                println!("Unlocked files:");
                for entry in unlocked {
                    let output = entry
                        .output
                        .as_ref()
                        .map(|p| p.display().to_string())
                        .unwrap_or_default();
                    println!("  {} → {}", entry.filename, output);
                }
            }
        }

        println!();
        println!("Report: {}", report_path.display());
        self.print_separator();
    }

    pub fn print_plan(&self, plan: &[PlannedItem]) {
        match self.mode {
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "plan",
                "items": plan,
            })),
            OutputMode::Plain => {
                for item in plan {
                    println!(
                        "PLAN: {} [{}] {}{}",
                        item.source.display(),
                        item.scope,
                        item.action,
                        item.account
                            .as_ref()
                            .map(|a| format!(" -> {}", a))
                            .unwrap_or_default()
                    );
                }
            }
            OutputMode::Human => {
                self.print_header("Dry run");
                if plan.is_empty() {
                    println!("No input files found.");
                }
                for item in plan {
                    let name = item
                        .source
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    match item.account {
                        Some(ref account) => println!(
                            "  {} [{}] {} as {} ({} candidates)",
                            name, item.scope, item.action, account, item.candidates
                        ),
                        None => println!("  {} [{}] {}", name, item.scope, item.action),
                    }
                }
            }
        }
    }

    pub fn print_header(&self, title: &str) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human => {
                println!();
                if self.use_colors {
                    println!("{}{}", SPARKLES, style(title).bold().cyan());
                } else {
                    println!("=== {} ===", title);
                }
                println!();
            }
            OutputMode::Json => self.print_json_object(&serde_json::json!({
                "type": "header",
                "title": title
            })),
            OutputMode::Plain => println!("=== {} ===", title),
        }
    }

    pub fn print_separator(&self) {
        if self.quiet {
            return;
        }

        match self.mode {
            OutputMode::Human if self.use_colors => println!("{}", style("─".repeat(60)).dim()),
            OutputMode::Human | OutputMode::Plain => println!("{}", "-".repeat(60)),
            OutputMode::Json => {}
        }
    }

    fn should_show_message(&self, min_verbose_level: u8) -> bool {
        !self.quiet && self.verbose_level >= min_verbose_level
    }

    fn print_human_message(&self, msg_type: MessageType, message: &str) {
        let (emoji, prefix) = match msg_type {
            MessageType::Success => (&CHECKMARK, "v"),
            MessageType::Error => (&CROSS, "x"),
            MessageType::Warning => (&WARNING, "!"),
            MessageType::Info => (&INFO, "i"),
        };

        let line = if self.use_colors {
            let styled = match msg_type {
                MessageType::Success => style(message).green().bold(),
                MessageType::Error => style(message).red().bold(),
                MessageType::Warning => style(message).yellow().bold(),
                MessageType::Info => style(message).cyan(),
            };
            format!("{}{}", emoji, styled)
        } else {
            format!("{} {}", prefix, message)
        };

        match msg_type {
            MessageType::Error => eprintln!("{}", line),
            _ => println!("{}", line),
        }
    }

    fn print_json_message(&self, level: &str, message: &str) {
        self.print_json_object(&serde_json::json!({
            "type": "message",
            "level": level,
            "message": message,
            "timestamp": chrono::Utc::now().to_rfc3339()
        }));
    }

    fn print_json_object(&self, obj: &serde_json::Value) {
        println!(
            "{}",
            serde_json::to_string(obj).unwrap_or_else(|_| "{}".to_string())
        );
    }
}

#[derive(Debug, Clone, Copy)]
enum MessageType {
    Success,
    Error,
    Warning,
    Info,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_mode() {
        let formatter = OutputFormatter::new(OutputMode::Human, 2, true);
        assert_eq!(formatter.verbose_level, 0);
        assert!(formatter.quiet);
        assert!(!formatter.use_colors);
    }

    #[test]
    fn test_should_show_message() {
        let formatter = OutputFormatter::new(OutputMode::Plain, 1, false);
        assert!(formatter.should_show_message(0));
        assert!(formatter.should_show_message(1));
        assert!(!formatter.should_show_message(2));

        let quiet = OutputFormatter::new(OutputMode::Plain, 2, true);
        assert!(!quiet.should_show_message(0));
    }

    #[test]
    fn test_json_mode_never_colors() {
        let formatter = OutputFormatter::new(OutputMode::Json, 0, false);
        assert!(!formatter.use_colors);
        assert_eq!(formatter.mode(), OutputMode::Json);
    }
}
