use crate::batch::BatchProgress;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct ProgressManager {
    multi_progress: MultiProgress,
    enabled: bool,
}

impl ProgressManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            enabled,
        }
    }

    pub fn create_file_progress(&self, total_files: u64) -> ProgressBar {
        if !self.enabled {
            return ProgressBar::hidden();
        }

        let pb = self.multi_progress.add(ProgressBar::new(total_files));
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>5}/{len:5} files {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
        );
        pb.set_message("Unlocking...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn clear(&self) {
        if self.enabled {
            self.multi_progress.clear().ok();
        }
    }
}

impl Default for ProgressManager {
    fn default() -> Self {
        Self::new(true)
    }
}

pub fn update_batch_progress(pb: &ProgressBar, progress: &BatchProgress) {
    pb.set_length(progress.total as u64);
    pb.set_position(progress.processed as u64);

    match progress.current {
        Some(ref current) => pb.set_message(format!("Done {}", current)),
        None => pb.set_message("Unlocking..."),
    }
}

pub fn finish_progress_with_summary(pb: &ProgressBar, message: &str, duration: Duration) {
    let final_message = format!("{} (completed in {})", message, format_duration(duration));
    pb.finish_with_message(final_message);
}

pub(crate) fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}
