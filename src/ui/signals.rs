use crate::error::{Result, UnlockError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ctrl+C handling: the first press asks the batch to stop after the current item, the
/// second one exits immediately.
#[derive(Clone)]
pub struct GracefulShutdown {
    running: Arc<AtomicBool>,
    shutdown_message_shown: Arc<AtomicBool>,
}

impl GracefulShutdown {
    pub fn new() -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let shutdown_message_shown = Arc::new(AtomicBool::new(false));

        let running_clone = running.clone();
        let message_shown_clone = shutdown_message_shown.clone();

        ctrlc::set_handler(move || {
            running_clone.store(false, Ordering::SeqCst);

            if !message_shown_clone.swap(true, Ordering::SeqCst) {
                eprintln!("\n🛑 Stopping after the current file... (press Ctrl+C again to force exit)");
            } else {
                eprintln!("\n💀 Force stopping...");
                std::process::exit(130);
            }
        })
        .map_err(|e| UnlockError::Config {
            message: format!("Failed to set signal handler: {}", e),
        })?;

        Ok(Self {
            running,
            shutdown_message_shown,
        })
    }

    /// Instance without a signal handler, for tests and embedding.
    pub fn new_for_test() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            shutdown_message_shown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn check_shutdown(&self) -> Result<()> {
        if !self.is_running() {
            return Err(UnlockError::Cancelled);
        }
        Ok(())
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new().unwrap_or_else(|_| Self::new_for_test())
    }
}
