//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche di sessione.
//!
//! ## Responsabilità:
//! - Progress bar visual con `indicatif` per feedback real-time
//! - Tracking dell'aggregato di sessione (commit, skip, fail, MB risparmiati)
//! - Report finale con il riepilogo della sessione
//!
//! ## Statistiche tracciate:
//! - **files_committed**: file sostituiti con la versione transcodificata
//! - **files_skipped_larger**: file valutati ma tenuti (output più grande)
//! - **files_failed**: tentativi falliti in questa sessione
//! - **space_saved_mb**: somma delle sole differenze positive, in megabyte
//!
//! L'aggregato è stato di sessione: viene azzerato ad ogni start e non
//! sopravvive al processo.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages the per-session progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager over `total_files` candidates
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Advance by one file with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Set a custom message without incrementing
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Aggregate outcome counters for one session
#[derive(Debug, Default, Clone)]
pub struct SessionStats {
    pub files_committed: usize,
    pub files_skipped_larger: usize,
    pub files_failed: usize,
    pub space_saved_mb: f64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_committed(&mut self, saved_bytes: u64) {
        self.files_committed += 1;
        self.space_saved_mb += saved_bytes as f64 / (1024.0 * 1024.0);
    }

    pub fn add_skipped_larger(&mut self) {
        self.files_skipped_larger += 1;
    }

    pub fn add_failed(&mut self) {
        self.files_failed += 1;
    }

    pub fn files_processed(&self) -> usize {
        self.files_committed + self.files_skipped_larger + self.files_failed
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Committed: {} | Kept (larger output): {} | Failed: {} | Saved: {} Mb",
            self.files_processed(),
            self.files_committed,
            self.files_skipped_larger,
            self.files_failed,
            self.space_saved_mb.round()
        )
    }
}
