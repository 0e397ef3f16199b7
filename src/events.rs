//! # UI Event Boundary Module
//!
//! Questo modulo gestisce la comunicazione verso la shell esterna (GUI o CLI).
//!
//! ## Responsabilità:
//! - Emette eventi strutturati per la shell che mostra il log live
//! - Duplica ogni evento su `tracing` con la severity appropriata
//! - Fornisce una variante senza canale per CLI e test
//!
//! ## Tipi di eventi:
//! - `LogLine`: ogni messaggio osservazionale/diagnostico, streamato live
//! - `DirectoryChanged`: emesso dopo ogni scan (root + numero candidati)
//!
//! La shell riceve gli eventi da un canale unbounded; il core non si
//! blocca mai sull'invio e una shell assente non cambia il control flow.

use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Events consumed by the external shell
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// One observational log line, forwarded as it is produced
    LogLine { text: String },
    /// A scan finished for `root` with `candidate_count` session files
    DirectoryChanged {
        root: PathBuf,
        candidate_count: usize,
    },
}

/// Sender half of the UI boundary, cheap to clone
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Option<mpsc::UnboundedSender<UiEvent>>,
}

impl EventSender {
    /// Create a sender wired to a channel for an embedding shell
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Create a sender that only logs through `tracing`
    pub fn tracing_only() -> Self {
        Self { tx: None }
    }

    /// Emit an informational log line
    pub fn log(&self, text: impl Into<String>) {
        let text = text.into();
        info!("{}", text);
        self.send(UiEvent::LogLine { text });
    }

    /// Emit a warning log line
    pub fn log_warn(&self, text: impl Into<String>) {
        let text = text.into();
        warn!("{}", text);
        self.send(UiEvent::LogLine { text });
    }

    /// Emit an error log line
    pub fn log_error(&self, text: impl Into<String>) {
        let text = text.into();
        error!("{}", text);
        self.send(UiEvent::LogLine { text });
    }

    /// Notify the shell that the working directory changed
    pub fn directory_changed(&self, root: &Path, candidate_count: usize) {
        info!(
            "directory changed: {} ({} candidates)",
            root.display(),
            candidate_count
        );
        self.send(UiEvent::DirectoryChanged {
            root: root.to_path_buf(),
            candidate_count,
        });
    }

    fn send(&self, event: UiEvent) {
        if let Some(tx) = &self.tx {
            // A dropped receiver must never affect the core loop
            let _ = tx.send(event);
        }
    }
}
