//! # Run Controller Module
//!
//! Questo modulo orchestra il loop sequenziale di transcodifica di una sessione.
//!
//! ## Responsabilità:
//! - Possiede lo stato di sessione (root, lista file, failed set, aggregato)
//! - Ripete selezione eleggibile + supervisione finché la sessione è esaurita
//!   o arriva una richiesta di stop
//! - Cattura gli errori per-file: log + failed set, il loop non termina mai
//!   per un singolo file
//! - Espone `select_root`/`start`/`stop` alla shell esterna
//!
//! ## Cancellazione:
//! Lo `StopToken` è il side-channel condiviso: clonabile, richiedibile da
//! qualunque task in qualunque momento. Il supervisore lo osserva durante
//! l'attesa del processo esterno (kill del processo attivo), il loop lo
//! controlla ad ogni iterazione. Il file interrotto resta in forma temp,
//! mai rollback parziale dell'originale.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::sync::watch;

use crate::config::Config;
use crate::discovery::SessionFileList;
use crate::events::EventSender;
use crate::progress::{ProgressManager, SessionStats};
use crate::state::ProcessedStore;
use crate::transcode::{Outcome, Supervisor};

/// Shared cancellation side-channel for one controller
#[derive(Debug, Clone)]
pub struct StopToken {
    tx: watch::Sender<bool>,
}

impl StopToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Request a stop; deliverable from any task at any time
    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    /// Clear a previous request before a fresh run
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once a stop has been requested
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns one processing session and drives the sequential run loop
pub struct Controller {
    config: Config,
    events: EventSender,
    store: ProcessedStore,
    supervisor: Supervisor,
    files: SessionFileList,
    failed: HashSet<PathBuf>,
    stats: SessionStats,
    root: Option<PathBuf>,
    running: bool,
    stop: StopToken,
}

impl Controller {
    pub async fn new(config: Config, events: EventSender) -> Result<Self> {
        config.validate()?;

        let store_path = match &config.state_file {
            Some(path) => path.clone(),
            None => ProcessedStore::default_store_path()?,
        };
        let store = ProcessedStore::load(store_path, events.clone()).await;

        let stop = StopToken::new();
        let supervisor = Supervisor::new(&config, events.clone(), stop.clone());

        Ok(Self {
            config,
            events,
            store,
            supervisor,
            files: SessionFileList::new(),
            failed: HashSet::new(),
            stats: SessionStats::new(),
            root: None,
            running: false,
            stop,
        })
    }

    /// Check external dependencies before the first run
    pub async fn check_dependencies(&self) -> Result<()> {
        self.supervisor.check_dependencies().await
    }

    /// Cloneable handle for delivering a stop from another task (ctrl-c, UI)
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn candidate_count(&self) -> usize {
        self.files.len()
    }

    /// Select a new root directory: stops any active run, resets the
    /// session-scoped state and rescans. The durable store is untouched.
    pub async fn select_root(&mut self, dir: &Path) -> Result<()> {
        if self.running {
            self.stop();
        }

        self.events.log(format!("folder {}", dir.display()));
        self.root = Some(dir.to_path_buf());
        self.failed.clear();
        self.stats = SessionStats::new();
        self.rescan().await
    }

    /// Merge-scan the current root into the session list
    pub async fn rescan(&mut self) -> Result<()> {
        let Some(root) = self.root.clone() else {
            self.events.log("no folder selected");
            return Ok(());
        };

        let found = self.files.merge_scan(&root, &self.config.extensions);
        self.events.directory_changed(&root, self.files.len());
        self.events.log(format!("found {} videos", found));
        self.events.log(format!(
            "there are {} known, already processed files in {} - if you expect needing to \
             re-process some of the already compressed files, delete that file and restart",
            self.store.len(),
            self.store.path().display()
        ));
        Ok(())
    }

    /// Run the sequential loop until the session is exhausted or stopped
    pub async fn start(&mut self) -> Result<()> {
        let Some(root) = self.root.clone() else {
            self.events.log("no folder selected");
            return Ok(());
        };
        if self.running {
            self.events.log("already running");
            return Ok(());
        }

        self.running = true;
        self.stop.reset();
        self.stats = SessionStats::new();
        self.events.log(format!("starting in {}", root.display()));

        let progress = ProgressManager::new(self.files.len() as u64);

        loop {
            if self.stop.is_requested() {
                self.events.log("stop requested");
                break;
            }

            let Some(entry) = self.files.next_eligible(&mut self.store, &self.failed) else {
                break;
            };

            let name = entry
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            progress.set_message(&name);

            match self
                .supervisor
                .process_one(&entry.path, &mut self.store)
                .await
            {
                Ok(Outcome::Committed { saved_bytes }) => {
                    self.stats.add_committed(saved_bytes);
                    progress.update(&name);
                }
                Ok(Outcome::SkippedLarger) => {
                    self.stats.add_skipped_larger();
                    progress.update(&name);
                }
                Ok(Outcome::Failed) => {
                    self.failed.insert(entry.path.clone());
                    self.stats.add_failed();
                    progress.update(&name);
                }
                Err(e) => {
                    // A per-file error never takes the loop down with it
                    self.events.log_error(format!("failed: {:#}", e));
                    self.failed.insert(entry.path.clone());
                    self.stats.add_failed();
                    progress.update(&name);
                }
            }
        }

        progress.finish(&self.stats.format_summary());
        self.events.log(format!(
            "Done. Space saved total {} Mb",
            self.stats.space_saved_mb.round()
        ));
        self.running = false;
        Ok(())
    }

    /// Best-effort stop: signals the token (killing any active external
    /// process) without waiting for confirmation.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.stop.request();
        self.running = false;
    }
}

#[cfg(test)]
mod token_tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancelled_resolves_after_request() {
        let token = StopToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        token.request();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("cancelled() must resolve once requested")
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_requested() {
        let token = StopToken::new();
        token.request();
        tokio::time::timeout(Duration::from_millis(100), token.cancelled())
            .await
            .unwrap();
    }

    #[test]
    fn test_reset_clears_request() {
        let token = StopToken::new();
        token.request();
        assert!(token.is_requested());
        token.reset();
        assert!(!token.is_requested());
    }
}
