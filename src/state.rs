//! # Processed-File State Module
//!
//! Questo modulo gestisce il tracking durevole dei file già processati.
//!
//! ## Responsabilità:
//! - Traccia quali file sono già stati transcodificati in sessioni passate
//! - Persiste lo stato in un file di testo nella directory dati dell'utente
//! - Evita il reprocessing dopo crash, quit o riavvio
//!
//! ## Strategia di persistence:
//! - Un fingerprint per riga: hash SHA-256 (hex) del path del file
//! - Il fingerprint è one-way: ispezionando lo store non si risale ai path
//! - File riscritto per intero dopo ogni commit (economico alla scala attesa
//!   di migliaia di entry); un crash perde al più il file in corso
//! - Lettura tollerante: righe trimmate, righe vuote scartate
//!
//! ## Degradazione:
//! - Store mancante all'avvio: inizializzato vuoto, non è un errore
//! - Errore di lettura: log e si prosegue vuoto (caso peggiore: un
//!   reprocessing inutile, mai perdita dati)
//! - Errore di scrittura: log e tracking solo in memoria per la sessione
//!
//! ## Esempio struttura store file:
//! ```text
//! 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
//! 60303ae22b998861bce3b28f33eec1be758a213c86c93c076dbe9f558c11c752
//! ```

use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::TranscodeError;
use crate::events::EventSender;

/// Durable set of fingerprints of committed files
pub struct ProcessedStore {
    store_path: PathBuf,
    fingerprints: HashSet<String>,
    /// Memoized path -> fingerprint to avoid re-hashing hot paths
    cache: HashMap<PathBuf, String>,
    /// Cleared after the first write failure; the session then runs memory-only
    durable: bool,
    events: EventSender,
}

impl ProcessedStore {
    /// Default store location under the per-user application data directory
    pub fn default_store_path() -> Result<PathBuf, TranscodeError> {
        let home = dirs::home_dir()
            .ok_or_else(|| TranscodeError::State("Could not find home directory".to_string()))?;
        Ok(home.join(".batch-transcoder").join("processed_files.txt"))
    }

    /// Load the store from `store_path`. Never fails: a missing file means an
    /// empty store, a broken file is logged and treated as empty.
    pub async fn load(store_path: PathBuf, events: EventSender) -> Self {
        if let Some(parent) = store_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                events.log_error(format!(
                    "Error creating state directory {}: {}",
                    parent.display(),
                    e
                ));
            }
        }

        let fingerprints = match tokio::fs::read_to_string(&store_path).await {
            Ok(content) => content
                .lines()
                .map(|line| line.trim())
                .filter(|line| !line.is_empty())
                .map(|line| line.to_string())
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                events.log_error(format!(
                    "Error reading processed files from {}: {}",
                    store_path.display(),
                    e
                ));
                HashSet::new()
            }
        };

        Self {
            store_path,
            fingerprints,
            cache: HashMap::new(),
            durable: true,
            events,
        }
    }

    /// One-way fingerprint of a candidate path, memoized per path
    fn fingerprint(&mut self, path: &Path) -> String {
        if let Some(hit) = self.cache.get(path) {
            return hit.clone();
        }
        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().as_bytes());
        let digest = hex::encode(hasher.finalize());
        self.cache.insert(path.to_path_buf(), digest.clone());
        digest
    }

    /// Whether `path` was committed in this or any earlier session
    pub fn contains(&mut self, path: &Path) -> bool {
        let fp = self.fingerprint(path);
        self.fingerprints.contains(&fp)
    }

    /// Record `path` as processed and persist the whole store
    pub async fn mark_processed(&mut self, path: &Path) {
        let fp = self.fingerprint(path);
        if !self.fingerprints.insert(fp) {
            return;
        }

        if !self.durable {
            debug!(
                "state store is memory-only this session, not persisting {}",
                path.display()
            );
            return;
        }

        let mut content = self
            .fingerprints
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        content.push('\n');

        if let Err(e) = tokio::fs::write(&self.store_path, content).await {
            self.events.log_error(format!(
                "Error saving processed files to {}: {} (tracking in memory only)",
                self.store_path.display(),
                e
            ));
            self.durable = false;
        }
    }

    /// Number of known processed files
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Location of the durable store file
    pub fn path(&self) -> &Path {
        &self.store_path
    }
}
