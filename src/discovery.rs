//! # File Discovery Module
//!
//! Questo modulo gestisce la discovery dei video e la selezione del prossimo
//! file eleggibile.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva dei file video sotto la root di sessione
//! - Filtro per estensione, case-insensitive
//! - Esclusione dei file di lavoro (infix riservato e marker legacy)
//! - Merge idempotente dei re-scan nella lista di sessione
//! - Ordinamento per dimensione decrescente (prima i file più grandi,
//!   dove il risparmio potenziale è maggiore)
//! - Selezione del prossimo candidato non ancora processato né fallito
//!
//! ## Tolleranza:
//! - Un file sparito tra enumerazione e stat viene escluso, mai fatale
//! - Entry di walkdir illeggibili vengono saltate

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::naming;
use crate::state::ProcessedStore;

/// One candidate video with the size observed at scan time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub size: u64,
}

/// Ordered, deduplicated list of candidates for one session
#[derive(Debug, Default)]
pub struct SessionFileList {
    entries: Vec<FileEntry>,
}

impl SessionFileList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursively scan `root` and merge matches into the list.
    ///
    /// Already-known paths are kept, new ones are appended, then the whole
    /// list is re-sorted by descending size. Returns how many video files
    /// the scan matched (known ones included).
    pub fn merge_scan(&mut self, root: &Path, extensions: &[String]) -> usize {
        let known: HashSet<PathBuf> = self.entries.iter().map(|e| e.path.clone()).collect();
        let mut found = 0;

        for entry in WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            if naming::is_work_file(path) || !matches_extension(path, extensions) {
                continue;
            }
            found += 1;

            if known.contains(path) {
                continue;
            }

            // The file may vanish between enumeration and stat
            let size = match std::fs::metadata(path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    debug!("skipping vanished or unreadable file {}: {}", path.display(), e);
                    continue;
                }
            };

            self.entries.push(FileEntry {
                path: path.to_path_buf(),
                size,
            });
        }

        self.entries.sort_by(|a, b| b.size.cmp(&a.size));
        found
    }

    /// First entry, in sorted order, that is neither processed, failed, nor a
    /// work file. `None` means the session is exhausted.
    pub fn next_eligible(
        &self,
        store: &mut ProcessedStore,
        failed: &HashSet<PathBuf>,
    ) -> Option<FileEntry> {
        self.entries
            .iter()
            .find(|entry| {
                !naming::is_work_file(&entry.path)
                    && !failed.contains(&entry.path)
                    && !store.contains(&entry.path)
            })
            .cloned()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Case-insensitive extension match against the configured set
fn matches_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_lowercase();
    extensions.iter().any(|candidate| candidate.to_lowercase() == ext)
}
