//! # Work-File Naming Module
//!
//! Questo modulo centralizza lo schema di naming dei file temporanei di lavoro.
//!
//! ## Responsabilità:
//! - Genera il path temporaneo sibling di un input (infix riservato)
//! - Riconosce i file di lavoro, inclusi i marker legacy di versioni precedenti
//!
//! Lo schema corrente è un singolo infix versionato (`.bvt1.`) inserito
//! prima dell'estensione finale: `clip.mp4` -> `clip.bvt1.mp4`. Un file
//! con l'infix non viene mai raccolto da discovery né selezionato come
//! candidato; la sua presenza segnala un transcode attivo o abbandonato.
//!
//! I marker legacy (`.batchviproc.`, `.tmp.`, `-h264.`) restano
//! riconosciuti in sola lettura per non re-ingestire output prodotti da
//! installazioni precedenti senza fingerprint store.

use std::path::{Path, PathBuf};

/// Reserved infix marking an in-flight or abandoned transcode output
pub const WORK_INFIX: &str = ".bvt1.";

/// Markers used by earlier versions of the tool, recognized but never generated
const LEGACY_MARKERS: &[&str] = &[".batchviproc.", ".tmp.", "-h264."];

/// Derive the temporary output path for `input`.
///
/// The temp file lives in the same directory as the input, which keeps the
/// final rename on one filesystem. Returns `None` for paths without an
/// extension; candidates always carry one.
pub fn work_output_path(input: &Path) -> Option<PathBuf> {
    let stem = input.file_stem()?.to_str()?;
    let ext = input.extension()?.to_str()?;
    Some(input.with_file_name(format!("{}{}{}", stem, WORK_INFIX, ext)))
}

/// True if `path` is a work file of this tool, current or legacy scheme.
pub fn is_work_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.contains(WORK_INFIX) || LEGACY_MARKERS.iter().any(|m| name.contains(m))
}
