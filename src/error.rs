//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `TranscodeError` enum per categorizzare gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (file non trovati, permessi, etc.)
//! - `Transcoder`: Errori del processo esterno di transcodifica
//! - `Busy`: Violazione del contratto "un solo transcode attivo"
//! - `State`: Errori di gestione dello store dei file processati
//! - `MissingDependency`: Binario esterno mancante (ffmpeg)
//! - `Validation`: Errori di validazione input
//!
//! Gli errori per-file vengono catturati al boundary di processing e
//! convertiti in log + outcome modellato; non terminano mai il loop.

/// Custom error types for batch transcoding
#[derive(thiserror::Error, Debug)]
pub enum TranscodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transcoder error: {0}")]
    Transcoder(String),

    #[error("A transcode is already active: {0}")]
    Busy(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
