//! # Batch Video Transcoder Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per shell esterne (GUI)
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `events`: Boundary verso la shell esterna (log-line, directory-changed)
//! - `naming`: Schema di naming per i file temporanei di lavoro
//! - `state`: Store durevole dei fingerprint dei file già processati
//! - `discovery`: Discovery ricorsiva dei video e selezione del prossimo eleggibile
//! - `transcode`: Supervisione del processo esterno di transcodifica
//! - `progress`: Progress tracking e statistiche di sessione
//! - `controller`: Orchestratore del loop sequenziale start/stop
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use batch_video_transcoder::{Config, Controller, EventSender};
//!
//! let events = EventSender::tracing_only();
//! let mut controller = Controller::new(Config::default(), events).await?;
//! controller.select_root(&dir).await?;
//! controller.start().await?;
//! ```

pub mod config;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod events;
pub mod naming;
pub mod progress;
pub mod state;
pub mod transcode;

pub use config::Config;
pub use controller::{Controller, StopToken};
pub use discovery::{FileEntry, SessionFileList};
pub use error::TranscodeError;
pub use events::{EventSender, UiEvent};
pub use progress::SessionStats;
pub use state::ProcessedStore;
pub use transcode::{Outcome, Supervisor};
