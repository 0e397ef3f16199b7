//! # Batch Video Transcoder - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Validazione degli input dell'utente
//! - Wiring di ctrl-c verso lo stop token
//! - Selezione della directory e avvio del run controller
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (directory, transcoder, extensions, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Valida che la directory video esista e la canonicalizza
//! 4. Verifica che il transcoder esterno sia eseguibile
//! 5. Scansiona la directory e processa i candidati finché esauriti
//!
//! ## Esempio di utilizzo:
//! ```bash
//! batch-transcoder /path/to/videos --transcoder /usr/bin/ffmpeg --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use batch_video_transcoder::{Config, Controller, EventSender};

#[derive(Parser)]
#[command(name = "batch-transcoder")]
#[command(about = "Batch-transcode videos in place, crash-safe and resumable")]
struct Args {
    /// Directory containing video files to transcode
    video_directory: PathBuf,

    /// External transcoder binary
    #[arg(long, default_value = "ffmpeg")]
    transcoder: PathBuf,

    /// Additional video extension to recognize (repeatable)
    #[arg(long = "extension")]
    extensions: Vec<String>,

    /// Override the processed-files state file location
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Validate arguments
    if !args.video_directory.exists() {
        return Err(anyhow::anyhow!(
            "Video directory does not exist: {}",
            args.video_directory.display()
        ));
    }
    let video_directory = args.video_directory.canonicalize()?;

    let mut config = Config {
        transcoder_bin: args.transcoder,
        state_file: args.state_file,
        ..Default::default()
    };
    config
        .extensions
        .extend(args.extensions.iter().map(|e| e.trim_start_matches('.').to_lowercase()));

    let events = EventSender::tracing_only();
    let mut controller = Controller::new(config, events).await?;
    controller.check_dependencies().await?;

    // A stop request must be deliverable while a transcode is running
    let stop = controller.stop_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping");
            stop.request();
        }
    });

    controller.select_root(&video_directory).await?;
    controller.start().await?;

    Ok(())
}
