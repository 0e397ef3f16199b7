//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con i parametri della sessione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `transcoder_bin`: Binario esterno da invocare (default: "ffmpeg")
//! - `extensions`: Estensioni video riconosciute, case-insensitive
//!   (default: mp4, mts, m2ts, flv, m4v)
//! - `state_file`: Override del path dello store dei file processati
//!   (default: None = directory dati dell'applicazione)
//!
//! Il contratto di command-line verso il transcoder (codec, preset,
//! metadata) è fisso e non configurabile; qui si sceglie solo quale
//! binario eseguirlo.
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     transcoder_bin: "/usr/local/bin/ffmpeg".into(),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a transcoding session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// External transcoder binary to invoke
    pub transcoder_bin: PathBuf,
    /// Recognized video extensions (matched case-insensitively)
    pub extensions: Vec<String>,
    /// Override for the processed-files state file (None = app data dir)
    pub state_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transcoder_bin: PathBuf::from("ffmpeg"),
            extensions: vec![
                "mp4".to_string(),
                "mts".to_string(),
                "m2ts".to_string(),
                "flv".to_string(),
                "m4v".to_string(),
            ],
            state_file: None,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.transcoder_bin.as_os_str().is_empty() {
            return Err(anyhow::anyhow!("Transcoder binary must not be empty"));
        }

        if self.extensions.is_empty() {
            return Err(anyhow::anyhow!("At least one video extension is required"));
        }

        if self.extensions.iter().any(|e| e.is_empty() || e.contains('.')) {
            return Err(anyhow::anyhow!(
                "Extensions must be bare suffixes without dots (e.g. \"mp4\")"
            ));
        }

        Ok(())
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &PathBuf) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.transcoder_bin = PathBuf::new();
        assert!(config.validate().is_err());

        config.transcoder_bin = PathBuf::from("ffmpeg");
        config.extensions.clear();
        assert!(config.validate().is_err());

        config.extensions = vec![".mp4".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.transcoder_bin, PathBuf::from("ffmpeg"));
        assert!(config.extensions.contains(&"mp4".to_string()));
        assert!(config.extensions.contains(&"m2ts".to_string()));
        assert!(config.state_file.is_none());
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let original_config = Config {
            transcoder_bin: PathBuf::from("/opt/ffmpeg/bin/ffmpeg"),
            extensions: vec!["mp4".to_string(), "mov".to_string()],
            state_file: Some(temp_dir.path().join("state.txt")),
        };

        // Save config
        original_config.save_to_file(&config_path).await.unwrap();

        // Load config
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(
            loaded_config.transcoder_bin,
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg")
        );
        assert_eq!(loaded_config.extensions, vec!["mp4", "mov"]);
        assert_eq!(
            loaded_config.state_file,
            Some(temp_dir.path().join("state.txt"))
        );
    }

    #[tokio::test]
    async fn test_config_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(config.transcoder_bin, PathBuf::from("ffmpeg"));
    }
}
