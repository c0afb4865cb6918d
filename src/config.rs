//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i flag di conversione
//! - Fornisce validazione dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! La configurazione viene costruita una sola volta in `main` (file JSON
//! opzionale + flag CLI) e poi passata esplicitamente a tutti i componenti.
//!
//! ## Parametri di configurazione:
//! - `force_overwrite`: Sovrascrive output esistenti (default: false)
//! - `generate_proxy`: Genera anche il proxy H.264 (default: false)
//! - `scale_proxy`: Dimezza le dimensioni del proxy (default: false)
//! - `fisheye_camera_model`: Modello camera per la correzione lensfun (default: None)
//! - `workers`: Numero di conversioni parallele (default: 1 = sequenziale)
//! - `skip_converted_outputs`: Esclude `*_prores.*` e `*_proxy.mp4` dalla discovery
//! - `json_output`: Eventi JSON su stdout invece delle progress bar
//! - `ffmpeg` / `ffprobe`: Programmi esterni da invocare
//!
//! ## Esempio:
//! ```ignore
//! let config = Config {
//!     generate_proxy: true,
//!     scale_proxy: true,
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::command_builder::FeatureFlags;
use crate::error::ConvertError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// Configuration for a conversion batch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overwrite existing mezzanine and proxy outputs
    pub force_overwrite: bool,
    /// Also produce a delivery proxy next to the mezzanine file
    pub generate_proxy: bool,
    /// Halve the proxy's linear dimensions (only meaningful with `generate_proxy`)
    pub scale_proxy: bool,
    /// Camera model passed to the lens-correction filter
    pub fisheye_camera_model: Option<String>,
    /// Number of files converted concurrently
    pub workers: usize,
    /// Leave previously generated outputs out of discovery
    pub skip_converted_outputs: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
    /// Media engine executable
    pub ffmpeg: PathBuf,
    /// Media inspection executable
    pub ffprobe: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            force_overwrite: false,
            generate_proxy: false,
            scale_proxy: false,
            fisheye_camera_model: None,
            workers: 1,
            skip_converted_outputs: false,
            json_output: false,
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ConvertError::Validation("Number of workers must be greater than 0".to_string()).into());
        }

        if let Some(ref model) = self.fisheye_camera_model {
            if model.trim().is_empty() {
                return Err(ConvertError::Validation("Fisheye camera model must not be empty".to_string()).into());
            }
        }

        if self.ffmpeg.as_os_str().is_empty() || self.ffprobe.as_os_str().is_empty() {
            return Err(ConvertError::Validation("Tool paths for ffmpeg and ffprobe must not be empty".to_string()).into());
        }

        if self.scale_proxy && !self.generate_proxy {
            warn!("--scale has no effect without --proxy");
        }

        Ok(())
    }

    /// Per-job feature flags derived from this configuration
    pub fn feature_flags(&self) -> FeatureFlags {
        FeatureFlags {
            force_overwrite: self.force_overwrite,
            generate_proxy: self.generate_proxy,
            scale_proxy: self.scale_proxy,
            fisheye_camera_model: self.fisheye_camera_model.clone(),
        }
    }

    /// Load configuration from file
    pub async fn from_file(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content).map_err(ConvertError::Json)?;
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
