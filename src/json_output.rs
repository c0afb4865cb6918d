//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso da script o GUI.
//!
//! ## Responsabilità:
//! - Emette un messaggio JSON per riga su stdout per ogni evento del batch
//! - Implementa `ProgressReporter` per inoltrare il progresso di ffmpeg
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del batch con le root e la configurazione
//! - `file_start`: Inizio elaborazione di un file
//! - `progress`: Frame corrente, ETA e percentuale di un encode
//! - `file_complete`: Fine elaborazione di un file con il suo esito
//! - `complete`: Fine del batch con statistiche finali
//! - `error`: Errore generale

use crate::capabilities::HardwareBackend;
use crate::command_builder::OutputKind;
use crate::config::Config;
use crate::converter::progress_tracker::{ProgressReporter, ProgressUpdate};
use crate::converter::task_converter::{FileOutcome, OutcomeStatus};
use crate::progress::ConversionStats;
use serde::Serialize;
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    #[serde(rename = "start")]
    Start {
        roots: Vec<PathBuf>,
        hardware_backend: HardwareBackend,
        lens_correction_available: bool,
        config: JsonConfig,
    },

    #[serde(rename = "file_start")]
    FileStart { path: PathBuf, index: usize },

    #[serde(rename = "progress")]
    Progress {
        path: PathBuf,
        kind: OutputKind,
        #[serde(flatten)]
        update: ProgressUpdate,
    },

    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        status: &'static str,
        mezzanine: Option<PathBuf>,
        proxy: Option<PathBuf>,
        proxy_skipped: bool,
        error: Option<String>,
    },

    #[serde(rename = "complete")]
    Complete {
        files_processed: usize,
        files_converted: usize,
        files_skipped: usize,
        files_unsupported: usize,
        errors: usize,
        cancelled: usize,
        proxies_generated: usize,
        missing_directories: usize,
        bytes_written: u64,
        duration_seconds: f64,
    },

    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize)]
pub struct JsonConfig {
    pub force_overwrite: bool,
    pub generate_proxy: bool,
    pub scale_proxy: bool,
    pub fisheye_camera_model: Option<String>,
    pub workers: usize,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn file_start(path: PathBuf, index: usize) -> Self {
        Self::FileStart { path, index }
    }

    pub fn file_complete(outcome: &FileOutcome) -> Self {
        let (mezzanine, proxy, proxy_skipped, error) = match &outcome.status {
            OutcomeStatus::Converted {
                mezzanine,
                proxy,
                proxy_skipped,
            } => (Some(mezzanine.clone()), proxy.clone(), *proxy_skipped, None),
            OutcomeStatus::Failed(reason) => (None, None, false, Some(reason.clone())),
            _ => (None, None, false, None),
        };

        Self::FileComplete {
            path: outcome.input.clone(),
            status: outcome.status.label(),
            mezzanine,
            proxy,
            proxy_skipped,
            error,
        }
    }

    pub fn complete(stats: &ConversionStats, duration_seconds: f64) -> Self {
        Self::Complete {
            files_processed: stats.files_seen,
            files_converted: stats.files_converted,
            files_skipped: stats.files_skipped,
            files_unsupported: stats.files_unsupported,
            errors: stats.files_failed,
            cancelled: stats.files_cancelled,
            proxies_generated: stats.proxies_generated,
            missing_directories: stats.missing_directories,
            bytes_written: stats.bytes_written,
            duration_seconds,
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            force_overwrite: config.force_overwrite,
            generate_proxy: config.generate_proxy,
            scale_proxy: config.scale_proxy,
            fisheye_camera_model: config.fisheye_camera_model.clone(),
            workers: config.workers,
        }
    }
}

/// Emits a `progress` event for every tracker update of one encode
pub struct JsonProgressReporter {
    path: PathBuf,
    kind: OutputKind,
}

impl JsonProgressReporter {
    pub fn new(path: PathBuf, kind: OutputKind) -> Self {
        Self { path, kind }
    }

    fn message(&self, update: &ProgressUpdate) -> JsonMessage {
        JsonMessage::Progress {
            path: self.path.clone(),
            kind: self.kind,
            update: update.clone(),
        }
    }
}

impl ProgressReporter for JsonProgressReporter {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.message(update).emit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_progress_event_is_flat() {
        let reporter = JsonProgressReporter::new(PathBuf::from("/f/clip.mov"), OutputKind::Proxy);
        let message = reporter.message(&ProgressUpdate {
            current_frame: 60,
            total_frames: 240,
            elapsed: Duration::from_secs(10),
            eta: Duration::from_secs(30),
            percent: 25.0,
        });

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["kind"], "proxy");
        assert_eq!(json["current_frame"], 60);
        assert_eq!(json["eta_seconds"], 30.0);
        assert_eq!(json["percent"], 25.0);
    }

    #[test]
    fn test_file_complete_for_converted_and_failed() {
        let converted = FileOutcome::new(
            "/f/clip.mov",
            OutcomeStatus::Converted {
                mezzanine: PathBuf::from("/f/clip_prores.mov"),
                proxy: None,
                proxy_skipped: true,
            },
        );
        let json = serde_json::to_value(JsonMessage::file_complete(&converted)).unwrap();
        assert_eq!(json["type"], "file_complete");
        assert_eq!(json["status"], "converted");
        assert_eq!(json["mezzanine"], "/f/clip_prores.mov");
        assert_eq!(json["proxy_skipped"], true);
        assert!(json["error"].is_null());

        let failed = FileOutcome::new("/f/bad.mov", OutcomeStatus::Failed("exit status: 1".to_string()));
        let json = serde_json::to_value(JsonMessage::file_complete(&failed)).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "exit status: 1");
    }

    #[test]
    fn test_start_carries_config() {
        let config = Config {
            generate_proxy: true,
            workers: 3,
            ..Default::default()
        };
        let message = JsonMessage::Start {
            roots: vec![PathBuf::from("/footage")],
            hardware_backend: HardwareBackend::Cuda,
            lens_correction_available: false,
            config: JsonConfig::from(&config),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "start");
        assert_eq!(json["hardware_backend"], "cuda");
        assert_eq!(json["config"]["generate_proxy"], true);
        assert_eq!(json["config"]["workers"], 3);
    }
}
