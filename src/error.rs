//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `ConvertError` enum per categorizzare tutti gli errori possibili
//! - Fornisce messaggi di errore descrittivi e strutturati
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `ProbeFailure`: ffprobe mancante, in errore o con output illeggibile
//! - `CapabilityDetection`: query delle capability di ffmpeg fallita
//! - `UnsupportedInput`: estensione non riconosciuta
//! - `OutputExists`: file di destinazione già presente senza `--force`
//! - `EncodeFailure`: ffmpeg terminato con exit code diverso da zero
//! - `DirectoryMissing`: una root passata da CLI non esiste
//! - `NoDirectoriesSupplied`: nessuna directory passata (unico errore fatale)
//!
//! ## Politica di propagazione:
//! - Tutti gli errori sotto la granularità del batch vengono recuperati
//!   localmente e loggati
//! - Solo `NoDirectoriesSupplied` termina il processo (exit code 1)
//!
//! ## Esempio:
//! ```ignore
//! if !root.is_dir() {
//!     return Err(ConvertError::DirectoryMissing(root.to_path_buf()));
//! }
//! ```

use std::path::PathBuf;
use std::process::ExitStatus;

/// Custom error types for batch conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Probe failed for {path}: {reason}")]
    ProbeFailure { path: PathBuf, reason: String },

    #[error("Capability detection failed: {0}")]
    CapabilityDetection(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedInput(PathBuf),

    #[error("Output already exists: {0} (use -f to overwrite)")]
    OutputExists(PathBuf),

    #[error("Encode of {output} failed ({status}): {tail}")]
    EncodeFailure {
        output: PathBuf,
        status: String,
        tail: String,
    },

    #[error("Directory '{0}' does not exist")]
    DirectoryMissing(PathBuf),

    #[error("No directories specified")]
    NoDirectoriesSupplied,

    #[error("Conversion cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Validation(String),
}

impl ConvertError {
    /// Build an encode failure from a finished child's exit status
    pub fn encode_failure(output: PathBuf, status: ExitStatus, tail: &[String]) -> Self {
        Self::EncodeFailure {
            output,
            status: status.to_string(),
            tail: tail.join(" | "),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
