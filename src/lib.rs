//! # ProRes Converter Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `media_probe`: Metadati dei file con ffprobe
//! - `capabilities`: Rilevamento di hwaccel e lensfun
//! - `command_builder`: Argomenti delle invocazioni di ffmpeg
//! - `file_manager`: Discovery dei file video
//! - `converter`: Orchestratore del batch e pipeline per file
//! - `progress`: Progress bar e statistiche
//! - `json_output`: Eventi JSON per uso programmatico
//!
//! ## Utilizzo:
//! ```ignore
//! use prores_converter::{BatchConverter, CapabilityDetector, Config};
//!
//! let config = Arc::new(Config::default());
//! let capabilities = Arc::new(CapabilityDetector::new(&config).detect(false).await);
//! let outcomes = BatchConverter::new(config, capabilities, CancellationToken::new(), MultiProgress::new())
//!     .run(&roots)
//!     .await;
//! ```

pub mod capabilities;
pub mod command_builder;
pub mod config;
pub mod converter;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod media_probe;
pub mod platform;
pub mod progress;
pub mod utils;

pub use capabilities::{Capabilities, CapabilityDetector, HardwareBackend};
pub use command_builder::{BuildOutcome, CommandBuilder, ConversionJob, FeatureFlags};
pub use config::Config;
pub use converter::{BatchConverter, FileOutcome, OutcomeStatus};
pub use error::ConvertError;
pub use media_probe::{MediaInfo, MediaProber};
