//! # Converter Module
//!
//! Separa le responsabilità della conversione in sottomoduli:
//! - `batch_converter`: Orchestratore del batch e pool di worker
//! - `task_converter`: Pipeline per singolo file
//! - `process_supervisor`: Avvio e supervisione di ffmpeg
//! - `progress_tracker`: Parsing delle righe di stato ed ETA
//! - `path_resolver`: Calcolo dei path di output
//! - `output_locks`: Esclusione per path di output tra job concorrenti

pub mod batch_converter;
pub mod output_locks;
pub mod path_resolver;
pub mod process_supervisor;
pub mod progress_tracker;
pub mod task_converter;

pub use batch_converter::BatchConverter;
pub use path_resolver::PathResolver;
pub use process_supervisor::ProcessSupervisor;
pub use progress_tracker::{ProgressReporter, ProgressTracker};
pub use task_converter::{FileOutcome, OutcomeStatus, TaskConverter};
