//! # Batch Converter Main Orchestrator
//!
//! Orchestratore del batch che delega la conversione di ogni file al
//! `TaskConverter`.
//!
//! ## Flusso:
//! 1. Per ogni root: verifica che sia una directory esistente, altrimenti
//!    `error!` e outcome `DirectoryMissing`, poi la root successiva
//! 2. Discovery completa della root prima di avviare i job
//! 3. Dispatch con al massimo `config.workers` job in volo (`Semaphore`)
//! 4. Raccolta degli outcome in ordine di discovery e report finale

use crate::{
    capabilities::Capabilities,
    config::Config,
    converter::{
        output_locks::OutputLocks,
        task_converter::{FileOutcome, OutcomeStatus, TaskConverter},
    },
    error::ConvertError,
    file_manager::FileManager,
    json_output::{JsonConfig, JsonMessage},
    progress::ConversionStats,
};
use indicatif::MultiProgress;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Orchestratore del batch
pub struct BatchConverter {
    config: Arc<Config>,
    capabilities: Arc<Capabilities>,
    cancel: CancellationToken,
    task_converter: Arc<TaskConverter>,
    semaphore: Arc<Semaphore>,
}

impl BatchConverter {
    /// `progress` holds the frame bars of every worker
    pub fn new(
        config: Arc<Config>,
        capabilities: Arc<Capabilities>,
        cancel: CancellationToken,
        progress: MultiProgress,
    ) -> Self {
        let task_converter = Arc::new(TaskConverter::new(
            config.clone(),
            capabilities.clone(),
            Arc::new(OutputLocks::new()),
            cancel.clone(),
            progress,
        ));
        let semaphore = Arc::new(Semaphore::new(config.workers.max(1)));

        Self {
            config,
            capabilities,
            cancel,
            task_converter,
            semaphore,
        }
    }

    /// Convert every file under `roots`, returning one outcome per file or missing root
    pub async fn run(&self, roots: &[PathBuf]) -> Vec<FileOutcome> {
        let start_time = Instant::now();
        self.emit_start_message(roots);
        self.log_configuration();

        let mut outcomes = Vec::new();
        let mut index = 0;

        for root in roots {
            if self.cancel.is_cancelled() {
                break;
            }

            if !root.is_dir() {
                error!("{}", ConvertError::DirectoryMissing(root.clone()));
                outcomes.push(FileOutcome::new(root, OutcomeStatus::DirectoryMissing));
                continue;
            }

            let files = match FileManager::find_files(root, self.config.skip_converted_outputs) {
                Ok(files) => files,
                Err(e) => {
                    error!("Failed to list {}: {}", root.display(), e);
                    outcomes.push(FileOutcome::new(root, OutcomeStatus::DirectoryMissing));
                    continue;
                }
            };

            info!("Scanning {}: {} files found", root.display(), files.len());
            outcomes.extend(self.process_files_concurrently(files, &mut index).await);
        }

        let stats = Self::collect_stats(&outcomes);
        self.print_final_stats(&stats, start_time.elapsed().as_secs_f64());
        outcomes
    }

    /// Processa i file di una root con concorrenza limitata
    async fn process_files_concurrently(&self, files: Vec<PathBuf>, index: &mut usize) -> Vec<FileOutcome> {
        let mut tasks: Vec<(PathBuf, JoinHandle<FileOutcome>)> = Vec::with_capacity(files.len());

        for file_path in files {
            // Queued files are not started once cancelled.
            let permit = tokio::select! {
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.cancel.cancelled() => break,
            };

            let task_converter = self.task_converter.clone();
            let json_output = self.config.json_output;
            let file_index = *index;
            *index += 1;
            let path = file_path.clone();

            let task = tokio::spawn(async move {
                let _permit = permit;

                if json_output {
                    JsonMessage::file_start(path.clone(), file_index).emit();
                }

                let outcome = task_converter.process(&path).await;

                if json_output {
                    JsonMessage::file_complete(&outcome).emit();
                }
                outcome
            });

            tasks.push((file_path, task));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (file_path, task) in tasks {
            match task.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("Task failed for {}: {}", file_path.display(), e);
                    outcomes.push(FileOutcome::new(file_path, OutcomeStatus::Failed(e.to_string())));
                }
            }
        }
        outcomes
    }

    fn collect_stats(outcomes: &[FileOutcome]) -> ConversionStats {
        let mut stats = ConversionStats::new();
        for outcome in outcomes {
            match &outcome.status {
                OutcomeStatus::Converted { proxy, proxy_skipped, .. } => {
                    stats.add_converted(outcome.bytes_written, proxy.is_some(), *proxy_skipped)
                }
                OutcomeStatus::SkippedExists => stats.add_skipped(),
                OutcomeStatus::Unsupported => stats.add_unsupported(),
                OutcomeStatus::Failed(_) => stats.add_error(),
                OutcomeStatus::Cancelled => stats.add_cancelled(),
                OutcomeStatus::DirectoryMissing => stats.add_missing_directory(),
            }
        }
        stats
    }

    /// Invia messaggio di inizio
    fn emit_start_message(&self, roots: &[PathBuf]) {
        if self.config.json_output {
            JsonMessage::Start {
                roots: roots.to_vec(),
                hardware_backend: self.capabilities.hardware_backend,
                lens_correction_available: self.capabilities.lens_correction_available,
                config: JsonConfig::from(self.config.as_ref()),
            }
            .emit();
        } else {
            let listing: Vec<String> = roots.iter().map(|r| r.display().to_string()).collect();
            info!("Starting ProRes conversion in: {}", listing.join(", "));
        }
    }

    /// Logga configurazione (solo se non JSON mode)
    fn log_configuration(&self) {
        if let Some(ref model) = self.config.fisheye_camera_model {
            if !self.capabilities.lens_correction_available {
                warn!(
                    "Fisheye correction for '{}' requested but ffmpeg has no lensfun filter, converting without it",
                    model
                );
            }
        }

        if self.config.json_output {
            return;
        }

        info!("Decode: {}", self.capabilities.hardware_backend.description());
        if self.config.force_overwrite {
            info!("Overwrite mode: existing outputs will be replaced");
        }
        if self.config.generate_proxy {
            info!(
                "Proxy: H.264{}",
                if self.config.scale_proxy { ", half resolution" } else { "" }
            );
        }
        if let Some(ref model) = self.config.fisheye_camera_model {
            if self.capabilities.lens_correction_available {
                info!("Fisheye correction: {}", model);
            }
        }
        debug!("Workers: {}", self.config.workers);
    }

    fn print_final_stats(&self, stats: &ConversionStats, duration_seconds: f64) {
        if self.config.json_output {
            JsonMessage::complete(stats, duration_seconds).emit();
        } else {
            info!("{}", stats.format_summary());
            info!("Completed in {:.2}s", duration_seconds);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use tempfile::TempDir;

    fn hidden_progress() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn converter(config: Config) -> BatchConverter {
        BatchConverter::new(
            Arc::new(config),
            Arc::new(Capabilities::default()),
            CancellationToken::new(),
            hidden_progress(),
        )
    }

    fn offline_config() -> Config {
        Config {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg_xyz_12345"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe_xyz_12345"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_root_does_not_stop_siblings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("readme.txt"), b"notes").unwrap();
        let missing = dir.path().join("does_not_exist");

        let outcomes = converter(offline_config())
            .run(&[missing.clone(), dir.path().to_path_buf()])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].input, missing);
        assert_eq!(outcomes[0].status, OutcomeStatus::DirectoryMissing);
        assert_eq!(outcomes[1].status, OutcomeStatus::Unsupported);
    }

    #[tokio::test]
    async fn test_outcomes_in_discovery_order_with_workers() {
        let dir = TempDir::new().unwrap();
        for name in ["a.mov", "b.txt", "c.mkv", "d.avi"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::write(dir.path().join("a_prores.mov"), b"done").unwrap();
        std::fs::write(dir.path().join("c_prores.mkv"), b"done").unwrap();
        std::fs::write(dir.path().join("d_prores.avi"), b"done").unwrap();

        let config = Config {
            workers: 3,
            skip_converted_outputs: true,
            ..offline_config()
        };
        let outcomes = converter(config).run(&[dir.path().to_path_buf()]).await;

        let names: Vec<String> = outcomes
            .iter()
            .map(|o| o.input.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mov", "b.txt", "c.mkv", "d.avi"]);
        assert_eq!(outcomes[0].status, OutcomeStatus::SkippedExists);
        assert_eq!(outcomes[1].status, OutcomeStatus::Unsupported);
        assert_eq!(outcomes[2].status, OutcomeStatus::SkippedExists);
        assert_eq!(outcomes[3].status, OutcomeStatus::SkippedExists);
    }

    #[tokio::test]
    async fn test_cancelled_batch_starts_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("clip.mov"), b"x").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let batch = BatchConverter::new(
            Arc::new(offline_config()),
            Arc::new(Capabilities::default()),
            cancel,
            hidden_progress(),
        );

        assert!(batch.run(&[dir.path().to_path_buf()]).await.is_empty());
    }

    #[test]
    fn test_stats_from_outcomes() {
        let outcomes = vec![
            FileOutcome {
                input: PathBuf::from("a.mov"),
                status: OutcomeStatus::Converted {
                    mezzanine: PathBuf::from("a_prores.mov"),
                    proxy: Some(PathBuf::from("a_proxy.mp4")),
                    proxy_skipped: false,
                },
                bytes_written: 10,
            },
            FileOutcome::new("b.mov", OutcomeStatus::SkippedExists),
            FileOutcome::new("c.mov", OutcomeStatus::Failed("boom".to_string())),
            FileOutcome::new("/missing", OutcomeStatus::DirectoryMissing),
        ];

        let stats = BatchConverter::collect_stats(&outcomes);
        assert_eq!(stats.files_seen, 3);
        assert_eq!(stats.files_converted, 1);
        assert_eq!(stats.proxies_generated, 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.missing_directories, 1);
        assert_eq!(stats.bytes_written, 10);
    }
}
