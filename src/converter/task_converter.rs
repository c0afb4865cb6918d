//! # Task Converter Module
//!
//! Worker per la conversione di un singolo file.
//! Separato dall'orchestratore del batch per maggiore modularità.
//!
//! ## Pipeline per file:
//! 1. Estensione non supportata → `Unsupported` (nessun subprocess)
//! 2. Calcolo dei path di output e lock sugli stessi
//! 3. Snapshot di esistenza degli output (sotto lock)
//! 4. Probe dei metadati con ffprobe
//! 5. `CommandBuilder::build` → una o due invocazioni di ffmpeg
//! 6. Ogni invocazione gira con un `ProgressTracker` nuovo

use crate::{
    capabilities::Capabilities,
    command_builder::{BuildOutcome, CommandBuilder, ConversionJob, EncodeCommand, EncodePlan, OutputKind},
    config::Config,
    converter::{
        output_locks::OutputLocks,
        path_resolver::PathResolver,
        process_supervisor::ProcessSupervisor,
        progress_tracker::{ProgressReporter, ProgressTracker},
    },
    error::{ConvertError, Result},
    file_manager::FileManager,
    json_output::JsonProgressReporter,
    media_probe::{MediaInfo, MediaProber},
    progress::ProgressManager,
};
use indicatif::MultiProgress;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one input file
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub status: OutcomeStatus,
    /// Bytes of output written by this job
    pub bytes_written: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutcomeStatus {
    Converted {
        mezzanine: PathBuf,
        proxy: Option<PathBuf>,
        proxy_skipped: bool,
    },
    SkippedExists,
    Unsupported,
    Failed(String),
    Cancelled,
    DirectoryMissing,
}

impl OutcomeStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Converted { .. } => "converted",
            Self::SkippedExists => "skipped_exists",
            Self::Unsupported => "unsupported",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
            Self::DirectoryMissing => "directory_missing",
        }
    }
}

impl FileOutcome {
    pub fn new(input: impl Into<PathBuf>, status: OutcomeStatus) -> Self {
        Self {
            input: input.into(),
            status,
            bytes_written: 0,
        }
    }
}

/// Worker per elaborazione singoli file
pub struct TaskConverter {
    config: Arc<Config>,
    capabilities: Arc<Capabilities>,
    prober: MediaProber,
    supervisor: ProcessSupervisor,
    locks: Arc<OutputLocks>,
    cancel: CancellationToken,
    progress: MultiProgress,
}

impl TaskConverter {
    pub fn new(
        config: Arc<Config>,
        capabilities: Arc<Capabilities>,
        locks: Arc<OutputLocks>,
        cancel: CancellationToken,
        progress: MultiProgress,
    ) -> Self {
        Self {
            prober: MediaProber::new(&config),
            supervisor: ProcessSupervisor::new(&config),
            config,
            capabilities,
            locks,
            cancel,
            progress,
        }
    }

    /// Convert one file; every failure is recovered into the outcome
    pub async fn process(&self, input: &Path) -> FileOutcome {
        if !FileManager::is_video(input) {
            debug!("Skipping unsupported file: {}", input.display());
            return FileOutcome::new(input, OutcomeStatus::Unsupported);
        }

        if self.cancel.is_cancelled() {
            return FileOutcome::new(input, OutcomeStatus::Cancelled);
        }

        match self.convert(input).await {
            Ok(outcome) => outcome,
            Err(ConvertError::Cancelled) => {
                warn!("Cancelled: {}", input.display());
                FileOutcome::new(input, OutcomeStatus::Cancelled)
            }
            Err(e) => {
                error!("Error converting {}: {}", input.display(), e);
                FileOutcome::new(input, OutcomeStatus::Failed(e.to_string()))
            }
        }
    }

    async fn convert(&self, input: &Path) -> Result<FileOutcome> {
        let invalid = |_| ConvertError::UnsupportedInput(input.to_path_buf());
        let mezzanine_output = PathResolver::mezzanine_path(input).map_err(invalid)?;
        let proxy_output = if self.config.generate_proxy {
            Some(PathResolver::proxy_path(input).map_err(invalid)?)
        } else {
            None
        };

        let mut targets = vec![mezzanine_output.as_path()];
        if let Some(ref proxy) = proxy_output {
            targets.push(proxy.as_path());
        }
        let _guard = self.locks.acquire(&targets).await;

        let mezzanine_exists = mezzanine_output.exists();
        let proxy_exists = proxy_output.as_ref().is_some_and(|p| p.exists());
        let flags = self.config.feature_flags();

        // Outputs that would be skipped are not probed either.
        if mezzanine_exists && !flags.force_overwrite {
            info!("Skipping: {}", ConvertError::OutputExists(mezzanine_output.clone()));
            return Ok(FileOutcome::new(input, OutcomeStatus::SkippedExists));
        }

        let media_info = self.prober.probe(input).await;
        self.log_header(input, &media_info);

        let job = ConversionJob {
            input_path: input.to_path_buf(),
            mezzanine_output,
            proxy_output,
            flags,
            media_info,
            mezzanine_exists,
            proxy_exists,
        };

        match CommandBuilder::build(&job, &self.capabilities) {
            BuildOutcome::Unsupported => Ok(FileOutcome::new(input, OutcomeStatus::Unsupported)),
            BuildOutcome::SkippedExists { output } => {
                info!("Skipping: {}", ConvertError::OutputExists(output));
                Ok(FileOutcome::new(input, OutcomeStatus::SkippedExists))
            }
            BuildOutcome::Ready(plan) => self.execute(&job, plan).await,
        }
    }

    async fn execute(&self, job: &ConversionJob, plan: EncodePlan) -> Result<FileOutcome> {
        if plan.proxy_skipped {
            if let Some(ref proxy) = job.proxy_output {
                warn!("Proxy already exists, skipping proxy: {}", proxy.display());
            }
        }

        let mut bytes_written = 0;
        for command in &plan.commands {
            self.run_command(job, command).await?;
            let size = tokio::fs::metadata(&command.output)
                .await
                .map(|m| m.len())
                .unwrap_or(0);
            bytes_written += size;
            info!(
                "✅ {} written: {} ({})",
                match command.kind {
                    OutputKind::Mezzanine => "ProRes",
                    OutputKind::Proxy => "Proxy",
                },
                command.output.display(),
                FileManager::format_size(size)
            );
        }

        let proxy = plan.command(OutputKind::Proxy).map(|c| c.output.clone());
        Ok(FileOutcome {
            input: job.input_path.clone(),
            status: OutcomeStatus::Converted {
                mezzanine: job.mezzanine_output.clone(),
                proxy,
                proxy_skipped: plan.proxy_skipped,
            },
            bytes_written,
        })
    }

    async fn run_command(&self, job: &ConversionJob, command: &EncodeCommand) -> Result<()> {
        let mut tracker = ProgressTracker::new(job.media_info.frame_count);

        let result = if self.config.json_output {
            let reporter = JsonProgressReporter::new(job.input_path.clone(), command.kind);
            self.run_with(command, &mut tracker, &reporter).await
        } else {
            let label = command
                .output
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let bar = ProgressManager::new(&self.progress, &label, job.media_info.frame_count);
            let result = self.run_with(command, &mut tracker, &bar).await;
            match &result {
                Ok(()) => bar.finish("done"),
                Err(_) => bar.abandon("failed"),
            }
            result
        };

        let state = tracker.state();
        debug!(
            "{}: last frame {} of {}",
            command.output.display(),
            state.current_frame,
            state.total_frames
        );
        result
    }

    async fn run_with(
        &self,
        command: &EncodeCommand,
        tracker: &mut ProgressTracker,
        reporter: &dyn ProgressReporter,
    ) -> Result<()> {
        self.supervisor
            .run(command, tracker, reporter, &self.cancel)
            .await
            .map(|_| ())
    }

    fn log_header(&self, input: &Path, info: &MediaInfo) {
        info!("🎬 Converting {}", input.display());
        info!(
            "   video: {} | audio: {} | duration: {:.2}s | frames: {}",
            info.video_codec, info.audio_codec, info.duration_seconds, info.frame_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;
    use tempfile::TempDir;

    // Tool paths that cannot be spawned: any launch would surface as a failure.
    fn config() -> Config {
        Config {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg_xyz_12345"),
            ffprobe: PathBuf::from("/nonexistent/ffprobe_xyz_12345"),
            ..Default::default()
        }
    }

    fn hidden_progress() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn converter(config: Config) -> TaskConverter {
        TaskConverter::new(
            Arc::new(config),
            Arc::new(Capabilities::default()),
            Arc::new(OutputLocks::new()),
            CancellationToken::new(),
            hidden_progress(),
        )
    }

    #[tokio::test]
    async fn test_existing_output_is_left_untouched() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mov");
        let existing = dir.path().join("clip_prores.mov");
        std::fs::write(&input, b"source").unwrap();
        std::fs::write(&existing, b"previous render").unwrap();

        let outcome = converter(config()).process(&input).await;

        assert_eq!(outcome.status, OutcomeStatus::SkippedExists);
        assert_eq!(std::fs::read(&existing).unwrap(), b"previous render");
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("notes.txt");
        std::fs::write(&input, b"hello").unwrap();

        let outcome = converter(config()).process(&input).await;
        assert_eq!(outcome.status, OutcomeStatus::Unsupported);
        assert!(!dir.path().join("notes_prores.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_encoder_is_reported_as_failure() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"source").unwrap();

        let outcome = converter(config()).process(&input).await;
        match outcome.status {
            OutcomeStatus::Failed(reason) => assert!(reason.contains("clip_prores.mp4")),
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mkv");
        std::fs::write(&input, b"source").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let converter = TaskConverter::new(
            Arc::new(config()),
            Arc::new(Capabilities::default()),
            Arc::new(OutputLocks::new()),
            cancel,
            hidden_progress(),
        );

        assert_eq!(converter.process(&input).await.status, OutcomeStatus::Cancelled);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_existing_proxy_is_sub_skipped() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mov");
        let proxy = dir.path().join("clip_proxy.mp4");
        std::fs::write(&input, b"source").unwrap();
        std::fs::write(&proxy, b"old proxy").unwrap();

        // `true` ignores its arguments and exits 0, standing in for the encoder.
        let config = Config {
            generate_proxy: true,
            ffmpeg: PathBuf::from("true"),
            ..config()
        };
        let outcome = converter(config).process(&input).await;

        assert_eq!(
            outcome.status,
            OutcomeStatus::Converted {
                mezzanine: dir.path().join("clip_prores.mov"),
                proxy: None,
                proxy_skipped: true,
            }
        );
        assert_eq!(std::fs::read(&proxy).unwrap(), b"old proxy");
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(OutcomeStatus::SkippedExists.label(), "skipped_exists");
        assert_eq!(OutcomeStatus::Failed(String::new()).label(), "failed");
    }
}
