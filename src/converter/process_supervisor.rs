//! # Process Supervisor Module
//!
//! Avvia ffmpeg, unisce stdout e stderr in un unico stream di righe e lo
//! consuma mentre il processo gira, passando ogni riga al `ProgressTracker`.
//!
//! ## Dettagli:
//! - stdin chiuso (`Stdio::null()`), nessun timeout
//! - due task di lettura (stdout, stderr) inoltrano righe su un canale mpsc:
//!   il consumer legge di continuo, così ffmpeg non si blocca su una pipe piena
//! - le righe sono separate sia da `\n` sia da `\r` (ffmpeg riscrive la riga
//!   di stato con carriage return)
//! - exit code 0 = successo, altrimenti `ConvertError::EncodeFailure` con le
//!   ultime righe di output
//! - un `CancellationToken` attivato termina il figlio e rimuove l'output parziale

use crate::command_builder::EncodeCommand;
use crate::config::Config;
use crate::converter::progress_tracker::{ProgressReporter, ProgressTracker};
use crate::error::{ConvertError, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Non-progress lines kept for the failure report
const TAIL_LINES: usize = 5;
const LINE_CHANNEL_CAPACITY: usize = 256;

/// Launches and supervises encoder processes
pub struct ProcessSupervisor {
    program: PathBuf,
}

impl ProcessSupervisor {
    pub fn new(config: &Config) -> Self {
        Self::with_program(config.ffmpeg.clone())
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self { program }
    }

    /// Run one encode invocation to completion
    pub async fn run(
        &self,
        command: &EncodeCommand,
        tracker: &mut ProgressTracker,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        self.run_args(&command.output, &command.args, tracker, reporter, cancel)
            .await
    }

    pub async fn run_args(
        &self,
        output: &Path,
        args: &[String],
        tracker: &mut ProgressTracker,
        reporter: &dyn ProgressReporter,
        cancel: &CancellationToken,
    ) -> Result<ExitStatus> {
        if cancel.is_cancelled() {
            return Err(ConvertError::Cancelled);
        }

        debug!("Running {} {}", self.program.display(), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ConvertError::EncodeFailure {
                output: output.to_path_buf(),
                status: "not started".to_string(),
                tail: format!("failed to execute {}: {}", self.program.display(), e),
            })?;

        let (tx, mut rx) = mpsc::channel::<String>(LINE_CHANNEL_CAPACITY);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_lines(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_lines(stderr, tx.clone()));
        }
        drop(tx);

        let mut tail: VecDeque<String> = VecDeque::with_capacity(TAIL_LINES);

        // Drain the merged stream until both pipes close.
        loop {
            tokio::select! {
                line = rx.recv() => match line {
                    Some(line) => match tracker.observe(&line) {
                        Some(update) => reporter.on_progress(&update),
                        None => {
                            debug!("ffmpeg: {}", line);
                            if tail.len() == TAIL_LINES {
                                tail.pop_front();
                            }
                            tail.push_back(line);
                        }
                    },
                    None => break,
                },
                _ = cancel.cancelled() => {
                    return Err(Self::abort(&mut child, output).await);
                }
            }
        }

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                return Err(Self::abort(&mut child, output).await);
            }
        };

        if status.success() {
            Ok(status)
        } else {
            Err(ConvertError::encode_failure(
                output.to_path_buf(),
                status,
                tail.make_contiguous(),
            ))
        }
    }

    async fn abort(child: &mut Child, output: &Path) -> ConvertError {
        warn!("Interrupted, stopping encoder for {}", output.display());
        if let Err(e) = child.kill().await {
            warn!("Failed to kill encoder process: {}", e);
        }
        if tokio::fs::remove_file(output).await.is_ok() {
            debug!("Removed partial output {}", output.display());
        }
        ConvertError::Cancelled
    }
}

/// Split a byte stream on `\n` and `\r` and forward non-empty lines
pub(crate) async fn forward_lines<R>(mut reader: R, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; 4096];
    let mut pending: Vec<u8> = Vec::new();

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Encoder stream closed with error: {}", e);
                break;
            }
        };

        for &byte in &buf[..n] {
            if byte == b'\n' || byte == b'\r' {
                if !pending.is_empty() {
                    let line = String::from_utf8_lossy(&pending).into_owned();
                    pending.clear();
                    if tx.send(line).await.is_err() {
                        return;
                    }
                }
            } else {
                pending.push(byte);
            }
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(String::from_utf8_lossy(&pending).into_owned()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::progress_tracker::ProgressUpdate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingReporter {
        frames: Mutex<Vec<u64>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn on_progress(&self, update: &ProgressUpdate) {
            self.frames.lock().unwrap().push(update.current_frame);
        }
    }

    async fn collect(input: &'static [u8]) -> Vec<String> {
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(forward_lines(input, tx));
        let mut lines = Vec::new();
        while let Some(line) = rx.recv().await {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_forward_lines_splits_on_carriage_returns() {
        let lines = collect(b"header\nframe=   1 fps=0\rframe=   2 fps=0\r\nlast").await;
        assert_eq!(lines, vec!["header", "frame=   1 fps=0", "frame=   2 fps=0", "last"]);
    }

    #[tokio::test]
    async fn test_forward_lines_empty_stream() {
        assert!(collect(b"").await.is_empty());
        assert!(collect(b"\r\n\n").await.is_empty());
    }

    #[cfg(unix)]
    fn sh() -> ProcessSupervisor {
        ProcessSupervisor::with_program(PathBuf::from("sh"))
    }

    #[cfg(unix)]
    fn script(body: &str) -> Vec<String> {
        vec!["-c".to_string(), body.to_string()]
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_progress_from_merged_streams() {
        let reporter = RecordingReporter::default();
        let mut tracker = ProgressTracker::new(30);
        let status = sh()
            .run_args(
                Path::new("unused.mov"),
                &script("printf 'frame=   10 fps=0\\r' >&2; echo 'frame=20'; printf 'frame=   30 fps=9\\n' >&2"),
                &mut tracker,
                &reporter,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert!(status.success());
        let mut frames = reporter.frames.lock().unwrap().clone();
        frames.sort_unstable();
        assert_eq!(frames, vec![10, 20, 30]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_encode_failure() {
        let reporter = RecordingReporter::default();
        let mut tracker = ProgressTracker::new(0);
        let err = sh()
            .run_args(
                Path::new("clip_prores.mov"),
                &script("echo 'Unknown encoder' >&2; exit 3"),
                &mut tracker,
                &reporter,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            ConvertError::EncodeFailure { output, tail, .. } => {
                assert_eq!(output, PathBuf::from("clip_prores.mov"));
                assert!(tail.contains("Unknown encoder"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_encode_failure() {
        let supervisor = ProcessSupervisor::with_program(PathBuf::from("nonexistent_ffmpeg_xyz_12345"));
        let reporter = RecordingReporter::default();
        let mut tracker = ProgressTracker::new(0);
        let err = supervisor
            .run_args(Path::new("out.mov"), &[], &mut tracker, &reporter, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::EncodeFailure { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let reporter = RecordingReporter::default();
        let mut tracker = ProgressTracker::new(0);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = sh()
            .run_args(
                Path::new("nonexistent_partial_output.mov"),
                &script("sleep 30"),
                &mut tracker,
                &reporter,
                &cancel,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::Cancelled));
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_removes_partial_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("clip_prores.mov");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            trigger.cancel();
        });

        // Child writes part of the output, then stalls like a long encode.
        let body = format!("printf 'partial' > '{}'; sleep 30", output.display());
        let reporter = RecordingReporter::default();
        let mut tracker = ProgressTracker::new(0);
        let err = sh()
            .run_args(&output, &script(&body), &mut tracker, &reporter, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ConvertError::Cancelled));
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_already_cancelled_never_spawns() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let reporter = RecordingReporter::default();
        let mut tracker = ProgressTracker::new(0);
        let err = ProcessSupervisor::with_program(PathBuf::from("nonexistent_ffmpeg_xyz_12345"))
            .run_args(Path::new("out.mov"), &[], &mut tracker, &reporter, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::Cancelled));
    }
}
