//! # Progress Reporting and Statistics Module
//!
//! Questo modulo gestisce il feedback visivo e le statistiche del batch.
//!
//! ## Responsabilità:
//! - Progress bar per frame con `indicatif` per ogni invocazione di ffmpeg,
//!   tutte dentro un unico `MultiProgress` condiviso tra i worker
//! - Writer per `tracing` che sospende le barre mentre stampa un log
//! - Tempo elapsed, ETA e percentuale calcolati dal `ProgressTracker`
//! - Tracking statistiche di conversione (convertiti, saltati, errori)
//! - Report finale con statistiche aggregate
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:01:12] [=========================>--------------] 150/240 (62%) Elapsed 72.10s | ETA 43.26s
//! ```

use crate::converter::progress_tracker::{ProgressReporter, ProgressUpdate};
use crate::file_manager::FileManager;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::Duration;

/// Frame progress bar for one encode invocation
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a frame bar under `multi`; an unknown total gives a spinner instead
    pub fn new(multi: &MultiProgress, label: &str, total_frames: u64) -> Self {
        let bar = if total_frames > 0 {
            let bar = ProgressBar::new(total_frames);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=>-"),
            );
            bar
        } else {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {prefix} [{elapsed_precise}] frame {pos} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner
        };

        let bar = multi.add(bar);
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Remove the bar, e.g. after a failure has been logged
    pub fn abandon(&self, message: &str) {
        self.bar.abandon_with_message(message.to_string());
    }
}

impl ProgressReporter for ProgressManager {
    fn on_progress(&self, update: &ProgressUpdate) {
        let position = match self.bar.length() {
            Some(len) => update.current_frame.min(len),
            None => update.current_frame,
        };
        self.bar.set_position(position);
        self.bar.set_message(format!(
            "Elapsed {:.2}s | ETA {:.2}s | {:.2}%",
            update.elapsed.as_secs_f64(),
            update.eta.as_secs_f64(),
            update.percent
        ));
    }
}

/// `io::Write` for log output that clears the bars while a line is printed
pub struct ProgressWriter {
    multi: MultiProgress,
}

impl ProgressWriter {
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }
}

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.multi.suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// Statistics tracker for batch results
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ConversionStats {
    pub files_seen: usize,
    pub files_converted: usize,
    pub files_skipped: usize,
    pub files_unsupported: usize,
    pub files_failed: usize,
    pub files_cancelled: usize,
    pub proxies_generated: usize,
    pub proxies_skipped: usize,
    pub missing_directories: usize,
    pub bytes_written: u64,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_converted(&mut self, bytes_written: u64, proxy_generated: bool, proxy_skipped: bool) {
        self.files_seen += 1;
        self.files_converted += 1;
        self.bytes_written += bytes_written;
        if proxy_generated {
            self.proxies_generated += 1;
        }
        if proxy_skipped {
            self.proxies_skipped += 1;
        }
    }

    pub fn add_skipped(&mut self) {
        self.files_seen += 1;
        self.files_skipped += 1;
    }

    pub fn add_unsupported(&mut self) {
        self.files_seen += 1;
        self.files_unsupported += 1;
    }

    pub fn add_error(&mut self) {
        self.files_seen += 1;
        self.files_failed += 1;
    }

    pub fn add_cancelled(&mut self) {
        self.files_seen += 1;
        self.files_cancelled += 1;
    }

    pub fn add_missing_directory(&mut self) {
        self.missing_directories += 1;
    }

    pub fn format_summary(&self) -> String {
        let mut summary = format!(
            "Files: {} | Converted: {} | Skipped (exists): {} | Unsupported: {} | Failed: {} | Proxies: {} ({} skipped) | Written: {}",
            self.files_seen,
            self.files_converted,
            self.files_skipped,
            self.files_unsupported,
            self.files_failed,
            self.proxies_generated,
            self.proxies_skipped,
            FileManager::format_size(self.bytes_written),
        );
        if self.files_cancelled > 0 {
            summary.push_str(&format!(" | Cancelled: {}", self.files_cancelled));
        }
        if self.missing_directories > 0 {
            summary.push_str(&format!(" | Missing directories: {}", self.missing_directories));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indicatif::ProgressDrawTarget;

    #[test]
    fn test_stats_accumulate() {
        let mut stats = ConversionStats::new();
        stats.add_converted(2048, true, false);
        stats.add_converted(1024, false, true);
        stats.add_skipped();
        stats.add_unsupported();
        stats.add_error();
        stats.add_missing_directory();

        assert_eq!(stats.files_seen, 5);
        assert_eq!(stats.files_converted, 2);
        assert_eq!(stats.proxies_generated, 1);
        assert_eq!(stats.proxies_skipped, 1);
        assert_eq!(stats.bytes_written, 3072);
        assert_eq!(stats.missing_directories, 1);

        let summary = stats.format_summary();
        assert!(summary.contains("Converted: 2"));
        assert!(summary.contains("Failed: 1"));
        assert!(summary.contains("3.00 KB"));
        assert!(summary.contains("Missing directories: 1"));
        assert!(!summary.contains("Cancelled"));
    }

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn test_bar_position_is_clamped() {
        let manager = ProgressManager::new(&hidden(), "clip.mov", 100);
        manager.on_progress(&ProgressUpdate {
            current_frame: 130,
            total_frames: 100,
            elapsed: Duration::from_secs(1),
            eta: Duration::ZERO,
            percent: 130.0,
        });
        assert_eq!(manager.bar.position(), 100);
        manager.finish("done");
    }

    #[test]
    fn test_concurrent_bars_share_one_multi_progress() {
        let multi = hidden();
        let a = ProgressManager::new(&multi, "a_prores.mov", 10);
        let b = ProgressManager::new(&multi, "b_prores.mov", 0);
        a.on_progress(&ProgressUpdate {
            current_frame: 4,
            total_frames: 10,
            elapsed: Duration::from_secs(1),
            eta: Duration::from_millis(1500),
            percent: 40.0,
        });
        assert_eq!(a.bar.position(), 4);
        assert_eq!(b.bar.position(), 0);
        b.abandon("failed");
        a.finish("done");
    }

    #[test]
    fn test_progress_writer_reports_full_writes() {
        let mut writer = ProgressWriter::new(hidden());
        assert_eq!(writer.write(b"INFO converting\n").unwrap(), 16);
        assert!(writer.flush().is_ok());
    }
}
