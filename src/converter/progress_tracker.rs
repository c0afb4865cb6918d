//! # Progress Tracking Module
//!
//! Parser riga per riga dello stream di stato di ffmpeg e calcolo di
//! elapsed, ETA e percentuale per una singola invocazione di encode.
//!
//! Lo stato (`ProgressState`) appartiene a un solo tracker e viene scartato
//! quando il processo termina: nessuno storico viene conservato.

use serde::Serialize;
use std::time::{Duration, Instant};

/// Marker preceding the frame counter in ffmpeg status lines
pub const FRAME_MARKER: &str = "frame=";

/// Result of parsing one status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUpdate {
    Frame(u64),
    NoUpdate,
}

/// Extract the frame number from a status line.
///
/// ffmpeg pads the counter (`frame=  120 fps=...`), so whitespace after the
/// marker is skipped before reading up to the next whitespace.
pub fn parse_frame_line(line: &str) -> FrameUpdate {
    let Some(start) = line.find(FRAME_MARKER) else {
        return FrameUpdate::NoUpdate;
    };

    line[start + FRAME_MARKER.len()..]
        .split_whitespace()
        .next()
        .and_then(|token| token.parse::<u64>().ok())
        .map_or(FrameUpdate::NoUpdate, FrameUpdate::Frame)
}

/// Mutable progress of one encode invocation
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub current_frame: u64,
    pub total_frames: u64,
    pub start_time: Instant,
}

/// Snapshot published after each parsed status line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    pub current_frame: u64,
    pub total_frames: u64,
    #[serde(rename = "elapsed_seconds", serialize_with = "as_secs_f64")]
    pub elapsed: Duration,
    #[serde(rename = "eta_seconds", serialize_with = "as_secs_f64")]
    pub eta: Duration,
    pub percent: f64,
}

fn as_secs_f64<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Receives progress updates while an encode runs
pub trait ProgressReporter: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

/// Per-invocation frame tracker
pub struct ProgressTracker {
    state: ProgressState,
}

impl ProgressTracker {
    pub fn new(total_frames: u64) -> Self {
        Self::starting_at(total_frames, Instant::now())
    }

    pub fn starting_at(total_frames: u64, start_time: Instant) -> Self {
        Self {
            state: ProgressState {
                current_frame: 0,
                total_frames,
                start_time,
            },
        }
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    /// Feed one line of encoder output
    pub fn observe(&mut self, line: &str) -> Option<ProgressUpdate> {
        self.observe_at(line, Instant::now())
    }

    /// Feed one line with an explicit clock reading
    pub fn observe_at(&mut self, line: &str, now: Instant) -> Option<ProgressUpdate> {
        match parse_frame_line(line) {
            FrameUpdate::Frame(frame) => {
                self.state.current_frame = frame;
                Some(self.snapshot(now))
            }
            FrameUpdate::NoUpdate => None,
        }
    }

    fn snapshot(&self, now: Instant) -> ProgressUpdate {
        let ProgressState {
            current_frame,
            total_frames,
            start_time,
        } = self.state;
        let elapsed = now.saturating_duration_since(start_time);

        ProgressUpdate {
            current_frame,
            total_frames,
            elapsed,
            eta: estimate_remaining(elapsed, current_frame, total_frames),
            percent: percent_complete(current_frame, total_frames),
        }
    }
}

/// `elapsed * (total - current) / current`, zero before the first frame.
///
/// Saturates at `Duration::MAX` for totals too large to represent.
pub fn estimate_remaining(elapsed: Duration, current_frame: u64, total_frames: u64) -> Duration {
    if current_frame == 0 {
        return Duration::ZERO;
    }
    let remaining = total_frames.saturating_sub(current_frame);
    let seconds = elapsed.as_secs_f64() * remaining as f64 / current_frame as f64;
    Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
}

/// `current / total * 100`, zero when the total is unknown
pub fn percent_complete(current_frame: u64, total_frames: u64) -> f64 {
    if total_frames == 0 {
        return 0.0;
    }
    current_frame as f64 / total_frames as f64 * 100.0
}
