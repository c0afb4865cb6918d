//! # Media Probe Module
//!
//! Questo modulo interroga ffprobe per ottenere le proprietà dei file video.
//!
//! ## Responsabilità:
//! - Lettura numero di frame, durata e codec del primo stream video
//! - Lettura codec del primo stream audio
//! - Parsing dell'output JSON di ffprobe
//! - Degradazione a `MediaInfo::default()` in caso di errore
//!
//! ## Invocazioni:
//! - `ffprobe -v error -select_streams v:0 -show_entries stream=nb_frames,codec_name,duration -of json`
//! - `ffprobe -v error -select_streams a:0 -show_entries stream=codec_name -of json`
//!
//! ## Gestione errori:
//! Un probe fallito non deve mai interrompere il batch: tool assente, exit
//! code non zero, JSON malformato o stream mancante producono un warning e
//! i valori di default (0 frame, 0.0s, codec "Unknown"). Nessun timeout.
//!
//! ## Esempio:
//! ```ignore
//! let prober = MediaProber::new(&config);
//! let info = prober.probe(&video_path).await;
//! println!("{} frames", info.frame_count);
//! ```

use crate::config::Config;
use crate::error::{ConvertError, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

const UNKNOWN_CODEC: &str = "Unknown";
/// Largest frame count an `f64` holds exactly
const MAX_FRAME_COUNT: f64 = 9_007_199_254_740_992.0;

/// Per-stream properties of one input file
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    pub frame_count: u64,
    pub duration_seconds: f64,
    pub video_codec: String,
    pub audio_codec: String,
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self {
            frame_count: 0,
            duration_seconds: 0.0,
            video_codec: UNKNOWN_CODEC.to_string(),
            audio_codec: UNKNOWN_CODEC.to_string(),
        }
    }
}

/// Video stream fields as reported by ffprobe
#[derive(Debug, Clone, PartialEq)]
pub struct VideoStream {
    pub frame_count: u64,
    pub duration_seconds: f64,
    pub codec: String,
}

/// Queries ffprobe for stream metadata
pub struct MediaProber {
    ffprobe: PathBuf,
}

impl MediaProber {
    pub fn new(config: &Config) -> Self {
        Self {
            ffprobe: config.ffprobe.clone(),
        }
    }

    /// Probe a file, degrading to the default `MediaInfo` on any failure
    pub async fn probe(&self, path: &Path) -> MediaInfo {
        match self.try_probe(path).await {
            Ok(info) => {
                debug!(
                    "Probed {}: {} frames, {:.2}s, video {}, audio {}",
                    path.display(),
                    info.frame_count,
                    info.duration_seconds,
                    info.video_codec,
                    info.audio_codec
                );
                info
            }
            Err(e) => {
                warn!("Error getting file info for {}: {}", path.display(), e);
                MediaInfo::default()
            }
        }
    }

    async fn try_probe(&self, path: &Path) -> Result<MediaInfo> {
        let video_json = self
            .run_ffprobe(path, "v:0", "stream=nb_frames,codec_name,duration")
            .await?;
        let video = parse_video_stream(&video_json).map_err(|reason| ConvertError::ProbeFailure {
            path: path.to_path_buf(),
            reason,
        })?;

        let audio_json = self.run_ffprobe(path, "a:0", "stream=codec_name").await?;
        let audio_codec = parse_audio_stream(&audio_json).map_err(|reason| {
            ConvertError::ProbeFailure {
                path: path.to_path_buf(),
                reason,
            }
        })?;

        Ok(MediaInfo {
            frame_count: video.frame_count,
            duration_seconds: video.duration_seconds,
            video_codec: video.codec,
            audio_codec,
        })
    }

    async fn run_ffprobe(&self, path: &Path, stream: &str, entries: &str) -> Result<String> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-select_streams", stream, "-show_entries", entries, "-of", "json"])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ConvertError::ProbeFailure {
                path: path.to_path_buf(),
                reason: format!("failed to execute {}: {}", self.ffprobe.display(), e),
            })?;

        if !output.status.success() {
            return Err(ConvertError::ProbeFailure {
                path: path.to_path_buf(),
                reason: format!(
                    "ffprobe exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Parse the `-select_streams v:0` JSON document.
///
/// A missing video stream is an error; missing fields fall back to defaults.
pub fn parse_video_stream(json: &str) -> std::result::Result<VideoStream, String> {
    let stream = first_stream(json)?.ok_or_else(|| "no video stream".to_string())?;

    Ok(VideoStream {
        frame_count: count_field(&stream, "nb_frames").unwrap_or(0),
        duration_seconds: number_field(&stream, "duration")
            .map(|d| d.max(0.0))
            .unwrap_or(0.0),
        codec: codec_field(&stream),
    })
}

/// Parse the `-select_streams a:0` JSON document.
///
/// Files without audio simply report `"Unknown"`.
pub fn parse_audio_stream(json: &str) -> std::result::Result<String, String> {
    Ok(first_stream(json)?
        .map(|stream| codec_field(&stream))
        .unwrap_or_else(|| UNKNOWN_CODEC.to_string()))
}

fn first_stream(json: &str) -> std::result::Result<Option<Value>, String> {
    let metadata: Value =
        serde_json::from_str(json).map_err(|e| format!("malformed ffprobe output: {}", e))?;
    Ok(metadata["streams"]
        .as_array()
        .and_then(|streams| streams.first())
        .cloned())
}

// ffprobe prints numeric stream fields as JSON strings ("nb_frames": "240").
fn number_field(stream: &Value, key: &str) -> Option<f64> {
    let value = match &stream[key] {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    value.filter(|n| n.is_finite())
}

/// Integral, non-negative counts only; anything else is treated as unknown
fn count_field(stream: &Value, key: &str) -> Option<u64> {
    number_field(stream, key)
        .filter(|n| *n >= 0.0 && n.fract() == 0.0 && *n <= MAX_FRAME_COUNT)
        .map(|n| n as u64)
}

fn codec_field(stream: &Value) -> String {
    stream["codec_name"]
        .as_str()
        .unwrap_or(UNKNOWN_CODEC)
        .to_string()
}
