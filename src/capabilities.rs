//! # Capability Detection Module
//!
//! Interroga ffmpeg una sola volta per processo per scoprire:
//! - il backend di decodifica hardware disponibile (`-hwaccels`)
//! - la presenza del filtro di correzione lenti `lensfun` (`-filters`)
//! - i modelli di camera supportati (`-h filter=lensfun`, solo per `--help`)
//!
//! Il matching è basato su sottostringhe del testo prodotto da ffmpeg, quindi
//! è isolato qui dietro `CapabilityDetector`: i chiamanti vedono solo
//! `Capabilities`. Ogni query fallita degrada a "nessun backend" / "filtro
//! non disponibile" con un warning.

use crate::config::Config;
use crate::error::{ConvertError, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Lens-correction filter name in the `-filters` listing
pub const LENS_CORRECTION_FILTER: &str = "lensfun";

/// Token that precedes the camera model list in the filter help text
pub const CAMERA_MODELS_MARKER: &str = "models:";

/// Hardware decode backend, in detection priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareBackend {
    #[default]
    None,
    /// NVIDIA CUDA / NVDEC
    Cuda,
    /// Intel Quick Sync Video
    Qsv,
}

impl HardwareBackend {
    /// Token searched for (case-insensitively) in the `-hwaccels` listing
    fn token(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Cuda => Some("cuda"),
            Self::Qsv => Some("qsv"),
        }
    }

    /// Decode flags placed before `-i`
    pub fn decode_args(&self) -> &'static [&'static str] {
        match self {
            Self::None => &[],
            Self::Cuda => &["-hwaccel", "cuda"],
            Self::Qsv => &["-hwaccel", "qsv"],
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::None => "software decode",
            Self::Cuda => "NVIDIA CUDA decode",
            Self::Qsv => "Intel Quick Sync decode",
        }
    }
}

/// What the installed ffmpeg can do, shared read-only by every job
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Capabilities {
    pub hardware_backend: HardwareBackend,
    pub lens_correction_available: bool,
    pub supported_camera_models: BTreeSet<String>,
}

/// Runs the ffmpeg capability queries
pub struct CapabilityDetector {
    ffmpeg: PathBuf,
}

impl CapabilityDetector {
    pub fn new(config: &Config) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
        }
    }

    /// Detect capabilities; camera models are only queried when asked for
    pub async fn detect(&self, with_camera_models: bool) -> Capabilities {
        let hardware_backend = match self.query(&["-hide_banner", "-hwaccels"]).await {
            Ok(listing) => parse_hwaccels(&listing),
            Err(e) => {
                warn!("Hardware acceleration query failed, using software decode: {}", e);
                HardwareBackend::None
            }
        };

        let lens_correction_available = match self.query(&["-hide_banner", "-filters"]).await {
            Ok(listing) => parse_filters(&listing),
            Err(e) => {
                warn!("Filter query failed, lens correction disabled: {}", e);
                false
            }
        };

        let mut supported_camera_models = BTreeSet::new();
        if with_camera_models && lens_correction_available {
            let help_arg = format!("filter={}", LENS_CORRECTION_FILTER);
            match self.query(&["-hide_banner", "-h", &help_arg]).await {
                Ok(help) => supported_camera_models = parse_camera_models(&help),
                Err(e) => warn!("Could not list camera models: {}", e),
            }
        }

        info!(
            "Capabilities: {}, lens correction {}",
            hardware_backend.description(),
            if lens_correction_available { "available" } else { "unavailable" }
        );

        Capabilities {
            hardware_backend,
            lens_correction_available,
            supported_camera_models,
        }
    }

    async fn query(&self, args: &[&str]) -> Result<String> {
        let output = Command::new(&self.ffmpeg)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ConvertError::CapabilityDetection(format!(
                    "failed to run {} {}: {}",
                    self.ffmpeg.display(),
                    args.join(" "),
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(ConvertError::CapabilityDetection(format!(
                "{} {} exited with {}",
                self.ffmpeg.display(),
                args.join(" "),
                output.status
            )));
        }

        // Some ffmpeg builds print help listings on stderr.
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push('\n');
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        debug!("{} {} -> {} bytes", self.ffmpeg.display(), args.join(" "), text.len());
        Ok(text)
    }
}

/// First matching backend from the `-hwaccels` listing
pub fn parse_hwaccels(listing: &str) -> HardwareBackend {
    let listing = listing.to_lowercase();
    [HardwareBackend::Cuda, HardwareBackend::Qsv]
        .into_iter()
        .find(|backend| backend.token().is_some_and(|token| listing.contains(token)))
        .unwrap_or(HardwareBackend::None)
}

/// Whether the `-filters` listing includes the lens-correction filter
pub fn parse_filters(listing: &str) -> bool {
    listing
        .lines()
        .any(|line| line.split_whitespace().any(|word| word == LENS_CORRECTION_FILTER))
}

/// Camera model names following `CAMERA_MODELS_MARKER` in the help text.
///
/// Best effort: everything after the marker up to the first blank line is
/// split on commas and newlines.
pub fn parse_camera_models(help: &str) -> BTreeSet<String> {
    let lower = help.to_ascii_lowercase();
    let Some(start) = lower.find(CAMERA_MODELS_MARKER) else {
        return BTreeSet::new();
    };

    let tail = &help[start + CAMERA_MODELS_MARKER.len()..];
    let section = tail.split("\n\n").next().unwrap_or("");

    section
        .split([',', '\n'])
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(str::to_string)
        .collect()
}
