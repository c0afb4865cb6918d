//! # Command Builder Module
//!
//! Questo modulo costruisce gli argomenti delle invocazioni di ffmpeg per un
//! singolo file. È una funzione pura: nessun I/O, stesso input → stessi
//! argomenti, byte per byte. L'esistenza degli output viene rilevata prima
//! dalla pipeline e arriva qui come snapshot dentro `ConversionJob`.
//!
//! ## Regole (applicate in ordine):
//! 1. Estensione non supportata → `BuildOutcome::Unsupported`
//! 2. Mezzanine esistente senza `--force` → `BuildOutcome::SkippedExists`
//! 3. Comando base: ProRes 422 HQ (`prores_ks`, `prores_hq`, `yuv422p`), audio copiato
//! 4. Backend hardware: `-hwaccel cuda` / `-hwaccel qsv` prima di `-i`
//! 5. Fisheye: `-vf lensfun=...` prima dei flag ProRes (solo mezzanine)
//! 6. Proxy: seconda invocazione indipendente H.264 + AAC, scala opzionale al 50%
//!
//! ## Pipeline dei filtri:
//! Il filtro lensfun non entra mai nella catena del proxy: le due
//! invocazioni hanno filter graph separati.
//!
//! ## Esempio:
//! ```ignore
//! match CommandBuilder::build(&job, &capabilities) {
//!     BuildOutcome::Ready(plan) => for command in plan.commands { /* run */ },
//!     BuildOutcome::SkippedExists { output } => info!("exists: {}", output.display()),
//!     BuildOutcome::Unsupported => {}
//! }
//! ```

use crate::args;
use crate::capabilities::{Capabilities, LENS_CORRECTION_FILTER};
use crate::file_manager::FileManager;
use crate::media_probe::MediaInfo;
use serde::Serialize;
use std::path::{Path, PathBuf};

const PROXY_CRF: u8 = 23;
const PROXY_PRESET: &str = "medium";
const PROXY_AUDIO_BITRATE: &str = "128k";
const HALF_SCALE_FILTER: &str = "scale=trunc(iw/4)*2:trunc(ih/4)*2";

/// Feature switches that shape the commands for one job
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFlags {
    pub force_overwrite: bool,
    pub generate_proxy: bool,
    pub scale_proxy: bool,
    pub fisheye_camera_model: Option<String>,
}

/// Everything the builder needs to know about one input file
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub input_path: PathBuf,
    pub mezzanine_output: PathBuf,
    pub proxy_output: Option<PathBuf>,
    pub flags: FeatureFlags,
    pub media_info: MediaInfo,
    /// Existence of `mezzanine_output` when the job was prepared
    pub mezzanine_exists: bool,
    /// Existence of `proxy_output` when the job was prepared
    pub proxy_exists: bool,
}

/// Which output an encode invocation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Mezzanine,
    Proxy,
}

/// One ffmpeg invocation (program excluded)
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeCommand {
    pub kind: OutputKind,
    pub output: PathBuf,
    pub args: Vec<String>,
}

/// Commands to run for a job, mezzanine first
#[derive(Debug, Clone, PartialEq)]
pub struct EncodePlan {
    pub commands: Vec<EncodeCommand>,
    /// Proxy was requested but its output already exists
    pub proxy_skipped: bool,
}

impl EncodePlan {
    pub fn command(&self, kind: OutputKind) -> Option<&EncodeCommand> {
        self.commands.iter().find(|c| c.kind == kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
    Unsupported,
    SkippedExists { output: PathBuf },
    Ready(EncodePlan),
}

/// Deterministic construction of encoder argument lists
pub struct CommandBuilder;

impl CommandBuilder {
    pub fn build(job: &ConversionJob, capabilities: &Capabilities) -> BuildOutcome {
        if !FileManager::is_video(&job.input_path) {
            return BuildOutcome::Unsupported;
        }

        if job.mezzanine_exists && !job.flags.force_overwrite {
            return BuildOutcome::SkippedExists {
                output: job.mezzanine_output.clone(),
            };
        }

        let mut commands = vec![Self::mezzanine_command(job, capabilities)];
        let mut proxy_skipped = false;

        if job.flags.generate_proxy {
            if let Some(ref proxy_output) = job.proxy_output {
                if job.proxy_exists && !job.flags.force_overwrite {
                    proxy_skipped = true;
                } else {
                    commands.push(Self::proxy_command(job, proxy_output, capabilities));
                }
            }
        }

        BuildOutcome::Ready(EncodePlan {
            commands,
            proxy_skipped,
        })
    }

    fn mezzanine_command(job: &ConversionJob, capabilities: &Capabilities) -> EncodeCommand {
        let mut args = Self::input_args(job, capabilities);

        if let Some(filter) = Self::lens_correction_filter(job, capabilities) {
            args.extend(args!["-vf", filter]);
        }

        args.extend(args![
            "-c:v", "prores_ks",
            "-profile:v", "prores_hq",
            "-pix_fmt", "yuv422p",
            "-c:a", "copy",
        ]);
        args.push(job.mezzanine_output.to_string_lossy().into_owned());

        EncodeCommand {
            kind: OutputKind::Mezzanine,
            output: job.mezzanine_output.clone(),
            args,
        }
    }

    fn proxy_command(
        job: &ConversionJob,
        proxy_output: &Path,
        capabilities: &Capabilities,
    ) -> EncodeCommand {
        let mut args = Self::input_args(job, capabilities);

        if job.flags.scale_proxy {
            args.extend(args!["-vf", HALF_SCALE_FILTER]);
        }

        args.extend(args![
            "-c:v", "libx264",
            "-preset", PROXY_PRESET,
            "-crf", PROXY_CRF,
            "-pix_fmt", "yuv420p",
            "-c:a", "aac",
            "-b:a", PROXY_AUDIO_BITRATE,
        ]);
        args.push(proxy_output.to_string_lossy().into_owned());

        EncodeCommand {
            kind: OutputKind::Proxy,
            output: proxy_output.to_path_buf(),
            args,
        }
    }

    /// `-hide_banner -y [hwaccel] -i <input>`
    fn input_args(job: &ConversionJob, capabilities: &Capabilities) -> Vec<String> {
        // -y is safe: the overwrite policy was applied above and stdin is closed.
        let mut args = args!["-hide_banner", "-y"];
        args.extend(crate::utils::to_string_vec(
            capabilities.hardware_backend.decode_args().iter(),
        ));
        args.push("-i".to_string());
        args.push(job.input_path.to_string_lossy().into_owned());
        args
    }

    fn lens_correction_filter(job: &ConversionJob, capabilities: &Capabilities) -> Option<String> {
        let model = job.flags.fisheye_camera_model.as_deref()?;
        if !capabilities.lens_correction_available {
            return None;
        }
        Some(format!(
            "{}=model={}:mode=geometry",
            LENS_CORRECTION_FILTER,
            escape_filter_value(model)
        ))
    }
}

/// Escape characters with meaning in an ffmpeg filter graph
fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | ':' | '\'' | ',' | ';' | '[' | ']' | '=') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
