//! # ProRes Converter - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Costruzione della configurazione (file JSON opzionale + flag CLI)
//! - Rilevamento delle capability di ffmpeg e avvio del batch
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (directory, force, proxy, scale, fisheye, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose, `RUST_LOG` ha precedenza)
//! 3. `--help` stampa l'uso e i modelli di camera supportati da lensfun,
//!    anche se il file di configurazione non è valido
//! 4. `--save-config` scrive la configurazione effettiva ed esce
//! 5. Senza directory termina con exit code 1
//! 6. Rileva le capability una sola volta e avvia il `BatchConverter`
//!
//! I log passano dal `MultiProgress` delle barre, così non le spezzano.
//!
//! ## Esempio di utilizzo:
//! ```bash
//! convert --proxy --scale --fisheye="GoPro HERO4 Black" /footage/day1 /footage/day2
//! ```

use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use indicatif::MultiProgress;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use prores_converter::{
    json_output::JsonMessage, platform::PlatformCommands, progress::ProgressWriter, BatchConverter,
    CapabilityDetector, Config, ConvertError,
};

#[derive(Parser)]
#[command(name = "convert")]
#[command(about = "Batch-convert videos to ProRes 422 HQ with optional H.264 proxies")]
#[command(disable_help_flag = true)]
struct Args {
    /// Directories to scan recursively for video files
    directories: Vec<PathBuf>,

    /// Overwrite existing outputs
    #[arg(short, long)]
    force: bool,

    /// Also generate an H.264 proxy (<name>_proxy.mp4)
    #[arg(long)]
    proxy: bool,

    /// Scale the proxy to 50% (requires --proxy)
    #[arg(long)]
    scale: bool,

    /// Apply fisheye lens correction for the given camera model
    #[arg(long, value_name = "MODEL")]
    fisheye: Option<String>,

    /// Number of files converted in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Output progress and results as JSON lines on stdout
    #[arg(long)]
    json: bool,

    /// Leave *_prores.* and *_proxy.mp4 files from earlier runs out of the scan
    #[arg(long)]
    skip_converted: bool,

    /// Load settings from a JSON config file (flags take precedence)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    save_config: Option<PathBuf>,

    /// ffmpeg executable
    #[arg(long, value_name = "PATH")]
    ffmpeg: Option<PathBuf>,

    /// ffprobe executable
    #[arg(long, value_name = "PATH")]
    ffprobe: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print help and the camera models supported for --fisheye
    #[arg(long, action = ArgAction::SetTrue)]
    help: bool,
}

impl Args {
    /// Fold command line flags over the file (or default) configuration
    fn apply_to(&self, mut config: Config) -> Config {
        config.force_overwrite |= self.force;
        config.generate_proxy |= self.proxy;
        config.scale_proxy |= self.scale;
        config.json_output |= self.json;
        config.skip_converted_outputs |= self.skip_converted;
        if let Some(ref model) = self.fisheye {
            config.fisheye_camera_model = Some(model.clone());
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(ref ffmpeg) = self.ffmpeg {
            config.ffmpeg = ffmpeg.clone();
        }
        if let Some(ref ffprobe) = self.ffprobe {
            config.ffprobe = ffprobe.clone();
        }
        config
    }

    /// Config file (or defaults) with the flags folded over it
    async fn load_config(&self) -> Result<Config> {
        let base = match self.config {
            Some(ref path) => Config::from_file(path).await?,
            None => Config::default(),
        };
        Ok(self.apply_to(base))
    }

    /// Like `load_config`, but an unreadable file falls back to defaults
    async fn help_config(&self) -> Config {
        match self.load_config().await {
            Ok(config) => config,
            Err(e) => {
                debug!("Ignoring configuration for --help: {}", e);
                self.apply_to(Config::default())
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    let multi = MultiProgress::new();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer({
            let multi = multi.clone();
            move || ProgressWriter::new(multi.clone())
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if args.help {
        print_help(&args.help_config().await).await;
        return Ok(());
    }

    let config = args.load_config().await?;

    if let Some(ref path) = args.save_config {
        config.validate()?;
        config.save_to_file(path).await?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }

    if args.directories.is_empty() {
        let usage = Args::command().render_usage().to_string();
        if config.json_output {
            JsonMessage::error(ConvertError::NoDirectoriesSupplied.to_string(), Some(usage)).emit();
        } else {
            eprintln!("Error: {}", ConvertError::NoDirectoriesSupplied);
            eprintln!("{}", usage);
        }
        std::process::exit(1);
    }

    config.validate()?;

    PlatformCommands::instance().check_tools(&[config.ffmpeg.as_path(), config.ffprobe.as_path()]);

    let capabilities = Arc::new(CapabilityDetector::new(&config).detect(false).await);
    let config = Arc::new(config);

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping current encodes");
                cancel.cancel();
            }
        });
    }

    let outcomes = BatchConverter::new(config, capabilities, cancel, multi)
        .run(&args.directories)
        .await;
    debug!("{} entries processed", outcomes.len());

    Ok(())
}

async fn print_help(config: &Config) {
    println!("{}", Args::command().render_help());

    let capabilities = CapabilityDetector::new(config).detect(true).await;
    if !capabilities.lens_correction_available {
        println!("\nFisheye correction unavailable: ffmpeg was built without the lensfun filter.");
        return;
    }

    if capabilities.supported_camera_models.is_empty() {
        println!("\nNo camera models reported by lensfun.");
        return;
    }

    println!("\nSupported camera models for --fisheye:");
    for model in &capabilities.supported_camera_models {
        println!("  {}", model);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("convert").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_fold_over_config() {
        let parsed = args(&["--proxy", "-w", "3", "--fisheye", "GoPro HERO4 Black", "/footage"]);
        let config = parsed.apply_to(Config {
            force_overwrite: true,
            ..Config::default()
        });

        assert!(config.force_overwrite);
        assert!(config.generate_proxy);
        assert!(!config.scale_proxy);
        assert_eq!(config.workers, 3);
        assert_eq!(config.fisheye_camera_model.as_deref(), Some("GoPro HERO4 Black"));
        assert_eq!(parsed.directories, vec![PathBuf::from("/footage")]);
    }

    #[tokio::test]
    async fn test_help_survives_a_broken_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let broken = temp_dir.path().join("broken.json");
        tokio::fs::write(&broken, "not json").await.unwrap();
        let broken = broken.to_string_lossy().into_owned();

        let parsed = args(&["--config", &broken, "--scale", "--help"]);
        assert!(parsed.help);
        assert!(parsed.load_config().await.is_err());

        let config = parsed.help_config().await;
        assert!(config.scale_proxy);
        assert_eq!(config.workers, Config::default().workers);
    }

    #[tokio::test]
    async fn test_saved_config_loads_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("saved.json");
        let path_arg = path.to_string_lossy().into_owned();

        let config = args(&["--proxy", "--skip-converted"]).load_config().await.unwrap();
        config.save_to_file(&path).await.unwrap();

        let reloaded = args(&["--config", &path_arg]).load_config().await.unwrap();
        assert_eq!(reloaded.generate_proxy, config.generate_proxy);
        assert!(reloaded.skip_converted_outputs);
    }
}
