//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file e le utilità sui file.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di tutti i file sotto una root
//! - Riconoscimento delle estensioni video supportate
//! - Riconoscimento degli output generati da run precedenti
//! - Formattazione human-readable delle dimensioni
//!
//! ## Formati supportati:
//! - **Video**: MOV, MP4, MKV, AVI (case-insensitive)
//!
//! La discovery restituisce *tutti* i file regolari: il filtro sulle
//! estensioni viene applicato dal command builder, così ogni file scartato
//! compare comunque tra gli esiti del batch.
//!
//! ## Esempio:
//! ```ignore
//! let files = FileManager::find_files(Path::new("/footage"), false)?;
//! for file in files {
//!     if FileManager::is_video(&file) {
//!         // convert
//!     }
//! }
//! ```

use crate::converter::path_resolver::{MEZZANINE_SUFFIX, PROXY_EXTENSION, PROXY_SUFFIX};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Recognized input extensions, lowercase
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "mkv", "avi"];

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Find every regular file under `root`, sorted for a stable dispatch order.
    ///
    /// With `skip_converted` set, files this tool generated earlier
    /// (`*_prores.<ext>`, `*_proxy.mp4`) are left out.
    pub fn find_files(root: &Path, skip_converted: bool) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if skip_converted && Self::is_generated_output(path) {
                debug!("Skipping previously generated output: {}", path.display());
                continue;
            }
            files.push(path.to_path_buf());
        }

        Ok(files)
    }

    /// Check if a file is a video we know how to convert
    pub fn is_video(path: &Path) -> bool {
        if let Some(ext) = path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            VIDEO_EXTENSIONS.contains(&ext_lower.as_str())
        } else {
            false
        }
    }

    /// Check if a file looks like a mezzanine or proxy output of this tool
    pub fn is_generated_output(path: &Path) -> bool {
        let stem = path.file_stem().unwrap_or_default().to_string_lossy();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        (stem.ends_with(MEZZANINE_SUFFIX) && Self::is_video(path))
            || (stem.ends_with(PROXY_SUFFIX) && ext == PROXY_EXTENSION)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}
