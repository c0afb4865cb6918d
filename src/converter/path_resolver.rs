//! # Path Resolution Module
//!
//! Centralizza il calcolo dei path di output: stesso directory dell'input,
//! `<stem>_prores<ext originale>` per il mezzanine e `<stem>_proxy.mp4` per
//! il proxy. Il calcolo è deterministico e non tocca il filesystem.

use anyhow::Result;
use std::path::{Path, PathBuf};

pub const MEZZANINE_SUFFIX: &str = "_prores";
pub const PROXY_SUFFIX: &str = "_proxy";
pub const PROXY_EXTENSION: &str = "mp4";

/// Output path derivation
pub struct PathResolver;

impl PathResolver {
    /// Mezzanine output: same directory, `_prores` suffix, original extension
    pub fn mezzanine_path(input_path: &Path) -> Result<PathBuf> {
        let file_stem = Self::stem(input_path)?;
        let filename = match input_path.extension() {
            Some(ext) => format!("{}{}.{}", file_stem, MEZZANINE_SUFFIX, ext.to_string_lossy()),
            None => format!("{}{}", file_stem, MEZZANINE_SUFFIX),
        };
        Ok(input_path.with_file_name(filename))
    }

    /// Proxy output: same directory, `_proxy.mp4`
    pub fn proxy_path(input_path: &Path) -> Result<PathBuf> {
        let file_stem = Self::stem(input_path)?;
        Ok(input_path.with_file_name(format!("{}{}.{}", file_stem, PROXY_SUFFIX, PROXY_EXTENSION)))
    }

    fn stem(input_path: &Path) -> Result<String> {
        Ok(input_path
            .file_stem()
            .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", input_path.display()))?
            .to_string_lossy()
            .into_owned())
    }
}
