//! # Platform-specific utilities
//!
//! Questo modulo centralizza la logica cross-platform per trovare i tool
//! esterni (ffmpeg, ffprobe) nel PATH di sistema o in un path configurato.
//! Il controllo è solo informativo: un tool mancante produce un warning,
//! mai un errore fatale.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Platform-specific tool lookup
pub struct PlatformCommands {
    executable_suffix: &'static str,
    path_separator: char,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        if cfg!(windows) {
            Self {
                executable_suffix: ".exe",
                path_separator: ';',
            }
        } else {
            Self {
                executable_suffix: "",
                path_separator: ':',
            }
        }
    }

    /// Resolve a program to a concrete path.
    ///
    /// Programs given with a directory component are checked as-is; bare
    /// names are searched in `PATH`.
    pub fn resolve(&self, program: &Path) -> Option<PathBuf> {
        if program.components().count() > 1 {
            return program.is_file().then(|| program.to_path_buf());
        }

        let mut name = program.as_os_str().to_os_string();
        if !self.executable_suffix.is_empty()
            && !program.to_string_lossy().ends_with(self.executable_suffix)
        {
            name.push(self.executable_suffix);
        }

        env::var_os("PATH")?
            .to_str()?
            .split(self.path_separator)
            .map(|dir| Path::new(dir).join(&name))
            .find(|path| path.is_file())
    }

    /// Warn about any missing external tool, return whether all were found
    pub fn check_tools(&self, tools: &[&Path]) -> bool {
        let mut all_found = true;
        for tool in tools {
            match self.resolve(tool) {
                Some(path) => debug!("Using {} -> {}", tool.display(), path.display()),
                None => {
                    all_found = false;
                    warn!(
                        "Tool not found: {} (install ffmpeg, e.g. `sudo apt-get install ffmpeg`)",
                        tool.display()
                    );
                }
            }
        }
        all_found
    }
}
