//! Library configuration.
//!
//! One explicit struct threaded through constructors; never a global.
//! Loadable from a TOML file, with every field defaulting to the values
//! the rest of the system is tuned for.

use crate::error::LibraryError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Name of the library root folder inside the vault.
    #[serde(default = "default_library_root")]
    pub library_root: String,

    /// Delimiter between the core name and its encoded ancestor suffix.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Reserved core name marking a section's codex file.
    #[serde(default = "default_codex_prefix")]
    pub codex_prefix: String,

    /// Subfolder name quarantined files are penned under.
    #[serde(default = "default_untracked_folder")]
    pub untracked_folder: String,

    /// Extension of managed leaf documents and codexes.
    #[serde(default = "default_note_extension")]
    pub note_extension: String,

    /// Scan depth limit; deeper folders are skipped with a warning.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Watch runtime: silence needed to close a burst, in milliseconds.
    #[serde(default = "default_quiet_window_ms")]
    pub quiet_window_ms: u64,

    /// Watch runtime: hard cap on how long a burst may stay open.
    #[serde(default = "default_max_window_ms")]
    pub max_window_ms: u64,

    /// How long self-event registrations stay valid for suppression.
    #[serde(default = "default_self_event_ttl_ms")]
    pub self_event_ttl_ms: u64,

    /// Cap on parked dispatch batches before the oldest half is dropped.
    #[serde(default = "default_max_pending_batches")]
    pub max_pending_batches: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_library_root() -> String {
    "Library".to_string()
}

fn default_delimiter() -> char {
    '-'
}

fn default_codex_prefix() -> String {
    "__".to_string()
}

fn default_untracked_folder() -> String {
    "_untracked".to_string()
}

fn default_note_extension() -> String {
    "md".to_string()
}

fn default_max_depth() -> usize {
    16
}

fn default_quiet_window_ms() -> u64 {
    150
}

fn default_max_window_ms() -> u64 {
    1000
}

fn default_self_event_ttl_ms() -> u64 {
    3000
}

fn default_max_pending_batches() -> usize {
    64
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            library_root: default_library_root(),
            delimiter: default_delimiter(),
            codex_prefix: default_codex_prefix(),
            untracked_folder: default_untracked_folder(),
            note_extension: default_note_extension(),
            max_depth: default_max_depth(),
            quiet_window_ms: default_quiet_window_ms(),
            max_window_ms: default_max_window_ms(),
            self_event_ttl_ms: default_self_event_ttl_ms(),
            max_pending_batches: default_max_pending_batches(),
            logging: LoggingConfig::default(),
        }
    }
}

impl LibraryConfig {
    /// Load configuration from a TOML file. Unspecified fields fall back
    /// to their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LibraryError::Config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, LibraryError> {
        let config: Self =
            toml::from_str(raw).map_err(|e| LibraryError::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// The root is a single folder name inside the vault, never a path.
    fn validate(&self) -> Result<(), LibraryError> {
        if self.library_root.is_empty() || self.library_root.contains('/') {
            return Err(LibraryError::Config(format!(
                "library_root must be a single folder name, got {:?}",
                self.library_root
            )));
        }
        Ok(())
    }
}
