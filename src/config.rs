//! Bootstrap configuration
//!
//! Read from a TOML file with a single `[bootstrap]` section:
//!
//! ```toml
//! [bootstrap]
//! default_packages = ["utils", "stats"]
//! attach_autoloads = false
//! lock_namespaces = true
//! library = "lib"
//! ```
//!
//! Every field is optional. The defaults give the minimal search path
//! `[.GlobalEnv, package:base]`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Settings applied once by [`EnvRegistry::bootstrap`](crate::EnvRegistry::bootstrap).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Packages loaded and attached at position 2, in order.
    /// The last one listed ends up directly below `.GlobalEnv`.
    pub default_packages: Vec<String>,

    /// Put `Autoloads` on the search path just above `package:base`.
    pub attach_autoloads: bool,

    /// Seal each package's binding store once its namespace is loaded.
    pub lock_namespaces: bool,

    /// Directory `DirectoryLoader` reads `<name>.toml` package files from.
    pub library: PathBuf,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            default_packages: Vec::new(),
            attach_autoloads: false,
            lock_namespaces: true,
            library: PathBuf::from("lib"),
        }
    }
}

/// File layout: everything lives under `[bootstrap]`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    bootstrap: BootstrapConfig,
}

impl BootstrapConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str::<ConfigFile>(content)
            .map(|file| file.bootstrap)
            .map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a config file. A relative `library` is resolved against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;
        let mut config = Self::from_toml_str(&content)?;
        if config.library.is_relative() {
            if let Some(dir) = path.parent() {
                config.library = dir.join(&config.library);
            }
        }
        Ok(config)
    }

    /// Builder-style override used by the CLI's `-L`.
    pub fn with_library(mut self, library: impl Into<PathBuf>) -> Self {
        self.library = library.into();
        self
    }
}
