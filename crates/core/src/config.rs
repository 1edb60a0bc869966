//! File-level configuration.
//!
//! Both detection and extraction are tunable through one optional JSON file.
//! Every field may be left out; missing fields take their defaults.
//!
//! ```json
//! {
//!   "detect": { "marker_wait_ms": 3000 },
//!   "extract": { "citation_scan_limit": null, "max_citations": 25 }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::extract::ExtractConfig;
use crate::variant::DetectConfig;
use crate::{Result, TanaPasteError};

const CONFIG_DIR: &str = "tanapaste";
const CONFIG_FILE: &str = "config.json";

/// Detection and extraction settings loaded from disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub detect: DetectConfig,
    pub extract: ExtractConfig,
}

impl PipelineConfig {
    /// Parses a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`TanaPasteError::ConfigError`] on malformed JSON, unknown
    /// variant names or a path pattern / selector that does not compile.
    pub fn from_json(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input).map_err(|e| TanaPasteError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Compiles every pattern and selector once so bad values fail early.
    pub fn validate(&self) -> Result<()> {
        self.detect
            .compile()
            .map_err(|e| TanaPasteError::ConfigError(format!("detect: {e}")))?;
        self.extract
            .markers
            .compile()
            .map_err(|e| TanaPasteError::ConfigError(format!("extract.markers: {e}")))?;
        for (variant, markers) in &self.extract.overrides {
            markers
                .compile()
                .map_err(|e| TanaPasteError::ConfigError(format!("extract.overrides.{variant}: {e}")))?;
        }
        Ok(())
    }
}

/// Locates and reads the configuration file.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    explicit: bool,
}

impl ConfigLoader {
    /// Loader for the per-user file (`<config dir>/tanapaste/config.json`).
    pub fn new() -> Self {
        Self { path: Self::default_path(), explicit: false }
    }

    /// Loader for a file the user named; the file must exist.
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self { path: Some(path.as_ref().to_path_buf()), explicit: true }
    }

    /// Where the per-user file lives on this platform.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the configuration.
    ///
    /// A missing per-user file yields the defaults. A missing explicit file is
    /// [`TanaPasteError::FileNotFound`].
    pub fn load(&self) -> Result<PipelineConfig> {
        let Some(path) = &self.path else {
            return Ok(PipelineConfig::default());
        };

        if !path.exists() {
            return if self.explicit {
                Err(TanaPasteError::FileNotFound(path.clone()))
            } else {
                Ok(PipelineConfig::default())
            };
        }

        let input = fs::read_to_string(path)?;
        PipelineConfig::from_json(&input)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
