// Console settings
// Loaded from ~/.config/conbridge/settings.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Default instruction budget per evaluation.
pub const DEFAULT_INSTRUCTION_LIMIT: i64 = 100_000_000;

/// Default wall-clock limit per evaluation, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default cap on captured output lines per evaluation.
pub const DEFAULT_MAX_OUTPUT_LINES: usize = 5000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleSettings {
    // Prompts
    #[serde(rename = "prompt.primary")]
    pub prompt_primary: String,

    #[serde(rename = "prompt.continuation")]
    pub prompt_continuation: String,

    // Copy as script
    #[serde(rename = "export.outputMarker")]
    pub output_marker: String,

    #[serde(rename = "export.errorMarker")]
    pub error_marker: String,

    // Completion
    #[serde(rename = "completion.showPrivate")]
    pub show_private: bool,

    // Runtime limits
    #[serde(rename = "runtime.instructionLimit")]
    pub instruction_limit: i64,

    #[serde(rename = "runtime.timeoutSecs")]
    pub timeout_secs: u64,

    #[serde(rename = "runtime.maxOutputLines")]
    pub max_output_lines: usize,

    #[serde(rename = "runtime.sandbox")]
    pub sandbox: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            // Prompts
            prompt_primary: "lua> ".to_string(),
            prompt_continuation: "...  ".to_string(),
            // Copy as script
            output_marker: "#~ ".to_string(),
            error_marker: "#! ".to_string(),
            // Completion
            show_private: false,
            // Runtime
            instruction_limit: DEFAULT_INSTRUCTION_LIMIT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output_lines: DEFAULT_MAX_OUTPUT_LINES,
            sandbox: true,
        }
    }
}

const DEFAULT_FILE: &str = r##"{
    // Prompts (must have the same width so continuation lines align)
    "prompt.primary": "lua> ",
    "prompt.continuation": "...  ",

    // Copy as script: comment markers for output and error lines
    "export.outputMarker": "#~ ",
    "export.errorMarker": "#! ",

    // Completion: list names starting with "_"
    "completion.showPrivate": false,

    // Per-evaluation limits
    "runtime.instructionLimit": 100000000,
    "runtime.timeoutSecs": 30,
    "runtime.maxOutputLines": 5000,

    // Remove os, package, require, loadfile, dofile, load and debug
    "runtime.sandbox": true
}
"##;

impl ConsoleSettings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conbridge");
        config_dir.join("settings.json")
    }

    /// Load settings from the default path, falling back to defaults.
    ///
    /// A missing file is created with commented defaults. Unreadable or
    /// invalid files are logged and ignored.
    pub fn load() -> Self {
        let path = Self::config_path();

        if !path.exists() {
            if let Err(e) = Self::create_default_file(&path) {
                log::warn!("Error writing default settings.json: {}", e);
            }
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Load and validate settings from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let settings: Self = serde_json::from_str(&strip_comments(&contents)).map_err(|source| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })?;

        settings.validate()?;
        log::debug!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save current settings to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save current settings to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        // Ensure directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, json).map_err(io_err)
    }

    /// Check values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prompt_primary.is_empty() || self.prompt_continuation.is_empty() {
            return Err(ConfigError::Validation("prompts must not be empty".to_string()));
        }
        let primary = self.prompt_primary.chars().count();
        let continuation = self.prompt_continuation.chars().count();
        if primary != continuation {
            return Err(ConfigError::Validation(format!(
                "prompt.primary is {primary} characters wide but prompt.continuation is {continuation}"
            )));
        }
        if self.output_marker == self.error_marker {
            return Err(ConfigError::Validation(
                "export.outputMarker and export.errorMarker must differ".to_string(),
            ));
        }
        if self.instruction_limit <= 0 {
            return Err(ConfigError::Validation(
                "runtime.instructionLimit must be positive".to_string(),
            ));
        }
        if self.max_output_lines == 0 {
            return Err(ConfigError::Validation(
                "runtime.maxOutputLines must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Create default settings file with comments
    fn create_default_file(path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, DEFAULT_FILE).map_err(io_err)
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}

// Strip comments (lines starting with //)
fn strip_comments(contents: &str) -> String {
    contents
        .lines()
        .filter(|line| !line.trim().starts_with("//"))
        .collect::<Vec<_>>()
        .join("\n")
}
