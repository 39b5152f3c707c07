use std::fmt;
use std::path::PathBuf;

/// Errors loading, saving or validating the settings file.
#[derive(Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    Io { path: PathBuf, source: std::io::Error },
    /// The file is not valid settings JSON.
    Parse { path: PathBuf, source: serde_json::Error },
    /// The file parsed but a value is unusable.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {}", path.display(), source),
            Self::Parse { path, source } => {
                write!(f, "error parsing {}: {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "invalid settings: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}
