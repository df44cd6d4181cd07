use thiserror::Error;

#[derive(Error, Debug)]
pub enum LauncherError {
    #[error("Unsupported platform: {os} {arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("Failed to request {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("Request to {url} failed with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Failed to parse release metadata from {url}: {source}")]
    Parse {
        url: String,
        source: serde_json::Error,
    },

    #[error("No version found in release metadata from {0}")]
    NoVersionFound(String),

    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to extract {archive}: {reason}")]
    Decompress { archive: String, reason: String },

    #[error("Failed to make {path} executable: {source}")]
    Permission {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to start {path}: {source}")]
    Spawn {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to wait for {path}: {source}")]
    Wait {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to install signal handler: {0}")]
    SignalSetup(#[source] std::io::Error),

    #[error("Failed to forward signal {signal} to process {pid}: {source}")]
    SignalForward {
        signal: i32,
        pid: u32,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl LauncherError {
    pub fn io(action: &'static str, path: &std::path::Path, source: std::io::Error) -> Self {
        LauncherError::Io {
            action,
            path: path.display().to_string(),
            source,
        }
    }

    pub fn decompress(archive: &std::path::Path, reason: impl Into<String>) -> Self {
        LauncherError::Decompress {
            archive: archive.display().to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LauncherError>;
