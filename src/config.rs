use crate::error::{LauncherError, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const VERSION_ENV: &str = "DENO_VERSION";
pub const DENO_DIR_ENV: &str = "DENO_DIR";
pub const HOME_ENV: &str = "DENOPIN_HOME";
pub const CACHE_DIR_ENV: &str = "DENOPIN_CACHE_DIR";
pub const METADATA_URL_ENV: &str = "DENOPIN_METADATA_URL";
pub const RELEASE_URL_ENV: &str = "DENOPIN_RELEASE_URL";
pub const LOG_ENV: &str = "DENOPIN_LOG";

pub const DEFAULT_METADATA_URL: &str = "https://denolib.github.io/setup-deno/release.json";
pub const DEFAULT_RELEASE_URL: &str = "https://github.com/denoland/deno/releases/download";

/// Launcher settings, read once at startup from the environment and an optional config file
#[derive(Debug, Clone)]
pub struct Config {
    /// Root holding one `deno_<version>` directory per installed version
    pub home_dir: PathBuf,

    /// Shared scratch directory for downloaded archives
    pub cache_dir: PathBuf,

    /// Pinned version; `None` resolves the latest release
    pub version: Option<String>,

    /// Install directory override, used verbatim
    pub deno_dir: Option<PathBuf>,

    pub metadata_url: String,

    pub release_url: String,

    /// Draw a download progress bar on stderr
    pub show_progress: bool,
}

/// Optional `config.toml` in the launcher home
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    metadata_url: Option<String>,
    release_url: Option<String>,
    show_progress: Option<bool>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an environment lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let home_dir = match var(HOME_ENV) {
            Some(dir) => expand(&dir),
            None => dirs::home_dir()
                .map(|home| home.join(".denopin"))
                .ok_or_else(|| {
                    LauncherError::ConfigError("could not determine home directory".to_string())
                })?,
        };

        let cache_dir = match var(CACHE_DIR_ENV) {
            Some(dir) => expand(&dir),
            None => Self::default_cache_dir().ok_or_else(|| {
                LauncherError::ConfigError("could not determine user cache directory".to_string())
            })?,
        };

        let config_file = home_dir.join("config.toml");
        let file = Self::read_file(&config_file)?;

        Ok(Self {
            version: var(VERSION_ENV),
            deno_dir: var(DENO_DIR_ENV).map(PathBuf::from),
            metadata_url: var(METADATA_URL_ENV)
                .or(file.metadata_url)
                .unwrap_or_else(|| DEFAULT_METADATA_URL.to_string()),
            release_url: var(RELEASE_URL_ENV)
                .or(file.release_url)
                .unwrap_or_else(|| DEFAULT_RELEASE_URL.to_string()),
            show_progress: file.show_progress.unwrap_or(true),
            home_dir,
            cache_dir,
        })
    }

    fn default_cache_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "denopin").map(|dirs| dirs.cache_dir().to_path_buf())
    }

    fn read_file(path: &Path) -> Result<FileSettings> {
        if !path.exists() {
            return Ok(FileSettings::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| LauncherError::io("read config file", path, e))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Per-version install directory when `DENO_DIR` is not set
    pub fn version_dir(&self, version_component: &str) -> PathBuf {
        self.home_dir.join(format!("deno_{}", version_component))
    }
}

fn expand(dir: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(dir).to_string())
}
