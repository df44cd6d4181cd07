use crate::config::Config;
use crate::error::{LauncherError, Result};
use crate::models::{RuntimePlatform, RuntimeTarget};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Create `path` and any missing parents. Existing segments are not an error.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| LauncherError::io("create directory", path, e))
}

pub fn path_exists(path: &Path) -> bool {
    path.exists()
}

/// Local directories used by one launcher run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    /// Per-version data directory, also handed to the child as `DENO_DIR`
    pub install_dir: PathBuf,

    /// Shared scratch directory for archives of every version
    pub download_cache_dir: PathBuf,
}

impl CacheLayout {
    /// Resolve and create the directories for `target`. Safe to call repeatedly.
    pub fn compute(config: &Config, target: &RuntimeTarget) -> Result<Self> {
        let download_cache_dir = config.cache_dir.clone();
        ensure_dir(&download_cache_dir)?;

        let install_dir = match &config.deno_dir {
            Some(dir) => dir.clone(),
            None => config.version_dir(&target.version_component()),
        };

        let layout = Self {
            install_dir,
            download_cache_dir,
        };
        ensure_dir(&layout.bin_dir())?;

        debug!(
            "Install dir {}, download cache {}",
            layout.install_dir.display(),
            layout.download_cache_dir.display()
        );
        Ok(layout)
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.install_dir.join("bin")
    }

    pub fn executable_path(&self, platform: &RuntimePlatform) -> PathBuf {
        self.bin_dir().join(platform.executable_name())
    }

    /// Create an empty archive file in the download cache that belongs to this run alone.
    ///
    /// Concurrent runs of the same version each get their own file, named
    /// `deno_<version>_<os>_<arch>.<random><ext>`.
    pub fn reserve_archive(&self, target: &RuntimeTarget) -> Result<PathBuf> {
        let name = target.local_archive_name();
        let extension = target.platform.archive_extension();
        let prefix = format!("{}.", name.strip_suffix(extension).unwrap_or(&name));

        let reserve = || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(extension)
                .tempfile_in(&self.download_cache_dir)
        };

        // Another run may have just released the shared directory.
        let file = match reserve() {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                ensure_dir(&self.download_cache_dir)?;
                reserve()
            }
            other => other,
        }
        .map_err(|e| LauncherError::io("reserve archive in", &self.download_cache_dir, e))?;

        let archive = file
            .into_temp_path()
            .keep()
            .map_err(|e| LauncherError::io("reserve archive in", &self.download_cache_dir, e.error))?;
        debug!("Reserved {}", archive.display());
        Ok(archive)
    }

    /// Remove the archive this run downloaded, then the cache directory if nothing else is in it.
    ///
    /// Archives of other concurrent runs are left alone.
    pub fn release(download_cache_dir: &Path, artifact: Option<&Path>) -> Result<()> {
        if let Some(artifact) = artifact {
            match std::fs::remove_file(artifact) {
                Ok(()) => debug!("Removed {}", artifact.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(LauncherError::io("remove", artifact, e)),
            }
        }

        // Fails when the directory is missing or still holds other downloads.
        if std::fs::remove_dir(download_cache_dir).is_ok() {
            debug!("Removed {}", download_cache_dir.display());
        }
        Ok(())
    }
}
