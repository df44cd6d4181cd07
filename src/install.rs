use crate::error::{LauncherError, Result};
use crate::models::RuntimePlatform;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub struct Installer {
    platform: RuntimePlatform,
}

impl Installer {
    pub fn new(platform: RuntimePlatform) -> Self {
        Self { platform }
    }

    /// Unpack `archive_path` into `bin_dir` and return the executable's path.
    ///
    /// The payload is always named after the platform executable (`deno` or `deno.exe`),
    /// whatever the entry is called inside a zip. It is written to a temporary file in
    /// `bin_dir` and renamed into place, so the final path never holds a partial file.
    pub fn install(&self, archive_path: &Path, bin_dir: &Path) -> Result<PathBuf> {
        let executable = bin_dir.join(self.platform.executable_name());

        let file_name = archive_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("");

        let staged = if file_name.ends_with(".zip") {
            self.extract_zip(archive_path, bin_dir)?
        } else if file_name.ends_with(".gz") {
            self.extract_gz(archive_path, bin_dir)?
        } else {
            return Err(LauncherError::decompress(
                archive_path,
                "unsupported archive format",
            ));
        };

        if !self.platform.is_windows() {
            make_executable(staged.path())?;
        }

        staged.persist(&executable).map_err(|e| {
            LauncherError::io("move executable into", &executable, e.error)
        })?;

        debug!("Installed {}", executable.display());
        Ok(std::path::absolute(&executable).unwrap_or(executable))
    }

    /// Extract the single entry of a zip archive
    fn extract_zip(&self, archive_path: &Path, dest_dir: &Path) -> Result<NamedTempFile> {
        let file = File::open(archive_path).map_err(|e| LauncherError::io("open", archive_path, e))?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| LauncherError::decompress(archive_path, e.to_string()))?;

        match archive.len() {
            0 => return Err(LauncherError::decompress(archive_path, "archive is empty")),
            1 => {}
            n => {
                return Err(LauncherError::decompress(
                    archive_path,
                    format!("expected a single executable, found {} entries", n),
                ))
            }
        }

        let mut entry = archive
            .by_index(0)
            .map_err(|e| LauncherError::decompress(archive_path, e.to_string()))?;

        if entry.is_dir() {
            return Err(LauncherError::decompress(
                archive_path,
                format!("entry {} is a directory", entry.name()),
            ));
        }

        debug!("Extracting {} from {}", entry.name(), archive_path.display());
        stage(archive_path, &mut entry, dest_dir)
    }

    /// Decompress a single-file gzip stream
    fn extract_gz(&self, archive_path: &Path, dest_dir: &Path) -> Result<NamedTempFile> {
        let file = File::open(archive_path).map_err(|e| LauncherError::io("open", archive_path, e))?;
        let mut decoder = GzDecoder::new(file);
        stage(archive_path, &mut decoder, dest_dir)
    }
}

/// Copy `reader` into a fresh temporary file inside `dest_dir`
fn stage<R: Read>(archive_path: &Path, reader: &mut R, dest_dir: &Path) -> Result<NamedTempFile> {
    let mut staged = NamedTempFile::new_in(dest_dir)
        .map_err(|e| LauncherError::io("create temporary file in", dest_dir, e))?;

    std::io::copy(reader, staged.as_file_mut())
        .map_err(|e| LauncherError::decompress(archive_path, e.to_string()))?;

    Ok(staged)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
        LauncherError::Permission {
            path: path.display().to_string(),
            source: e,
        }
    })
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
