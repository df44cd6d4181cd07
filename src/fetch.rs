use crate::cache::{path_exists, CacheLayout};
use crate::download::Downloader;
use crate::error::Result;
use crate::models::RuntimeTarget;
use std::path::PathBuf;
use tracing::{debug, info};

/// Result of a fetch: either the executable is already in place or an archive awaits installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Installed(PathBuf),
    Downloaded(PathBuf),
}

pub struct ArtifactFetcher {
    downloader: Downloader,
    release_url: String,
}

impl ArtifactFetcher {
    pub fn new(downloader: Downloader, release_url: impl Into<String>) -> Self {
        Self {
            downloader,
            release_url: release_url.into(),
        }
    }

    pub fn download_url(&self, target: &RuntimeTarget) -> String {
        format!(
            "{}/{}/{}",
            self.release_url.trim_end_matches('/'),
            target.version,
            target.remote_archive_name()
        )
    }

    /// Return the installed executable, or download the release archive into a file reserved
    /// for this run.
    ///
    /// The reserved path lands in `artifact` before any byte is transferred, so the caller
    /// can clean it up even if this future is dropped mid-download.
    pub async fn fetch(
        &self,
        target: &RuntimeTarget,
        layout: &CacheLayout,
        artifact: &mut Option<PathBuf>,
    ) -> Result<Fetched> {
        let executable = layout.executable_path(&target.platform);

        if path_exists(&executable) {
            debug!("Using installed {}", executable.display());
            return Ok(Fetched::Installed(executable));
        }

        let url = self.download_url(target);
        let archive = layout.reserve_archive(target)?;
        *artifact = Some(archive.clone());

        info!("Downloading Deno {} for {}", target.version, target.platform);
        self.downloader
            .download_with_progress(&url, &archive)
            .await?;

        Ok(Fetched::Downloaded(archive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::LauncherError;
    use crate::models::RuntimePlatform;
    use reqwest::Client;
    use std::path::Path;
    use tempfile::TempDir;

    fn layout_for(root: &Path, target: &RuntimeTarget) -> CacheLayout {
        let config = Config {
            home_dir: root.join("home"),
            cache_dir: root.join("cache"),
            version: None,
            deno_dir: None,
            metadata_url: String::new(),
            release_url: String::new(),
            show_progress: false,
        };
        CacheLayout::compute(&config, target).unwrap()
    }

    fn fetcher_for(base: &str) -> ArtifactFetcher {
        ArtifactFetcher::new(Downloader::new(Client::new(), false), base)
    }

    fn target(os: &str) -> RuntimeTarget {
        RuntimeTarget::new("v1.2.3", RuntimePlatform::resolve(os, "x86_64").unwrap())
    }

    #[test]
    fn test_download_url_template() {
        let fetcher = fetcher_for("https://github.com/denoland/deno/releases/download/");
        assert_eq!(
            fetcher.download_url(&target("linux")),
            "https://github.com/denoland/deno/releases/download/v1.2.3/deno_linux_x64.gz"
        );
        assert_eq!(
            fetcher.download_url(&target("macos")),
            "https://github.com/denoland/deno/releases/download/v1.2.3/deno_osx_x64.gz"
        );
        assert_eq!(
            fetcher.download_url(&target("windows")),
            "https://github.com/denoland/deno/releases/download/v1.2.3/deno_win_x64.zip"
        );
    }

    #[tokio::test]
    async fn test_installed_executable_skips_network() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let target = target("linux");
        let layout = layout_for(temp_dir.path(), &target);
        let executable = layout.executable_path(&target.platform);
        std::fs::write(&executable, b"anything").unwrap();

        let mut artifact = None;
        let fetched = fetcher_for(&server.url())
            .fetch(&target, &layout, &mut artifact)
            .await
            .unwrap();

        assert_eq!(fetched, Fetched::Installed(executable));
        assert_eq!(artifact, None);
        assert_eq!(std::fs::read_dir(&layout.download_cache_dir).unwrap().count(), 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_downloads_into_cache_dir() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1.2.3/deno_win_x64.zip")
            .with_status(200)
            .with_body("zip bytes")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let target = target("windows");
        let layout = layout_for(temp_dir.path(), &target);

        let mut artifact = None;
        let fetched = fetcher_for(&server.url())
            .fetch(&target, &layout, &mut artifact)
            .await
            .unwrap();

        let archive = match fetched {
            Fetched::Downloaded(archive) => archive,
            other => panic!("Expected a download, got: {:?}", other),
        };
        assert_eq!(artifact.as_ref(), Some(&archive));
        assert_eq!(archive.parent().unwrap(), layout.download_cache_dir.as_path());
        let name = archive.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("deno_v1.2.3_win_x64."), "{}", name);
        assert!(name.ends_with(".zip"), "{}", name);
        assert_eq!(std::fs::read(&archive).unwrap(), b"zip bytes");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_release_leaves_install_dir_empty() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/v1.2.3/deno_linux_x64.gz")
            .with_status(404)
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let target = target("linux");
        let layout = layout_for(temp_dir.path(), &target);

        let mut artifact = None;
        let result = fetcher_for(&server.url())
            .fetch(&target, &layout, &mut artifact)
            .await;

        assert!(matches!(result, Err(LauncherError::HttpStatus { .. })));
        assert_eq!(std::fs::read_dir(layout.bin_dir()).unwrap().count(), 0);

        // the reserved file is reported so the caller can release it
        let reserved = artifact.unwrap();
        CacheLayout::release(&layout.download_cache_dir, Some(&reserved)).unwrap();
        assert!(!layout.download_cache_dir.exists());
    }
}
