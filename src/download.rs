use crate::error::{LauncherError, Result};
use crate::utils::format_size;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Shared HTTP client for metadata lookups and downloads
pub fn build_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ))
        .build()
        .map_err(LauncherError::HttpClient)
}

pub struct Downloader {
    client: Client,
    show_progress: bool,
}

impl Downloader {
    pub fn new(client: Client, show_progress: bool) -> Self {
        Self {
            client,
            show_progress,
        }
    }

    /// Stream `url` into `dest`, returning the number of bytes written.
    ///
    /// The status is checked before `dest` is created, so an error response leaves
    /// nothing behind. A failure while streaming removes the partial file.
    pub async fn download_with_progress<P: AsRef<Path>>(&self, url: &str, dest: P) -> Result<u64> {
        let dest = dest.as_ref();
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| LauncherError::Network {
                    url: url.to_string(),
                    source: e,
                })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let pb = self.progress_bar(url, response.content_length());

        let mut file = File::create(dest)
            .await
            .map_err(|e| LauncherError::io("create", dest, e))?;

        match Self::copy_stream(url, dest, response, &mut file, &pb).await {
            Ok(downloaded) => {
                pb.finish_and_clear();
                debug!("Downloaded {} to {}", format_size(downloaded), dest.display());
                Ok(downloaded)
            }
            Err(e) => {
                pb.abandon();
                drop(file);
                if let Err(cleanup) = tokio::fs::remove_file(dest).await {
                    debug!("Failed to remove partial download {}: {}", dest.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    async fn copy_stream(
        url: &str,
        dest: &Path,
        response: reqwest::Response,
        file: &mut File,
        pb: &ProgressBar,
    ) -> Result<u64> {
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LauncherError::Network {
                url: url.to_string(),
                source: e,
            })?;
            file.write_all(&chunk)
                .await
                .map_err(|e| LauncherError::io("write", dest, e))?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| LauncherError::io("flush", dest, e))?;
        Ok(downloaded)
    }

    fn progress_bar(&self, url: &str, total_size: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total_size.unwrap_or(0));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(format!(
            "Downloading {}",
            url.split('/').last().unwrap_or("file")
        ));
        pb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_download_writes_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/archive.gz")
            .with_status(200)
            .with_body("hello world")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("archive.gz");
        let downloader = Downloader::new(Client::new(), false);

        let written = downloader
            .download_with_progress(&format!("{}/archive.gz", server.url()), &dest)
            .await
            .unwrap();

        assert_eq!(written, 11);
        assert_eq!(std::fs::read(&dest).unwrap(), b"hello world");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_creates_no_file() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing.gz")
            .with_status(404)
            .with_body("Not Found")
            .create_async()
            .await;

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("missing.gz");
        let downloader = Downloader::new(Client::new(), false);

        let result = downloader
            .download_with_progress(&format!("{}/missing.gz", server.url()), &dest)
            .await;

        match result {
            Err(LauncherError::HttpStatus { url, status }) => {
                assert!(url.ends_with("/missing.gz"));
                assert_eq!(status.as_u16(), 404);
            }
            other => panic!("Expected HttpStatus error, got: {:?}", other),
        }
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("archive.gz");
        let downloader = Downloader::new(Client::new(), false);

        let result = downloader
            .download_with_progress("http://127.0.0.1:1/archive.gz", &dest)
            .await;

        assert!(matches!(result, Err(LauncherError::Network { .. })));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_truncated_body_removes_partial_file() {
        use tokio::io::AsyncReadExt;

        // promises more bytes than it sends, then hangs up
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\npartial")
                .await
                .unwrap();
        });

        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("archive.gz");
        let downloader = Downloader::new(Client::new(), false);

        let result = downloader
            .download_with_progress(&format!("http://{}/archive.gz", address), &dest)
            .await;

        assert!(matches!(result, Err(LauncherError::Network { .. })), "{:?}", result);
        assert!(!dest.exists());
    }
}
