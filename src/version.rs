use crate::error::{LauncherError, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// One record of the release metadata document, newest first
#[derive(Debug, Deserialize)]
struct Release {
    name: String,
}

pub struct VersionResolver {
    client: Client,
    metadata_url: String,
}

impl VersionResolver {
    pub fn new(client: Client, metadata_url: impl Into<String>) -> Self {
        Self {
            client,
            metadata_url: metadata_url.into(),
        }
    }

    /// Return the explicit version untouched, or look up the latest release.
    pub async fn resolve(&self, explicit: Option<&str>) -> Result<String> {
        match explicit {
            Some(version) => Ok(version.to_string()),
            None => self.latest().await,
        }
    }

    async fn latest(&self) -> Result<String> {
        let url = self.metadata_url.as_str();
        debug!("Resolving latest version from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| LauncherError::Network {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(LauncherError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let body = response.bytes().await.map_err(|e| LauncherError::Network {
            url: url.to_string(),
            source: e,
        })?;

        let releases: Vec<Release> =
            serde_json::from_slice(&body).map_err(|e| LauncherError::Parse {
                url: url.to_string(),
                source: e,
            })?;

        let latest = releases
            .into_iter()
            .next()
            .map(|release| release.name)
            .ok_or_else(|| LauncherError::NoVersionFound(url.to_string()))?;

        debug!("Latest version is {}", latest);
        Ok(latest)
    }
}
