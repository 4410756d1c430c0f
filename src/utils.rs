use std::{env, path::Path};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("invalid GITHUB_TOKEN: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to download {url}: {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

async fn download_file(url: &str, path: &Path) -> Result<(), BootstrapError> {
    tracing::info!("Downloading {} from {}", path.display(), url);

    let mut header_map = HeaderMap::new();

    // Release assets on private repositories need a token.
    if let Ok(token) = env::var("GITHUB_TOKEN") {
        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))?;
        header_map.insert(AUTHORIZATION, auth_value);
    }
    header_map.insert(ACCEPT, HeaderValue::from_static("application/octet-stream"));

    let client = reqwest::Client::new();
    let response = client.get(url).headers(header_map).send().await?;

    if !response.status().is_success() {
        return Err(BootstrapError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let bytes = response.bytes().await?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| BootstrapError::Write {
                path: parent.display().to_string(),
                source,
            })?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| BootstrapError::Write {
            path: path.display().to_string(),
            source,
        })?;

    Ok(())
}

/// Downloads `path` from `url` unless it already exists or no URL is set.
pub async fn ensure_file_exists(path: &Path, url: Option<&str>) -> Result<(), BootstrapError> {
    if path.exists() {
        return Ok(());
    }

    match url {
        Some(url) => download_file(url, path).await,
        None => {
            tracing::debug!("{} is missing and no download URL is configured", path.display());
            Ok(())
        }
    }
}
