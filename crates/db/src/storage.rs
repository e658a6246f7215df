//! Object-storage listers for the variant image bucket.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use atelier_core::config::{StorageConfig, StorageProvider};
use atelier_core::sources::{SourceError, StorageLister};

const LIST_PAGE_LIMIT: u32 = 1000;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("storage endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("storage is misconfigured: {0}")]
    Misconfigured(String),
}

impl From<StorageError> for SourceError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Status { status, body } if (400..500).contains(&status) => {
                SourceError::Decode(format!("storage rejected listing ({status}): {body}"))
            }
            other => SourceError::Unavailable(other.to_string()),
        }
    }
}

/// Builds the lister selected by `storage.provider`.
pub fn storage_lister_from_config(
    config: &StorageConfig,
) -> Result<Arc<dyn StorageLister>, StorageError> {
    match config.provider {
        StorageProvider::Local => Ok(Arc::new(LocalStorageLister::new(config.local_root.clone()))),
        StorageProvider::Http => {
            let base_url = config.base_url.clone().ok_or_else(|| {
                StorageError::Misconfigured("storage.base_url is required for http".to_string())
            })?;
            let service_key = config.service_key.clone().ok_or_else(|| {
                StorageError::Misconfigured("storage.service_key is required for http".to_string())
            })?;
            Ok(Arc::new(HttpStorageLister::new(Client::new(), base_url, service_key)))
        }
    }
}

/// Buckets as directories under a local root: `<root>/<bucket>/<folder>/<name>`.
pub struct LocalStorageLister {
    root: PathBuf,
}

impl LocalStorageLister {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn read_folder(&self, bucket: &str, folder: &str) -> Result<Vec<String>, StorageError> {
        let path = self.root.join(bucket).join(folder);
        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!(
                    event_name = "storage.local.missing_folder",
                    path = %path.display(),
                    "storage folder does not exist"
                );
                return Ok(Vec::new());
            }
            Err(error) => return Err(error.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl StorageLister for LocalStorageLister {
    async fn list(&self, bucket: &str, folder: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.read_folder(bucket, folder).await?)
    }
}

#[derive(Debug, Serialize)]
struct ListObjectsRequest<'a> {
    prefix: &'a str,
    limit: u32,
    offset: u32,
}

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
}

/// Hosted object storage exposing `POST {base_url}/object/list/{bucket}`.
pub struct HttpStorageLister {
    client: Client,
    base_url: String,
    service_key: SecretString,
}

impl HttpStorageLister {
    pub fn new(client: Client, base_url: impl Into<String>, service_key: SecretString) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url, service_key }
    }

    fn list_url(&self, bucket: &str) -> String {
        format!("{}/object/list/{bucket}", self.base_url)
    }

    /// Pages through the folder until a short page comes back.
    async fn fetch(&self, bucket: &str, folder: &str) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.fetch_page(bucket, folder, offset).await?;
            let full_page = page.len() >= LIST_PAGE_LIMIT as usize;
            names.extend(page);
            if !full_page {
                break;
            }
            offset += LIST_PAGE_LIMIT;
        }

        debug!(
            event_name = "storage.http.listed",
            bucket,
            folder,
            object_count = names.len(),
            pages = offset / LIST_PAGE_LIMIT + 1,
            "storage folder listed"
        );
        Ok(names)
    }

    async fn fetch_page(
        &self,
        bucket: &str,
        folder: &str,
        offset: u32,
    ) -> Result<Vec<String>, StorageError> {
        let response = self
            .client
            .post(self.list_url(bucket))
            .bearer_auth(self.service_key.expose_secret())
            .header("apikey", self.service_key.expose_secret())
            .json(&ListObjectsRequest { prefix: folder, limit: LIST_PAGE_LIMIT, offset })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Status { status: status.as_u16(), body });
        }

        let objects: Vec<ListedObject> = response.json().await?;
        Ok(objects.into_iter().map(|object| object.name).collect())
    }
}

#[async_trait]
impl StorageLister for HttpStorageLister {
    async fn list(&self, bucket: &str, folder: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.fetch(bucket, folder).await?)
    }
}
