//! Object store gateway: uploads files under namespaced keys and resolves public URLs.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

/// File received from the applicant, held in memory until it is uploaded.
#[derive(Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase extension of the original file name, `bin` when there is none.
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "bin".to_string())
    }

    pub fn mime(&self) -> mime::Mime {
        self.content_type
            .as_deref()
            .and_then(|raw| raw.parse::<mime::Mime>().ok())
            .unwrap_or_else(|| mime_guess::from_path(&self.file_name).first_or_octet_stream())
    }
}

impl fmt::Debug for UploadFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Storage key shaped as `{namespace}/{category}/{timestamp}.{ext}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(namespace: &str, category: &str, at: DateTime<Utc>, extension: &str) -> Self {
        Self(format!(
            "{namespace}/{category}/{}.{extension}",
            at.timestamp_millis()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub bucket: String,
    pub path: String,
    pub size_bytes: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object path '{0}'")]
    InvalidPath(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage backend failed: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        key: &ObjectKey,
        file: &UploadFile,
    ) -> Result<StoredObject, StorageError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError>;
}

fn join_url(base: &str, bucket: &str, path: &str) -> String {
    format!("{}/{bucket}/{path}", base.trim_end_matches('/'))
}

/// Rejects absolute paths and parent traversal so keys cannot escape the bucket.
fn relative_path(raw: &str) -> Result<PathBuf, StorageError> {
    let path = Path::new(raw);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return Err(StorageError::InvalidPath(raw.to_string())),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(StorageError::InvalidPath(raw.to_string()));
    }
    Ok(clean)
}

/// Filesystem-backed store: `{root}/{bucket}/{key}`.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub async fn new(
        root: impl AsRef<Path>,
        public_base_url: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await.map_err(|err| {
            StorageError::Backend(format!("failed to create {}: {err}", root.display()))
        })?;

        info!(root = %root.display(), "initialized local object store");

        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
        })
    }

    fn object_path(&self, bucket: &str, path: &str) -> Result<PathBuf, StorageError> {
        Ok(self
            .root
            .join(relative_path(bucket)?)
            .join(relative_path(path)?))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &ObjectKey,
        file: &UploadFile,
    ) -> Result<StoredObject, StorageError> {
        let target = self.object_path(bucket, key.as_str())?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|err| {
                StorageError::Backend(format!("failed to create {}: {err}", parent.display()))
            })?;
        }

        debug!(%bucket, %key, size = file.size(), "writing object");
        fs::write(&target, &file.bytes).await.map_err(|err| {
            StorageError::Backend(format!("failed to write {}: {err}", target.display()))
        })?;

        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: key.as_str().to_string(),
            size_bytes: file.size(),
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        join_url(&self.public_base_url, bucket, path)
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.object_path(bucket, path)?;
        match fs::read(&target).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{bucket}/{path}")))
            }
            Err(err) => Err(StorageError::Backend(format!(
                "failed to read {}: {err}",
                target.display()
            ))),
        }
    }
}

/// In-process store for demos and tests.
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    objects: Arc<Mutex<BTreeMap<(String, String), Vec<u8>>>>,
    public_base_url: String,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new("memory://objects")
    }
}

impl MemoryObjectStore {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            objects: Arc::new(Mutex::new(BTreeMap::new())),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn paths(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .map(|objects| {
                objects
                    .keys()
                    .filter(|(stored_bucket, _)| stored_bucket == bucket)
                    .map(|(_, path)| path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(
        &self,
        bucket: &str,
        key: &ObjectKey,
        file: &UploadFile,
    ) -> Result<StoredObject, StorageError> {
        relative_path(key.as_str())?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Backend("object map poisoned".to_string()))?;
        objects.insert(
            (bucket.to_string(), key.as_str().to_string()),
            file.bytes.clone(),
        );
        Ok(StoredObject {
            bucket: bucket.to_string(),
            path: key.as_str().to_string(),
            size_bytes: file.size(),
        })
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        join_url(&self.public_base_url, bucket, path)
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Backend("object map poisoned".to_string()))?;
        objects
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{bucket}/{path}")))
    }
}
