//! Object storage for tenant assets and profile images.
//!
//! Only upload and public URL resolution are offered. There is no retry,
//! chunking or integrity check.

use crate::error::AppError;
use crate::settings::Settings;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous object.
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError>;

    /// URL under which `key` is publicly readable.
    fn public_url(&self, key: &str) -> String;
}

/// File extension for the image types accepted as logos and avatars.
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/svg+xml" => Some("svg"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some("ico"),
        _ => None,
    }
}

/// Store an image under `{prefix}-{uuid}.{ext}` and return its public URL.
pub async fn upload_image(
    storage: &dyn FileStorage,
    prefix: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<String, AppError> {
    let ext = image_extension(content_type)
        .ok_or_else(|| AppError::Validation(format!("unsupported image type {}", content_type)))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("empty upload".into()));
    }
    let key = format!("{}-{}.{}", prefix, uuid::Uuid::new_v4().simple(), ext);
    storage.upload(&key, bytes, content_type).await?;
    Ok(storage.public_url(&key))
}

pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base: String,
}

impl S3Storage {
    pub fn new(client: Client, bucket: impl Into<String>, public_base: impl Into<String>) -> Self {
        S3Storage {
            client,
            bucket: bucket.into(),
            public_base: public_base.into(),
        }
    }

    /// Client from the ambient AWS configuration (env, profile, instance role).
    pub async fn from_settings(settings: &Settings) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        S3Storage::new(
            Client::new(&config),
            settings.storage_bucket.clone(),
            settings.storage_public_url.clone(),
        )
    }
}

#[async_trait]
impl FileStorage for S3Storage {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AppError::Storage(e.into_service_error().to_string()))?;
        tracing::info!(bucket = %self.bucket, key, size, "object uploaded");
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base.trim_end_matches('/'), key)
    }
}

/// In-process storage for tests and local runs.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<HashMap<String, (String, Vec<u8>)>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type and bytes stored under `key`.
    pub fn object(&self, key: &str) -> Option<(String, Vec<u8>)> {
        self.objects.read().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl FileStorage for MemoryStorage {
    async fn upload(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), AppError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| AppError::Storage("storage lock poisoned".into()))?;
        objects.insert(key.to_string(), (content_type.to_string(), bytes));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("memory://{}", key)
    }
}
