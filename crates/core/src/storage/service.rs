//! Content store implementation using Apache OpenDAL.

use attachments_shared::{ContentId, StorageProvider, StorageSettings};
use futures::StreamExt;
use opendal::{Builder, ErrorKind, Operator, Writer, services};
use tracing::{debug, info, warn};

use super::error::StorageError;
use super::store::ContentStore;
use crate::content::Content;

/// Content store backed by an OpenDAL operator.
#[derive(Debug, Clone)]
pub struct OpendalContentStore {
    operator: Operator,
    settings: StorageSettings,
}

impl OpendalContentStore {
    /// Create a new content store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_settings(settings: StorageSettings) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&settings.provider)?;
        Ok(Self { operator, settings })
    }

    /// In-memory store for tests and local runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory backend cannot be initialized.
    pub fn memory() -> Result<Self, StorageError> {
        Self::from_settings(StorageSettings::new(StorageProvider::Memory))
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);
                finish(builder)
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);
                finish(builder)
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );
                finish(builder)
            }
            StorageProvider::Memory => finish(services::Memory::default()),
        }
    }

    /// Storage key of a content id.
    ///
    /// Format: `{key_prefix}/{content_id}`
    #[must_use]
    pub fn object_key(&self, content_id: &ContentId) -> String {
        let prefix = self.settings.key_prefix.trim_matches('/');
        if prefix.is_empty() {
            content_id.to_string()
        } else {
            format!("{prefix}/{content_id}")
        }
    }

    /// Check if content exists in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be reached.
    pub async fn exists(&self, content_id: &ContentId) -> Result<bool, StorageError> {
        match self.operator.stat(&self.object_key(content_id)).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.settings.provider.name()
    }

    /// Open a writer, passing content metadata where the backend supports it.
    async fn writer(
        &self,
        key: &str,
        file_name: &str,
        mime_type: &str,
    ) -> Result<Writer, StorageError> {
        let capability = self.operator.info().full_capability();
        let mut write = self.operator.writer_with(key);
        if capability.write_with_content_type {
            write = write.content_type(mime_type);
        }
        if capability.write_with_content_disposition {
            let disposition = format!("attachment; filename=\"{}\"", sanitize_filename(file_name));
            write = write.content_disposition(&disposition);
        }
        Ok(write.await?)
    }

    async fn abort(writer: &mut Writer, key: &str) {
        if let Err(e) = writer.abort().await {
            warn!(key, error = %e, "failed to abort partial content write");
        }
    }
}

impl ContentStore for OpendalContentStore {
    async fn upload(
        &self,
        mut content: Content,
        file_name: &str,
        mime_type: &str,
    ) -> Result<ContentId, StorageError> {
        let content_id = ContentId::generate();
        let key = self.object_key(&content_id);
        let mut writer = self.writer(&key, file_name, mime_type).await?;

        let mut written: u64 = 0;
        while let Some(chunk) = content.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    Self::abort(&mut writer, &key).await;
                    return Err(StorageError::Stream(e));
                }
            };
            written += chunk.len() as u64;
            if let Err(e) = writer.write(chunk).await {
                Self::abort(&mut writer, &key).await;
                return Err(e.into());
            }
        }
        writer.close().await?;

        info!(
            content_id = %content_id,
            provider = self.provider_name(),
            bytes = written,
            mime_type,
            "content uploaded"
        );
        Ok(content_id)
    }

    async fn read(&self, content_id: &ContentId) -> Result<Content, StorageError> {
        let key = self.object_key(content_id);
        let meta = match self.operator.stat(&key).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::not_found(key)),
            Err(e) => return Err(e.into()),
        };
        debug!(content_id = %content_id, bytes = meta.content_length(), "opening content");

        let stream = self
            .operator
            .reader(&key)
            .await?
            .into_bytes_stream(..)
            .await?;
        Ok(Content::new(stream))
    }

    async fn delete(&self, content_id: &ContentId) -> Result<(), StorageError> {
        let key = self.object_key(content_id);
        self.operator.delete(&key).await?;
        info!(content_id = %content_id, "content deleted");
        Ok(())
    }
}

fn finish(builder: impl Builder) -> Result<Operator, StorageError> {
    Ok(Operator::new(builder)
        .map_err(|e| StorageError::configuration(e.to_string()))?
        .finish())
}

/// Sanitize filename for the content disposition header.
///
/// Only allows ASCII alphanumeric characters, dots, hyphens, and underscores.
fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
