//! Application configuration management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Attachment handling configuration.
    #[serde(default)]
    pub attachments: AttachmentSettings,
    /// Content store configuration.
    pub storage: StorageSettings,
}

/// When a content deletion caused by an update is sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalTiming {
    /// Delete while the request is still being processed.
    Immediate,
    /// Queue the delete and run it once the transaction commits.
    OnCommit,
}

/// Attachment handling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentSettings {
    /// Upload size limit used when an entity declares none (e.g. `"400MB"`).
    #[serde(default = "default_max_size")]
    pub default_max_size: String,
    /// Request a malware scan for every upload once its transaction commits.
    #[serde(default = "default_scan_on_upload")]
    pub scan_on_upload: bool,
    /// Timing of the delete issued when content is explicitly set to null.
    #[serde(default = "default_explicit_removal")]
    pub explicit_removal: RemovalTiming,
    /// Timing of the delete issued when an attachment leaves its composition.
    #[serde(default = "default_composition_removal")]
    pub composition_removal: RemovalTiming,
}

fn default_max_size() -> String {
    "400MB".to_string()
}

fn default_scan_on_upload() -> bool {
    true
}

fn default_explicit_removal() -> RemovalTiming {
    RemovalTiming::Immediate
}

fn default_composition_removal() -> RemovalTiming {
    RemovalTiming::OnCommit
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            default_max_size: default_max_size(),
            scan_on_upload: default_scan_on_upload(),
            explicit_removal: default_explicit_removal(),
            composition_removal: default_composition_removal(),
        }
    }
}

/// Storage provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: Cloudflare R2, Supabase, AWS S3, DigitalOcean Spaces
    S3 {
        /// S3 endpoint URL.
        endpoint: String,
        /// S3 bucket name.
        bucket: String,
        /// AWS access key ID.
        access_key_id: String,
        /// AWS secret access key.
        secret_access_key: String,
        /// AWS region.
        region: String,
    },
    /// Azure Blob Storage
    AzureBlob {
        /// Azure storage account name.
        account: String,
        /// Azure storage access key.
        access_key: String,
        /// Azure container name.
        container: String,
    },
    /// Local filesystem (development only)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
    /// In-process memory (tests only)
    Memory,
}

impl StorageProvider {
    /// Create S3-compatible provider (Cloudflare R2, Supabase, AWS S3).
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            region: region.into(),
        }
    }

    /// Create Azure Blob Storage provider.
    #[must_use]
    pub fn azure_blob(
        account: impl Into<String>,
        access_key: impl Into<String>,
        container: impl Into<String>,
    ) -> Self {
        Self::AzureBlob {
            account: account.into(),
            access_key: access_key.into(),
            container: container.into(),
        }
    }

    /// Create local filesystem provider (development only).
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Get the provider name for logging.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::AzureBlob { .. } => "azure_blob",
            Self::LocalFs { .. } => "local",
            Self::Memory => "memory",
        }
    }
}

/// Content store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Backend holding the content.
    pub provider: StorageProvider,
    /// Path prefix under which content objects are written.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_key_prefix() -> String {
    "attachments".to_string()
}

impl StorageSettings {
    /// Settings for the given provider with the default key prefix.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            key_prefix: default_key_prefix(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("ATTACHMENTS").separator("__"))
            .build()?;

        config.try_deserialize()
    }

    /// Loads `.env` (if present) and then the layered configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        Self::load()
    }
}
