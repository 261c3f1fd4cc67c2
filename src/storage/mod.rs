//! Image storage for product uploads.
//!
//! Uploaded bytes are written under a server-controlled directory using a
//! name derived from the client's file name: sanitized, extension-checked and
//! prefixed with a fresh UUID so two uploads never collide. Products only
//! record the resulting file name.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("The uploaded file is empty")]
    Empty,
    #[error("The uploaded file is too large ({size} bytes, max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("Unsupported image type; allowed: {0}")]
    UnsupportedType(String),
    #[error("Invalid file name")]
    InvalidName,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the upload itself was unacceptable, as opposed to a server fault
    pub fn is_rejection(&self) -> bool {
        !matches!(self, StorageError::Io(_))
    }
}

/// Where product images live
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Store `bytes` under a name derived from `client_name`, returning the stored name
    async fn save(&self, bytes: &[u8], client_name: &str) -> Result<String, StorageError>;

    /// Remove a stored image; removing a missing image is not an error
    async fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Whether a stored image with this name exists
    async fn exists(&self, name: &str) -> bool;
}

/// Reduce a client-supplied file name to a safe basename.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`, turns whitespace into `_`,
/// drops everything else (including path separators) and strips leading dots
/// and underscores. Returns `None` if nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    // browsers on some platforms send full paths
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Images on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    root: PathBuf,
    max_bytes: usize,
    allowed_extensions: Vec<String>,
}

impl LocalImageStore {
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.upload_dir).await?;

        info!(path = %config.upload_dir.display(), "Image store initialized");

        Ok(Self {
            root: config.upload_dir.clone(),
            max_bytes: config.max_upload_bytes,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a stored name to its path, refusing anything that is not a plain file name
    fn resolve(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty()
            || name.contains(['/', '\\'])
            || name.starts_with('.')
            || sanitize_filename(name).as_deref() != Some(name)
        {
            return Err(StorageError::InvalidName);
        }
        Ok(self.root.join(name))
    }

    /// Check an upload and work out the name it will be stored under
    fn stored_name(&self, bytes: &[u8], client_name: &str) -> Result<String, StorageError> {
        if bytes.is_empty() {
            return Err(StorageError::Empty);
        }
        if bytes.len() > self.max_bytes {
            return Err(StorageError::TooLarge {
                size: bytes.len(),
                max: self.max_bytes,
            });
        }

        // browsers on some platforms send full paths
        let base = client_name.rsplit(['/', '\\']).next().unwrap_or(client_name);
        let ext = extension_of(base)
            .filter(|ext| self.allowed_extensions.contains(ext))
            .ok_or_else(|| StorageError::UnsupportedType(self.allowed_extensions.join(", ")))?;

        // a stem with nothing usable left, e.g. a non-Latin name, still gets stored
        let stem = Path::new(base)
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(sanitize_filename)
            .unwrap_or_else(|| "image".to_string());

        Ok(format!("{}_{}.{}", uuid::Uuid::new_v4().simple(), stem, ext))
    }
}

#[async_trait]
impl ImageStore for LocalImageStore {
    async fn save(&self, bytes: &[u8], client_name: &str) -> Result<String, StorageError> {
        let name = self.stored_name(bytes, client_name)?;
        let path = self.resolve(&name)?;

        fs::write(&path, bytes).await?;

        debug!(name = %name, size = bytes.len(), "Image stored");
        Ok(name)
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.resolve(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(name = %name, "Image deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(name = %name, "Image already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> bool {
        match self.resolve(name) {
            Ok(path) => fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}
