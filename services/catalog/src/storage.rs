//! Local disk storage for product images

use anyhow::{Context, Result};
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FieldError, IMAGE_TOO_LARGE};
use crate::models::product::UploadedImage;

/// Public URL prefix under which stored images are served
pub const UPLOADS_PREFIX: &str = "/uploads/";

fn image_extension_regex() -> &'static Regex {
    static IMAGE_EXTENSION_REGEX: OnceLock<Regex> = OnceLock::new();
    IMAGE_EXTENSION_REGEX.get_or_init(|| {
        Regex::new(r"(?i)\.(jpe?g|png)$").expect("Failed to compile image extension regex")
    })
}

fn unsafe_chars_regex() -> &'static Regex {
    static UNSAFE_CHARS_REGEX: OnceLock<Regex> = OnceLock::new();
    UNSAFE_CHARS_REGEX
        .get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("Failed to compile file name regex"))
}

/// An image read back from disk
#[derive(Debug)]
pub struct StoredImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Image store writing to a local directory
#[derive(Debug, Clone)]
pub struct LocalImageStore {
    upload_dir: Arc<PathBuf>,
    max_bytes: u64,
}

impl LocalImageStore {
    pub fn new(upload_dir: PathBuf, max_bytes: u64) -> Self {
        Self {
            upload_dir: Arc::new(upload_dir),
            max_bytes,
        }
    }

    /// Create the upload directory if needed
    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(self.upload_dir.as_path())
            .await
            .with_context(|| format!("Failed to create upload directory {:?}", self.upload_dir))
    }

    /// Check type and size of an uploaded image
    pub fn check(&self, image: &UploadedImage) -> Option<FieldError> {
        if !image_extension_regex().is_match(&image.file_name) {
            return Some(FieldError::new("image", "Seules les images sont autorisées"));
        }
        if image.bytes.len() as u64 > self.max_bytes {
            return Some(FieldError::new("image", IMAGE_TOO_LARGE));
        }
        None
    }

    /// Persist an image and return its public URL
    pub async fn save(&self, image: &UploadedImage) -> Result<String> {
        self.ensure_dir().await?;

        let file_name = format!("{}-{}", Uuid::new_v4(), sanitize_file_name(&image.file_name));
        let path = self.upload_dir.join(&file_name);

        let mut file = fs::File::create(&path)
            .await
            .with_context(|| format!("Failed to create {:?}", path))?;
        file.write_all(&image.bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        file.flush().await?;

        info!(
            file_name = %file_name,
            size_bytes = image.bytes.len(),
            "Stored product image"
        );

        Ok(format!("{}{}", UPLOADS_PREFIX, file_name))
    }

    /// Remove an image saved for a write that did not go through
    pub async fn discard(&self, url: &str) {
        let Some(file_name) = url
            .strip_prefix(UPLOADS_PREFIX)
            .filter(|name| is_plain_file_name(name))
        else {
            warn!("Not discarding unexpected image URL {:?}", url);
            return;
        };

        let path = self.upload_dir.join(file_name);
        match fs::remove_file(&path).await {
            Ok(()) => info!(file_name = %file_name, "Discarded unused product image"),
            Err(e) => warn!("Failed to discard {:?}: {}", path, e),
        }
    }

    /// Read a stored image by file name; `None` when it does not exist
    pub async fn read(&self, file_name: &str) -> Result<Option<StoredImage>> {
        if !is_plain_file_name(file_name) {
            debug!("Refusing to serve {:?}", file_name);
            return Ok(None);
        }

        let path = self.upload_dir.join(file_name);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(StoredImage {
                bytes,
                content_type: content_type_for(file_name),
            })),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
        }
    }
}

/// Keep only characters that are safe in a file name
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    unsafe_chars_regex()
        .replace_all(base, "_")
        .replace("..", "_")
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['/', '\\']) && !name.contains("..")
}

fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}
