// service/attachment_service.rs
use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use sha2::{Digest, Sha256};

use crate::service::error::ServiceError;

pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AttachmentUpload {
    /// Accepts plain base64 or a `data:<mime>;base64,` URL.
    pub fn from_base64(file_name: &str, data: &str) -> Result<Self, ServiceError> {
        let clean_data = if data.starts_with("data:") {
            data.split(',').nth(1).unwrap_or(data)
        } else {
            data
        };

        let bytes = general_purpose::STANDARD
            .decode(clean_data.trim())
            .map_err(|e| ServiceError::validation("attachment", format!("Invalid base64: {}", e)))?;

        if bytes.is_empty() {
            return Err(ServiceError::validation("attachment", "Attachment is empty"));
        }
        if bytes.len() > MAX_ATTACHMENT_BYTES {
            return Err(ServiceError::validation("attachment", "Attachment exceeds 10MB"));
        }

        Ok(Self {
            file_name: file_name.to_string(),
            bytes,
        })
    }

    fn extension(&self) -> Option<String> {
        let ext = self.file_name.rsplit_once('.')?.1.to_ascii_lowercase();
        let valid = !ext.is_empty()
            && ext.len() <= 8
            && ext.chars().all(|c| c.is_ascii_alphanumeric());
        valid.then_some(ext)
    }
}

/// A reference is the sha256 hex digest, optionally followed by `.ext`.
pub fn is_valid_reference(reference: &str) -> bool {
    let (digest, ext) = match reference.split_once('.') {
        Some((digest, ext)) => (digest, Some(ext)),
        None => (reference, None),
    };

    let digest_ok = digest.len() == 64 && digest.chars().all(|c| c.is_ascii_hexdigit());
    let ext_ok = ext.map_or(true, |ext| {
        !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
    });

    digest_ok && ext_ok
}

pub fn content_type(reference: &str) -> &'static str {
    let ext = reference
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain; charset=utf-8",
        "csv" => "text/csv",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

#[async_trait]
pub trait AttachmentStore: Send + Sync + std::fmt::Debug {
    /// `None` in, `None` out.
    async fn store(&self, upload: Option<AttachmentUpload>) -> Result<Option<String>, ServiceError>;

    /// Bytes behind a reference returned by `store`. `None` when the
    /// reference is malformed or the file is gone.
    async fn open(&self, reference: &str) -> Result<Option<Vec<u8>>, ServiceError>;
}

/// Content-addressed files under a root directory. The returned reference
/// is the path relative to that root.
#[derive(Debug, Clone)]
pub struct LocalAttachmentStore {
    root: PathBuf,
}

impl LocalAttachmentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, reference: &str) -> PathBuf {
        self.root.join(reference)
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn store(&self, upload: Option<AttachmentUpload>) -> Result<Option<String>, ServiceError> {
        let Some(upload) = upload else {
            return Ok(None);
        };

        let mut hasher = Sha256::new();
        hasher.update(&upload.bytes);
        let digest = hex::encode(hasher.finalize());

        let reference = match upload.extension() {
            Some(ext) => format!("{}.{}", digest, ext),
            None => digest,
        };

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| ServiceError::Attachment(e.to_string()))?;

        let path = self.resolve(&reference);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(Some(reference));
        }

        tokio::fs::write(&path, &upload.bytes)
            .await
            .map_err(|e| ServiceError::Attachment(e.to_string()))?;

        tracing::info!("Stored attachment {} ({} bytes)", reference, upload.bytes.len());
        Ok(Some(reference))
    }

    async fn open(&self, reference: &str) -> Result<Option<Vec<u8>>, ServiceError> {
        if !is_valid_reference(reference) {
            return Ok(None);
        }

        match tokio::fs::read(self.resolve(reference)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ServiceError::Attachment(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_store() -> LocalAttachmentStore {
        LocalAttachmentStore::new(std::env::temp_dir().join(format!("attachments-{}", Uuid::new_v4())))
    }

    #[tokio::test]
    async fn test_store_none_is_none() {
        assert_eq!(temp_store().store(None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_writes_content_addressed_file() {
        let store = temp_store();
        let upload = AttachmentUpload {
            file_name: "Screenshot.PNG".to_string(),
            bytes: b"not really a png".to_vec(),
        };

        let reference = store.store(Some(upload.clone())).await.unwrap().unwrap();
        assert!(reference.ends_with(".png"));
        assert_eq!(reference.len(), 64 + 4);
        assert_eq!(store.open(&reference).await.unwrap(), Some(upload.bytes.clone()));

        let again = store.store(Some(upload)).await.unwrap().unwrap();
        assert_eq!(again, reference);
    }

    #[tokio::test]
    async fn test_open_rejects_foreign_paths() {
        let store = temp_store();
        assert_eq!(store.open("../../etc/passwd").await.unwrap(), None);
        assert_eq!(store.open(&"a".repeat(64)).await.unwrap(), None);
        assert!(!is_valid_reference(&format!("{}.p/ng", "a".repeat(64))));
        assert!(is_valid_reference(&format!("{}.png", "0f".repeat(32))));
    }

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type("abc.PNG"), "image/png");
        assert_eq!(content_type("abc.pdf"), "application/pdf");
        assert_eq!(content_type("abc"), "application/octet-stream");
    }

    #[test]
    fn test_from_base64_accepts_data_url() {
        let upload = AttachmentUpload::from_base64("a.txt", "data:text/plain;base64,aGVsbG8=").unwrap();
        assert_eq!(upload.bytes, b"hello");
    }

    #[test]
    fn test_from_base64_rejects_garbage() {
        let err = AttachmentUpload::from_base64("a.txt", "%%%").unwrap_err();
        assert!(matches!(err, ServiceError::Validation { field: "attachment", .. }));
    }

    #[test]
    fn test_extension_is_sanitized() {
        let upload = AttachmentUpload {
            file_name: "../../etc/passwd".to_string(),
            bytes: vec![1],
        };
        assert_eq!(upload.extension(), None);
    }
}
