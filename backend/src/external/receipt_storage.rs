//! Receipt file storage
//!
//! Receipts for expense transactions live under a private root directory,
//! one folder per owner: `<owner_id>/<transaction_id>-<file name>`.

use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{AppError, AppResult};

const ALLOWED_CONTENT_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("application/pdf", "pdf"),
];

const MAX_FILE_NAME_LEN: usize = 100;

#[derive(Debug, Clone)]
pub struct ReceiptStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl ReceiptStorage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.receipts_dir, config.max_receipt_bytes)
    }

    /// Write a receipt and return its path relative to the storage root
    pub async fn store(
        &self,
        owner_id: Uuid,
        transaction_id: Uuid,
        file_name: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> AppResult<String> {
        let extension = extension_for(content_type).ok_or_else(|| AppError::Validation {
            field: "file".to_string(),
            message: "Receipt must be a JPEG, PNG, WEBP or PDF file".to_string(),
            message_pt: "O comprovante deve ser JPEG, PNG, WEBP ou PDF".to_string(),
        })?;

        if bytes.is_empty() {
            return Err(AppError::Validation {
                field: "file".to_string(),
                message: "Receipt file is empty".to_string(),
                message_pt: "O arquivo do comprovante está vazio".to_string(),
            });
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::Validation {
                field: "file".to_string(),
                message: format!("Receipt exceeds the {} byte limit", self.max_bytes),
                message_pt: format!("O comprovante excede o limite de {} bytes", self.max_bytes),
            });
        }

        let relative = format!(
            "{}/{}-{}",
            owner_id,
            transaction_id,
            sanitize_file_name(file_name, extension)
        );
        let path = self.root.join(&relative);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::StorageError(format!("create directory: {}", e)))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::StorageError(format!("write receipt: {}", e)))?;

        tracing::info!(
            transaction_id = %transaction_id,
            path = %relative,
            size = bytes.len(),
            "Stored receipt"
        );
        Ok(relative)
    }

    /// Remove a stored receipt. A missing file is not an error.
    pub async fn delete(&self, relative: &str) -> AppResult<()> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %relative, "Receipt file already gone");
                Ok(())
            }
            Err(e) => Err(AppError::StorageError(format!("delete receipt: {}", e))),
        }
    }

    /// Read a stored receipt back
    pub async fn read(&self, relative: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(relative)?;
        tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AppError::NotFound("Receipt".to_string()),
            _ => AppError::StorageError(format!("read receipt: {}", e)),
        })
    }

    fn resolve(&self, relative: &str) -> AppResult<PathBuf> {
        let candidate = Path::new(relative);
        let escapes = candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(AppError::StorageError(format!("invalid receipt path: {}", relative)));
        }
        Ok(self.root.join(candidate))
    }
}

/// Content type of a stored receipt, from its extension
pub fn content_type_for(path: &str) -> &'static str {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(_, ext)| *ext == extension)
        .map(|(content_type, _)| *content_type)
        .unwrap_or("application/octet-stream")
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    ALLOWED_CONTENT_TYPES
        .iter()
        .find(|(allowed, _)| allowed.eq_ignore_ascii_case(essence))
        .map(|(_, ext)| *ext)
}

/// Keep ASCII alphanumerics, dash and underscore from the stem and force the
/// extension that matches the content type
fn sanitize_file_name(file_name: &str, extension: &str) -> String {
    let base = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();

    let mut stem: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    stem.truncate(MAX_FILE_NAME_LEN);

    if stem.trim_matches('_').is_empty() {
        stem = "receipt".to_string();
    }
    format!("{}.{}", stem, extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_storage() -> ReceiptStorage {
        let root = std::env::temp_dir().join(format!("receipts-{}", Uuid::new_v4()));
        ReceiptStorage::new(root, 1024)
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("nota fiscal.PNG", "png"), "nota_fiscal.png");
        assert_eq!(sanitize_file_name("../../etc/passwd", "pdf"), "passwd.pdf");
        assert_eq!(sanitize_file_name("", "jpg"), "receipt.jpg");
        assert_eq!(sanitize_file_name("çãé.jpeg", "jpg"), "receipt.jpg");
    }

    #[test]
    fn test_content_types() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("application/pdf; charset=binary"), Some("pdf"));
        assert_eq!(extension_for("text/plain"), None);
        assert_eq!(content_type_for("a/b-receipt.webp"), "image/webp");
        assert_eq!(content_type_for("a/b-receipt.exe"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_store_read_delete() {
        let storage = temp_storage();
        let owner = Uuid::new_v4();
        let tx = Uuid::new_v4();

        let path = storage
            .store(owner, tx, "flour receipt.pdf", "application/pdf", b"%PDF-1.4")
            .await
            .unwrap();
        assert_eq!(path, format!("{}/{}-flour_receipt.pdf", owner, tx));
        assert_eq!(storage.read(&path).await.unwrap(), b"%PDF-1.4");

        storage.delete(&path).await.unwrap();
        assert!(matches!(storage.read(&path).await, Err(AppError::NotFound(_))));
        // second delete is a no-op
        storage.delete(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_store_rejects_bad_uploads() {
        let storage = temp_storage();
        let owner = Uuid::new_v4();
        let tx = Uuid::new_v4();

        let wrong_type = storage.store(owner, tx, "a.txt", "text/plain", b"x").await;
        assert!(matches!(wrong_type, Err(AppError::Validation { .. })));

        let empty = storage.store(owner, tx, "a.png", "image/png", b"").await;
        assert!(matches!(empty, Err(AppError::Validation { .. })));

        let too_big = vec![0u8; 2048];
        let oversized = storage.store(owner, tx, "a.png", "image/png", &too_big).await;
        assert!(matches!(oversized, Err(AppError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_resolve_rejects_traversal() {
        let storage = temp_storage();
        assert!(storage.read("../secret").await.is_err());
        assert!(storage.delete("/etc/passwd").await.is_err());
    }
}
