use std::path::{Path, PathBuf};

use async_trait::async_trait;
use imagebatch_domain::ports::{ImageLocation, ImageStorage};
use imagebatch_errors::{PipelineError, PipelineResult};
use tracing::{debug, instrument};

/// 本地文件系统上的图片存储，路径为 `{root}/{feed}/{post}/{index}_{w}x{h}.{ext}`
#[derive(Debug, Clone)]
pub struct FileImageStorage {
    root: PathBuf,
}

impl FileImageStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, location: &ImageLocation) -> PathBuf {
        self.root.join(location.relative_path())
    }
}

#[async_trait]
impl ImageStorage for FileImageStorage {
    #[instrument(skip(self), fields(path = %location.relative_path()))]
    async fn read_image_bytes(&self, location: &ImageLocation) -> PipelineResult<Vec<u8>> {
        let path = self.path_for(location);
        tokio::fs::read(&path)
            .await
            .map_err(|e| PipelineError::storage(format!("读取 {} 失败: {e}", path.display())))
    }

    #[instrument(skip(self, bytes), fields(path = %location.relative_path(), size = bytes.len()))]
    async fn write_image_bytes(
        &self,
        location: &ImageLocation,
        bytes: &[u8],
    ) -> PipelineResult<()> {
        let path = self.path_for(location);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 先写临时文件再改名，读者不会看到写了一半的图片
        let extension = location.extension.trim_start_matches('.');
        let tmp = path.with_extension(format!("{extension}.tmp"));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| PipelineError::storage(format!("写入 {} 失败: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("写入图片 {} ({} 字节)", path.display(), bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let storage = FileImageStorage::new(dir.path());
        let location = ImageLocation::new(1, 2, 99, 64, 32, "png");

        storage.write_image_bytes(&location, b"abc").await.unwrap();
        assert!(dir.path().join("1/2/99_64x32.png").exists());
        assert_eq!(storage.read_image_bytes(&location).await.unwrap(), b"abc");

        storage.write_image_bytes(&location, b"defg").await.unwrap();
        assert_eq!(storage.read_image_bytes(&location).await.unwrap(), b"defg");
    }

    #[tokio::test]
    async fn test_missing_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let storage = FileImageStorage::new(dir.path());
        let location = ImageLocation::new(1, 2, 0, 10, 10, "jpg");

        let err = storage.read_image_bytes(&location).await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
    }
}
