//! Destinations for downloaded files

use crate::Result;
use crate::error::ClientError;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::info;

/// Persists a downloaded file
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Save `bytes` as `file_name`, returning where it ended up
    async fn save(&self, bytes: Bytes, mime: &str, file_name: &str) -> Result<PathBuf>;
}

/// Writes downloads into a directory
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Default for DirectorySink {
    fn default() -> Self {
        Self::new(".")
    }
}

#[async_trait]
impl FileSink for DirectorySink {
    async fn save(&self, bytes: Bytes, mime: &str, file_name: &str) -> Result<PathBuf> {
        // only the final component is kept so a name cannot escape the directory
        let name = Path::new(file_name)
            .file_name()
            .ok_or_else(|| ClientError::Configuration(format!("invalid file name: {file_name:?}")))?;
        let target = self.dir.join(name);

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&target, &bytes).await?;

        info!(path = %target.display(), mime, size = bytes.len(), "Saved download");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path().join("downloads"));

        let path = sink
            .save(Bytes::from_static(b"a,b\n1,2\n"), "text/csv", "report.csv")
            .await
            .unwrap();

        assert_eq!(path, dir.path().join("downloads").join("report.csv"));
        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\n1,2\n");
    }

    #[tokio::test]
    async fn strips_directory_components() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());

        let path = sink
            .save(Bytes::from_static(b"x"), "text/plain", "../../etc/out.txt")
            .await
            .unwrap();
        assert_eq!(path, dir.path().join("out.txt"));
    }

    #[tokio::test]
    async fn rejects_empty_name() {
        let dir = tempfile::tempdir().unwrap();
        let sink = DirectorySink::new(dir.path());
        assert!(matches!(
            sink.save(Bytes::new(), "text/plain", "..").await,
            Err(ClientError::Configuration(_))
        ));
    }
}
