use super::Endpoint;
use crate::error::{Result, TsflowError};
use async_trait::async_trait;
use bytes::Bytes;
use log::info;
use std::path::PathBuf;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Writes the stream to a file, truncating it on open.
#[derive(Debug)]
pub struct FileEndpoint {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    bytes_written: u64,
}

impl FileEndpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
            bytes_written: 0,
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

#[async_trait]
impl Endpoint for FileEndpoint {
    async fn open(&mut self) -> Result<()> {
        let file = File::create(&self.path).await.map_err(|e| {
            TsflowError::Endpoint(format!("Failed to create {}: {}", self.path.display(), e))
        })?;
        self.writer = Some(BufWriter::new(file));
        self.bytes_written = 0;
        info!("Opened {}", self.path.display());
        Ok(())
    }

    async fn write(&mut self, data: Bytes) -> Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| TsflowError::Endpoint(format!("{} is not open", self.path.display())))?;
        writer.write_all(&data).await?;
        self.bytes_written += data.len() as u64;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await?;
            writer.shutdown().await?;
            info!(
                "Closed {} after {} bytes",
                self.path.display(),
                self.bytes_written
            );
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("file://{}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("tsflow-{}-{}.ts", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_writes_and_truncates() {
        let path = temp_path("file-endpoint");
        let mut endpoint = FileEndpoint::new(&path);

        endpoint.open().await.unwrap();
        endpoint.write(Bytes::from_static(&[0x47; 376])).await.unwrap();
        endpoint.close().await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap().len(), 376);

        endpoint.open().await.unwrap();
        endpoint.write(Bytes::from_static(&[0x47; 188])).await.unwrap();
        endpoint.close().await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap().len(), 188);
        assert_eq!(endpoint.bytes_written(), 188);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_before_open_fails() {
        let mut endpoint = FileEndpoint::new(temp_path("unopened"));
        assert!(endpoint.write(Bytes::from_static(&[0x47])).await.is_err());
        endpoint.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_in_missing_directory_fails() {
        let mut endpoint = FileEndpoint::new("/nonexistent-tsflow-dir/out.ts");
        let err = endpoint.open().await.unwrap_err();
        assert!(matches!(err, TsflowError::Endpoint(_)));
    }
}
