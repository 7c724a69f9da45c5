//! CSV export
//!
//! The emitter packages the accumulated CSV as a named, typed blob and hands
//! it to a [`FileSaver`]. The saver decides where bytes land.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use thiserror::Error;
use tokio::fs;
use tracing::info;

use crate::domain::constants::export::{CSV_MEDIA_TYPE, FILE_NAME_PREFIX};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No data to save")]
    NothingToExport,

    #[error("Failed to save {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Bytes plus the metadata a download needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBlob {
    pub bytes: Vec<u8>,
    pub media_type: &'static str,
    pub file_name: String,
}

/// "Persist bytes as a named downloadable file"
#[async_trait]
pub trait FileSaver: Send + Sync {
    async fn save(&self, blob: &ExportBlob) -> Result<PathBuf, ExportError>;
}

/// Saves into a fixed directory, replacing a same-named file
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl FileSaver for DirectorySaver {
    async fn save(&self, blob: &ExportBlob) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ExportError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.dir.join(&blob.file_name);
        fs::write(&path, &blob.bytes)
            .await
            .map_err(|source| ExportError::Io {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }
}

/// `wildberries_feedback_<YYYY-MM-DD>.csv`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("{FILE_NAME_PREFIX}{}.csv", date.format("%Y-%m-%d"))
}

#[derive(Clone)]
pub struct ExportEmitter {
    saver: Arc<dyn FileSaver>,
}

impl ExportEmitter {
    pub fn new(saver: Arc<dyn FileSaver>) -> Self {
        Self { saver }
    }

    pub fn to_directory(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(DirectorySaver::new(dir)))
    }

    /// Blob for `csv_body`, named with today's UTC date
    pub fn build_blob(csv_body: &str) -> ExportBlob {
        ExportBlob {
            bytes: csv_body.as_bytes().to_vec(),
            media_type: CSV_MEDIA_TYPE,
            file_name: export_file_name(Utc::now().date_naive()),
        }
    }

    pub async fn export(&self, csv_body: &str) -> Result<PathBuf, ExportError> {
        if csv_body.is_empty() {
            return Err(ExportError::NothingToExport);
        }

        let blob = Self::build_blob(csv_body);
        let path = self.saver.save(&blob).await?;
        info!("📁 Exported {} bytes to {:?}", blob.bytes.len(), path);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_name_embeds_the_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(export_file_name(date), "wildberries_feedback_2024-03-09.csv");
    }

    #[test]
    fn blob_is_tagged_as_csv() {
        let blob = ExportEmitter::build_blob("a,b\n");
        assert_eq!(blob.media_type, "text/csv; charset=utf-8");
        assert_eq!(blob.bytes, b"a,b\n");
        assert!(blob.file_name.starts_with("wildberries_feedback_"));
        assert!(blob.file_name.ends_with(".csv"));
    }

    #[tokio::test]
    async fn writes_file_into_directory() {
        let dir = TempDir::new().unwrap();
        let emitter = ExportEmitter::to_directory(dir.path().join("exports"));

        let path = emitter.export("PRODUCT ID\n\"1\"\n").await.unwrap();
        assert_eq!(path.parent().unwrap(), dir.path().join("exports"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "PRODUCT ID\n\"1\"\n");
    }

    #[tokio::test]
    async fn empty_body_is_not_exported() {
        let dir = TempDir::new().unwrap();
        let emitter = ExportEmitter::to_directory(dir.path());
        assert!(matches!(
            emitter.export("").await,
            Err(ExportError::NothingToExport)
        ));
    }
}
