//! Materializes export results as files in the download location.

use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use tempfile::NamedTempFile;

use crate::{
    codec::{self, Blob},
    error::ExportError,
};

/// A host capability that saves a blob directly, bypassing the staged file.
pub trait SaveBlob: Send + Sync {
    fn save_blob(&self, blob: &Blob, file_name: &str) -> Result<(), ExportError>;
}

#[derive(Clone)]
pub struct Downloader {
    dir: PathBuf,
    save_blob: Option<Arc<dyn SaveBlob>>,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("dir", &self.dir)
            .field("save_blob", &self.save_blob.is_some())
            .finish()
    }
}

impl Downloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            save_blob: None,
        }
    }

    pub fn with_save_blob(mut self, save_blob: Arc<dyn SaveBlob>) -> Self {
        self.save_blob = Some(save_blob);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn from_data_url(&self, file_name: &str, data_url: &str) -> Result<(), ExportError> {
        let blob = codec::to_blob(data_url)?;
        self.from_blob(&blob, file_name)
    }

    pub fn from_blob(&self, blob: &Blob, file_name: &str) -> Result<(), ExportError> {
        let file_name = sanitize_file_name(file_name)?;

        if let Some(save_blob) = &self.save_blob {
            tracing::debug!(file_name, mime = %blob.mime, "Saving blob through host capability");
            return save_blob.save_blob(blob, file_name);
        }

        let target = self.dir.join(file_name);

        // The staged file is removed on drop unless it gets persisted.
        let mut staged = NamedTempFile::new_in(&self.dir)?;
        staged.write_all(&blob.data)?;
        staged.flush()?;
        staged.persist(&target).map_err(|e| ExportError::Io(e.error))?;

        tracing::info!(path = %target.display(), bytes = blob.data.len(), "Download saved");
        Ok(())
    }
}

fn sanitize_file_name(file_name: &str) -> Result<&str, ExportError> {
    Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ExportError::InvalidFileName(file_name.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tempfile::TempDir;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        saved: Mutex<Vec<(String, Blob)>>,
    }

    impl SaveBlob for Recorder {
        fn save_blob(&self, blob: &Blob, file_name: &str) -> Result<(), ExportError> {
            self.saved
                .lock()
                .unwrap()
                .push((file_name.to_string(), blob.clone()));
            Ok(())
        }
    }

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_from_blob_writes_only_the_target_file() {
        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(dir.path());

        downloader
            .from_blob(&Blob::new("hello", "text/plain"), "out.txt")
            .unwrap();

        assert_eq!(entries(dir.path()), vec!["out.txt"]);
        assert_eq!(std::fs::read(dir.path().join("out.txt")).unwrap(), b"hello");
    }

    #[test]
    fn test_from_data_url_decodes_payload() {
        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(dir.path());

        downloader
            .from_data_url("table.csv", "data:text/csv;base64,YSxi")
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("table.csv")).unwrap(), b"a,b");
    }

    #[test]
    fn test_malformed_data_url_leaves_no_artifact() {
        let dir = TempDir::new().unwrap();
        let downloader = Downloader::new(dir.path());

        let err = downloader.from_data_url("x.csv", "not a data url").unwrap_err();
        assert!(matches!(err, ExportError::MalformedDataUrl(_)));
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_failed_persist_removes_staged_file() {
        let dir = TempDir::new().unwrap();
        // a directory in the way makes the final rename fail
        std::fs::create_dir(dir.path().join("taken")).unwrap();
        std::fs::write(dir.path().join("taken").join("keep"), b"x").unwrap();
        let downloader = Downloader::new(dir.path());

        assert!(
            downloader
                .from_blob(&Blob::new("data", "text/plain"), "taken")
                .is_err()
        );
        assert_eq!(entries(dir.path()), vec!["taken"]);
    }

    #[test]
    fn test_save_blob_capability_takes_precedence() {
        let dir = TempDir::new().unwrap();
        let recorder = Arc::new(Recorder::default());
        let downloader = Downloader::new(dir.path()).with_save_blob(recorder.clone());

        downloader
            .from_blob(&Blob::new("abc", "text/plain"), "a.txt")
            .unwrap();

        let saved = recorder.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].0, "a.txt");
        assert!(entries(dir.path()).is_empty());
    }

    #[test]
    fn test_file_name_is_reduced_to_last_component() {
        assert_eq!(sanitize_file_name("../../etc/report.pdf").unwrap(), "report.pdf");
        assert!(sanitize_file_name("").is_err());
        assert!(sanitize_file_name("..").is_err());
    }
}
