use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;

use crate::contracts::PresignedPost;
use crate::contracts::UploadError;
use crate::contracts::UploadedFile;

/// Percent-complete callback. Values are in `[0, 100]`.
pub type Progress<'a> = &'a mut dyn FnMut(f64);

pub trait FileUploader {
    fn presign(&self, file_name: &str) -> Result<PresignedPost, UploadError>;

    fn post(
        &self,
        target: &PresignedPost,
        source: &Path,
        progress: Progress<'_>,
    ) -> Result<(), UploadError>;

    fn preview_url(&self, storage_key: &str) -> Result<String, UploadError>;

    fn upload(
        &self,
        file_name: &str,
        source: &Path,
        progress: Progress<'_>,
    ) -> Result<UploadedFile, UploadError> {
        let target = self.presign(file_name)?;
        self.post(&target, source, progress)?;
        let preview_url = self.preview_url(&target.key)?;
        Ok(UploadedFile {
            preview_url,
            storage_key: target.key,
        })
    }
}

/// Object store backed by a local directory. Keys are paths below `root`.
#[derive(Debug, Clone)]
pub struct LocalStoreUploader {
    root: PathBuf,
    chunk_size: usize,
}

impl LocalStoreUploader {
    pub fn new(root: impl Into<PathBuf>, chunk_size: usize) -> Self {
        Self {
            root: root.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl FileUploader for LocalStoreUploader {
    fn presign(&self, file_name: &str) -> Result<PresignedPost, UploadError> {
        let safe_name = storage_name(file_name).ok_or_else(|| UploadError::Presign {
            name: file_name.to_string(),
            reason: "file name is empty".to_string(),
        })?;
        let prefix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let key = format!("chat/{prefix}/{safe_name}");
        Ok(PresignedPost {
            url: self.root.display().to_string(),
            fields: BTreeMap::from([("key".to_string(), key.clone())]),
            key,
        })
    }

    fn post(
        &self,
        target: &PresignedPost,
        source: &Path,
        progress: Progress<'_>,
    ) -> Result<(), UploadError> {
        let destination = self.object_path(&target.key);
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|err| UploadError::io(parent, err))?;
        }
        let mut reader = File::open(source).map_err(|err| UploadError::io(source, err))?;
        let total = reader
            .metadata()
            .map_err(|err| UploadError::io(source, err))?
            .len();
        let mut writer =
            File::create(&destination).map_err(|err| UploadError::io(&destination, err))?;

        let mut buffer = vec![0_u8; self.chunk_size];
        let mut written: u64 = 0;
        progress(0.0);
        loop {
            let read = reader
                .read(&mut buffer)
                .map_err(|err| UploadError::io(source, err))?;
            if read == 0 {
                break;
            }
            writer
                .write_all(&buffer[..read])
                .map_err(|err| UploadError::io(&destination, err))?;
            written += read as u64;
            if total > 0 {
                progress((written as f64 / total as f64 * 100.0).min(100.0));
            }
        }
        writer
            .flush()
            .map_err(|err| UploadError::io(&destination, err))?;
        progress(100.0);
        debug!(key = %target.key, bytes = written, "object stored");
        Ok(())
    }

    fn preview_url(&self, storage_key: &str) -> Result<String, UploadError> {
        let path = self.object_path(storage_key);
        url::Url::from_file_path(&path)
            .map(|url| url.to_string())
            .map_err(|()| UploadError::Preview(storage_key.to_string()))
    }
}

fn storage_name(file_name: &str) -> Option<String> {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn upload_copies_in_chunks_with_rising_progress() {
        let dir = tempdir().expect("tmpdir");
        let source = dir.path().join("notes.txt");
        std::fs::write(&source, vec![b'x'; 10]).expect("write");
        let store = LocalStoreUploader::new(dir.path().join("store"), 4);

        let mut seen = Vec::new();
        let uploaded = store
            .upload("notes.txt", &source, &mut |pct| seen.push(pct))
            .expect("upload");

        assert!(uploaded.storage_key.starts_with("chat/"));
        assert!(uploaded.storage_key.ends_with("/notes.txt"));
        assert!(uploaded.preview_url.starts_with("file://"));
        let stored = std::fs::read(store.root().join(&uploaded.storage_key)).expect("stored");
        assert_eq!(stored.len(), 10);
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&100.0));
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let dir = tempdir().expect("tmpdir");
        let store = LocalStoreUploader::new(dir.path(), 1024);
        let err = store
            .upload("gone.txt", &dir.path().join("gone.txt"), &mut |_| {})
            .expect_err("missing");
        assert!(matches!(err, UploadError::Io { .. }));
    }

    #[test]
    fn presign_strips_directories_from_names() {
        let store = LocalStoreUploader::new("/tmp/store", 16);
        let post = store.presign("../../etc/passwd").expect("presign");
        assert!(post.key.ends_with("/passwd"));
        assert!(!post.key.contains(".."));
        assert_eq!(post.fields.get("key"), Some(&post.key));
        assert!(store.presign("dir/").is_err());
    }
}
