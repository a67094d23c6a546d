//! Files attached to the composer, from selection through upload to the
//! list that is finally sent with a prompt.

use std::path::Path;
use std::path::PathBuf;

use chatbox_core::ChatFile;
use chatbox_core::ChatFileKind;
use chatbox_core::Notification;
use chatbox_core::NotifyLevel;
use chatbox_core::UploadConfig;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing::warn;

use crate::accept::is_image_name;
use crate::contracts::UploadError;
use crate::uploader::FileUploader;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStatus {
    Queued,
    Uploading,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum FileSource {
    Local(PathBuf),
    Url(String),
}

/// A file picked from disk, before it joins the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

impl SelectedFile {
    pub fn from_path(path: &Path) -> Result<Self, UploadError> {
        let metadata = std::fs::metadata(path).map_err(|err| UploadError::io(path, err))?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            path: path.to_path_buf(),
            size: metadata.len(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFile {
    pub id: String,
    pub name: String,
    pub kind: ChatFileKind,
    pub source: FileSource,
    pub size: u64,
    pub status: UploadStatus,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadFile {
    fn local(file: SelectedFile) -> Self {
        Self {
            id: file_id(),
            kind: kind_for(&file.name),
            name: file.name,
            source: FileSource::Local(file.path),
            size: file.size,
            status: UploadStatus::Queued,
            progress: 0.0,
            preview_url: None,
            storage_key: None,
            error: None,
        }
    }

    /// Clamped to `[0, 100]`; never moves backwards.
    pub fn set_progress(&mut self, percent: f64) {
        if percent.is_nan() {
            return;
        }
        self.progress = self.progress.max(percent.clamp(0.0, 100.0));
    }

    pub fn to_chat_file(&self) -> Option<ChatFile> {
        if self.status != UploadStatus::Done {
            return None;
        }
        Some(ChatFile {
            kind: self.kind,
            name: self.name.clone(),
            url: self.preview_url.clone()?,
            key: self.storage_key.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_files: usize,
    pub max_size_bytes: u64,
}

impl UploadLimits {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            max_files: config.max_files,
            max_size_bytes: config.max_size_bytes(),
        }
    }
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self::from_config(&UploadConfig::default())
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadController {
    files: Vec<UploadFile>,
    limits: UploadLimits,
    notifications: Vec<Notification>,
}

impl UploadController {
    pub fn new(limits: UploadLimits) -> Self {
        Self {
            files: Vec::new(),
            limits,
            notifications: Vec::new(),
        }
    }

    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    pub fn remaining(&self) -> usize {
        self.limits.max_files.saturating_sub(self.files.len())
    }

    pub fn is_uploading(&self) -> bool {
        self.files
            .iter()
            .any(|file| file.status == UploadStatus::Uploading)
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Queues picked files ahead of the ones already attached. Returns how
    /// many were accepted.
    pub fn select_files(&mut self, mut selected: Vec<SelectedFile>) -> usize {
        let remaining = self.remaining();
        if selected.len() > remaining {
            warn!(selected = selected.len(), remaining, "file limit reached, truncating selection");
            self.notify(
                NotifyLevel::Warning,
                format!("at most {} files can be attached", self.limits.max_files),
            );
            selected.truncate(remaining);
        }

        let max_size = self.limits.max_size_bytes;
        let (fits, too_large): (Vec<_>, Vec<_>) =
            selected.into_iter().partition(|file| file.size <= max_size);
        if !too_large.is_empty() {
            let names: Vec<&str> = too_large.iter().map(|file| file.name.as_str()).collect();
            warn!(files = ?names, max_size, "files over the size limit dropped");
            self.notify(
                NotifyLevel::Warning,
                format!("over the size limit: {}", names.join(", ")),
            );
        }

        let accepted = fits.len();
        let mut next: Vec<UploadFile> = fits.into_iter().map(UploadFile::local).collect();
        next.append(&mut self.files);
        self.files = next;
        accepted
    }

    /// Attaches a remote file by URL; no upload is needed.
    pub fn add_url(&mut self, raw: &str) -> Result<(), UploadError> {
        if self.remaining() == 0 {
            return Err(UploadError::TooManyFiles(self.limits.max_files));
        }
        let parsed = url::Url::parse(raw.trim()).map_err(|err| UploadError::InvalidUrl {
            url: raw.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(UploadError::InvalidUrl {
                url: raw.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        let name = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| parsed.as_str().to_string());

        self.files.insert(
            0,
            UploadFile {
                id: file_id(),
                kind: kind_for(&name),
                name,
                source: FileSource::Url(parsed.to_string()),
                size: 0,
                status: UploadStatus::Done,
                progress: 100.0,
                preview_url: Some(parsed.to_string()),
                storage_key: None,
                error: None,
            },
        );
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<UploadFile> {
        let index = self.files.iter().position(|file| file.id == id)?;
        Some(self.files.remove(index))
    }

    /// Uploads every queued local file. A failure is recorded on its file
    /// and the rest of the batch carries on. Returns the number uploaded.
    pub fn upload_pending(&mut self, uploader: &dyn FileUploader) -> usize {
        let mut uploaded = 0;
        let mut failures = Vec::new();
        for file in self
            .files
            .iter_mut()
            .filter(|file| file.status == UploadStatus::Queued)
        {
            let FileSource::Local(path) = file.source.clone() else {
                continue;
            };
            file.status = UploadStatus::Uploading;
            file.progress = 0.0;
            let name = file.name.clone();

            let result = uploader.upload(&name, &path, &mut |pct| file.set_progress(pct));
            match result {
                Ok(done) => {
                    file.status = UploadStatus::Done;
                    file.set_progress(100.0);
                    file.preview_url = Some(done.preview_url);
                    file.storage_key = Some(done.storage_key);
                    uploaded += 1;
                }
                Err(err) => {
                    warn!(file = %name, error = %err, "upload failed");
                    file.status = UploadStatus::Error;
                    file.error = Some(err.to_string());
                    failures.push(format!("{name}: {err}"));
                }
            }
        }
        for failure in failures {
            self.notify(NotifyLevel::Error, failure);
        }
        info!(uploaded, "upload batch finished");
        uploaded
    }

    /// Files that go out with the prompt; failed and unfinished ones are left
    /// behind.
    pub fn submit_files(&self) -> Vec<ChatFile> {
        self.files
            .iter()
            .filter_map(UploadFile::to_chat_file)
            .collect()
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    fn notify(&mut self, level: NotifyLevel, message: String) {
        self.notifications.push(Notification::new(level, message));
    }
}

fn kind_for(name: &str) -> ChatFileKind {
    if is_image_name(name) {
        ChatFileKind::Image
    } else {
        ChatFileKind::File
    }
}

fn file_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::contracts::PresignedPost;
    use crate::uploader::LocalStoreUploader;
    use crate::uploader::Progress;

    fn picked(name: &str, size: u64) -> SelectedFile {
        SelectedFile {
            name: name.to_string(),
            path: PathBuf::from(format!("/nowhere/{name}")),
            size,
        }
    }

    /// Fails presign for names containing "bad"; reports a few progress
    /// steps including out-of-range ones for the rest.
    struct ScriptedUploader;

    impl FileUploader for ScriptedUploader {
        fn presign(&self, file_name: &str) -> Result<PresignedPost, UploadError> {
            if file_name.contains("bad") {
                return Err(UploadError::Presign {
                    name: file_name.to_string(),
                    reason: "denied".to_string(),
                });
            }
            Ok(PresignedPost {
                url: "memory://".to_string(),
                key: format!("k/{file_name}"),
                fields: Default::default(),
            })
        }

        fn post(
            &self,
            _target: &PresignedPost,
            _source: &Path,
            progress: Progress<'_>,
        ) -> Result<(), UploadError> {
            for pct in [-5.0, 40.0, 20.0, 180.0] {
                progress(pct);
            }
            Ok(())
        }

        fn preview_url(&self, storage_key: &str) -> Result<String, UploadError> {
            Ok(format!("memory://{storage_key}"))
        }
    }

    #[test]
    fn selection_is_truncated_to_remaining_capacity() {
        let mut controller = UploadController::new(UploadLimits {
            max_files: 2,
            max_size_bytes: 100,
        });

        let accepted = controller.select_files(vec![picked("a.txt", 1), picked("b.txt", 1), picked("c.txt", 1)]);

        assert_eq!(accepted, 2);
        assert_eq!(controller.remaining(), 0);
        let notes = controller.take_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].level, NotifyLevel::Warning);
    }

    #[test]
    fn oversized_files_are_dropped_with_warning() {
        let mut controller = UploadController::new(UploadLimits {
            max_files: 10,
            max_size_bytes: 100,
        });

        let accepted = controller.select_files(vec![picked("big.pdf", 101), picked("ok.pdf", 100)]);

        assert_eq!(accepted, 1);
        assert_eq!(controller.files()[0].name, "ok.pdf");
        assert!(controller.take_notifications()[0].message.contains("big.pdf"));
    }

    #[test]
    fn new_selections_go_first_and_images_are_detected() {
        let mut controller = UploadController::default();
        controller.select_files(vec![picked("old.txt", 1)]);
        controller.select_files(vec![picked("new.png", 1)]);

        let names: Vec<&str> = controller.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["new.png", "old.txt"]);
        assert_eq!(controller.files()[0].kind, ChatFileKind::Image);
        assert_eq!(controller.files()[1].kind, ChatFileKind::File);
    }

    #[test]
    fn failed_upload_is_excluded_but_batch_continues() {
        let mut controller = UploadController::default();
        controller.select_files(vec![picked("good.txt", 1), picked("bad.txt", 1)]);

        let uploaded = controller.upload_pending(&ScriptedUploader);

        assert_eq!(uploaded, 1);
        let bad = controller.files().iter().find(|f| f.name == "bad.txt").expect("bad");
        assert_eq!(bad.status, UploadStatus::Error);
        assert!(bad.error.as_deref().is_some_and(|e| e.contains("denied")));
        let sent = controller.submit_files();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].name, "good.txt");
        assert_eq!(sent[0].url, "memory://k/good.txt");
        assert_eq!(controller.take_notifications()[0].level, NotifyLevel::Error);
    }

    #[test]
    fn progress_is_clamped_and_monotonic() {
        let mut file = UploadFile::local(picked("a.txt", 1));
        file.set_progress(-5.0);
        assert_eq!(file.progress, 0.0);
        file.set_progress(40.0);
        file.set_progress(20.0);
        assert_eq!(file.progress, 40.0);
        file.set_progress(180.0);
        assert_eq!(file.progress, 100.0);
    }

    #[test]
    fn urls_are_validated_and_attached_as_done() {
        let mut controller = UploadController::default();
        assert!(matches!(
            controller.add_url("not a url"),
            Err(UploadError::InvalidUrl { .. })
        ));
        assert!(controller.add_url("ftp://host/file.txt").is_err());

        controller.add_url("https://cdn.test/img/cat.jpg").expect("url");

        let file = &controller.files()[0];
        assert_eq!(file.name, "cat.jpg");
        assert_eq!(file.kind, ChatFileKind::Image);
        assert_eq!(controller.submit_files()[0].url, "https://cdn.test/img/cat.jpg");
    }

    #[test]
    fn local_store_upload_end_to_end() {
        let dir = tempdir().expect("tmpdir");
        let source = dir.path().join("doc.md");
        std::fs::write(&source, "# hi").expect("write");
        let mut controller = UploadController::default();
        controller.select_files(vec![SelectedFile::from_path(&source).expect("selected")]);

        let uploaded = controller.upload_pending(&LocalStoreUploader::new(dir.path().join("store"), 2));

        assert_eq!(uploaded, 1);
        let file = &controller.files()[0];
        assert_eq!(file.status, UploadStatus::Done);
        assert_eq!(file.progress, 100.0);
        assert!(file.storage_key.is_some());
    }
}
