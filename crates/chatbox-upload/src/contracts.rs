use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

/// Server-issued target for one direct-to-storage upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresignedPost {
    pub url: String,
    pub key: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub preview_url: String,
    pub storage_key: String,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("presign {name}: {reason}")]
    Presign { name: String, reason: String },
    #[error("io error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no preview url for {0}")]
    Preview(String),
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("file limit of {0} reached")]
    TooManyFiles(usize),
    #[error("unsupported drop: {0}")]
    UnsupportedDrop(String),
    #[error("invalid accept pattern: {0}")]
    Accept(#[from] regex::Error),
}

impl UploadError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
