use std::path::Path;

use serde::{Deserialize, Serialize};

use super::interactive::PLAN_CONFIRM_QUERY;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub chat: ChatConfig,
    pub upload: UploadConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Prompt sent when the user confirms an agent plan.
    pub plan_confirm_query: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            plan_confirm_query: PLAN_CONFIRM_QUERY.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    pub max_files: usize,
    pub max_size_mib: u64,
    pub chunk_size_kib: u64,
    pub can_select_file: bool,
    pub can_select_img: bool,
    pub can_select_video: bool,
    pub can_select_audio: bool,
    pub can_select_custom_file_extension: bool,
    pub custom_file_extension_list: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_size_mib: 1024,
            chunk_size_kib: 512,
            can_select_file: true,
            can_select_img: true,
            can_select_video: false,
            can_select_audio: false,
            can_select_custom_file_extension: false,
            custom_file_extension_list: Vec::new(),
        }
    }
}

impl UploadConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mib.saturating_mul(1024 * 1024)
    }

    pub fn chunk_size_bytes(&self) -> usize {
        usize::try_from(self.chunk_size_kib.saturating_mul(1024))
            .unwrap_or(usize::MAX)
            .max(1)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Missing file means defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
