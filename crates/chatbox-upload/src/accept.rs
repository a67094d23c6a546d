use std::collections::BTreeSet;

use chatbox_core::UploadConfig;
use regex::Regex;

use crate::contracts::UploadError;

pub const DOCUMENT_EXTENSIONS: &[&str] = &[
    ".txt", ".docx", ".csv", ".xlsx", ".pdf", ".md", ".html", ".pptx",
];
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg",
];
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mov", ".avi", ".mpeg", ".webm"];
pub const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".m4a", ".amr", ".mpga"];

/// Which file names a picker or drop target accepts.
#[derive(Debug, Clone)]
pub struct AcceptFilter {
    extensions: Vec<String>,
    pattern: Option<Regex>,
}

impl AcceptFilter {
    pub fn from_config(config: &UploadConfig) -> Result<Self, UploadError> {
        let mut extensions: Vec<String> = Vec::new();
        let groups = [
            (config.can_select_file, DOCUMENT_EXTENSIONS),
            (config.can_select_img, IMAGE_EXTENSIONS),
            (config.can_select_video, VIDEO_EXTENSIONS),
            (config.can_select_audio, AUDIO_EXTENSIONS),
        ];
        for (enabled, group) in groups {
            if enabled {
                extensions.extend(group.iter().map(|ext| ext.to_string()));
            }
        }
        if config.can_select_custom_file_extension {
            extensions.extend(
                config
                    .custom_file_extension_list
                    .iter()
                    .map(String::as_str)
                    .filter_map(normalize_extension),
            );
        }
        let mut seen = BTreeSet::new();
        extensions.retain(|ext| seen.insert(ext.clone()));
        Self::from_extensions(extensions)
    }

    pub fn from_extensions(extensions: Vec<String>) -> Result<Self, UploadError> {
        if extensions.is_empty() {
            return Ok(Self {
                extensions,
                pattern: None,
            });
        }
        let alternatives = extensions
            .iter()
            .map(|ext| regex::escape(ext))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!("(?i)(?:{alternatives})$"))?;
        Ok(Self {
            extensions,
            pattern: Some(pattern),
        })
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Comma-separated list in the form file pickers expect.
    pub fn accept_attr(&self) -> String {
        self.extensions.join(",")
    }

    pub fn accepts(&self, file_name: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|pattern| pattern.is_match(file_name))
    }
}

pub fn is_image_name(file_name: &str) -> bool {
    let lower = file_name.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_ascii_lowercase();
    if trimmed.is_empty() || trimmed == "." {
        return None;
    }
    if trimmed.starts_with('.') {
        Some(trimmed)
    } else {
        Some(format!(".{trimmed}"))
    }
}
