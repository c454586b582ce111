//! Client-side checks run on an input before anything is uploaded.
//!
//! File checks look at metadata only (size, filename extension, content type),
//! never at the bytes. Extension and content type must both pass.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

/// Limits an audio file has to satisfy before it may be submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationRules {
    pub max_size_bytes: u64,
    pub accepted_content_types: Vec<String>,
    /// Filename extensions, with or without the leading dot.
    pub accepted_extensions: Vec<String>,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            max_size_bytes: 50 * MIB,
            accepted_content_types: vec![
                "audio/mpeg".to_string(),
                "audio/wav".to_string(),
                "audio/m4a".to_string(),
                "audio/x-m4a".to_string(),
                "audio/ogg".to_string(),
            ],
            accepted_extensions: vec![
                ".mp3".to_string(),
                ".wav".to_string(),
                ".m4a".to_string(),
                ".ogg".to_string(),
            ],
        }
    }
}

impl ValidationRules {
    fn accepts_extension(&self, extension: &str) -> bool {
        self.accepted_extensions
            .iter()
            .any(|accepted| normalize_extension(accepted) == extension)
    }

    fn accepts_content_type(&self, content_type: &str) -> bool {
        let wanted = essence(content_type);
        self.accepted_content_types
            .iter()
            .any(|accepted| essence(accepted) == wanted)
    }

    fn extension_list(&self) -> String {
        self.accepted_extensions
            .iter()
            .map(|e| format!(".{}", normalize_extension(e)))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(
        "File is too large ({}). Maximum size is {}.",
        megabytes(.size),
        megabytes(.max)
    )]
    FileTooLarge { size: u64, max: u64 },

    #[error("Unsupported file extension '{extension}'. Supported extensions: {accepted}")]
    UnsupportedExtension { extension: String, accepted: String },

    #[error("Unsupported file type '{content_type}'. Supported types: {accepted}")]
    UnsupportedContentType {
        content_type: String,
        accepted: String,
    },

    #[error("Invalid URL '{url}'. Expected an http or https address.")]
    InvalidUrl { url: String },
}

/// Metadata of an audio file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub content_type: String,
}

impl AudioFile {
    /// Read size and name from disk and guess the content type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("File not found: {}", path.display()))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio")
            .to_string();

        let content_type = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_type_for_extension)
            .unwrap_or("application/octet-stream")
            .to_string();

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            size: metadata.len(),
            content_type,
        })
    }

    /// Replace the guessed content type with one reported by the caller.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Lowercased extension without the dot, empty when the name has none.
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default()
    }
}

/// Check `file` against `rules`: size first, then extension, then content type.
pub fn validate(file: &AudioFile, rules: &ValidationRules) -> Result<(), ValidationError> {
    if file.size > rules.max_size_bytes {
        return Err(ValidationError::FileTooLarge {
            size: file.size,
            max: rules.max_size_bytes,
        });
    }

    let extension = file.extension();
    if !rules.accepts_extension(&extension) {
        return Err(ValidationError::UnsupportedExtension {
            extension: format!(".{extension}"),
            accepted: rules.extension_list(),
        });
    }

    if !rules.accepts_content_type(&file.content_type) {
        return Err(ValidationError::UnsupportedContentType {
            content_type: file.content_type.clone(),
            accepted: rules.accepted_content_types.join(", "),
        });
    }

    Ok(())
}

/// Check that a media URL is a usable http(s) address.
pub fn validate_url(url: &str) -> Result<(), ValidationError> {
    let invalid = || ValidationError::InvalidUrl {
        url: url.to_string(),
    };

    let parsed = reqwest::Url::parse(url.trim()).map_err(|_| invalid())?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(()),
        _ => Err(invalid()),
    }
}

/// MIME type commonly reported for an audio filename extension.
pub fn mime_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_lowercase().as_str() {
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        "m4a" => Some("audio/x-m4a"),
        "ogg" => Some("audio/ogg"),
        "flac" => Some("audio/flac"),
        "opus" => Some("audio/opus"),
        "aac" => Some("audio/aac"),
        "webm" => Some("audio/webm"),
        _ => None,
    }
}

fn megabytes(bytes: &u64) -> String {
    format!("{:.1} MB", *bytes as f64 / MIB as f64)
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}
