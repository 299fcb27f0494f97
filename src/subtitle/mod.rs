//! Subtitle model and readers/writers for SRT and JSON transcripts.
//!
//! Both formats are decoded into [`SubtitleSegment`]s. A segment carries
//! its plain text and, when the source already provides them, ruby tokens.
//! Segments without tokens are annotated later by the furigana module.

pub mod json;
pub mod srt;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::color::Rgb;
use crate::config::SubtitleConfig;
use crate::error::{BurnerError, Result};

pub use json::{parse_json, write_json_annotated};
pub use srt::{format_srt_time, parse_srt, write_srt_annotated};

/// A run of text with an optional reading rendered above it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RubyToken {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ruby: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgb>,
}

impl RubyToken {
    pub fn plain<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            ruby: None,
            color: None,
        }
    }

    pub fn with_ruby<S: Into<String>, R: Into<String>>(text: S, ruby: R) -> Self {
        Self {
            text: text.into(),
            ruby: Some(ruby.into()),
            color: None,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    pub text: String,
    pub tokens: Vec<RubyToken>,
    pub lang: Option<String>,
}

impl SubtitleSegment {
    pub fn new<S: Into<String>>(start: f64, end: f64, text: S) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            tokens: Vec::new(),
            lang: None,
        }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// Concatenated surface text of a token list
pub fn tokens_text(tokens: &[RubyToken]) -> String {
    tokens.iter().map(|t| t.text.as_str()).collect()
}

/// `word(reading)` notation used by the annotated SRT writer
pub fn tokens_inline_text(tokens: &[RubyToken]) -> String {
    tokens
        .iter()
        .map(|token| match &token.ruby {
            Some(ruby) => format!("{}({})", token.text, ruby),
            None => token.text.clone(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleFormat {
    Srt,
    Json,
}

impl SubtitleFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "srt" => Some(Self::Srt),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "json" => Ok(Self::Json),
            _ => Err(BurnerError::UnsupportedFormat(format!(
                "Invalid subtitle format '{}'. Valid formats: srt, json",
                value
            ))),
        }
    }
}

/// Decode subtitle bytes, trying UTF-8 first and then the common Japanese legacy encodings
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if let Ok(text) = std::str::from_utf8(bytes) {
        return Ok(text.to_string());
    }

    for encoding in [encoding_rs::SHIFT_JIS, encoding_rs::EUC_JP] {
        let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
        if !had_errors {
            debug!("Decoded subtitle text as {}", encoding.name());
            return Ok(text.into_owned());
        }
    }

    Err(BurnerError::Subtitle(
        "Could not decode subtitle file (tried UTF-8, Shift_JIS, EUC-JP)".to_string(),
    ))
}

/// Load subtitle segments from an SRT or JSON file
pub async fn load_subtitles<P: AsRef<Path>>(path: P, keys: &SubtitleConfig) -> Result<Vec<SubtitleSegment>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BurnerError::FileNotFound(path.display().to_string()));
    }

    let bytes = tokio::fs::read(path).await?;
    let content = decode_text(&bytes)?;

    let trimmed = content.trim_start();
    let format = match SubtitleFormat::from_path(path) {
        Some(format) => format,
        None if trimmed.starts_with('[') || trimmed.starts_with('{') => SubtitleFormat::Json,
        None => SubtitleFormat::Srt,
    };

    let segments = match format {
        SubtitleFormat::Json => parse_json(&content, keys)?,
        SubtitleFormat::Srt => parse_srt(&content),
    };

    info!("Loaded {} subtitle segments from {}", segments.len(), path.display());
    Ok(segments)
}
