use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::color::Rgb;
use crate::error::{BurnerError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub style: StyleConfig,
    pub layout: LayoutConfig,
    pub furigana: FuriganaConfig,
    pub subtitle: SubtitleConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    /// Font size of the main subtitle text (pixels)
    pub main_font_size: u32,
    /// Font size of the furigana row (pixels)
    pub furigana_font_size: u32,
    pub text_color: Rgb,
    pub stroke_color: Rgb,
    /// Outline radius in pixels, 0 disables the outline
    pub stroke_width: u32,
    /// Gap between furigana and main text, as a fraction of the furigana font size
    pub furigana_spacing: f32,
    /// Font file to use instead of the built-in search list
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Top,
    Bottom,
    Center,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub position: Position,
    /// Distance from the top/bottom frame edge (pixels)
    pub margin: u32,
    /// Maximum subtitle width relative to the frame width
    pub max_width_ratio: f32,
    /// Maximum subtitle height relative to the frame height
    pub max_height_ratio: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerBackend {
    /// Dictionary-based kanji to hiragana conversion
    Kakasi,
    /// Built-in character table plus user dictionary
    Dictionary,
    /// No readings, text is rendered as-is
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FuriganaConfig {
    pub backend: AnalyzerBackend,
    /// Remove okurigana from readings so furigana sits only above kanji
    pub strip_kana: bool,
    /// Add romaji above kana-only words
    pub kana_romaji: bool,
    /// Word readings that take priority over the backend
    pub dictionary: BTreeMap<String, String>,
    /// TOML or JSON file with additional `word = "reading"` entries
    pub dictionary_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    /// JSON key holding the plain subtitle text
    pub text_key: String,
    /// JSON key holding `<漢字>[かんじ]` ruby markup
    pub ruby_key: Option<String>,
    /// JSON key holding pre-tokenized words
    pub tokens_key: String,
    /// JSON key holding `[text, ruby]` pairs
    pub pairs_key: String,
    /// Token type to color mapping for JSON tokens.
    ///
    /// Entries may be `"#hex"` or `{ color = "#hex" }`, either directly or
    /// under a `types` table; `types` entries win.
    #[serde(deserialize_with = "deserialize_palette")]
    pub palette: BTreeMap<String, Rgb>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PaletteEntry {
    Color(Rgb),
    Styled { color: Rgb },
    Group(BTreeMap<String, PaletteEntry>),
}

impl PaletteEntry {
    fn color(&self) -> Option<Rgb> {
        match self {
            PaletteEntry::Color(color) | PaletteEntry::Styled { color } => Some(*color),
            PaletteEntry::Group(_) => None,
        }
    }
}

fn deserialize_palette<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, Rgb>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = BTreeMap::<String, PaletteEntry>::deserialize(deserializer)?;
    let mut palette = BTreeMap::new();
    let mut typed = BTreeMap::new();

    for (key, entry) in raw {
        match entry {
            PaletteEntry::Group(group) if key == "types" => {
                typed.extend(group.into_iter().filter_map(|(kind, e)| e.color().map(|c| (kind, c))));
            }
            entry => {
                if let Some(color) = entry.color() {
                    palette.insert(key, color);
                }
            }
        }
    }

    palette.extend(typed);
    Ok(palette)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    pub video_codec: String,
    pub pixel_format: String,
    pub audio_codec: String,
    /// Additional encoding options passed to the encoder
    /// Common options: ["-preset", "medium", "-crf", "23"]
    pub encoder_options: Vec<String>,
    /// Copy the audio track of the source video into the output
    pub preserve_audio: bool,
    /// Length of the clip rendered in preview mode (seconds)
    pub preview_seconds: f64,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            main_font_size: 48,
            furigana_font_size: 24,
            text_color: Rgb::WHITE,
            stroke_color: Rgb::BLACK,
            stroke_width: 2,
            furigana_spacing: 0.3,
            font_path: None,
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            position: Position::Bottom,
            margin: 50,
            max_width_ratio: 0.9,
            max_height_ratio: 0.35,
        }
    }
}

impl Default for FuriganaConfig {
    fn default() -> Self {
        Self {
            backend: AnalyzerBackend::Kakasi,
            strip_kana: true,
            kana_romaji: false,
            dictionary: BTreeMap::new(),
            dictionary_file: None,
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            text_key: "text".to_string(),
            ruby_key: None,
            tokens_key: "tokens".to_string(),
            pairs_key: "furigana_pairs".to_string(),
            palette: BTreeMap::new(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            video_codec: "libx264".to_string(),
            pixel_format: "yuv420p".to_string(),
            audio_codec: "aac".to_string(),
            encoder_options: vec![
                // "-preset".to_string(), "medium".to_string(),  // Encoding speed
                // "-crf".to_string(), "23".to_string(),         // Quality (0-51, lower = better quality)
            ],
            preserve_audio: true,
            preview_seconds: 10.0,
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| BurnerError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| BurnerError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| BurnerError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| BurnerError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.style.main_font_size == 0 || self.style.furigana_font_size == 0 {
            return Err(BurnerError::Config("Font sizes must be greater than zero".to_string()));
        }
        for (name, ratio) in [
            ("max_width_ratio", self.layout.max_width_ratio),
            ("max_height_ratio", self.layout.max_height_ratio),
        ] {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(BurnerError::Config(format!(
                    "layout.{} must be in (0, 1], got {}",
                    name, ratio
                )));
            }
        }
        if self.media.preview_seconds <= 0.0 {
            return Err(BurnerError::Config("media.preview_seconds must be positive".to_string()));
        }
        Ok(())
    }
}
