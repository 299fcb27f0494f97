use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{AnalyzerBackend, Config, Position};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags that override values from the configuration file
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct BurnOverrides {
    /// Font size of the main text (pixels)
    #[arg(long)]
    pub main_font_size: Option<u32>,

    /// Font size of the furigana (pixels)
    #[arg(long)]
    pub furigana_font_size: Option<u32>,

    /// Vertical position of the subtitles
    #[arg(long, value_enum)]
    pub position: Option<Position>,

    /// Distance from the frame edge (pixels)
    #[arg(long)]
    pub margin: Option<u32>,

    /// Font file to render with
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// Reading backend
    #[arg(long, value_enum)]
    pub backend: Option<AnalyzerBackend>,

    /// JSON key holding the subtitle text
    #[arg(long)]
    pub text_key: Option<String>,

    /// JSON key holding `<漢字>[かんじ]` markup
    #[arg(long)]
    pub ruby_key: Option<String>,

    /// Only render the first seconds of the video (see media.preview_seconds)
    #[arg(long)]
    pub preview: bool,

    /// Do not copy the source audio
    #[arg(long)]
    pub no_audio: bool,
}

impl BurnOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(size) = self.main_font_size {
            config.style.main_font_size = size;
        }
        if let Some(size) = self.furigana_font_size {
            config.style.furigana_font_size = size;
        }
        if let Some(position) = self.position {
            config.layout.position = position;
        }
        if let Some(margin) = self.margin {
            config.layout.margin = margin;
        }
        if let Some(font) = &self.font {
            config.style.font_path = Some(font.clone());
        }
        if let Some(backend) = self.backend {
            config.furigana.backend = backend;
        }
        if let Some(key) = &self.text_key {
            config.subtitle.text_key = key.clone();
        }
        if let Some(key) = &self.ruby_key {
            config.subtitle.ruby_key = Some(key.clone());
        }
        if self.no_audio {
            config.media.preserve_audio = false;
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Burn furigana subtitles into a single video
    Burn {
        /// Input video file
        video: PathBuf,

        /// Subtitle file (.srt or .json)
        subtitles: PathBuf,

        /// Output video file
        output: PathBuf,

        #[command(flatten)]
        overrides: BurnOverrides,
    },

    /// Burn every video in a directory that has a subtitle file
    Batch {
        /// Directory containing videos and subtitles
        input_dir: PathBuf,

        /// Output directory (defaults to each video's directory)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        overrides: BurnOverrides,
    },

    /// Write subtitles with generated readings
    Annotate {
        /// Input subtitle file
        input: PathBuf,

        /// Output subtitle file
        output: PathBuf,

        /// Output format (srt, json); inferred from the output extension when omitted
        #[arg(short, long)]
        format: Option<String>,

        /// Reading backend
        #[arg(long, value_enum)]
        backend: Option<AnalyzerBackend>,
    },

    /// Check ffmpeg, fonts and the reading backend
    Check {
        /// Download Noto Sans JP when no Japanese font is found
        #[arg(long)]
        download_font: bool,
    },

    /// Write the effective configuration as TOML
    Config {
        /// Output file (defaults to furigana.toml)
        #[arg(short, long, default_value = "furigana.toml")]
        output: PathBuf,
    },
}
