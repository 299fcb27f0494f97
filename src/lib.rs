//! furigana-burner - burn Japanese subtitles with furigana onto video
//!
//! Readings come from kakasi or a character dictionary, ruby text is
//! rasterized with ab_glyph and frames are streamed through ffmpeg.

pub mod burner;
pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod furigana;
pub mod media;
pub mod render;
pub mod setup;
pub mod subtitle;
pub mod workflow;
