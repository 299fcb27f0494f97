// Media I/O through ffmpeg/ffprobe child processes
//
// - Commands: command builders for probing, decoding and encoding
// - Probe: stream property parsing
// - Frames: raw rgb24 frame streams over child process pipes
// - Processor: ffmpeg-based implementation of the processor trait

pub mod commands;
pub mod frames;
pub mod probe;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use frames::{FrameReader, FrameWriter};
pub use probe::{parse_fps_fraction, parse_probe_output, VideoProperties};
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;

/// Main trait for media processing operations
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Read stream properties of a video file
    async fn probe(&self, video_path: &Path) -> Result<VideoProperties>;

    /// Start decoding `video_path` into raw frames, optionally only the first `limit_seconds`
    async fn open_reader(
        &self,
        video_path: &Path,
        properties: &VideoProperties,
        limit_seconds: Option<f64>,
    ) -> Result<FrameReader>;

    /// Start an encoder writing `output_path`, carrying the audio of `audio_source` if given
    async fn open_writer(
        &self,
        output_path: &Path,
        properties: &VideoProperties,
        audio_source: Option<&Path>,
    ) -> Result<FrameWriter>;

    /// Check that ffmpeg and ffprobe can be executed
    fn check_availability(&self) -> Result<()>;

    /// First line of `ffmpeg -version` and `ffprobe -version`
    async fn get_version_info(&self) -> Result<String>;
}

/// Factory for creating media processor instances
pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config))
    }
}
