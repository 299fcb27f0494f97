use async_trait::async_trait;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

use crate::config::MediaConfig;
use crate::error::{BurnerError, Result};
use super::{parse_probe_output, FrameReader, FrameWriter, MediaCommandBuilder, MediaProcessorTrait, VideoProperties};

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
}

impl MediaProcessorImpl {
    pub fn new(config: MediaConfig) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.ffmpeg_path, &config.ffprobe_path);

        Self {
            config,
            command_builder,
        }
    }

    fn check_binary(binary: &str) -> Result<()> {
        let output = Command::new(binary)
            .arg("-version")
            .output()
            .map_err(|e| BurnerError::Media(format!("{} not found: {}", binary, e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(BurnerError::Media(format!("{} version check failed", binary)))
        }
    }
}

fn first_line(output: &str) -> String {
    output.lines().next().unwrap_or("Unknown version").trim().to_string()
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn probe(&self, video_path: &Path) -> Result<VideoProperties> {
        if !video_path.exists() {
            return Err(BurnerError::FileNotFound(video_path.display().to_string()));
        }

        let output = self.command_builder.probe(video_path).execute().await?;
        let properties = parse_probe_output(&output)?;

        info!(
            "Video: {}x{} @ {:.3} fps, {} frames, {:.2}s, audio: {}",
            properties.width,
            properties.height,
            properties.fps(),
            properties.frame_count,
            properties.duration,
            properties.has_audio
        );
        Ok(properties)
    }

    async fn open_reader(
        &self,
        video_path: &Path,
        properties: &VideoProperties,
        limit_seconds: Option<f64>,
    ) -> Result<FrameReader> {
        debug!("Opening frame reader for {}", video_path.display());
        let command = self.command_builder.decode_frames(video_path, limit_seconds);
        FrameReader::spawn(&command, properties.frame_size())
    }

    async fn open_writer(
        &self,
        output_path: &Path,
        properties: &VideoProperties,
        audio_source: Option<&Path>,
    ) -> Result<FrameWriter> {
        debug!("Opening frame writer for {}", output_path.display());
        let command = self
            .command_builder
            .encode_frames(properties, output_path, audio_source, &self.config);
        FrameWriter::spawn(&command, properties.frame_size())
    }

    fn check_availability(&self) -> Result<()> {
        Self::check_binary(&self.config.ffmpeg_path)?;
        Self::check_binary(&self.config.ffprobe_path)?;
        info!("Media processor is available");
        Ok(())
    }

    async fn get_version_info(&self) -> Result<String> {
        debug!("Getting media processor version information");

        let ffmpeg = self.command_builder.ffmpeg_version().execute().await?;
        let ffprobe = self.command_builder.ffprobe_version().execute().await?;
        Ok(format!("{}\n{}", first_line(&ffmpeg), first_line(&ffprobe)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("ffmpeg version 6.1 Copyright\nbuilt with gcc"), "ffmpeg version 6.1 Copyright");
        assert_eq!(first_line(""), "Unknown version");
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let processor = MediaProcessorImpl::new(MediaConfig::default());
        let result = processor.probe(Path::new("/nonexistent/video.mp4")).await;
        assert!(matches!(result, Err(BurnerError::FileNotFound(_))));
    }

    #[test]
    fn test_unavailable_binaries() {
        let config = MediaConfig {
            ffmpeg_path: "/nonexistent/ffmpeg".to_string(),
            ..MediaConfig::default()
        };
        let processor = MediaProcessorImpl::new(config);
        assert!(matches!(processor.check_availability(), Err(BurnerError::Media(_))));
    }
}
