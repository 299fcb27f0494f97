use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::burner::{BurnOptions, BurnStats, Burner};
use crate::config::Config;
use crate::error::{BurnerError, Result};
use crate::furigana::FuriganaGenerator;
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::render::{find_font, RubyRenderer, TextStyle};
use crate::subtitle::{
    load_subtitles, write_json_annotated, write_srt_annotated, SubtitleFormat, SubtitleSegment,
};

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "wmv", "flv", "webm"];
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "json"];
pub const OUTPUT_SUFFIX: &str = "_furigana";

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn is_video_file(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

pub fn is_subtitle_file(path: &Path) -> bool {
    has_extension(path, SUBTITLE_EXTENSIONS)
}

/// Subtitle file for `video`: same stem (`.srt` before `.json`), else the only subtitle file next to it
pub fn find_subtitle_for(video: &Path) -> Option<PathBuf> {
    let stem = video.file_stem()?;
    let dir = video.parent().unwrap_or_else(|| Path::new("."));

    for ext in SUBTITLE_EXTENSIONS {
        let candidate = dir.join(format!("{}.{}", stem.to_string_lossy(), ext));
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    let entries = std::fs::read_dir(dir).ok()?;
    let mut subtitles: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_subtitle_file(p))
        .collect();

    if subtitles.len() == 1 {
        subtitles.pop()
    } else {
        None
    }
}

/// `<stem>_furigana.mp4` inside `output_dir`
pub fn output_path_for(video: &Path, output_dir: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{}{}.mp4", stem, OUTPUT_SUFFIX))
}

fn is_burned_output(path: &Path) -> bool {
    path.file_stem()
        .map(|s| s.to_string_lossy().ends_with(OUTPUT_SUFFIX))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Workflow {
    config: Config,
    media: Box<dyn MediaProcessorTrait>,
    generator: FuriganaGenerator,
    font_dirs: Vec<PathBuf>,
    show_progress: bool,
}

impl Workflow {
    pub fn new(config: Config, font_dirs: Vec<PathBuf>) -> Result<Self> {
        config.validate()?;
        let media = MediaProcessorFactory::create_processor(config.media.clone());
        let generator = FuriganaGenerator::from_config(&config.furigana)?;

        Ok(Self {
            config,
            media,
            generator,
            font_dirs,
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn load_renderer(&self) -> Result<RubyRenderer> {
        let face = find_font(self.config.style.font_path.as_deref(), &self.font_dirs)?;
        Ok(RubyRenderer::new(face, TextStyle::from_config(&self.config.style)))
    }

    /// Load subtitles and fill in readings for segments without tokens
    pub async fn load_annotated(&self, subtitle_path: &Path) -> Result<Vec<SubtitleSegment>> {
        let mut segments = load_subtitles(subtitle_path, &self.config.subtitle).await?;
        let annotated = self.generator.annotate_segments(&mut segments);
        info!(
            "Generated readings for {} of {} segments ({})",
            annotated,
            segments.len(),
            self.generator.backend_name()
        );
        Ok(segments)
    }

    fn burn_options(&self, preview: bool) -> BurnOptions {
        BurnOptions {
            limit_seconds: preview.then_some(self.config.media.preview_seconds),
            keep_audio: self.config.media.preserve_audio,
            show_progress: self.show_progress,
        }
    }

    /// Burn furigana subtitles into a single video
    pub async fn burn_file(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        preview: bool,
    ) -> Result<BurnStats> {
        self.media.check_availability()?;
        let renderer = self.load_renderer()?;
        self.burn_with(&renderer, video_path, subtitle_path, output_path, preview).await
    }

    async fn burn_with(
        &self,
        renderer: &RubyRenderer,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        preview: bool,
    ) -> Result<BurnStats> {
        info!(
            "Burning {} + {} -> {}",
            video_path.display(),
            subtitle_path.display(),
            output_path.display()
        );

        if !video_path.exists() {
            return Err(BurnerError::FileNotFound(video_path.display().to_string()));
        }
        if video_path == output_path {
            return Err(BurnerError::Config("Output path must differ from the input video".to_string()));
        }

        let segments = self.load_annotated(subtitle_path).await?;
        if segments.is_empty() {
            warn!("No subtitle segments found in {}", subtitle_path.display());
        }

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let burner = Burner::new(self.media.as_ref(), renderer, self.config.layout.clone());
        burner
            .burn(video_path, output_path, segments, &self.burn_options(preview))
            .await
    }

    /// Burn every video under `input_dir` that has a matching subtitle file
    pub async fn process_directory(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        preview: bool,
    ) -> Result<BatchSummary> {
        info!("Processing directory: {}", input_dir.display());

        if !input_dir.is_dir() {
            return Err(BurnerError::Config("Input path is not a directory".to_string()));
        }

        self.media.check_availability()?;
        let renderer = self.load_renderer()?;

        let mut videos: Vec<PathBuf> = WalkDir::new(input_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .map(|e| e.into_path())
            .filter(|p| p.is_file() && is_video_file(p))
            .collect();
        videos.sort();

        info!("Found {} video files to process", videos.len());
        let mut summary = BatchSummary::default();

        for video in videos {
            if is_burned_output(&video) {
                summary.skipped += 1;
                continue;
            }

            let Some(subtitles) = find_subtitle_for(&video) else {
                warn!("No subtitle file found for {}", video.display());
                summary.skipped += 1;
                continue;
            };

            let target_dir = match output_dir {
                Some(dir) => dir.to_path_buf(),
                None => video.parent().map(Path::to_path_buf).unwrap_or_default(),
            };
            let output = output_path_for(&video, &target_dir);

            match self.burn_with(&renderer, &video, &subtitles, &output, preview).await {
                Ok(stats) => {
                    info!("Successfully processed: {} ({} frames)", video.display(), stats.frames);
                    summary.processed += 1;
                }
                Err(e) => {
                    warn!("Failed to process {}: {}", video.display(), e);
                    summary.failed += 1;
                }
            }
        }

        info!(
            "Batch finished: {} processed, {} skipped, {} failed",
            summary.processed, summary.skipped, summary.failed
        );
        Ok(summary)
    }

    /// Write the subtitles with readings as SRT or JSON
    pub async fn annotate(&self, input: &Path, output: &Path, format: Option<SubtitleFormat>) -> Result<usize> {
        let format = match format.or_else(|| SubtitleFormat::from_path(output)) {
            Some(format) => format,
            None => {
                return Err(BurnerError::UnsupportedFormat(format!(
                    "Cannot infer subtitle format from {}, use --format srt|json",
                    output.display()
                )))
            }
        };

        let segments = self.load_annotated(input).await?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        match format {
            SubtitleFormat::Srt => write_srt_annotated(&segments, output).await?,
            SubtitleFormat::Json => write_json_annotated(&segments, output).await?,
        }
        Ok(segments.len())
    }
}
