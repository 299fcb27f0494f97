use image::RgbaImage;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::{LayoutConfig, Position};
use crate::error::{BurnerError, Result};
use crate::media::{MediaProcessorTrait, VideoProperties};
use crate::render::{auto_split_segments, FitOptions, SubtitleRenderer};
use crate::subtitle::SubtitleSegment;

/// Frame region subtitles are placed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub position: Position,
}

impl Slot {
    pub fn for_position(
        frame_width: u32,
        frame_height: u32,
        position: Position,
        margin: u32,
        width_ratio: f32,
        height_ratio: f32,
    ) -> Self {
        let width = ((frame_width as f32 * width_ratio).round() as u32).clamp(1, frame_width.max(1));
        let height = ((frame_height as f32 * height_ratio).round() as u32).clamp(1, frame_height.max(1));
        let x = (frame_width - width) / 2;
        let max_y = frame_height - height;

        let y = match position {
            Position::Top => margin.min(max_y),
            Position::Bottom => max_y.saturating_sub(margin),
            Position::Center => max_y / 2,
        };

        Self {
            x,
            y,
            width,
            height,
            position,
        }
    }

    pub fn from_layout(properties: &VideoProperties, layout: &LayoutConfig) -> Self {
        Self::for_position(
            properties.width,
            properties.height,
            layout.position,
            layout.margin,
            layout.max_width_ratio,
            layout.max_height_ratio,
        )
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            slot_width: self.width as f32,
            slot_height: self.height as f32,
        }
    }

    /// Top-left corner for an image of the given size, kept inside the frame
    pub fn place(&self, image_width: u32, image_height: u32, frame_width: u32, frame_height: u32) -> (u32, u32) {
        let x = self.x + self.width.saturating_sub(image_width) / 2;
        let spare = self.height.saturating_sub(image_height);
        let y = match self.position {
            Position::Top => self.y,
            Position::Bottom => self.y + spare,
            Position::Center => self.y + spare / 2,
        };

        (
            x.min(frame_width.saturating_sub(image_width)),
            y.min(frame_height.saturating_sub(image_height)),
        )
    }
}

/// Time-ordered segments with a forward-only lookup cursor
pub struct SubtitleTrack {
    segments: Vec<SubtitleSegment>,
    cursor: usize,
    cache: Option<(usize, RgbaImage)>,
    rendered: usize,
}

impl SubtitleTrack {
    pub fn new(mut segments: Vec<SubtitleSegment>) -> Self {
        segments.sort_by(|a, b| a.start.total_cmp(&b.start));
        Self {
            segments,
            cursor: 0,
            cache: None,
            rendered: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments rendered so far
    pub fn rendered(&self) -> usize {
        self.rendered
    }

    /// Index of the segment shown at `t`; times must not decrease between calls
    pub fn active_index(&mut self, t: f64) -> Option<usize> {
        while self.cursor < self.segments.len() && self.segments[self.cursor].end < t {
            self.cursor += 1;
        }
        let segment = self.segments.get(self.cursor)?;
        segment.contains(t).then_some(self.cursor)
    }

    pub fn active_segment(&mut self, t: f64) -> Option<&SubtitleSegment> {
        let index = self.active_index(t)?;
        self.segments.get(index)
    }

    /// Image for time `t`, rendering the active segment only when it changes
    pub fn image_at<F>(&mut self, t: f64, render: F) -> Result<Option<&RgbaImage>>
    where
        F: FnOnce(&SubtitleSegment) -> Result<RgbaImage>,
    {
        let Some(index) = self.active_index(t) else {
            return Ok(None);
        };

        if !matches!(&self.cache, Some((cached, _)) if *cached == index) {
            let image = render(&self.segments[index])?;
            self.cache = Some((index, image));
            self.rendered += 1;
        }
        Ok(self.cache.as_ref().map(|(_, image)| image))
    }
}

/// Alpha-blend an RGBA image onto an rgb24 frame at `(x, y)`, clipped to the frame
pub fn overlay(frame: &mut [u8], frame_width: u32, frame_height: u32, image: &RgbaImage, x: u32, y: u32) {
    let (width, height) = image.dimensions();
    let visible_w = width.min(frame_width.saturating_sub(x));
    let visible_h = height.min(frame_height.saturating_sub(y));

    for iy in 0..visible_h {
        let row = ((y + iy) * frame_width) as usize * 3;
        for ix in 0..visible_w {
            let pixel = image.get_pixel(ix, iy);
            let alpha = pixel[3] as u32;
            if alpha == 0 {
                continue;
            }

            let offset = row + (x + ix) as usize * 3;
            let Some(dst) = frame.get_mut(offset..offset + 3) else {
                continue;
            };
            for c in 0..3 {
                let blended = (dst[c] as u32 * (255 - alpha) + pixel[c] as u32 * alpha + 127) / 255;
                dst[c] = blended as u8;
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BurnOptions {
    /// Only process the first seconds of the video
    pub limit_seconds: Option<f64>,
    /// Copy the source audio track into the output
    pub keep_audio: bool,
    pub show_progress: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BurnStats {
    pub frames: u64,
    /// Segments after splitting to the slot width
    pub segments: usize,
    pub rendered: usize,
}

fn progress_bar(total: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} frames ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Composites rendered subtitles onto every frame of a video
pub struct Burner<'a> {
    processor: &'a dyn MediaProcessorTrait,
    renderer: &'a dyn SubtitleRenderer,
    layout: LayoutConfig,
}

impl<'a> Burner<'a> {
    pub fn new(
        processor: &'a dyn MediaProcessorTrait,
        renderer: &'a dyn SubtitleRenderer,
        layout: LayoutConfig,
    ) -> Self {
        Self {
            processor,
            renderer,
            layout,
        }
    }

    pub async fn burn(
        &self,
        video_path: &Path,
        output_path: &Path,
        segments: Vec<SubtitleSegment>,
        options: &BurnOptions,
    ) -> Result<BurnStats> {
        let properties = self.processor.probe(video_path).await?;
        let slot = Slot::from_layout(&properties, &self.layout);
        debug!("Subtitle slot: {:?}", slot);

        let segments = auto_split_segments(
            segments,
            slot.fit_options(),
            self.renderer.style(),
            self.renderer.measurer(),
        );
        let mut track = SubtitleTrack::new(segments);
        if track.is_empty() {
            warn!("No subtitle segments to burn, output will be a re-encoded copy");
        }

        let expected_frames = match options.limit_seconds {
            Some(seconds) => properties.frames_within(seconds),
            None => properties.frame_count,
        };

        let audio_source = (options.keep_audio && properties.has_audio).then_some(video_path);
        let mut reader = self.processor.open_reader(video_path, &properties, options.limit_seconds).await?;
        let mut writer = self.processor.open_writer(output_path, &properties, audio_source).await?;

        info!(
            "Burning {} segments into {} ({} frames)",
            track.len(),
            output_path.display(),
            expected_frames
        );

        let pb = progress_bar(expected_frames, options.show_progress);
        let mut frame = Vec::with_capacity(properties.frame_size());
        let mut index: u64 = 0;
        let mut encoder_closed = false;

        while reader.read_frame(&mut frame).await? {
            let t = properties.frame_time(index);
            let image = track.image_at(t, |segment| {
                self.renderer
                    .render_fitted(&segment.tokens, slot.width, slot.height)
            });

            match image {
                Ok(Some(image)) => {
                    let (x, y) = slot.place(image.width(), image.height(), properties.width, properties.height);
                    overlay(&mut frame, properties.width, properties.height, image, x, y);
                }
                Ok(None) => {}
                Err(BurnerError::Render(e)) => debug!("Skipping subtitle at {:.2}s: {}", t, e),
                Err(e) => return Err(e),
            }

            if !writer.write_frame(&frame).await? {
                encoder_closed = true;
                break;
            }
            index += 1;
            pb.set_position(index);
        }

        if encoder_closed {
            // -shortest ended the output once the audio ran out
            info!("Encoder finished the output after {} frames", index);
            reader.stop().await?;
        } else {
            reader.finish().await?;
        }
        writer.finish().await?;
        pb.finish_and_clear();

        let stats = BurnStats {
            frames: index,
            segments: track.len(),
            rendered: track.rendered(),
        };
        info!(
            "Burned {} frames, rendered {} of {} segments",
            stats.frames, stats.rendered, stats.segments
        );
        Ok(stats)
    }
}
