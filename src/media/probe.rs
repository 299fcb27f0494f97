use serde::Deserialize;

use crate::error::{BurnerError, Result};

/// Properties of the first video stream of a file
#[derive(Debug, Clone, PartialEq)]
pub struct VideoProperties {
    pub width: u32,
    pub height: u32,
    pub fps_num: u32,
    pub fps_den: u32,
    /// Exact when the container reports it, otherwise estimated from the duration
    pub frame_count: u64,
    /// Seconds
    pub duration: f64,
    pub has_audio: bool,
}

impl VideoProperties {
    pub fn fps(&self) -> f64 {
        self.fps_num as f64 / self.fps_den as f64
    }

    /// Bytes of one rgb24 frame
    pub fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    /// Presentation time of frame `index` in seconds
    pub fn frame_time(&self, index: u64) -> f64 {
        index as f64 * self.fps_den as f64 / self.fps_num as f64
    }

    /// Frames within the first `seconds` of the video
    pub fn frames_within(&self, seconds: f64) -> u64 {
        ((seconds * self.fps()).ceil() as u64).min(self.frame_count.max(1))
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse an ffprobe rate such as `30000/1001` or `25`; zero rates are rejected
pub fn parse_fps_fraction(value: &str) -> Option<(u32, u32)> {
    let value = value.trim();
    let (num, den) = match value.split_once('/') {
        Some((num, den)) => (num.trim().parse::<u32>().ok()?, den.trim().parse::<u32>().ok()?),
        None => (value.parse::<u32>().ok()?, 1),
    };
    if num == 0 || den == 0 {
        return None;
    }
    Some((num, den))
}

/// Build [`VideoProperties`] from `ffprobe -of json` output
pub fn parse_probe_output(json: &str) -> Result<VideoProperties> {
    let probe: ProbeOutput = serde_json::from_str(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| BurnerError::Media("No video stream found".to_string()))?;

    let (width, height) = match (video.width, video.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(BurnerError::Media("Video stream has no dimensions".to_string())),
    };

    let (fps_num, fps_den) = [&video.r_frame_rate, &video.avg_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_fps_fraction(rate))
        .ok_or_else(|| BurnerError::Media("Video stream has no usable frame rate".to_string()))?;

    let duration = video
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .or_else(|| {
            probe
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(|d| d.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    let frame_count = video
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (duration * fps_num as f64 / fps_den as f64).round() as u64);

    let has_audio = probe.streams.iter().any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoProperties {
        width,
        height,
        fps_num,
        fps_den,
        frame_count,
        duration,
        has_audio,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fps_fraction() {
        assert_eq!(parse_fps_fraction("30000/1001"), Some((30000, 1001)));
        assert_eq!(parse_fps_fraction("25"), Some((25, 1)));
        assert_eq!(parse_fps_fraction("0/0"), None);
        assert_eq!(parse_fps_fraction("abc"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "streams": [
                {"codec_type": "video", "width": 1920, "height": 1080,
                 "r_frame_rate": "24000/1001", "avg_frame_rate": "24000/1001",
                 "nb_frames": "240", "duration": "10.010000"},
                {"codec_type": "audio", "r_frame_rate": "0/0"}
            ],
            "format": {"duration": "10.050000"}
        }"#;
        let props = parse_probe_output(json).unwrap();

        assert_eq!((props.width, props.height), (1920, 1080));
        assert_eq!((props.fps_num, props.fps_den), (24000, 1001));
        assert_eq!(props.frame_count, 240);
        assert_eq!(props.duration, 10.01);
        assert!(props.has_audio);
        assert_eq!(props.frame_size(), 1920 * 1080 * 3);
    }

    #[test]
    fn test_fallbacks_for_rate_and_frame_count() {
        let json = r#"{
            "streams": [{"codec_type": "video", "width": 640, "height": 360,
                         "r_frame_rate": "0/0", "avg_frame_rate": "25/1"}],
            "format": {"duration": "4.0"}
        }"#;
        let props = parse_probe_output(json).unwrap();

        assert_eq!((props.fps_num, props.fps_den), (25, 1));
        assert_eq!(props.duration, 4.0);
        assert_eq!(props.frame_count, 100);
        assert!(!props.has_audio);
    }

    #[test]
    fn test_missing_video_stream() {
        let json = r#"{"streams": [{"codec_type": "audio"}]}"#;
        assert!(matches!(parse_probe_output(json), Err(BurnerError::Media(_))));
    }

    #[test]
    fn test_frame_time_and_preview_frames() {
        let props = VideoProperties {
            width: 2,
            height: 2,
            fps_num: 30000,
            fps_den: 1001,
            frame_count: 1000,
            duration: 33.4,
            has_audio: false,
        };
        assert_eq!(props.frame_time(0), 0.0);
        assert!((props.frame_time(30) - 1.001).abs() < 1e-9);
        assert_eq!(props.frames_within(1.0), 30);
        assert_eq!(props.frames_within(100.0), 1000);
    }
}
