use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, info};

use crate::error::Result;
use super::{tokens_inline_text, SubtitleSegment};

static BLOCK_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n").expect("valid block separator pattern"));

static TIMECODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{3})")
        .expect("valid timecode pattern")
});

/// Parse SRT content into subtitle segments sorted by start time.
///
/// Malformed blocks and blocks without text are skipped.
pub fn parse_srt(content: &str) -> Vec<SubtitleSegment> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut segments = Vec::new();

    for block in BLOCK_SEPARATOR.split(normalized.trim()) {
        let lines: Vec<&str> = block.trim().lines().collect();
        if lines.len() < 3 {
            continue;
        }

        let Some(caps) = TIMECODE.captures(lines[1].trim()) else {
            debug!("Skipping SRT block with invalid timecode: {}", lines[1]);
            continue;
        };

        let field = |i: usize| caps[i].parse::<f64>().unwrap_or(0.0);
        let start = field(1) * 3600.0 + field(2) * 60.0 + field(3) + field(4) / 1000.0;
        let end = field(5) * 3600.0 + field(6) * 60.0 + field(7) + field(8) / 1000.0;

        let text = lines[2..]
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            continue;
        }

        segments.push(SubtitleSegment::new(start, end, text));
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    segments
}

/// Write segments as SRT with readings inlined as `word(reading)`
pub async fn write_srt_annotated<P: AsRef<Path>>(segments: &[SubtitleSegment], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating annotated SRT file: {}", output_path.display());

    let mut srt_content = String::new();

    for (index, segment) in segments.iter().enumerate() {
        let text = if segment.tokens.is_empty() {
            segment.text.clone()
        } else {
            tokens_inline_text(&segment.tokens)
        };

        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(segment.start),
            format_srt_time(segment.end),
            text.trim()
        ));
    }

    fs::write(output_path, srt_content).await?;

    info!("SRT file generated successfully");
    Ok(())
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subtitle::RubyToken;

    #[test]
    fn test_format_srt_time() {
        assert_eq!(format_srt_time(0.0), "00:00:00,000");
        assert_eq!(format_srt_time(65.123), "00:01:05,123");
        assert_eq!(format_srt_time(3661.500), "01:01:01,500");
    }

    #[test]
    fn test_parse_srt_blocks() {
        let content = "1\r\n00:00:01,000 --> 00:00:03,500\r\n今日は\r\n良い天気\r\n\r\n\
                       2\r\n00:00:04,000 --> 00:00:05,250\r\n空\r\n";
        let segments = parse_srt(content);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 1.0);
        assert_eq!(segments[0].end, 3.5);
        assert_eq!(segments[0].text, "今日は 良い天気");
        assert_eq!(segments[1].start, 4.0);
        assert_eq!(segments[1].end, 5.25);
    }

    #[test]
    fn test_parse_srt_skips_malformed_blocks() {
        let content = "1\nnot a timecode\ntext\n\n\
                       2\n00:00:02,000 --> 00:00:03,000\n\n\n\
                       3\n00:00:04.000 --> 00:00:05.000\nok\n\n\
                       4\n00:00:06,000 --> 00:00:07,000\n";
        let segments = parse_srt(content);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "ok");
        assert_eq!(segments[0].start, 4.0);
    }

    #[test]
    fn test_parse_srt_sorts_by_start() {
        let content = "1\n00:00:10,000 --> 00:00:11,000\nlater\n\n\
                       2\n00:00:01,000 --> 00:00:02,000\nearlier\n";
        let segments = parse_srt(content);
        assert_eq!(segments[0].text, "earlier");
        assert_eq!(segments[1].text, "later");
    }

    #[tokio::test]
    async fn test_write_annotated_srt_round_trips_timing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.srt");

        let mut segment = SubtitleSegment::new(1.25, 2.0, "今日は");
        segment.tokens = vec![RubyToken::with_ruby("今日", "きょう"), RubyToken::plain("は")];
        write_srt_annotated(&[segment], &path).await.unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("00:00:01,250 --> 00:00:02,000"));
        assert!(written.contains("今日(きょう)は"));

        let parsed = parse_srt(&written);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].start, 1.25);
    }
}
