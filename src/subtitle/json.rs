use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, info};

use crate::color::Rgb;
use crate::config::SubtitleConfig;
use crate::error::{BurnerError, Result};
use super::{format_srt_time, tokens_inline_text, RubyToken, SubtitleSegment};

static TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{1,2}):(\d{2}):(\d{2})(?:[,.](\d{1,3}))?$").expect("valid timestamp pattern")
});

static RUBY_MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^>]+)>\[([^\]]+)\]").expect("valid ruby markup pattern"));

/// Parse a JSON transcript into subtitle segments sorted by start time.
///
/// Accepts a top-level array, or an object with an `items`, `subtitles`
/// or `segments` array. Items without a usable start/end are skipped.
pub fn parse_json(content: &str, keys: &SubtitleConfig) -> Result<Vec<SubtitleSegment>> {
    let payload: Value = serde_json::from_str(content)?;

    let items = match &payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ["items", "subtitles", "segments"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .ok_or_else(|| {
                BurnerError::Subtitle("JSON object has no items, subtitles or segments array".to_string())
            })?,
        _ => {
            return Err(BurnerError::Subtitle(
                "JSON subtitles must be an array or an object".to_string(),
            ))
        }
    };

    let mut segments = Vec::new();

    for item in items {
        let Some(fields) = item.as_object() else {
            continue;
        };

        let (Some(start), Some(end)) = (
            fields.get("start").and_then(parse_timestamp),
            fields.get("end").and_then(parse_timestamp),
        ) else {
            debug!("Skipping JSON item without valid start/end");
            continue;
        };

        let text = fields
            .get(&keys.text_key)
            .or_else(|| fields.get("text"))
            .map(value_to_text)
            .unwrap_or_default();

        let tokens = match fields.get(&keys.tokens_key).and_then(Value::as_array) {
            Some(list) if !list.is_empty() => tokens_from_objects(list, &keys.palette),
            _ => match fields.get(&keys.pairs_key).and_then(Value::as_array) {
                Some(pairs) if !pairs.is_empty() => tokens_from_pairs(pairs),
                _ => match keys.ruby_key.as_ref().and_then(|key| fields.get(key)).and_then(Value::as_str) {
                    Some(markup) if !markup.is_empty() => tokens_from_ruby_markup(markup),
                    _ => Vec::new(),
                },
            },
        };

        let text = if text.is_empty() {
            super::tokens_text(&tokens)
        } else {
            text
        };
        if text.trim().is_empty() {
            continue;
        }

        let mut segment = SubtitleSegment::new(start, end, text);
        segment.tokens = tokens;
        segment.lang = fields.get("lang").and_then(Value::as_str).map(str::to_string);
        segments.push(segment);
    }

    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    Ok(segments)
}

/// Seconds from a JSON number, a numeric string, or `HH:MM:SS[,.]mmm`
pub fn parse_timestamp(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if let Some(caps) = TIMESTAMP.captures(s) {
                let hours: f64 = caps[1].parse().ok()?;
                let minutes: f64 = caps[2].parse().ok()?;
                let seconds: f64 = caps[3].parse().ok()?;
                let millis = match caps.get(4) {
                    // "5" in "00:00:01.5" means 500ms
                    Some(m) => format!("{:0<3}", m.as_str()).parse::<f64>().ok()?,
                    None => 0.0,
                };
                Some(hours * 3600.0 + minutes * 60.0 + seconds + millis / 1000.0)
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn first_string<'a>(fields: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|key| fields.get(*key).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn tokens_from_objects(list: &[Value], palette: &BTreeMap<String, Rgb>) -> Vec<RubyToken> {
    list.iter()
        .filter_map(Value::as_object)
        .filter_map(|fields| {
            let text = first_string(fields, &["text", "word", "token"])?;
            let ruby = first_string(fields, &["ruby", "reading", "furigana"]).map(str::to_string);

            let color = match fields.get("color").and_then(Value::as_str) {
                Some(hex) => hex.parse::<Rgb>().ok(),
                None => first_string(fields, &["type", "pos", "tag"])
                    .and_then(|kind| palette.get(kind).copied()),
            };

            Some(RubyToken {
                text: text.to_string(),
                ruby,
                color,
            })
        })
        .collect()
}

fn tokens_from_pairs(pairs: &[Value]) -> Vec<RubyToken> {
    pairs
        .iter()
        .filter_map(Value::as_array)
        .filter_map(|pair| {
            let text = pair.first().map(value_to_text).filter(|t| !t.is_empty())?;
            let ruby = pair
                .get(1)
                .and_then(Value::as_str)
                .filter(|r| !r.is_empty())
                .map(str::to_string);
            Some(RubyToken { text, ruby, color: None })
        })
        .collect()
}

/// Split `<漢字>[かんじ]` markup into annotated and plain tokens
pub fn tokens_from_ruby_markup(text: &str) -> Vec<RubyToken> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for caps in RUBY_MARKUP.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > cursor {
            tokens.push(RubyToken::plain(&text[cursor..whole.start()]));
        }
        tokens.push(RubyToken::with_ruby(&caps[1], &caps[2]));
        cursor = whole.end();
    }

    if cursor < text.len() {
        tokens.push(RubyToken::plain(&text[cursor..]));
    }

    tokens
}

#[derive(Serialize)]
struct AnnotatedItem<'a> {
    start: String,
    end: String,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    lang: Option<&'a str>,
    tokens: &'a [RubyToken],
    furigana_text: String,
}

/// Write segments as a JSON transcript including their ruby tokens
pub async fn write_json_annotated<P: AsRef<Path>>(segments: &[SubtitleSegment], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating annotated JSON file: {}", output_path.display());

    let items: Vec<AnnotatedItem<'_>> = segments
        .iter()
        .map(|segment| AnnotatedItem {
            start: format_srt_time(segment.start),
            end: format_srt_time(segment.end),
            text: &segment.text,
            lang: segment.lang.as_deref(),
            tokens: &segment.tokens,
            furigana_text: tokens_inline_text(&segment.tokens),
        })
        .collect();

    let content = serde_json::to_string_pretty(&items)?;
    fs::write(output_path, content).await?;

    info!("JSON file generated successfully");
    Ok(())
}
