use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::furigana::{is_kana, is_kanji};
use crate::subtitle::{tokens_text, RubyToken, SubtitleSegment};
use super::ruby::measure_tokens;
use super::{TextMeasurer, TextStyle};

static WORD_PARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}']+|\s+|[^\p{L}\p{N}\s]").expect("valid word pattern"));

/// Lines up to 5% wider than the slot are left for the downscaler
const WIDTH_TOLERANCE: f32 = 1.05;

/// Slot size a rendered line has to fit into
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    pub slot_width: f32,
    pub slot_height: f32,
}

struct Fitter<'a> {
    slot: FitOptions,
    style: &'a TextStyle,
    measurer: &'a dyn TextMeasurer,
}

impl Fitter<'_> {
    fn measure(&self, tokens: &[RubyToken]) -> (f32, f32) {
        measure_tokens(tokens, self.style, self.measurer)
    }

    fn fits_width(&self, tokens: &[RubyToken]) -> bool {
        if tokens.is_empty() {
            return true;
        }
        let padding = self.style.padding() as f32;
        self.measure(tokens).0 + padding * 2.0 <= self.slot.slot_width
    }
}

/// Timing weight of a token: letters, digits, kanji and kana count 1, punctuation 0.2
pub fn token_weight(token: &RubyToken) -> f32 {
    token
        .text
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            if c.is_alphanumeric() || is_kanji(c) || is_kana(c) {
                1.0
            } else {
                0.2
            }
        })
        .sum()
}

/// Drop whitespace-only tokens from both ends of a chunk
pub fn trim_chunk(chunk: &[RubyToken]) -> &[RubyToken] {
    let start = chunk.iter().position(|t| !t.is_blank()).unwrap_or(chunk.len());
    let end = chunk.iter().rposition(|t| !t.is_blank()).map(|i| i + 1).unwrap_or(start);
    &chunk[start..end.max(start)]
}

/// Break an un-annotated line into pieces the chunker can wrap
pub fn split_text_tokens_for_fit(text: &str) -> Vec<RubyToken> {
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().any(char::is_whitespace) {
        return WORD_PARTS.find_iter(text).map(|m| RubyToken::plain(m.as_str())).collect();
    }
    if text.chars().any(|c| is_kanji(c) || is_kana(c)) {
        return text.chars().map(|c| RubyToken::plain(c.to_string())).collect();
    }
    vec![RubyToken::plain(text)]
}

fn push_trimmed(chunks: &mut Vec<Vec<RubyToken>>, chunk: &[RubyToken]) {
    let trimmed = trim_chunk(chunk);
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_vec());
    }
}

/// Greedily pack tokens into chunks that fit the slot width.
///
/// A single token wider than the slot becomes a chunk of its own.
pub fn chunk_tokens_to_fit_width(
    tokens: &[RubyToken],
    slot: FitOptions,
    style: &TextStyle,
    measurer: &dyn TextMeasurer,
) -> Vec<Vec<RubyToken>> {
    let fitter = Fitter { slot, style, measurer };
    let mut chunks: Vec<Vec<RubyToken>> = Vec::new();
    let mut current: Vec<RubyToken> = Vec::new();

    for token in tokens {
        current.push(token.clone());
        if fitter.fits_width(&current) {
            continue;
        }

        current.pop();
        if current.is_empty() {
            push_trimmed(&mut chunks, std::slice::from_ref(token));
            continue;
        }

        push_trimmed(&mut chunks, &current);
        current = vec![token.clone()];
        if !fitter.fits_width(&current) {
            push_trimmed(&mut chunks, &current);
            current.clear();
        }
    }

    if !current.is_empty() {
        push_trimmed(&mut chunks, &current);
    }

    if chunks.is_empty() {
        vec![tokens.to_vec()]
    } else {
        chunks
    }
}

/// Divide a segment's time range across chunks in proportion to their weight.
///
/// The last chunk always ends at the segment end.
pub fn split_segment_timing(segment: &SubtitleSegment, chunks: Vec<Vec<RubyToken>>) -> Vec<SubtitleSegment> {
    let duration = segment.duration();
    if chunks.len() <= 1 || duration <= 0.0 {
        return vec![segment.clone()];
    }

    let mut weights: Vec<f64> = chunks
        .iter()
        .map(|chunk| chunk.iter().map(token_weight).sum::<f32>() as f64)
        .collect();
    let mut total: f64 = weights.iter().sum();
    if total <= 0.0 {
        weights = vec![1.0; chunks.len()];
        total = chunks.len() as f64;
    }

    let last = chunks.len() - 1;
    let mut start = segment.start;
    let mut result = Vec::with_capacity(chunks.len());

    for (idx, (chunk, weight)) in chunks.into_iter().zip(weights).enumerate() {
        let end = if idx == last {
            segment.end
        } else {
            (start + duration * weight / total).max(start)
        };

        let mut piece = SubtitleSegment::new(start, end, tokens_text(&chunk));
        piece.tokens = chunk;
        piece.lang = segment.lang.clone();
        result.push(piece);
        start = end;
    }

    result
}

/// Split every segment wider than the slot into consecutive shorter segments.
///
/// Segments taller than the slot are left alone, the renderer scales them
/// down instead.
pub fn auto_split_segments(
    segments: Vec<SubtitleSegment>,
    slot: FitOptions,
    style: &TextStyle,
    measurer: &dyn TextMeasurer,
) -> Vec<SubtitleSegment> {
    let fitter = Fitter { slot, style, measurer };
    let mut result = Vec::with_capacity(segments.len());

    for mut segment in segments {
        if segment.tokens.is_empty() {
            if segment.text.trim().is_empty() {
                continue;
            }
            segment.tokens = vec![RubyToken::plain(segment.text.clone())];
        }

        let (width, height) = fitter.measure(&segment.tokens);
        if height > slot.slot_height || width <= slot.slot_width * WIDTH_TOLERANCE {
            result.push(segment);
            continue;
        }

        let split_tokens = match segment.tokens.as_slice() {
            [only] if only.ruby.is_none() => Some(split_text_tokens_for_fit(&only.text)),
            _ => None,
        };
        let tokens = split_tokens.as_deref().unwrap_or(&segment.tokens);

        if !fitter.fits_width(tokens) {
            let chunks = chunk_tokens_to_fit_width(tokens, slot, style, measurer);
            if chunks.len() > 1 {
                debug!(
                    "Split segment at {:.2}s into {} parts: {}",
                    segment.start,
                    chunks.len(),
                    segment.text
                );
                result.extend(split_segment_timing(&segment, chunks));
                continue;
            }
        }

        if let Some(tokens) = split_tokens {
            segment.text = tokens_text(&tokens);
            segment.tokens = tokens;
        }
        result.push(segment);
    }

    result
}
