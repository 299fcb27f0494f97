//! Reading generation for Japanese subtitle text.
//!
//! A [`FuriganaGenerator`] turns plain text into [`RubyToken`]s. User
//! dictionary words are matched first, the rest of the text goes to the
//! configured [`ReadingAnalyzer`] backend, and the resulting tokens are
//! post-processed (okurigana stripping, romaji for kana words).

pub mod analyzer;
pub mod dictionary;
pub mod kana;

use tracing::{debug, info};

use crate::config::{AnalyzerBackend, FuriganaConfig};
use crate::error::Result;
use crate::subtitle::{RubyToken, SubtitleSegment};

pub use analyzer::KakasiAnalyzer;
pub use dictionary::{load_dictionary_file, DictionaryAnalyzer};
pub use kana::{
    has_kanji, is_kana, is_kana_text, is_kanji, kana_to_romaji, katakana_to_hiragana, split_kana_affixes,
    strip_kana_affixes,
};

/// Produces ruby tokens for a run of text
pub trait ReadingAnalyzer: Send + Sync {
    fn name(&self) -> &'static str;

    fn analyze(&self, text: &str) -> Vec<RubyToken>;
}

/// Leaves text un-annotated
pub struct PlainAnalyzer;

impl ReadingAnalyzer for PlainAnalyzer {
    fn name(&self) -> &'static str {
        "none"
    }

    fn analyze(&self, text: &str) -> Vec<RubyToken> {
        if text.is_empty() {
            Vec::new()
        } else {
            vec![RubyToken::plain(text)]
        }
    }
}

pub struct FuriganaGenerator {
    user: Option<DictionaryAnalyzer>,
    backend: Box<dyn ReadingAnalyzer>,
    fallback: Option<DictionaryAnalyzer>,
    strip_kana: bool,
    kana_romaji: bool,
}

impl FuriganaGenerator {
    pub fn new(backend: Box<dyn ReadingAnalyzer>) -> Self {
        Self {
            user: None,
            backend,
            fallback: None,
            strip_kana: true,
            kana_romaji: false,
        }
    }

    pub fn from_config(config: &FuriganaConfig) -> Result<Self> {
        let mut entries = match &config.dictionary_file {
            Some(path) => load_dictionary_file(path)?,
            None => Default::default(),
        };
        // inline entries win over the file
        entries.extend(config.dictionary.iter().map(|(k, v)| (k.clone(), v.clone())));

        let backend: Box<dyn ReadingAnalyzer> = match config.backend {
            AnalyzerBackend::Kakasi => Box::new(KakasiAnalyzer::new()),
            AnalyzerBackend::Dictionary => Box::new(DictionaryAnalyzer::with_builtin(entries.clone())),
            AnalyzerBackend::None => Box::new(PlainAnalyzer),
        };
        let fallback = match config.backend {
            AnalyzerBackend::Kakasi => Some(DictionaryAnalyzer::with_builtin(Vec::<(String, String)>::new())),
            _ => None,
        };

        let user = if entries.is_empty() || config.backend == AnalyzerBackend::None {
            None
        } else {
            Some(DictionaryAnalyzer::new(entries))
        };

        info!(
            "Furigana backend: {} (user dictionary: {} entries)",
            backend.name(),
            user.as_ref().map(DictionaryAnalyzer::len).unwrap_or(0)
        );

        Ok(Self {
            user,
            backend,
            fallback,
            strip_kana: config.strip_kana,
            kana_romaji: config.kana_romaji,
        })
    }

    pub fn with_user_dictionary(mut self, dictionary: DictionaryAnalyzer) -> Self {
        self.user = Some(dictionary);
        self
    }

    pub fn with_fallback(mut self, dictionary: DictionaryAnalyzer) -> Self {
        self.fallback = Some(dictionary);
        self
    }

    pub fn strip_kana(mut self, enabled: bool) -> Self {
        self.strip_kana = enabled;
        self
    }

    pub fn kana_romaji(mut self, enabled: bool) -> Self {
        self.kana_romaji = enabled;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn generate(&self, text: &str) -> Vec<RubyToken> {
        let raw = match &self.user {
            Some(user) => user
                .segment(text)
                .into_iter()
                .flat_map(|(word, reading)| match reading {
                    Some(reading) if reading != word => vec![RubyToken::with_ruby(word, reading)],
                    Some(_) => vec![RubyToken::plain(word)],
                    None => self.analyze_with_fallback(&word),
                })
                .collect::<Vec<_>>(),
            None => self.analyze_with_fallback(text),
        };

        self.post_process(raw)
    }

    /// Okurigana stripping and kana romaji, applied to generated and supplied tokens alike
    pub fn post_process(&self, tokens: Vec<RubyToken>) -> Vec<RubyToken> {
        let mut tokens: Vec<RubyToken> = if self.strip_kana {
            tokens.into_iter().flat_map(expand_kana_affixes).collect()
        } else {
            tokens
        };

        if self.kana_romaji {
            apply_kana_romaji(&mut tokens);
        }

        tokens
    }

    fn analyze_with_fallback(&self, text: &str) -> Vec<RubyToken> {
        let tokens = self.backend.analyze(text);
        let Some(fallback) = &self.fallback else {
            return tokens;
        };

        tokens
            .into_iter()
            .flat_map(|token| {
                if token.ruby.is_none() && has_kanji(&token.text) {
                    debug!("{} gave no reading for '{}', using fallback table", self.backend.name(), token.text);
                    fallback.analyze(&token.text)
                } else {
                    vec![token]
                }
            })
            .collect()
    }

    /// Fill in tokens for every segment that has none; returns how many were annotated.
    ///
    /// Supplied tokens keep their readings but still go through [`Self::post_process`].
    pub fn annotate_segments(&self, segments: &mut [SubtitleSegment]) -> usize {
        let mut annotated = 0;
        for segment in segments.iter_mut() {
            if segment.tokens.is_empty() {
                segment.tokens = self.generate(&segment.text);
                annotated += 1;
            } else {
                let supplied = std::mem::take(&mut segment.tokens);
                segment.tokens = self.post_process(supplied);
            }
        }
        debug!("Annotated {} of {} segments", annotated, segments.len());
        annotated
    }
}

/// Split a token so its ruby sits only above the kanji core.
///
/// `食べる(たべる)` becomes `食(た)` + `べる`. Tokens whose reading does
/// not line up with their kana affixes keep the (partially trimmed)
/// reading over the whole word.
pub fn expand_kana_affixes(token: RubyToken) -> Vec<RubyToken> {
    let Some(ruby) = token.ruby.clone() else {
        return vec![token];
    };
    if !has_kanji(&token.text) {
        return vec![token];
    }

    let Some(reading) = strip_kana_affixes(&token.text, Some(&ruby)) else {
        return vec![RubyToken { ruby: None, ..token }];
    };

    let (prefix, core, suffix) = split_kana_affixes(&token.text);
    let full = katakana_to_hiragana(&ruby);
    let aligned = full.starts_with(&katakana_to_hiragana(prefix)) && full.ends_with(&katakana_to_hiragana(suffix));
    if !aligned || (prefix.is_empty() && suffix.is_empty()) {
        return vec![RubyToken {
            ruby: Some(reading),
            ..token
        }];
    }

    let piece = |text: &str, ruby: Option<String>| RubyToken {
        text: text.to_string(),
        ruby,
        color: token.color,
    };

    let mut pieces = Vec::with_capacity(3);
    if !prefix.is_empty() {
        pieces.push(piece(prefix, None));
    }
    pieces.push(piece(core, Some(reading)));
    if !suffix.is_empty() {
        pieces.push(piece(suffix, None));
    }
    pieces
}

/// Give kana-only tokens without a reading a romaji ruby
pub fn apply_kana_romaji(tokens: &mut [RubyToken]) {
    for token in tokens.iter_mut().filter(|t| t.ruby.is_none() && is_kana_text(&t.text)) {
        token.ruby = kana_to_romaji(&token.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dictionary_generator() -> FuriganaGenerator {
        FuriganaGenerator::new(Box::new(DictionaryAnalyzer::new([("食", "しょく"), ("空", "そら")])))
    }

    #[test]
    fn test_user_dictionary_takes_priority() {
        let generator =
            dictionary_generator().with_user_dictionary(DictionaryAnalyzer::new([("食べる", "たべる")]));
        let tokens = generator.generate("空で食べる");

        assert_eq!(
            tokens,
            vec![
                RubyToken::with_ruby("空", "そら"),
                RubyToken::plain("で"),
                RubyToken::with_ruby("食", "た"),
                RubyToken::plain("べる"),
            ]
        );
    }

    #[test]
    fn test_strip_kana_disabled_keeps_whole_reading() {
        let generator = dictionary_generator()
            .with_user_dictionary(DictionaryAnalyzer::new([("食べる", "たべる")]))
            .strip_kana(false);
        assert_eq!(generator.generate("食べる"), vec![RubyToken::with_ruby("食べる", "たべる")]);
    }

    #[test]
    fn test_expand_kana_affixes() {
        assert_eq!(
            expand_kana_affixes(RubyToken::with_ruby("お見舞い", "おみまい")),
            vec![
                RubyToken::plain("お"),
                RubyToken::with_ruby("見舞", "みま"),
                RubyToken::plain("い"),
            ]
        );
        assert_eq!(
            expand_kana_affixes(RubyToken::with_ruby("今日", "きょう")),
            vec![RubyToken::with_ruby("今日", "きょう")]
        );
        // misaligned reading stays over the whole word
        assert_eq!(
            expand_kana_affixes(RubyToken::with_ruby("行った", "おこなう")),
            vec![RubyToken::with_ruby("行った", "おこなう")]
        );
        assert_eq!(expand_kana_affixes(RubyToken::plain("です")), vec![RubyToken::plain("です")]);
    }

    #[test]
    fn test_expand_keeps_token_color() {
        let mut token = RubyToken::with_ruby("食べる", "たべる");
        token.color = Some(crate::color::Rgb([10, 20, 30]));
        let pieces = expand_kana_affixes(token);
        assert_eq!(pieces.len(), 2);
        assert!(pieces.iter().all(|p| p.color == Some(crate::color::Rgb([10, 20, 30]))));
    }

    #[test]
    fn test_kana_romaji() {
        let generator = dictionary_generator().kana_romaji(true);
        let tokens = generator.generate("空がきれい");

        assert_eq!(tokens[0], RubyToken::with_ruby("空", "そら"));
        assert_eq!(tokens[1], RubyToken::with_ruby("がきれい", "gakirei"));
    }

    #[test]
    fn test_fallback_fills_missing_readings() {
        let generator = FuriganaGenerator::new(Box::new(PlainAnalyzer))
            .with_fallback(DictionaryAnalyzer::with_builtin(Vec::<(String, String)>::new()));
        assert_eq!(generator.generate("空"), vec![RubyToken::with_ruby("空", "そら")]);
    }

    #[test]
    fn test_none_backend_from_config() {
        let config = FuriganaConfig {
            backend: AnalyzerBackend::None,
            ..FuriganaConfig::default()
        };
        let generator = FuriganaGenerator::from_config(&config).unwrap();
        assert_eq!(generator.backend_name(), "none");
        assert_eq!(generator.generate("漢字"), vec![RubyToken::plain("漢字")]);
    }

    #[test]
    fn test_dictionary_backend_uses_inline_entries() {
        let mut config = FuriganaConfig {
            backend: AnalyzerBackend::Dictionary,
            ..FuriganaConfig::default()
        };
        config.dictionary.insert("東京".to_string(), "とうきょう".to_string());

        let generator = FuriganaGenerator::from_config(&config).unwrap();
        assert_eq!(generator.backend_name(), "dictionary");
        assert_eq!(
            generator.generate("東京の空"),
            vec![
                RubyToken::with_ruby("東京", "とうきょう"),
                RubyToken::plain("の"),
                RubyToken::with_ruby("空", "そら"),
            ]
        );
    }

    #[test]
    fn test_annotate_skips_pretokenized_segments() {
        let generator = dictionary_generator();
        let mut given = SubtitleSegment::new(0.0, 1.0, "空");
        given.tokens = vec![RubyToken::with_ruby("空", "くう")];
        let mut segments = vec![given, SubtitleSegment::new(1.0, 2.0, "空")];

        assert_eq!(generator.annotate_segments(&mut segments), 1);
        assert_eq!(segments[0].tokens[0].ruby.as_deref(), Some("くう"));
        assert_eq!(segments[1].tokens[0].ruby.as_deref(), Some("そら"));
    }

    #[test]
    fn test_supplied_tokens_are_post_processed() {
        let generator = dictionary_generator().kana_romaji(true);
        let mut given = SubtitleSegment::new(0.0, 1.0, "食べるね");
        given.tokens = vec![RubyToken::with_ruby("食べる", "たべる"), RubyToken::plain("ね")];
        let mut segments = vec![given];

        assert_eq!(generator.annotate_segments(&mut segments), 0);
        assert_eq!(
            segments[0].tokens,
            vec![
                RubyToken::with_ruby("食", "た"),
                RubyToken::with_ruby("べる", "beru"),
                RubyToken::with_ruby("ね", "ne"),
            ]
        );
    }

    #[test]
    fn test_kakasi_generator_strips_okurigana() {
        let generator = FuriganaGenerator::from_config(&FuriganaConfig::default()).unwrap();
        let tokens = generator.generate("食べる");

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "食");
        assert!(tokens[0].ruby.is_some());
        assert_eq!(tokens[1], RubyToken::plain("べる"));
    }
}
