use tracing::trace;

use crate::subtitle::RubyToken;
use super::kana::{has_kanji, is_hiragana, is_kanji, is_katakana, katakana_to_hiragana};
use super::ReadingAnalyzer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Kanji,
    Hiragana,
    Katakana,
    Space,
    Other,
}

fn classify(c: char) -> CharClass {
    if is_kanji(c) {
        CharClass::Kanji
    } else if is_hiragana(c) {
        CharClass::Hiragana
    } else if is_katakana(c) {
        CharClass::Katakana
    } else if c.is_whitespace() {
        CharClass::Space
    } else {
        CharClass::Other
    }
}

/// Split text into words: a kanji run together with the hiragana that
/// follows it, or a run of a single character class.
pub fn split_words(text: &str) -> Vec<&str> {
    let mut words = Vec::new();
    let mut start = 0;
    let mut current: Option<CharClass> = None;

    for (idx, c) in text.char_indices() {
        let class = classify(c);
        let continues = match current {
            None => true,
            // okurigana stays with its stem
            Some(CharClass::Kanji) => matches!(class, CharClass::Kanji | CharClass::Hiragana),
            Some(prev) => prev == class,
        };

        if !continues {
            words.push(&text[start..idx]);
            start = idx;
        }
        current = match (current, class) {
            (Some(CharClass::Kanji), CharClass::Hiragana) => Some(CharClass::Hiragana),
            _ => Some(class),
        };
    }

    if start < text.len() {
        words.push(&text[start..]);
    }
    words
}

/// Readings from the `kakasi` kanji dictionary
pub struct KakasiAnalyzer;

impl KakasiAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn reading(word: &str) -> Option<String> {
        let converted = kakasi::convert(word);
        let reading: String = katakana_to_hiragana(&converted.hiragana)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        trace!("kakasi: {} -> {}", word, reading);
        if reading.is_empty() || reading == word {
            None
        } else {
            Some(reading)
        }
    }
}

impl Default for KakasiAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadingAnalyzer for KakasiAnalyzer {
    fn name(&self) -> &'static str {
        "kakasi"
    }

    fn analyze(&self, text: &str) -> Vec<RubyToken> {
        split_words(text)
            .into_iter()
            .map(|word| {
                if has_kanji(word) {
                    match Self::reading(word) {
                        Some(reading) => RubyToken::with_ruby(word, reading),
                        None => RubyToken::plain(word),
                    }
                } else {
                    RubyToken::plain(word)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words_keeps_okurigana() {
        assert_eq!(split_words("今日は晴れです"), vec!["今日は", "晴れです"]);
        assert_eq!(split_words("テレビを見る"), vec!["テレビ", "を", "見る"]);
        assert_eq!(split_words("東京 2024年"), vec!["東京", " ", "2024", "年"]);
        assert_eq!(split_words(""), Vec::<&str>::new());
    }

    #[test]
    fn test_split_words_hiragana_run_ends_at_next_kanji() {
        assert_eq!(split_words("食べて寝る"), vec!["食べて", "寝る"]);
    }

    #[test]
    fn test_kakasi_annotates_kanji_words_only() {
        let analyzer = KakasiAnalyzer::new();
        let tokens = analyzer.analyze("テレビを見る");

        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], RubyToken::plain("テレビ"));
        assert_eq!(tokens[1], RubyToken::plain("を"));
        assert_eq!(tokens[2].text, "見る");
        let reading = tokens[2].ruby.as_deref().unwrap();
        assert!(reading.ends_with('る'));
        assert!(reading.chars().all(is_hiragana));
    }
}
