use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

use crate::error::{BurnerError, Result};
use crate::subtitle::RubyToken;
use super::kana::{has_kanji, katakana_to_hiragana};
use super::ReadingAnalyzer;

/// Single-kanji readings used when no analyzer backend is available
const BUILTIN_READINGS: &[(&str, &str)] = &[
    ("今", "いま"),
    ("日", "ひ"),
    ("空", "そら"),
    ("気", "き"),
    ("持", "も"),
    ("朝", "あさ"),
    ("時", "じ"),
    ("間", "かん"),
    ("静", "しず"),
    ("心", "こころ"),
    ("落", "お"),
    ("着", "つ"),
    ("深", "ふか"),
    ("呼", "こ"),
    ("吸", "きゅう"),
];

/// Greedy longest-match reading lookup
pub struct DictionaryAnalyzer {
    entries: HashMap<String, String>,
    max_len: usize,
}

impl DictionaryAnalyzer {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries: HashMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), katakana_to_hiragana(&v.into())))
            .filter(|(k, v)| !k.is_empty() && !v.is_empty())
            .collect();
        let max_len = entries.keys().map(|k| k.chars().count()).max().unwrap_or(0);
        Self { entries, max_len }
    }

    /// Built-in table extended (and overridden) by the given entries
    pub fn with_builtin<I, K, V>(extra: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut entries: Vec<(String, String)> = BUILTIN_READINGS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        entries.extend(extra.into_iter().map(|(k, v)| (k.into(), v.into())));
        Self::new(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Split text into dictionary hits (with reading) and the unmatched text between them
    pub fn segment(&self, text: &str) -> Vec<(String, Option<String>)> {
        let chars: Vec<char> = text.chars().collect();
        let mut pieces: Vec<(String, Option<String>)> = Vec::new();
        let mut pending = String::new();
        let mut i = 0;

        while i < chars.len() {
            let longest = (1..=self.max_len.min(chars.len() - i)).rev().find_map(|len| {
                let candidate: String = chars[i..i + len].iter().collect();
                self.entries.get(&candidate).map(|reading| (len, candidate, reading.clone()))
            });

            match longest {
                Some((len, word, reading)) => {
                    if !pending.is_empty() {
                        pieces.push((std::mem::take(&mut pending), None));
                    }
                    pieces.push((word, Some(reading)));
                    i += len;
                }
                None => {
                    pending.push(chars[i]);
                    i += 1;
                }
            }
        }

        if !pending.is_empty() {
            pieces.push((pending, None));
        }
        pieces
    }
}

impl ReadingAnalyzer for DictionaryAnalyzer {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn analyze(&self, text: &str) -> Vec<RubyToken> {
        self.segment(text)
            .into_iter()
            .map(|(word, reading)| match reading {
                Some(reading) if has_kanji(&word) && reading != word => RubyToken::with_ruby(word, reading),
                _ => RubyToken::plain(word),
            })
            .collect()
    }
}

/// Read `word = "reading"` pairs from a TOML or JSON file
pub fn load_dictionary_file<P: AsRef<Path>>(path: P) -> Result<BTreeMap<String, String>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BurnerError::FileNotFound(path.display().to_string()));
    }

    let content = std::fs::read_to_string(path)?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let entries: BTreeMap<String, String> = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)
            .map_err(|e| BurnerError::Config(format!("Failed to parse dictionary {}: {}", path.display(), e)))?
    };

    info!("Loaded {} dictionary entries from {}", entries.len(), path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_match_wins() {
        let dict = DictionaryAnalyzer::new([("今", "いま"), ("今日", "きょう"), ("日", "ひ")]);
        let tokens = dict.analyze("今日は日");

        assert_eq!(
            tokens,
            vec![
                RubyToken::with_ruby("今日", "きょう"),
                RubyToken::plain("は"),
                RubyToken::with_ruby("日", "ひ"),
            ]
        );
    }

    #[test]
    fn test_unmatched_text_is_grouped() {
        let dict = DictionaryAnalyzer::new([("空", "ソラ")]);
        let tokens = dict.analyze("青い空です");

        assert_eq!(
            tokens,
            vec![
                RubyToken::plain("青い"),
                RubyToken::with_ruby("空", "そら"),
                RubyToken::plain("です"),
            ]
        );
    }

    #[test]
    fn test_builtin_table_and_overrides() {
        let dict = DictionaryAnalyzer::with_builtin([("日", "にち")]);
        assert!(dict.len() >= BUILTIN_READINGS.len());
        assert_eq!(dict.analyze("空"), vec![RubyToken::with_ruby("空", "そら")]);
        assert_eq!(dict.analyze("日"), vec![RubyToken::with_ruby("日", "にち")]);
    }

    #[test]
    fn test_load_dictionary_file_formats() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("words.toml");
        std::fs::write(&toml_path, "\"東京\" = \"とうきょう\"\n").unwrap();
        let entries = load_dictionary_file(&toml_path).unwrap();
        assert_eq!(entries.get("東京").map(String::as_str), Some("とうきょう"));

        let json_path = dir.path().join("words.json");
        std::fs::write(&json_path, r#"{"大阪": "おおさか"}"#).unwrap();
        let entries = load_dictionary_file(&json_path).unwrap();
        assert_eq!(entries.get("大阪").map(String::as_str), Some("おおさか"));

        assert!(load_dictionary_file(dir.path().join("missing.toml")).is_err());
    }
}
