//! Character classification and kana conversions.

pub fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{30FF}').contains(&c)
}

pub fn is_hiragana(c: char) -> bool {
    ('\u{3041}'..='\u{3096}').contains(&c)
}

pub fn is_katakana(c: char) -> bool {
    ('\u{30A1}'..='\u{30FA}').contains(&c) || c == 'ー'
}

pub fn is_kanji(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c) || ('\u{3400}'..='\u{4DBF}').contains(&c) || c == '々'
}

pub fn has_kanji(text: &str) -> bool {
    text.chars().any(is_kanji)
}

/// Kana somewhere and no kanji anywhere
pub fn is_kana_text(text: &str) -> bool {
    text.chars().any(is_kana) && !has_kanji(text)
}

pub fn katakana_to_hiragana(text: &str) -> String {
    text.chars()
        .map(|c| {
            if ('\u{30A1}'..='\u{30F6}').contains(&c) {
                char::from_u32(c as u32 - 0x60).unwrap_or(c)
            } else {
                c
            }
        })
        .collect()
}

/// Split a word into leading kana, the core, and trailing kana.
///
/// Words without kanji come back whole as the core.
pub fn split_kana_affixes(text: &str) -> (&str, &str, &str) {
    if !has_kanji(text) {
        return ("", text, "");
    }

    let prefix_len: usize = text
        .chars()
        .take_while(|c| is_kana(*c))
        .map(char::len_utf8)
        .sum();
    let suffix_len: usize = text
        .chars()
        .rev()
        .take_while(|c| is_kana(*c))
        .map(char::len_utf8)
        .sum();

    let core_end = text.len() - suffix_len;
    (&text[..prefix_len], &text[prefix_len..core_end], &text[core_end..])
}

/// Trim the reading of the kana the word already spells out.
///
/// `("食べる", "たべる")` becomes `"た"`. Returns `None` when nothing
/// is left to annotate.
pub fn strip_kana_affixes(text: &str, ruby: Option<&str>) -> Option<String> {
    let ruby = ruby?;
    if !has_kanji(text) {
        return None;
    }

    let (prefix, _, suffix) = split_kana_affixes(text);
    let prefix = katakana_to_hiragana(prefix);
    let suffix = katakana_to_hiragana(suffix);

    let mut trimmed = katakana_to_hiragana(ruby);
    if !prefix.is_empty() && trimmed.starts_with(&prefix) {
        trimmed.drain(..prefix.len());
    }
    if !suffix.is_empty() && trimmed.ends_with(&suffix) {
        trimmed.truncate(trimmed.len() - suffix.len());
    }

    let trimmed = trimmed.trim();
    if trimmed.is_empty() || trimmed == katakana_to_hiragana(text) {
        return None;
    }
    Some(trimmed.to_string())
}

fn base_romaji(c: char) -> Option<&'static str> {
    let romaji = match c {
        'あ' => "a", 'い' => "i", 'う' => "u", 'え' => "e", 'お' => "o",
        'か' => "ka", 'き' => "ki", 'く' => "ku", 'け' => "ke", 'こ' => "ko",
        'さ' => "sa", 'し' => "shi", 'す' => "su", 'せ' => "se", 'そ' => "so",
        'た' => "ta", 'ち' => "chi", 'つ' => "tsu", 'て' => "te", 'と' => "to",
        'な' => "na", 'に' => "ni", 'ぬ' => "nu", 'ね' => "ne", 'の' => "no",
        'は' => "ha", 'ひ' => "hi", 'ふ' => "fu", 'へ' => "he", 'ほ' => "ho",
        'ま' => "ma", 'み' => "mi", 'む' => "mu", 'め' => "me", 'も' => "mo",
        'や' => "ya", 'ゆ' => "yu", 'よ' => "yo",
        'ら' => "ra", 'り' => "ri", 'る' => "ru", 'れ' => "re", 'ろ' => "ro",
        'わ' => "wa", 'を' => "o", 'ん' => "n",
        'が' => "ga", 'ぎ' => "gi", 'ぐ' => "gu", 'げ' => "ge", 'ご' => "go",
        'ざ' => "za", 'じ' => "ji", 'ず' => "zu", 'ぜ' => "ze", 'ぞ' => "zo",
        'だ' => "da", 'ぢ' => "ji", 'づ' => "zu", 'で' => "de", 'ど' => "do",
        'ば' => "ba", 'び' => "bi", 'ぶ' => "bu", 'べ' => "be", 'ぼ' => "bo",
        'ぱ' => "pa", 'ぴ' => "pi", 'ぷ' => "pu", 'ぺ' => "pe", 'ぽ' => "po",
        'ぁ' => "a", 'ぃ' => "i", 'ぅ' => "u", 'ぇ' => "e", 'ぉ' => "o",
        'ゃ' => "ya", 'ゅ' => "yu", 'ょ' => "yo", 'ゔ' => "vu",
        _ => return None,
    };
    Some(romaji)
}

fn digraph_romaji(first: char, second: char) -> Option<&'static str> {
    let romaji = match (first, second) {
        ('き', 'ゃ') => "kya", ('き', 'ゅ') => "kyu", ('き', 'ょ') => "kyo",
        ('ぎ', 'ゃ') => "gya", ('ぎ', 'ゅ') => "gyu", ('ぎ', 'ょ') => "gyo",
        ('し', 'ゃ') => "sha", ('し', 'ゅ') => "shu", ('し', 'ょ') => "sho",
        ('じ', 'ゃ') => "ja", ('じ', 'ゅ') => "ju", ('じ', 'ょ') => "jo",
        ('ち', 'ゃ') => "cha", ('ち', 'ゅ') => "chu", ('ち', 'ょ') => "cho",
        ('に', 'ゃ') => "nya", ('に', 'ゅ') => "nyu", ('に', 'ょ') => "nyo",
        ('ひ', 'ゃ') => "hya", ('ひ', 'ゅ') => "hyu", ('ひ', 'ょ') => "hyo",
        ('み', 'ゃ') => "mya", ('み', 'ゅ') => "myu", ('み', 'ょ') => "myo",
        ('り', 'ゃ') => "rya", ('り', 'ゅ') => "ryu", ('り', 'ょ') => "ryo",
        ('び', 'ゃ') => "bya", ('び', 'ゅ') => "byu", ('び', 'ょ') => "byo",
        ('ぴ', 'ゃ') => "pya", ('ぴ', 'ゅ') => "pyu", ('ぴ', 'ょ') => "pyo",
        ('ゔ', 'ぁ') => "va", ('ゔ', 'ぃ') => "vi", ('ゔ', 'ぇ') => "ve", ('ゔ', 'ぉ') => "vo",
        _ => return None,
    };
    Some(romaji)
}

/// Hepburn romaji for a kana string.
///
/// `っ` doubles the next consonant and `ー` repeats the previous vowel.
/// Non-kana characters pass through unchanged.
pub fn kana_to_romaji(text: &str) -> Option<String> {
    let chars: Vec<char> = katakana_to_hiragana(text).chars().collect();
    let mut result = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == 'っ' {
            let next = chars
                .get(i + 1)
                .and_then(|&n| {
                    chars
                        .get(i + 2)
                        .and_then(|&m| digraph_romaji(n, m))
                        .or_else(|| base_romaji(n))
                });
            if let Some(first) = next.and_then(|r| r.chars().next()) {
                // Hepburn writes っち as "tch"
                result.push(if first == 'c' { 't' } else { first });
            }
            i += 1;
            continue;
        }

        if c == 'ー' {
            if let Some(last) = result.chars().last().filter(|l| "aeiou".contains(*l)) {
                result.push(last);
            }
            i += 1;
            continue;
        }

        if let Some(romaji) = chars.get(i + 1).and_then(|&n| digraph_romaji(c, n)) {
            result.push_str(romaji);
            i += 2;
            continue;
        }

        match base_romaji(c) {
            Some(romaji) => result.push_str(romaji),
            None => result.push(c),
        }
        i += 1;
    }

    let result = result.trim().to_string();
    if result.is_empty() { None } else { Some(result) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_classes() {
        assert!(is_kanji('漢'));
        assert!(is_kanji('々'));
        assert!(!is_kanji('か'));
        assert!(is_hiragana('か'));
        assert!(is_katakana('カ'));
        assert!(is_katakana('ー'));
        assert!(is_kana('ー'));
        assert!(is_kana_text("ひらがな"));
        assert!(!is_kana_text("漢字かな"));
        assert!(!is_kana_text("abc"));
    }

    #[test]
    fn test_katakana_to_hiragana() {
        assert_eq!(katakana_to_hiragana("キョウ"), "きょう");
        assert_eq!(katakana_to_hiragana("テレビー"), "てれびー");
        assert_eq!(katakana_to_hiragana("abc漢"), "abc漢");
    }

    #[test]
    fn test_split_kana_affixes() {
        assert_eq!(split_kana_affixes("食べる"), ("", "食", "べる"));
        assert_eq!(split_kana_affixes("お茶"), ("お", "茶", ""));
        assert_eq!(split_kana_affixes("お見舞い"), ("お", "見舞", "い"));
        assert_eq!(split_kana_affixes("ひらがな"), ("", "ひらがな", ""));
    }

    #[test]
    fn test_strip_kana_affixes() {
        assert_eq!(strip_kana_affixes("食べる", Some("たべる")).as_deref(), Some("た"));
        assert_eq!(strip_kana_affixes("お茶", Some("おちゃ")).as_deref(), Some("ちゃ"));
        assert_eq!(strip_kana_affixes("今日", Some("キョウ")).as_deref(), Some("きょう"));
        assert_eq!(strip_kana_affixes("ひらがな", Some("ひらがな")), None);
        assert_eq!(strip_kana_affixes("今日", None), None);
        // reading that does not match the okurigana is kept whole
        assert_eq!(strip_kana_affixes("行った", Some("おこなう")).as_deref(), Some("おこなう"));
    }

    #[test]
    fn test_kana_to_romaji() {
        assert_eq!(kana_to_romaji("きょう").as_deref(), Some("kyou"));
        assert_eq!(kana_to_romaji("がっこう").as_deref(), Some("gakkou"));
        assert_eq!(kana_to_romaji("まっちゃ").as_deref(), Some("matcha"));
        assert_eq!(kana_to_romaji("ラーメン").as_deref(), Some("raamen"));
        assert_eq!(kana_to_romaji("しんぶん").as_deref(), Some("shinbun"));
        assert_eq!(kana_to_romaji(""), None);
    }
}
