//! Title normalization for case, diacritic and punctuation-insensitive comparison.
//!
//! Normalized strings are only ever compared against each other. Queries are
//! sent upstream exactly as the user typed them.

use std::ops::RangeInclusive;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Apostrophe-like marks removed outright so "Don't" and "Dont" compare equal.
const APOSTROPHES: [char; 4] = ['\'', '\u{2019}', '`', '\u{00B4}'];

/// Combining Diacritical Marks block; only these are folded away.
const DIACRITICS: RangeInclusive<char> = '\u{0300}'..='\u{036F}';

/// Reduces a title to its canonical comparison form.
///
/// Lower-cases, decomposes (NFKD), drops Latin diacritics and apostrophes,
/// turns every run of non-alphanumeric characters into one space, trims and
/// recomposes (NFC). Other combining marks, such as the kana voicing marks,
/// stay attached to their letter so "ガンダム" and "カンタム" differ.
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;

    let lowered = s.to_lowercase();
    // Apostrophes go before decomposition: NFKD turns the acute accent into
    // a space plus a combining mark.
    let stripped = lowered.chars().filter(|c| !APOSTROPHES.contains(c));
    for c in stripped.nfkd() {
        if DIACRITICS.contains(&c) || APOSTROPHES.contains(&c) {
            continue;
        }

        if is_combining_mark(c) {
            if !pending_space && !out.is_empty() {
                out.push(c);
            }
            continue;
        }

        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            // Compatibility decomposition can surface upper-case letters (e.g. ℌ).
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    out.nfc().collect()
}

/// True when `candidate` normalizes to `normalized_query`.
///
/// An empty normalized query never matches; a query of pure punctuation
/// would otherwise match every title that is pure punctuation too.
pub fn is_exact(candidate: &str, normalized_query: &str) -> bool {
    !normalized_query.is_empty() && normalize(candidate) == normalized_query
}

/// True when `candidate` normalizes to something starting with `normalized_query`.
pub fn is_prefix(candidate: &str, normalized_query: &str) -> bool {
    !normalized_query.is_empty() && normalize(candidate).starts_with(normalized_query)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_folding() {
        assert_eq!(normalize("  One  PIECE!! "), "one piece");
        assert_eq!(normalize("Re:Zero - Starting Life"), "re zero starting life");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!..."), "");
    }

    #[test]
    fn test_diacritics_and_apostrophes() {
        assert_eq!(normalize("Naïve Don't"), normalize("Naive Dont"));
        assert_eq!(normalize("Pokémon"), "pokemon");
        assert_eq!(normalize("JoJo’s Bizarre Adventure"), "jojos bizarre adventure");
        assert_eq!(normalize("it`s ´fine"), "its fine");
        assert_eq!(normalize("Don´t Toy With Me"), "dont toy with me");
    }

    #[test]
    fn test_compatibility_forms() {
        assert_eq!(normalize("ﬁre"), "fire");
        assert_eq!(normalize("ＯＮＥ　ＰＩＥＣＥ"), "one piece");
    }

    #[test]
    fn test_non_latin_titles_survive() {
        assert_eq!(normalize("進撃の巨人"), "進撃の巨人");
        assert_eq!(normalize("Ангел"), "ангел");
    }

    #[test]
    fn test_kana_voicing_marks_are_kept() {
        assert_eq!(normalize("ガンダム"), "ガンダム");
        assert_ne!(normalize("ガンダム"), normalize("カンタム"));
        assert_eq!(normalize("ﾊﾟﾝﾀﾞ"), "パンダ");
        assert!(!is_exact("ガンダム", &normalize("カンタム")));
        assert!(!is_prefix("ガンダム", &normalize("カ")));
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Naïve Don't",
            "  ＯＮＥ　ＰＩＥＣＥ ",
            "Ⅻ Monkeys",
            "İstanbul",
            "ß-Straße",
            "進撃の巨人: Attack!",
            "",
            "---",
            "ℌello ǅemo",
            "ガンダム ﾊﾟﾝﾀﾞ",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn test_exact_and_prefix() {
        assert!(is_exact("One Piece", "one piece"));
        assert!(!is_exact("One Piece Film", "one piece"));
        assert!(is_prefix("One Piece Film", "one piece"));
        assert!(!is_exact("", ""));
        assert!(!is_prefix("anything", ""));
    }
}
