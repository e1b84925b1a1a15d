use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::config::ParsingConfig;

/// Words that follow a hyphen in compounds ("data-driven", "peer-reviewed").
const COMPOUND_SUFFIXES: &[&str] = &[
    "aware",
    "based",
    "centered",
    "class",
    "dependent",
    "driven",
    "efficient",
    "free",
    "grained",
    "independent",
    "level",
    "like",
    "modal",
    "order",
    "oriented",
    "related",
    "reviewed",
    "scale",
    "sensitive",
    "shot",
    "source",
    "specific",
    "step",
    "time",
    "type",
    "wise",
    "world",
];

pub(crate) fn default_compound_suffixes() -> Vec<String> {
    COMPOUND_SUFFIXES.iter().map(|s| s.to_string()).collect()
}

/// Expand common typographic ligatures found in PDFs.
pub fn expand_ligatures(text: &str) -> String {
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{FB05}', '\u{FB06}'], "st")
}

/// Collapse runs of whitespace (including newlines) to single spaces.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rejoin words broken across lines while preserving real hyphens.
///
/// - `"Proceed-\nings"` → `"Proceedings"` (syllable break)
/// - `"data-\ndriven"` → `"data-driven"` (compound word)
/// - `"100-\n120"`, `"Jean-\nPierre"` keep the hyphen
pub fn fix_hyphenation(text: &str) -> String {
    fix_hyphenation_with_config(text, &ParsingConfig::default())
}

/// Config-aware version of [`fix_hyphenation`].
pub(crate) fn fix_hyphenation_with_config(text: &str, config: &ParsingConfig) -> String {
    static RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)-\s+(\w)(\w*)").unwrap());

    let suffixes: HashSet<String> = config
        .compound_suffixes
        .resolve(&default_compound_suffixes())
        .into_iter()
        .map(|s| s.to_lowercase())
        .collect();

    RE.replace_all(text, |caps: &regex::Captures| {
        let before = &caps[1];
        let after_word = format!("{}{}", &caps[2], &caps[3]);

        // Page ranges, model numbers and hyphenated names
        let keep = before.chars().all(|c| c.is_ascii_digit())
            || caps[2].chars().all(|c| c.is_ascii_digit() || c.is_uppercase())
            || suffixes.contains(&after_word.to_lowercase());

        if keep {
            format!("{}-{}", before, after_word)
        } else {
            format!("{}{}", before, after_word)
        }
    })
    .into_owned()
}

/// Join the lines of one entry into a single normalized string.
pub(crate) fn join_entry_lines(raw: &str, config: &ParsingConfig) -> String {
    normalize_whitespace(&fix_hyphenation_with_config(&expand_ligatures(raw), config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_ligatures() {
        assert_eq!(expand_ligatures("ﬁnding ﬂow"), "finding flow");
        assert_eq!(expand_ligatures("eﬃcient oﬄine"), "efficient offline");
        assert_eq!(expand_ligatures("no ligatures here"), "no ligatures here");
    }

    #[test]
    fn test_fix_hyphenation_syllable_break() {
        assert_eq!(fix_hyphenation("Proceed-\nings"), "Proceedings");
        assert_eq!(fix_hyphenation("classi- fication"), "classification");
    }

    #[test]
    fn test_fix_hyphenation_keeps_real_hyphens() {
        assert_eq!(fix_hyphenation("data-\ndriven"), "data-driven");
        assert_eq!(fix_hyphenation("pp. 100-\n120"), "pp. 100-120");
        assert_eq!(fix_hyphenation("Jean-\nPierre"), "Jean-Pierre");
        assert_eq!(fix_hyphenation("peer- reviewed."), "peer-reviewed.");
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n b\t\tc  "), "a b c");
    }

    #[test]
    fn test_join_entry_lines() {
        let config = ParsingConfig::default();
        let raw = "[1] A. Smith, \"Deep Learn-\ning Basics,\" IEEE Trans.\n   Neural Netw., 2021.";
        assert_eq!(
            join_entry_lines(raw, &config),
            "[1] A. Smith, \"Deep Learning Basics,\" IEEE Trans. Neural Netw., 2021."
        );
    }

    #[test]
    fn test_fix_hyphenation_custom_suffix() {
        use crate::ParsingConfigBuilder;
        let config = ParsingConfigBuilder::new()
            .add_compound_suffix("powered".to_string())
            .build()
            .unwrap();
        assert_eq!(
            fix_hyphenation_with_config("AI- powered", &config),
            "AI-powered"
        );
        assert_eq!(
            fix_hyphenation_with_config("data- driven", &config),
            "data-driven"
        );

        let replaced = ParsingConfigBuilder::new()
            .set_compound_suffixes(vec!["powered".to_string()])
            .build()
            .unwrap();
        assert_eq!(
            fix_hyphenation_with_config("data- driven", &replaced),
            "datadriven"
        );
    }
}
