//! Keyword corpora used by the post classifier
//!
//! Everything here is data: literal lists and regex sources are compiled once
//! into immutable sets at construction.

use regex::RegexSet;
use std::collections::HashSet;

use crate::models::VtuberProfile;

pub const BASELINE_TEXT_KEYWORDS: &[&str] = &[
    "vtuber",
    "vtubeuse",
    "vtubeur",
    "vtubing",
    "vtubbing",
    "vtb",
    "vtuberfr",
    "frvtuber",
    "frvtubers",
    "vtuber fr",
    "vtubeuse fr",
    "vtubeur fr",
    "vtuber français",
    "vtuber francaise",
    "vtuber française",
    "vtuber qc",
    "vtuberqc",
    "qcvtuber",
    "vtbfr",
];

pub const BASELINE_REGEX_KEYWORDS: &[&str] = &[
    r"(?i)\bvtuberfr\b",
    r"(?i)\bfrvtubers\b",
    r"(?i)\bfrvtuber\b",
    r"(?i)\bvtubersfr\b",
    r"(?i)\bvtuberqc\b",
    r"(?i)\bqcvtuber\b",
    r"(?i)\bvtubeurfr\b",
    r"(?i)\bvtubeusefr\b",
    r"(?i)\bvtbfr\b",
];

pub const FRENCH_SIGNAL_STRINGS: &[&str] = &[
    "frvtuber",
    "frvtubers",
    "fr vtuber",
    "vtuber fr",
    "vtubeur",
    "vtubeuse",
    "vtbfr",
    "vtuber français",
    "vtuber francaise",
    "vtuber française",
    "vtubeur fr",
    "vtubeuse fr",
    "qcvtuber",
    "vtuberqc",
    "#frvtuber",
    "#frvtubers",
    "#vtuberfr",
    "#vtbfr",
    "#qcvtuber",
    "#vtuberqc",
];

pub const FRENCH_SIGNAL_REGEXES: &[&str] = &[
    r"(?i)\bfr[\s\-]?vtubers?\b",
    r"(?i)\bvtuber[\s\-]?fr\b",
    r"(?i)\bvtubeurs?\b",
    r"(?i)\bvtubeuses?\b",
    r"(?i)\bqcvtubers?\b",
    r"(?i)\bvtuberqc\b",
    r"(?i)\bvtuber\s*français\b",
    r"(?i)\bvtuber\s*francaise\b",
    r"(?i)\bvtuber\s*française\b",
];

/// Substrings that disqualify a post outright
pub const EXCLUDED_TEXT_KEYWORDS: &[&str] = &["ririmiaou", "ririgaki", "ai generated", "genai"];

/// Literal substrings plus a compiled regex set
#[derive(Debug, Clone)]
pub struct TermMatcher {
    literals: Vec<String>,
    patterns: RegexSet,
}

impl TermMatcher {
    pub fn new<I, S>(literals: I, patterns: &[&str]) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let literals = literals
            .into_iter()
            .map(|term| term.as_ref().trim().to_lowercase())
            .filter(|term| !term.is_empty())
            .filter(|term| seen.insert(term.clone()))
            .collect();

        Ok(Self {
            literals,
            patterns: RegexSet::new(patterns)?,
        })
    }

    /// `lowered` must be the lower-cased form of `text`; literals are matched
    /// against it, regexes against the original text.
    pub fn is_match(&self, text: &str, lowered: &str) -> bool {
        self.literals.iter().any(|term| lowered.contains(term.as_str()))
            || self.patterns.is_match(text)
    }

    pub fn literals(&self) -> &[String] {
        &self.literals
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

/// Topic keywords, French markers and the exclusion denylist
#[derive(Debug, Clone)]
pub struct KeywordCorpus {
    topic: TermMatcher,
    french_signal: TermMatcher,
    excluded: Vec<String>,
}

impl KeywordCorpus {
    /// Baseline corpus merged with the `matched_terms` of every catalog profile
    pub fn from_profiles<'a, I>(profiles: I) -> Self
    where
        I: IntoIterator<Item = &'a VtuberProfile>,
    {
        let catalog_terms: Vec<String> = profiles
            .into_iter()
            .flat_map(|profile| profile.matched_terms.iter().cloned())
            .collect();

        let literals = BASELINE_TEXT_KEYWORDS
            .iter()
            .map(|term| term.to_string())
            .chain(catalog_terms);

        Self {
            topic: TermMatcher::new(literals, BASELINE_REGEX_KEYWORDS)
                .expect("Baseline keyword patterns are valid"),
            french_signal: TermMatcher::new(FRENCH_SIGNAL_STRINGS.iter(), FRENCH_SIGNAL_REGEXES)
                .expect("French signal patterns are valid"),
            excluded: EXCLUDED_TEXT_KEYWORDS
                .iter()
                .map(|term| term.to_string())
                .collect(),
        }
    }

    pub fn baseline() -> Self {
        Self::from_profiles(std::iter::empty())
    }

    pub fn has_keyword_match(&self, text: &str, lowered: &str) -> bool {
        self.topic.is_match(text, lowered)
    }

    pub fn has_french_signal(&self, text: &str, lowered: &str) -> bool {
        !text.is_empty() && self.french_signal.is_match(text, lowered)
    }

    pub fn has_excluded_keyword(&self, lowered: &str) -> bool {
        self.excluded.iter().any(|term| lowered.contains(term.as_str()))
    }

    pub fn topic_keywords(&self) -> &[String] {
        self.topic.literals()
    }
}

impl Default for KeywordCorpus {
    fn default() -> Self {
        Self::baseline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(corpus: &KeywordCorpus, text: &str) -> bool {
        corpus.has_keyword_match(text, &text.to_lowercase())
    }

    #[test]
    fn test_catalog_terms_are_merged_and_deduplicated() {
        let mut profile = VtuberProfile::bare("did:plc:a", Some("a.bsky.social"));
        profile.matched_terms = vec!["Live Dessin".into(), "vtuber".into(), " ".into()];

        let corpus = KeywordCorpus::from_profiles([&profile]);
        let keywords = corpus.topic_keywords();

        assert_eq!(keywords.iter().filter(|k| *k == "vtuber").count(), 1);
        assert!(keywords.contains(&"live dessin".to_string()));
        assert_eq!(keywords.len(), BASELINE_TEXT_KEYWORDS.len() + 1);
        assert!(check(&corpus, "Ce soir LIVE DESSIN sur twitch"));
    }

    #[test]
    fn test_literal_and_regex_matching() {
        let corpus = KeywordCorpus::baseline();
        assert!(check(&corpus, "vtuberfr stream starting"));
        assert!(check(&corpus, "Nouvelle #VTuberFR en ligne"));
        assert!(!check(&corpus, "just a random update"));
    }

    #[test]
    fn test_french_signal() {
        let corpus = KeywordCorpus::baseline();
        let signal = |t: &str| corpus.has_french_signal(t, &t.to_lowercase());

        assert!(signal("New FR-VTuber debut tonight"));
        assert!(signal("proud vtubeuse here"));
        assert!(signal("#QCVtuber"));
        assert!(!signal("vtuber streaming in english"));
        assert!(!signal(""));
    }

    #[test]
    fn test_excluded_keywords() {
        let corpus = KeywordCorpus::baseline();
        assert!(corpus.has_excluded_keyword("this art is ai generated"));
        assert!(corpus.has_excluded_keyword("#genai vtuber"));
        assert!(!corpus.has_excluded_keyword("hand drawn vtuber art"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let result = TermMatcher::new(["a"], &["(unclosed"]);
        assert!(result.is_err());
    }
}
