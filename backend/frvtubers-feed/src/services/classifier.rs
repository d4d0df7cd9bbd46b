use chrono::{SecondsFormat, Utc};

use crate::models::{CreateOp, PostRecord};
use crate::registry::{KeywordCorpus, RegistrySnapshot, PRIORITY_UNKNOWN};

/// Declared languages that count as an allowed-language signal
const ALLOWED_LANGUAGES: &[&str] = &["fr", "en"];

/// Signals extracted from one post
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostSignals {
    pub has_french_lang: bool,
    pub has_english_lang: bool,
    pub has_french_markers: bool,
    pub has_excluded_keyword: bool,
    pub has_keyword_match: bool,
    pub has_allowed_language: bool,
}

impl PostSignals {
    pub fn extract(keywords: &KeywordCorpus, text: &str, langs: &[String]) -> Self {
        let lowered = text.to_lowercase();
        let langs: Vec<String> = langs.iter().map(|l| l.to_lowercase()).collect();

        Self {
            has_french_lang: langs.iter().any(|l| l == "fr"),
            has_english_lang: langs.iter().any(|l| l == "en"),
            has_french_markers: keywords.has_french_signal(text, &lowered),
            has_excluded_keyword: keywords.has_excluded_keyword(&lowered),
            has_keyword_match: keywords.has_keyword_match(text, &lowered),
            has_allowed_language: langs.iter().any(|l| ALLOWED_LANGUAGES.contains(&l.as_str())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ExcludedKeyword,
    EnglishWithoutFrenchSignal,
    /// Unknown author without both an allowed language and a keyword
    UnknownAuthorMissingSignals,
    /// Known author with neither a keyword nor an allowed language
    KnownAuthorNoSignal,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::ExcludedKeyword => "excluded_keyword",
            RejectReason::EnglishWithoutFrenchSignal => "english_no_fr_signal",
            RejectReason::UnknownAuthorMissingSignals => "unknown_author_missing_signals",
            RejectReason::KnownAuthorNoSignal => "known_author_no_signal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept { priority: u8 },
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept { .. })
    }
}

/// Keep/drop decision for newly created posts
#[derive(Debug, Clone)]
pub struct PostClassifier {
    english_exclusion: bool,
}

impl PostClassifier {
    pub fn new(english_exclusion: bool) -> Self {
        Self { english_exclusion }
    }

    /// Pure decision from an author tier and the post signals
    pub fn decide(&self, priority: u8, signals: &PostSignals) -> Verdict {
        if signals.has_excluded_keyword {
            return Verdict::Reject(RejectReason::ExcludedKeyword);
        }

        if self.english_exclusion
            && signals.has_english_lang
            && !signals.has_french_lang
            && !signals.has_french_markers
        {
            return Verdict::Reject(RejectReason::EnglishWithoutFrenchSignal);
        }

        if priority == PRIORITY_UNKNOWN {
            if !signals.has_allowed_language || !signals.has_keyword_match {
                return Verdict::Reject(RejectReason::UnknownAuthorMissingSignals);
            }
        } else if !signals.has_keyword_match && !signals.has_allowed_language {
            return Verdict::Reject(RejectReason::KnownAuthorNoSignal);
        }

        Verdict::Accept { priority }
    }

    pub fn classify(
        &self,
        registry: &RegistrySnapshot,
        keywords: &KeywordCorpus,
        create: &CreateOp,
    ) -> Verdict {
        let priority = registry.priority_of(&create.author);
        let text = create.record.text.as_deref().unwrap_or_default();
        let langs = create.record.langs.as_deref().unwrap_or_default();

        let signals = PostSignals::extract(keywords, text, langs);
        self.decide(priority, &signals)
    }
}

/// Record persisted for an accepted post, stamped with the current time
pub fn accepted_record(create: &CreateOp, priority: u8) -> PostRecord {
    PostRecord {
        uri: create.uri.clone(),
        cid: create.cid.clone(),
        author: create.author.clone(),
        priority: i16::from(priority),
        indexed_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostContent, VtuberProfile};
    use crate::registry::{ManualOverrides, VtuberCatalog, VtuberRegistry};

    fn registry() -> VtuberRegistry {
        let mut team = VtuberProfile::bare("did:plc:team", Some("team.bsky.social"));
        team.is_fr_vtubers_team = true;
        let known = VtuberProfile::bare("did:plc:known", Some("known.bsky.social"));

        VtuberRegistry::new(
            VtuberCatalog {
                generated_at: None,
                profiles: vec![team, known],
                team: None,
            },
            ManualOverrides::default(),
        )
    }

    fn create(author: &str, text: &str, langs: &[&str]) -> CreateOp {
        CreateOp {
            uri: format!("at://{}/app.bsky.feed.post/1", author),
            cid: "bafy".into(),
            author: author.into(),
            record: PostContent {
                text: Some(text.into()),
                langs: Some(langs.iter().map(|l| l.to_string()).collect()),
            },
        }
    }

    fn classify(classifier: &PostClassifier, op: &CreateOp) -> Verdict {
        let registry = registry();
        classifier.classify(&registry.current(), registry.keywords(), op)
    }

    #[test]
    fn test_team_post_without_keyword_is_accepted() {
        let verdict = classify(
            &PostClassifier::new(false),
            &create("did:plc:team", "hello", &["en"]),
        );
        assert_eq!(verdict, Verdict::Accept { priority: 2 });
    }

    #[test]
    fn test_unknown_author_without_keyword_is_rejected() {
        let verdict = classify(
            &PostClassifier::new(true),
            &create("did:plc:stranger", "just a random update", &["en"]),
        );
        assert!(!verdict.is_accept());
    }

    #[test]
    fn test_unknown_author_with_keyword_and_french() {
        let verdict = classify(
            &PostClassifier::new(true),
            &create("did:plc:stranger", "vtuberfr stream starting", &["fr"]),
        );
        assert_eq!(verdict, Verdict::Accept { priority: 0 });
    }

    #[test]
    fn test_unknown_author_needs_declared_language() {
        let verdict = classify(
            &PostClassifier::new(true),
            &create("did:plc:stranger", "vtuberfr stream starting", &[]),
        );
        assert_eq!(
            verdict,
            Verdict::Reject(RejectReason::UnknownAuthorMissingSignals)
        );
    }

    #[test]
    fn test_excluded_keyword_rejects_team_posts_too() {
        let verdict = classify(
            &PostClassifier::new(true),
            &create("did:plc:team", "new AI generated vtuber art", &["fr"]),
        );
        assert_eq!(verdict, Verdict::Reject(RejectReason::ExcludedKeyword));
    }

    #[test]
    fn test_english_exclusion_is_configurable() {
        let op = create("did:plc:known", "stream tonight", &["en"]);

        assert_eq!(
            classify(&PostClassifier::new(true), &op),
            Verdict::Reject(RejectReason::EnglishWithoutFrenchSignal)
        );
        assert_eq!(
            classify(&PostClassifier::new(false), &op),
            Verdict::Accept { priority: 1 }
        );
    }

    #[test]
    fn test_french_markers_lift_english_exclusion() {
        let op = create("did:plc:stranger", "new #FRVtuber model reveal!", &["en"]);
        assert_eq!(
            classify(&PostClassifier::new(true), &op),
            Verdict::Accept { priority: 0 }
        );
    }

    #[test]
    fn test_known_author_needs_one_signal() {
        let classifier = PostClassifier::new(true);
        assert_eq!(
            classify(&classifier, &create("did:plc:known", "bonjour", &[])),
            Verdict::Reject(RejectReason::KnownAuthorNoSignal)
        );
        assert_eq!(
            classify(&classifier, &create("did:plc:known", "bonjour", &["fr"])),
            Verdict::Accept { priority: 1 }
        );
        assert_eq!(
            classify(&classifier, &create("did:plc:known", "vtubing time", &[])),
            Verdict::Accept { priority: 1 }
        );
    }

    #[test]
    fn test_missing_record_fields() {
        let op = CreateOp {
            uri: "at://did:plc:team/app.bsky.feed.post/2".into(),
            cid: "bafy".into(),
            author: "did:plc:team".into(),
            record: PostContent::default(),
        };
        assert_eq!(
            classify(&PostClassifier::new(true), &op),
            Verdict::Reject(RejectReason::KnownAuthorNoSignal)
        );
    }

    #[test]
    fn test_accepted_record() {
        let op = create("did:plc:team", "hello", &["fr"]);
        let record = accepted_record(&op, 2);
        assert_eq!(record.priority, 2);
        assert_eq!(record.uri, op.uri);
        assert!(record.indexed_at.ends_with('Z'));
    }
}
