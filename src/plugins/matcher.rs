//! Text classification capability shared by the analyzer, the enforcer and
//! the vindication checker.
//!
//! Call sites depend only on [`TextClassifier::classify`]; the default
//! [`KeywordSet`] is plain case-insensitive substring matching (no stemming,
//! no negation).

use regex::Regex;
use std::sync::OnceLock;

pub trait TextClassifier {
    /// Return the subset of this classifier's terms found in `text`.
    fn classify(&self, text: &str) -> Vec<String>;

    fn matches(&self, text: &str) -> bool {
        !self.classify(text).is_empty()
    }
}

/// Ordered, de-duplicated keyword list matched as lowercase substrings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: Vec<String>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = KeywordSet::default();
        for k in keywords {
            set.insert(k.as_ref());
        }
        set
    }

    /// Add a keyword; blanks and case-insensitive duplicates are ignored.
    pub fn insert(&mut self, keyword: &str) {
        let k = keyword.trim().to_lowercase();
        if k.is_empty() || self.keywords.contains(&k) {
            return;
        }
        self.keywords.push(k);
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}

impl TextClassifier for KeywordSet {
    fn classify(&self, text: &str) -> Vec<String> {
        let haystack = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|k| haystack.contains(k.as_str()))
            .cloned()
            .collect()
    }
}

fn double_quoted_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""([^"\n]+)""#).expect("static regex"))
}

fn single_quoted_re() -> &'static Regex {
    // Requires a non-word char (or start) before the opening quote so that
    // apostrophes inside words ("don't") are not taken as quotes.
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[^\w])'([^'\n]+)'").expect("static regex"))
}

fn backtick_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`([^`\n]+)`").expect("static regex"))
}

/// Substrings enclosed in double or single quotes, in order of appearance.
pub fn quoted_spans(text: &str) -> Vec<String> {
    let mut out: Vec<(usize, String)> = Vec::new();
    for cap in double_quoted_re().captures_iter(text) {
        if let Some(m) = cap.get(1) {
            out.push((m.start(), m.as_str().to_string()));
        }
    }
    for cap in single_quoted_re().captures_iter(text) {
        if let Some(m) = cap.get(1) {
            out.push((m.start(), m.as_str().to_string()));
        }
    }
    out.sort_by_key(|(pos, _)| *pos);
    out.into_iter().map(|(_, s)| s).collect()
}

/// Substrings enclosed in backticks, in order of appearance.
pub fn backtick_spans(text: &str) -> Vec<String> {
    backtick_re()
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}
