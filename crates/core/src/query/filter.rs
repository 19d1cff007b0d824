//! Search filter combining search, ignore and translation rules.

use std::sync::LazyLock;

use regex::Regex;

use super::{Expression, fold};

/// Matches titles of translated variants: `/fr`, `/pt-br`, `/zh-hans`, `/zh-hant`.
static TRANSLATION_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)/([a-z]{2}|pt-br|zh-hans|zh-hant)$").expect("static pattern"));

/// The default translated-variant title pattern.
pub fn translation_pattern() -> &'static Regex {
    &TRANSLATION_SUFFIX
}

/// Outcome of checking one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Match,
    NoMatch,
    /// An ignore expression matched; search terms were not consulted.
    Ignored,
    /// The title names a translated variant.
    Translation,
}

/// Search expressions (any may match) minus ignore expressions (any excludes).
#[derive(Debug, Clone)]
pub struct SearchQuery {
    search: Vec<Expression>,
    ignore: Vec<Expression>,
    case_sensitive: bool,
    skip_translations: Option<Regex>,
}

impl SearchQuery {
    /// Build a query; expressions are parsed with [`Expression::parse`].
    pub fn new<S: AsRef<str>>(search: &[S], ignore: &[S], case_sensitive: bool) -> Self {
        let prepare = |sources: &[S]| -> Vec<Expression> {
            sources
                .iter()
                .map(|s| Expression::parse(s.as_ref()))
                .filter(|e| !e.is_empty())
                .map(|e| if case_sensitive { e } else { e.folded() })
                .collect()
        };
        Self { search: prepare(search), ignore: prepare(ignore), case_sensitive, skip_translations: None }
    }

    /// Exclude translated variants using the default suffix pattern.
    pub fn skip_translations(self) -> Self {
        self.skip_titles_matching(TRANSLATION_SUFFIX.clone())
    }

    /// Exclude any title matching `pattern`, independent of text.
    pub fn skip_titles_matching(mut self, pattern: Regex) -> Self {
        self.skip_translations = Some(pattern);
        self
    }

    pub fn has_search_terms(&self) -> bool {
        !self.search.is_empty()
    }

    pub fn evaluate(&self, title: &str, text: &str) -> Decision {
        if let Some(pattern) = &self.skip_translations
            && pattern.is_match(title)
        {
            return Decision::Translation;
        }

        let text = fold(text, self.case_sensitive);

        if self.ignore.iter().any(|e| e.matches_exact(&text)) {
            return Decision::Ignored;
        }
        if self.search.iter().any(|e| e.matches_exact(&text)) {
            return Decision::Match;
        }
        Decision::NoMatch
    }

    pub fn is_match(&self, title: &str, text: &str) -> bool {
        self.evaluate(title, text) == Decision::Match
    }
}
