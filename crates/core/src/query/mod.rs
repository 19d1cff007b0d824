//! Boolean substring queries over page text.
//!
//! ### Grammar
//! - An expression is an OR of clauses separated by `~OR~`.
//! - A clause is an AND of terms separated by `~AND~`.
//! - A term is a literal substring. Surrounding whitespace is trimmed and
//!   empty terms are dropped.
//! - `\n` and `/n` inside a term stand for a line break.
//!
//! ### Evaluation
//! - OR succeeds if any clause succeeds; a clause succeeds if every term is a
//!   substring of the text.
//! - Without case sensitivity both sides are lowercased.
//! - An expression with no terms never matches.

pub mod filter;

pub use filter::{Decision, SearchQuery, translation_pattern};

use std::borrow::Cow;
use std::convert::Infallible;
use std::str::FromStr;

const OR: &str = "~OR~";
const AND: &str = "~AND~";

/// Replace the two-character escapes `\n` and `/n` with a line break.
pub fn decode_multiline(term: &str) -> String {
    term.replace("\\n", "\n").replace("/n", "\n")
}

/// A parsed `~OR~` / `~AND~` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    /// Outer vec is OR, inner vec is AND.
    clauses: Vec<Vec<String>>,
}

impl Expression {
    pub fn parse(source: &str) -> Self {
        let clauses = source
            .split(OR)
            .map(|clause| {
                clause
                    .split(AND)
                    .map(str::trim)
                    .filter(|term| !term.is_empty())
                    .map(decode_multiline)
                    .collect::<Vec<_>>()
            })
            .filter(|terms| !terms.is_empty())
            .collect();
        Self { clauses }
    }

    /// True when the expression has no terms and therefore never matches.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Copy of the expression with every term lowercased.
    pub fn folded(&self) -> Self {
        Self {
            clauses: self
                .clauses
                .iter()
                .map(|terms| terms.iter().map(|t| t.to_lowercase()).collect())
                .collect(),
        }
    }

    /// Evaluate against `text`.
    pub fn matches(&self, text: &str, case_sensitive: bool) -> bool {
        if case_sensitive {
            self.matches_exact(text)
        } else {
            self.folded().matches_exact(&text.to_lowercase())
        }
    }

    /// Evaluate with no case folding on either side.
    pub(crate) fn matches_exact(&self, text: &str) -> bool {
        self.clauses
            .iter()
            .any(|terms| terms.iter().all(|term| text.contains(term.as_str())))
    }
}

impl FromStr for Expression {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Parse and evaluate in one step.
pub fn evaluate(expression: &str, text: &str, case_sensitive: bool) -> bool {
    Expression::parse(expression).matches(text, case_sensitive)
}

/// Lowercase `text` unless matching is case sensitive.
pub(crate) fn fold(text: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive { Cow::Borrowed(text) } else { Cow::Owned(text.to_lowercase()) }
}
