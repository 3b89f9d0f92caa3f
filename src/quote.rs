// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Quote records.
//!
//! A __quote__ is the only durable entity Quotebook knows about. It is a
//! simple text, author, and category tuple identified by a best-effort unique
//! identifier. Quotes are created by the user, by importing a JSON document,
//! or by relabeling data fetched from the remote endpoint during sync.
//!
//! # Identifiers
//!
//! Identifiers are generated from the current timestamp plus a short random
//! suffix. Uniqueness is never enforced, only verified on request through
//! [`QuoteStore::verify`](crate::store::QuoteStore::verify). Quotes that came
//! from older exports may carry numeric identifiers, which are accepted and
//! converted into their textual form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Category assigned to quotes that were given none.
pub const DEFAULT_CATEGORY: &str = "uncategorized";

/// Identifier of a quote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct QuoteId(String);

impl QuoteId {
    /// Construct identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh timestamp based identifier.
    pub fn generate() -> Self {
        Self(format!(
            "q_{}_{:04x}",
            Utc::now().timestamp_millis(),
            rand::random::<u16>()
        ))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for QuoteId {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(&self.0)
    }
}

impl From<&str> for QuoteId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for QuoteId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl<'de> Deserialize<'de> for QuoteId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Integer(i64),
            Float(f64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(text) => Self(text),
            RawId::Integer(number) => Self(number.to_string()),
            RawId::Float(number) => Self(number.to_string()),
        })
    }
}

/// Where a quote originally came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSource {
    Local,
    Server,
}

/// A single quote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub id: QuoteId,
    pub text: String,
    pub author: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<QuoteSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_from: Option<Vec<QuoteId>>,
}

impl Quote {
    /// Construct new local quote without any sync metadata.
    pub fn new(
        id: impl Into<QuoteId>,
        text: impl Into<String>,
        author: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            author: author.into(),
            category: category.into(),
            last_modified: None,
            source: None,
            server_id: None,
            merged_from: None,
        }
    }

    /// Check if quote came from the remote endpoint.
    pub fn is_from_server(&self) -> bool {
        matches!(self.source, Some(QuoteSource::Server))
    }

    /// Check if quote belongs to target category, ignoring case.
    pub fn in_category(&self, category: &str) -> bool {
        self.category.to_lowercase() == category.to_lowercase()
    }

    /// Check if quote and another record describe the same logical quote.
    ///
    /// Two records are the same when they share an identifier, or when both
    /// carry the same server identifier.
    pub fn same_identity(&self, other: &Quote) -> bool {
        self.id == other.id
            || matches!((self.server_id, other.server_id), (Some(lhs), Some(rhs)) if lhs == rhs)
    }

    /// Check if the text, author, or category differ from another record.
    pub fn content_differs(&self, other: &Quote) -> bool {
        self.text != other.text || self.author != other.author || self.category != other.category
    }

    /// Check if all required fields are present.
    pub fn is_well_formed(&self) -> bool {
        !self.id.as_str().is_empty()
            && !self.text.is_empty()
            && !self.author.is_empty()
            && !self.category.is_empty()
    }
}

impl Display for Quote {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "\"{}\"\n  - {} [{}] ({})",
            self.text, self.author, self.category, self.id
        )
    }
}

/// User supplied data for a new quote.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QuoteDraft {
    pub text: String,
    pub author: String,
    pub category: Option<String>,
}

impl QuoteDraft {
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Validate draft and turn it into a quote with a fresh identifier.
    ///
    /// Text and author are trimmed and must not be empty. Category is trimmed
    /// and lowercased, falling back to [`DEFAULT_CATEGORY`] when empty.
    ///
    /// # Errors
    ///
    /// - Return [`QuoteError::EmptyText`] if text is blank.
    /// - Return [`QuoteError::EmptyAuthor`] if author is blank.
    pub fn into_quote(self) -> Result<Quote> {
        let text = self.text.trim();
        if text.is_empty() {
            return Err(QuoteError::EmptyText);
        }

        let author = self.author.trim();
        if author.is_empty() {
            return Err(QuoteError::EmptyAuthor);
        }

        let category = self
            .category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .map(str::to_lowercase)
            .unwrap_or_else(default_category);

        Ok(Quote::new(QuoteId::generate(), text, author, category))
    }
}

pub(crate) fn default_category() -> String {
    DEFAULT_CATEGORY.into()
}

/// Quotes used to seed an empty store on first start.
pub fn default_quotes() -> Vec<Quote> {
    [
        ("The only way to do great work is to love what you do.", "Steve Jobs", "motivation"),
        ("Innovation distinguishes between a leader and a follower.", "Steve Jobs", "innovation"),
        ("Life is what happens while you're making other plans.", "John Lennon", "life"),
        (
            "The future belongs to those who believe in their dreams.",
            "Eleanor Roosevelt",
            "dreams",
        ),
        ("Focus on the light during dark moments.", "Aristotle", "wisdom"),
        (
            concat!(
                "Success is not final, failure is not fatal: ",
                "it is the courage to continue that counts."
            ),
            "Winston Churchill",
            "courage",
        ),
        (
            "The best time to plant a tree was 20 years ago. The second best time is now.",
            "Chinese Proverb",
            "action",
        ),
    ]
    .into_iter()
    .enumerate()
    .map(|(index, (text, author, category))| {
        Quote::new(format!("default_{}", index + 1), text, author, category)
    })
    .collect()
}

/// Quote validation errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    /// Quote text is blank.
    #[error("quote text must not be empty")]
    EmptyText,

    /// Quote author is blank.
    #[error("quote author must not be empty")]
    EmptyAuthor,
}

/// Friendly result alias :3
type Result<T, E = QuoteError> = std::result::Result<T, E>;
