// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Quote store management and manipulation.
//!
//! The __quote store__ is an ordered list of quotes held in memory that acts as
//! the single source of truth for a session. Every mutation is mirrored to
//! persistent storage right away, so the persisted copy is always a snapshot
//! of the latest state. The persisted copy is only ever read once, when the
//! store is opened.
//!
//! # Persisted Layout
//!
//! The quote list is stored under the [`QUOTES_KEY`] key as:
//!
//! ```json
//! { "quotes": [...], "lastSaved": "2025-01-01T00:00:00Z", "version": "1.0" }
//! ```
//!
//! Besides the quote list, the store also keeps track of the last viewed quote
//! so a session can pick up where it left off, and of the last category filter
//! that the user chose.

use crate::{
    quote::{default_quotes, Quote, QuoteDraft, QuoteError, QuoteId, DEFAULT_CATEGORY},
    storage::{
        read_json, write_json, FileStorage, KeyValue, StorageError, CATEGORY_FILTER_KEY,
        LAST_VIEWED_KEY, QUOTES_KEY,
    },
};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashSet},
    fmt::{Display, Formatter, Result as FmtResult},
};
use tracing::{debug, error, info, instrument};

/// Version tag written into every persisted quote document.
pub const STORE_VERSION: &str = "1.0";

/// Filter value that matches every category.
pub const ALL_CATEGORIES: &str = "all";

/// Persisted snapshot of the quote list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQuotes {
    #[serde(default)]
    pub quotes: Vec<Quote>,
    #[serde(default, alias = "timestamp")]
    pub last_saved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: Option<String>,
}

/// Last viewed quote along with where it was viewed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastViewed {
    pub quote: Quote,
    pub context: String,
}

/// Ordered list of quotes mirrored to persistent storage.
#[derive(Debug)]
pub struct QuoteStore<S = FileStorage>
where
    S: KeyValue,
{
    storage: S,
    quotes: Vec<Quote>,
}

impl<S> QuoteStore<S>
where
    S: KeyValue,
{
    /// Open quote store backed by target storage.
    ///
    /// On first start the store is seeded with [`default_quotes`], which get
    /// persisted immediately. A persisted document that cannot be parsed is
    /// logged and replaced in memory with the default quotes, leaving the
    /// broken document untouched until the next mutation.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails.
    #[instrument(skip(storage), level = "debug")]
    pub fn open(storage: S) -> Result<Self> {
        let stored: Result<Option<StoredQuotes>, StorageError> = read_json(&storage, QUOTES_KEY);
        let store = match stored {
            Ok(Some(stored)) => {
                debug!("loaded {} quotes from storage", stored.quotes.len());
                Self {
                    storage,
                    quotes: stored.quotes,
                }
            }
            Ok(None) => {
                info!("no saved quotes found, seeding default quotes");
                let store = Self {
                    storage,
                    quotes: default_quotes(),
                };
                store.save()?;
                store
            }
            Err(StorageError::Json(error)) => {
                error!("saved quotes are unreadable, falling back to defaults: {error}");
                Self {
                    storage,
                    quotes: default_quotes(),
                }
            }
            Err(error) => return Err(error.into()),
        };

        Ok(store)
    }

    /// Persist current quote list.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn save(&self) -> Result<()> {
        let stored = StoredQuotes {
            quotes: self.quotes.clone(),
            last_saved: Some(Utc::now()),
            version: Some(STORE_VERSION.into()),
        };
        write_json(&self.storage, QUOTES_KEY, &stored)?;
        debug!("saved {} quotes", self.quotes.len());

        Ok(())
    }

    /// Underlying storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn quotes(&self) -> &[Quote] {
        &self.quotes
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }

    pub fn get(&self, id: &QuoteId) -> Option<&Quote> {
        self.quotes.iter().find(|quote| &quote.id == id)
    }

    /// Add new quote from user supplied draft.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Invalid`] if draft fails validation.
    /// - Return [`StoreError::Storage`] if storage backend fails.
    #[instrument(skip(self, draft), level = "debug")]
    pub fn add(&mut self, draft: QuoteDraft) -> Result<&Quote> {
        let quote = draft.into_quote()?;
        info!("add quote {} by {}", quote.id, quote.author);
        self.quotes.push(quote);
        self.save()?;

        Ok(&self.quotes[self.quotes.len() - 1])
    }

    /// Delete exactly one quote by identifier.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if no quote has target identifier.
    /// - Return [`StoreError::Storage`] if storage backend fails.
    #[instrument(skip(self), level = "debug")]
    pub fn delete(&mut self, id: &QuoteId) -> Result<Quote> {
        let index = self
            .quotes
            .iter()
            .position(|quote| &quote.id == id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let removed = self.quotes.remove(index);
        self.save()?;
        info!("deleted quote {} by {}", removed.id, removed.author);

        Ok(removed)
    }

    /// Delete exactly one quote by its 1-based position in the list.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::OutOfRange`] if position is not in the list.
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn delete_at(&mut self, position: usize) -> Result<Quote> {
        if position == 0 || position > self.quotes.len() {
            return Err(StoreError::OutOfRange(position, self.quotes.len()));
        }

        let id = self.quotes[position - 1].id.clone();
        self.delete(&id)
    }

    /// Remove every quote, and forget the last viewed quote.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails.
    #[instrument(skip(self), level = "debug")]
    pub fn clear(&mut self) -> Result<()> {
        info!("clear all {} quotes", self.quotes.len());
        self.quotes.clear();
        self.save()?;
        self.storage.remove(LAST_VIEWED_KEY)?;

        Ok(())
    }

    /// Append quotes in bulk, persisting once.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn extend(&mut self, quotes: impl IntoIterator<Item = Quote>) -> Result<usize> {
        let before = self.quotes.len();
        self.quotes.extend(quotes);
        self.save()?;

        Ok(self.quotes.len() - before)
    }

    /// Replace entire quote list, persisting once.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn replace_all(&mut self, quotes: Vec<Quote>) -> Result<()> {
        self.quotes = quotes;
        self.save()
    }

    /// Apply arbitrary in-place changes to the quote list, persisting once.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn update<F, T>(&mut self, change: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Quote>) -> T,
    {
        let output = change(&mut self.quotes);
        self.save()?;

        Ok(output)
    }

    /// Select quotes by category.
    ///
    /// Matching ignores case. The special value [`ALL_CATEGORIES`] selects
    /// every quote.
    pub fn filter(&self, category: &str) -> Vec<&Quote> {
        if category.eq_ignore_ascii_case(ALL_CATEGORIES) {
            return self.quotes.iter().collect();
        }

        self.quotes
            .iter()
            .filter(|quote| quote.in_category(category))
            .collect()
    }

    /// Select quotes by category, and remember the filter for next time.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn apply_filter(&self, category: &str) -> Result<Vec<&Quote>> {
        write_json(&self.storage, CATEGORY_FILTER_KEY, &category.to_lowercase())?;
        let selected = self.filter(category);
        debug!(
            "filtered quotes: {} out of {} total",
            selected.len(),
            self.quotes.len()
        );

        Ok(selected)
    }

    /// Last category filter chosen through [`Self::apply_filter`].
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn saved_filter(&self) -> Result<Option<String>> {
        Ok(read_json(&self.storage, CATEGORY_FILTER_KEY)?)
    }

    /// Sorted unique categories in lowercase.
    pub fn categories(&self) -> Vec<String> {
        self.quotes
            .iter()
            .map(|quote| match quote.category.trim() {
                "" => DEFAULT_CATEGORY.to_string(),
                category => category.to_lowercase(),
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Pick a random quote, and remember it as last viewed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Empty`] if there are no quotes.
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn random(&self) -> Result<&Quote> {
        let quote = self
            .quotes
            .choose(&mut rand::thread_rng())
            .ok_or(StoreError::Empty)?;
        self.remember(quote, "random")?;

        Ok(quote)
    }

    /// Pick a random quote from target category, and remember it as last
    /// viewed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::EmptyCategory`] if category holds no quotes.
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn random_in(&self, category: &str) -> Result<&Quote> {
        let selected = self.filter(category);
        let quote = selected
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or_else(|| StoreError::EmptyCategory(category.into()))?;
        self.remember(quote, &format!("category: {category}"))?;

        Ok(quote)
    }

    /// Show specific quote, and remember it as last viewed.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::NotFound`] if no quote has target identifier.
    /// - Return [`StoreError::Storage`] if storage backend fails.
    pub fn show(&self, id: &QuoteId) -> Result<&Quote> {
        let quote = self
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        self.remember(quote, &format!("specific: {id}"))?;

        Ok(quote)
    }

    /// Restore last viewed quote.
    ///
    /// An unreadable record is logged and treated as absent.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails to read.
    pub fn last_viewed(&self) -> Result<Option<LastViewed>> {
        match read_json(&self.storage, LAST_VIEWED_KEY) {
            Ok(last) => Ok(last),
            Err(StorageError::Json(error)) => {
                error!("cannot restore last viewed quote: {error}");
                Ok(None)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn remember(&self, quote: &Quote, context: &str) -> Result<()> {
        let last = LastViewed {
            quote: quote.clone(),
            context: context.into(),
        };
        write_json(&self.storage, LAST_VIEWED_KEY, &last)?;

        Ok(())
    }

    /// Verify integrity of quote data.
    ///
    /// Checks that every quote is well formed, that identifiers are unique,
    /// that text and author are not just whitespace, and that the persisted
    /// snapshot holds as many quotes as memory does.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Storage`] if storage backend fails to read.
    #[instrument(skip(self), level = "debug")]
    pub fn verify(&self) -> Result<IntegrityReport> {
        let structure_valid = self.quotes.iter().all(Quote::is_well_formed);

        let mut seen = HashSet::new();
        let ids_unique = self.quotes.iter().all(|quote| seen.insert(&quote.id));

        let data_consistent = self
            .quotes
            .iter()
            .all(|quote| !quote.text.trim().is_empty() && !quote.author.trim().is_empty());

        let storage_synced = match read_json::<StoredQuotes>(&self.storage, QUOTES_KEY) {
            Ok(Some(stored)) => stored.quotes.len() == self.quotes.len(),
            Ok(None) | Err(StorageError::Json(_)) => false,
            Err(error) => return Err(error.into()),
        };

        Ok(IntegrityReport {
            structure_valid,
            ids_unique,
            data_consistent,
            storage_synced,
        })
    }
}

/// Outcome of [`QuoteStore::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegrityReport {
    pub structure_valid: bool,
    pub ids_unique: bool,
    pub data_consistent: bool,
    pub storage_synced: bool,
}

impl IntegrityReport {
    pub fn all_valid(&self) -> bool {
        self.structure_valid && self.ids_unique && self.data_consistent && self.storage_synced
    }
}

impl Display for IntegrityReport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let verdict = |ok: bool| if ok { "VALID" } else { "INVALID" };
        writeln!(fmt, "quote structure: {}", verdict(self.structure_valid))?;
        writeln!(fmt, "id uniqueness:   {}", verdict(self.ids_unique))?;
        writeln!(fmt, "consistency:     {}", verdict(self.data_consistent))?;
        writeln!(
            fmt,
            "storage sync:    {}",
            if self.storage_synced { "SYNCED" } else { "OUT OF SYNC" }
        )?;
        write!(
            fmt,
            "overall:         {}",
            if self.all_valid() {
                "data integrity verified"
            } else {
                "data integrity issues found"
            }
        )
    }
}

/// All possible error types for quote store interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// User supplied quote is invalid.
    #[error(transparent)]
    Invalid(#[from] QuoteError),

    /// No quote has target identifier.
    #[error("no quote with id \"{0}\"")]
    NotFound(QuoteId),

    /// Position is outside of the quote list.
    #[error("no quote at position {0}, store holds {1} quotes")]
    OutOfRange(usize, usize),

    /// There are no quotes at all.
    #[error("no quotes available, add some quotes first")]
    Empty,

    /// There are no quotes in target category.
    #[error("no quotes found in category {0:?}")]
    EmptyCategory(String),
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn store_with(quotes: Vec<Quote>) -> anyhow::Result<QuoteStore<MemoryStorage>> {
        let mut store = QuoteStore::open(MemoryStorage::new())?;
        store.replace_all(quotes)?;
        Ok(store)
    }

    fn sample() -> Vec<Quote> {
        vec![
            Quote::new("t1", "First", "Ada", "Science"),
            Quote::new("t2", "Second", "Grace", "science"),
            Quote::new("t3", "Third", "Linus", "life"),
        ]
    }

    #[test]
    fn open_seeds_defaults_and_persists_them() -> anyhow::Result<()> {
        let storage = MemoryStorage::new();
        let store = QuoteStore::open(&storage)?;
        assert_eq!(store.quotes(), default_quotes().as_slice());

        let stored: StoredQuotes = read_json(&storage, QUOTES_KEY)?.unwrap();
        assert_eq!(stored.quotes.len(), 7);
        assert_eq!(stored.version.as_deref(), Some(STORE_VERSION));

        Ok(())
    }

    #[test]
    fn open_falls_back_to_defaults_on_malformed_document() -> anyhow::Result<()> {
        let storage = MemoryStorage::new();
        storage.set(QUOTES_KEY, "[this is not json")?;
        let store = QuoteStore::open(&storage)?;
        assert_eq!(store.len(), default_quotes().len());

        Ok(())
    }

    #[test]
    fn open_accepts_legacy_timestamp_field() -> anyhow::Result<()> {
        let storage = MemoryStorage::new();
        storage.set(
            QUOTES_KEY,
            concat!(
                r#"{"quotes":[{"id":"x","text":"t","author":"a","category":"c"}],"#,
                r#""timestamp":"2024-01-01T00:00:00Z"}"#,
            ),
        )?;
        let store = QuoteStore::open(&storage)?;
        assert_eq!(store.len(), 1);

        Ok(())
    }

    #[test]
    fn add_grows_by_one_and_survives_reopen() -> anyhow::Result<()> {
        let storage = MemoryStorage::new();
        let mut store = QuoteStore::open(&storage)?;
        let before = store.len();

        let added = store
            .add(QuoteDraft::new("Be curious.", "Marie").with_category("Science"))?
            .clone();
        assert_eq!(store.len(), before + 1);
        assert_eq!(added.category, "science");

        let reopened = QuoteStore::open(&storage)?;
        assert_eq!(reopened.len(), before + 1);
        assert_eq!(reopened.get(&added.id), Some(&added));

        Ok(())
    }

    #[test]
    fn add_rejects_invalid_draft_without_mutation() -> anyhow::Result<()> {
        let mut store = store_with(sample())?;
        let result = store.add(QuoteDraft::new("text", "  "));
        assert!(matches!(result, Err(StoreError::Invalid(QuoteError::EmptyAuthor))));
        assert_eq!(store.len(), 3);

        Ok(())
    }

    #[test]
    fn delete_removes_exactly_one_and_persists() -> anyhow::Result<()> {
        let storage = MemoryStorage::new();
        let mut store = QuoteStore::open(&storage)?;
        store.replace_all(sample())?;

        let removed = store.delete(&QuoteId::new("t2"))?;
        assert_eq!(removed.text, "Second");
        assert_eq!(store.len(), 2);

        let reopened = QuoteStore::open(&storage)?;
        let ids: Vec<_> = reopened.quotes().iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t3"]);

        Ok(())
    }

    #[test]
    fn delete_unknown_id_is_an_error() -> anyhow::Result<()> {
        let mut store = store_with(sample())?;
        let result = store.delete(&QuoteId::new("nope"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
        assert_eq!(store.len(), 3);

        Ok(())
    }

    #[test_case(0; "zero")]
    #[test_case(4; "past end")]
    #[test]
    fn delete_at_rejects_out_of_range(position: usize) -> anyhow::Result<()> {
        let mut store = store_with(sample())?;
        let result = store.delete_at(position);
        assert!(matches!(result, Err(StoreError::OutOfRange(_, 3))));

        Ok(())
    }

    #[test]
    fn delete_at_uses_one_based_positions() -> anyhow::Result<()> {
        let mut store = store_with(sample())?;
        let removed = store.delete_at(1)?;
        assert_eq!(removed.id, QuoteId::new("t1"));

        Ok(())
    }

    #[test]
    fn clear_persists_empty_list_and_forgets_last_viewed() -> anyhow::Result<()> {
        let storage = MemoryStorage::new();
        let mut store = QuoteStore::open(&storage)?;
        store.random()?;
        assert!(store.last_viewed()?.is_some());

        store.clear()?;
        assert!(store.is_empty());
        assert_eq!(store.last_viewed()?, None);

        let reopened = QuoteStore::open(&storage)?;
        assert!(reopened.is_empty());

        Ok(())
    }

    #[test_case("science", 2; "lowercase")]
    #[test_case("SCIENCE", 2; "uppercase")]
    #[test_case("Life", 1; "mixed case")]
    #[test_case("all", 3; "all")]
    #[test_case("ALL", 3; "all uppercase")]
    #[test_case("poetry", 0; "unknown")]
    #[test]
    fn filter_ignores_case(category: &str, expect: usize) -> anyhow::Result<()> {
        let store = store_with(sample())?;
        let selected = store.filter(category);
        pretty_assertions::assert_eq!(selected.len(), expect);
        if !category.eq_ignore_ascii_case(ALL_CATEGORIES) {
            assert!(selected.iter().all(|quote| quote.in_category(category)));
        }

        Ok(())
    }

    #[test]
    fn apply_filter_remembers_choice() -> anyhow::Result<()> {
        let store = store_with(sample())?;
        assert_eq!(store.saved_filter()?, None);
        store.apply_filter("Science")?;
        assert_eq!(store.saved_filter()?, Some("science".to_string()));

        Ok(())
    }

    #[test]
    fn categories_are_sorted_unique_and_lowercase() -> anyhow::Result<()> {
        let mut quotes = sample();
        quotes.push(Quote::new("t4", "Fourth", "Anon", ""));
        let store = store_with(quotes)?;
        assert_eq!(store.categories(), vec!["life", "science", "uncategorized"]);

        Ok(())
    }

    #[test]
    fn random_in_picks_from_category_and_is_remembered() -> anyhow::Result<()> {
        let store = store_with(sample())?;
        let quote = store.random_in("LIFE")?.clone();
        assert_eq!(quote.id, QuoteId::new("t3"));

        let last = store.last_viewed()?.unwrap();
        assert_eq!(last.quote, quote);
        assert_eq!(last.context, "category: LIFE");

        Ok(())
    }

    #[test]
    fn random_on_empty_store_is_an_error() -> anyhow::Result<()> {
        let store = store_with(Vec::new())?;
        assert!(matches!(store.random(), Err(StoreError::Empty)));
        assert!(matches!(
            store.random_in("life"),
            Err(StoreError::EmptyCategory(_))
        ));

        Ok(())
    }

    #[test]
    fn verify_flags_duplicate_ids() -> anyhow::Result<()> {
        let mut quotes = sample();
        quotes.push(Quote::new("t1", "Again", "Ada", "science"));
        let store = store_with(quotes)?;
        let report = store.verify()?;

        assert!(report.structure_valid);
        assert!(!report.ids_unique);
        assert!(report.data_consistent);
        assert!(report.storage_synced);
        assert!(!report.all_valid());

        Ok(())
    }

    #[test]
    fn update_persists_in_place_changes() -> anyhow::Result<()> {
        let storage = MemoryStorage::new();
        let mut store = QuoteStore::open(&storage)?;
        store.replace_all(sample())?;
        store.update(|quotes| quotes[0].text = "Changed".into())?;

        let reopened = QuoteStore::open(&storage)?;
        assert_eq!(reopened.quotes()[0].text, "Changed");

        Ok(())
    }
}
