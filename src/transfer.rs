// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Import and export of quote collections.
//!
//! Quotes can be exported into a standalone JSON document, and imported back
//! from one. Exported documents have the following layout:
//!
//! ```json
//! { "quotes": [...], "exportDate": "...", "totalQuotes": 3, "categories": [...] }
//! ```
//!
//! Imports are more forgiving. Either an object with a `quotes` array, or a
//! bare array of quotes is accepted. Missing identifiers are generated, and
//! missing categories become `uncategorized`. Anything malformed rejects the
//! whole import, so the store is never left partially mutated.

use crate::{
    quote::{default_category, Quote, QuoteId, QuoteSource},
    storage::KeyValue,
    store::{QuoteStore, StoreError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Exported quote collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub quotes: Vec<Quote>,
    pub export_date: DateTime<Utc>,
    pub total_quotes: usize,
    pub categories: Vec<String>,
}

impl ExportDocument {
    /// Snapshot current contents of quote store.
    ///
    /// # Errors
    ///
    /// - Return [`TransferError::NothingToExport`] if store is empty.
    pub fn from_store<S: KeyValue>(store: &QuoteStore<S>, now: DateTime<Utc>) -> Result<Self> {
        if store.is_empty() {
            return Err(TransferError::NothingToExport);
        }

        Ok(Self {
            quotes: store.quotes().to_vec(),
            export_date: now,
            total_quotes: store.len(),
            categories: store.categories(),
        })
    }

    /// Render document as pretty printed JSON.
    ///
    /// # Errors
    ///
    /// - Return [`TransferError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Default file name for an export made at target time.
pub fn default_export_name(now: DateTime<Utc>) -> String {
    format!("my-quotes-{}.json", now.format("%Y-%m-%d"))
}

/// Export quote store to target file.
///
/// When no path is given, the file is named by [`default_export_name`] in the
/// current directory. Returns the path written to.
///
/// # Errors
///
/// - Return [`TransferError::NothingToExport`] if store is empty.
/// - Return [`TransferError::Io`] if file cannot be written.
#[instrument(skip(store), level = "debug")]
pub fn export_to<S: KeyValue>(store: &QuoteStore<S>, path: Option<&Path>) -> Result<PathBuf> {
    let now = Utc::now();
    let document = ExportDocument::from_store(store, now)?;
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(default_export_name(now)),
    };

    fs::write(&path, document.to_json()?)?;
    info!("exported {} quotes to {}", document.total_quotes, path.display());

    Ok(path)
}

/// How imported quotes are combined with existing ones.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Add imported quotes after existing ones.
    #[default]
    Append,

    /// Discard existing quotes in favor of imported ones.
    Replace,
}

/// Quote as found in an import document, before defaults are filled in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportedQuote {
    #[serde(default)]
    id: Option<QuoteId>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    author: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    source: Option<QuoteSource>,
    #[serde(default)]
    server_id: Option<u64>,
    #[serde(default)]
    merged_from: Option<Vec<QuoteId>>,
}

impl ImportedQuote {
    fn into_quote(self, index: usize) -> Result<Quote> {
        if self.text.trim().is_empty() || self.author.trim().is_empty() {
            return Err(TransferError::InvalidQuote(index + 1));
        }

        Ok(Quote {
            id: self
                .id
                .filter(|id| !id.as_str().is_empty())
                .unwrap_or_else(QuoteId::generate),
            text: self.text,
            author: self.author,
            category: self
                .category
                .filter(|category| !category.trim().is_empty())
                .unwrap_or_else(default_category),
            last_modified: self.last_modified,
            source: self.source,
            server_id: self.server_id,
            merged_from: self.merged_from,
        })
    }
}

/// Parse quotes out of an import document.
///
/// # Errors
///
/// - Return [`TransferError::Json`] if document is not valid JSON.
/// - Return [`TransferError::Malformed`] if a record has the wrong shape.
/// - Return [`TransferError::InvalidQuote`] if a record lacks text or author.
/// - Return [`TransferError::NoQuotes`] if document holds no quotes.
pub fn parse_import(data: &str) -> Result<Vec<Quote>> {
    let records = match serde_json::from_str::<Value>(data)? {
        Value::Array(records) => records,
        Value::Object(mut object) => match object.remove("quotes") {
            Some(Value::Array(records)) => records,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    if records.is_empty() {
        return Err(TransferError::NoQuotes);
    }

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value::<ImportedQuote>(record)
                .map_err(|error| TransferError::Malformed(index + 1, error))?
                .into_quote(index)
        })
        .collect()
}

/// Import quotes from target file into quote store.
///
/// Returns number of quotes imported.
///
/// # Errors
///
/// - Return [`TransferError::NotJson`] if file lacks a `.json` extension.
/// - Return [`TransferError::Io`] if file cannot be read.
/// - Return any error of [`parse_import`].
/// - Return [`TransferError::Store`] if quote store fails to persist.
#[instrument(skip(store, path), level = "debug")]
pub fn import_from<S: KeyValue>(
    store: &mut QuoteStore<S>,
    path: impl AsRef<Path>,
    mode: ImportMode,
) -> Result<usize> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
    if !is_json {
        return Err(TransferError::NotJson(path.to_path_buf()));
    }

    debug!("import quotes from {}", path.display());
    let quotes = parse_import(&fs::read_to_string(path)?)?;
    let count = quotes.len();
    match mode {
        ImportMode::Append => {
            store.extend(quotes)?;
        }
        ImportMode::Replace => store.replace_all(quotes)?,
    }
    info!("imported {count} quotes, store now holds {}", store.len());

    Ok(count)
}

/// Import and export error types.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// File could not be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Document is not valid JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Quote store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// There is nothing in the quote store to export.
    #[error("no quotes to export")]
    NothingToExport,

    /// Import file is not a JSON file.
    #[error("{0:?} is not a JSON file")]
    NotJson(PathBuf),

    /// Import document holds no quotes.
    #[error("no valid quotes found in file")]
    NoQuotes,

    /// Import record has the wrong shape.
    #[error("quote #{0} is malformed: {1}")]
    Malformed(usize, #[source] serde_json::Error),

    /// Import record lacks text or author.
    #[error("quote #{0} is missing its text or author")]
    InvalidQuote(usize),
}

/// Friendly result alias :3
type Result<T, E = TransferError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{quote::DEFAULT_CATEGORY, storage::MemoryStorage};
    use chrono::TimeZone;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;
    use std::collections::BTreeSet;

    fn tuples(quotes: &[Quote]) -> BTreeSet<(String, String, String)> {
        quotes
            .iter()
            .map(|quote| (quote.text.clone(), quote.author.clone(), quote.category.clone()))
            .collect()
    }

    #[test]
    fn parse_import_accepts_wrapped_and_bare_arrays() -> anyhow::Result<()> {
        let wrapped = parse_import(r#"{"quotes": [{"id": "a", "text": "t", "author": "x"}]}"#)?;
        let bare = parse_import(r#"[{"id": "a", "text": "t", "author": "x"}]"#)?;
        assert_eq!(wrapped, bare);

        Ok(())
    }

    #[test]
    fn parse_import_fills_in_missing_fields() -> anyhow::Result<()> {
        let quotes = parse_import(indoc! {r#"
            [
                {"text": "No id here", "author": "Anon", "category": "life"},
                {"id": 42, "text": "No category", "author": "Anon"}
            ]
        "#})?;

        assert!(quotes[0].id.as_str().starts_with("q_"));
        assert_eq!(quotes[0].category, "life");
        assert_eq!(quotes[1].id, QuoteId::new("42"));
        assert_eq!(quotes[1].category, DEFAULT_CATEGORY);

        Ok(())
    }

    #[test_case("{not json"; "malformed json")]
    #[test_case("[]"; "empty array")]
    #[test_case(r#"{"quotes": []}"#; "empty wrapped array")]
    #[test_case(r#"{"items": [{"text": "t", "author": "a"}]}"#; "wrong wrapper key")]
    #[test_case(r#"[{"text": "t", "author": "a"}, {"text": "", "author": "a"}]"#; "blank text")]
    #[test_case(r#"[{"text": 12, "author": "a"}]"#; "wrong field type")]
    #[test_case("42"; "scalar")]
    #[test]
    fn parse_import_rejects_bad_documents(data: &str) {
        assert!(parse_import(data).is_err());
    }

    #[sealed_test]
    fn import_rejects_bad_file_without_partial_mutation() -> anyhow::Result<()> {
        let mut store = QuoteStore::open(MemoryStorage::new())?;
        let before = store.quotes().to_vec();

        fs::write(
            "broken.json",
            r#"[{"text": "fine", "author": "a"}, {"text": "missing author"}]"#,
        )?;
        let result = import_from(&mut store, "broken.json", ImportMode::Append);
        assert!(matches!(result, Err(TransferError::InvalidQuote(2))));
        assert_eq!(store.quotes(), before.as_slice());

        fs::write("quotes.txt", "[]")?;
        let result = import_from(&mut store, "quotes.txt", ImportMode::Append);
        assert!(matches!(result, Err(TransferError::NotJson(_))));

        Ok(())
    }

    #[sealed_test]
    fn export_then_replace_import_reproduces_quotes() -> anyhow::Result<()> {
        let mut source = QuoteStore::open(MemoryStorage::new())?;
        source.replace_all(vec![
            Quote::new("a", "First", "Ada", "science"),
            Quote::new("b", "Second", "Grace", "science"),
            Quote::new("c", "Third", "Linus", "life"),
        ])?;
        let path = export_to(&source, Some(Path::new("export.json")))?;

        let mut target = QuoteStore::open(MemoryStorage::new())?;
        let count = import_from(&mut target, &path, ImportMode::Replace)?;

        assert_eq!(count, 3);
        assert_eq!(tuples(target.quotes()), tuples(source.quotes()));

        Ok(())
    }

    #[sealed_test]
    fn append_import_keeps_existing_quotes() -> anyhow::Result<()> {
        let mut store = QuoteStore::open(MemoryStorage::new())?;
        let before = store.len();
        fs::write("more.json", r#"[{"text": "t", "author": "a"}]"#)?;
        import_from(&mut store, "more.json", ImportMode::Append)?;
        assert_eq!(store.len(), before + 1);

        Ok(())
    }

    #[test]
    fn export_document_layout() -> anyhow::Result<()> {
        let mut store = QuoteStore::open(MemoryStorage::new())?;
        store.replace_all(vec![Quote::new("a", "First", "Ada", "science")])?;
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let document = serde_json::to_value(ExportDocument::from_store(&store, now)?)?;

        let expect = serde_json::json!({
            "quotes": [{"id": "a", "text": "First", "author": "Ada", "category": "science"}],
            "exportDate": "2025-03-01T12:00:00Z",
            "totalQuotes": 1,
            "categories": ["science"],
        });
        assert_eq!(document, expect);
        assert_eq!(default_export_name(now), "my-quotes-2025-03-01.json");

        Ok(())
    }

    #[test]
    fn export_empty_store_is_an_error() -> anyhow::Result<()> {
        let mut store = QuoteStore::open(MemoryStorage::new())?;
        store.clear()?;
        let result = ExportDocument::from_store(&store, Utc::now());
        assert!(matches!(result, Err(TransferError::NothingToExport)));

        Ok(())
    }
}
