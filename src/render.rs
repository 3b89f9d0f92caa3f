// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! HTML projection of quote store state.
//!
//! Every function here is pure. They take a view of the store and return an
//! HTML fragment as a string, escaping all user supplied content along the
//! way. [`page`] stitches the fragments into a standalone document.

use crate::{
    conflict::ConflictHistory,
    quote::Quote,
    storage::KeyValue,
    store::{QuoteStore, ALL_CATEGORIES},
};


/// Escape text for safe inclusion in HTML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Render a single quote.
pub fn quote_card(quote: &Quote) -> String {
    format!(
        concat!(
            "<div class=\"quote-item\" data-id=\"{id}\">\n",
            "  <div class=\"quote-text\">\"{text}\"</div>\n",
            "  <div class=\"quote-author\">- {author}</div>\n",
            "  <div class=\"quote-category\">Category: {category}</div>\n",
            "</div>\n"
        ),
        id = escape(quote.id.as_str()),
        text = escape(&quote.text),
        author = escape(&quote.author),
        category = escape(&quote.category),
    )
}

/// Render list of quotes.
///
/// An empty list renders a hint instead, worded by whether the list is the
/// result of a category filter.
pub fn quote_list(quotes: &[&Quote], filtered: bool) -> String {
    if quotes.is_empty() {
        let hint = if filtered {
            "No quotes found for the selected category."
        } else {
            "No quotes yet. Add your first quote!"
        };
        return format!("<p class=\"empty\">{hint}</p>\n");
    }

    quotes.iter().map(|quote| quote_card(quote)).collect()
}

/// Render one button per category.
pub fn category_buttons(categories: &[String]) -> String {
    categories
        .iter()
        .map(|category| {
            format!(
                "<button class=\"category-btn\" data-category=\"{0}\">{0}</button>\n",
                escape(category)
            )
        })
        .collect()
}

/// Describe what a category filter currently shows.
pub fn filter_status(category: &str, shown: usize, total: usize) -> String {
    if category.eq_ignore_ascii_case(ALL_CATEGORIES) {
        format!("Showing all {total} quotes")
    } else {
        format!("Showing {shown} quotes in \"{}\"", escape(&capitalize(category)))
    }
}

/// Render conflict history, newest first.
pub fn conflict_history(history: &ConflictHistory) -> String {
    if history.is_empty() {
        return "<p class=\"no-conflicts\">No conflicts detected yet.</p>\n".into();
    }

    let total = history.len();
    history
        .entries()
        .enumerate()
        .map(|(index, entry)| {
            format!(
                concat!(
                    "<div class=\"conflict-item\">\n",
                    "  <div class=\"conflict-item-header\">",
                    "Conflict #{number} - {resolution}</div>\n",
                    "  <div class=\"conflict-item-details\">\n",
                    "    <strong>When:</strong> {when}<br>\n",
                    "    <strong>Resolution:</strong> {message}<br>\n",
                    "    <strong>Local:</strong> \"{local_text}\" by {local_author}<br>\n",
                    "    <strong>Server:</strong> \"{server_text}\" by {server_author}\n",
                    "  </div>\n",
                    "</div>\n"
                ),
                number = total - index,
                resolution = entry.resolution.to_string().replace('-', " ").to_uppercase(),
                when = entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
                message = escape(&entry.message),
                local_text = escape(&entry.local_quote.text),
                local_author = escape(&entry.local_quote.author),
                server_text = escape(&entry.server_quote.text),
                server_author = escape(&entry.server_quote.author),
            )
        })
        .collect()
}

/// Render standalone HTML page of quote store.
pub fn page<S: KeyValue>(
    store: &QuoteStore<S>,
    category: &str,
    history: &ConflictHistory,
) -> String {
    let selected = store.filter(category);
    let filtered = !category.eq_ignore_ascii_case(ALL_CATEGORIES);

    format!(
        concat!(
            "<!DOCTYPE html>\n",
            "<html lang=\"en\">\n",
            "<head>\n<meta charset=\"utf-8\">\n<title>Quotebook</title>\n</head>\n",
            "<body>\n",
            "<h1>Quotebook</h1>\n",
            "<p>Total quotes: <span id=\"quoteCount\">{count}</span></p>\n",
            "<div id=\"categoriesList\">\n{categories}</div>\n",
            "<p id=\"filterStatus\">{status}</p>\n",
            "<div id=\"allQuotes\">\n{quotes}</div>\n",
            "<h2>Conflict History</h2>\n",
            "<div id=\"conflictHistoryList\">\n{history}</div>\n",
            "</body>\n",
            "</html>\n"
        ),
        count = store.len(),
        categories = category_buttons(&store.categories()),
        status = filter_status(category, selected.len(), store.len()),
        quotes = quote_list(&selected, filtered),
        history = conflict_history(history),
    )
}
