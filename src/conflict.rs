// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Conflict detection and resolution.
//!
//! A __conflict__ happens when a local quote and a remote quote describe the
//! same logical quote, i.e., they share an identifier or a server identifier,
//! but disagree on text, author, or category. Nothing smarter than field
//! inequality is used to detect conflicts. There are no vector clocks, no
//! causal ordering, and no last-writer-wins by timestamp.
//!
//! # Conflict Policies
//!
//! Each conflict is settled by one of three policies:
//!
//! - `client-wins`: remote quote is discarded, and renamed so it will not
//!   collide again. Local quote stays as is.
//! - `server-wins`: local quote takes on the remote text, author, and category
//!   but keeps its own identifier.
//! - `merge`: local text gets the remote text appended as a bracketed
//!   annotation, and both identifiers are recorded.
//!
//! Every settled conflict is recorded in a bounded [`ConflictHistory`] that is
//! persisted separately from the quotes themselves.

use crate::{
    quote::Quote,
    storage::{
        read_json, write_json, KeyValue, StorageError, CONFLICT_HISTORY_KEY, CONFLICT_POLICY_KEY,
    },
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::VecDeque,
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};
use tracing::{debug, info, instrument, warn};

/// Maximum number of entries kept in conflict history.
pub const HISTORY_LIMIT: usize = 20;

/// Number of characters of quote text kept in history entries.
const SUMMARY_CHARS: usize = 50;

/// Policy used to settle a conflict.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Keep local quote, discard remote quote.
    ClientWins,

    /// Replace local fields with remote fields, keep local identifier.
    #[default]
    ServerWins,

    /// Annotate local text with remote text.
    Merge,
}

impl ConflictPolicy {
    /// Every policy in display order.
    pub const ALL: [ConflictPolicy; 3] = [Self::ClientWins, Self::ServerWins, Self::Merge];

    /// Load persisted policy choice.
    ///
    /// Falls back to [`ConflictPolicy::ServerWins`] when nothing was chosen
    /// yet, or when the stored choice is unreadable.
    ///
    /// # Errors
    ///
    /// - Return [`ConflictError::Storage`] if storage backend fails to read.
    pub fn load(storage: &impl KeyValue) -> Result<Self> {
        match read_json(storage, CONFLICT_POLICY_KEY) {
            Ok(policy) => Ok(policy.unwrap_or_default()),
            Err(StorageError::Json(error)) => {
                warn!("stored conflict policy is unreadable, using default: {error}");
                Ok(Self::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Persist policy choice.
    ///
    /// # Errors
    ///
    /// - Return [`ConflictError::Storage`] if storage backend fails to write.
    pub fn save(self, storage: &impl KeyValue) -> Result<()> {
        write_json(storage, CONFLICT_POLICY_KEY, &self)?;
        info!("conflict policy set to {self}");

        Ok(())
    }

    /// Human readable description of what applying the policy did.
    pub fn message(self) -> &'static str {
        match self {
            Self::ClientWins => "Local version kept",
            Self::ServerWins => "Server version accepted",
            Self::Merge => "Versions merged",
        }
    }

    /// Settle conflict by mutating local quotes in place.
    ///
    /// Returns whether a local quote was changed.
    pub fn apply(self, quotes: &mut [Quote], conflict: &mut Conflict, now: DateTime<Utc>) -> bool {
        match self {
            Self::ClientWins => {
                debug!("client wins, keep local version of {}", conflict.local.id);
                conflict.remote.id = format!("{}_server_copy", conflict.remote.id).into();
                false
            }
            Self::ServerWins => {
                let Some(local) = quotes
                    .iter_mut()
                    .find(|quote| quote.id == conflict.local.id)
                else {
                    return false;
                };

                debug!("server wins, accept remote version for {}", local.id);
                *local = Quote {
                    id: conflict.local.id.clone(),
                    last_modified: Some(now),
                    ..conflict.remote.clone()
                };
                true
            }
            Self::Merge => {
                let Some(local) = quotes
                    .iter_mut()
                    .find(|quote| quote.id == conflict.local.id)
                else {
                    return false;
                };

                debug!("merge remote version into {}", local.id);
                *local = Quote {
                    text: merge_annotation(&conflict.local.text, &conflict.remote.text),
                    last_modified: Some(now),
                    merged_from: Some(vec![conflict.local.id.clone(), conflict.remote.id.clone()]),
                    ..conflict.local.clone()
                };
                true
            }
        }
    }
}

impl Display for ConflictPolicy {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::ClientWins => "client-wins",
            Self::ServerWins => "server-wins",
            Self::Merge => "merge",
        })
    }
}

impl FromStr for ConflictPolicy {
    type Err = ConflictError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        match data.trim().to_lowercase().as_str() {
            "client-wins" | "keep-local" => Ok(Self::ClientWins),
            "server-wins" | "accept-server" => Ok(Self::ServerWins),
            "merge" | "merge-both" => Ok(Self::Merge),
            _ => Err(ConflictError::UnknownPolicy(data.into())),
        }
    }
}

fn merge_annotation(local: &str, remote: &str) -> String {
    format!("{local} [Merged with: {remote}]")
}

/// Kind of disagreement between local and remote quote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    #[default]
    ContentConflict,
}

/// Local and remote quote that disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub local: Quote,
    pub remote: Quote,
    pub kind: ConflictKind,
}

/// Find conflicts between local and remote quotes.
///
/// Performs a linear scan of every remote quote against every local quote.
/// The first local quote with the same identity is compared field by field.
/// A local quote that already carries the merge annotation for a remote quote
/// does not conflict with it again.
pub fn detect_conflicts(local: &[Quote], remote: &[Quote]) -> Vec<Conflict> {
    remote
        .iter()
        .filter_map(|remote| {
            let local = local.iter().find(|local| local.same_identity(remote))?;
            if !local.content_differs(remote) || already_merged(local, remote) {
                return None;
            }

            Some(Conflict {
                local: local.clone(),
                remote: remote.clone(),
                kind: ConflictKind::ContentConflict,
            })
        })
        .collect()
}

fn already_merged(local: &Quote, remote: &Quote) -> bool {
    let recorded = local
        .merged_from
        .as_ref()
        .is_some_and(|ids| ids.contains(&remote.id));
    recorded && local.text.ends_with(&format!("[Merged with: {}]", remote.text))
}

/// Layer of indirection for deciding which policy settles a conflict.
pub trait Arbiter {
    /// Pick policy for target conflict.
    fn arbitrate(&mut self, conflict: &Conflict) -> ConflictPolicy;

    /// Whether decisions come from a person rather than a configured policy.
    fn is_manual(&self) -> bool {
        false
    }
}

impl Arbiter for ConflictPolicy {
    fn arbitrate(&mut self, _conflict: &Conflict) -> ConflictPolicy {
        *self
    }
}

/// Count of conflicts settled by each policy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub client_wins: usize,
    pub server_wins: usize,
    pub merged: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.client_wins + self.server_wins + self.merged
    }
}

/// Settle every conflict, recording each decision in history.
///
/// Local quotes are mutated in place. Persisting them and the history is left
/// to the caller.
#[instrument(skip_all, level = "debug")]
pub fn resolve_conflicts(
    quotes: &mut [Quote],
    conflicts: &mut [Conflict],
    arbiter: &mut impl Arbiter,
    history: &mut ConflictHistory,
    now: DateTime<Utc>,
) -> Tally {
    let mut tally = Tally::default();
    for conflict in conflicts.iter_mut() {
        let policy = arbiter.arbitrate(conflict);
        let message = if arbiter.is_manual() {
            format!("{} manually", policy.message())
        } else {
            format!("{} ({policy})", policy.message())
        };
        history.record(conflict, policy, message, now);
        policy.apply(quotes, conflict, now);

        match policy {
            ConflictPolicy::ClientWins => tally.client_wins += 1,
            ConflictPolicy::ServerWins => tally.server_wins += 1,
            ConflictPolicy::Merge => tally.merged += 1,
        }
    }

    if !conflicts.is_empty() {
        info!("resolved {} conflicts", tally.total());
    }

    tally
}

/// Shortened view of a quote kept in conflict history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteSummary {
    pub text: String,
    pub author: String,
}

impl From<&Quote> for QuoteSummary {
    fn from(quote: &Quote) -> Self {
        let text = match quote.text.char_indices().nth(SUMMARY_CHARS) {
            Some((cut, _)) => format!("{}...", &quote.text[..cut]),
            None => quote.text.clone(),
        };

        Self {
            text,
            author: quote.author.clone(),
        }
    }
}

/// Single conflict history record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub conflict_type: ConflictKind,
    pub resolution: ConflictPolicy,
    pub message: String,
    pub local_quote: QuoteSummary,
    pub server_quote: QuoteSummary,
}

/// Bounded log of settled conflicts, newest first.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictHistory {
    entries: VecDeque<HistoryEntry>,
}

impl ConflictHistory {
    /// Load persisted history.
    ///
    /// An unreadable history is logged and treated as empty.
    ///
    /// # Errors
    ///
    /// - Return [`ConflictError::Storage`] if storage backend fails to read.
    pub fn load(storage: &impl KeyValue) -> Result<Self> {
        match read_json::<Self>(storage, CONFLICT_HISTORY_KEY) {
            Ok(history) => Ok(history.unwrap_or_default()),
            Err(StorageError::Json(error)) => {
                warn!("conflict history is unreadable, starting fresh: {error}");
                Ok(Self::default())
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Persist history.
    ///
    /// # Errors
    ///
    /// - Return [`ConflictError::Storage`] if storage backend fails to write.
    pub fn save(&self, storage: &impl KeyValue) -> Result<()> {
        write_json(storage, CONFLICT_HISTORY_KEY, self)?;
        Ok(())
    }

    /// Record settled conflict at the front, dropping the oldest entries past
    /// [`HISTORY_LIMIT`].
    pub fn record(
        &mut self,
        conflict: &Conflict,
        resolution: ConflictPolicy,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) {
        self.entries.push_front(HistoryEntry {
            timestamp: now,
            conflict_type: conflict.kind,
            resolution,
            message: message.into(),
            local_quote: QuoteSummary::from(&conflict.local),
            server_quote: QuoteSummary::from(&conflict.remote),
        });
        self.entries.truncate(HISTORY_LIMIT);
    }

    pub fn entries(&self) -> impl ExactSizeIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Conflict handling error types.
#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    /// Storage backend failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Policy name is not one of the known policies.
    #[error("unknown conflict policy {0:?}, expected one of client-wins, server-wins, merge")]
    UnknownPolicy(String),
}

/// Friendly result alias :3
type Result<T, E = ConflictError> = std::result::Result<T, E>;
