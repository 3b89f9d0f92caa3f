// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Sync bookkeeping.
//!
//! Keeps track of what the sync stub saw last time it ran, how many cycles
//! succeeded or failed, and which local changes are still waiting to be pushed
//! to the remote endpoint. All of it is process-local bookkeeping that is
//! persisted between invocations, but never treated as authoritative data.

use crate::{
    quote::Quote,
    storage::{read_json, write_json, KeyValue, StorageError, PENDING_CHANGES_KEY, SYNC_STATE_KEY},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::warn;

/// Running counters of sync activity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncStats {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    pub conflicts_detected: u64,
    pub conflicts_resolved: u64,
    pub client_wins: u64,
    pub server_wins: u64,
    pub merged: u64,
    pub data_changes_detected: u64,
    pub quotes_from_server: u64,
    pub quotes_to_server: u64,
}

impl Display for SyncStats {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let success_rate = match self.total_syncs {
            0 => 0.0,
            total => self.successful_syncs as f64 * 100.0 / total as f64,
        };

        writeln!(
            fmt,
            "syncs:      {} total, {} ok, {} failed ({success_rate:.0}% success)",
            self.total_syncs, self.successful_syncs, self.failed_syncs
        )?;
        writeln!(
            fmt,
            "conflicts:  {} detected, {} resolved ({} client wins, {} server wins, {} merged)",
            self.conflicts_detected,
            self.conflicts_resolved,
            self.client_wins,
            self.server_wins,
            self.merged
        )?;
        writeln!(fmt, "changes:    {} server data changes seen", self.data_changes_detected)?;
        write!(
            fmt,
            "quotes:     {} from server, {} to server",
            self.quotes_from_server, self.quotes_to_server
        )
    }
}

/// What the sync stub remembers between cycles.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncState {
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_server_data_hash: Option<String>,
    pub last_quick_hash: Option<String>,
    pub stats: SyncStats,
}

impl SyncState {
    /// Load persisted sync state.
    ///
    /// Unreadable state is logged and replaced with a fresh one.
    ///
    /// # Errors
    ///
    /// - Return [`StorageError::Io`] if storage backend fails to read.
    pub fn load(storage: &impl KeyValue) -> Result<Self, StorageError> {
        match read_json(storage, SYNC_STATE_KEY) {
            Ok(state) => Ok(state.unwrap_or_default()),
            Err(StorageError::Json(error)) => {
                warn!("sync state is unreadable, starting fresh: {error}");
                Ok(Self::default())
            }
            Err(error) => Err(error),
        }
    }

    /// Persist sync state.
    ///
    /// # Errors
    ///
    /// - Return [`StorageError`] if storage backend fails to write.
    pub fn save(&self, storage: &impl KeyValue) -> Result<(), StorageError> {
        write_json(storage, SYNC_STATE_KEY, self)
    }
}

/// Kind of change waiting to be pushed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    #[default]
    Create,
}

/// Local change waiting to be pushed to the remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub action: ChangeAction,
    pub data: Quote,
    pub timestamp: DateTime<Utc>,
}

impl PendingChange {
    pub fn create(quote: Quote, now: DateTime<Utc>) -> Self {
        Self {
            action: ChangeAction::Create,
            data: quote,
            timestamp: now,
        }
    }
}

/// Load queue of pending changes.
///
/// An unreadable queue is logged and treated as empty.
///
/// # Errors
///
/// - Return [`StorageError::Io`] if storage backend fails to read.
pub fn load_pending(storage: &impl KeyValue) -> Result<Vec<PendingChange>, StorageError> {
    match read_json(storage, PENDING_CHANGES_KEY) {
        Ok(pending) => Ok(pending.unwrap_or_default()),
        Err(StorageError::Json(error)) => {
            warn!("pending changes are unreadable, dropping them: {error}");
            Ok(Vec::new())
        }
        Err(error) => Err(error),
    }
}

/// Persist queue of pending changes, removing the key once the queue drains.
///
/// # Errors
///
/// - Return [`StorageError`] if storage backend fails to write.
pub fn save_pending(
    storage: &impl KeyValue,
    pending: &[PendingChange],
) -> Result<(), StorageError> {
    if pending.is_empty() {
        storage.remove(PENDING_CHANGES_KEY)
    } else {
        write_json(storage, PENDING_CHANGES_KEY, &pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use pretty_assertions::assert_eq;

    #[test]
    fn sync_state_round_trip() -> anyhow::Result<()> {
        let storage = MemoryStorage::new();
        assert_eq!(SyncState::load(&storage)?, SyncState::default());

        let mut state = SyncState::default();
        state.last_server_data_hash = Some("-12345".into());
        state.stats.total_syncs = 3;
        state.save(&storage)?;

        assert_eq!(SyncState::load(&storage)?, state);

        Ok(())
    }

    #[test]
    fn pending_queue_drains_key_when_empty() -> anyhow::Result<()> {
        let storage = MemoryStorage::new();
        let change = PendingChange::create(Quote::new("a", "t", "x", "c"), Utc::now());
        save_pending(&storage, &[change.clone()])?;
        assert_eq!(load_pending(&storage)?, vec![change]);

        save_pending(&storage, &[])?;
        assert_eq!(storage.get(PENDING_CHANGES_KEY)?, None);
        assert!(load_pending(&storage)?.is_empty());

        Ok(())
    }

    #[test]
    fn stats_display_reports_success_rate() {
        let stats = SyncStats {
            total_syncs: 4,
            successful_syncs: 3,
            failed_syncs: 1,
            ..SyncStats::default()
        };
        assert!(stats.to_string().starts_with("syncs:      4 total, 3 ok, 1 failed (75% success)"));
    }
}
