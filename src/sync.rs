// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Simulated server synchronization.
//!
//! The __sync stub__ periodically fetches a list of posts from a placeholder
//! remote endpoint, relabels the first few posts as quotes, and reconciles
//! them with the local quote store. There is no real multi-writer consistency
//! problem here. The stub exists to demonstrate conflict detection and the
//! three conflict policies against purely local data.
//!
//! # Sync Cycle
//!
//! A single cycle goes like this:
//!
//! 1. Skip the cycle if the remote is known to be unreachable.
//! 2. Fetch posts. On failure the local store is left untouched, the failure is
//!    counted, and the cycle ends.
//! 3. Relabel posts as quotes, and hash them to count remote data changes.
//! 4. Look for conflicts with local quotes, and let the arbiter settle them.
//! 5. Add remote quotes that the store does not know yet, and stamp the ones
//!    it already knows.
//! 6. Persist quotes, conflict history, and sync bookkeeping.
//!
//! Cycles borrow the synchronizer mutably, so only one can be in flight.
//!
//! # Pending Changes
//!
//! Locally added quotes are pushed to the remote. If the remote cannot be
//! reached, the change is queued and pushed again once connectivity returns.
//!
//! # Watch Mode
//!
//! [`Synchronizer::watch`] runs full cycles on a fixed interval, and cheap
//! change checks on a shorter interval that trigger a full cycle as soon as
//! the remote data changes. The pending change queue is flushed on start when
//! the remote is reachable. Connectivity is probed before every full cycle,
//! and going from offline to online flushes the queue again.

pub mod remote;
pub mod state;

use crate::{
    config::SyncSettings,
    conflict::{detect_conflicts, resolve_conflicts, Arbiter, ConflictError, ConflictHistory, Tally},
    quote::{Quote, QuoteId, QuoteSource},
    storage::{KeyValue, StorageError},
    store::{QuoteStore, StoreError},
    sync::{
        remote::{NewPost, Post, Remote, RemoteError},
        state::{load_pending, save_pending, PendingChange, SyncState},
    },
};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::{collections::HashSet, future::Future};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

/// Relabel remote posts as quotes.
///
/// Only the first `max_items` posts are kept. Post titles become quote text,
/// and categories are assigned by position: `server`, `remote`, then `api` for
/// everything after.
pub fn relabel(posts: &[Post], max_items: usize, now: DateTime<Utc>) -> Vec<Quote> {
    posts
        .iter()
        .take(max_items)
        .enumerate()
        .map(|(index, post)| Quote {
            id: QuoteId::new(format!("server_{}", post.id)),
            text: post.title.clone(),
            author: format!("Server User {}", post.user_id),
            category: match index {
                0 => "server",
                1 => "remote",
                _ => "api",
            }
            .into(),
            last_modified: Some(now),
            source: Some(QuoteSource::Server),
            server_id: Some(post.id),
            merged_from: None,
        })
        .collect()
}

/// 32-bit rolling hash of a string over its UTF-16 units, as signed decimal.
fn rolling_hash(data: &str) -> String {
    data.encode_utf16()
        .fold(0i32, |hash, unit| {
            hash.wrapping_shl(5)
                .wrapping_sub(hash)
                .wrapping_add(i32::from(unit))
        })
        .to_string()
}

/// Hash relabeled remote quotes for change detection.
///
/// Timestamps are left out, so refetching identical data yields the same hash.
pub fn data_hash(quotes: &[Quote]) -> String {
    let canonical: Vec<_> = quotes
        .iter()
        .map(|quote| {
            (
                quote.id.as_str(),
                quote.text.as_str(),
                quote.author.as_str(),
                quote.category.as_str(),
                quote.server_id,
            )
        })
        .collect();

    // INVARIANT: Tuples of strings and integers always serialize.
    rolling_hash(&serde_json::to_string(&canonical).unwrap_or_default())
}

/// Hash raw posts for quick change checks.
pub fn posts_hash(posts: &[Post]) -> String {
    rolling_hash(&serde_json::to_string(posts).unwrap_or_default())
}

/// Add remote quotes unknown to the store, and stamp the known ones.
///
/// Remote quotes whose identifiers are in `skip` took part in a conflict, and
/// were already dealt with by the arbiter. Returns number of quotes added.
fn merge_remote(
    quotes: &mut Vec<Quote>,
    remote: &[Quote],
    skip: &HashSet<QuoteId>,
    now: DateTime<Utc>,
) -> usize {
    let mut added = 0;
    for incoming in remote.iter().filter(|incoming| !skip.contains(&incoming.id)) {
        let existing = quotes.iter_mut().find(|quote| {
            quote.same_identity(incoming)
                || (quote.text == incoming.text && quote.author == incoming.author)
        });

        match existing {
            Some(quote) => quote.last_modified = Some(now),
            None => {
                debug!("add new quote {} from server", incoming.id);
                quotes.push(incoming.clone());
                added += 1;
            }
        }
    }

    added
}

/// Why a sync cycle did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
}

/// Result of a completed sync cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub data_changed: bool,
    pub conflicts: usize,
    pub tally: Tally,
    pub added: usize,
}

/// What happened to a sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Cycle did not run.
    Skipped(SkipReason),

    /// Remote could not be reached, store left untouched.
    Failed(String),

    /// Cycle ran to completion.
    Completed(SyncReport),
}

/// What happened to a pushed quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Remote accepted quote and assigned it this identifier.
    Sent(u64),

    /// Remote was unreachable, quote waits in the pending queue.
    Queued,
}

/// Drives sync cycles against a remote endpoint.
#[derive(Debug)]
pub struct Synchronizer<R>
where
    R: Remote,
{
    remote: R,
    settings: SyncSettings,
    state: SyncState,
    online: bool,
}

impl<R> Synchronizer<R>
where
    R: Remote,
{
    /// Construct new synchronizer.
    ///
    /// The remote is assumed reachable until a request says otherwise.
    pub fn new(remote: R, settings: SyncSettings, state: SyncState) -> Self {
        Self {
            remote,
            settings,
            state,
            online: true,
        }
    }

    /// Construct new synchronizer, picking up persisted bookkeeping.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Storage`] if storage backend fails to read.
    pub fn load(remote: R, settings: SyncSettings, storage: &impl KeyValue) -> Result<Self> {
        Ok(Self::new(remote, settings, SyncState::load(storage)?))
    }

    pub fn state(&self) -> &SyncState {
        &self.state
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    /// Run one sync cycle.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Store`] if quote store fails to persist.
    /// - Return [`SyncError::Conflict`] if conflict history cannot be
    ///   loaded or saved.
    /// - Return [`SyncError::Storage`] if sync state cannot be saved.
    ///
    /// Remote failures are not errors, see [`SyncOutcome::Failed`].
    #[instrument(skip_all, level = "debug")]
    pub async fn sync_once<S: KeyValue>(
        &mut self,
        store: &mut QuoteStore<S>,
        arbiter: &mut impl Arbiter,
    ) -> Result<SyncOutcome> {
        if !self.online {
            debug!("sync skipped, offline");
            return Ok(SyncOutcome::Skipped(SkipReason::Offline));
        }

        let outcome = self.run_cycle(store, arbiter).await;

        self.state.save(store.storage())?;
        outcome
    }

    async fn run_cycle<S: KeyValue>(
        &mut self,
        store: &mut QuoteStore<S>,
        arbiter: &mut impl Arbiter,
    ) -> Result<SyncOutcome> {
        self.state.stats.total_syncs += 1;
        info!("fetch data from server");

        let posts = match self.remote.fetch_posts(None).await {
            Ok(posts) => posts,
            Err(error) => {
                warn!("server sync failed: {error}");
                self.state.stats.failed_syncs += 1;
                return Ok(SyncOutcome::Failed(error.to_string()));
            }
        };

        let now = Utc::now();
        let remote = relabel(&posts, self.settings.max_items, now);
        let hash = data_hash(&remote);
        let data_changed = self.state.last_server_data_hash.as_deref() != Some(hash.as_str());
        if data_changed {
            info!("server data has changed since last sync");
            self.state.last_server_data_hash = Some(hash);
            self.state.stats.data_changes_detected += 1;
        }

        let mut conflicts = detect_conflicts(store.quotes(), &remote);
        let skip: HashSet<QuoteId> = conflicts
            .iter()
            .map(|conflict| conflict.remote.id.clone())
            .collect();
        if !conflicts.is_empty() {
            warn!("{} conflicts detected", conflicts.len());
            self.state.stats.conflicts_detected += conflicts.len() as u64;
        }

        let mut history = ConflictHistory::load(store.storage())?;
        let (tally, added) = store.update(|quotes| {
            let tally = resolve_conflicts(quotes, &mut conflicts, arbiter, &mut history, now);
            let added = merge_remote(quotes, &remote, &skip, now);
            (tally, added)
        })?;
        if tally.total() > 0 {
            history.save(store.storage())?;
        }

        let stats = &mut self.state.stats;
        stats.conflicts_resolved += tally.total() as u64;
        stats.client_wins += tally.client_wins as u64;
        stats.server_wins += tally.server_wins as u64;
        stats.merged += tally.merged as u64;
        stats.quotes_from_server += added as u64;
        stats.successful_syncs += 1;
        self.state.last_sync_time = Some(now);

        info!(
            "sync completed: {} fetched, {} added, {} conflicts resolved",
            remote.len(),
            added,
            tally.total()
        );

        Ok(SyncOutcome::Completed(SyncReport {
            fetched: remote.len(),
            data_changed,
            conflicts: conflicts.len(),
            tally,
            added,
        }))
    }

    /// Push locally added quote to the remote.
    ///
    /// When offline, or when the remote refuses, the quote is queued instead.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Store`] if quote is unknown or store fails to
    ///   persist.
    /// - Return [`SyncError::Storage`] if pending queue cannot be saved.
    #[instrument(skip(self, store), level = "debug")]
    pub async fn push<S: KeyValue>(
        &mut self,
        store: &mut QuoteStore<S>,
        id: &QuoteId,
    ) -> Result<PushOutcome> {
        let quote = store
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        let sent = if self.online {
            match self.remote.create_post(&NewPost::from(&quote)).await {
                Ok(server_id) => Some(server_id),
                Err(error) => {
                    warn!("failed to send quote {} to server: {error}", quote.id);
                    None
                }
            }
        } else {
            None
        };

        let outcome = match sent {
            Some(server_id) => {
                stamp_server_id(store, id, server_id)?;
                self.state.stats.quotes_to_server += 1;
                info!("quote {id} synced to server as post {server_id}");
                PushOutcome::Sent(server_id)
            }
            None => {
                let mut pending = load_pending(store.storage())?;
                pending.push(PendingChange::create(quote, Utc::now()));
                save_pending(store.storage(), &pending)?;
                info!("quote {id} queued for later sync");
                PushOutcome::Queued
            }
        };

        self.state.save(store.storage())?;
        Ok(outcome)
    }

    /// Push every queued change, keeping only the ones that fail again.
    ///
    /// Returns number of changes pushed.
    ///
    /// # Errors
    ///
    /// - Return [`SyncError::Store`] if quote store fails to persist.
    /// - Return [`SyncError::Storage`] if pending queue cannot be saved.
    #[instrument(skip_all, level = "debug")]
    pub async fn flush_pending<S: KeyValue>(&mut self, store: &mut QuoteStore<S>) -> Result<usize> {
        let pending = load_pending(store.storage())?;
        if pending.is_empty() {
            debug!("no pending changes to process");
            return Ok(0);
        }

        info!("processing {} pending changes", pending.len());
        let posts: Vec<NewPost> = pending
            .iter()
            .map(|change| NewPost::from(&change.data))
            .collect();
        let results = join_all(posts.iter().map(|post| self.remote.create_post(post))).await;

        let mut remaining = Vec::new();
        let mut sent = 0;
        for (change, result) in pending.into_iter().zip(results) {
            match result {
                Ok(server_id) => {
                    if store.get(&change.data.id).is_some() {
                        stamp_server_id(store, &change.data.id, server_id)?;
                    }
                    sent += 1;
                }
                Err(error) => {
                    warn!("failed to process pending change for {}: {error}", change.data.id);
                    remaining.push(change);
                }
            }
        }

        save_pending(store.storage(), &remaining)?;
        self.state.stats.quotes_to_server += sent as u64;
        self.state.save(store.storage())?;
        info!("{sent} pending changes processed, {} left", remaining.len());

        Ok(sent)
    }

    /// Cheap check for remote data changes.
    ///
    /// Fetches only the first post and compares its hash with the one seen
    /// last time. The very first check never reports a change. Failures are
    /// only logged, since this runs in the background.
    pub async fn check_for_changes(&mut self) -> bool {
        if let Err(error) = self.remote.probe().await {
            debug!("quick server check failed: {error}");
            return false;
        }

        let posts = match self.remote.fetch_posts(Some(1)).await {
            Ok(posts) => posts,
            Err(error) => {
                debug!("quick server check failed: {error}");
                return false;
            }
        };

        let hash = posts_hash(&posts);
        let changed = self
            .state
            .last_quick_hash
            .as_ref()
            .is_some_and(|last| last != &hash);
        self.state.last_quick_hash = Some(hash);
        if changed {
            info!("server data changed, triggering sync");
        }

        changed
    }

    /// Probe remote, and report a connectivity transition if one happened.
    ///
    /// Returns the new online status when it differs from the previous one.
    pub async fn refresh_connectivity(&mut self) -> Option<bool> {
        let online = self.remote.probe().await.is_ok();
        if online == self.online {
            return None;
        }

        self.online = online;
        if online {
            info!("connection restored, going online");
        } else {
            warn!("connection lost, going offline, changes will be queued");
        }

        Some(online)
    }

    /// Keep store in sync until shutdown resolves.
    ///
    /// # Errors
    ///
    /// - Return any storage related error of [`Self::sync_once`] or
    ///   [`Self::flush_pending`].
    #[instrument(skip_all, level = "debug")]
    pub async fn watch<S, F>(
        &mut self,
        store: &mut QuoteStore<S>,
        arbiter: &mut impl Arbiter,
        shutdown: F,
    ) -> Result<()>
    where
        S: KeyValue,
        F: Future<Output = ()>,
    {
        let mut sync_tick = interval(self.settings.interval());
        let mut check_tick = interval(self.settings.check_interval());
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        check_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "periodic sync started every {}s, checks every {}s",
            self.settings.interval().as_secs(),
            self.settings.check_interval().as_secs()
        );

        self.refresh_connectivity().await;
        if self.online {
            self.flush_pending(store).await?;
        }

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("periodic sync stopped");
                    break;
                }
                _ = sync_tick.tick() => {
                    if self.refresh_connectivity().await == Some(true) {
                        self.flush_pending(store).await?;
                    }
                    self.sync_once(store, arbiter).await?;
                }
                _ = check_tick.tick() => {
                    if self.online && self.check_for_changes().await {
                        self.sync_once(store, arbiter).await?;
                    }
                }
            }
        }

        self.state.save(store.storage())?;
        Ok(())
    }
}

fn stamp_server_id<S: KeyValue>(
    store: &mut QuoteStore<S>,
    id: &QuoteId,
    server_id: u64,
) -> Result<()> {
    let now = Utc::now();
    store.update(|quotes| {
        if let Some(quote) = quotes.iter_mut().find(|quote| &quote.id == id) {
            quote.server_id = Some(server_id);
            quote.last_modified = Some(now);
        }
    })?;

    Ok(())
}

impl From<&Quote> for NewPost {
    fn from(quote: &Quote) -> Self {
        Self {
            title: quote.text.clone(),
            body: format!("Author: {}, Category: {}", quote.author, quote.category),
            user_id: 1,
        }
    }
}

/// Sync error types.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Remote endpoint failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Quote store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Conflict history failed.
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    /// Sync bookkeeping failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Friendly result alias :3
type Result<T, E = SyncError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{conflict::ConflictPolicy, storage::MemoryStorage};
    use pretty_assertions::assert_eq;
    use std::sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex,
    };

    #[derive(Debug, Default)]
    struct FakeRemote {
        posts: Mutex<Vec<Post>>,
        offline: AtomicBool,
        next_id: AtomicU64,
    }

    impl FakeRemote {
        fn with_posts(titles: &[&str]) -> Self {
            let remote = Self::default();
            remote.set_titles(titles);
            remote.next_id.store(101, Ordering::SeqCst);
            remote
        }

        fn set_titles(&self, titles: &[&str]) {
            let posts = titles
                .iter()
                .enumerate()
                .map(|(index, title)| Post {
                    user_id: 1,
                    id: index as u64 + 1,
                    title: title.to_string(),
                    body: String::new(),
                })
                .collect();
            *self.posts.lock().unwrap() = posts;
        }

        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn check(&self) -> std::result::Result<(), RemoteError> {
            if self.offline.load(Ordering::SeqCst) {
                // Any reqwest error will do, build one from an invalid URL.
                let error = reqwest::Client::new().get("not a url").build().unwrap_err();
                return Err(RemoteError::Http(error));
            }
            Ok(())
        }
    }

    impl Remote for FakeRemote {
        async fn fetch_posts(
            &self,
            limit: Option<usize>,
        ) -> std::result::Result<Vec<Post>, RemoteError> {
            self.check()?;
            let posts = self.posts.lock().unwrap().clone();
            Ok(match limit {
                Some(limit) => posts.into_iter().take(limit).collect(),
                None => posts,
            })
        }

        async fn probe(&self) -> std::result::Result<(), RemoteError> {
            self.check()
        }

        async fn create_post(&self, _post: &NewPost) -> std::result::Result<u64, RemoteError> {
            self.check()?;
            Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
        }
    }

    fn synchronizer(remote: FakeRemote) -> Synchronizer<FakeRemote> {
        Synchronizer::new(remote, SyncSettings::default(), SyncState::default())
    }

    fn empty_store() -> anyhow::Result<QuoteStore<MemoryStorage>> {
        let mut store = QuoteStore::open(MemoryStorage::new())?;
        store.replace_all(Vec::new())?;
        Ok(store)
    }

    fn completed(outcome: SyncOutcome) -> SyncReport {
        match outcome {
            SyncOutcome::Completed(report) => report,
            other => panic!("expected completed sync, got {other:?}"),
        }
    }

    #[test]
    fn relabel_truncates_and_assigns_categories() {
        let posts: Vec<Post> = (1..=5)
            .map(|id| Post {
                user_id: id % 2 + 1,
                id,
                title: format!("post {id}"),
                body: String::new(),
            })
            .collect();
        let quotes = relabel(&posts, 4, Utc::now());

        let categories: Vec<_> = quotes.iter().map(|q| q.category.as_str()).collect();
        assert_eq!(categories, vec!["server", "remote", "api", "api"]);
        assert_eq!(quotes[0].id, QuoteId::new("server_1"));
        assert_eq!(quotes[0].author, "Server User 2");
        assert_eq!(quotes[0].server_id, Some(1));
        assert!(quotes.iter().all(Quote::is_from_server));
    }

    #[test]
    fn data_hash_ignores_timestamps() {
        let posts = vec![Post {
            user_id: 1,
            id: 1,
            title: "title".into(),
            body: String::new(),
        }];
        let earlier = relabel(&posts, 3, Utc::now() - chrono::Duration::hours(1));
        let later = relabel(&posts, 3, Utc::now());
        assert_eq!(data_hash(&earlier), data_hash(&later));

        let mut changed = later.clone();
        changed[0].text = "other".into();
        assert_ne!(data_hash(&changed), data_hash(&later));
    }

    #[test]
    fn rolling_hash_matches_known_values() {
        assert_eq!(rolling_hash(""), "0");
        assert_eq!(rolling_hash("a"), "97");
        assert_eq!(rolling_hash("ab"), "3105");
    }

    #[tokio::test]
    async fn first_sync_adds_remote_quotes() -> anyhow::Result<()> {
        let mut store = empty_store()?;
        let mut sync = synchronizer(FakeRemote::with_posts(&["one", "two", "three", "four"]));
        let report = completed(sync.sync_once(&mut store, &mut ConflictPolicy::ServerWins).await?);

        assert_eq!(report.fetched, 3);
        assert_eq!(report.added, 3);
        assert!(report.data_changed);
        assert_eq!(store.len(), 3);
        assert_eq!(sync.state().stats.successful_syncs, 1);
        assert_eq!(sync.state().stats.quotes_from_server, 3);
        assert!(sync.state().last_sync_time.is_some());

        // Refetching identical data neither duplicates nor reports a change.
        let report = completed(sync.sync_once(&mut store, &mut ConflictPolicy::ServerWins).await?);
        assert_eq!(report.added, 0);
        assert!(!report.data_changed);
        assert_eq!(store.len(), 3);

        Ok(())
    }

    #[tokio::test]
    async fn server_wins_on_changed_remote_data() -> anyhow::Result<()> {
        let mut store = empty_store()?;
        let remote = FakeRemote::with_posts(&["Shared quote original"]);
        let mut sync = synchronizer(remote);
        sync.sync_once(&mut store, &mut ConflictPolicy::ServerWins).await?;

        sync.remote().set_titles(&["Shared quote modified"]);
        let report = completed(sync.sync_once(&mut store, &mut ConflictPolicy::ServerWins).await?);

        assert_eq!(report.conflicts, 1);
        assert_eq!(report.tally.server_wins, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.quotes()[0].id, QuoteId::new("server_1"));
        assert_eq!(store.quotes()[0].text, "Shared quote modified");

        let history = ConflictHistory::load(store.storage())?;
        assert_eq!(history.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn client_wins_keeps_local_and_adds_nothing() -> anyhow::Result<()> {
        let mut store = empty_store()?;
        store.extend([Quote::new("server_1", "Local edit", "Server User 1", "server")])?;
        let mut sync = synchronizer(FakeRemote::with_posts(&["Remote text"]));

        let report = completed(sync.sync_once(&mut store, &mut ConflictPolicy::ClientWins).await?);
        assert_eq!(report.tally.client_wins, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.quotes()[0].text, "Local edit");

        Ok(())
    }

    #[tokio::test]
    async fn server_wins_restores_locally_edited_quote() -> anyhow::Result<()> {
        let mut store = empty_store()?;
        let mut sync = synchronizer(FakeRemote::with_posts(&["one"]));
        sync.sync_once(&mut store, &mut ConflictPolicy::ServerWins).await?;

        store.update(|quotes| quotes[0].text = "local edit".into())?;
        let report = completed(sync.sync_once(&mut store, &mut ConflictPolicy::ServerWins).await?);

        assert!(!report.data_changed);
        assert_eq!(report.conflicts, 1);
        assert_eq!(report.tally.server_wins, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.quotes()[0].id, QuoteId::new("server_1"));
        assert_eq!(store.quotes()[0].text, "one");

        Ok(())
    }

    #[tokio::test]
    async fn failed_fetch_leaves_store_untouched() -> anyhow::Result<()> {
        let mut store = empty_store()?;
        store.extend([Quote::new("a", "text", "author", "life")])?;
        let before = store.quotes().to_vec();

        let remote = FakeRemote::with_posts(&["one"]);
        remote.set_offline(true);
        let mut sync = synchronizer(remote);

        let outcome = sync.sync_once(&mut store, &mut ConflictPolicy::ServerWins).await?;
        assert!(matches!(outcome, SyncOutcome::Failed(_)));
        assert_eq!(store.quotes(), before.as_slice());
        assert_eq!(sync.state().stats.failed_syncs, 1);

        Ok(())
    }

    #[tokio::test]
    async fn offline_sync_is_skipped() -> anyhow::Result<()> {
        let mut store = empty_store()?;
        let mut sync = synchronizer(FakeRemote::with_posts(&["one"]));
        sync.set_online(false);

        let outcome = sync.sync_once(&mut store, &mut ConflictPolicy::ServerWins).await?;
        assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::Offline));
        assert_eq!(sync.state().stats.total_syncs, 0);

        Ok(())
    }

    #[tokio::test]
    async fn push_queues_when_unreachable_and_flushes_later() -> anyhow::Result<()> {
        let mut store = empty_store()?;
        let id = store.add(crate::quote::QuoteDraft::new("Be kind.", "Anon"))?.id.clone();

        let remote = FakeRemote::with_posts(&[]);
        remote.set_offline(true);
        let mut sync = synchronizer(remote);

        assert_eq!(sync.push(&mut store, &id).await?, PushOutcome::Queued);
        assert_eq!(load_pending(store.storage())?.len(), 1);

        sync.remote().set_offline(false);
        assert_eq!(sync.refresh_connectivity().await, None);
        assert_eq!(sync.flush_pending(&mut store).await?, 1);
        assert!(load_pending(store.storage())?.is_empty());
        assert_eq!(store.get(&id).unwrap().server_id, Some(101));
        assert_eq!(sync.state().stats.quotes_to_server, 1);

        Ok(())
    }

    #[tokio::test]
    async fn connectivity_transitions_are_reported_once() {
        let remote = FakeRemote::with_posts(&["one"]);
        let mut sync = synchronizer(remote);

        sync.remote().set_offline(true);
        assert_eq!(sync.refresh_connectivity().await, Some(false));
        assert_eq!(sync.refresh_connectivity().await, None);

        sync.remote().set_offline(false);
        assert_eq!(sync.refresh_connectivity().await, Some(true));
        assert!(sync.is_online());
    }

    #[tokio::test]
    async fn quick_check_reports_changes_after_first_look() {
        let mut sync = synchronizer(FakeRemote::with_posts(&["one"]));
        assert!(!sync.check_for_changes().await);
        assert!(!sync.check_for_changes().await);

        sync.remote().set_titles(&["changed"]);
        assert!(sync.check_for_changes().await);
    }

    #[tokio::test]
    async fn watch_stops_on_shutdown() -> anyhow::Result<()> {
        let mut store = empty_store()?;
        let mut sync = synchronizer(FakeRemote::with_posts(&["one"]));
        let shutdown = tokio::time::sleep(std::time::Duration::from_millis(50));

        sync.watch(&mut store, &mut ConflictPolicy::ServerWins, shutdown)
            .await?;
        assert_eq!(store.len(), 1);
        assert_eq!(sync.state().stats.successful_syncs, 1);

        Ok(())
    }

    #[tokio::test]
    async fn watch_flushes_queue_left_by_earlier_run() -> anyhow::Result<()> {
        let mut store = empty_store()?;
        let id = store.add(crate::quote::QuoteDraft::new("Be kind.", "Anon"))?.id.clone();
        let queued = PendingChange::create(store.get(&id).unwrap().clone(), Utc::now());
        save_pending(store.storage(), &[queued])?;

        let mut sync = synchronizer(FakeRemote::with_posts(&["one"]));
        let shutdown = tokio::time::sleep(std::time::Duration::from_millis(100));
        sync.watch(&mut store, &mut ConflictPolicy::ServerWins, shutdown)
            .await?;

        assert!(load_pending(store.storage())?.is_empty());
        assert_eq!(store.get(&id).unwrap().server_id, Some(101));
        assert_eq!(sync.state().stats.quotes_to_server, 1);
        assert_eq!(sync.state().stats.successful_syncs, 1);

        Ok(())
    }
}
