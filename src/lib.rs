// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Personal quote collection with a simulated server sync.
//!
//! A __quotebook__ is an ordered list of quotes that can be browsed at random,
//! filtered by category, exported to and imported from JSON files, rendered as
//! HTML, and reconciled against a placeholder remote endpoint. Every mutation
//! is mirrored to key-value storage right away.
//!
//! # Layout
//!
//! - [`quote`]: quote records and user supplied drafts.
//! - [`storage`]: key-value persistence backends.
//! - [`store`]: the quote store itself.
//! - [`transfer`]: JSON export and import.
//! - [`render`]: HTML projection of store state.
//! - [`conflict`]: conflict detection, policies, and history.
//! - [`sync`]: the sync stub that drives all of the above against a remote.
//! - [`prompt`]: interactive conflict resolution.
//! - [`config`] and [`path`]: settings and their default locations.

pub mod config;
pub mod conflict;
pub mod path;
pub mod prompt;
pub mod quote;
pub mod render;
pub mod storage;
pub mod store;
pub mod sync;
pub mod transfer;
