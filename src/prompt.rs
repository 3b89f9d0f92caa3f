// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Interactive conflict resolution.
//!
//! Conflicts found during a sync cycle can be settled by asking the user,
//! one conflict at a time, instead of applying the configured policy. The
//! user can also give up at any point and let the remaining conflicts be
//! settled automatically.

use crate::conflict::{Arbiter, Conflict, ConflictPolicy};

use indicatif::ProgressBar;
use inquire::Select;
use std::fmt::{Display, Formatter, Result as FmtResult};
use tracing::{info, instrument, warn};

/// Choice offered for a single conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    KeepLocal,
    AcceptServer,
    MergeBoth,
    AutoResolveRest,
}

impl Choice {
    pub const ALL: [Choice; 4] = [
        Self::KeepLocal,
        Self::AcceptServer,
        Self::MergeBoth,
        Self::AutoResolveRest,
    ];
}

impl Display for Choice {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(match self {
            Self::KeepLocal => "keep local",
            Self::AcceptServer => "accept server",
            Self::MergeBoth => "merge both",
            Self::AutoResolveRest => "auto-resolve the rest (server wins)",
        })
    }
}

/// Layer of indirection for asking the user about a conflict.
pub trait Asker {
    /// Ask user how to settle target conflict.
    ///
    /// Returns [`None`] if the user could not be asked.
    fn ask(&mut self, conflict: &Conflict) -> Option<Choice>;
}

/// Ask through terminal prompts, suspending a progress bar while asking.
#[derive(Debug, Clone)]
pub struct TerminalAsker {
    pub(crate) bar: ProgressBar,
}

impl TerminalAsker {
    /// Construct new terminal asker.
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Asker for TerminalAsker {
    #[instrument(skip_all, level = "debug")]
    fn ask(&mut self, conflict: &Conflict) -> Option<Choice> {
        info!("conflict on quote {}", conflict.local.id);
        self.bar.suspend(|| {
            println!("local:  \"{}\" by {}", conflict.local.text, conflict.local.author);
            println!("server: \"{}\" by {}", conflict.remote.text, conflict.remote.author);
            match Select::new("resolve conflict", Choice::ALL.to_vec()).prompt() {
                Ok(choice) => Some(choice),
                Err(error) => {
                    warn!("cannot prompt for conflict resolution: {error}");
                    None
                }
            }
        })
    }
}

/// Arbiter that asks the user about each conflict.
///
/// Once the user picks [`Choice::AutoResolveRest`], or cannot be asked at
/// all, every remaining conflict is settled with
/// [`ConflictPolicy::ServerWins`] without asking again.
#[derive(Debug)]
pub struct PromptArbiter<A = TerminalAsker>
where
    A: Asker,
{
    asker: A,
    auto: bool,
}

impl<A> PromptArbiter<A>
where
    A: Asker,
{
    /// Construct new prompt arbiter.
    pub fn new(asker: A) -> Self {
        Self { asker, auto: false }
    }
}

impl<A> Arbiter for PromptArbiter<A>
where
    A: Asker,
{
    fn arbitrate(&mut self, conflict: &Conflict) -> ConflictPolicy {
        if self.auto {
            return ConflictPolicy::ServerWins;
        }

        match self.asker.ask(conflict) {
            Some(Choice::KeepLocal) => ConflictPolicy::ClientWins,
            Some(Choice::AcceptServer) => ConflictPolicy::ServerWins,
            Some(Choice::MergeBoth) => ConflictPolicy::Merge,
            Some(Choice::AutoResolveRest) | None => {
                info!("auto-resolving remaining conflicts");
                self.auto = true;
                ConflictPolicy::ServerWins
            }
        }
    }

    fn is_manual(&self) -> bool {
        !self.auto
    }
}
