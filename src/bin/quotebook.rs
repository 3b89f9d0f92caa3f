// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use quotebook::{
    config::Settings,
    conflict::{Arbiter, ConflictHistory, ConflictPolicy},
    path::{default_config_file, default_data_dir},
    prompt::{PromptArbiter, TerminalAsker},
    quote::{QuoteDraft, QuoteId},
    render,
    storage::FileStorage,
    store::{QuoteStore, ALL_CATEGORIES},
    sync::{
        remote::HttpRemote,
        state::load_pending,
        PushOutcome, SkipReason, SyncOutcome, Synchronizer,
    },
    transfer::{export_to, import_from, ImportMode},
};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use std::{fs, path::PathBuf, process::exit, time::Duration};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "quotebook [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Directory holding persisted quote data.
    #[arg(long, global = true, value_name = "path")]
    pub data_dir: Option<PathBuf>,

    /// Path to configuration file.
    #[arg(long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::load(default_config_file()?)?,
        };
        let data_dir = match (self.data_dir, settings.storage.data_dir.clone()) {
            (Some(path), _) | (None, Some(path)) => path,
            (None, None) => default_data_dir()?,
        };
        let store = QuoteStore::open(FileStorage::open(data_dir)?)?;
        let mut ctx = Context { settings, store };

        match self.command {
            Command::Random(opts) => run_random(&mut ctx, opts),
            Command::Last => run_last(&mut ctx),
            Command::Show(opts) => run_show(&mut ctx, opts),
            Command::List(opts) => run_list(&mut ctx, opts),
            Command::Categories => run_categories(&mut ctx),
            Command::Add(opts) => run_add(&mut ctx, opts).await,
            Command::Delete(opts) => run_delete(&mut ctx, opts),
            Command::Clear(opts) => run_clear(&mut ctx, opts),
            Command::Export(opts) => run_export(&mut ctx, opts),
            Command::Import(opts) => run_import(&mut ctx, opts),
            Command::Render(opts) => run_render(&mut ctx, opts),
            Command::Sync(opts) => run_sync(&mut ctx, opts).await,
            Command::Policy(opts) => run_policy(&mut ctx, opts),
            Command::Conflicts(opts) => run_conflicts(&mut ctx, opts),
            Command::Verify => run_verify(&mut ctx),
            Command::Status => run_status(&mut ctx),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Show random quote, optionally from one category.
    #[command(override_usage = "quotebook random [options]")]
    Random(RandomOptions),

    /// Show last viewed quote.
    Last,

    /// Show specific quote.
    #[command(override_usage = "quotebook show <id>")]
    Show(ShowOptions),

    /// List quotes, optionally filtered by category.
    #[command(override_usage = "quotebook list [options]")]
    List(ListOptions),

    /// List known categories.
    Categories,

    /// Add new quote.
    #[command(override_usage = "quotebook add [options] <text> --author <author>")]
    Add(AddOptions),

    /// Delete quote by identifier, or by position as "#n".
    #[command(override_usage = "quotebook delete [options] <id_or_position>")]
    Delete(DeleteOptions),

    /// Delete every quote.
    #[command(override_usage = "quotebook clear [options]")]
    Clear(ClearOptions),

    /// Export quotes to JSON file.
    #[command(override_usage = "quotebook export [<path>]")]
    Export(ExportOptions),

    /// Import quotes from JSON file.
    #[command(override_usage = "quotebook import [options] <path>")]
    Import(ImportOptions),

    /// Render quotes as standalone HTML page.
    #[command(override_usage = "quotebook render [options]")]
    Render(RenderOptions),

    /// Sync quotes with remote endpoint.
    #[command(override_usage = "quotebook sync [options]")]
    Sync(SyncOptions),

    /// Show or set conflict policy.
    #[command(override_usage = "quotebook policy [<policy>]")]
    Policy(PolicyOptions),

    /// Show conflict history.
    #[command(override_usage = "quotebook conflicts [options]")]
    Conflicts(ConflictsOptions),

    /// Verify integrity of quote data.
    Verify,

    /// Show sync status and statistics.
    Status,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RandomOptions {
    /// Only pick from target category.
    #[arg(short, long, value_name = "category")]
    pub category: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ShowOptions {
    /// Identifier of quote to show.
    #[arg(required = true, value_name = "id")]
    pub id: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ListOptions {
    /// Only list target category, and remember it as the current filter.
    #[arg(short, long, value_name = "category")]
    pub category: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Quote text.
    #[arg(required = true, value_name = "text")]
    pub text: String,

    /// Quote author.
    #[arg(short, long, required = true, value_name = "author")]
    pub author: String,

    /// Quote category.
    #[arg(short, long, value_name = "category")]
    pub category: Option<String>,

    /// Do not push new quote to remote endpoint.
    #[arg(short, long)]
    pub local: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    /// Identifier of quote, or 1-based position prefixed with "#".
    #[arg(required = true, value_name = "id_or_position")]
    pub target: String,

    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ClearOptions {
    /// Do not ask for confirmation.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExportOptions {
    /// Path of file to write, defaults to dated file in current directory.
    #[arg(value_name = "path")]
    pub path: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ImportOptions {
    /// Path of JSON file to read.
    #[arg(required = true, value_name = "path")]
    pub path: PathBuf,

    /// Replace existing quotes instead of appending to them.
    #[arg(short, long)]
    pub replace: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RenderOptions {
    /// Only render target category, defaults to the current filter.
    #[arg(short, long, value_name = "category")]
    pub category: Option<String>,

    /// Write page to file instead of standard output.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct SyncOptions {
    /// Keep syncing periodically until interrupted.
    #[arg(short, long)]
    pub watch: bool,

    /// Ask how to settle each conflict instead of applying the policy.
    #[arg(short, long)]
    pub interactive: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PolicyOptions {
    /// One of client-wins, server-wins, or merge.
    #[arg(value_name = "policy")]
    pub policy: Option<ConflictPolicy>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ConflictsOptions {
    /// Forget conflict history.
    #[arg(short, long)]
    pub clear: bool,
}

struct Context {
    settings: Settings,
    store: QuoteStore,
}

impl Context {
    fn synchronizer(&self) -> Result<Synchronizer<HttpRemote>> {
        let remote = HttpRemote::new(&self.settings.sync)?;
        Ok(Synchronizer::load(
            remote,
            self.settings.sync.clone(),
            self.store.storage(),
        )?)
    }
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

fn run_random(ctx: &mut Context, opts: RandomOptions) -> Result<()> {
    let quote = match opts.category {
        Some(category) => ctx.store.random_in(&category)?,
        None => ctx.store.random()?,
    };
    println!("{quote}");

    Ok(())
}

fn run_last(ctx: &mut Context) -> Result<()> {
    match ctx.store.last_viewed()? {
        Some(last) => println!("{}\n  viewed from {}", last.quote, last.context),
        None => println!("no quote viewed yet"),
    }

    Ok(())
}

fn run_show(ctx: &mut Context, opts: ShowOptions) -> Result<()> {
    let quote = ctx.store.show(&QuoteId::new(opts.id))?;
    println!("{quote}");

    Ok(())
}

fn run_list(ctx: &mut Context, opts: ListOptions) -> Result<()> {
    let (category, selected) = match opts.category {
        Some(category) => {
            let selected = ctx.store.apply_filter(&category)?;
            (category, selected)
        }
        None => {
            let category = ctx
                .store
                .saved_filter()?
                .unwrap_or_else(|| ALL_CATEGORIES.into());
            let selected = ctx.store.filter(&category);
            (category, selected)
        }
    };

    println!(
        "{}",
        render::filter_status(&category, selected.len(), ctx.store.len())
    );
    for (position, quote) in ctx.store.quotes().iter().enumerate() {
        if selected.iter().any(|chosen| std::ptr::eq(*chosen, quote)) {
            println!("#{} {quote}", position + 1);
        }
    }

    Ok(())
}

fn run_categories(ctx: &mut Context) -> Result<()> {
    for category in ctx.store.categories() {
        println!("{category}");
    }

    Ok(())
}

async fn run_add(ctx: &mut Context, opts: AddOptions) -> Result<()> {
    let mut draft = QuoteDraft::new(opts.text, opts.author);
    if let Some(category) = opts.category {
        draft = draft.with_category(category);
    }
    let id = ctx.store.add(draft)?.id.clone();
    println!("added quote {id}");

    if opts.local {
        return Ok(());
    }

    let mut sync = ctx.synchronizer()?;
    match sync.push(&mut ctx.store, &id).await? {
        PushOutcome::Sent(server_id) => println!("synced to server as post {server_id}"),
        PushOutcome::Queued => println!("server unreachable, queued for next sync"),
    }

    Ok(())
}

fn run_delete(ctx: &mut Context, opts: DeleteOptions) -> Result<()> {
    let position = match opts.target.strip_prefix('#') {
        Some(position) => Some(
            position
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid position {:?}", opts.target))?,
        ),
        None => None,
    };

    if !opts.yes && !confirm("delete this quote?")? {
        info!("nothing deleted");
        return Ok(());
    }

    let removed = match position {
        Some(position) => ctx.store.delete_at(position)?,
        None => ctx.store.delete(&QuoteId::new(opts.target))?,
    };
    println!("deleted {removed}");

    Ok(())
}

fn run_clear(ctx: &mut Context, opts: ClearOptions) -> Result<()> {
    let prompt = format!("delete all {} quotes? this cannot be undone", ctx.store.len());
    if !opts.yes && !confirm(&prompt)? {
        info!("nothing deleted");
        return Ok(());
    }

    ctx.store.clear()?;
    println!("all quotes cleared");

    Ok(())
}

fn confirm(message: &str) -> Result<bool> {
    Ok(Confirm::new(message).with_default(false).prompt()?)
}

fn run_export(ctx: &mut Context, opts: ExportOptions) -> Result<()> {
    let path = export_to(&ctx.store, opts.path.as_deref())?;
    println!("exported {} quotes to {}", ctx.store.len(), path.display());

    Ok(())
}

fn run_import(ctx: &mut Context, opts: ImportOptions) -> Result<()> {
    let mode = if opts.replace {
        ImportMode::Replace
    } else {
        ImportMode::Append
    };
    let count = import_from(&mut ctx.store, &opts.path, mode)?;
    println!("imported {count} quotes, {} total", ctx.store.len());

    Ok(())
}

fn run_render(ctx: &mut Context, opts: RenderOptions) -> Result<()> {
    let category = match opts.category {
        Some(category) => category,
        None => ctx
            .store
            .saved_filter()?
            .unwrap_or_else(|| ALL_CATEGORIES.into()),
    };
    let history = ConflictHistory::load(ctx.store.storage())?;
    let html = render::page(&ctx.store, &category, &history);

    match opts.output {
        Some(path) => {
            fs::write(&path, html)?;
            println!("rendered {} to {}", category, path.display());
        }
        None => print!("{html}"),
    }

    Ok(())
}

async fn run_sync(ctx: &mut Context, opts: SyncOptions) -> Result<()> {
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    bar.set_message(format!("syncing with {}", ctx.settings.sync.base_url));
    bar.enable_steady_tick(Duration::from_millis(100));

    let result = if opts.interactive {
        let mut arbiter = PromptArbiter::new(TerminalAsker::new(bar.clone()));
        sync_with(ctx, &mut arbiter, opts.watch).await
    } else {
        let mut arbiter = ConflictPolicy::load(ctx.store.storage())?;
        sync_with(ctx, &mut arbiter, opts.watch).await
    };
    bar.finish_and_clear();

    result
}

async fn sync_with(ctx: &mut Context, arbiter: &mut impl Arbiter, watch: bool) -> Result<()> {
    let mut sync = ctx.synchronizer()?;
    if watch {
        let shutdown = async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                warn!("cannot listen for interrupt: {error}");
            }
        };
        sync.watch(&mut ctx.store, arbiter, shutdown).await?;
        return Ok(());
    }

    if sync.refresh_connectivity().await == Some(false) {
        warn!("server unreachable, sync skipped");
        return Ok(());
    }
    sync.flush_pending(&mut ctx.store).await?;

    match sync.sync_once(&mut ctx.store, arbiter).await? {
        SyncOutcome::Completed(report) => {
            info!(
                "fetched {}, added {}, {} conflicts ({} client wins, {} server wins, {} merged)",
                report.fetched,
                report.added,
                report.conflicts,
                report.tally.client_wins,
                report.tally.server_wins,
                report.tally.merged
            );
        }
        SyncOutcome::Failed(reason) => warn!("sync failed: {reason}"),
        SyncOutcome::Skipped(SkipReason::Offline) => warn!("server unreachable, sync skipped"),
    }

    Ok(())
}

fn run_policy(ctx: &mut Context, opts: PolicyOptions) -> Result<()> {
    match opts.policy {
        Some(policy) => {
            policy.save(ctx.store.storage())?;
            println!("conflict policy set to {policy}");
        }
        None => {
            let current = ConflictPolicy::load(ctx.store.storage())?;
            for policy in ConflictPolicy::ALL {
                let marker = if policy == current { "*" } else { " " };
                println!("{marker} {policy}");
            }
        }
    }

    Ok(())
}

fn run_conflicts(ctx: &mut Context, opts: ConflictsOptions) -> Result<()> {
    let mut history = ConflictHistory::load(ctx.store.storage())?;
    if opts.clear {
        history.clear();
        history.save(ctx.store.storage())?;
        println!("conflict history cleared");
        return Ok(());
    }

    if history.is_empty() {
        println!("no conflicts detected yet");
        return Ok(());
    }

    let total = history.len();
    for (index, entry) in history.entries().enumerate() {
        println!(
            "conflict #{} - {} at {}\n  {}\n  local:  \"{}\" by {}\n  server: \"{}\" by {}",
            total - index,
            entry.resolution,
            entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            entry.message,
            entry.local_quote.text,
            entry.local_quote.author,
            entry.server_quote.text,
            entry.server_quote.author,
        );
    }

    Ok(())
}

fn run_verify(ctx: &mut Context) -> Result<()> {
    let report = ctx.store.verify()?;
    println!("{report}");
    if !report.all_valid() {
        return Err(anyhow!("quote data failed integrity check"));
    }

    Ok(())
}

fn run_status(ctx: &mut Context) -> Result<()> {
    let sync = ctx.synchronizer()?;
    let state = sync.state();
    let pending = load_pending(ctx.store.storage())?;
    let policy = ConflictPolicy::load(ctx.store.storage())?;

    println!("quotes:     {}", ctx.store.len());
    println!("policy:     {policy}");
    println!("pending:    {} changes", pending.len());
    match state.last_sync_time {
        Some(time) => println!("last sync:  {}", time.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("last sync:  never"),
    }
    println!("{}", state.stats);

    Ok(())
}
