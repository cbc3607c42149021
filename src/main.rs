//! # SlotPilot — sport slot booking automation
//!
//! Watches a university sport portal, keeps a per-week waiting list of
//! slots, and books each one the instant its registration window opens.
//!
//! Usage:
//!   slotpilot run                        # Scan, then keep booking queued slots
//!   slotpilot scan --week next           # Rescan one week and print it
//!   slotpilot queue list                 # Show the waiting lists
//!   slotpilot book "Yoga" 2024-06-10 18:00
//!   slotpilot license check

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use slotpilot_core::config::SlotPilotConfig;
use slotpilot_core::slot::{Slot, SlotKey, SlotStatus, Week};
use slotpilot_dispatch::{Dispatcher, Reply, Request};
use slotpilot_license::LicenseClient;
use slotpilot_page::{HttpPortal, Portal};
use slotpilot_scheduler::{run_countdown, spawn_scheduler, SchedulerContext};
use slotpilot_store::{keys, Notifier, StorageArea, WaitingStore};

#[derive(Parser)]
#[command(name = "slotpilot", version, about = "🏓 SlotPilot — sport slot booking automation")]
struct Cli {
    /// Config file (default: ~/.slotpilot/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan both weeks, then keep watching the waiting lists (default)
    Run,
    /// Rescan one week and print the upcoming slots
    Scan {
        /// Week to scan: this | next
        #[arg(long, default_value = "this")]
        week: Week,
    },
    /// Inspect or edit the waiting lists
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    /// Queue a slot and count down to its booking window
    Book {
        /// Activity name as shown on the portal
        name: String,
        /// Event date, yyyy-mm-dd
        date: String,
        /// Start time, HH:MM
        start: String,
    },
    /// License management
    License {
        #[command(subcommand)]
        command: LicenseCommand,
    },
}

#[derive(Subcommand)]
enum QueueCommand {
    /// Print every week's queue in order
    List,
    /// Drop a slot from whichever queue holds it
    Remove {
        name: String,
        date: String,
        start: String,
    },
}

#[derive(Subcommand)]
enum LicenseCommand {
    /// Check the configured license code
    Check,
    /// Register a new code (admin key required)
    Add {
        code: String,
        /// Expiry date, yyyy-mm-dd; omit for no expiry
        #[arg(long)]
        expiry: Option<String>,
    },
}

/// Shared wiring for every command that touches state.
struct App {
    storage: Arc<StorageArea>,
    ctx: Arc<SchedulerContext>,
    dispatcher: Dispatcher,
    config: SlotPilotConfig,
}

impl App {
    fn build(config: SlotPilotConfig, with_portal: bool) -> Result<Self> {
        let db_path = shellexpand::tilde(&config.store.db_path).to_string();
        let storage = Arc::new(StorageArea::open(std::path::Path::new(&db_path))?);
        let notifier = Arc::new(Notifier::new(Some(config.notify.webhook_url.clone())));
        let waiting = Arc::new(WaitingStore::new(storage.clone(), notifier.clone()));

        let portal: Option<Arc<dyn Portal>> = if with_portal {
            Some(Arc::new(HttpPortal::new(config.portal.clone())?))
        } else {
            None
        };

        let ctx = Arc::new(SchedulerContext::new(
            waiting,
            notifier,
            portal,
            Duration::from_millis(config.scheduler.settle_ms),
        ));
        let dispatcher = Dispatcher::new(storage.clone(), ctx.clone());
        Ok(Self {
            storage,
            ctx,
            dispatcher,
            config,
        })
    }

    async fn verify_license(&self) -> Result<()> {
        let client = LicenseClient::new(self.config.license.clone())?;
        client.verify().await?;
        Ok(())
    }
}

fn print_slots(slots: &[Slot]) {
    if slots.is_empty() {
        println!("   (no upcoming slots)");
        return;
    }
    for slot in slots {
        let marker = match slot.status {
            SlotStatus::Success => "✅",
            SlotStatus::Failed => "❌",
            SlotStatus::Waiting => "  ",
        };
        println!(
            "   {marker} {} {}-{}  {}",
            slot.date, slot.start, slot.finish, slot.name
        );
    }
}

fn expect_success(reply: &Reply) -> Result<()> {
    if reply.success {
        Ok(())
    } else {
        anyhow::bail!(
            "{}",
            reply.error.clone().unwrap_or_else(|| "request failed".into())
        )
    }
}

async fn cmd_run(app: &App) -> Result<()> {
    app.verify_license().await?;

    // Populate both weeks before the scheduler starts making decisions.
    expect_success(&app.dispatcher.handle(Request::ScanSchedule { week: Week::This }).await)?;
    expect_success(&app.dispatcher.handle(Request::NavigateWeek { week: Week::Next }).await)?;
    expect_success(&app.dispatcher.handle(Request::NavigateWeek { week: Week::This }).await)?;

    let lists = app.ctx.waiting.load()?;
    let queued: usize = lists.values().map(Vec::len).sum();
    tracing::info!("🚀 SlotPilot running, {queued} slots queued");

    // Surface every store mutation while the loop runs.
    let mut changes = app.storage.watch();
    tokio::spawn(async move {
        while let Ok(touched) = changes.recv().await {
            tracing::debug!("💾 Store updated: {}", touched.join(", "));
        }
    });

    spawn_scheduler(app.ctx.clone(), app.config.scheduler.tick_secs);
    tokio::signal::ctrl_c().await?;
    tracing::info!("👋 Shutting down");
    Ok(())
}

async fn cmd_scan(app: &App, week: Week) -> Result<()> {
    app.verify_license().await?;
    let reply = app.dispatcher.handle(Request::NavigateWeek { week }).await;
    expect_success(&reply)?;
    let slots: Vec<Slot> = match reply.data {
        Some(data) => serde_json::from_value(data)?,
        None => Vec::new(),
    };
    println!("📅 Week `{week}`:");
    print_slots(&slots);
    Ok(())
}

fn cmd_queue_list(app: &App) -> Result<()> {
    let lists = app.ctx.waiting.load()?;
    for week in Week::ALL {
        println!("📋 Week `{week}`:");
        match lists.get(&week) {
            Some(queue) if !queue.is_empty() => print_slots(queue),
            _ => println!("   (empty)"),
        }
    }
    Ok(())
}

fn cmd_queue_remove(app: &App, key: SlotKey) -> Result<()> {
    if !app.ctx.waiting.contains(&key)? {
        anyhow::bail!("{key} is not on any waiting list");
    }
    app.ctx.waiting.remove(&key)?;
    println!("🗑️ Removed {key}");
    Ok(())
}

async fn cmd_book(app: &App, key: SlotKey) -> Result<()> {
    app.verify_license().await?;

    // The slot must come from a scan so its color (and with it the booking
    // window) is known.
    let schedule: Vec<Slot> = app.storage.get(keys::SCHEDULE)?.unwrap_or_default();
    let Some(slot) = schedule.iter().find(|s| s.matches(&key)).cloned() else {
        anyhow::bail!("{key} is not in the scanned schedule; run `slotpilot scan` first");
    };

    expect_success(
        &app.dispatcher
            .handle(Request::AddToWaitingList { slot: slot.clone() })
            .await,
    )?;
    println!("⏳ Counting down to the booking window of {key}...");
    let outcome = run_countdown(&app.ctx, slot).await?;
    println!("🏁 {outcome:?}");
    Ok(())
}

async fn cmd_license(app: &App, command: LicenseCommand) -> Result<()> {
    let client = LicenseClient::new(app.config.license.clone())?;
    match command {
        LicenseCommand::Check => match client.check().await? {
            Some(status) => {
                println!(
                    "🔑 active: {}, expires: {}",
                    status.active,
                    status.expiry_date.as_deref().unwrap_or("never")
                );
            }
            None => println!("❌ Unknown license code"),
        },
        LicenseCommand::Add { code, expiry } => {
            client.add(&code, expiry.as_deref()).await?;
            println!("✅ Code {code} registered");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let path = shellexpand::tilde(path).to_string();
            SlotPilotConfig::load_from(std::path::Path::new(&path))?
        }
        None => {
            let config = SlotPilotConfig::load()?;
            if !SlotPilotConfig::default_path().exists() {
                config.save()?;
                tracing::info!(
                    "📝 Wrote default config to {}",
                    SlotPilotConfig::default_path().display()
                );
            }
            config
        }
    };

    let command = cli.command.unwrap_or(Command::Run);
    let with_portal = matches!(command, Command::Run | Command::Scan { .. } | Command::Book { .. });
    let app = App::build(config, with_portal)?;

    match command {
        Command::Run => cmd_run(&app).await,
        Command::Scan { week } => cmd_scan(&app, week).await,
        Command::Queue { command } => match command {
            QueueCommand::List => cmd_queue_list(&app),
            QueueCommand::Remove { name, date, start } => {
                cmd_queue_remove(&app, SlotKey { name, date, start })
            }
        },
        Command::Book { name, date, start } => {
            cmd_book(&app, SlotKey { name, date, start }).await
        }
        Command::License { command } => cmd_license(&app, command).await,
    }
}
