use anyhow::{Context, Result};
use chrono::Local;
use remindful::cli::{self, Command};
use remindful::config::Config;
use remindful::context::{AppContext, SharedContext, StandardContext};
use remindful::logging;
use remindful::model::display::{AlarmDisplay, preview};
use remindful::model::{AlarmRecord, Extractor, RepeatPolicy};
use remindful::store::AlarmStore;
use remindful::system::{
    DesktopNotifier, LogNotifier, MatcherSettings, Notifier, SystemClock, spawn_alarm_matcher,
    spawn_dispatcher, spawn_storage_watcher,
};
use std::env;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let invocation = match cli::parse_args(&args) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    if invocation.command == Command::Help {
        cli::print_help("remindful");
        return Ok(());
    }

    let ctx: SharedContext = Arc::new(StandardContext::new(invocation.root));
    let config = Config::load_or_default(ctx.as_ref())?;
    if let Err(e) = logging::init(ctx.as_ref(), config.log_level()) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let now = Local::now().naive_local();
    let extractor = Extractor::new().with_default_time(config.default_time());

    match invocation.command {
        Command::Parse { text } => {
            let parsed = extractor.extract(&text, now);
            println!("{}", preview(&parsed, now.date()));
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
        Command::Add { text, repeat } => {
            let parsed = extractor.extract(&text, now);
            let alarm = match AlarmRecord::from_parsed(&parsed, now, config.reminder_lead_mins) {
                Some(mut alarm) => {
                    alarm.repeat = repeat;
                    alarm
                }
                // A repeating alarm only needs a time of day.
                None if repeat != RepeatPolicy::None && parsed.time.is_some() => {
                    let time = parsed.time.unwrap_or_else(|| config.default_time());
                    AlarmRecord::new(now.date().and_time(time), repeat, &parsed.title)
                }
                None => {
                    eprintln!("No date found in '{}'. Nothing was added.", text);
                    std::process::exit(1);
                }
            };

            let mut store = AlarmStore::load(ctx.clone())?;
            println!("{}", alarm.to_list_line(now.date()));
            store.add(alarm)?;
        }
        Command::List => {
            let store = AlarmStore::load(ctx.clone())?;
            if store.is_empty() {
                println!("No alarms.");
            }
            for alarm in store.alarms() {
                println!("{}", alarm.to_list_line(now.date()));
            }
        }
        Command::Toggle { id } => {
            let mut store = AlarmStore::load(ctx.clone())?;
            let full = store
                .resolve_id(&id)
                .with_context(|| format!("No single alarm matches '{}'", id))?;
            if let Some(enabled) = store.toggle(&full)? {
                println!("{} {}", full, if enabled { "enabled" } else { "disabled" });
            }
        }
        Command::Remove { id } => {
            let mut store = AlarmStore::load(ctx.clone())?;
            let full = store
                .resolve_id(&id)
                .with_context(|| format!("No single alarm matches '{}'", id))?;
            if store.delete(&full)? {
                println!("Removed {}", full);
            }
        }
        Command::Watch => watch_alarms(ctx, &config).await?,
        Command::Help => cli::print_help("remindful"),
    }

    Ok(())
}

async fn watch_alarms(ctx: SharedContext, config: &Config) -> Result<()> {
    let mut store = AlarmStore::load(ctx.clone())?;
    let (snapshot_tx, snapshot_rx) = watch::channel(Vec::new());
    store.subscribe(snapshot_tx.clone());

    let (event_tx, event_rx) = mpsc::channel(32);
    let notifier: Arc<dyn Notifier> = if config.notifications {
        Arc::new(DesktopNotifier)
    } else {
        Arc::new(LogNotifier)
    };
    let dispatcher = spawn_dispatcher(event_rx, notifier);

    let settings = MatcherSettings::from_config(config);
    let matcher = spawn_alarm_matcher(snapshot_rx, Arc::new(SystemClock), settings, event_tx);
    let reloader = spawn_storage_watcher(ctx.clone(), snapshot_tx, config.tick_interval());

    println!(
        "Watching {} alarm(s) from {}. Press Ctrl-C to stop.",
        store.len(),
        ctx.get_alarms_path()?.display()
    );

    tokio::signal::ctrl_c().await?;
    log::info!("Interrupted, shutting down");

    reloader.abort();
    matcher.stop().await;
    let _ = dispatcher.await;
    Ok(())
}
