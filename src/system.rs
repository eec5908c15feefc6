// File: ./src/system.rs
//! Background tasks: the periodic alarm matcher, notification dispatch and
//! the on-disk collection watcher used by the long-running CLI.
use crate::config::Config;
use crate::context::SharedContext;
use crate::model::matcher::truncate_to_minute;
use crate::model::{AlarmMatcher, AlarmRecord, FireWindow, MatchEvent};
use crate::storage::LocalStorage;
use chrono::{Local, NaiveDateTime, Timelike};
use notify_rust::Notification;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval, interval_at, sleep};

/// Source of the local wall-clock reading.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickSchedule {
    /// Evaluate on a fixed cadence. A cadence wider than the fire window
    /// becomes one tick per minute on the minute boundary.
    Polling(Duration),
    /// Sleep to each minute boundary; at most one evaluation per minute.
    MinuteAligned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherSettings {
    pub schedule: TickSchedule,
    pub window: FireWindow,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            schedule: TickSchedule::Polling(Duration::from_secs(60)),
            window: FireWindow::default(),
        }
    }
}

impl MatcherSettings {
    pub fn from_config(cfg: &Config) -> Self {
        if cfg.minute_aligned {
            Self {
                schedule: TickSchedule::MinuteAligned,
                window: FireWindow::WholeMinute,
            }
        } else {
            Self {
                schedule: TickSchedule::Polling(cfg.tick_interval()),
                window: cfg.fire_window(),
            }
        }
    }
}

fn until_next_minute(now: NaiveDateTime) -> Duration {
    let nanos = now.nanosecond().min(999_999_999) as u64;
    Duration::from_secs(60 - now.second().min(59) as u64) - Duration::from_nanos(nanos)
}

/// First-tick delay and period for a polling schedule.
///
/// A cadence wider than the fire window drifts out of it, so such schedules
/// tick once a minute on the minute boundary instead. Launching inside the
/// window ticks right away.
fn polling_plan(now: NaiveDateTime, every: Duration, window: FireWindow) -> (Duration, Duration) {
    match window {
        FireWindow::LeadingSeconds(secs) if every > Duration::from_secs(secs as u64) => {
            let delay = if window.admits(now) {
                Duration::ZERO
            } else {
                until_next_minute(now)
            };
            (delay, Duration::from_secs(60))
        }
        _ => (Duration::ZERO, every),
    }
}

/// Handle to a running matcher. Dropping it also ends the task, without
/// waiting for it; call `stop` to wait.
pub struct MatcherHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl MatcherHandle {
    /// Stops the periodic task and waits for it to exit. No event is sent
    /// after this returns.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await
            && e.is_panic()
        {
            log::error!("Alarm matcher task panicked: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Spawns the alarm matcher.
///
/// The task reads the latest alarm snapshot from `alarms` on every tick, so
/// store mutations never interleave with an evaluation in progress. Matches
/// are handed to `events` with `try_send` and never awaited.
pub fn spawn_alarm_matcher(
    mut alarms: watch::Receiver<Vec<AlarmRecord>>,
    clock: Arc<dyn Clock>,
    settings: MatcherSettings,
    events: mpsc::Sender<MatchEvent>,
) -> MatcherHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        let mut matcher = AlarmMatcher::new(settings.window);
        let mut last_minute: Option<NaiveDateTime> = None;
        let mut ticker = match settings.schedule {
            TickSchedule::Polling(every) => {
                let (delay, period) = polling_plan(clock.now(), every, settings.window);
                let mut t = interval_at(Instant::now() + delay, period);
                t.set_missed_tick_behavior(MissedTickBehavior::Delay);
                Some(t)
            }
            TickSchedule::MinuteAligned => None,
        };

        log::info!("Alarm matcher started ({:?})", settings.schedule);

        loop {
            let wake = async {
                match ticker.as_mut() {
                    Some(t) => {
                        t.tick().await;
                    }
                    None => sleep(until_next_minute(clock.now())).await,
                }
            };

            tokio::select! {
                biased;
                _ = &mut shutdown_rx => break,
                changed = alarms.changed() => {
                    if changed.is_err() {
                        log::debug!("Alarm snapshot channel closed");
                        break;
                    }
                    // The next tick reads the new snapshot.
                    continue;
                }
                _ = wake => {}
            }

            let now = clock.now();
            if settings.schedule == TickSchedule::MinuteAligned {
                let minute = truncate_to_minute(now);
                if last_minute == Some(minute) {
                    continue;
                }
                last_minute = Some(minute);
            }

            let snapshot = alarms.borrow_and_update().clone();
            let report = matcher.tick(&snapshot, now);

            if !report.faults.is_empty() {
                log::warn!(
                    "{} alarm(s) skipped at {} due to errors",
                    report.faults.len(),
                    now
                );
            }

            for event in report.events {
                log::info!("Alarm {} matched at {}", event.alarm_id, event.matched_at);
                match events.try_send(event) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(ev)) => {
                        log::warn!("Event queue full, dropping fire of {}", ev.alarm_id);
                    }
                    Err(mpsc::error::TrySendError::Closed(ev)) => {
                        log::debug!("No dispatcher listening for {}", ev.alarm_id);
                    }
                }
            }
        }

        log::info!("Alarm matcher stopped");
    });

    MatcherHandle {
        shutdown: Some(shutdown_tx),
        task,
    }
}

// --- DISPATCH ---

/// Receives fire events. Implementations must return quickly.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &MatchEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &MatchEvent) {
        log::info!("⏰ {} ({})", event.message, event.matched_at.format("%H:%M"));
    }
}

/// Pops an OS notification on a detached thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn notify(&self, event: &MatchEvent) {
        let body = if event.message.is_empty() {
            "闹钟".to_string()
        } else {
            event.message.clone()
        };
        let alarm_id = event.alarm_id.clone();

        std::thread::spawn(move || {
            if let Err(e) = Notification::new()
                .summary("⏰ 闹钟")
                .body(&body)
                .appname("Remindful")
                .show()
            {
                log::warn!("Failed to show notification for {}: {}", alarm_id, e);
            }
        });
    }
}

/// Forwards every event to `notifier` until the channel closes.
pub fn spawn_dispatcher(
    mut rx: mpsc::Receiver<MatchEvent>,
    notifier: Arc<dyn Notifier>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            notifier.notify(&event);
        }
    })
}

// --- STORAGE WATCH ---

/// Re-reads the persisted collection every `every` and publishes it when it
/// changed, so edits made by another process reach a running matcher.
/// A failed read keeps the previous snapshot.
pub fn spawn_storage_watcher(
    ctx: SharedContext,
    tx: watch::Sender<Vec<AlarmRecord>>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }
            let ctx = ctx.clone();
            let loaded =
                tokio::task::spawn_blocking(move || LocalStorage::load_alarms(ctx.as_ref())).await;
            match loaded {
                Ok(Ok(alarms)) => {
                    tx.send_if_modified(|current| {
                        if *current == alarms {
                            false
                        } else {
                            log::debug!("Alarm file changed, {} alarm(s)", alarms.len());
                            *current = alarms;
                            true
                        }
                    });
                }
                Ok(Err(e)) => log::warn!("Could not reload alarms: {:#}", e),
                Err(e) => log::warn!("Alarm reload task failed: {}", e),
            }
        }
    })
}
