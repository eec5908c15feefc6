// Decides whether stored alarms fire at a given wall-clock instant.
//
// `is_due` is the pure per-alarm predicate (enabled, hour:minute, repeat
// policy). `AlarmMatcher` wraps it with the per-tick concerns: the leading
// fire window of each minute, at-most-once per alarm per minute, and fault
// isolation so one unreadable alarm never hides the others.

use crate::model::item::{AlarmFault, AlarmRecord, MatchEvent, RepeatPolicy};
use anyhow::Result;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};
use std::collections::{HashMap, HashSet};

pub const DEFAULT_FIRE_WINDOW_SECS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireWindow {
    /// Only the first N seconds of the matching minute may fire.
    /// Used with polling ticks that are not aligned to minute boundaries.
    LeadingSeconds(u32),
    /// Any second of the matching minute. Only sound when the caller
    /// guarantees a single evaluation per calendar minute.
    WholeMinute,
}

impl Default for FireWindow {
    fn default() -> Self {
        FireWindow::LeadingSeconds(DEFAULT_FIRE_WINDOW_SECS)
    }
}

impl FireWindow {
    /// Whether a tick at `now` may emit matches.
    pub fn admits(&self, now: NaiveDateTime) -> bool {
        match self {
            FireWindow::LeadingSeconds(secs) => now.second() < *secs,
            FireWindow::WholeMinute => true,
        }
    }
}

/// Minute-granularity match of `alarm` against `now`, ignoring seconds.
///
/// Errors only when the alarm's anchor cannot be read.
pub fn is_due(alarm: &AlarmRecord, now: NaiveDateTime) -> Result<bool> {
    if !alarm.enabled {
        return Ok(false);
    }
    let anchor = alarm.anchor()?;

    if now.hour() != anchor.hour() || now.minute() != anchor.minute() {
        return Ok(false);
    }

    let due = match alarm.repeat {
        RepeatPolicy::None => now.date() == anchor.date(),
        RepeatPolicy::Daily => true,
        RepeatPolicy::Weekdays => !matches!(now.weekday(), Weekday::Sat | Weekday::Sun),
        RepeatPolicy::Weekly => now.weekday() == anchor.weekday(),
    };
    Ok(due)
}

pub fn truncate_to_minute(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date()
        .and_hms_opt(dt.hour(), dt.minute(), 0)
        .unwrap_or(dt)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub events: Vec<MatchEvent>,
    pub faults: Vec<AlarmFault>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.faults.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AlarmMatcher {
    window: FireWindow,
    // Alarm id -> minute it last fired in.
    fired: HashMap<String, NaiveDateTime>,
}

impl AlarmMatcher {
    pub fn new(window: FireWindow) -> Self {
        Self {
            window,
            fired: HashMap::new(),
        }
    }

    /// Evaluates every alarm once, in collection order.
    pub fn tick(&mut self, alarms: &[AlarmRecord], now: NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();
        let minute = truncate_to_minute(now);

        let live: HashSet<&str> = alarms.iter().map(|a| a.id.as_str()).collect();
        self.fired.retain(|id, _| live.contains(id.as_str()));

        if !self.window.admits(now) {
            return report;
        }

        for alarm in alarms {
            match is_due(alarm, now) {
                Ok(true) => {
                    if self.fired.get(&alarm.id) == Some(&minute) {
                        log::debug!("Alarm {} already fired at {}", alarm.id, minute);
                        continue;
                    }
                    self.fired.insert(alarm.id.clone(), minute);
                    report.events.push(MatchEvent {
                        alarm_id: alarm.id.clone(),
                        matched_at: now,
                        message: alarm.message.clone(),
                        task_id: alarm.task_id.clone(),
                    });
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Skipping alarm {} this tick: {:#}", alarm.id, e);
                    report.faults.push(AlarmFault {
                        alarm_id: alarm.id.clone(),
                        reason: format!("{:#}", e),
                    });
                }
            }
        }
        report
    }
}
