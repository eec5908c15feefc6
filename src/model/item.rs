// File: ./src/model/item.rs
use crate::model::parser::{ParsedDateTime, default_time};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::EnumString;
use uuid::Uuid;

/// Storage format for alarm anchors. Local wall-clock, no offset.
pub const ANCHOR_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

fn default_uid() -> String {
    Uuid::new_v4().to_string()
}

fn default_true() -> bool {
    true
}

// A null or missing anchor loads as "" and surfaces as a fault at tick time.
fn lenient_time<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

// --- REPEAT POLICY ---

#[derive(
    Debug, Clone, Copy, Eq, PartialEq, Hash, Default, Serialize, Deserialize, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum RepeatPolicy {
    #[default]
    None,
    Daily,
    Weekdays,
    Weekly,
}

impl RepeatPolicy {
    /// Short label shown next to an alarm in lists.
    pub fn label(&self) -> &'static str {
        match self {
            RepeatPolicy::None => "仅一次",
            RepeatPolicy::Daily => "每天",
            RepeatPolicy::Weekdays => "工作日",
            RepeatPolicy::Weekly => "每周",
        }
    }

    pub fn as_key(&self) -> &'static str {
        match self {
            RepeatPolicy::None => "none",
            RepeatPolicy::Daily => "daily",
            RepeatPolicy::Weekdays => "weekdays",
            RepeatPolicy::Weekly => "weekly",
        }
    }
}

impl fmt::Display for RepeatPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_key())
    }
}

// --- ALARMS ---

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    #[serde(default = "default_uid")]
    pub id: String,

    /// Weak reference to the owning task. Never dereferenced by the core.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Anchor date-time as written by the store. Kept as text so a corrupted
    /// value survives loading and is reported per alarm at evaluation time.
    #[serde(default, deserialize_with = "lenient_time")]
    pub time: String,

    #[serde(default)]
    pub repeat: RepeatPolicy,

    #[serde(default)]
    pub message: String,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl AlarmRecord {
    pub fn new(anchor: NaiveDateTime, repeat: RepeatPolicy, message: &str) -> Self {
        Self {
            id: default_uid(),
            task_id: None,
            time: anchor.format(ANCHOR_FORMAT).to_string(),
            repeat,
            message: message.to_string(),
            enabled: true,
        }
    }

    /// Builds a one-shot alarm from extractor output.
    ///
    /// The alarm is placed `lead_mins` before the parsed date/time. If that
    /// moment has already passed relative to `now`, the exact parsed time is
    /// used instead. Returns `None` when no date was found.
    pub fn from_parsed(parsed: &ParsedDateTime, now: NaiveDateTime, lead_mins: u32) -> Option<Self> {
        let date = parsed.date?;
        let time = parsed.time.unwrap_or_else(default_time);
        let scheduled = date.and_time(time);

        let mut anchor = scheduled - Duration::minutes(lead_mins as i64);
        if anchor < now {
            anchor = scheduled;
        }

        Some(Self::new(anchor, RepeatPolicy::None, &parsed.title))
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Parses the anchor into local wall-clock time.
    ///
    /// Accepts the store's own format (with or without seconds, `T` or space
    /// separated) and RFC 3339 strings carrying an offset, which are shifted
    /// into the host's local time once.
    pub fn anchor(&self) -> Result<NaiveDateTime> {
        parse_anchor(&self.time)
            .with_context(|| format!("Alarm '{}' has an unreadable time '{}'", self.id, self.time))
    }

    pub fn set_anchor(&mut self, anchor: NaiveDateTime) {
        self.time = anchor.format(ANCHOR_FORMAT).to_string();
    }
}

fn parse_anchor(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(dt);
        }
    }
    let dt = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Unrecognised date-time '{}'", raw))?;
    Ok(dt.with_timezone(&Local).naive_local())
}

/// Partial update applied by the field-editing surface.
#[derive(Debug, Clone, Default)]
pub struct AlarmPatch {
    pub time: Option<NaiveDateTime>,
    pub repeat: Option<RepeatPolicy>,
    pub message: Option<String>,
    pub enabled: Option<bool>,
    pub task_id: Option<Option<String>>,
}

impl AlarmPatch {
    pub fn apply(self, alarm: &mut AlarmRecord) {
        if let Some(t) = self.time {
            alarm.set_anchor(t);
        }
        if let Some(r) = self.repeat {
            alarm.repeat = r;
        }
        if let Some(m) = self.message {
            alarm.message = m;
        }
        if let Some(e) = self.enabled {
            alarm.enabled = e;
        }
        if let Some(t) = self.task_id {
            alarm.task_id = t;
        }
    }
}

// --- MATCHER OUTPUT ---

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MatchEvent {
    pub alarm_id: String,
    pub matched_at: NaiveDateTime,
    pub message: String,
    pub task_id: Option<String>,
}

/// A per-alarm evaluation failure. The tick carries on without it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AlarmFault {
    pub alarm_id: String,
    pub reason: String,
}
