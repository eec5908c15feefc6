// File: ./src/model/display.rs
use crate::model::item::{AlarmRecord, RepeatPolicy};
use crate::model::parser::ParsedDateTime;
use chrono::{Datelike, NaiveDate, Weekday};

pub fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "周一",
        Weekday::Tue => "周二",
        Weekday::Wed => "周三",
        Weekday::Thu => "周四",
        Weekday::Fri => "周五",
        Weekday::Sat => "周六",
        Weekday::Sun => "周日",
    }
}

/// Human label for `date` as seen from `today`: 今天, 明天, ..., a weekday
/// inside the coming week, otherwise the ISO date.
pub fn relative_label(date: NaiveDate, today: NaiveDate) -> String {
    let diff = (date - today).num_days();
    match diff {
        0 => "今天".to_string(),
        1 => "明天".to_string(),
        2 => "后天".to_string(),
        3 => "大后天".to_string(),
        -1 => "昨天".to_string(),
        -2 => "前天".to_string(),
        4..=6 => format!("{}（{}）", weekday_label(date.weekday()), date.format("%Y-%m-%d")),
        _ => date.format("%Y-%m-%d").to_string(),
    }
}

pub trait AlarmDisplay {
    fn to_list_line(&self, today: NaiveDate) -> String;
}

impl AlarmDisplay for AlarmRecord {
    fn to_list_line(&self, today: NaiveDate) -> String {
        let check = if self.enabled { "[on ]" } else { "[off]" };
        let when = match self.anchor() {
            Ok(anchor) => match self.repeat {
                RepeatPolicy::None => format!(
                    "{} {}",
                    relative_label(anchor.date(), today),
                    anchor.format("%H:%M")
                ),
                RepeatPolicy::Weekly => format!(
                    "{} {}",
                    weekday_label(anchor.weekday()),
                    anchor.format("%H:%M")
                ),
                _ => anchor.format("%H:%M").to_string(),
            },
            Err(_) => format!("<invalid: {}>", self.time),
        };
        format!(
            "{} {}  {}  ({})  {}",
            check,
            self.id,
            when,
            self.repeat.label(),
            self.message
        )
    }
}

/// One-line preview of extractor output, as shown before creating an alarm.
pub fn preview(parsed: &ParsedDateTime, today: NaiveDate) -> String {
    let mut s = parsed.title.clone();
    if let Some(d) = parsed.date {
        s.push_str(&format!("  @{}", relative_label(d, today)));
    }
    if let Some(t) = parsed.time {
        s.push_str(&format!(" {}", t.format("%H:%M")));
        if parsed.is_time_defaulted() {
            s.push_str(" (默认)");
        }
    }
    s
}
