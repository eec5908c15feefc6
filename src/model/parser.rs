// File: src/model/parser.rs
//! Extraction of dates and clock times from free-form Chinese text.
//!
//! Each category (date, time) is an ordered list of independent rules. The
//! first rule that produces a valid value wins, and its matched substring is
//! removed from the working copy before the next category runs.
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOUR: u32 = 9;

/// Leading phrases that carry no meaning for the title.
const FILLER_PREFIXES: &[&str] = &["提醒我", "帮我", "记得", "请", "要"];

pub fn default_time() -> NaiveTime {
    NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDateTime {
    pub date: Option<NaiveDate>,
    /// Effective time. Holds the default when a date was found without an
    /// explicit time; check `has_time` to tell the two apart.
    pub time: Option<NaiveTime>,
    pub title: String,
    pub has_date: bool,
    /// True only when a time expression was found in the text.
    pub has_time: bool,
}

impl ParsedDateTime {
    pub fn is_time_defaulted(&self) -> bool {
        self.time.is_some() && !self.has_time
    }

    pub fn datetime(&self) -> Option<NaiveDateTime> {
        Some(self.date?.and_time(self.time?))
    }
}

// --- RULES ---

struct DateRule {
    name: &'static str,
    pattern: Regex,
    resolve: fn(&Captures, NaiveDate) -> Option<NaiveDate>,
}

struct TimeRule {
    name: &'static str,
    pattern: Regex,
    resolve: fn(&Captures) -> Option<NaiveTime>,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("date/time pattern should compile - this is a bug")
}

static DATE_RULES: Lazy<Vec<DateRule>> = Lazy::new(|| {
    vec![
        DateRule {
            name: "full_date",
            pattern: compile(r"([0-9]{4})\s*年\s*([0-9]{1,2})\s*月\s*([0-9]{1,2})\s*[日号]"),
            resolve: resolve_full_date,
        },
        DateRule {
            name: "short_date",
            pattern: compile(r"([0-9]{1,2})\s*月\s*([0-9]{1,2})\s*[日号]"),
            resolve: resolve_short_date,
        },
        DateRule {
            name: "relative_day",
            // Longest word first so 大后天 is not read as 后天.
            pattern: compile(r"大后天|今天|今日|明天|明日|后天|后日"),
            resolve: resolve_relative_day,
        },
        DateRule {
            name: "next_week_weekday",
            pattern: compile(r"下个?(?:周|星期)([一二三四五六日天])"),
            resolve: resolve_next_week,
        },
        DateRule {
            name: "this_week_weekday",
            // Group 1 catches 上周X so it is rejected rather than read as this week.
            pattern: compile(r"(上个?)?(?:[这本今]个?)?(?:周|星期)([一二三四五六日天])"),
            resolve: resolve_this_week,
        },
    ]
});

static TIME_RULES: Lazy<Vec<TimeRule>> = Lazy::new(|| {
    vec![
        TimeRule {
            name: "part_of_day",
            pattern: compile(
                r"(上午|早上|早晨|凌晨|中午|下午|傍晚|晚上|夜里|深夜)\s*([0-9]{1,2})(?:[点时](?:(半)|([0-9]{1,2})分?)?|[:：]([0-9]{2}))",
            ),
            resolve: resolve_part_of_day,
        },
        TimeRule {
            name: "clock",
            pattern: compile(r"([0-9]{1,2})[:：]([0-9]{2})"),
            resolve: resolve_clock,
        },
        TimeRule {
            name: "hour_minute",
            pattern: compile(r"([0-9]{1,2})点(?:(半)|([0-9]{1,2})分?)"),
            resolve: resolve_hour_minute,
        },
        TimeRule {
            name: "hour",
            pattern: compile(r"([0-9]{1,2})点钟?"),
            resolve: resolve_hour,
        },
    ]
});

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| compile(r"[，,。.！!？?；;：:、]"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| compile(r"\s+"));

fn num(caps: &Captures, idx: usize) -> Option<u32> {
    caps.get(idx)?.as_str().parse::<u32>().ok()
}

fn weekday_from_char(s: &str) -> Option<Weekday> {
    match s {
        "一" => Some(Weekday::Mon),
        "二" => Some(Weekday::Tue),
        "三" => Some(Weekday::Wed),
        "四" => Some(Weekday::Thu),
        "五" => Some(Weekday::Fri),
        "六" => Some(Weekday::Sat),
        "日" | "天" => Some(Weekday::Sun),
        _ => None,
    }
}

fn resolve_full_date(caps: &Captures, _today: NaiveDate) -> Option<NaiveDate> {
    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, num(caps, 2)?, num(caps, 3)?)
}

fn resolve_short_date(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let (month, day) = (num(caps, 1)?, num(caps, 2)?);
    match NaiveDate::from_ymd_opt(today.year(), month, day) {
        Some(d) if d >= today => Some(d),
        // Already passed this year (or does not exist this year, e.g. 2月29日).
        _ => NaiveDate::from_ymd_opt(today.year() + 1, month, day),
    }
}

fn resolve_relative_day(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let offset = match caps.get(0)?.as_str() {
        "今天" | "今日" => 0,
        "明天" | "明日" => 1,
        "后天" | "后日" => 2,
        "大后天" => 3,
        _ => return None,
    };
    today.checked_add_signed(Duration::days(offset))
}

fn resolve_next_week(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    let target = weekday_from_char(caps.get(1)?.as_str())?;
    // Same weekday of the current Monday-started week, pushed one week on.
    let diff = target.num_days_from_monday() as i64 - today.weekday().num_days_from_monday() as i64;
    today.checked_add_signed(Duration::days(diff + 7))
}

fn resolve_this_week(caps: &Captures, today: NaiveDate) -> Option<NaiveDate> {
    if caps.get(1).is_some() {
        return None;
    }
    let target = weekday_from_char(caps.get(2)?.as_str())?;
    let mut diff =
        target.num_days_from_monday() as i64 - today.weekday().num_days_from_monday() as i64;
    if diff < 0 {
        diff += 7;
    }
    today.checked_add_signed(Duration::days(diff))
}

fn resolve_part_of_day(caps: &Captures) -> Option<NaiveTime> {
    let period = caps.get(1)?.as_str();
    let mut hour = num(caps, 2)?;
    let minute = if caps.get(3).is_some() {
        30
    } else {
        num(caps, 4).or_else(|| num(caps, 5)).unwrap_or(0)
    };

    let is_pm = matches!(period, "中午" | "下午" | "傍晚" | "晚上" | "夜里" | "深夜");
    if is_pm && hour < 12 {
        hour += 12;
    }
    if hour == 24 {
        hour = 0;
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn resolve_clock(caps: &Captures) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(num(caps, 1)?, num(caps, 2)?, 0)
}

fn resolve_hour_minute(caps: &Captures) -> Option<NaiveTime> {
    let minute = if caps.get(2).is_some() {
        30
    } else {
        num(caps, 3)?
    };
    NaiveTime::from_hms_opt(num(caps, 1)?, minute, 0)
}

fn resolve_hour(caps: &Captures) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(num(caps, 1)?, 0, 0)
}

/// Removes `start..end` from `text`.
fn consume(text: &mut String, start: usize, end: usize) {
    text.replace_range(start..end, "");
}

fn apply_date_rules(text: &mut String, today: NaiveDate) -> Option<NaiveDate> {
    for rule in DATE_RULES.iter() {
        let hit = rule.pattern.captures_iter(text).find_map(|caps| {
            let whole = caps.get(0)?;
            (rule.resolve)(&caps, today).map(|d| (d, whole.start(), whole.end()))
        });
        if let Some((date, start, end)) = hit {
            log::trace!("date rule '{}' matched {}", rule.name, &text[start..end]);
            consume(text, start, end);
            return Some(date);
        }
    }
    None
}

fn apply_time_rules(text: &mut String) -> Option<NaiveTime> {
    for rule in TIME_RULES.iter() {
        let hit = rule.pattern.captures_iter(text).find_map(|caps| {
            let whole = caps.get(0)?;
            (rule.resolve)(&caps).map(|t| (t, whole.start(), whole.end()))
        });
        if let Some((time, start, end)) = hit {
            log::trace!("time rule '{}' matched {}", rule.name, &text[start..end]);
            consume(text, start, end);
            return Some(time);
        }
    }
    None
}

fn clean_title(text: &str) -> String {
    let without_punct = PUNCTUATION.replace_all(text, "");
    let collapsed = WHITESPACE.replace_all(without_punct.trim(), " ");
    let mut title: &str = &collapsed;

    // Strip stacked fillers such as "记得要".
    loop {
        let before = title;
        for filler in FILLER_PREFIXES {
            if let Some(rest) = title.strip_prefix(filler) {
                title = rest.trim_start();
            }
        }
        if title == before {
            break;
        }
    }
    title.trim().to_string()
}

// --- EXTRACTOR ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extractor {
    default_time: NaiveTime,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            default_time: default_time(),
        }
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time applied when a date is found without an explicit time.
    pub fn with_default_time(mut self, time: NaiveTime) -> Self {
        self.default_time = time;
        self
    }

    /// Splits `text` into date, time and remaining title.
    ///
    /// Relative expressions resolve against the calendar date of
    /// `reference_now`. Never fails: text without recognised expressions
    /// comes back with both flags unset.
    pub fn extract(&self, text: &str, reference_now: NaiveDateTime) -> ParsedDateTime {
        let today = reference_now.date();
        let mut working = text.trim().to_string();

        let date = apply_date_rules(&mut working, today);
        let explicit_time = apply_time_rules(&mut working);

        let time = match (date, explicit_time) {
            (_, Some(t)) => Some(t),
            (Some(_), None) => Some(self.default_time),
            (None, None) => None,
        };

        let mut title = clean_title(&working);
        if title.is_empty() {
            title = text.trim().to_string();
        }

        ParsedDateTime {
            date,
            time,
            title,
            has_date: date.is_some(),
            has_time: explicit_time.is_some(),
        }
    }
}

/// Shorthand for `Extractor::default().extract(..)`.
pub fn extract(text: &str, reference_now: NaiveDateTime) -> ParsedDateTime {
    Extractor::default().extract(text, reference_now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        // Monday
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_clean_title_strips_stacked_fillers() {
        assert_eq!(clean_title("记得要，买菜！"), "买菜");
        assert_eq!(clean_title("提醒我 交房租"), "交房租");
        assert_eq!(clean_title("请帮我 订票"), "订票");
        assert_eq!(clean_title("重要会议"), "重要会议");
    }

    #[test]
    fn test_rule_order_prefers_longest_relative_word() {
        let p = extract("大后天体检", now());
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2024, 1, 4));
        assert_eq!(p.title, "体检");
    }

    #[test]
    fn test_invalid_first_occurrence_does_not_block_later_one() {
        let mut text = "13月1日或者2月3日".to_string();
        let d = apply_date_rules(&mut text, now().date());
        assert_eq!(d, NaiveDate::from_ymd_opt(2024, 2, 3));
        assert_eq!(text, "13月1日或者");
    }

    #[test]
    fn test_last_week_weekday_is_not_a_date() {
        let p = extract("上周三的会议纪要", now());
        assert_eq!(p.date, None);
        assert_eq!(p.title, "上周三的会议纪要");

        // A later plain weekday is still found.
        let p = extract("上个星期五没开成 改到周三", now());
        assert_eq!(p.date, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert!(p.title.starts_with("上个星期五"));
    }

    #[test]
    fn test_time_rules_return_none_without_match() {
        let mut text = "没有时间".to_string();
        assert_eq!(apply_time_rules(&mut text), None);
        assert_eq!(text, "没有时间");
    }
}
