// Clock-time recognition of the Chinese extractor.
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use remindful::model::extract;

fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

fn hm(h: u32, m: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(h, m, 0)
}

#[test]
fn test_part_of_day_shifts_afternoon_and_evening() {
    assert_eq!(extract("下午3点开会", now()).time, hm(15, 0));
    assert_eq!(extract("晚上9:15看电影", now()).time, hm(21, 15));
    assert_eq!(extract("傍晚6点半跑步", now()).time, hm(18, 30));
    assert_eq!(extract("中午12点吃饭", now()).time, hm(12, 0));
    assert_eq!(extract("中午1点午睡", now()).time, hm(13, 0));
    assert_eq!(extract("晚上24点睡觉", now()).time, hm(0, 0));
}

#[test]
fn test_part_of_day_keeps_morning_hours() {
    assert_eq!(extract("早上7点起床", now()).time, hm(7, 0));
    assert_eq!(extract("凌晨1点看球", now()).time, hm(1, 0));
    assert_eq!(extract("上午10点20分面试", now()).time, hm(10, 20));
    assert_eq!(extract("上午12点交表", now()).time, hm(12, 0));
}

#[test]
fn test_plain_clock_times() {
    let p = extract("14:30 看牙医", now());
    assert_eq!(p.time, hm(14, 30));
    assert_eq!(p.date, None);
    assert!(p.has_time);
    assert!(!p.has_date);
    assert_eq!(p.title, "看牙医");

    assert_eq!(extract("8：05 出门", now()).time, hm(8, 5));
    assert_eq!(extract("10点20分开会", now()).time, hm(10, 20));
    assert_eq!(extract("7点半吃早饭", now()).time, hm(7, 30));
}

#[test]
fn test_bare_hour() {
    let p = extract("7点钟起床", now());
    assert_eq!(p.time, hm(7, 0));
    assert_eq!(p.title, "起床");

    assert_eq!(extract("19点下班", now()).time, hm(19, 0));
}

#[test]
fn test_out_of_range_times_are_ignored() {
    let p = extract("25:99 出发", now());
    assert_eq!(p.time, None);
    assert!(!p.has_time);

    assert_eq!(extract("30点开会", now()).time, None);
}

#[test]
fn test_first_valid_time_wins() {
    // 25:00 is not a time, so the later 09:30 is used.
    let p = extract("25:00 还是 09:30 出发", now());
    assert_eq!(p.time, hm(9, 30));
}

#[test]
fn test_date_and_time_together() {
    let p = extract("提醒我下周六下午3点去超市", now());
    assert_eq!(p.date, NaiveDate::from_ymd_opt(2024, 1, 13));
    assert_eq!(p.time, hm(15, 0));
    assert_eq!(p.title, "去超市");
    assert!(!p.is_time_defaulted());
}
