// File: tests/alarm_store.rs
use chrono::{NaiveDate, NaiveDateTime};
use remindful::context::{AppContext, SharedContext, TestContext};
use remindful::model::{AlarmPatch, AlarmRecord, RepeatPolicy, extract};
use remindful::storage::LocalStorage;
use remindful::store::AlarmStore;
use serial_test::serial;
use std::sync::Arc;
use tokio::sync::watch;

fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, min, 0)
        .unwrap()
}

fn test_ctx() -> SharedContext {
    Arc::new(TestContext::new())
}

#[test]
#[serial]
fn test_mutations_are_persisted() {
    let ctx = test_ctx();
    let mut store = AlarmStore::load(ctx.clone()).unwrap();
    assert!(store.is_empty());

    let a = AlarmRecord::new(at(2024, 1, 1, 9, 0), RepeatPolicy::Daily, "吃药");
    let b = AlarmRecord::new(at(2024, 1, 2, 18, 0), RepeatPolicy::None, "取快递");
    store.add(a.clone()).unwrap();
    store.add(b.clone()).unwrap();

    let reloaded = AlarmStore::load(ctx.clone()).unwrap();
    assert_eq!(reloaded.alarms(), &[a.clone(), b.clone()]);

    assert_eq!(store.toggle(&a.id).unwrap(), Some(false));
    assert!(store.delete(&b.id).unwrap());
    assert!(!store.delete(&b.id).unwrap());

    let on_disk = LocalStorage::load_alarms(ctx.as_ref()).unwrap();
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk[0].id, a.id);
    assert!(!on_disk[0].enabled);
}

#[test]
#[serial]
fn test_adds_from_two_stores_are_both_kept() {
    let ctx = test_ctx();
    let mut first = AlarmStore::load(ctx.clone()).unwrap();
    let mut second = AlarmStore::load(ctx.clone()).unwrap();

    let a = AlarmRecord::new(at(2024, 1, 1, 9, 0), RepeatPolicy::Daily, "a");
    let b = AlarmRecord::new(at(2024, 1, 1, 10, 0), RepeatPolicy::Daily, "b");
    first.add(a.clone()).unwrap();
    second.add(b.clone()).unwrap();

    assert_eq!(second.alarms(), &[a.clone(), b.clone()]);
    let reloaded = AlarmStore::load(ctx).unwrap();
    assert_eq!(reloaded.alarms(), &[a, b]);
}

#[test]
#[serial]
fn test_store_loads_around_a_bad_record() {
    let ctx = test_ctx();
    std::fs::write(
        ctx.get_alarms_path().unwrap(),
        r#"{"version":1,"alarms":[
            {"id":"good","time":"2024-01-01T09:00:00","repeat":"daily"},
            {"id":"bad","time":"2024-01-01T09:00:00","repeat":"monthly"}
        ]}"#,
    )
    .unwrap();

    let store = AlarmStore::load(ctx).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.get("good").is_some());
}

#[test]
#[serial]
fn test_unknown_ids_are_reported_not_errors() {
    let ctx = test_ctx();
    let mut store = AlarmStore::load(ctx).unwrap();
    assert_eq!(store.toggle("nope").unwrap(), None);
    assert!(!store.set_enabled("nope", true).unwrap());
    assert_eq!(store.update("nope", AlarmPatch::default()).unwrap(), None);
}

#[test]
fn test_update_applies_patch() {
    let mut store = AlarmStore::new();
    let a = AlarmRecord::new(at(2024, 1, 1, 9, 0), RepeatPolicy::None, "old");
    let id = a.id.clone();
    store.add(a).unwrap();

    let updated = store
        .update(
            &id,
            AlarmPatch {
                time: Some(at(2024, 1, 1, 10, 30)),
                repeat: Some(RepeatPolicy::Weekly),
                ..Default::default()
            },
        )
        .unwrap()
        .unwrap();
    assert_eq!(updated.anchor().unwrap(), at(2024, 1, 1, 10, 30));
    assert_eq!(updated.repeat, RepeatPolicy::Weekly);
    assert_eq!(updated.message, "old");
    assert_eq!(store.get(&id), Some(&updated));
}

#[test]
fn test_resolve_id_by_prefix() {
    let mut store = AlarmStore::new();
    let mut a = AlarmRecord::new(at(2024, 1, 1, 9, 0), RepeatPolicy::None, "a");
    a.id = "abc-111".to_string();
    let mut b = AlarmRecord::new(at(2024, 1, 1, 9, 0), RepeatPolicy::None, "b");
    b.id = "abd-222".to_string();
    store.add(a).unwrap();
    store.add(b).unwrap();

    assert_eq!(store.resolve_id("abc"), Some("abc-111".to_string()));
    assert_eq!(store.resolve_id("abd-222"), Some("abd-222".to_string()));
    assert_eq!(store.resolve_id("ab"), None);
    assert_eq!(store.resolve_id("zzz"), None);
    assert_eq!(store.resolve_id(""), None);
}

#[test]
fn test_subscriber_sees_every_change() {
    let mut store = AlarmStore::new();
    let (tx, rx) = watch::channel(Vec::new());
    let a = AlarmRecord::new(at(2024, 1, 1, 9, 0), RepeatPolicy::Daily, "x");
    store.add(a.clone()).unwrap();

    store.subscribe(tx);
    assert_eq!(rx.borrow().len(), 1);

    store.toggle(&a.id).unwrap();
    assert!(!rx.borrow()[0].enabled);

    store.delete(&a.id).unwrap();
    assert!(rx.borrow().is_empty());
}

#[test]
fn test_store_survives_dropped_subscriber() {
    let mut store = AlarmStore::new();
    let (tx, rx) = watch::channel(Vec::new());
    store.subscribe(tx);
    drop(rx);

    let a = AlarmRecord::new(at(2024, 1, 1, 9, 0), RepeatPolicy::Daily, "x");
    store.add(a).unwrap();
    assert_eq!(store.len(), 1);
}

#[test]
#[serial]
fn test_unreadable_anchor_survives_reload() {
    let ctx = test_ctx();
    std::fs::write(
        ctx.get_alarms_path().unwrap(),
        r#"{"version":1,"alarms":[{"id":"bad","time":"soon","repeat":"daily"}]}"#,
    )
    .unwrap();

    let store = AlarmStore::load(ctx.clone()).unwrap();
    let alarm = store.get("bad").unwrap();
    assert_eq!(alarm.time, "soon");
    assert!(alarm.anchor().is_err());
}

#[test]
fn test_quick_create_applies_lead_time() {
    let now = at(2024, 1, 1, 8, 0);
    let parsed = extract("明天早上9点开会", now);

    let alarm = AlarmRecord::from_parsed(&parsed, now, 10).unwrap();
    assert_eq!(alarm.anchor().unwrap(), at(2024, 1, 2, 8, 50));
    assert_eq!(alarm.repeat, RepeatPolicy::None);
    assert_eq!(alarm.message, "开会");
    assert!(alarm.enabled);
}

#[test]
fn test_quick_create_falls_back_when_lead_has_passed() {
    let now = at(2024, 1, 2, 8, 55);
    let parsed = extract("今天9点开会", now);
    let alarm = AlarmRecord::from_parsed(&parsed, now, 10).unwrap();
    assert_eq!(alarm.anchor().unwrap(), at(2024, 1, 2, 9, 0));
}

#[test]
fn test_quick_create_needs_a_date() {
    let now = at(2024, 1, 1, 8, 0);
    assert!(AlarmRecord::from_parsed(&extract("14:30 看牙医", now), now, 10).is_none());
    assert!(AlarmRecord::from_parsed(&extract("随便聊聊", now), now, 10).is_none());
}

#[test]
fn test_quick_create_uses_default_time() {
    let now = at(2024, 1, 1, 8, 0);
    let alarm = AlarmRecord::from_parsed(&extract("后天交房租", now), now, 0).unwrap();
    assert_eq!(alarm.anchor().unwrap(), at(2024, 1, 3, 9, 0));
}
