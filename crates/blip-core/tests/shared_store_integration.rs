//! Integration tests for the shared store as seen from two processes.
//!
//! Each process opens its own handle on the same database file; the tests
//! model the interactive app and the widget extension that way.

use blip_core::store::{
    migrate_legacy_store, LegacyPaths, MigrationOutcome, Preferences, LEGACY_STORE_FILE_NAME,
    STORE_FILE_NAME,
};
use blip_core::notify::DEFAULT_DEBOUNCE;
use blip_core::{
    apply_resets, run_resets, App, Counter, CounterStore, RefreshNotifier, RefreshSink,
    ResetCalendar, ResetFrequency, Selection, SharedStore, StoreError, TimelineProvider,
    WidgetKind,
};
use chrono::{DateTime, TimeZone, Utc, Weekday};
use chrono_tz::UTC;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

fn calendar() -> ResetCalendar<chrono_tz::Tz> {
    ResetCalendar::new(UTC, Weekday::Sun)
}

fn daily(title: &str, value: i64, last_reset: DateTime<Utc>) -> Counter {
    let mut c = Counter::new(title, last_reset);
    c.reset_frequency = ResetFrequency::Daily;
    c.value = value;
    c
}

#[test]
fn writes_from_one_handle_are_visible_to_another() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(STORE_FILE_NAME);
    let app = SharedStore::open_at(&path).unwrap();
    let widget = SharedStore::open_at(&path).unwrap();

    let mut c = daily("Water", 3, utc(2025, 4, 10, 8, 0));
    app.save(std::slice::from_ref(&c)).unwrap();
    assert_eq!(widget.fetch_all().unwrap(), vec![c.clone()]);

    c.increment(utc(2025, 4, 10, 9, 0));
    app.save(std::slice::from_ref(&c)).unwrap();
    assert_eq!(widget.get(c.id).unwrap().unwrap().value, 4);
}

#[test]
fn reset_applied_by_widget_is_not_repeated_by_app() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(STORE_FILE_NAME);
    let app = SharedStore::open_at(&path).unwrap();
    let widget = SharedStore::open_at(&path).unwrap();

    let c = daily("Coffee", 4, utc(2025, 4, 9, 8, 0));
    app.save(std::slice::from_ref(&c)).unwrap();

    let widget_wake = utc(2025, 4, 10, 0, 1);
    let timeline = TimelineProvider::new(&widget, calendar(), WidgetKind::Single)
        .timeline(&Selection::single(c.id.to_string()), widget_wake);
    assert_eq!(timeline.entries[0].counters[0].value, 0);

    // Later the same day the app comes to the foreground.
    assert!(!run_resets(&app, utc(2025, 4, 10, 7, 30), &calendar()));
    let stored = app.get(c.id).unwrap().unwrap();
    assert_eq!(stored.value, 0);
    assert_eq!(stored.last_reset_date, widget_wake);
}

struct NoopSink;

impl RefreshSink for NoopSink {
    fn reload_all_timelines(&self) {}
}

fn app_at(path: &Path) -> App<SharedStore, chrono_tz::Tz> {
    let notifier = RefreshNotifier::new(Handle::current(), Arc::new(NoopSink), DEFAULT_DEBOUNCE);
    App::new(SharedStore::open_at(path).unwrap(), calendar(), notifier)
}

#[tokio::test]
async fn stale_app_edits_do_not_undo_widget_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(STORE_FILE_NAME);
    let app = app_at(&path);
    let widget = SharedStore::open_at(&path).unwrap();

    let c = daily("Coffee", 5, utc(2025, 4, 9, 8, 0));
    app.store().save(std::slice::from_ref(&c)).unwrap();
    // The edit form was opened before midnight.
    let mut stale = app.counter(c.id).unwrap();

    let widget_wake = utc(2025, 4, 10, 0, 1);
    assert!(run_resets(&widget, widget_wake, &calendar()));

    let tapped = app.increment(c.id, utc(2025, 4, 10, 0, 2)).unwrap();
    assert_eq!(tapped.value, 1);
    assert_eq!(tapped.last_reset_date, widget_wake);

    stale.title = "Espresso".into();
    let saved = app.update(stale).unwrap();
    assert_eq!(saved.title, "Espresso");
    assert_eq!(saved.last_reset_date, widget_wake);
    assert!(!run_resets(&widget, utc(2025, 4, 10, 9, 0), &calendar()));
}

#[test]
fn writes_from_another_handle_wait_for_reset_transaction() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(STORE_FILE_NAME);
    let app = SharedStore::open_at(&path).unwrap();
    let widget = SharedStore::open_at(&path).unwrap();

    let c = daily("Water", 4, utc(2025, 4, 9, 8, 0));
    app.save(std::slice::from_ref(&c)).unwrap();

    let mut renamed = c.clone();
    renamed.title = "Sparkling".into();
    let attempt = widget
        .transact(|mut counters| {
            // The widget holds the write lock between its read and its write.
            let attempt = app.save(std::slice::from_ref(&renamed));
            let mutated = apply_resets(&mut counters, utc(2025, 4, 10, 0, 1), &calendar()).mutated;
            Ok::<_, StoreError>((mutated, attempt))
        })
        .unwrap();
    assert!(attempt.is_err());

    let stored = app.get(c.id).unwrap().unwrap();
    assert_eq!(stored.title, "Water");
    assert_eq!(stored.value, 0);

    // Once the reset has committed, the app's edit goes through on top of it.
    let mut renamed = stored.clone();
    renamed.title = "Sparkling".into();
    app.save(std::slice::from_ref(&renamed)).unwrap();
    assert_eq!(widget.get(c.id).unwrap().unwrap(), renamed);
}

#[test]
fn reopening_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(STORE_FILE_NAME);
    let c = daily("Steps", 120, utc(2025, 4, 10, 8, 0));
    {
        let store = SharedStore::open_at(&path).unwrap();
        store.save(std::slice::from_ref(&c)).unwrap();
    }
    let store = SharedStore::open_at(&path).unwrap();
    assert_eq!(store.fetch_all().unwrap(), vec![c]);
}

fn legacy_paths(root: &Path) -> LegacyPaths {
    LegacyPaths {
        legacy_store: root.join("private").join(LEGACY_STORE_FILE_NAME),
        shared_store: root.join("group").join(STORE_FILE_NAME),
        preferences: root.join("preferences.toml"),
    }
}

#[test]
fn legacy_store_is_copied_once() {
    let dir = tempfile::tempdir().unwrap();
    let paths = legacy_paths(dir.path());
    std::fs::create_dir_all(paths.legacy_store.parent().unwrap()).unwrap();

    let c = daily("Legacy", 9, utc(2025, 1, 5, 8, 0));
    {
        let legacy = SharedStore::open_at(&paths.legacy_store).unwrap();
        legacy.save(std::slice::from_ref(&c)).unwrap();
    }

    match migrate_legacy_store(&paths) {
        MigrationOutcome::Copied { files } => assert!(files >= 1),
        other => panic!("expected copy, got {other:?}"),
    }
    let shared = SharedStore::open_at(&paths.shared_store).unwrap();
    assert_eq!(shared.get(c.id).unwrap().unwrap().title, "Legacy");

    assert!(matches!(
        migrate_legacy_store(&paths),
        MigrationOutcome::AlreadyAttempted
    ));
}

#[test]
fn existing_shared_store_is_not_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let paths = legacy_paths(dir.path());
    std::fs::create_dir_all(paths.legacy_store.parent().unwrap()).unwrap();
    std::fs::create_dir_all(paths.shared_store.parent().unwrap()).unwrap();
    std::fs::write(&paths.legacy_store, b"legacy").unwrap();
    std::fs::write(&paths.shared_store, b"shared").unwrap();

    assert!(matches!(
        migrate_legacy_store(&paths),
        MigrationOutcome::SharedStoreExists
    ));
    assert_eq!(std::fs::read(&paths.shared_store).unwrap(), b"shared");
    assert!(Preferences::load_from(&paths.preferences).did_migrate_to_shared_store);
}

#[test]
fn failed_copy_is_never_retried() {
    let dir = tempfile::tempdir().unwrap();
    let paths = legacy_paths(dir.path());
    std::fs::create_dir_all(paths.legacy_store.parent().unwrap()).unwrap();
    std::fs::write(&paths.legacy_store, b"legacy").unwrap();
    // A regular file where the container directory should be.
    std::fs::write(dir.path().join("group"), b"not a directory").unwrap();

    assert!(matches!(
        migrate_legacy_store(&paths),
        MigrationOutcome::Failed(_)
    ));
    assert!(matches!(
        migrate_legacy_store(&paths),
        MigrationOutcome::AlreadyAttempted
    ));
}
