//! Per-process wiring: configuration, store bootstrap, calendar and notifier.

use blip_core::store::{migrate_legacy_store, shared_container_dir, LegacyPaths};
use blip_core::{Config, ConfigError, RefreshNotifier, ResetCalendar, SharedStore, SignalFileSink};
use chrono::{Local, TimeZone};
use std::error::Error;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::debug;

/// A command body that needs the observer's calendar.
///
/// The calendar's zone type differs between the system zone and a configured
/// IANA zone, so commands implement this instead of taking a closure.
pub trait WithCalendar {
    type Output;

    fn run<Tz: TimeZone>(self, calendar: ResetCalendar<Tz>) -> Self::Output;
}

/// Run `job` with the calendar described by `config`.
pub fn with_calendar<W: WithCalendar>(config: &Config, job: W) -> Result<W::Output, ConfigError> {
    let first_weekday = config.calendar.first_weekday()?;
    let minimum_days = config.calendar.minimum_days_in_first_week;
    Ok(match config.calendar.timezone()? {
        Some(tz) => job.run(
            ResetCalendar::new(tz, first_weekday).with_minimum_days_in_first_week(minimum_days),
        ),
        None => job.run(
            ResetCalendar::new(Local, first_weekday).with_minimum_days_in_first_week(minimum_days),
        ),
    })
}

/// Run the one-time legacy migration, then open the shared store.
pub fn open_store(config: &Config) -> Result<SharedStore, Box<dyn Error>> {
    let paths = LegacyPaths::for_app_group(&config.store.app_group)?;
    let outcome = migrate_legacy_store(&paths);
    debug!(?outcome, "legacy store bootstrap");
    Ok(SharedStore::open_at(&paths.shared_store)?)
}

/// Runtime that drives debounced refresh timers for this process.
pub fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
}

pub fn notifier(runtime: &Runtime, config: &Config) -> Result<RefreshNotifier, Box<dyn Error>> {
    let container = shared_container_dir(&config.store.app_group)?;
    let sink = Arc::new(SignalFileSink::in_container(&container));
    Ok(RefreshNotifier::new(
        runtime.handle().clone(),
        sink,
        config.refresh.debounce(),
    ))
}
