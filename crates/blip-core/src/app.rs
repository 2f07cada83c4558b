//! Interactive-process lifecycle and counter edits.
//!
//! [`App`] wires one store handle, the observer's calendar and a refresh
//! notifier together. It is constructed once per process and passed to
//! whatever drives the presentation layer.

use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::counter::Counter;
use crate::error::{CoreError, Result};
use crate::notify::RefreshNotifier;
use crate::policy::ResetCalendar;
use crate::reset::run_resets;
use crate::store::CounterStore;

pub struct App<S, Tz: TimeZone> {
    store: S,
    calendar: ResetCalendar<Tz>,
    notifier: RefreshNotifier,
}

impl<S: CounterStore, Tz: TimeZone> App<S, Tz> {
    pub fn new(store: S, calendar: ResetCalendar<Tz>, notifier: RefreshNotifier) -> Self {
        Self {
            store,
            calendar,
            notifier,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn calendar(&self) -> &ResetCalendar<Tz> {
        &self.calendar
    }

    pub fn notifier(&self) -> &RefreshNotifier {
        &self.notifier
    }

    /// Process start. Returns whether any counter was reset.
    pub fn on_launch(&self, now: DateTime<Utc>) -> bool {
        self.apply_resets(now)
    }

    /// Returning to the foreground. Returns whether any counter was reset.
    pub fn on_foreground(&self, now: DateTime<Utc>) -> bool {
        self.apply_resets(now)
    }

    fn apply_resets(&self, now: DateTime<Utc>) -> bool {
        let changed = run_resets(&self.store, now, &self.calendar);
        if changed {
            self.notifier.request_refresh();
        }
        changed
    }

    /// All counters for list rendering; empty when the store is unavailable.
    pub fn counters(&self) -> Vec<Counter> {
        self.store.fetch_all().unwrap_or_else(|err| {
            warn!(error = %err, "store unavailable, showing no counters");
            Vec::new()
        })
    }

    pub fn counter(&self, id: Uuid) -> Result<Counter> {
        self.store.get(id)?.ok_or(CoreError::NotFound(id))
    }

    /// Persist a new counter at the end of the list.
    pub fn create(&self, mut counter: Counter) -> Result<Counter> {
        counter.validate()?;
        let counter = self.store.transact(|counters| {
            counter.sort_order = counters
                .iter()
                .map(|c| c.sort_order + 1)
                .max()
                .unwrap_or(0);
            Ok::<_, CoreError>((vec![counter.clone()], counter))
        })?;
        self.notifier.request_refresh();
        Ok(counter)
    }

    pub fn increment(&self, id: Uuid, now: DateTime<Utc>) -> Result<Counter> {
        self.modify(id, |counter| counter.increment(now))
    }

    pub fn decrement(&self, id: Uuid, now: DateTime<Utc>) -> Result<Counter> {
        self.modify(id, |counter| counter.decrement(now))
    }

    /// Save an edited counter. `last_reset_date` is kept from the stored row.
    pub fn update(&self, mut edited: Counter) -> Result<Counter> {
        edited.validate()?;
        self.modify(edited.id, move |stored| {
            edited.last_reset_date = stored.last_reset_date;
            edited.created_at = stored.created_at;
            *stored = edited;
        })
    }

    pub fn delete(&self, id: Uuid) -> Result<()> {
        if !self.store.delete(id)? {
            return Err(CoreError::NotFound(id));
        }
        self.notifier.request_refresh();
        Ok(())
    }

    /// Apply `edit` to the stored row and write it back in one transaction,
    /// so a reset saved by another process in the meantime is not undone.
    fn modify(&self, id: Uuid, edit: impl FnOnce(&mut Counter)) -> Result<Counter> {
        let counter = self.store.transact(|counters| {
            let mut counter = counters
                .into_iter()
                .find(|c| c.id == id)
                .ok_or(CoreError::NotFound(id))?;
            edit(&mut counter);
            Ok::<_, CoreError>((vec![counter.clone()], counter))
        })?;
        self.notifier.request_refresh();
        Ok(counter)
    }
}
