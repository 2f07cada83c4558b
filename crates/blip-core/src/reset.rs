//! Reset applier.
//!
//! [`apply_resets`] mutates counters in memory; [`run_resets`] wraps it in
//! the fetch, apply, save-through sequence every process runs when it wakes.

use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info, warn};

use crate::counter::Counter;
use crate::error::StoreError;
use crate::policy::{is_due, ResetCalendar};
use crate::store::CounterStore;

/// Counters changed by one [`apply_resets`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResetOutcome {
    pub mutated: Vec<Counter>,
}

impl ResetOutcome {
    pub fn any_changed(&self) -> bool {
        !self.mutated.is_empty()
    }
}

/// Reset every due counter to its reset value.
///
/// A reset sets `value = reset_value` and `last_reset_date = now`, and stamps
/// `last_updated_date` with the start of the period the reset belongs to.
/// Counters whose anchor lies after `now` (clock moved backwards) are left
/// alone so `last_reset_date` never decreases.
pub fn apply_resets<Tz: TimeZone>(
    counters: &mut [Counter],
    now: DateTime<Utc>,
    calendar: &ResetCalendar<Tz>,
) -> ResetOutcome {
    let mut mutated = Vec::new();
    for counter in counters.iter_mut() {
        if now < counter.last_reset_date {
            continue;
        }
        if !is_due(counter.reset_frequency, counter.last_reset_date, now, calendar) {
            continue;
        }

        debug!(
            id = %counter.id,
            frequency = %counter.reset_frequency,
            from = counter.value,
            to = counter.reset_value,
            "resetting counter"
        );
        counter.value = counter.reset_value;
        counter.last_reset_date = now;
        counter.last_updated_date = calendar.period_start(counter.reset_frequency, now);
        mutated.push(counter.clone());
    }
    ResetOutcome { mutated }
}

/// Fetch all counters, reset the due ones and persist them.
///
/// The read and the write happen in one store transaction, so an edit made
/// by another process is never overwritten with stale values. Returns `true`
/// only when at least one reset was saved. An unavailable store or a
/// rejected save yields `false`; the next invocation recomputes from fresh
/// state.
pub fn run_resets<S, Tz>(store: &S, now: DateTime<Utc>, calendar: &ResetCalendar<Tz>) -> bool
where
    S: CounterStore + ?Sized,
    Tz: TimeZone,
{
    let applied = store.transact(|mut counters| {
        let mutated = apply_resets(&mut counters, now, calendar).mutated;
        let count = mutated.len();
        Ok::<_, StoreError>((mutated, count))
    });

    match applied {
        Ok(0) => false,
        Ok(count) => {
            info!(count, "applied counter resets");
            true
        }
        Err(err) => {
            warn!(error = %err, "resets not applied");
            false
        }
    }
}
