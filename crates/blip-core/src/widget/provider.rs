//! Timeline provider: answers the widget host's placeholder, snapshot and
//! timeline requests.
//!
//! A widget host only redraws at instants it was told about in advance, so a
//! timeline carries two entries: the state now, and the state at the nearest
//! reset boundary among the selected counters. The post-reset values are
//! projected here rather than waiting for the host to wake us at the boundary.

use chrono::{DateTime, Duration, TimeZone, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::entry::{CounterSnapshot, ReloadPolicy, Selection, Timeline, TimelineEntry, WidgetKind};
use crate::counter::Counter;
use crate::error::WidgetError;
use crate::policy::{next_boundary, ResetCalendar};
use crate::reset::apply_resets;
use crate::store::CounterStore;

/// Reload delay when no selected counter ever resets.
pub fn default_refresh() -> Duration {
    Duration::minutes(30)
}

pub struct TimelineProvider<S, Tz: TimeZone> {
    store: S,
    calendar: ResetCalendar<Tz>,
    kind: WidgetKind,
    default_refresh: Duration,
}

impl<S: CounterStore, Tz: TimeZone> TimelineProvider<S, Tz> {
    pub fn new(store: S, calendar: ResetCalendar<Tz>, kind: WidgetKind) -> Self {
        Self {
            store,
            calendar,
            kind,
            default_refresh: default_refresh(),
        }
    }

    pub fn with_default_refresh(mut self, delay: Duration) -> Self {
        self.default_refresh = delay;
        self
    }

    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    /// Sample data; never touches the store.
    pub fn placeholder(&self, now: DateTime<Utc>) -> TimelineEntry {
        TimelineEntry::placeholder(self.kind, now)
    }

    /// Current state for previews. Due resets are reflected but not saved.
    pub fn snapshot(&self, selection: &Selection, now: DateTime<Utc>) -> TimelineEntry {
        match self.resolve(selection) {
            Ok(mut counters) => {
                apply_resets(&mut counters, now, &self.calendar);
                current_entry(&counters, now)
            }
            Err(err) => {
                debug!(error = %err, "snapshot falling back to placeholder");
                self.placeholder(now)
            }
        }
    }

    /// Current entry plus the projected entry at the nearest reset boundary.
    pub fn timeline(&self, selection: &Selection, now: DateTime<Utc>) -> Timeline {
        let counters = match self.resolve_and_reset(selection, now) {
            Ok(counters) => counters,
            Err(WidgetError::Store(err)) => {
                warn!(error = %err, "widget could not persist resets, retrying next timeline");
                match self.resolve(selection) {
                    Ok(mut counters) => {
                        apply_resets(&mut counters, now, &self.calendar);
                        counters
                    }
                    Err(err) => return self.placeholder_timeline(&err, now),
                }
            }
            Err(err) => return self.placeholder_timeline(&err, now),
        };

        let boundaries: Vec<Option<DateTime<Utc>>> = counters
            .iter()
            .map(|c| next_boundary(c.reset_frequency, now, &self.calendar))
            .collect();
        let nearest = boundaries.iter().flatten().min().copied();

        let mut entries = vec![current_entry(&counters, now)];
        if let Some(boundary) = nearest {
            let projected = counters
                .iter()
                .zip(&boundaries)
                .map(|(counter, own)| {
                    let mut snapshot = CounterSnapshot::from(counter);
                    if *own == Some(boundary) {
                        snapshot.value = counter.reset_value;
                    }
                    snapshot
                })
                .collect();
            entries.push(TimelineEntry {
                date: boundary,
                counters: projected,
                is_placeholder: false,
            });
        }

        Timeline {
            entries,
            policy: ReloadPolicy::After(nearest.unwrap_or(now + self.default_refresh)),
        }
    }

    fn placeholder_timeline(&self, err: &WidgetError, now: DateTime<Utc>) -> Timeline {
        debug!(error = %err, "timeline falling back to placeholder");
        Timeline {
            entries: vec![self.placeholder(now)],
            policy: ReloadPolicy::After(now + self.default_refresh),
        }
    }

    /// Selected counters that still exist. A single widget shows the first
    /// selected id that resolves; a multi widget keeps list order.
    fn select(&self, ids: &[Uuid], counters: Vec<Counter>) -> Vec<Counter> {
        match self.kind {
            WidgetKind::Single => ids
                .iter()
                .find_map(|id| counters.iter().find(|c| c.id == *id))
                .cloned()
                .into_iter()
                .collect(),
            WidgetKind::Multi => counters
                .into_iter()
                .filter(|c| ids.contains(&c.id))
                .collect(),
        }
    }

    fn resolve(&self, selection: &Selection) -> Result<Vec<Counter>, WidgetError> {
        let ids = selection.counter_ids();
        if ids.is_empty() {
            return Err(WidgetError::UnresolvedSelection);
        }
        let matched = self.select(&ids, self.store.fetch_all()?);
        if matched.is_empty() {
            return Err(WidgetError::UnresolvedSelection);
        }
        Ok(matched)
    }

    /// Resolve the selection and save its due resets in one store transaction.
    fn resolve_and_reset(
        &self,
        selection: &Selection,
        now: DateTime<Utc>,
    ) -> Result<Vec<Counter>, WidgetError> {
        let ids = selection.counter_ids();
        if ids.is_empty() {
            return Err(WidgetError::UnresolvedSelection);
        }
        self.store.transact(|counters| {
            let mut matched = self.select(&ids, counters);
            if matched.is_empty() {
                return Err(WidgetError::UnresolvedSelection);
            }
            let mutated = apply_resets(&mut matched, now, &self.calendar).mutated;
            Ok((mutated, matched))
        })
    }
}

fn current_entry(counters: &[Counter], now: DateTime<Utc>) -> TimelineEntry {
    TimelineEntry {
        date: now,
        counters: counters.iter().map(CounterSnapshot::from).collect(),
        is_placeholder: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::ResetFrequency;
    use crate::store::SharedStore;
    use chrono::Weekday;
    use chrono_tz::UTC;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn counter(title: &str, frequency: ResetFrequency, value: i64, sort_order: i64) -> Counter {
        let mut c = Counter::new(title, utc(2025, 3, 11, 8, 0));
        c.reset_frequency = frequency;
        c.value = value;
        c.sort_order = sort_order;
        c
    }

    fn provider(store: &SharedStore, kind: WidgetKind) -> TimelineProvider<&SharedStore, chrono_tz::Tz> {
        TimelineProvider::new(store, ResetCalendar::new(UTC, Weekday::Sun), kind)
    }

    #[test]
    fn empty_selection_is_placeholder() {
        let store = SharedStore::open_memory().unwrap();
        let now = utc(2025, 3, 11, 22, 0);
        let timeline = provider(&store, WidgetKind::Multi).timeline(&Selection::default(), now);

        assert_eq!(timeline.entries.len(), 1);
        assert!(timeline.entries[0].is_placeholder);
        assert_eq!(timeline.policy, ReloadPolicy::After(now + Duration::minutes(30)));
    }

    #[test]
    fn deleted_counter_is_placeholder() {
        let store = SharedStore::open_memory().unwrap();
        let c = counter("Gone", ResetFrequency::Daily, 3, 0);
        store.save(std::slice::from_ref(&c)).unwrap();
        store.delete(c.id).unwrap();

        let p = provider(&store, WidgetKind::Single);
        let now = utc(2025, 3, 11, 22, 0);
        assert!(p.snapshot(&Selection::single(c.id.to_string()), now).is_placeholder);
        assert!(p.timeline(&Selection::single(c.id.to_string()), now).entries[0].is_placeholder);
    }

    #[test]
    fn never_resetting_counter_has_single_entry() {
        let store = SharedStore::open_memory().unwrap();
        let c = counter("Total", ResetFrequency::Never, 12, 0);
        store.save(std::slice::from_ref(&c)).unwrap();

        let now = utc(2025, 3, 11, 22, 0);
        let timeline = provider(&store, WidgetKind::Single).timeline(&Selection::single(c.id.to_string()), now);

        assert_eq!(timeline.entries.len(), 1);
        assert_eq!(timeline.entries[0].counters[0].value, 12);
        assert_eq!(timeline.policy, ReloadPolicy::After(now + Duration::minutes(30)));
    }

    #[test]
    fn single_widget_uses_first_id() {
        let store = SharedStore::open_memory().unwrap();
        let a = counter("A", ResetFrequency::Never, 1, 0);
        let b = counter("B", ResetFrequency::Never, 2, 1);
        store.save(&[a.clone(), b.clone()]).unwrap();

        let selection = Selection::new([b.id.to_string(), a.id.to_string()]);
        let entry = provider(&store, WidgetKind::Single).snapshot(&selection, utc(2025, 3, 11, 22, 0));
        assert_eq!(entry.counters.len(), 1);
        assert_eq!(entry.counters[0].title, "B");
    }

    #[test]
    fn single_widget_skips_deleted_first_id() {
        let store = SharedStore::open_memory().unwrap();
        let gone = counter("Gone", ResetFrequency::Never, 1, 0);
        let kept = counter("Kept", ResetFrequency::Daily, 2, 1);
        store.save(&[gone.clone(), kept.clone()]).unwrap();
        store.delete(gone.id).unwrap();

        let p = provider(&store, WidgetKind::Single);
        let selection = Selection::new([gone.id.to_string(), kept.id.to_string()]);
        let now = utc(2025, 3, 11, 22, 0);

        let entry = p.snapshot(&selection, now);
        assert!(!entry.is_placeholder);
        assert_eq!(entry.counters.len(), 1);
        assert_eq!(entry.counters[0].title, "Kept");

        let timeline = p.timeline(&selection, now);
        assert_eq!(timeline.entries[0].counters[0].title, "Kept");
    }

    #[test]
    fn snapshot_projects_due_reset_without_saving() {
        let store = SharedStore::open_memory().unwrap();
        let c = counter("Cups", ResetFrequency::Daily, 6, 0);
        store.save(std::slice::from_ref(&c)).unwrap();

        let entry = provider(&store, WidgetKind::Single)
            .snapshot(&Selection::single(c.id.to_string()), utc(2025, 3, 12, 9, 0));

        assert_eq!(entry.counters[0].value, 0);
        assert_eq!(store.get(c.id).unwrap().unwrap().value, 6);
    }

    #[test]
    fn timeline_persists_due_reset() {
        let store = SharedStore::open_memory().unwrap();
        let c = counter("Cups", ResetFrequency::Daily, 6, 0);
        store.save(std::slice::from_ref(&c)).unwrap();

        let now = utc(2025, 3, 12, 9, 0);
        let timeline = provider(&store, WidgetKind::Single).timeline(&Selection::single(c.id.to_string()), now);

        assert_eq!(timeline.entries[0].counters[0].value, 0);
        let stored = store.get(c.id).unwrap().unwrap();
        assert_eq!(stored.value, 0);
        assert_eq!(stored.last_reset_date, now);
    }
}
