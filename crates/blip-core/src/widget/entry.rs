use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::counter::{format_padded, Counter};

/// Which widget family is asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    /// One counter, the first configured id.
    #[default]
    Single,
    /// Every configured counter, in list order.
    Multi,
}

/// Counter ids as configured on the widget host. Unparseable ids are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    ids: Vec<String>,
}

impl Selection {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn single(id: impl Into<String>) -> Self {
        Self::new([id])
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Parsed ids in configuration order.
    pub fn counter_ids(&self) -> Vec<Uuid> {
        self.ids
            .iter()
            .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
            .collect()
    }
}

/// What a widget renders for one counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub id: Option<Uuid>,
    pub title: String,
    pub value: i64,
    pub goal: Option<i64>,
    pub digit_count: u32,
}

impl CounterSnapshot {
    pub fn sample(title: &str, value: i64, goal: Option<i64>, digit_count: u32) -> Self {
        Self {
            id: None,
            title: title.into(),
            value,
            goal,
            digit_count,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.goal.is_some_and(|goal| self.value >= goal)
    }

    pub fn formatted_value(&self) -> String {
        format_padded(self.value, self.digit_count)
    }
}

impl From<&Counter> for CounterSnapshot {
    fn from(counter: &Counter) -> Self {
        Self {
            id: Some(counter.id),
            title: counter.title.clone(),
            value: counter.value,
            goal: counter.goal,
            digit_count: counter.digit_count,
        }
    }
}

/// The state a widget shows from `date` until the next entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub date: DateTime<Utc>,
    pub counters: Vec<CounterSnapshot>,
    pub is_placeholder: bool,
}

impl TimelineEntry {
    /// Synthetic sample data shown before real data is available.
    pub fn placeholder(kind: WidgetKind, date: DateTime<Utc>) -> Self {
        let counters = match kind {
            WidgetKind::Single => vec![CounterSnapshot::sample("Counter", 42, Some(100), 2)],
            WidgetKind::Multi => vec![
                CounterSnapshot::sample("Steps", 4200, Some(10000), 1),
                CounterSnapshot::sample("Water", 5, Some(8), 1),
            ],
        };
        Self {
            date,
            counters,
            is_placeholder: true,
        }
    }
}

/// When the host should ask for a new timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "at", rename_all = "snake_case")]
pub enum ReloadPolicy {
    After(DateTime<Utc>),
}

/// Ordered entries plus the reload policy handed to the widget host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub entries: Vec<TimelineEntry>,
    pub policy: ReloadPolicy,
}

impl Timeline {
    /// Entry the host displays at `instant`: the latest one dated at or before it.
    pub fn entry_at(&self, instant: DateTime<Utc>) -> Option<&TimelineEntry> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.date <= instant)
            .or_else(|| self.entries.first())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn selection_skips_unparseable_ids() {
        let id = Uuid::new_v4();
        let selection = Selection::new(["not-a-uuid".to_string(), id.to_string()]);
        assert_eq!(selection.counter_ids(), vec![id]);
    }

    #[test]
    fn placeholders_per_kind() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let single = TimelineEntry::placeholder(WidgetKind::Single, now);
        assert!(single.is_placeholder);
        assert_eq!(single.counters.len(), 1);
        assert_eq!(single.counters[0].formatted_value(), "42");

        let multi = TimelineEntry::placeholder(WidgetKind::Multi, now);
        let titles: Vec<_> = multi.counters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Steps", "Water"]);
    }

    #[test]
    fn entry_at_picks_latest_started_entry() {
        let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 22, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        let timeline = Timeline {
            entries: vec![
                TimelineEntry::placeholder(WidgetKind::Single, t0),
                TimelineEntry::placeholder(WidgetKind::Multi, t1),
            ],
            policy: ReloadPolicy::After(t1),
        };
        assert_eq!(timeline.entry_at(t0).unwrap().date, t0);
        assert_eq!(timeline.entry_at(t1).unwrap().date, t1);
        assert_eq!(
            timeline.entry_at(t0 - chrono::Duration::hours(1)).unwrap().date,
            t0
        );
    }
}
