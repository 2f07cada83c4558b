//! Widget host requests: placeholder, snapshot and timeline.
//!
//! Each invocation behaves like one widget process wake-up. The widget never
//! signals refreshes and never runs the legacy migration.

use blip_core::store::shared_container_dir;
use blip_core::{
    Config, ReloadPolicy, ResetCalendar, Selection, SharedStore, SignalFileSink, Timeline,
    TimelineEntry, TimelineProvider, WidgetKind,
};
use chrono::{DateTime, TimeZone, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::error::Error;
use tracing::warn;

#[derive(Args)]
pub struct Family {
    /// Ask as the multi-counter widget instead of the single-counter one
    #[arg(long)]
    multi: bool,
}

impl Family {
    fn kind(&self) -> WidgetKind {
        if self.multi {
            WidgetKind::Multi
        } else {
            WidgetKind::Single
        }
    }
}

#[derive(Subcommand)]
pub enum WidgetAction {
    /// Sample entry shown before real data is available
    Placeholder {
        #[command(flatten)]
        family: Family,
    },
    /// Current state of the selected counters, without saving resets
    Snapshot {
        #[command(flatten)]
        family: Family,
        /// Selected counter IDs
        ids: Vec<String>,
    },
    /// Current entry plus the projected entry at the next reset boundary
    Timeline {
        #[command(flatten)]
        family: Family,
        /// Selected counter IDs
        ids: Vec<String>,
    },
    /// Show when the app last asked widgets to reload
    LastSignal,
}

enum Request {
    Snapshot(Selection),
    Timeline(Selection),
}

struct WidgetJob {
    request: Request,
    kind: WidgetKind,
    now: DateTime<Utc>,
    store: SharedStore,
    default_refresh: chrono::Duration,
}

impl crate::context::WithCalendar for WidgetJob {
    type Output = Result<(), serde_json::Error>;

    fn run<Tz: TimeZone>(self, calendar: ResetCalendar<Tz>) -> Self::Output {
        let provider = TimelineProvider::new(&self.store, calendar, self.kind)
            .with_default_refresh(self.default_refresh);
        match self.request {
            Request::Snapshot(selection) => print_json(&provider.snapshot(&selection, self.now)),
            Request::Timeline(selection) => print_json(&provider.timeline(&selection, self.now)),
        }
    }
}

pub fn run(action: WidgetAction, now: DateTime<Utc>) -> Result<(), Box<dyn Error>> {
    let config = Config::load_or_default();
    let (request, kind) = match action {
        WidgetAction::Placeholder { family } => {
            return Ok(print_json(&TimelineEntry::placeholder(family.kind(), now))?);
        }
        WidgetAction::LastSignal => {
            let container = shared_container_dir(&config.store.app_group)?;
            let signal = SignalFileSink::in_container(&container).last_signal();
            return Ok(print_json(&serde_json::json!({ "last_signal": signal }))?);
        }
        WidgetAction::Snapshot { family, ids } => (Request::Snapshot(Selection::new(ids)), family.kind()),
        WidgetAction::Timeline { family, ids } => (Request::Timeline(Selection::new(ids)), family.kind()),
    };

    let default_refresh = config.refresh.default_refresh();
    let store = match SharedStore::open(&config.store.app_group) {
        Ok(store) => store,
        Err(err) => {
            warn!(error = %err, "shared store unavailable, showing placeholder");
            let entry = TimelineEntry::placeholder(kind, now);
            return Ok(match request {
                Request::Snapshot(_) => print_json(&entry)?,
                Request::Timeline(_) => print_json(&Timeline {
                    entries: vec![entry],
                    policy: ReloadPolicy::After(now + default_refresh),
                })?,
            });
        }
    };

    let job = WidgetJob {
        request,
        kind,
        now,
        store,
        default_refresh,
    };
    crate::context::with_calendar(&config, job)??;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
