//! Widget-facing timeline projection.

mod entry;
mod provider;

pub use entry::{CounterSnapshot, ReloadPolicy, Selection, Timeline, TimelineEntry, WidgetKind};
pub use provider::{default_refresh, TimelineProvider};
