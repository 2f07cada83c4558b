//! # Blip Core Library
//!
//! Counters with optional goals and periodic resets, shared between an
//! interactive process and independently scheduled widget processes through
//! one SQLite store.
//!
//! ## Architecture
//!
//! - **Policy**: pure calendar-aware reset decisions (`is_due`, `next_boundary`)
//! - **Reset**: applies due resets and writes them through the store
//! - **Store**: shared SQLite store, TOML configuration, one-time legacy migration
//! - **Notify**: debounced cross-process refresh signal
//! - **Widget**: placeholder / snapshot / timeline projection for widget hosts
//!
//! ## Key Components
//!
//! - [`Counter`]: the persisted record
//! - [`ResetCalendar`]: observer time zone and week rules
//! - [`SharedStore`]: the store both processes open
//! - [`RefreshNotifier`]: coalesces refresh requests
//! - [`TimelineProvider`]: builds widget timelines
//! - [`App`]: lifecycle triggers for the interactive process

pub mod app;
pub mod counter;
pub mod error;
pub mod notify;
pub mod policy;
pub mod reset;
pub mod store;
pub mod widget;

pub use app::App;
pub use counter::{Counter, ResetFrequency};
pub use error::{ConfigError, CoreError, MigrationError, StoreError, ValidationError, WidgetError};
pub use notify::{RefreshNotifier, RefreshSink, SignalFileSink};
pub use policy::{is_due, next_boundary, ResetCalendar, WeekOfYear};
pub use reset::{apply_resets, run_resets, ResetOutcome};
pub use store::{Config, CounterStore, SharedStore};
pub use widget::{
    CounterSnapshot, ReloadPolicy, Selection, Timeline, TimelineEntry, TimelineProvider,
    WidgetKind,
};
