//! Lifecycle triggers of the interactive process.

use blip_core::{App, Config, ResetCalendar, SharedStore};
use chrono::{DateTime, TimeZone, Utc};
use clap::Subcommand;
use std::error::Error;
use tokio::runtime::Runtime;
use tracing::info;

use crate::context::{self, WithCalendar};

#[derive(Subcommand)]
pub enum AppAction {
    /// Process start: apply due resets
    Launch,
    /// Return to the foreground: apply due resets
    Foreground,
}

struct LifecycleJob<'rt> {
    action: AppAction,
    now: DateTime<Utc>,
    store: SharedStore,
    runtime: &'rt Runtime,
    config: Config,
}

impl WithCalendar for LifecycleJob<'_> {
    type Output = Result<bool, Box<dyn Error>>;

    fn run<Tz: TimeZone>(self, calendar: ResetCalendar<Tz>) -> Self::Output {
        let notifier = context::notifier(self.runtime, &self.config)?;
        let app = App::new(self.store, calendar, notifier);
        let changed = match self.action {
            AppAction::Launch => app.on_launch(self.now),
            AppAction::Foreground => app.on_foreground(self.now),
        };
        self.runtime.block_on(app.notifier().settle());
        Ok(changed)
    }
}

pub fn run(action: AppAction, now: DateTime<Utc>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let store = context::open_store(&config)?;
    let runtime = context::runtime()?;
    let job = LifecycleJob {
        action,
        now,
        store,
        runtime: &runtime,
        config: config.clone(),
    };
    let changed = context::with_calendar(&config, job)??;
    info!(changed, "lifecycle resets applied");
    println!("{}", serde_json::json!({ "reset": changed }));
    Ok(())
}
