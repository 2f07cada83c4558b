//! Counter management commands for CLI.

use blip_core::{App, Config, Counter, CounterStore, ResetCalendar, ResetFrequency, SharedStore};
use chrono::{DateTime, TimeZone, Utc};
use clap::Subcommand;
use serde::Serialize;
use std::error::Error;
use tokio::runtime::Runtime;
use uuid::Uuid;

use crate::context::{self, WithCalendar};

#[derive(Subcommand)]
pub enum CounterAction {
    /// Create a new counter
    Create {
        /// Counter title
        title: String,
        /// Starting value (default: 0)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        value: i64,
        /// Amount added or removed per tap (default: 1)
        #[arg(long, default_value = "1")]
        step: i64,
        /// Goal value
        #[arg(long, allow_negative_numbers = true)]
        goal: Option<i64>,
        /// Value restored on reset (default: 0)
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        reset_value: i64,
        /// Reset frequency: never, daily, weekly or monthly (default: never)
        #[arg(long, default_value = "never")]
        frequency: ResetFrequency,
        /// Minimum number of displayed digits (default: 1)
        #[arg(long, default_value = "1")]
        digits: u32,
        /// Color name
        #[arg(long)]
        color: Option<String>,
    },
    /// List counters
    List,
    /// Get counter details
    Get {
        /// Counter ID
        id: Uuid,
    },
    /// Add the counter's step to its value
    Inc {
        /// Counter ID
        id: Uuid,
    },
    /// Subtract the counter's step from its value
    Dec {
        /// Counter ID
        id: Uuid,
    },
    /// Edit a counter
    Edit {
        /// Counter ID
        id: Uuid,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New current value
        #[arg(long, allow_negative_numbers = true)]
        value: Option<i64>,
        /// New step
        #[arg(long)]
        step: Option<i64>,
        /// New goal
        #[arg(long, allow_negative_numbers = true)]
        goal: Option<i64>,
        /// Remove the goal
        #[arg(long, conflicts_with = "goal")]
        clear_goal: bool,
        /// New reset value
        #[arg(long, allow_negative_numbers = true)]
        reset_value: Option<i64>,
        /// New reset frequency
        #[arg(long)]
        frequency: Option<ResetFrequency>,
        /// New digit count
        #[arg(long)]
        digits: Option<u32>,
        /// New color name
        #[arg(long)]
        color: Option<String>,
        /// New position in the list
        #[arg(long, allow_negative_numbers = true)]
        sort_order: Option<i64>,
    },
    /// Delete a counter
    Delete {
        /// Counter ID
        id: Uuid,
    },
}

/// Counter as printed, with the rendered value alongside the raw record.
#[derive(Serialize)]
struct CounterView<'a> {
    #[serde(flatten)]
    counter: &'a Counter,
    display: String,
    complete: bool,
}

impl<'a> From<&'a Counter> for CounterView<'a> {
    fn from(counter: &'a Counter) -> Self {
        Self {
            counter,
            display: counter.formatted_value(),
            complete: counter.is_complete(),
        }
    }
}

struct CounterJob<'rt> {
    action: CounterAction,
    now: DateTime<Utc>,
    store: SharedStore,
    runtime: &'rt Runtime,
    config: Config,
}

impl WithCalendar for CounterJob<'_> {
    type Output = Result<(), Box<dyn Error>>;

    fn run<Tz: TimeZone>(self, calendar: ResetCalendar<Tz>) -> Self::Output {
        let notifier = context::notifier(self.runtime, &self.config)?;
        let app = App::new(self.store, calendar, notifier);
        app.on_launch(self.now);
        let result = execute(&app, self.action, self.now);
        self.runtime.block_on(app.notifier().settle());
        result
    }
}

pub fn run(action: CounterAction, now: DateTime<Utc>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let store = context::open_store(&config)?;
    let runtime = context::runtime()?;
    let job = CounterJob {
        action,
        now,
        store,
        runtime: &runtime,
        config: config.clone(),
    };
    context::with_calendar(&config, job)?
}

fn execute<S: CounterStore, Tz: TimeZone>(
    app: &App<S, Tz>,
    action: CounterAction,
    now: DateTime<Utc>,
) -> Result<(), Box<dyn Error>> {
    match action {
        CounterAction::Create {
            title,
            value,
            step,
            goal,
            reset_value,
            frequency,
            digits,
            color,
        } => {
            let mut counter = Counter::new(title, now);
            counter.step_increment = step;
            counter.goal = goal;
            counter.value = value;
            counter.reset_value = reset_value;
            counter.reset_frequency = frequency;
            counter.digit_count = digits;
            if let Some(color) = color {
                counter.color_name = color;
            }
            let counter = app.create(counter)?;
            eprintln!("Counter created: {}", counter.id);
            print_json(&CounterView::from(&counter))?;
        }
        CounterAction::List => {
            let counters = app.counters();
            let views: Vec<_> = counters.iter().map(CounterView::from).collect();
            print_json(&views)?;
        }
        CounterAction::Get { id } => {
            let counter = app.counter(id)?;
            print_json(&CounterView::from(&counter))?;
        }
        CounterAction::Inc { id } => {
            let counter = app.increment(id, now)?;
            print_json(&CounterView::from(&counter))?;
        }
        CounterAction::Dec { id } => {
            let counter = app.decrement(id, now)?;
            print_json(&CounterView::from(&counter))?;
        }
        CounterAction::Edit {
            id,
            title,
            value,
            step,
            goal,
            clear_goal,
            reset_value,
            frequency,
            digits,
            color,
            sort_order,
        } => {
            let mut counter = app.counter(id)?;
            if let Some(title) = title {
                counter.title = title;
            }
            if let Some(value) = value {
                counter.value = value;
            }
            if let Some(step) = step {
                counter.step_increment = step;
            }
            if clear_goal {
                counter.goal = None;
            } else if goal.is_some() {
                counter.goal = goal;
            }
            if let Some(reset_value) = reset_value {
                counter.reset_value = reset_value;
            }
            if let Some(frequency) = frequency {
                counter.reset_frequency = frequency;
            }
            if let Some(digits) = digits {
                counter.digit_count = digits;
            }
            if let Some(color) = color {
                counter.color_name = color;
            }
            if let Some(sort_order) = sort_order {
                counter.sort_order = sort_order;
            }
            counter.last_updated_date = now;
            let counter = app.update(counter)?;
            print_json(&CounterView::from(&counter))?;
        }
        CounterAction::Delete { id } => {
            app.delete(id)?;
            println!("Counter deleted: {id}");
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
