//! Cross-process change notification.
//!
//! [`RefreshNotifier`] coalesces bursts of refresh requests into a single
//! call to a [`RefreshSink`] once the debounce window passes without a newer
//! request. Only one request is ever pending: a new one aborts the previous
//! timer and starts its own.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default coalescing window.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// File name of the reload signal inside the shared container.
pub const RELOAD_SIGNAL_FILE_NAME: &str = "widget.reload";

/// Whatever redraws widgets when persisted data changes.
pub trait RefreshSink: Send + Sync + 'static {
    fn reload_all_timelines(&self);
}

/// Debounced, fire-and-forget refresh trigger.
pub struct RefreshNotifier {
    sink: Arc<dyn RefreshSink>,
    window: Duration,
    handle: Handle,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshNotifier {
    /// Timers are spawned on `handle`; it must outlive the notifier.
    pub fn new(handle: Handle, sink: Arc<dyn RefreshSink>, window: Duration) -> Self {
        Self {
            sink,
            window,
            handle,
            pending: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Schedule a refresh after the debounce window, replacing any pending one.
    pub fn request_refresh(&self) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.take() {
            previous.abort();
        }

        let sink = Arc::clone(&self.sink);
        let window = self.window;
        *pending = Some(self.handle.spawn(async move {
            tokio::time::sleep(window).await;
            debug!("reloading widget timelines");
            sink.reload_all_timelines();
        }));
    }

    /// Drop the pending refresh, if any.
    pub fn cancel(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = pending {
            previous.abort();
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Wait until the pending refresh (if any) has fired.
    ///
    /// Call before the process exits so a coalesced refresh is not lost.
    pub async fn settle(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = pending {
            let _ = task.await;
        }
    }
}

/// Signals widget processes by rewriting a timestamp file in the shared container.
#[derive(Debug, Clone)]
pub struct SignalFileSink {
    path: PathBuf,
}

impl SignalFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_container(container: &Path) -> Self {
        Self::new(container.join(RELOAD_SIGNAL_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the last reload was signalled, if ever.
    pub fn last_signal(&self) -> Option<DateTime<Utc>> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

impl RefreshSink for SignalFileSink {
    fn reload_all_timelines(&self) {
        if let Err(err) = std::fs::write(&self.path, Utc::now().to_rfc3339()) {
            warn!(error = %err, path = %self.path.display(), "could not signal widget reload");
        }
    }
}
