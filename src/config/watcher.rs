//! Worker executable watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::lifecycle::signals::ControlAction;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A watcher that queues a rolling reload when the worker executable changes.
///
/// The parent directory is watched rather than the file itself: build tools
/// usually replace binaries by renaming a new file over the old one, which
/// would silently drop a watch placed on the replaced inode.
pub struct ExecWatcher {
    path: PathBuf,
    actions: mpsc::UnboundedSender<ControlAction>,
}

impl ExecWatcher {
    /// Create a new ExecWatcher feeding the supervisor's control channel.
    pub fn new(path: &Path, actions: mpsc::UnboundedSender<ControlAction>) -> Self {
        Self {
            path: path.to_path_buf(),
            actions,
        }
    }

    /// Start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as events are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.actions.clone();
        let target = self.path.clone();
        let mut debounce = ReloadDebounce::new(POLL_INTERVAL);
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !touches_executable(&event, &target) {
                        return;
                    }
                    if debounce.admit(Instant::now()) {
                        tracing::info!(path = ?target, "Worker executable changed, scheduling rolling reload");
                        let _ = tx.send(ControlAction::Reload);
                    } else {
                        tracing::debug!(path = ?target, kind = ?event.kind, "Coalesced executable change");
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Executable watcher started");
        Ok(watcher)
    }
}

/// Collapses the burst of events one rebuild produces into a single reload.
///
/// The first change is admitted; anything within `window` of the last
/// admitted change is dropped.
#[derive(Debug)]
struct ReloadDebounce {
    window: Duration,
    last: Option<Instant>,
}

impl ReloadDebounce {
    fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    fn admit(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

fn touches_executable(event: &Event, target: &Path) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.file_name() == target.file_name())
}
