//! Hot reload support for modules

use crate::error::{Result, RuntimeError};
use crate::manager::ModuleManager;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Hot reload watcher for module entry points
///
/// Watches the modules directory and runs
/// [`ModuleManager::auto_reload_changed`] once a burst of entry-point changes
/// has settled. Stopping waits for a reload pass already under way to finish.
#[derive(Debug)]
pub struct HotReloadWatcher {
    /// Module manager
    manager: Arc<ModuleManager>,

    /// Modules directory to watch
    modules_dir: PathBuf,

    /// File watcher
    watcher: Option<RecommendedWatcher>,

    /// Event receiver
    rx: Option<mpsc::UnboundedReceiver<notify::Result<Event>>>,

    /// Quiet period after the last change before reloading
    debounce_duration: Duration,

    /// Poll interval for polling backends
    poll_interval: Duration,

    /// Event loop task
    task: Option<JoinHandle<()>>,

    /// Stops the event loop between reload passes
    cancel: CancellationToken,
}

impl HotReloadWatcher {
    /// Create a new hot reload watcher
    pub fn new(manager: Arc<ModuleManager>, modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            modules_dir: modules_dir.into(),
            watcher: None,
            rx: None,
            debounce_duration: Duration::from_secs(1),
            poll_interval: Duration::from_secs(2),
            task: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Set debounce duration
    pub fn with_debounce(mut self, duration: Duration) -> Self {
        self.debounce_duration = duration;
        self
    }

    /// Set poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Start watching the modules directory
    pub fn start(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.rx = Some(rx);

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default().with_poll_interval(self.poll_interval),
        )
        .map_err(|e| RuntimeError::other(format!("Failed to create file watcher: {e}")))?;

        watcher
            .watch(&self.modules_dir, RecursiveMode::Recursive)
            .map_err(|e| RuntimeError::other(format!("Failed to watch directory: {e}")))?;

        self.watcher = Some(watcher);

        info!(
            modules_dir = %self.modules_dir.display(),
            "Hot reload watcher started"
        );

        Ok(())
    }

    /// Stop watching and wait for the event loop to exit
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        self.watcher = None;
        self.rx = None;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Hot reload task failed");
            }
        }
        info!("Hot reload watcher stopped");
    }

    /// Spawn the watcher event loop
    pub fn run(&mut self) -> Result<()> {
        let mut rx = self
            .rx
            .take()
            .ok_or_else(|| RuntimeError::other("Watcher not started"))?;

        let manager = Arc::clone(&self.manager);
        let entry_point = manager.options().entry_point.clone();
        let debounce = self.debounce_duration;
        let cancel = self.cancel.clone();

        self.task = Some(tokio::spawn(async move {
            loop {
                let res = tokio::select! {
                    _ = cancel.cancelled() => break,
                    res = rx.recv() => match res {
                        Some(res) => res,
                        None => break,
                    },
                };

                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(error = %e, "File watcher error");
                        continue;
                    }
                };

                if !should_process(&event, &entry_point) {
                    continue;
                }

                for name in event.paths.iter().filter_map(|p| module_name(p)) {
                    debug!(module = %name, "Entry point changed");
                }

                // Let the burst settle before comparing modification times
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(debounce) => {}
                }
                while rx.try_recv().is_ok() {}

                let results = manager.auto_reload_changed().await;
                for (name, outcome) in &results {
                    info!(module = %name, outcome = %outcome, "Hot reload");
                }
            }
        }));

        Ok(())
    }

    /// Check if we should process this event
    pub fn should_process_event(&self, event: &Event) -> bool {
        should_process(event, &self.manager.options().entry_point)
    }

    /// Extract the module name from an entry-point path
    pub fn extract_module_name(&self, path: &Path) -> Option<String> {
        module_name(path)
    }
}

impl Drop for HotReloadWatcher {
    fn drop(&mut self) {
        // The loop finishes its current pass and exits on its own
        self.cancel.cancel();
    }
}

fn should_process(event: &Event, entry_point: &str) -> bool {
    match event.kind {
        EventKind::Modify(_) | EventKind::Create(_) => event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(OsStr::new(entry_point))),
        _ => false,
    }
}

fn module_name(path: &Path) -> Option<String> {
    path.parent()?
        .file_name()
        .and_then(|s| s.to_str())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticModuleSource;
    use switchboard_events::EventBus;

    fn watcher() -> HotReloadWatcher {
        let manager = ModuleManager::new(EventBus::new(), Arc::new(StaticModuleSource::new()));
        HotReloadWatcher::new(manager, "/tmp/modules")
    }

    #[tokio::test]
    async fn test_extract_module_name() {
        let watcher = watcher();

        let path = PathBuf::from("/tmp/modules/system_info/module.toml");
        assert_eq!(
            watcher.extract_module_name(&path),
            Some("system_info".to_string())
        );

        assert_eq!(watcher.extract_module_name(Path::new("/")), None);
    }

    #[tokio::test]
    async fn test_should_process_event() {
        let watcher = watcher();

        let event = Event::new(EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Content,
        )))
        .add_path(PathBuf::from("/tmp/modules/system_info/module.toml"));
        assert!(watcher.should_process_event(&event));

        let event = Event::new(EventKind::Modify(notify::event::ModifyKind::Data(
            notify::event::DataChange::Content,
        )))
        .add_path(PathBuf::from("/tmp/modules/system_info/notes.txt"));
        assert!(!watcher.should_process_event(&event));

        let event = Event::new(EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(PathBuf::from("/tmp/modules/system_info/module.toml"));
        assert!(!watcher.should_process_event(&event));
    }

    #[tokio::test]
    async fn test_run_requires_start() {
        let mut watcher = watcher();
        assert!(watcher.run().is_err());
    }

    #[tokio::test]
    async fn test_stop_waits_for_event_loop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModuleManager::new(EventBus::new(), Arc::new(StaticModuleSource::new()));
        let mut watcher = HotReloadWatcher::new(manager, dir.path())
            .with_debounce(Duration::from_millis(10));

        watcher.start().unwrap();
        watcher.run().unwrap();

        tokio::time::timeout(Duration::from_secs(5), watcher.stop())
            .await
            .unwrap();
        assert!(watcher.task.is_none());

        // Stopping twice is harmless
        watcher.stop().await;
    }
}
