//! Module lifecycle manager
//!
//! The manager owns every [`ModuleRecord`] and live instance. Mutating
//! operations (`load`, `unload`, `reload`) are serialized by one manager-wide
//! async mutex; a reload holds it across its unload and load so concurrent
//! reloads of the same name cannot interleave. Queries only take short read
//! locks on the tables.
//!
//! Lifecycle events are published while the mutex is held, so a handler of a
//! `module.*` event must not await another mutating call on the same manager.
//!
//! A mutating future dropped before it completes (an aborted task, a timeout)
//! still leaves the tables consistent: the record settles in `ERROR` and a
//! half torn down or half initialized instance is detached and shut down.

use crate::error::{Result, RuntimeError};
use crate::record::{DependencyGraph, ManagerStats, ModuleListing, ModuleRecord};
use crate::source::ModuleSource;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use switchboard_events::{payload, EventBus, HandlerId};
use switchboard_module_api::{Module, ModuleError, ModuleState, RouteDescriptor};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Default entry-point file name
pub const DEFAULT_ENTRY_POINT: &str = "module.toml";

/// Directories starting with this prefix are never treated as modules
pub const DEFAULT_RESERVED_PREFIX: &str = "_";

/// Lifecycle event types published by the manager
pub mod events {
    /// Load started
    pub const LOADING: &str = "module.loading";
    /// Module is ready
    pub const LOADED: &str = "module.loaded";
    /// Load failed
    pub const LOAD_ERROR: &str = "module.load_error";
    /// Unload started
    pub const UNLOADING: &str = "module.unloading";
    /// Module was unloaded
    pub const UNLOADED: &str = "module.unloaded";
    /// Reload succeeded
    pub const RELOADED: &str = "module.reloaded";
    /// Reload failed
    pub const RELOAD_ERROR: &str = "module.reload_error";
    /// `reload_all` finished
    pub const RELOAD_ALL_COMPLETE: &str = "module.reload_all_complete";
}

/// Manager settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Entry-point file expected in every module directory
    pub entry_point: String,

    /// Directory name prefix excluded from discovery
    pub reserved_prefix: String,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            entry_point: DEFAULT_ENTRY_POINT.to_string(),
            reserved_prefix: DEFAULT_RESERVED_PREFIX.to_string(),
        }
    }
}

/// Per-name outcome of a batch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Operation succeeded
    Success,

    /// Operation failed with this message
    Error(String),
}

impl Outcome {
    /// Check if the operation succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl<T> From<&Result<T>> for Outcome {
    fn from(result: &Result<T>) -> Self {
        match result {
            Ok(_) => Outcome::Success,
            Err(e) => Outcome::Error(e.to_string()),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => f.write_str("success"),
            Outcome::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Per-name outcomes of a batch operation
pub type BatchResults = BTreeMap<String, Outcome>;

struct LiveModule {
    module: Arc<dyn Module>,
    seq: u64,
}

/// Module lifecycle manager
pub struct ModuleManager {
    bus: EventBus,
    source: Arc<dyn ModuleSource>,
    options: ManagerOptions,
    records: RwLock<HashMap<String, ModuleRecord>>,
    instances: RwLock<HashMap<String, LiveModule>>,
    next_seq: AtomicU64,
    op_lock: Mutex<()>,
    in_flight: parking_lot::Mutex<Option<Arc<dyn Module>>>,
    pub(crate) control: parking_lot::Mutex<Vec<(String, HandlerId)>>,
}

impl ModuleManager {
    /// Create a manager with default options
    ///
    /// Control-event handlers are registered on `bus` immediately.
    pub fn new(bus: EventBus, source: Arc<dyn ModuleSource>) -> Arc<Self> {
        Self::with_options(bus, source, ManagerOptions::default())
    }

    /// Create a manager with explicit options
    pub fn with_options(
        bus: EventBus,
        source: Arc<dyn ModuleSource>,
        options: ManagerOptions,
    ) -> Arc<Self> {
        let manager = Arc::new(Self {
            bus,
            source,
            options,
            records: RwLock::new(HashMap::new()),
            instances: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            op_lock: Mutex::new(()),
            in_flight: parking_lot::Mutex::new(None),
            control: parking_lot::Mutex::new(Vec::new()),
        });
        manager.register_control_handlers();
        manager
    }

    /// Event bus the manager publishes on
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Manager settings
    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    /// Entry-point path inside a module directory
    pub fn entry_point(&self, module_dir: &Path) -> PathBuf {
        module_dir.join(&self.options.entry_point)
    }

    // ----------------------------------------------------------------------
    // Discovery
    // ----------------------------------------------------------------------

    /// Find module directories under `root`
    ///
    /// Immediate subdirectories not starting with the reserved prefix and
    /// containing the entry-point file, keyed and ordered by name. A missing
    /// root yields an empty map.
    pub async fn discover(&self, root: &Path) -> Result<BTreeMap<String, PathBuf>> {
        let mut found = BTreeMap::new();

        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(root = %root.display(), "Modules directory does not exist");
                return Ok(found);
            }
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            // Follows symlinks, unlike DirEntry::file_type
            let is_dir = tokio::fs::metadata(entry.path())
                .await
                .map(|metadata| metadata.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(String::from) else {
                warn!(path = %entry.path().display(), "Skipping non UTF-8 module directory");
                continue;
            };
            if name.starts_with(&self.options.reserved_prefix) {
                continue;
            }

            let dir = entry.path();
            if is_file(&self.entry_point(&dir)).await {
                found.insert(name, dir);
            } else {
                debug!(module = %name, "No entry point, skipping directory");
            }
        }

        Ok(found)
    }

    /// Discover every module under `root` and load them by name order
    ///
    /// Declared dependencies do not influence the order. A failing module is
    /// logged and recorded, and the batch continues.
    pub async fn discover_and_load_all(&self, root: &Path) -> Result<BatchResults> {
        info!(root = %root.display(), "Loading modules");

        let discovered = self.discover(root).await?;
        let mut results = BatchResults::new();

        for (name, dir) in &discovered {
            let result = self.load(name, dir).await;
            if let Err(e) = &result {
                error!(module = %name, error = %e, "Failed to load module");
            }
            results.insert(name.clone(), Outcome::from(&result));
        }

        let loaded = results.values().filter(|o| o.is_success()).count();
        info!("Loaded {}/{} modules successfully", loaded, discovered.len());

        Ok(results)
    }

    // ----------------------------------------------------------------------
    // Load
    // ----------------------------------------------------------------------

    /// Load the module `name` from `module_dir`
    ///
    /// Returns `Ok` without doing anything if `name` is already loaded.
    pub async fn load(&self, name: &str, module_dir: impl AsRef<Path>) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        let interrupted = InterruptGuard::new(self, name);
        let result = self.load_locked(name, module_dir.as_ref()).await;
        interrupted.disarm();
        result
    }

    async fn load_locked(&self, name: &str, module_dir: &Path) -> Result<()> {
        if self.is_loaded(name) {
            warn!(module = %name, "{}", RuntimeError::already_loaded(name));
            return Ok(());
        }

        let result = self.try_load(name, module_dir).await;
        self.in_flight.lock().take();

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail_load(name, module_dir, &e).await;
                Err(e)
            }
        }
    }

    async fn try_load(&self, name: &str, module_dir: &Path) -> Result<()> {
        let entry_point = self.entry_point(module_dir);
        let metadata = match tokio::fs::metadata(&entry_point).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(RuntimeError::entry_point_missing(&entry_point)),
        };
        let mtime = metadata.modified().ok();

        self.update_record(name, module_dir, |record| {
            record.path = module_dir.to_path_buf();
            record.last_modified = mtime;
            record.state = ModuleState::Loading;
            record.error = None;
        });

        info!(module = %name, path = %module_dir.display(), "Loading module");
        self.bus
            .publish(
                events::LOADING,
                payload(json!({
                    "module_name": name,
                    "path": module_dir.display().to_string(),
                })),
            )
            .await;

        let module = self
            .source
            .instantiate(name, &entry_point, &self.bus)
            .await?;
        *self.in_flight.lock() = Some(Arc::clone(&module));
        self.transition(name, module.as_ref(), ModuleState::Loaded);
        self.transition(name, module.as_ref(), ModuleState::Initializing);

        if let Err(e) = initialize(module.as_ref()).await {
            module.context().set_state(ModuleState::Error);
            if let Err(cleanup_err) = module.cleanup().await {
                warn!(module = %name, error = %cleanup_err, "Cleanup after failed initialization failed");
            }
            self.source.release(name);
            return Err(e.into());
        }

        module.context().set_state(ModuleState::Ready);
        self.attach(name, Arc::clone(&module));

        self.update_record(name, module_dir, |record| {
            record.state = ModuleState::Ready;
            record.loaded_at = Some(Utc::now());
            record.error = None;
            record.dependencies = module.dependencies();
            record.dependents = module.dependents();
        });

        info!(module = %name, "Successfully loaded module");
        self.bus
            .publish(
                events::LOADED,
                payload(json!({
                    "module_name": name,
                    "module_info": to_value(&module.info()),
                })),
            )
            .await;

        Ok(())
    }

    async fn fail_load(&self, name: &str, module_dir: &Path, err: &RuntimeError) {
        error!(module = %name, error = %err, "Error loading module");

        self.update_record(name, module_dir, |record| {
            record.state = ModuleState::Error;
            record.error = Some(err.to_string());
        });

        self.bus
            .publish(
                events::LOAD_ERROR,
                payload(json!({
                    "module_name": name,
                    "error": err.to_string(),
                })),
            )
            .await;
    }

    /// Store a ready instance and wire dependency edges in both directions
    fn attach(&self, name: &str, module: Arc<dyn Module>) {
        let mut instances = self.instances.write();
        let mut records = self.records.write();

        for dependency in module.dependencies() {
            if let Some(live) = instances.get(&dependency) {
                live.module.add_dependent(name);
                if let Some(record) = records.get_mut(&dependency) {
                    record.dependents.insert(name.to_string());
                }
            }
        }

        for (other, live) in instances.iter() {
            if live.module.dependencies().contains(name) {
                module.add_dependent(other);
            }
        }

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        instances.insert(name.to_string(), LiveModule { module, seq });
    }

    // ----------------------------------------------------------------------
    // Unload
    // ----------------------------------------------------------------------

    /// Unload the module `name`
    ///
    /// Fails with [`RuntimeError::DependencyConflict`] if other modules depend
    /// on it, unless `force` is set. A forced unload also drops `name` from the
    /// declared dependencies of those modules. Returns `Ok` if `name` is not
    /// loaded.
    pub async fn unload(&self, name: &str, force: bool) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        let interrupted = InterruptGuard::new(self, name);
        let result = self.unload_locked(name, force, true).await;
        interrupted.disarm();
        result
    }

    async fn unload_locked(&self, name: &str, force: bool, sever: bool) -> Result<()> {
        let Some(module) = self.get(name) else {
            warn!(module = %name, "Module is not loaded");
            return Ok(());
        };

        let dependents = module.dependents();
        if !dependents.is_empty() && !force {
            let err = RuntimeError::dependency_conflict(name, dependents);
            warn!(module = %name, error = %err, "Unload blocked");
            return Err(err);
        }

        self.transition(name, module.as_ref(), ModuleState::Unloading);
        self.bus
            .publish(events::UNLOADING, payload(json!({ "module_name": name })))
            .await;

        if let Err(e) = teardown(module.as_ref()).await {
            let err = RuntimeError::from(e);
            error!(module = %name, error = %err, "Error unloading module");
            module.context().set_state(ModuleState::Error);
            self.with_record(name, |record| {
                record.state = ModuleState::Error;
                record.error = Some(format!("Unload error: {err}"));
            });
            return Err(err);
        }

        self.detach(name, module.as_ref(), sever);
        self.source.release(name);
        module.context().set_state(ModuleState::Unloaded);

        info!(module = %name, "Unloaded module");
        self.bus
            .publish(events::UNLOADED, payload(json!({ "module_name": name })))
            .await;

        Ok(())
    }

    /// Drop the live instance and remove it from its dependencies' dependents
    ///
    /// With `sever`, modules that depended on it also forget the dependency.
    fn detach(&self, name: &str, module: &dyn Module, sever: bool) {
        let mut instances = self.instances.write();
        let mut records = self.records.write();

        instances.remove(name);

        if sever {
            for dependent in module.dependents() {
                if let Some(live) = instances.get(&dependent) {
                    live.module.context().remove_dependency(name);
                }
                if let Some(record) = records.get_mut(&dependent) {
                    record.dependencies.remove(name);
                }
            }
        }

        for dependency in module.dependencies() {
            if let Some(live) = instances.get(&dependency) {
                live.module.context().remove_dependent(name);
            }
            if let Some(record) = records.get_mut(&dependency) {
                record.dependents.remove(name);
            }
        }

        if let Some(record) = records.get_mut(name) {
            record.state = ModuleState::Unloaded;
        }
    }

    // ----------------------------------------------------------------------
    // Reload
    // ----------------------------------------------------------------------

    /// Reload the module `name` from its recorded directory
    ///
    /// Skipped when the entry point has not changed since the last load,
    /// unless `force` is set. The reload counter only grows on success.
    pub async fn reload(&self, name: &str, force: bool) -> Result<()> {
        let _guard = self.op_lock.lock().await;
        let interrupted = InterruptGuard::new(self, name);
        let result = self.reload_locked(name, force).await;
        interrupted.disarm();
        result
    }

    async fn reload_locked(&self, name: &str, force: bool) -> Result<()> {
        let Some(record) = self.records.read().get(name).cloned() else {
            warn!(module = %name, "Module record not found");
            return Ok(());
        };

        if !force && record.last_modified.is_some() {
            if let Some(current) = modified(&self.entry_point(&record.path)).await {
                if !record.is_stale(current) {
                    info!(module = %name, "Module file not modified, skipping reload");
                    return Ok(());
                }
            }
        }

        let reload_count = record.reload_count + 1;
        info!(module = %name, "Reloading module");

        let outcome = async {
            if self.is_loaded(name) {
                // Edges are kept: the module comes straight back
                self.unload_locked(name, force, false).await?;
            }
            self.load_locked(name, &record.path).await
        }
        .await;

        match outcome {
            Ok(()) => {
                self.with_record(name, |record| record.reload_count = reload_count);
                info!(module = %name, reload_count, "Successfully reloaded module");
                self.bus
                    .publish(
                        events::RELOADED,
                        payload(json!({
                            "module_name": name,
                            "reload_count": reload_count,
                        })),
                    )
                    .await;
                Ok(())
            }
            Err(e) => {
                error!(module = %name, error = %e, "Error reloading module");
                self.bus
                    .publish(
                        events::RELOAD_ERROR,
                        payload(json!({
                            "module_name": name,
                            "error": e.to_string(),
                        })),
                    )
                    .await;
                Err(e)
            }
        }
    }

    // ----------------------------------------------------------------------
    // Batch operations
    // ----------------------------------------------------------------------

    /// Reload every known module
    pub async fn reload_all(&self, force: bool) -> BatchResults {
        info!(force, "Reloading all modules");

        let mut results = BatchResults::new();
        for name in self.record_names() {
            let result = self.reload(&name, force).await;
            results.insert(name, Outcome::from(&result));
        }

        let success_count = results.values().filter(|o| o.is_success()).count();
        let error_count = results.len() - success_count;
        self.bus
            .publish(
                events::RELOAD_ALL_COMPLETE,
                payload(json!({
                    "results": results,
                    "success_count": success_count,
                    "error_count": error_count,
                })),
            )
            .await;

        results
    }

    /// Unload every live module, most recently loaded first
    pub async fn unload_all(&self, force: bool) -> BatchResults {
        info!(force, "Unloading all modules");

        let mut live: Vec<(u64, String)> = self
            .instances
            .read()
            .iter()
            .map(|(name, live)| (live.seq, name.clone()))
            .collect();
        live.sort_unstable_by(|a, b| b.0.cmp(&a.0));

        let mut results = BatchResults::new();
        for (_, name) in live {
            let result = self.unload(&name, force).await;
            results.insert(name, Outcome::from(&result));
        }
        results
    }

    /// Compare every record's entry point against its recorded modification time
    pub async fn check_file_changes(&self) -> BTreeMap<String, bool> {
        let records: Vec<ModuleRecord> = self.records.read().values().cloned().collect();

        let mut changes = BTreeMap::new();
        for record in records {
            let changed = match modified(&self.entry_point(&record.path)).await {
                Some(current) => record.is_stale(current),
                None => false,
            };
            changes.insert(record.name, changed);
        }
        changes
    }

    /// Reload every module whose entry point changed
    pub async fn auto_reload_changed(&self) -> BatchResults {
        let changed: Vec<String> = self
            .check_file_changes()
            .await
            .into_iter()
            .filter_map(|(name, changed)| changed.then_some(name))
            .collect();

        let mut results = BatchResults::new();
        if changed.is_empty() {
            debug!("No module file changes detected");
            return results;
        }

        info!(modules = %changed.join(", "), "Auto-reloading changed modules");
        for name in changed {
            let result = self.reload(&name, false).await;
            results.insert(name, Outcome::from(&result));
        }
        results
    }

    // ----------------------------------------------------------------------
    // Queries
    // ----------------------------------------------------------------------

    /// Live instance of `name`
    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.instances
            .read()
            .get(name)
            .map(|live| Arc::clone(&live.module))
    }

    /// Check if a live instance of `name` exists
    pub fn is_loaded(&self, name: &str) -> bool {
        self.instances.read().contains_key(name)
    }

    /// Number of live instances
    pub fn loaded_count(&self) -> usize {
        self.instances.read().len()
    }

    /// Record of `name`
    pub fn record(&self, name: &str) -> Result<ModuleRecord> {
        self.records
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::not_found(name))
    }

    /// Every record with its live snapshot, in creation order
    pub fn list(&self) -> Vec<ModuleListing> {
        let mut records: Vec<ModuleRecord> = self.records.read().values().cloned().collect();
        records.sort_by_key(|record| record.seq);

        records
            .into_iter()
            .map(|record| {
                let module = self.get(&record.name);
                ModuleListing {
                    loaded: module.is_some(),
                    module_info: module.map(|m| m.info()),
                    record,
                }
            })
            .collect()
    }

    /// Aggregate counters
    pub fn stats(&self) -> ManagerStats {
        let loaded_modules = self.loaded_count();
        let records = self.records.read();

        let mut state_counts: BTreeMap<ModuleState, usize> =
            ModuleState::ALL.iter().map(|state| (*state, 0)).collect();
        for record in records.values() {
            *state_counts.entry(record.state).or_default() += 1;
        }

        ManagerStats {
            loaded_modules,
            total_modules: records.len(),
            failed_modules: state_counts[&ModuleState::Error],
            total_reloads: records.values().map(|r| r.reload_count).sum(),
            state_counts,
        }
    }

    /// Dependency edges between live modules
    pub fn dependency_graph(&self) -> DependencyGraph {
        let mut graph = DependencyGraph::default();
        for (name, live) in self.instances.read().iter() {
            graph
                .dependencies
                .insert(name.clone(), live.module.dependencies());
            graph
                .dependents
                .insert(name.clone(), live.module.dependents());
        }
        graph
    }

    /// Routes of every live module
    pub fn list_routes(&self) -> BTreeMap<String, Vec<RouteDescriptor>> {
        self.instances
            .read()
            .iter()
            .map(|(name, live)| (name.clone(), live.module.routes()))
            .collect()
    }

    // ----------------------------------------------------------------------
    // Record helpers
    // ----------------------------------------------------------------------

    fn record_names(&self) -> Vec<String> {
        let records = self.records.read();
        let mut names: Vec<(u64, String)> = records
            .values()
            .map(|record| (record.seq, record.name.clone()))
            .collect();
        names.sort_unstable();
        names.into_iter().map(|(_, name)| name).collect()
    }

    fn update_record(&self, name: &str, module_dir: &Path, f: impl FnOnce(&mut ModuleRecord)) {
        let mut records = self.records.write();
        let record = records.entry(name.to_string()).or_insert_with(|| {
            let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
            ModuleRecord::new(name, module_dir, seq)
        });
        f(record);
    }

    fn with_record(&self, name: &str, f: impl FnOnce(&mut ModuleRecord)) {
        if let Some(record) = self.records.write().get_mut(name) {
            f(record);
        }
    }

    fn transition(&self, name: &str, module: &dyn Module, state: ModuleState) {
        module.context().set_state(state);
        self.with_record(name, |record| record.state = state);
        debug!(module = %name, state = %state, "Module state changed");
    }

    /// Settle `name` after a mutating operation was dropped mid-flight
    ///
    /// Runs with the op lock still held and no table lock taken.
    fn settle_interrupted(&self, name: &str) {
        let mut orphans: Vec<Arc<dyn Module>> =
            self.in_flight.lock().take().into_iter().collect();

        if let Some(module) = self.get(name) {
            if !matches!(
                module.context().state(),
                ModuleState::Ready | ModuleState::Error
            ) {
                self.detach(name, module.as_ref(), false);
                orphans.push(module);
            }
        }

        let mut settled = false;
        self.with_record(name, |record| {
            if !record.state.is_settled() || !orphans.is_empty() {
                record.state = ModuleState::Error;
                record.error = Some("Operation interrupted".to_string());
                settled = true;
            }
        });

        if settled {
            error!(module = %name, "Lifecycle operation interrupted, module marked as failed");
        }
        if !orphans.is_empty() {
            self.source.release(name);
        }

        for module in orphans {
            module.context().set_state(ModuleState::Error);
            // Subscriptions go now, tasks are cancelled on the runtime if one is around
            module.context().release_subscriptions();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { module.context().cancel_tasks().await });
            }
        }
    }
}

/// Settles the record of a lifecycle operation whose future is dropped early
struct InterruptGuard<'a> {
    manager: &'a ModuleManager,
    name: &'a str,
    armed: bool,
}

impl<'a> InterruptGuard<'a> {
    fn new(manager: &'a ModuleManager, name: &'a str) -> Self {
        Self {
            manager,
            name,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.manager.settle_interrupted(self.name);
        }
    }
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("options", &self.options)
            .field("source", &self.source)
            .field("records", &self.records.read().len())
            .field("loaded", &self.loaded_count())
            .finish()
    }
}

impl Drop for ModuleManager {
    fn drop(&mut self) {
        for (pattern, id) in self.control.get_mut().drain(..) {
            self.bus.unsubscribe(&pattern, Some(id));
        }
    }
}

async fn initialize(module: &dyn Module) -> std::result::Result<(), ModuleError> {
    module.pre_initialize().await?;
    module.initialize().await?;
    module.post_initialize().await
}

async fn teardown(module: &dyn Module) -> std::result::Result<(), ModuleError> {
    module.pre_cleanup().await?;
    module.cleanup().await?;
    module.post_cleanup().await
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

async fn modified(path: &Path) -> Option<SystemTime> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    if !metadata.is_file() {
        return None;
    }
    metadata.modified().ok()
}

/// Convert a serializable value for an event payload
pub(crate) fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}
