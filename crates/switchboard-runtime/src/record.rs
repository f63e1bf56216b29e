//! Module records
//!
//! A record tracks one module name independently of whether an instance is
//! live. Records are created on the first load attempt and never removed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::SystemTime;
use switchboard_module_api::{ModuleInfo, ModuleState};

/// Bookkeeping for one module name
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRecord {
    /// Module name
    pub name: String,

    /// Module directory
    pub path: PathBuf,

    /// Lifecycle state
    pub state: ModuleState,

    /// When the record last entered `Ready`
    pub loaded_at: Option<DateTime<Utc>>,

    /// Entry-point modification time seen by the last load attempt
    #[serde(serialize_with = "serialize_mtime")]
    pub last_modified: Option<SystemTime>,

    /// Message of the last failure
    pub error: Option<String>,

    /// Successful reloads
    pub reload_count: u64,

    /// Declared dependencies
    pub dependencies: BTreeSet<String>,

    /// Modules depending on this one
    pub dependents: BTreeSet<String>,

    /// Creation order, used for reverse-order teardown
    #[serde(skip)]
    pub(crate) seq: u64,
}

impl ModuleRecord {
    pub(crate) fn new(name: impl Into<String>, path: impl Into<PathBuf>, seq: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            state: ModuleState::Unloaded,
            loaded_at: None,
            last_modified: None,
            error: None,
            reload_count: 0,
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
            seq,
        }
    }

    /// Check whether `current` is newer than the recorded modification time
    pub fn is_stale(&self, current: SystemTime) -> bool {
        match self.last_modified {
            Some(recorded) => current > recorded,
            None => false,
        }
    }
}

fn serialize_mtime<S>(mtime: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let datetime = mtime.map(DateTime::<Utc>::from);
    serde::Serialize::serialize(&datetime, serializer)
}

/// Entry of [`ModuleManager::list`](crate::ModuleManager::list)
#[derive(Debug, Clone, Serialize)]
pub struct ModuleListing {
    /// Persistent record
    #[serde(flatten)]
    pub record: ModuleRecord,

    /// Whether a live instance exists
    pub loaded: bool,

    /// Snapshot from the live instance
    pub module_info: Option<ModuleInfo>,
}

/// Aggregate counters over every record
#[derive(Debug, Clone, Serialize)]
pub struct ManagerStats {
    /// Live instances
    pub loaded_modules: usize,

    /// Known records
    pub total_modules: usize,

    /// Records in `Error`
    pub failed_modules: usize,

    /// Records per state, every state present
    pub state_counts: BTreeMap<ModuleState, usize>,

    /// Sum of all reload counters
    pub total_reloads: u64,
}

/// Dependency edges between live modules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyGraph {
    /// Module to the modules it depends on
    pub dependencies: BTreeMap<String, BTreeSet<String>>,

    /// Module to the modules depending on it
    pub dependents: BTreeMap<String, BTreeSet<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_is_stale() {
        let mut record = ModuleRecord::new("a", "/tmp/modules/a", 0);
        let now = SystemTime::now();
        assert!(!record.is_stale(now));

        record.last_modified = Some(now);
        assert!(!record.is_stale(now));
        assert!(record.is_stale(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_record_serialization() {
        let mut record = ModuleRecord::new("system_info", "/srv/modules/system_info", 3);
        record.last_modified = Some(SystemTime::UNIX_EPOCH);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["state"], "unloaded");
        assert_eq!(value["last_modified"], "1970-01-01T00:00:00Z");
        assert!(value.get("seq").is_none());
    }
}
