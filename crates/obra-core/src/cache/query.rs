use std::collections::HashMap;
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::{SessionEvent, SessionListener};

/// Consider cached queries stale after 5 minutes.
const QUERY_STALE_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", minutes / 60)
        } else {
            format!("{}d ago", minutes / 1440)
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() >= QUERY_STALE_MINUTES
    }
}

/// Identifies a cached query: a resource scope plus an optional parameter,
/// e.g. `materials`, `material/12`, `zones-by-project/4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    scope: &'static str,
    param: Option<String>,
}

impl QueryKey {
    pub const PROJECTS: &'static str = "projects";
    pub const WORK_ZONES: &'static str = "workZones";
    pub const ZONES_BY_PROJECT: &'static str = "zones-by-project";
    pub const MATERIALS: &'static str = "materials";
    pub const MATERIALS_BY_PROJECT: &'static str = "materialsByProject";
    pub const INVENTORIES: &'static str = "inventories";
    pub const MATERIAL_REQUESTS: &'static str = "materialsRequests";
    pub const TASKS: &'static str = "tasks";
    pub const ATTENDANCES: &'static str = "attendances";
    pub const ALL_USERS: &'static str = "all-users";
    pub const ZONE_ASSIGNMENTS: &'static str = "assignUserZones";

    pub fn all(scope: &'static str) -> Self {
        Self { scope, param: None }
    }

    pub fn with(scope: &'static str, param: impl ToString) -> Self {
        Self {
            scope,
            param: Some(param.to_string()),
        }
    }

    pub fn scope(&self) -> &'static str {
        self.scope
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.param {
            Some(ref param) => write!(f, "{}/{}", self.scope, param),
            None => f.write_str(self.scope),
        }
    }
}

#[derive(Default)]
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, CachedData<Value>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<QueryKey, CachedData<Value>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<QueryKey, CachedData<Value>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn put<T: Serialize>(&self, key: QueryKey, data: &T) -> Result<()> {
        let value = serde_json::to_value(data)
            .with_context(|| format!("Failed to serialize query data: {}", key))?;
        self.write().insert(key, CachedData::new(value));
        Ok(())
    }

    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<CachedData<T>>> {
        let Some(cached) = self.read().get(key).cloned() else {
            return Ok(None);
        };
        let data = serde_json::from_value(cached.data)
            .with_context(|| format!("Failed to parse cached query: {}", key))?;
        Ok(Some(CachedData {
            data,
            cached_at: cached.cached_at,
        }))
    }

    /// Like `get`, but stale entries count as missing.
    pub fn get_fresh<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<T>> {
        Ok(self
            .get(key)?
            .filter(|cached| !cached.is_stale())
            .map(|cached| cached.data))
    }

    /// Drop every entry of a scope, whatever its parameter.
    pub fn invalidate(&self, scope: &str) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|key, _| key.scope != scope);
        let removed = before - entries.len();
        debug!(scope, removed, "Queries invalidated");
        removed
    }

    pub fn remove_all(&self) -> usize {
        let mut entries = self.write();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Age of an entry for display, `None` when not cached.
    pub fn age(&self, key: &QueryKey) -> Option<String> {
        self.read().get(key).map(|cached| cached.age_display())
    }
}

impl SessionListener for QueryCache {
    fn on_session_event(&self, event: &SessionEvent) {
        if let SessionEvent::Ended { reason } = event {
            let removed = self.remove_all();
            info!(?reason, removed, "Query cache evicted");
        }
    }
}
