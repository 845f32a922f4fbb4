//! In-process store of published bus values.

use std::collections::{BTreeMap, BTreeSet};

use lambda_common::{TelemetryPoint, TelemetryValue};
use thiserror::Error;

use crate::format::ValueFormat;

/// Errors returned by [`PublishStore`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Path '{0}' is not registered")]
    UnknownPath(String),
    #[error("Path '{0}' is already registered")]
    AlreadyRegistered(String),
    #[error("Path '{0}' is read-only")]
    ReadOnly(String),
}

/// Called when an external writer proposes a value for a writable path.
pub type ChangeHandler = fn(&str, &TelemetryValue);

#[derive(Clone)]
struct Entry {
    value: TelemetryValue,
    format: ValueFormat,
    writable: bool,
    on_change: Option<ChangeHandler>,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("value", &self.value)
            .field("format", &self.format)
            .field("writable", &self.writable)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// Named values of one bus service.
///
/// Every path is registered once with an initial value and keeps its last
/// written value until overwritten. Writes mark a path dirty; the dirty set
/// is drained by [`take_dirty`](Self::take_dirty) to mirror changes onto the bus.
#[derive(Debug, Clone)]
pub struct PublishStore {
    service: String,
    entries: BTreeMap<String, Entry>,
    dirty: BTreeSet<String>,
}

impl PublishStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Register a path with its initial value.
    ///
    /// The path starts dirty so the initial value gets published.
    pub fn register_path(
        &mut self,
        path: impl Into<String>,
        initial: impl Into<TelemetryValue>,
        format: ValueFormat,
        writable: bool,
        on_change: Option<ChangeHandler>,
    ) -> Result<(), StoreError> {
        let path = path.into();
        if self.entries.contains_key(&path) {
            return Err(StoreError::AlreadyRegistered(path));
        }

        self.entries.insert(
            path.clone(),
            Entry {
                value: initial.into(),
                format,
                writable,
                on_change,
            },
        );
        self.dirty.insert(path);
        Ok(())
    }

    /// Set the value of a registered path.
    pub fn write(&mut self, path: &str, value: impl Into<TelemetryValue>) -> Result<(), StoreError> {
        let entry = self
            .entries
            .get_mut(path)
            .ok_or_else(|| StoreError::UnknownPath(path.to_string()))?;
        entry.value = value.into();
        self.dirty.insert(path.to_string());
        Ok(())
    }

    pub fn read(&self, path: &str) -> Option<&TelemetryValue> {
        self.entries.get(path).map(|entry| &entry.value)
    }

    /// Current value rendered with the path's format.
    pub fn text(&self, path: &str) -> Option<String> {
        self.entries
            .get(path)
            .map(|entry| entry.format.render(&entry.value))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Report a write coming from outside the bridge.
    ///
    /// Only writable paths accept it, and accepting means the path's change
    /// handler sees the proposed value. The stored value stays what the last
    /// poll wrote and nothing is queued for publishing.
    pub fn apply_external(&self, path: &str, value: &TelemetryValue) -> Result<(), StoreError> {
        let entry = self
            .entries
            .get(path)
            .ok_or_else(|| StoreError::UnknownPath(path.to_string()))?;
        if !entry.writable {
            return Err(StoreError::ReadOnly(path.to_string()));
        }

        if let Some(handler) = entry.on_change {
            handler(path, value);
        }
        Ok(())
    }

    /// Snapshot of one path as a bus point.
    pub fn point(&self, path: &str) -> Option<TelemetryPoint> {
        let entry = self.entries.get(path)?;
        let point = TelemetryPoint::new(&self.service, path, entry.value.clone())
            .with_text(entry.format.render(&entry.value));
        Some(match entry.format.unit() {
            Some(unit) => point.with_label("unit", unit),
            None => point,
        })
    }

    /// Points for every path written since the last call, in path order.
    pub fn take_dirty(&mut self) -> Vec<TelemetryPoint> {
        let dirty = std::mem::take(&mut self.dirty);
        dirty.iter().filter_map(|path| self.point(path)).collect()
    }
}
