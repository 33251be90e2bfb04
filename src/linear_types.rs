//! # Linear Type System (C5)
//!
//! One handle per live quantum resource, enforcing use-once semantics and
//! no-aliasing. Grounded on `kernel/types/linear_types.py`'s `LinearHandle`/
//! `LinearTypeSystem`, including the exact violation-ordering rule in
//! `consume` (double-consume beats moved-resource beats use-after-consume)
//! and the 60-second leak-age threshold.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{LinearityViolation, LinearityViolationKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Vq,
    Ch,
    Ev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandleState {
    Allocated,
    Consumed,
    Moved,
    Invalidated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearHandle {
    pub handle_id: String,
    pub resource_kind: ResourceKind,
    pub resource_id: String,
    pub tenant: String,
    pub state: HandleState,
    pub created_at: DateTime<Utc>,
    pub consumed_by_op: Option<String>,
    pub metadata: serde_json::Value,
}

impl LinearHandle {
    pub fn is_allocated(&self) -> bool {
        matches!(self.state, HandleState::Allocated)
    }

    pub fn is_consumed(&self) -> bool {
        matches!(self.state, HandleState::Consumed)
    }
}

const LEAK_AGE_THRESHOLD_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LinearStatistics {
    pub total_handles: usize,
    pub allocated: usize,
    pub consumed: usize,
    pub moved: usize,
    pub invalidated: usize,
}

/// Tracks one handle per live resource id. `create_handle` enforces
/// no-aliasing: at most one handle for a given `resource_id` may be
/// `ALLOCATED` at a time.
pub struct LinearTypeSystem {
    handles: DashMap<String, LinearHandle>,
    /// resource_id -> handle_id of the current ALLOCATED handle, if any.
    live_resource: DashMap<String, String>,
}

impl LinearTypeSystem {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
            live_resource: DashMap::new(),
        }
    }

    pub fn create_handle(
        &self,
        resource_kind: ResourceKind,
        resource_id: &str,
        tenant: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<LinearHandle, LinearityViolation> {
        if self.live_resource.contains_key(resource_id) {
            return Err(LinearityViolation {
                kind: LinearityViolationKind::Aliasing,
                resource_id: resource_id.to_string(),
                op_label: "create_handle".to_string(),
            });
        }

        let mut suffix = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut suffix);
        let handle_id = format!("h-{}", suffix.iter().map(|b| format!("{b:02x}")).collect::<String>());

        let handle = LinearHandle {
            handle_id: handle_id.clone(),
            resource_kind,
            resource_id: resource_id.to_string(),
            tenant: tenant.to_string(),
            state: HandleState::Allocated,
            created_at: Utc::now(),
            consumed_by_op: None,
            metadata: metadata.unwrap_or(serde_json::Value::Null),
        };

        self.handles.insert(handle_id.clone(), handle.clone());
        self.live_resource.insert(resource_id.to_string(), handle_id);
        Ok(handle)
    }

    /// `ALLOCATED -> CONSUMED`. Any other starting state is a violation,
    /// with strict priority: `DOUBLE_CONSUME` (from CONSUMED) over
    /// `MOVED_RESOURCE` (from MOVED) over `USE_AFTER_CONSUME` (otherwise).
    pub fn consume_handle(&self, handle_id: &str, op_label: &str) -> Result<(), LinearityViolation> {
        let mut entry = self.handles.get_mut(handle_id).ok_or_else(|| LinearityViolation {
            kind: LinearityViolationKind::UseAfterConsume,
            resource_id: handle_id.to_string(),
            op_label: op_label.to_string(),
        })?;

        match entry.state {
            HandleState::Allocated => {
                entry.state = HandleState::Consumed;
                entry.consumed_by_op = Some(op_label.to_string());
                self.live_resource.remove(&entry.resource_id);
                Ok(())
            }
            HandleState::Consumed => Err(LinearityViolation {
                kind: LinearityViolationKind::DoubleConsume,
                resource_id: entry.resource_id.clone(),
                op_label: op_label.to_string(),
            }),
            HandleState::Moved => Err(LinearityViolation {
                kind: LinearityViolationKind::MovedResource,
                resource_id: entry.resource_id.clone(),
                op_label: op_label.to_string(),
            }),
            HandleState::Invalidated => Err(LinearityViolation {
                kind: LinearityViolationKind::UseAfterConsume,
                resource_id: entry.resource_id.clone(),
                op_label: op_label.to_string(),
            }),
        }
    }

    /// `ALLOCATED -> MOVED`, returning the handle id. Same violation
    /// ordering as `consume_handle` applies to subsequent operations.
    pub fn move_handle(&self, handle_id: &str) -> Result<String, LinearityViolation> {
        let mut entry = self.handles.get_mut(handle_id).ok_or_else(|| LinearityViolation {
            kind: LinearityViolationKind::UseAfterConsume,
            resource_id: handle_id.to_string(),
            op_label: "move".to_string(),
        })?;

        match entry.state {
            HandleState::Allocated => {
                entry.state = HandleState::Moved;
                self.live_resource.remove(&entry.resource_id);
                Ok(entry.handle_id.clone())
            }
            HandleState::Consumed => Err(LinearityViolation {
                kind: LinearityViolationKind::DoubleConsume,
                resource_id: entry.resource_id.clone(),
                op_label: "move".to_string(),
            }),
            HandleState::Moved => Err(LinearityViolation {
                kind: LinearityViolationKind::MovedResource,
                resource_id: entry.resource_id.clone(),
                op_label: "move".to_string(),
            }),
            HandleState::Invalidated => Err(LinearityViolation {
                kind: LinearityViolationKind::UseAfterConsume,
                resource_id: entry.resource_id.clone(),
                op_label: "move".to_string(),
            }),
        }
    }

    /// Recovery path used by error handlers; does not count as consumption
    /// and always succeeds (idempotent).
    pub fn invalidate_handle(&self, handle_id: &str) {
        if let Some(mut entry) = self.handles.get_mut(handle_id) {
            if matches!(entry.state, HandleState::Allocated) {
                self.live_resource.remove(&entry.resource_id);
            }
            entry.state = HandleState::Invalidated;
        }
    }

    pub fn check_handle(&self, handle_id: &str) -> bool {
        self.handles.get(handle_id).map_or(false, |h| h.is_allocated())
    }

    /// Consumes whichever handle is currently `ALLOCATED` for `resource_id`,
    /// the form the executor actually uses (it addresses resources by id,
    /// not by the handle ids `create_handle` mints internally).
    pub fn consume_resource(&self, resource_id: &str, op_label: &str) -> Result<(), LinearityViolation> {
        let handle_id = self.live_resource.get(resource_id).map(|e| e.value().clone());
        match handle_id {
            Some(handle_id) => self.consume_handle(&handle_id, op_label),
            None => Err(LinearityViolation {
                kind: LinearityViolationKind::UseAfterConsume,
                resource_id: resource_id.to_string(),
                op_label: op_label.to_string(),
            }),
        }
    }

    /// True iff `resource_id` currently has a live `ALLOCATED` handle.
    pub fn check_resource(&self, resource_id: &str) -> bool {
        self.get_resource_handle(resource_id).map_or(false, |h| h.is_allocated())
    }

    pub fn get_handle(&self, handle_id: &str) -> Option<LinearHandle> {
        self.handles.get(handle_id).map(|h| h.clone())
    }

    pub fn get_resource_handle(&self, resource_id: &str) -> Option<LinearHandle> {
        let handle_id = self.live_resource.get(resource_id)?;
        self.handles.get(handle_id.value()).map(|h| h.clone())
    }

    /// Sweeps `ALLOCATED` handles older than the leak-age threshold. Leaks
    /// are warnings, not fatal, unless the verifier runs in strict mode.
    pub fn detect_leaks(&self) -> Vec<LinearHandle> {
        let now = Utc::now();
        let threshold = ChronoDuration::seconds(LEAK_AGE_THRESHOLD_SECS);
        self.handles
            .iter()
            .filter(|e| e.is_allocated() && now - e.created_at > threshold)
            .map(|e| e.clone())
            .collect()
    }

    pub fn cleanup_consumed_handles(&self) {
        self.handles
            .retain(|_, h| matches!(h.state, HandleState::Allocated));
    }

    pub fn get_tenant_handles(&self, tenant: &str) -> Vec<LinearHandle> {
        self.handles
            .iter()
            .filter(|e| e.tenant == tenant)
            .map(|e| e.clone())
            .collect()
    }

    pub fn statistics(&self) -> LinearStatistics {
        let mut stats = LinearStatistics::default();
        for entry in self.handles.iter() {
            stats.total_handles += 1;
            match entry.state {
                HandleState::Allocated => stats.allocated += 1,
                HandleState::Consumed => stats.consumed += 1,
                HandleState::Moved => stats.moved += 1,
                HandleState::Invalidated => stats.invalidated += 1,
            }
        }
        stats
    }

    /// No resource id has more than one `ALLOCATED` handle — true by
    /// construction, checked here as a defense-in-depth invariant sweep.
    pub fn verify_linearity(&self) -> bool {
        self.live_resource.iter().all(|e| {
            self.handles
                .get(e.value())
                .map_or(false, |h| h.is_allocated() && h.resource_id == *e.key())
        })
    }
}

impl Default for LinearTypeSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliasing_is_rejected() {
        let system = LinearTypeSystem::new();
        system.create_handle(ResourceKind::Vq, "q0", "t", None).unwrap();
        let err = system
            .create_handle(ResourceKind::Vq, "q0", "t", None)
            .unwrap_err();
        assert_eq!(err.kind, LinearityViolationKind::Aliasing);
    }

    #[test]
    fn consume_transitions_and_allows_realloc() {
        let system = LinearTypeSystem::new();
        let handle = system.create_handle(ResourceKind::Vq, "q0", "t", None).unwrap();
        system.consume_handle(&handle.handle_id, "MEASURE_Z").unwrap();
        assert!(!system.check_handle(&handle.handle_id));
        // resource is free again after consumption
        assert!(system.create_handle(ResourceKind::Vq, "q0", "t", None).is_ok());
    }

    #[test]
    fn double_consume_takes_priority_over_use_after_consume() {
        let system = LinearTypeSystem::new();
        let handle = system.create_handle(ResourceKind::Vq, "q0", "t", None).unwrap();
        system.consume_handle(&handle.handle_id, "MEASURE_Z").unwrap();
        let err = system.consume_handle(&handle.handle_id, "FREE_LQ").unwrap_err();
        assert_eq!(err.kind, LinearityViolationKind::DoubleConsume);
    }

    #[test]
    fn moved_resource_violation() {
        let system = LinearTypeSystem::new();
        let handle = system.create_handle(ResourceKind::Vq, "q0", "t", None).unwrap();
        system.move_handle(&handle.handle_id).unwrap();
        let err = system.consume_handle(&handle.handle_id, "FREE_LQ").unwrap_err();
        assert_eq!(err.kind, LinearityViolationKind::MovedResource);
    }

    #[test]
    fn consume_resource_looks_up_the_live_handle_by_resource_id() {
        let system = LinearTypeSystem::new();
        system.create_handle(ResourceKind::Vq, "q0", "t", None).unwrap();
        // executor-facing API addresses the resource, not the minted handle id
        system.consume_resource("q0", "MEASURE_Z").unwrap();
        assert!(!system.check_resource("q0"));
        let err = system.consume_resource("q0", "MEASURE_Z").unwrap_err();
        assert_eq!(err.kind, LinearityViolationKind::UseAfterConsume);
    }

    #[test]
    fn invalidate_is_not_consumption() {
        let system = LinearTypeSystem::new();
        let handle = system.create_handle(ResourceKind::Vq, "q0", "t", None).unwrap();
        system.invalidate_handle(&handle.handle_id);
        let err = system.consume_handle(&handle.handle_id, "FREE_LQ").unwrap_err();
        assert_eq!(err.kind, LinearityViolationKind::UseAfterConsume);
    }
}
