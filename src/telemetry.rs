//! # Telemetry & Logging
//!
//! Structured logging and metrics glue around the executor's per-run
//! execution log (§6.4). Generalizes the teacher's `ProductionLogger`
//! (`logging.rs`: `LogEntry`/`LogCategory`, `log_audit`/`log_security`,
//! `PerformanceTimer`) from secure-comms events to QMK's closed tag set
//! (`LOAD`, `CERTIFIED`, `REJECTED`, `ALLOC`, `FREE`, `GATE`, `MEASURE`,
//! `COND_PAULI`, `FENCE`, `BARRIER`, `SKIP`, `FIREWALL_VIOLATION`,
//! `LINEARITY_VIOLATION`, `UNLOAD`, `UNLOAD_ERROR`, `ERROR`). This is an
//! ambient concern carried regardless of spec.md's non-goals (§6.4a) — the
//! non-goals exclude physical simulation, transport, and persistence, not
//! observability.

use std::sync::atomic::{AtomicU64, Ordering};

use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::executor::{ExecutionResult, ExecutionStatus, LogEntry};

/// Categories an execution-log tag is bucketed under for metrics/tracing
/// purposes, mirroring the teacher's `LogCategory` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogCategory {
    Lifecycle,
    Resource,
    Quantum,
    Security,
    Error,
}

fn categorize(tag: &str) -> LogCategory {
    match tag {
        "LOAD" | "CERTIFIED" | "UNLOAD" => LogCategory::Lifecycle,
        "ALLOC" | "FREE" => LogCategory::Resource,
        "GATE" | "MEASURE" | "COND_PAULI" | "FENCE" | "BARRIER" | "SKIP" => LogCategory::Quantum,
        "FIREWALL_VIOLATION" | "LINEARITY_VIOLATION" | "REJECTED" => LogCategory::Security,
        _ => LogCategory::Error,
    }
}

/// Running counters surfaced alongside the `metrics` crate gauges, for
/// callers that want an in-process snapshot without a Prometheus scrape.
#[derive(Debug, Default)]
pub struct TelemetryCounters {
    pub jobs_completed: AtomicU64,
    pub jobs_failed: AtomicU64,
    pub jobs_rejected: AtomicU64,
    pub jobs_cancelled: AtomicU64,
}

/// Process-wide telemetry sink. One instance is enough for a whole process;
/// executors share it the way the teacher's executors share `LOGGER`.
pub struct TelemetrySink {
    counters: TelemetryCounters,
    recent: RwLock<Vec<AuditEntry>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub tenant: String,
    pub tag: String,
    pub category: LogCategory,
    pub node_id: Option<String>,
    pub detail: serde_json::Value,
}

impl TelemetrySink {
    pub fn new() -> Self {
        Self {
            counters: TelemetryCounters::default(),
            recent: RwLock::new(Vec::new()),
        }
    }

    /// Records one execution-log entry: emits a `tracing` event at a
    /// severity matching its category, bumps the matching `metrics` gauge,
    /// and appends to the bounded in-process audit buffer.
    pub fn record_log_entry(&self, tenant: &str, entry: &LogEntry) {
        let category = categorize(&entry.tag);
        match category {
            LogCategory::Security => warn!(tenant, tag = %entry.tag, node = ?entry.node_id, "qmk security event"),
            LogCategory::Error => error!(tenant, tag = %entry.tag, node = ?entry.node_id, "qmk execution error"),
            _ => info!(tenant, tag = %entry.tag, node = ?entry.node_id, "qmk execution event"),
        }

        counter!("qmk.execution_log.entries", "tag" => entry.tag.clone(), "tenant" => tenant.to_string())
            .increment(1);

        let mut recent = self.recent.write();
        recent.push(AuditEntry {
            tenant: tenant.to_string(),
            tag: entry.tag.clone(),
            category,
            node_id: entry.node_id.clone(),
            detail: entry.detail.clone(),
        });
        if recent.len() > 10_000 {
            recent.drain(0..1_000);
        }
    }

    /// Records a finished run's outcome: bumps the per-status job counter,
    /// and (on success) the peak-resource histograms (§6.4a).
    pub fn record_execution(&self, tenant: &str, result: &ExecutionResult) {
        for entry in &result.execution_log {
            self.record_log_entry(tenant, entry);
        }

        match result.status {
            ExecutionStatus::Completed => {
                self.counters.jobs_completed.fetch_add(1, Ordering::Relaxed);
                counter!("qmk.jobs.completed", "tenant" => tenant.to_string()).increment(1);
            }
            ExecutionStatus::Failed => {
                self.counters.jobs_failed.fetch_add(1, Ordering::Relaxed);
                counter!("qmk.jobs.failed", "tenant" => tenant.to_string()).increment(1);
            }
            ExecutionStatus::Rejected => {
                self.counters.jobs_rejected.fetch_add(1, Ordering::Relaxed);
                counter!("qmk.jobs.rejected", "tenant" => tenant.to_string()).increment(1);
            }
            ExecutionStatus::Cancelled => {
                self.counters.jobs_cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }

        histogram!("qmk.resource.peak_physical_qubits", "tenant" => tenant.to_string())
            .record(result.telemetry.peak_resources.physical_qubits as f64);
        histogram!("qmk.resource.peak_logical_qubits", "tenant" => tenant.to_string())
            .record(result.telemetry.peak_resources.logical_qubits as f64);
        histogram!("qmk.executor.simulation_time_us", "tenant" => tenant.to_string())
            .record(result.telemetry.simulation_time_us as f64);
    }

    /// Records a rejection that never produced an `ExecutionResult` (LOAD
    /// failed certification before a log existed).
    pub fn record_rejection(&self, tenant: &str) {
        self.counters.jobs_rejected.fetch_add(1, Ordering::Relaxed);
        counter!("qmk.jobs.rejected", "tenant" => tenant.to_string()).increment(1);
    }

    pub fn snapshot_counters(&self) -> serde_json::Value {
        serde_json::json!({
            "jobs_completed": self.counters.jobs_completed.load(Ordering::Relaxed),
            "jobs_failed": self.counters.jobs_failed.load(Ordering::Relaxed),
            "jobs_rejected": self.counters.jobs_rejected.load(Ordering::Relaxed),
            "jobs_cancelled": self.counters.jobs_cancelled.load(Ordering::Relaxed),
        })
    }

    pub fn recent_audit(&self) -> Vec<AuditEntry> {
        self.recent.read().clone()
    }
}

impl Default for TelemetrySink {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide sink, constructed lazily the way the teacher's `LOGGER`
/// static is (`logging.rs`).
pub static TELEMETRY: Lazy<TelemetrySink> = Lazy::new(TelemetrySink::new);

/// Installs a JSON `tracing` subscriber reading `RUST_LOG` (or `info` if
/// unset) plus a Prometheus exporter for the `metrics` macros used above.
/// Collaborators embedding the core as a binary call this once at startup;
/// a library consumer that already owns global tracing/metrics init can
/// skip it. Mirrors the teacher's own production-logging bring-up in
/// `logging.rs`, generalized off of secure-comms-specific fields.
pub fn init_observability() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().json().with_env_filter(filter).with_timer(fmt::time::UtcTime::rfc_3339()).try_init()?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .install()
        .map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;

    Ok(())
}

#[cfg(test)]
mod init_tests {
    use super::*;

    #[test]
    fn init_observability_is_callable_without_panicking() {
        // Installing a second subscriber/exporter in the same process (e.g.
        // under `cargo test`'s shared process) fails gracefully rather than
        // panicking; we only assert the call returns rather than aborts.
        let _ = init_observability();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorizes_security_tags_distinctly_from_lifecycle() {
        assert_eq!(categorize("FIREWALL_VIOLATION"), LogCategory::Security);
        assert_eq!(categorize("LOAD"), LogCategory::Lifecycle);
        assert_eq!(categorize("GATE"), LogCategory::Quantum);
    }

    #[test]
    fn record_log_entry_appends_to_audit_buffer() {
        let sink = TelemetrySink::new();
        sink.record_log_entry(
            "tenant-a",
            &LogEntry { tag: "ALLOC".to_string(), node_id: Some("n0".to_string()), detail: serde_json::json!({}) },
        );
        let audit = sink.recent_audit();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].tenant, "tenant-a");
        assert_eq!(audit[0].category, LogCategory::Resource);
    }
}
