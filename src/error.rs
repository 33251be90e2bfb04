//! # Error Taxonomy
//!
//! Structured error types for every subsystem in the certification-and-enforcement
//! stack (C4-C8). Each taxonomy is a distinct `thiserror` type carrying a typed
//! violation kind plus enough context to drive programmatic recovery, mirroring
//! the way the rest of this crate separates "what failed" from "why".
//!
//! No violation is ever collapsed to a bare string before it crosses a module
//! boundary — callers that need to branch on violation kind (see the testable
//! properties around capability soundness and linearity) can match on the
//! `*Kind` enums without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ways a graph can fail the linear type system's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinearityViolationKind {
    /// A handle was requested for a resource id that already has a live handle.
    Aliasing,
    /// A consuming operation targeted a handle that was never allocated, or was
    /// already consumed/moved/invalidated.
    UseAfterConsume,
    /// `consume` was called on a handle already in `CONSUMED`.
    DoubleConsume,
    /// `consume` was called on a handle already in `MOVED`.
    MovedResource,
    /// An `ALLOCATED` handle aged past the leak threshold without being consumed.
    ResourceLeak,
}

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("linearity violation ({kind:?}) on resource {resource_id}: {op_label}")]
pub struct LinearityViolation {
    pub kind: LinearityViolationKind,
    pub resource_id: String,
    pub op_label: String,
}

/// Ways the entanglement firewall can refuse a cross-tenant edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FirewallViolationKind {
    MissingChannel,
    InvalidChannel,
    RevokedChannel,
    ExpiredChannel,
    ChannelQuotaExceeded,
    UnauthorizedCrossTenant,
    UnknownQubit,
}

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("entanglement firewall violation ({kind:?}): {message}")]
pub struct EntanglementFirewallViolation {
    pub kind: FirewallViolationKind,
    pub message: String,
}

/// Ways a capability check can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityViolationKind {
    InvalidSignature,
    Expired,
    Revoked,
    MissingCapability,
    UsesExceeded,
    InvalidAttenuation,
}

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("capability violation ({kind:?}): {message}")]
pub struct CapabilityViolation {
    pub kind: CapabilityViolationKind,
    pub message: String,
}

/// Ways the resource engine can refuse an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceErrorKind {
    ResourceExhausted,
    UnknownQubit,
    UnknownChannel,
}

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("resource error ({kind:?}): {message}")]
pub struct ResourceError {
    pub kind: ResourceErrorKind,
    pub message: String,
}

/// Malformed-graph / scheduling errors, distinct from certification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphErrorKind {
    Malformed,
    UnknownOp,
    Cycle,
    UnknownProfile,
}

#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("graph error ({kind:?}): {message}")]
pub struct GraphError {
    pub kind: GraphErrorKind,
    pub message: String,
}

/// One finding from a verifier pass (shape, linearity, capability, firewall,
/// resource-bounds), carried alongside the node it was raised against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationFinding {
    pub pass: VerificationPass,
    pub code: String,
    pub message: String,
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationPass {
    Shape,
    Linearity,
    Capability,
    Firewall,
    ResourceBounds,
}

/// Certification failed in LOAD. Carries every typed finding plus a
/// human-readable report, per spec.md's requirement that failed jobs expose
/// the full certification report in their error payload (§7/§6.3).
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
#[error("graph failed static verification with {} error(s)", .findings.len())]
pub struct VerificationError {
    pub findings: Vec<VerificationFinding>,
    pub report: String,
}

/// Crate-wide error type aggregating every subsystem taxonomy.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum QmkError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Linearity(#[from] LinearityViolation),

    #[error(transparent)]
    Firewall(#[from] EntanglementFirewallViolation),

    #[error(transparent)]
    Capability(#[from] CapabilityViolation),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Configuration or setup errors not attributable to one subsystem taxonomy.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, QmkError>;
