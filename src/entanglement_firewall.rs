//! # Entanglement Firewall (C6)
//!
//! Mediates every entangling operation between two qubits. Same-tenant edges
//! are always permitted; cross-tenant edges require a live `Channel` that
//! names both tenants and has quota remaining. Grounded on
//! `kernel/security/entanglement_firewall.py`'s owner/graph/edge bookkeeping
//! and its same-tenant-fast-path, cross-tenant-checkpoint structure.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{EntanglementFirewallViolation, FirewallViolationKind};

fn edge_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// An authorization for cross-tenant entanglement between `tenant_a` and
/// `tenant_b`, with a bounded number of edges it may back and an optional
/// expiry. Distinct from the resource engine's `EngineChannel`, which is
/// plain bookkeeping with no authorization semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: String,
    pub tenant_a: String,
    pub tenant_b: String,
    pub max_edges: u32,
    pub used_edges: u32,
    pub created_at_us: u64,
    pub expires_at_us: Option<u64>,
    pub revoked: bool,
}

impl Channel {
    fn covers(&self, tenant_a: &str, tenant_b: &str) -> bool {
        (self.tenant_a == tenant_a && self.tenant_b == tenant_b)
            || (self.tenant_a == tenant_b && self.tenant_b == tenant_a)
    }

    fn is_expired(&self, now_us: u64) -> bool {
        self.expires_at_us.map_or(false, |exp| now_us >= exp)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EdgeRecord {
    via_channel: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FirewallStatistics {
    pub qubits: usize,
    pub edges: usize,
    pub channels: usize,
    pub cross_tenant_edges: usize,
}

pub struct EntanglementFirewall {
    owners: HashMap<String, String>,
    graph: HashMap<String, HashSet<String>>,
    edges: HashMap<(String, String), EdgeRecord>,
    channels: HashMap<String, Channel>,
}

impl EntanglementFirewall {
    pub fn new() -> Self {
        Self {
            owners: HashMap::new(),
            graph: HashMap::new(),
            edges: HashMap::new(),
            channels: HashMap::new(),
        }
    }

    pub fn register_qubit(&mut self, qubit_id: &str, tenant: &str) {
        self.owners.insert(qubit_id.to_string(), tenant.to_string());
        self.graph.entry(qubit_id.to_string()).or_default();
    }

    pub fn unregister_qubit(&mut self, qubit_id: &str) {
        self.owners.remove(qubit_id);
        if let Some(neighbors) = self.graph.remove(qubit_id) {
            for neighbor in neighbors {
                if let Some(set) = self.graph.get_mut(&neighbor) {
                    set.remove(qubit_id);
                }
                self.edges.remove(&edge_key(qubit_id, &neighbor));
            }
        }
    }

    pub fn create_channel(
        &mut self,
        id: &str,
        tenant_a: &str,
        tenant_b: &str,
        max_edges: u32,
        created_at_us: u64,
        expires_at_us: Option<u64>,
    ) -> Channel {
        let channel = Channel {
            id: id.to_string(),
            tenant_a: tenant_a.to_string(),
            tenant_b: tenant_b.to_string(),
            max_edges,
            used_edges: 0,
            created_at_us,
            expires_at_us,
            revoked: false,
        };
        self.channels.insert(id.to_string(), channel.clone());
        channel
    }

    pub fn revoke_channel(&mut self, id: &str) {
        if let Some(channel) = self.channels.get_mut(id) {
            channel.revoked = true;
        }
    }

    pub fn cleanup_expired_channels(&mut self, now_us: u64) -> usize {
        let expired: Vec<String> = self
            .channels
            .values()
            .filter(|c| c.is_expired(now_us))
            .map(|c| c.id.clone())
            .collect();
        for id in &expired {
            self.channels.remove(id);
        }
        expired.len()
    }

    /// The critical checkpoint: same-tenant edges are always permitted;
    /// cross-tenant edges require a named, live, non-exhausted channel
    /// covering exactly this tenant pair.
    pub fn add_entanglement(
        &mut self,
        qubit_a: &str,
        qubit_b: &str,
        channel_id: Option<&str>,
        now_us: u64,
    ) -> Result<(), EntanglementFirewallViolation> {
        let tenant_a = self.owners.get(qubit_a).cloned().ok_or_else(|| {
            EntanglementFirewallViolation {
                kind: FirewallViolationKind::UnknownQubit,
                message: format!("qubit {qubit_a} is not registered with the firewall"),
            }
        })?;
        let tenant_b = self.owners.get(qubit_b).cloned().ok_or_else(|| {
            EntanglementFirewallViolation {
                kind: FirewallViolationKind::UnknownQubit,
                message: format!("qubit {qubit_b} is not registered with the firewall"),
            }
        })?;

        let via_channel = if tenant_a == tenant_b {
            None
        } else {
            let channel_id = channel_id.ok_or_else(|| EntanglementFirewallViolation {
                kind: FirewallViolationKind::MissingChannel,
                message: format!(
                    "entangling {qubit_a} ({tenant_a}) with {qubit_b} ({tenant_b}) requires a channel"
                ),
            })?;

            let channel = self.channels.get_mut(channel_id).ok_or_else(|| {
                EntanglementFirewallViolation {
                    kind: FirewallViolationKind::InvalidChannel,
                    message: format!("unknown channel: {channel_id}"),
                }
            })?;

            if channel.revoked {
                return Err(EntanglementFirewallViolation {
                    kind: FirewallViolationKind::RevokedChannel,
                    message: format!("channel {channel_id} has been revoked"),
                });
            }
            if channel.is_expired(now_us) {
                return Err(EntanglementFirewallViolation {
                    kind: FirewallViolationKind::ExpiredChannel,
                    message: format!("channel {channel_id} expired"),
                });
            }
            if !channel.covers(&tenant_a, &tenant_b) {
                return Err(EntanglementFirewallViolation {
                    kind: FirewallViolationKind::UnauthorizedCrossTenant,
                    message: format!(
                        "channel {channel_id} does not cover tenants {tenant_a}/{tenant_b}"
                    ),
                });
            }
            if channel.used_edges >= channel.max_edges {
                return Err(EntanglementFirewallViolation {
                    kind: FirewallViolationKind::ChannelQuotaExceeded,
                    message: format!("channel {channel_id} has exhausted its edge quota"),
                });
            }

            channel.used_edges += 1;
            Some(channel_id.to_string())
        };

        self.graph.entry(qubit_a.to_string()).or_default().insert(qubit_b.to_string());
        self.graph.entry(qubit_b.to_string()).or_default().insert(qubit_a.to_string());
        self.edges.insert(edge_key(qubit_a, qubit_b), EdgeRecord { via_channel });
        Ok(())
    }

    pub fn neighbors(&self, qubit_id: &str) -> Vec<String> {
        self.graph
            .get(qubit_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_entangled(&self, qubit_a: &str, qubit_b: &str) -> bool {
        self.edges.contains_key(&edge_key(qubit_a, qubit_b))
    }

    /// Every cross-tenant edge must still be backed by a live, non-revoked
    /// channel. Same-tenant edges need no backing. Returns the offending
    /// edges, if any.
    pub fn verify_invariant(&self, now_us: u64) -> Vec<(String, String)> {
        let mut violations = Vec::new();
        for ((a, b), record) in &self.edges {
            if let Some(channel_id) = &record.via_channel {
                let ok = self
                    .channels
                    .get(channel_id)
                    .map_or(false, |c| !c.revoked && !c.is_expired(now_us));
                if !ok {
                    violations.push((a.clone(), b.clone()));
                }
            }
        }
        violations
    }

    pub fn statistics(&self) -> FirewallStatistics {
        let cross_tenant_edges = self
            .edges
            .values()
            .filter(|r| r.via_channel.is_some())
            .count();
        FirewallStatistics {
            qubits: self.owners.len(),
            edges: self.edges.len(),
            channels: self.channels.len(),
            cross_tenant_edges,
        }
    }
}

impl Default for EntanglementFirewall {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_tenant_entanglement_needs_no_channel() {
        let mut fw = EntanglementFirewall::new();
        fw.register_qubit("q0", "tenant-a");
        fw.register_qubit("q1", "tenant-a");
        fw.add_entanglement("q0", "q1", None, 0).unwrap();
        assert!(fw.is_entangled("q0", "q1"));
    }

    #[test]
    fn cross_tenant_without_channel_is_rejected() {
        let mut fw = EntanglementFirewall::new();
        fw.register_qubit("q0", "tenant-a");
        fw.register_qubit("q1", "tenant-b");
        let err = fw.add_entanglement("q0", "q1", None, 0).unwrap_err();
        assert_eq!(err.kind, FirewallViolationKind::MissingChannel);
    }

    #[test]
    fn cross_tenant_with_valid_channel_succeeds_and_consumes_quota() {
        let mut fw = EntanglementFirewall::new();
        fw.register_qubit("q0", "tenant-a");
        fw.register_qubit("q1", "tenant-b");
        fw.create_channel("ch1", "tenant-a", "tenant-b", 1, 0, None);
        fw.add_entanglement("q0", "q1", Some("ch1"), 0).unwrap();
        assert!(fw.is_entangled("q0", "q1"));

        fw.register_qubit("q2", "tenant-b");
        let err = fw.add_entanglement("q0", "q2", Some("ch1"), 0).unwrap_err();
        assert_eq!(err.kind, FirewallViolationKind::ChannelQuotaExceeded);
    }

    #[test]
    fn revoked_channel_is_rejected() {
        let mut fw = EntanglementFirewall::new();
        fw.register_qubit("q0", "tenant-a");
        fw.register_qubit("q1", "tenant-b");
        fw.create_channel("ch1", "tenant-a", "tenant-b", 5, 0, None);
        fw.revoke_channel("ch1");
        let err = fw.add_entanglement("q0", "q1", Some("ch1"), 0).unwrap_err();
        assert_eq!(err.kind, FirewallViolationKind::RevokedChannel);
    }

    #[test]
    fn expired_channel_is_rejected() {
        let mut fw = EntanglementFirewall::new();
        fw.register_qubit("q0", "tenant-a");
        fw.register_qubit("q1", "tenant-b");
        fw.create_channel("ch1", "tenant-a", "tenant-b", 5, 0, Some(100));
        let err = fw.add_entanglement("q0", "q1", Some("ch1"), 200).unwrap_err();
        assert_eq!(err.kind, FirewallViolationKind::ExpiredChannel);
    }

    #[test]
    fn unregister_qubit_removes_its_edges() {
        let mut fw = EntanglementFirewall::new();
        fw.register_qubit("q0", "tenant-a");
        fw.register_qubit("q1", "tenant-a");
        fw.add_entanglement("q0", "q1", None, 0).unwrap();
        fw.unregister_qubit("q0");
        assert!(!fw.is_entangled("q0", "q1"));
        assert!(fw.neighbors("q1").is_empty());
    }
}
