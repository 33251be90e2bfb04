//! # Resource Engine (C3)
//!
//! Owns the set of allocated logical qubits and open engine-level channels,
//! the monotonic simulated-time cursor, and running peak-usage counters.
//! Generalizes the original physical-qubit pool (a flat set of integer ids
//! handed out round-robin) to profile-costed allocation against a configured
//! ceiling, per spec.md §4.3.

use std::collections::HashMap;

use dashmap::mapref::one::{Ref, RefMut};
use dashmap::DashMap;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ResourceError, ResourceErrorKind};
use crate::logical_qubit::{LogicalQubit, MeasurementBasis, TwoQubitGate};
use crate::qec_profiles::QecProfile;

/// An engine-level channel: a bookkeeping record of a point-to-point
/// entanglement-distribution resource between two qubits. Distinct from the
/// firewall's `Channel` (§4.6), which authorizes cross-tenant entanglement —
/// `OPEN_CHAN`/`CLOSE_CHAN` manage this one (§6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineChannel {
    pub id: String,
    pub qubit_a: String,
    pub qubit_b: String,
    pub fidelity: f64,
    pub opened_at_us: u64,
}

/// Peak resource usage observed over a run, captured before the UNLOAD
/// free-sweep so values reflect the run rather than its aftermath.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct PeakUsage {
    pub logical_qubits: usize,
    pub physical_qubits: u64,
    pub channels: usize,
    pub final_sim_time_us: u64,
}

pub struct ResourceEngine {
    max_physical_qubits: u64,
    logical_qubits: DashMap<String, LogicalQubit>,
    channels: HashMap<String, EngineChannel>,
    physical_qubits_in_use: u64,
    sim_time_us: u64,
    peak: PeakUsage,
    pub rng: ChaCha20Rng,
}

impl ResourceEngine {
    pub fn new(max_physical_qubits: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha20Rng::seed_from_u64(s),
            None => ChaCha20Rng::from_entropy(),
        };
        Self {
            max_physical_qubits,
            logical_qubits: DashMap::new(),
            channels: HashMap::new(),
            physical_qubits_in_use: 0,
            sim_time_us: 0,
            peak: PeakUsage::default(),
            rng,
        }
    }

    /// Allocate fresh logical qubits in state |0⟩. Fails with
    /// `RESOURCE_EXHAUSTED` if the physical budget would be exceeded.
    pub fn allocate(
        &mut self,
        ids: &[String],
        tenant: &str,
        profile: QecProfile,
    ) -> Result<(), ResourceError> {
        let additional_cost = profile.physical_qubits_per_logical * ids.len() as u64;
        if self.physical_qubits_in_use + additional_cost > self.max_physical_qubits {
            return Err(ResourceError {
                kind: ResourceErrorKind::ResourceExhausted,
                message: format!(
                    "allocating {} logical qubit(s) at {} physical qubits each would exceed the ceiling of {}",
                    ids.len(), profile.physical_qubits_per_logical, self.max_physical_qubits
                ),
            });
        }

        for id in ids {
            self.logical_qubits
                .insert(id.clone(), LogicalQubit::new(id.clone(), tenant, profile));
        }
        self.physical_qubits_in_use += additional_cost;
        self.update_peaks();
        Ok(())
    }

    /// Free logical qubits, clearing any entanglement partner's pairing too.
    pub fn free(&mut self, ids: &[String]) {
        for id in ids {
            if let Some((_, qubit)) = self.logical_qubits.remove(id) {
                self.physical_qubits_in_use = self
                    .physical_qubits_in_use
                    .saturating_sub(qubit.profile.physical_qubits_per_logical);
                if let Some(partner_id) = qubit.entanglement_partner {
                    if let Some(mut partner) = self.logical_qubits.get_mut(&partner_id) {
                        partner.entanglement_partner = None;
                    }
                }
            }
        }
    }

    pub fn get(&self, id: &str) -> Result<Ref<'_, String, LogicalQubit>, ResourceError> {
        self.logical_qubits.get(id).ok_or_else(|| ResourceError {
            kind: ResourceErrorKind::UnknownQubit,
            message: format!("unknown logical qubit: {id}"),
        })
    }

    pub fn get_mut(&mut self, id: &str) -> Result<RefMut<'_, String, LogicalQubit>, ResourceError> {
        self.logical_qubits.get_mut(id).ok_or_else(|| ResourceError {
            kind: ResourceErrorKind::UnknownQubit,
            message: format!("unknown logical qubit: {id}"),
        })
    }

    /// Apply a two-qubit transition to two distinct qubits. Each is taken out
    /// of the map by value, mutated as plain owned locals (so `DashMap` never
    /// has two guards live at once — two keys landing in the same shard would
    /// otherwise deadlock a pair of simultaneous `get_mut` calls), then both
    /// are reinserted before returning.
    fn with_two_mut<T>(
        &mut self,
        a: &str,
        b: &str,
        f: impl FnOnce(&mut LogicalQubit, &mut LogicalQubit) -> T,
    ) -> Result<T, ResourceError> {
        if a == b {
            return Err(ResourceError {
                kind: ResourceErrorKind::UnknownQubit,
                message: format!("two-qubit operation referenced the same qubit twice: {a}"),
            });
        }
        let (_, mut qa) = self.logical_qubits.remove(a).ok_or_else(|| ResourceError {
            kind: ResourceErrorKind::UnknownQubit,
            message: format!("unknown logical qubit among ({a}, {b})"),
        })?;
        let (_, mut qb) = match self.logical_qubits.remove(b) {
            Some(entry) => entry,
            None => {
                self.logical_qubits.insert(a.to_string(), qa);
                return Err(ResourceError {
                    kind: ResourceErrorKind::UnknownQubit,
                    message: format!("unknown logical qubit among ({a}, {b})"),
                });
            }
        };
        let result = f(&mut qa, &mut qb);
        self.logical_qubits.insert(a.to_string(), qa);
        self.logical_qubits.insert(b.to_string(), qb);
        Ok(result)
    }

    /// Borrow two distinct qubits at once, for two-qubit gates (CNOT/CZ/SWAP).
    pub fn apply_two_qubit_gate(
        &mut self,
        a: &str,
        b: &str,
        now: u64,
        f: impl FnOnce(&mut LogicalQubit, &mut LogicalQubit, u64),
    ) -> Result<u64, ResourceError> {
        self.with_two_mut(a, b, |qa, qb| {
            f(qa, qb, now);
            qa.profile.logical_cycle_time_us.max(qb.profile.logical_cycle_time_us)
        })
    }

    /// Measure a non-entangled (or already-unpaired) qubit in the given
    /// basis, advancing time by its profile's cycle time.
    pub fn measure_qubit(&mut self, id: &str, basis: MeasurementBasis) -> Result<u8, ResourceError> {
        let now = self.sim_time_us;
        let mut qubit = self.logical_qubits.get_mut(id).ok_or_else(|| ResourceError {
            kind: ResourceErrorKind::UnknownQubit,
            message: format!("unknown logical qubit: {id}"),
        })?;
        let outcome = qubit.measure(basis, now, &mut self.rng);
        let cycle = qubit.profile.logical_cycle_time_us;
        drop(qubit);
        self.advance_time(cycle);
        Ok(outcome)
    }

    /// Measure `id` and propagate the outcome onto its entangled partner
    /// ("collapse propagation", §4.2) before returning. `id` is taken out of
    /// the map and measured as an owned local, then reinserted, so the
    /// subsequent lookup of `partner_id` never overlaps with a live guard on
    /// `id` — even if both keys hash to the same `DashMap` shard.
    pub fn measure_entangled_pair(
        &mut self,
        id: &str,
        partner_id: &str,
        basis: MeasurementBasis,
    ) -> Result<u8, ResourceError> {
        if id == partner_id {
            return Err(ResourceError {
                kind: ResourceErrorKind::UnknownQubit,
                message: format!("qubit {id} entangled with itself"),
            });
        }
        let now = self.sim_time_us;
        let (_, mut qubit) = self.logical_qubits.remove(id).ok_or_else(|| ResourceError {
            kind: ResourceErrorKind::UnknownQubit,
            message: format!("unknown logical qubit: {id}"),
        })?;
        let outcome = qubit.measure(basis, now, &mut self.rng);
        let cycle = qubit.profile.logical_cycle_time_us;
        self.logical_qubits.insert(id.to_string(), qubit);

        match self.logical_qubits.get_mut(partner_id) {
            Some(mut partner) => partner.collapse_to(outcome),
            None => {
                return Err(ResourceError {
                    kind: ResourceErrorKind::UnknownQubit,
                    message: format!("unknown logical qubit: {partner_id}"),
                })
            }
        }
        self.advance_time(cycle);
        Ok(outcome)
    }

    /// `MEASURE_BELL`: CNOT-H-2xMEASURE_Z on both qubits at once. `a` and `b`
    /// are taken out of the map as owned locals first (as in
    /// `with_two_mut`), which also leaves `self.rng` free to borrow
    /// mutably alongside them without conflicting with the map borrow.
    pub fn measure_bell(&mut self, a: &str, b: &str) -> Result<(u8, u8, u8), ResourceError> {
        if a == b {
            return Err(ResourceError {
                kind: ResourceErrorKind::UnknownQubit,
                message: format!("MEASURE_BELL referenced the same qubit twice: {a}"),
            });
        }
        let now = self.sim_time_us;
        let (_, mut qa) = self.logical_qubits.remove(a).ok_or_else(|| ResourceError {
            kind: ResourceErrorKind::UnknownQubit,
            message: format!("unknown logical qubit among ({a}, {b})"),
        })?;
        let (_, mut qb) = match self.logical_qubits.remove(b) {
            Some(entry) => entry,
            None => {
                self.logical_qubits.insert(a.to_string(), qa);
                return Err(ResourceError {
                    kind: ResourceErrorKind::UnknownQubit,
                    message: format!("unknown logical qubit among ({a}, {b})"),
                });
            }
        };
        let result = TwoQubitGate::measure_bell_basis(&mut qa, &mut qb, now, &mut self.rng);
        let cycle = qa.profile.logical_cycle_time_us.max(qb.profile.logical_cycle_time_us);
        self.logical_qubits.insert(a.to_string(), qa);
        self.logical_qubits.insert(b.to_string(), qb);
        self.advance_time(cycle);
        Ok(result)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.logical_qubits.contains_key(id)
    }

    pub fn open_channel(
        &mut self,
        id: &str,
        qubit_a: &str,
        qubit_b: &str,
        fidelity: f64,
    ) -> Result<(), ResourceError> {
        if !self.logical_qubits.contains_key(qubit_a) || !self.logical_qubits.contains_key(qubit_b)
        {
            return Err(ResourceError {
                kind: ResourceErrorKind::UnknownQubit,
                message: format!("cannot open channel {id}: endpoint qubit not allocated"),
            });
        }
        self.channels.insert(
            id.to_string(),
            EngineChannel {
                id: id.to_string(),
                qubit_a: qubit_a.to_string(),
                qubit_b: qubit_b.to_string(),
                fidelity,
                opened_at_us: self.sim_time_us,
            },
        );
        self.update_peaks();
        Ok(())
    }

    pub fn close_channel(&mut self, id: &str) -> Result<(), ResourceError> {
        self.channels.remove(id).map(|_| ()).ok_or_else(|| ResourceError {
            kind: ResourceErrorKind::UnknownChannel,
            message: format!("unknown engine channel: {id}"),
        })
    }

    pub fn advance_time(&mut self, delta_us: u64) {
        self.sim_time_us += delta_us;
        self.peak.final_sim_time_us = self.sim_time_us;
    }

    pub fn current_time_us(&self) -> u64 {
        self.sim_time_us
    }

    /// Mandatory between graph runs — returns the engine to a pristine state.
    pub fn reset(&mut self) {
        self.logical_qubits.clear();
        self.channels.clear();
        self.physical_qubits_in_use = 0;
        self.sim_time_us = 0;
        self.peak = PeakUsage::default();
    }

    fn update_peaks(&mut self) {
        self.peak.logical_qubits = self.peak.logical_qubits.max(self.logical_qubits.len());
        self.peak.physical_qubits = self.peak.physical_qubits.max(self.physical_qubits_in_use);
        self.peak.channels = self.peak.channels.max(self.channels.len());
    }

    /// Peak telemetry for the run so far. Callers capture this before the
    /// UNLOAD free-sweep so it reflects the run, not its aftermath.
    pub fn peak_usage(&self) -> PeakUsage {
        self.peak
    }

    pub fn allocated_qubit_ids(&self) -> Vec<String> {
        self.logical_qubits.iter().map(|entry| entry.key().clone()).collect()
    }
}
