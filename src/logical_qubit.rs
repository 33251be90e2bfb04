//! # Logical Qubit State Machine
//!
//! Reference semantics for a single logical qubit, not a physical-fidelity
//! simulator (that is explicitly out of scope — see spec's non-goals). The
//! state machine tracks one of six Pauli-eigenstate tags plus `Unknown`, and
//! resolves to classical measurement outcomes through a seeded pseudorandom
//! source so runs are reproducible given the same seed.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::qec_profiles::QecProfile;

/// Symbolic basis-state label. `Unknown` means "no eigenstate of any tracked
/// basis" — measurement against it is genuinely random.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateTag {
    Zero,
    One,
    Plus,
    Minus,
    PlusI,
    MinusI,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauliAxis {
    X,
    Y,
    Z,
}

/// Single-qubit action table (§4.2). Each Pauli fixes its own eigenbasis and
/// swaps the other two bases' tags pairwise; `H` and `S` map between bases;
/// `T` is non-Clifford and conservatively collapses any input to `Unknown`.
fn apply_pauli(tag: StateTag, axis: PauliAxis) -> StateTag {
    use StateTag::*;
    match (axis, tag) {
        (_, Unknown) => Unknown,
        (PauliAxis::Z, Zero) => Zero,
        (PauliAxis::Z, One) => One,
        (PauliAxis::Z, Plus) => Minus,
        (PauliAxis::Z, Minus) => Plus,
        (PauliAxis::Z, PlusI) => MinusI,
        (PauliAxis::Z, MinusI) => PlusI,
        (PauliAxis::X, Zero) => One,
        (PauliAxis::X, One) => Zero,
        (PauliAxis::X, Plus) => Plus,
        (PauliAxis::X, Minus) => Minus,
        (PauliAxis::X, PlusI) => MinusI,
        (PauliAxis::X, MinusI) => PlusI,
        (PauliAxis::Y, Zero) => One,
        (PauliAxis::Y, One) => Zero,
        (PauliAxis::Y, Plus) => Minus,
        (PauliAxis::Y, Minus) => Plus,
        (PauliAxis::Y, PlusI) => PlusI,
        (PauliAxis::Y, MinusI) => MinusI,
    }
}

fn apply_h(tag: StateTag) -> StateTag {
    use StateTag::*;
    match tag {
        Zero => Plus,
        One => Minus,
        Plus => Zero,
        Minus => One,
        PlusI | MinusI | Unknown => Unknown,
    }
}

fn apply_s(tag: StateTag) -> StateTag {
    use StateTag::*;
    match tag {
        Zero => Zero,
        One => One,
        Plus => PlusI,
        Minus => MinusI,
        PlusI => PlusI,
        MinusI => MinusI,
        Unknown => Unknown,
    }
}

/// S-dagger, used internally by Y-basis measurement. Not directly reachable
/// through `APPLY_<G>` (the op table only exposes `S`, its adjoint is an
/// implementation detail of `MEASURE_Y`).
fn apply_sdg(tag: StateTag) -> StateTag {
    use StateTag::*;
    match tag {
        Zero => Zero,
        One => One,
        Plus => MinusI,
        Minus => PlusI,
        PlusI => Plus,
        MinusI => Minus,
        Unknown => Unknown,
    }
}

/// `T` is non-Clifford; the six-tag abstraction cannot track its action
/// precisely, so it conservatively collapses to `Unknown` from any input.
fn apply_t(_tag: StateTag) -> StateTag {
    StateTag::Unknown
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasurementBasis {
    Z,
    X,
    Y,
}

/// A logical qubit owned by the resource engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalQubit {
    pub id: String,
    pub tenant: String,
    pub profile: QecProfile,
    pub state_tag: StateTag,
    pub entanglement_partner: Option<String>,
    pub last_touched_time_us: u64,
}

impl LogicalQubit {
    pub fn new(id: impl Into<String>, tenant: impl Into<String>, profile: QecProfile) -> Self {
        Self {
            id: id.into(),
            tenant: tenant.into(),
            profile,
            state_tag: StateTag::Zero,
            entanglement_partner: None,
            last_touched_time_us: 0,
        }
    }

    /// Apply a single-qubit gate named by its `APPLY_<G>` suffix (`H`, `X`,
    /// `Y`, `Z`, `S`, `T`).
    pub fn apply_gate(&mut self, gate: &str, now_us: u64) {
        self.state_tag = match gate {
            "X" => apply_pauli(self.state_tag, PauliAxis::X),
            "Y" => apply_pauli(self.state_tag, PauliAxis::Y),
            "Z" => apply_pauli(self.state_tag, PauliAxis::Z),
            "H" => apply_h(self.state_tag),
            "S" => apply_s(self.state_tag),
            "T" => apply_t(self.state_tag),
            other => panic!("apply_gate called with unknown single-qubit gate {other:?}"),
        };
        self.last_touched_time_us = now_us;
    }

    /// Measure in the given basis. Returns the classical outcome bit and
    /// clears this qubit's side of any entanglement pairing (collapse of the
    /// partner is the caller's responsibility — it requires access to both
    /// qubits and is performed by the resource engine / executor).
    pub fn measure(&mut self, basis: MeasurementBasis, now_us: u64, rng: &mut impl Rng) -> u8 {
        match basis {
            MeasurementBasis::X => self.state_tag = apply_h(self.state_tag),
            MeasurementBasis::Y => {
                self.state_tag = apply_sdg(self.state_tag);
                self.state_tag = apply_h(self.state_tag);
            }
            MeasurementBasis::Z => {}
        }

        let outcome = measure_z_outcome(self.state_tag, rng);
        self.state_tag = if outcome == 0 { StateTag::Zero } else { StateTag::One };
        self.entanglement_partner = None;
        self.last_touched_time_us = now_us;
        outcome
    }

    /// Collapse this qubit's tag to a known classical outcome without
    /// performing a measurement step of its own — used to propagate a
    /// partner's measurement outcome onto this qubit ("collapse propagation").
    pub fn collapse_to(&mut self, outcome: u8) {
        self.state_tag = if outcome == 0 { StateTag::Zero } else { StateTag::One };
        self.entanglement_partner = None;
    }

    pub fn reset(&mut self, now_us: u64) {
        self.state_tag = StateTag::Zero;
        self.entanglement_partner = None;
        self.last_touched_time_us = now_us;
    }
}

fn measure_z_outcome(tag: StateTag, rng: &mut impl Rng) -> u8 {
    match tag {
        StateTag::Zero => 0,
        StateTag::One => 1,
        _ => rng.gen_range(0..2),
    }
}

/// Two-qubit gate transitions, kept separate from `LogicalQubit` since they
/// mutate both endpoints atomically.
pub struct TwoQubitGate;

impl TwoQubitGate {
    fn entangle_conservatively(a: &mut LogicalQubit, b: &mut LogicalQubit, now_us: u64) {
        a.entanglement_partner = Some(b.id.clone());
        b.entanglement_partner = Some(a.id.clone());
        a.state_tag = StateTag::Unknown;
        b.state_tag = StateTag::Unknown;
        a.last_touched_time_us = now_us;
        b.last_touched_time_us = now_us;
    }

    pub fn apply_cnot(control: &mut LogicalQubit, target: &mut LogicalQubit, now_us: u64) {
        Self::entangle_conservatively(control, target, now_us);
    }

    pub fn apply_cz(a: &mut LogicalQubit, b: &mut LogicalQubit, now_us: u64) {
        Self::entangle_conservatively(a, b, now_us);
    }

    /// SWAP preserves linear-type handles but atomically exchanges state
    /// tags and entanglement partners between the two qubits (§4.2) — it
    /// does not entangle them.
    pub fn apply_swap(a: &mut LogicalQubit, b: &mut LogicalQubit, now_us: u64) {
        std::mem::swap(&mut a.state_tag, &mut b.state_tag);
        std::mem::swap(&mut a.entanglement_partner, &mut b.entanglement_partner);
        a.last_touched_time_us = now_us;
        b.last_touched_time_us = now_us;
    }

    /// `MEASURE_BELL`: CNOT-H-2xMEASURE_Z (§4.2), yielding two event bits or
    /// a single two-bit Bell index depending on how the caller wires events.
    pub fn measure_bell_basis(
        q1: &mut LogicalQubit,
        q2: &mut LogicalQubit,
        now_us: u64,
        rng: &mut impl Rng,
    ) -> (u8, u8, u8) {
        Self::entangle_conservatively(q1, q2, now_us);
        q1.state_tag = apply_h(q1.state_tag);
        let o1 = measure_z_outcome(q1.state_tag, rng);
        let o2 = measure_z_outcome(q2.state_tag, rng);
        q1.collapse_to(o1);
        q2.collapse_to(o2);
        q1.last_touched_time_us = now_us;
        q2.last_touched_time_us = now_us;
        (o1, o2, (o1 << 1) | o2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qec_profiles::{CodeFamily, QecProfile};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn profile() -> QecProfile {
        QecProfile::new(CodeFamily::Surface, 7, None)
    }

    #[test]
    fn deterministic_measurement_from_basis_state() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut q = LogicalQubit::new("q0", "a", profile());
        assert_eq!(q.measure(MeasurementBasis::Z, 0, &mut rng), 0);

        let mut q = LogicalQubit::new("q1", "a", profile());
        q.apply_gate("X", 0);
        assert_eq!(q.measure(MeasurementBasis::Z, 0, &mut rng), 1);
    }

    #[test]
    fn hadamard_then_measure_z_is_x_measurement() {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let mut q = LogicalQubit::new("q0", "a", profile());
        q.apply_gate("H", 0);
        assert_eq!(q.state_tag, StateTag::Plus);
        let _ = q.measure(MeasurementBasis::X, 0, &mut rng);
        // measuring |+> in the X basis is deterministic: outcome 0
        let mut q2 = LogicalQubit::new("q0", "a", profile());
        q2.apply_gate("H", 0);
        assert_eq!(q2.measure(MeasurementBasis::X, 0, &mut rng), 0);
    }

    #[test]
    fn t_gate_always_collapses_to_unknown() {
        let mut q = LogicalQubit::new("q0", "a", profile());
        q.apply_gate("T", 0);
        assert_eq!(q.state_tag, StateTag::Unknown);
        q.apply_gate("H", 1);
        q.apply_gate("T", 2);
        assert_eq!(q.state_tag, StateTag::Unknown);
    }

    #[test]
    fn swap_exchanges_tags_without_entangling() {
        let mut a = LogicalQubit::new("a", "t", profile());
        let mut b = LogicalQubit::new("b", "t", profile());
        a.apply_gate("X", 0); // a is |1>
        TwoQubitGate::apply_swap(&mut a, &mut b, 0);
        assert_eq!(a.state_tag, StateTag::Zero);
        assert_eq!(b.state_tag, StateTag::One);
        assert!(a.entanglement_partner.is_none());
        assert!(b.entanglement_partner.is_none());
    }

    #[test]
    fn cnot_entangles_both_endpoints() {
        let mut a = LogicalQubit::new("a", "t", profile());
        let mut b = LogicalQubit::new("b", "t", profile());
        TwoQubitGate::apply_cnot(&mut a, &mut b, 0);
        assert_eq!(a.entanglement_partner.as_deref(), Some("b"));
        assert_eq!(b.entanglement_partner.as_deref(), Some("a"));
    }

    #[test]
    fn bell_pair_measurement_correlates() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut a = LogicalQubit::new("a", "t", profile());
        let mut b = LogicalQubit::new("b", "t", profile());
        a.apply_gate("H", 0);
        TwoQubitGate::apply_cnot(&mut a, &mut b, 0);
        // simulate measuring a in Z, then propagate to b as the executor would
        let outcome = a.measure(MeasurementBasis::Z, 0, &mut rng);
        b.collapse_to(outcome);
        assert_eq!(b.measure(MeasurementBasis::Z, 0, &mut rng), outcome);
    }
}
