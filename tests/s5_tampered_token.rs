use std::collections::BTreeSet;

use qmk_core::capability_system::{Capability, CapabilitySystem};

/// S5 — issue a token with {ALLOC, MEASURE}, tamper a bound field (tenant),
/// and confirm verify/check both reject it and the violation counter moves.
#[test]
fn tampering_a_bound_field_invalidates_the_token() {
    let system = CapabilitySystem::new();
    let caps: BTreeSet<Capability> = [Capability::Alloc, Capability::Measure].into_iter().collect();
    let mut token = system.issue("tenant-a", caps, None, None, None);

    assert!(system.verify(&token));
    assert!(system.check(&token, Capability::Measure, false));

    token.tenant = "tenant-b".to_string();

    assert!(!system.verify(&token));
    assert!(!system.check(&token, Capability::Alloc, false));
    assert!(!system.check(&token, Capability::Measure, false));

    let stats = system.statistics();
    assert!(stats.invalid_signature >= 2);
}
