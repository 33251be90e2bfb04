//! # QEC Profile Registry
//!
//! Pure data: named logical-code parameters. The core carries declared costs
//! from these profiles but performs no physical-level simulation — decoder
//! mathematics and surface-code error modeling are out of scope (spec
//! non-goal); the registry's job is to map a profile string to an immutable
//! record the rest of the kernel can trust.

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphErrorKind};

/// A closed set of supported logical code families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CodeFamily {
    Surface,
    Qldpc,
    Shyps,
    BaconShor,
}

impl CodeFamily {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "surface" | "surface_code" => Some(Self::Surface),
            "qldpc" => Some(Self::Qldpc),
            "shyps" => Some(Self::Shyps),
            "bacon_shor" | "bacon-shor" => Some(Self::BaconShor),
            _ => None,
        }
    }

    fn decoder_class(self) -> &'static str {
        match self {
            Self::Surface => "minimum_weight_perfect_matching",
            Self::Qldpc => "belief_propagation",
            Self::Shyps => "union_find",
            Self::BaconShor => "lookup_table",
        }
    }
}

/// Immutable logical-code parameters. The core treats these as opaque
/// constants: no numeric derivation is performed beyond carrying declared
/// costs, per spec.md §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QecProfile {
    pub family: CodeFamily,
    pub distance: u32,
    pub physical_qubits_per_logical: u64,
    pub logical_cycle_time_us: u64,
    pub logical_error_rate: f64,
    pub decoder_class: &'static str,
}

impl QecProfile {
    /// Construct a profile for a `(family, distance)` pair. `gate_error` lets
    /// a caller override the base physical gate error used to derive the
    /// logical error rate; `None` uses the family's reference value.
    pub fn new(family: CodeFamily, distance: u32, gate_error: Option<f64>) -> Self {
        let gate_error = gate_error.unwrap_or(1e-3);
        let (qubits_per_logical, cycle_time_us, error_exponent_base) = match family {
            CodeFamily::Surface => (2 * distance.pow(2) as u64, distance as u64 * 1, 0.1),
            CodeFamily::Qldpc => (distance as u64 * 6, distance as u64 * 2, 0.08),
            CodeFamily::Shyps => (distance as u64 * 4, distance as u64, 0.12),
            CodeFamily::BaconShor => (distance.pow(2) as u64, distance as u64 * 3, 0.15),
        };
        let logical_error_rate =
            error_exponent_base * gate_error.powi(((distance + 1) / 2).max(1) as i32);

        Self {
            family,
            distance,
            physical_qubits_per_logical: qubits_per_logical.max(1),
            logical_cycle_time_us: cycle_time_us.max(1),
            logical_error_rate,
            decoder_class: family.decoder_class(),
        }
    }
}

/// Parses the canonical profile string `"logical:<family>(d=<n>)"`.
///
/// Unknown families or malformed strings are a `GraphError`, never a panic:
/// profile strings originate in untrusted operation-graph `args` fields.
pub fn parse_profile_string(s: &str) -> Result<QecProfile, GraphError> {
    let malformed = || GraphError {
        kind: GraphErrorKind::Malformed,
        message: format!("malformed QEC profile string: {s:?}"),
    };

    let rest = s.strip_prefix("logical:").ok_or_else(malformed)?;
    let open = rest.find('(').ok_or_else(malformed)?;
    let close = rest.find(')').filter(|&c| c > open).ok_or_else(malformed)?;
    let family_token = &rest[..open];
    let params = &rest[open + 1..close];

    let family = CodeFamily::parse(family_token).ok_or_else(|| GraphError {
        kind: GraphErrorKind::UnknownProfile,
        message: format!("unknown QEC code family: {family_token:?}"),
    })?;

    let distance: u32 = params
        .split(',')
        .find_map(|kv| kv.trim().strip_prefix("d="))
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(malformed)?;

    Ok(QecProfile::new(family, distance, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_surface_profile() {
        let p = parse_profile_string("logical:surface_code(d=9)").unwrap();
        assert_eq!(p.family, CodeFamily::Surface);
        assert_eq!(p.distance, 9);
        assert!(p.physical_qubits_per_logical > 0);
    }

    #[test]
    fn parses_all_known_families() {
        for (s, family) in [
            ("logical:surface(d=5)", CodeFamily::Surface),
            ("logical:qldpc(d=3)", CodeFamily::Qldpc),
            ("logical:shyps(d=7)", CodeFamily::Shyps),
            ("logical:bacon_shor(d=3)", CodeFamily::BaconShor),
        ] {
            let p = parse_profile_string(s).unwrap();
            assert_eq!(p.family, family);
        }
    }

    #[test]
    fn rejects_unknown_family() {
        let err = parse_profile_string("logical:made_up(d=9)").unwrap_err();
        assert_eq!(err.kind, GraphErrorKind::UnknownProfile);
    }

    #[test]
    fn rejects_malformed_string() {
        assert!(parse_profile_string("surface(d=9)").is_err());
        assert!(parse_profile_string("logical:surface").is_err());
        assert!(parse_profile_string("logical:surface(x=9)").is_err());
    }
}
