//! # Configuration (§6.5)
//!
//! The executor's closed configuration surface, plus environment-based
//! loading. Follows the teacher's `SecurityConfig` factory-method
//! convention (`production_ready()`/`maximum_security()` in
//! `security_foundation.rs`) rather than a builder: `QmkConfig` exposes
//! named presets instead of free-form construction, keeping the set of
//! supported configurations closed and auditable.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::executor::ExecutorConfig;
use crate::static_verifier::VerifierConfig;

/// §6.5's closed configuration set, plus the loading concerns (env file,
/// environment variable overrides) that are ambient infrastructure rather
/// than part of the spec's closed set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QmkConfig {
    pub max_physical_qubits: u64,
    pub seed: Option<u64>,
    pub require_certification: bool,
    pub strict_verification: bool,
    /// Warning threshold the static verifier's resource-bounds pass uses.
    pub qubit_count_warning_threshold: usize,
    pub node_count_warning_threshold: usize,
}

impl QmkConfig {
    /// Default production posture: certification required, warnings not
    /// promoted to errors, no fixed seed (nondeterministic runs).
    pub fn production_ready() -> Self {
        Self {
            max_physical_qubits: 100_000,
            seed: None,
            require_certification: true,
            strict_verification: false,
            qubit_count_warning_threshold: 256,
            node_count_warning_threshold: 10_000,
        }
    }

    /// Diagnostic posture: certification is bypassed (spec.md §6.5 permits
    /// this only for diagnostics) and warnings are promoted to errors so
    /// nothing is silently tolerated during investigation.
    pub fn diagnostic() -> Self {
        Self {
            require_certification: false,
            strict_verification: true,
            ..Self::production_ready()
        }
    }

    /// Loads `.env` (if present) then environment variables prefixed
    /// `QMK_` over the production-ready defaults, the same two-crate
    /// layering (`dotenvy` + `config`) the teacher's dependency list
    /// implies without the teacher ever wiring a loader of its own.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::production_ready();

        let built = Config::builder()
            .set_default("max_physical_qubits", defaults.max_physical_qubits)?
            .set_default("seed", None::<i64>)?
            .set_default("require_certification", defaults.require_certification)?
            .set_default("strict_verification", defaults.strict_verification)?
            .set_default(
                "qubit_count_warning_threshold",
                defaults.qubit_count_warning_threshold as i64,
            )?
            .set_default(
                "node_count_warning_threshold",
                defaults.node_count_warning_threshold as i64,
            )?
            .add_source(File::with_name("qmk").required(false))
            .add_source(Environment::with_prefix("QMK"))
            .build()?;

        built.try_deserialize()
    }

    pub fn to_executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_physical_qubits: self.max_physical_qubits,
            seed: self.seed,
            require_certification: self.require_certification,
            strict_verification: self.strict_verification,
        }
    }

    pub fn to_verifier_config(&self) -> VerifierConfig {
        VerifierConfig {
            strict_verification: self.strict_verification,
            qubit_count_warning_threshold: self.qubit_count_warning_threshold,
            node_count_warning_threshold: self.node_count_warning_threshold,
        }
    }
}

impl Default for QmkConfig {
    fn default() -> Self {
        Self::production_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_disables_certification_but_strict_verifies() {
        let cfg = QmkConfig::diagnostic();
        assert!(!cfg.require_certification);
        assert!(cfg.strict_verification);
    }

    #[test]
    fn production_ready_requires_certification() {
        let cfg = QmkConfig::production_ready();
        assert!(cfg.require_certification);
        assert!(!cfg.strict_verification);
    }

    #[test]
    fn to_executor_config_carries_every_field() {
        let cfg = QmkConfig { seed: Some(42), ..QmkConfig::production_ready() };
        let exec_cfg = cfg.to_executor_config();
        assert_eq!(exec_cfg.seed, Some(42));
        assert_eq!(exec_cfg.max_physical_qubits, cfg.max_physical_qubits);
    }

    #[test]
    fn to_verifier_config_carries_warning_thresholds() {
        let cfg = QmkConfig { qubit_count_warning_threshold: 8, ..QmkConfig::production_ready() };
        let verifier_cfg = cfg.to_verifier_config();
        assert_eq!(verifier_cfg.qubit_count_warning_threshold, 8);
        assert_eq!(verifier_cfg.strict_verification, cfg.strict_verification);
    }
}
