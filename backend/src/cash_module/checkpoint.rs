//! Checkpoint - Save/Load Cash Module State
//!
//! Serializes every safe's configuration, together with the delays and
//! settlement dispatcher currently in force, so a module can be restored
//! elsewhere.
//!
//! # Critical Invariants
//!
//! - **Config Matching**: state can only be loaded with the config it was
//!   saved under
//! - **Withdrawal Integrity**: restored withdrawal requests have matching
//!   token/amount lengths and no duplicate tokens
//! - **Event log is not state**: a restored module starts with an empty log

use crate::cash_module::engine::{CashModule, CashModuleConfig, Delays};
use crate::cash_module::error::CashError;
use crate::core::types::{find_duplicate, Address};
use crate::models::event::EventLog;
use crate::models::state::CashState;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete cash module state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Delays in force when the snapshot was taken
    pub delays: Delays,

    pub settlement_dispatcher: Address,

    /// Every registered safe's configuration
    pub state: CashState,

    /// SHA256 hash of the construction config
    pub config_hash: String,
}

// ============================================================================
// Config Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of config
///
/// Object keys are sorted before hashing so the hash does not depend on
/// field or map ordering.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, CashError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config)
        .map_err(|e| CashError::Serialization(format!("Config serialization failed: {}", e)))?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value))
        .map_err(|e| CashError::Serialization(format!("Config serialization failed: {}", e)))?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation
// ============================================================================

/// Check restored withdrawal requests for structural integrity
pub fn validate_snapshot(snapshot: &StateSnapshot) -> Result<(), CashError> {
    if snapshot.settlement_dispatcher.is_zero() {
        return Err(CashError::StateValidation(
            "settlement dispatcher is the zero address".to_string(),
        ));
    }

    for (safe, config) in snapshot.state.iter() {
        let Some(request) = config.pending_withdrawal() else {
            continue;
        };
        if request.tokens().len() != request.amounts().len() {
            return Err(CashError::StateValidation(format!(
                "Withdrawal {} of safe {} has {} tokens but {} amounts",
                request.id(),
                safe,
                request.tokens().len(),
                request.amounts().len()
            )));
        }
        if let Some(token) = find_duplicate(request.tokens()) {
            return Err(CashError::StateValidation(format!(
                "Withdrawal {} of safe {} lists {} twice",
                request.id(),
                safe,
                token
            )));
        }
    }

    Ok(())
}

// ============================================================================
// Save / Load
// ============================================================================

impl CashModule {
    pub fn snapshot(&self) -> Result<StateSnapshot, CashError> {
        Ok(StateSnapshot {
            delays: self.delays,
            settlement_dispatcher: self.settlement_dispatcher.clone(),
            state: self.state.clone(),
            config_hash: compute_config_hash(self.config())?,
        })
    }

    /// Serialize module state to JSON
    pub fn save_state(&self) -> Result<String, CashError> {
        serde_json::to_string(&self.snapshot()?)
            .map_err(|e| CashError::Serialization(format!("State serialization failed: {}", e)))
    }

    /// Restore a module saved with [`CashModule::save_state`]
    ///
    /// # Errors
    /// - `Serialization` if the JSON is malformed
    /// - `ConfigMismatch` if `config` differs from the one the state was saved under
    /// - `StateValidation` if a restored withdrawal is malformed
    pub fn load_state(config: CashModuleConfig, json: &str) -> Result<Self, CashError> {
        let snapshot: StateSnapshot = serde_json::from_str(json)
            .map_err(|e| CashError::Serialization(format!("State parse failed: {}", e)))?;

        let expected = compute_config_hash(&config)?;
        if snapshot.config_hash != expected {
            return Err(CashError::ConfigMismatch {
                expected,
                actual: snapshot.config_hash,
            });
        }
        validate_snapshot(&snapshot)?;

        let mut module = CashModule::new(config)?;
        module.delays = snapshot.delays;
        module.settlement_dispatcher = snapshot.settlement_dispatcher;
        module.state = snapshot.state;
        module.events = EventLog::new();
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CashModuleConfig {
        CashModuleConfig {
            controller: Address::new("0xcontroller"),
            settlement_dispatcher: Address::new("0xdispatcher"),
            withdrawal_delay: 60,
            spend_limit_delay: 60,
            mode_delay: 60,
        }
    }

    #[test]
    fn test_compute_config_hash_deterministic() {
        let hash1 = compute_config_hash(&config()).unwrap();
        let hash2 = compute_config_hash(&config()).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_compute_config_hash_differs_on_change() {
        let mut other = config();
        other.mode_delay = 61;
        assert_ne!(
            compute_config_hash(&config()).unwrap(),
            compute_config_hash(&other).unwrap()
        );
    }

    #[test]
    fn test_save_load_preserves_safes_and_admin_state() {
        let mut module = CashModule::new(config()).unwrap();
        let safe = Address::new("0xsafe");
        module.setup_safe(&safe, 100, 1_000, 3_600, 0).unwrap();
        module
            .set_delays(&Address::new("0xcontroller"), 5, 6, 7, 0)
            .unwrap();

        let json = module.save_state().unwrap();
        let restored = CashModule::load_state(config(), &json).unwrap();

        assert_eq!(restored.get_data(&safe), module.get_data(&safe));
        assert_eq!(restored.delays(), module.delays());
        assert!(restored.events().is_empty());
    }

    #[test]
    fn test_load_with_other_config_rejected() {
        let module = CashModule::new(config()).unwrap();
        let json = module.save_state().unwrap();

        let mut other = config();
        other.withdrawal_delay = 0;
        let err = CashModule::load_state(other, &json).unwrap_err();
        assert!(matches!(err, CashError::ConfigMismatch { .. }));
    }

    #[test]
    fn test_load_garbage_rejected() {
        let err = CashModule::load_state(config(), "not json").unwrap_err();
        assert!(matches!(err, CashError::Serialization(_)));
    }
}
