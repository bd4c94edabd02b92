//! Orchestrator configuration.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    Address, CommitmentLevel, EscrowFlowError, Result, SubmitOptions, constants,
    program::DEFAULT_SETTLEMENT_PROGRAM_ID,
};

/// Configuration for one orchestrator instance.
///
/// Every field has a default, so a config file only needs the values it
/// overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Identity of the settlement program the escrow record lives under.
    pub settlement_program: Address,
    /// Commitment a step must reach before the next step is submitted.
    pub commitment: CommitmentLevel,
    /// Commitment used for preflight simulation.
    pub preflight_commitment: CommitmentLevel,
    /// Submit without simulation.
    pub skip_preflight: bool,
    /// Bounded wait for one confirmation, in milliseconds.
    pub confirm_timeout_ms: u64,
    /// Decimals of newly created asset classes.
    pub asset_decimals: u8,
    /// Raw units minted to each party when assets are provisioned.
    pub initial_supply: u64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            settlement_program: DEFAULT_SETTLEMENT_PROGRAM_ID,
            commitment: CommitmentLevel::Confirmed,
            preflight_commitment: CommitmentLevel::Confirmed,
            skip_preflight: false,
            confirm_timeout_ms: constants::DEFAULT_CONFIRM_TIMEOUT_MS,
            asset_decimals: constants::DEFAULT_ASSET_DECIMALS,
            initial_supply: constants::DEFAULT_INITIAL_SUPPLY,
        }
    }
}

impl FlowConfig {
    /// Parse and validate a JSON config.
    ///
    /// # Errors
    /// [`EscrowFlowError::Serialization`] on malformed JSON,
    /// [`EscrowFlowError::Configuration`] on out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and validate a JSON config file.
    ///
    /// # Errors
    /// As [`FlowConfig::from_json_str`], plus [`EscrowFlowError::Io`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// # Errors
    /// Returns [`EscrowFlowError::Configuration`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        if self.confirm_timeout_ms == 0 {
            return Err(EscrowFlowError::Configuration(
                "confirm_timeout_ms must be > 0".into(),
            ));
        }
        if self.asset_decimals > constants::MAX_ASSET_DECIMALS {
            return Err(EscrowFlowError::Configuration(format!(
                "asset_decimals {} exceeds {}",
                self.asset_decimals,
                constants::MAX_ASSET_DECIMALS
            )));
        }
        if self.initial_supply == 0 {
            return Err(EscrowFlowError::Configuration(
                "initial_supply must be > 0".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    #[must_use]
    pub fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            skip_preflight: self.skip_preflight,
            preflight_commitment: self.preflight_commitment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = FlowConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.asset_decimals, 6);
        assert_eq!(cfg.initial_supply, 100_000);
        assert_eq!(cfg.commitment, CommitmentLevel::Confirmed);
        assert!(!cfg.submit_options().skip_preflight);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r#"{"confirm_timeout_ms": 500, "skip_preflight": true}"#;
        let cfg = FlowConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.confirm_timeout(), Duration::from_millis(500));
        assert!(cfg.skip_preflight);
        assert_eq!(cfg.settlement_program, DEFAULT_SETTLEMENT_PROGRAM_ID);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = FlowConfig::from_json_str(r#"{"confirm_timeout_ms": 0}"#).unwrap_err();
        assert!(matches!(err, EscrowFlowError::Configuration(_)));
    }

    #[test]
    fn excessive_decimals_rejected() {
        let cfg = FlowConfig {
            asset_decimals: 12,
            ..FlowConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn malformed_json_is_serialization_error() {
        let err = FlowConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, EscrowFlowError::Serialization(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = FlowConfig::from_json_file("/nonexistent/escrowflow.json").unwrap_err();
        assert!(matches!(err, EscrowFlowError::Io(_)));
    }

    #[test]
    fn serde_roundtrip() {
        let cfg = FlowConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: FlowConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg, back);
    }
}
