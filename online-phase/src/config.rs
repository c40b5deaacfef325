//! Tunable parameters of an evaluation

use serde::{Deserialize, Serialize};

use crate::error::SpdzError;

/// The default maximum number of gates evaluated in one batch
pub const DEFAULT_MAX_BATCH_SIZE: usize = 4096;
/// The default number of gates evaluated between two MAC checks
pub const DEFAULT_MAC_CHECK_THRESHOLD: usize = 100_000;
/// The default number of MAC check gates evaluated in one round
pub const DEFAULT_MAC_CHECK_BATCH_SIZE: usize = 128;
/// The default number of opened values folded by one accumulation gate
pub const DEFAULT_ACCUMULATE_CHUNK_SIZE: usize = 1024;

/// The configuration of the batch loop and the MAC check schedule
///
/// All parties of a computation must use the same configuration, the check
/// schedule is derived from it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// The maximum number of circuit gates in a batch
    pub max_batch_size: usize,
    /// The number of gates after which a MAC check is forced
    pub mac_check_threshold: usize,
    /// The maximum number of MAC check gates evaluated in one round
    pub mac_check_batch_size: usize,
    /// The maximum number of opened values folded by one accumulation gate
    pub accumulate_chunk_size: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            mac_check_threshold: DEFAULT_MAC_CHECK_THRESHOLD,
            mac_check_batch_size: DEFAULT_MAC_CHECK_BATCH_SIZE,
            accumulate_chunk_size: DEFAULT_ACCUMULATE_CHUNK_SIZE,
        }
    }
}

impl EvaluationConfig {
    /// Check that the configuration describes a usable schedule
    ///
    /// A batch may not be larger than the check threshold, otherwise the
    /// number of unverified gates is not bounded by twice the threshold
    pub fn validate(&self) -> Result<(), SpdzError> {
        let sizes = [
            ("max_batch_size", self.max_batch_size),
            ("mac_check_threshold", self.mac_check_threshold),
            ("mac_check_batch_size", self.mac_check_batch_size),
            ("accumulate_chunk_size", self.accumulate_chunk_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, size)| *size == 0) {
            return Err(SpdzError::Setup(format!("{name} must be positive")));
        }

        if self.max_batch_size > self.mac_check_threshold {
            return Err(SpdzError::Setup(format!(
                "max_batch_size ({}) exceeds mac_check_threshold ({})",
                self.max_batch_size, self.mac_check_threshold
            )));
        }

        Ok(())
    }

    /// Parse and validate a configuration from a JSON document, missing
    /// fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, SpdzError> {
        let config: Self = serde_json::from_str(json).map_err(|e| SpdzError::Setup(e.to_string()))?;
        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Tests that the defaults are valid
    #[test]
    fn test_default_is_valid() {
        let config = EvaluationConfig::default();
        config.validate().unwrap();
        assert_eq!(config.mac_check_threshold, 100_000);
        assert_eq!(config.mac_check_batch_size, 128);
    }

    /// Tests parsing a partial JSON document
    #[test]
    fn test_from_json() {
        let config = EvaluationConfig::from_json(r#"{ "max_batch_size": 16 }"#).unwrap();
        assert_eq!(config.max_batch_size, 16);
        assert_eq!(config.accumulate_chunk_size, DEFAULT_ACCUMULATE_CHUNK_SIZE);

        assert!(EvaluationConfig::from_json("not json").is_err());
        assert!(EvaluationConfig::from_json(r#"{ "mac_check_batch_size": 0 }"#).is_err());
    }

    /// Tests that a batch larger than the threshold is rejected
    #[test]
    fn test_batch_exceeds_threshold() {
        let config =
            EvaluationConfig { max_batch_size: 10, mac_check_threshold: 5, ..Default::default() };
        assert!(matches!(config.validate(), Err(SpdzError::Setup(_))));
    }
}
