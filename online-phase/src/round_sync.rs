//! The round synchronization controller: decides when the opened values
//! recorded so far must be verified
//!
//! The evaluator calls the controller before every batch, after every batch
//! and once at the end of the evaluation. All parties evaluate the same gate
//! stream under the same configuration, so all of them check at the same
//! positions; a party that checks elsewhere is detected as desynchronized
//! when the check's messages reach a peer that is still evaluating circuit
//! gates

use async_trait::async_trait;
use tracing::log;

use crate::{
    config::EvaluationConfig, error::SpdzError, evaluator::Gate, ledger::OpenedValueLedger,
    mac_check::MacCheckProtocol, network::MpcNetwork, resource_pool::SpdzResourcePool,
};

/// Whether a MAC check must run now
///
/// A check is required when one has been requested, or when more than
/// `threshold` gates have been evaluated since the last one
pub fn mac_check_required(gates_since_check: usize, threshold: usize, pending: bool) -> bool {
    pending || gates_since_check > threshold
}

/// The hooks an evaluator calls around its batches
///
/// Any error returned from a hook is fatal, the evaluator must stop
/// immediately and surface it
#[async_trait]
pub trait RoundSynchronization: Send {
    /// Called with the next batch before it is evaluated
    async fn before_batch<G: Gate>(
        &mut self,
        batch: &[G],
        pool: &mut SpdzResourcePool,
        ledger: &mut OpenedValueLedger,
        network: &mut dyn MpcNetwork,
    ) -> Result<(), SpdzError>;

    /// Called with the number of gates of a batch once it has been evaluated
    async fn after_batch(
        &mut self,
        gates_evaluated: usize,
        pool: &mut SpdzResourcePool,
        ledger: &mut OpenedValueLedger,
        network: &mut dyn MpcNetwork,
    ) -> Result<(), SpdzError>;

    /// Called once after the last batch
    async fn after_evaluation(
        &mut self,
        pool: &mut SpdzResourcePool,
        ledger: &mut OpenedValueLedger,
        network: &mut dyn MpcNetwork,
    ) -> Result<(), SpdzError>;

    /// The number of MAC checks that verified at least one value
    fn mac_checks_performed(&self) -> u64;
}

/// The controller of the SPDZ online phase
///
/// Checks before a batch containing an output gate, after any batch once the
/// threshold is exceeded, and at the end of the evaluation. A batch with an
/// output gate is additionally checked after it runs, so the output's own
/// opening is verified before the batch completes
#[derive(Debug)]
pub struct SpdzRoundSynchronization {
    /// The check schedule
    config: EvaluationConfig,
    /// The number of gates evaluated since the last check
    gates_since_check: usize,
    /// Whether a check has been requested for the next opportunity
    check_pending: bool,
    /// The number of checks run so far, numbering the next check
    checks_performed: u64,
}

impl SpdzRoundSynchronization {
    /// Constructor
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config, gates_since_check: 0, check_pending: false, checks_performed: 0 }
    }

    /// The number of gates evaluated since the last check
    pub fn gates_since_check(&self) -> usize {
        self.gates_since_check
    }

    /// Whether a check has been requested for the next opportunity
    pub fn check_pending(&self) -> bool {
        self.check_pending
    }

    /// Verify every value in the ledger and reset the schedule
    ///
    /// An empty ledger is verified without touching the network
    async fn run_mac_check(
        &mut self,
        reason: &'static str,
        pool: &mut SpdzResourcePool,
        ledger: &mut OpenedValueLedger,
        network: &mut dyn MpcNetwork,
    ) -> Result<(), SpdzError> {
        self.gates_since_check = 0;
        self.check_pending = false;
        if ledger.is_empty() {
            log::trace!("skipping MAC check ({reason}), no opened values");
            return Ok(());
        }

        let check = self.checks_performed;
        self.checks_performed += 1;

        let records = ledger.drain();
        log::debug!("running MAC check #{check} over {} opened values ({reason})", records.len());

        MacCheckProtocol::new(check, records, *pool.modulus(), &self.config)
            .execute(pool, network)
            .await
    }
}

#[async_trait]
impl RoundSynchronization for SpdzRoundSynchronization {
    async fn before_batch<G: Gate>(
        &mut self,
        batch: &[G],
        pool: &mut SpdzResourcePool,
        ledger: &mut OpenedValueLedger,
        network: &mut dyn MpcNetwork,
    ) -> Result<(), SpdzError> {
        let reveals_output = batch.iter().any(|gate| gate.reveals_output());
        if reveals_output {
            self.check_pending = true;
        }

        if self.check_pending {
            self.run_mac_check("output gate upcoming", pool, ledger, network).await?;
        }

        // Re-arm so the output's own opening is verified after the batch
        self.check_pending = reveals_output;
        Ok(())
    }

    async fn after_batch(
        &mut self,
        gates_evaluated: usize,
        pool: &mut SpdzResourcePool,
        ledger: &mut OpenedValueLedger,
        network: &mut dyn MpcNetwork,
    ) -> Result<(), SpdzError> {
        self.gates_since_check += gates_evaluated;
        if mac_check_required(
            self.gates_since_check,
            self.config.mac_check_threshold,
            self.check_pending,
        ) {
            let reason = if self.check_pending { "output gate evaluated" } else { "threshold" };
            self.run_mac_check(reason, pool, ledger, network).await?;
        }

        Ok(())
    }

    async fn after_evaluation(
        &mut self,
        pool: &mut SpdzResourcePool,
        ledger: &mut OpenedValueLedger,
        network: &mut dyn MpcNetwork,
    ) -> Result<(), SpdzError> {
        self.run_mac_check("end of evaluation", pool, ledger, network).await
    }

    fn mac_checks_performed(&self) -> u64 {
        self.checks_performed
    }
}

#[cfg(test)]
mod test {
    use crate::{
        algebra::{AuthenticatedShare, Modulus},
        evaluator::{OpenGate, OutputGate},
        test_helpers::{deal_opened_values, execute_mock_mpc},
    };

    use super::*;

    /// The number of parties in the tests
    const N_PARTIES: usize = 2;

    /// Tests the trigger function in isolation
    #[test]
    fn test_mac_check_required() {
        assert!(!mac_check_required(0, 10, false));
        assert!(!mac_check_required(10, 10, false));
        assert!(mac_check_required(11, 10, false));
        assert!(mac_check_required(0, 10, true));
        assert!(mac_check_required(11, 10, true));
    }

    /// Tests that an upcoming output gate verifies older openings, then
    /// re-arms for the output's own opening
    #[tokio::test]
    async fn test_before_batch_with_output() {
        let modulus = Modulus::default();
        let dealt = deal_opened_values(3, N_PARTIES, &modulus);

        let res = execute_mock_mpc(N_PARTIES, |party_id, mut network| {
            let (key_share, records) = dealt[party_id].clone();
            async move {
                let mut pool =
                    SpdzResourcePool::new(party_id, N_PARTIES, modulus, key_share).unwrap();
                let mut ledger = OpenedValueLedger::new();
                records.iter().for_each(|r| ledger.append(r.value, r.mac_share));

                let mut sync = SpdzRoundSynchronization::new(EvaluationConfig::default());
                let batch = vec![OutputGate::new(AuthenticatedShare::default())];
                sync.before_batch(&batch, &mut pool, &mut ledger, &mut network).await.unwrap();
                let after_before = (ledger.is_empty(), sync.check_pending());

                // The output batch has opened nothing here, the check is a no-op
                sync.after_batch(1, &mut pool, &mut ledger, &mut network).await.unwrap();
                let after_after = (sync.check_pending(), sync.gates_since_check());

                (after_before, after_after, sync.mac_checks_performed())
            }
        })
        .await;

        for (after_before, after_after, checks) in res {
            assert_eq!(after_before, (true, true));
            assert_eq!(after_after, (false, 0));
            assert_eq!(checks, 1);
        }
    }

    /// Tests that a batch without outputs does not check before it runs
    #[tokio::test]
    async fn test_before_batch_without_output() {
        let modulus = Modulus::default();
        let dealt = deal_opened_values(2, N_PARTIES, &modulus);

        let res = execute_mock_mpc(N_PARTIES, |party_id, mut network| {
            let (key_share, records) = dealt[party_id].clone();
            async move {
                let mut pool =
                    SpdzResourcePool::new(party_id, N_PARTIES, modulus, key_share).unwrap();
                let mut ledger = OpenedValueLedger::new();
                records.iter().for_each(|r| ledger.append(r.value, r.mac_share));

                let mut sync = SpdzRoundSynchronization::new(EvaluationConfig::default());
                let batch = vec![OpenGate::new(AuthenticatedShare::default())];
                sync.before_batch(&batch, &mut pool, &mut ledger, &mut network).await.unwrap();
                let pending_len = ledger.len();

                sync.after_evaluation(&mut pool, &mut ledger, &mut network).await.unwrap();
                (pending_len, ledger.is_empty(), sync.mac_checks_performed())
            }
        })
        .await;

        for (pending_len, empty, checks) in res {
            assert_eq!(pending_len, 2);
            assert!(empty);
            assert_eq!(checks, 1);
        }
    }

    /// Tests that exceeding the threshold triggers a check
    #[tokio::test]
    async fn test_after_batch_threshold() {
        let modulus = Modulus::default();
        let dealt = deal_opened_values(4, N_PARTIES, &modulus);
        let config = EvaluationConfig {
            max_batch_size: 10,
            mac_check_threshold: 10,
            ..Default::default()
        };

        let res = execute_mock_mpc(N_PARTIES, |party_id, mut network| {
            let (key_share, records) = dealt[party_id].clone();
            async move {
                let mut pool =
                    SpdzResourcePool::new(party_id, N_PARTIES, modulus, key_share).unwrap();
                let mut ledger = OpenedValueLedger::new();
                records.iter().for_each(|r| ledger.append(r.value, r.mac_share));

                let mut sync = SpdzRoundSynchronization::new(config);
                sync.after_batch(10, &mut pool, &mut ledger, &mut network).await.unwrap();
                let at_threshold = (ledger.len(), sync.gates_since_check());

                sync.after_batch(1, &mut pool, &mut ledger, &mut network).await.unwrap();
                let past_threshold = (ledger.len(), sync.gates_since_check());

                (at_threshold, past_threshold, sync.mac_checks_performed())
            }
        })
        .await;

        for (at_threshold, past_threshold, checks) in res {
            assert_eq!(at_threshold, (4, 10));
            assert_eq!(past_threshold, (0, 0));
            assert_eq!(checks, 1);
        }
    }

    /// Tests that a check over an empty ledger sends nothing
    #[tokio::test]
    async fn test_empty_ledger_is_silent() {
        let res = execute_mock_mpc(N_PARTIES, |party_id, mut network| async move {
            let mut pool = SpdzResourcePool::new(
                party_id,
                N_PARTIES,
                Modulus::default(),
                Default::default(),
            )
            .unwrap();
            let mut ledger = OpenedValueLedger::new();
            let stats = network.stats();

            let mut sync = SpdzRoundSynchronization::new(EvaluationConfig::default());
            sync.after_evaluation(&mut pool, &mut ledger, &mut network).await.unwrap();
            (stats.sent(), sync.mac_checks_performed())
        })
        .await;

        assert_eq!(res, vec![(0, 0), (0, 0)]);
    }
}
