//! The outer evaluation loop: pulls bounded batches from a gate stream and
//! runs the round synchronization hooks around them

use tracing::log;

use crate::{
    config::EvaluationConfig,
    error::SpdzError,
    ledger::OpenedValueLedger,
    network::{MpcNetwork, NetworkBatchDecorator, RoundPhase},
    resource_pool::SpdzResourcePool,
    round_sync::{RoundSynchronization, SpdzRoundSynchronization},
};

use super::{BatchedStrategy, Gate};

/// A summary of one call to [`BatchedProtocolEvaluator::evaluate`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    /// The number of gates evaluated
    pub gates: usize,
    /// The number of batches evaluated
    pub batches: u64,
    /// The number of MAC checks run so far by the evaluator
    pub mac_checks: u64,
}

/// Evaluates a stream of gates in bounded batches for the local party
///
/// Output gates are released only once the ledger holding their openings has
/// been verified, so a failed check leaves their handles empty. Any error is
/// fatal: the evaluator refuses every later evaluation with the same error
pub struct BatchedProtocolEvaluator<
    N: MpcNetwork,
    S: RoundSynchronization = SpdzRoundSynchronization,
> {
    /// The batch and check configuration
    config: EvaluationConfig,
    /// The local party's resources
    pool: SpdzResourcePool,
    /// The opened values awaiting verification
    ledger: OpenedValueLedger,
    /// The transport
    network: N,
    /// The round synchronization controller
    sync: S,
    /// The number of batches evaluated, numbering the next batch
    batches: u64,
    /// The error that aborted the computation, if any
    aborted: Option<SpdzError>,
}

impl<N: MpcNetwork> BatchedProtocolEvaluator<N> {
    /// Constructor using the SPDZ round synchronization
    pub fn new(
        config: EvaluationConfig,
        pool: SpdzResourcePool,
        network: N,
    ) -> Result<Self, SpdzError> {
        let sync = SpdzRoundSynchronization::new(config);
        Self::with_round_synchronization(config, pool, network, sync)
    }
}

impl<N: MpcNetwork, S: RoundSynchronization> BatchedProtocolEvaluator<N, S> {
    /// Constructor with a custom round synchronization
    pub fn with_round_synchronization(
        config: EvaluationConfig,
        pool: SpdzResourcePool,
        network: N,
        sync: S,
    ) -> Result<Self, SpdzError> {
        config.validate()?;
        if network.party_id() != pool.party_id() || network.num_parties() != pool.num_parties() {
            return Err(SpdzError::Setup(format!(
                "network is party {} of {}, resource pool is party {} of {}",
                network.party_id(),
                network.num_parties(),
                pool.party_id(),
                pool.num_parties()
            )));
        }

        Ok(Self {
            config,
            pool,
            ledger: OpenedValueLedger::new(),
            network,
            sync,
            batches: 0,
            aborted: None,
        })
    }

    /// The local party's resources
    pub fn pool(&self) -> &SpdzResourcePool {
        &self.pool
    }

    /// The opened values awaiting verification
    pub fn ledger(&self) -> &OpenedValueLedger {
        &self.ledger
    }

    /// The round synchronization controller
    pub fn round_synchronization(&self) -> &S {
        &self.sync
    }

    /// The transport
    pub fn network(&self) -> &N {
        &self.network
    }

    /// The error that aborted the computation, if any
    pub fn aborted(&self) -> Option<&SpdzError> {
        self.aborted.as_ref()
    }

    /// Evaluate a gate stream to completion
    ///
    /// Gates are pulled lazily in batches of at most `max_batch_size`. Every
    /// value opened by the stream has been verified when this returns `Ok`.
    /// Once an evaluation has failed, every later call returns the same error
    /// without touching the network
    pub async fn evaluate<G, I>(&mut self, gates: I) -> Result<EvaluationSummary, SpdzError>
    where
        G: Gate,
        I: IntoIterator<Item = G>,
        I::IntoIter: Send,
    {
        if let Some(err) = &self.aborted {
            return Err(err.clone());
        }

        let res = self.evaluate_stream(gates.into_iter()).await;
        if let Err(err) = &res {
            log::error!("party {} aborted the computation: {err}", self.pool.party_id());
            self.aborted = Some(err.clone());
        }

        res
    }

    /// Run the batch loop and the hooks around it
    async fn evaluate_stream<G, I>(&mut self, mut stream: I) -> Result<EvaluationSummary, SpdzError>
    where
        G: Gate,
        I: Iterator<Item = G> + Send,
    {
        let mut summary = EvaluationSummary::default();
        // Output gates whose openings have not been verified yet
        let mut staged: Vec<G> = Vec::new();

        loop {
            let mut batch: Vec<G> = stream.by_ref().take(self.config.max_batch_size).collect();
            if batch.is_empty() {
                break;
            }

            self.sync
                .before_batch(&batch, &mut self.pool, &mut self.ledger, &mut self.network)
                .await?;

            let phase = RoundPhase::Circuit { batch: self.batches };
            let mut network = NetworkBatchDecorator::new(&mut self.network, phase);
            let (pool, ledger) = (&mut self.pool, &mut self.ledger);
            BatchedStrategy::process_batch(&mut batch, pool, ledger, &mut network).await?;

            self.sync
                .after_batch(batch.len(), &mut self.pool, &mut self.ledger, &mut self.network)
                .await?;

            self.batches += 1;
            summary.batches += 1;
            summary.gates += batch.len();

            staged.extend(batch.into_iter().filter(|gate| gate.reveals_output()));
            self.release_verified(&mut staged);
        }

        self.sync.after_evaluation(&mut self.pool, &mut self.ledger, &mut self.network).await?;
        self.release_verified(&mut staged);
        summary.mac_checks = self.sync.mac_checks_performed();

        log::info!(
            "party {} evaluated {} gates in {} batches, {} MAC checks",
            self.pool.party_id(),
            summary.gates,
            summary.batches,
            summary.mac_checks
        );
        Ok(summary)
    }

    /// Release the staged outputs if every recorded opening has been verified
    fn release_verified<G: Gate>(&self, staged: &mut Vec<G>) {
        if !self.ledger.is_empty() {
            return;
        }

        staged.drain(..).for_each(|gate| gate.release_outputs());
    }
}
