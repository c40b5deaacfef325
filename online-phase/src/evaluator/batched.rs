//! Evaluates a bounded collection of gates round by round

use tracing::log;

use crate::{
    error::SpdzError, ledger::OpenedValueLedger, network::NetworkBatchDecorator,
    resource_pool::SpdzResourcePool,
};

use super::{EvaluationContext, EvaluationStatus, Gate};

/// Evaluates every gate of a batch in lockstep, one network round at a time
///
/// The same strategy drives circuit gates and the internal gates of a MAC
/// check
pub struct BatchedStrategy;

impl BatchedStrategy {
    /// Evaluate the gates until all of them are done, returning the number of
    /// rounds used
    ///
    /// Within a round gates are evaluated in order; the messages of a round
    /// are flushed once all gates have run
    pub async fn process_batch<G: Gate>(
        gates: &mut [G],
        pool: &mut SpdzResourcePool,
        ledger: &mut OpenedValueLedger,
        network: &mut NetworkBatchDecorator<'_>,
    ) -> Result<usize, SpdzError> {
        let mut done = vec![false; gates.len()];
        let mut remaining = gates.len();
        let mut round = 0;

        while remaining > 0 {
            {
                let mut ctx = EvaluationContext {
                    pool: &mut *pool,
                    ledger: &mut *ledger,
                    network: &mut *network,
                };
                for (gate, done) in gates.iter_mut().zip(done.iter_mut()).filter(|(_, d)| !**d) {
                    if gate.evaluate(round, &mut ctx).await? == EvaluationStatus::Done {
                        *done = true;
                        remaining -= 1;
                    }
                }
            }

            network.flush().await?;
            network.end_round()?;
            round += 1;
        }

        log::trace!("evaluated {} gates in {round} rounds ({})", gates.len(), network.phase());
        Ok(round)
    }
}

#[cfg(test)]
mod test {
    use async_trait::async_trait;
    use rand::thread_rng;

    use crate::{
        algebra::{FieldElement, Modulus},
        error::SpdzError,
        evaluator::{EvaluationContext, EvaluationStatus, Gate, OpenGate},
        ledger::OpenedValueLedger,
        network::{NetworkBatchDecorator, RoundPhase},
        resource_pool::SpdzResourcePool,
        test_helpers::{deal_mac_key, execute_mock_mpc, share_value},
    };

    use super::BatchedStrategy;

    /// A gate that echoes a counter to its peers for a fixed number of rounds
    struct CountingGate {
        /// The number of rounds the gate runs for
        rounds: usize,
        /// The values received from peers
        received: Vec<u8>,
    }

    #[async_trait]
    impl Gate for CountingGate {
        async fn evaluate(
            &mut self,
            round: usize,
            ctx: &mut EvaluationContext<'_, '_>,
        ) -> Result<EvaluationStatus, SpdzError> {
            if round > 0 {
                let peers: Vec<_> = ctx.network.peers().collect();
                for peer in peers {
                    self.received.extend(ctx.network.receive(peer).await?);
                }
            }

            if round + 1 == self.rounds {
                return Ok(EvaluationStatus::Done);
            }

            ctx.network.broadcast(vec![round as u8]);
            Ok(EvaluationStatus::HasMoreRounds)
        }
    }

    /// Tests that gates of different lengths share rounds
    #[tokio::test]
    async fn test_round_count() {
        let res = execute_mock_mpc(3, |party_id, mut network| async move {
            let mut pool =
                SpdzResourcePool::new(party_id, 3, Modulus::default(), FieldElement::ZERO).unwrap();
            let mut ledger = OpenedValueLedger::new();
            let mut gates = vec![
                CountingGate { rounds: 3, received: vec![] },
                CountingGate { rounds: 1, received: vec![] },
                CountingGate { rounds: 2, received: vec![] },
            ];

            let mut decorator =
                NetworkBatchDecorator::new(&mut network, RoundPhase::Circuit { batch: 0 });
            let rounds =
                BatchedStrategy::process_batch(&mut gates, &mut pool, &mut ledger, &mut decorator)
                    .await
                    .unwrap();

            (rounds, gates.into_iter().map(|g| g.received).collect::<Vec<_>>())
        })
        .await;

        for (rounds, received) in res {
            assert_eq!(rounds, 3);
            assert_eq!(received, vec![vec![0, 0, 1, 1], vec![], vec![0, 0]]);
        }
    }

    /// Tests that an empty batch uses no rounds
    #[tokio::test]
    async fn test_empty_batch() {
        let res = execute_mock_mpc(2, |party_id, mut network| async move {
            let mut pool =
                SpdzResourcePool::new(party_id, 2, Modulus::default(), FieldElement::ZERO).unwrap();
            let mut ledger = OpenedValueLedger::new();
            let mut gates: Vec<OpenGate> = vec![];

            let mut decorator =
                NetworkBatchDecorator::new(&mut network, RoundPhase::Circuit { batch: 0 });
            BatchedStrategy::process_batch(&mut gates, &mut pool, &mut ledger, &mut decorator)
                .await
                .unwrap()
        })
        .await;

        assert_eq!(res, vec![0, 0]);
    }

    /// Tests that openings are recorded in the ledger in gate order
    #[tokio::test]
    async fn test_openings_recorded() {
        const N_PARTIES: usize = 2;
        let mut rng = thread_rng();
        let modulus = Modulus::default();
        let (key, key_shares) = deal_mac_key(N_PARTIES, &modulus, &mut rng);
        let values = [FieldElement::from(3u64), FieldElement::from(4u64)];
        let shares: Vec<_> =
            values.iter().map(|v| share_value(*v, key, N_PARTIES, &modulus, &mut rng)).collect();

        let res = execute_mock_mpc(N_PARTIES, |party_id, mut network| {
            let key_share = key_shares[party_id];
            let my_shares: Vec<_> = shares.iter().map(|s| s[party_id]).collect();
            async move {
                let mut pool =
                    SpdzResourcePool::new(party_id, N_PARTIES, modulus, key_share).unwrap();
                let mut ledger = OpenedValueLedger::new();
                let mut gates: Vec<_> = my_shares.into_iter().map(OpenGate::new).collect();

                let mut decorator =
                    NetworkBatchDecorator::new(&mut network, RoundPhase::Circuit { batch: 0 });
                BatchedStrategy::process_batch(&mut gates, &mut pool, &mut ledger, &mut decorator)
                    .await
                    .unwrap();

                ledger.drain().into_iter().map(|r| r.value).collect::<Vec<_>>()
            }
        })
        .await;

        for opened in res {
            assert_eq!(opened, values.to_vec());
        }
    }
}
