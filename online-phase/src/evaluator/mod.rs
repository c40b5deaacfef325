//! Defines the unit of evaluation and the machinery that drives gates
//! through network rounds

mod batched;
mod gates;
mod protocol_evaluator;

pub use batched::*;
pub use gates::*;
pub use protocol_evaluator::*;

use async_trait::async_trait;

use crate::{
    error::SpdzError, ledger::OpenedValueLedger, network::NetworkBatchDecorator,
    resource_pool::SpdzResourcePool,
};

/// The result of evaluating one round of a gate
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvaluationStatus {
    /// The gate has finished
    Done,
    /// The gate must be evaluated again in the next round
    HasMoreRounds,
}

/// The resources lent to a gate for one round of evaluation
pub struct EvaluationContext<'a, 'n> {
    /// The local party's resource pool
    pub pool: &'a mut SpdzResourcePool,
    /// The ledger that openings are recorded in
    pub ledger: &'a mut OpenedValueLedger,
    /// The network, batched by round
    pub network: &'a mut NetworkBatchDecorator<'n>,
}

/// A unit of work in the evaluated circuit
///
/// A gate is evaluated once per round until it reports `Done`, starting at
/// round zero. Messages a gate sends in round `r` are received by the peers'
/// gates in round `r + 1`, so the final round of a gate never sends
#[async_trait]
pub trait Gate: Send + Sync {
    /// Whether the gate publicly reveals a result to a party
    fn reveals_output(&self) -> bool {
        false
    }

    /// Publish any result the gate has held back
    ///
    /// Called only after every opening the gate performed has passed a MAC
    /// check
    fn release_outputs(&self) {}

    /// Evaluate one round of the gate
    async fn evaluate(
        &mut self,
        round: usize,
        ctx: &mut EvaluationContext<'_, '_>,
    ) -> Result<EvaluationStatus, SpdzError>;
}

#[async_trait]
impl<G: Gate + ?Sized> Gate for Box<G> {
    fn reveals_output(&self) -> bool {
        (**self).reveals_output()
    }

    fn release_outputs(&self) {
        (**self).release_outputs()
    }

    async fn evaluate(
        &mut self,
        round: usize,
        ctx: &mut EvaluationContext<'_, '_>,
    ) -> Result<EvaluationStatus, SpdzError> {
        (**self).evaluate(round, ctx).await
    }
}
