//! Gates that publicly reconstruct a shared value

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;

use crate::{
    algebra::{AuthenticatedShare, FieldElement},
    error::SpdzError,
};

use super::{EvaluationContext, EvaluationStatus, Gate};

/// A handle to a value that becomes available once a gate has run
#[derive(Clone, Debug, Default)]
pub struct ValueHandle(Arc<OnceLock<FieldElement>>);

impl ValueHandle {
    /// The value, if the producing gate has finished
    pub fn get(&self) -> Option<FieldElement> {
        self.0.get().copied()
    }

    /// Publish the value, later calls are ignored
    fn set(&self, value: FieldElement) {
        let _ = self.0.set(value);
    }
}

/// Opens a shared value to all parties and records the opening in the
/// ledger
///
/// Round zero broadcasts the local share; round one sums all shares. The
/// local MAC share is recorded against the reconstructed value, it is not
/// sent
#[derive(Debug)]
pub struct OpenGate {
    /// The local party's share of the value
    share: AuthenticatedShare,
    /// The reconstructed value, once the final round has run
    opened: Option<FieldElement>,
    /// Where the opened value is published
    handle: ValueHandle,
}

impl OpenGate {
    /// Constructor
    pub fn new(share: AuthenticatedShare) -> Self {
        Self { share, opened: None, handle: ValueHandle::default() }
    }

    /// A handle to the opened value
    pub fn handle(&self) -> ValueHandle {
        self.handle.clone()
    }

    /// Run one round of the opening without publishing the result
    async fn open(
        &mut self,
        round: usize,
        ctx: &mut EvaluationContext<'_, '_>,
    ) -> Result<EvaluationStatus, SpdzError> {
        let modulus = *ctx.pool.modulus();
        if round == 0 {
            ctx.network.broadcast(modulus.encode(&self.share.share()));
            return Ok(EvaluationStatus::HasMoreRounds);
        }

        let mut value = self.share.share();
        let peers: Vec<_> = ctx.network.peers().collect();
        for peer in peers {
            let bytes = ctx.network.receive(peer).await?;
            value = modulus.add(&value, &modulus.decode(&bytes)?);
        }

        ctx.ledger.append(value, self.share.mac());
        self.opened = Some(value);
        Ok(EvaluationStatus::Done)
    }
}

#[async_trait]
impl Gate for OpenGate {
    async fn evaluate(
        &mut self,
        round: usize,
        ctx: &mut EvaluationContext<'_, '_>,
    ) -> Result<EvaluationStatus, SpdzError> {
        let status = self.open(round, ctx).await?;
        if let Some(value) = self.opened {
            self.handle.set(value);
        }

        Ok(status)
    }
}

/// Opens a shared value as a result of the computation
///
/// Behaves as an [`OpenGate`] but is tagged as revealing output, so every
/// value opened before it is verified before it runs. The opened value is
/// held back until [`Gate::release_outputs`] is called, which the evaluator
/// only does once the opening itself has been verified
#[derive(Debug)]
pub struct OutputGate(OpenGate);

impl OutputGate {
    /// Constructor
    pub fn new(share: AuthenticatedShare) -> Self {
        Self(OpenGate::new(share))
    }

    /// A handle to the output value, empty until the output is released
    pub fn handle(&self) -> ValueHandle {
        self.0.handle()
    }
}

#[async_trait]
impl Gate for OutputGate {
    fn reveals_output(&self) -> bool {
        true
    }

    fn release_outputs(&self) {
        if let Some(value) = self.0.opened {
            self.0.handle.set(value);
        }
    }

    async fn evaluate(
        &mut self,
        round: usize,
        ctx: &mut EvaluationContext<'_, '_>,
    ) -> Result<EvaluationStatus, SpdzError> {
        self.0.open(round, ctx).await
    }
}
