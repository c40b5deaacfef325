//! The internal gates of the MAC check, driven by the same batched strategy
//! as circuit gates

use async_trait::async_trait;

use crate::{
    algebra::{FieldElement, Modulus},
    error::{EncodingError, SpdzError},
    evaluator::{EvaluationContext, EvaluationStatus, Gate},
    ledger::OpenedValue,
    network::PartyId,
};

use super::commitment::{Commitment, NONCE_BYTES};

/// Fold opened values into a single check value with Horner's rule
///
/// For records `(x_0, m_0), ..., (x_{n-1}, m_{n-1})` and combiner `r` this
/// returns `sum_k r^(n-1-k) * (m_k - key * x_k)` together with `r^n`, so
/// that consecutive chunks fold as `acc * r^n + h`
pub fn compress(
    records: &[OpenedValue],
    combiner: &FieldElement,
    mac_key_share: &FieldElement,
    modulus: &Modulus,
) -> (FieldElement, FieldElement) {
    let mut acc = FieldElement::ZERO;
    let mut power = FieldElement::one();
    for record in records {
        let expected_mac = modulus.mul(mac_key_share, &record.value);
        let diff = modulus.sub(&record.mac_share, &expected_mac);

        acc = modulus.add(&modulus.mul(&acc, combiner), &diff);
        power = modulus.mul(&power, combiner);
    }

    (acc, power)
}

/// Broadcasts a commitment and collects every party's commitment
#[derive(Debug)]
pub struct CommitGate {
    /// The local party's commitment
    commitment: Commitment,
    /// The commitments of all parties indexed by party ID, once received
    commitments: Vec<Commitment>,
}

impl CommitGate {
    /// Constructor
    pub fn new(commitment: Commitment) -> Self {
        Self { commitment, commitments: Vec::new() }
    }

    /// The commitments of all parties, indexed by party ID
    pub fn into_commitments(self) -> Vec<Commitment> {
        self.commitments
    }
}

#[async_trait]
impl Gate for CommitGate {
    async fn evaluate(
        &mut self,
        round: usize,
        ctx: &mut EvaluationContext<'_, '_>,
    ) -> Result<EvaluationStatus, SpdzError> {
        if round == 0 {
            ctx.network.broadcast(self.commitment.to_bytes());
            return Ok(EvaluationStatus::HasMoreRounds);
        }

        let me = ctx.network.party_id();
        let mut commitments = Vec::with_capacity(ctx.network.num_parties());
        for party in 0..ctx.network.num_parties() {
            if party == me {
                commitments.push(self.commitment);
            } else {
                commitments.push(Commitment::from_bytes(&ctx.network.receive(party).await?)?);
            }
        }

        self.commitments = commitments;
        Ok(EvaluationStatus::Done)
    }
}

/// Reveals a committed value, checks every peer's decommitment and sums all
/// revealed values
#[derive(Debug)]
pub struct DecommitGate {
    /// The local party's committed value
    value: FieldElement,
    /// The nonce the local value was committed under
    nonce: [u8; NONCE_BYTES],
    /// The commitments of all parties, indexed by party ID
    commitments: Vec<Commitment>,
    /// The sum of all revealed values, once verified
    sum: Option<FieldElement>,
}

impl DecommitGate {
    /// Constructor
    pub fn new(
        value: FieldElement,
        nonce: [u8; NONCE_BYTES],
        commitments: Vec<Commitment>,
    ) -> Self {
        Self { value, nonce, commitments, sum: None }
    }

    /// The sum of all parties' revealed values
    pub fn sum(&self) -> Option<FieldElement> {
        self.sum
    }

    /// Parse and verify a peer's decommitment
    fn open_peer(
        &self,
        party: PartyId,
        bytes: &[u8],
        modulus: &Modulus,
    ) -> Result<FieldElement, SpdzError> {
        let expected = FieldElement::BYTES + NONCE_BYTES;
        if bytes.len() != expected {
            return Err(EncodingError::InvalidLength { expected, actual: bytes.len() }.into());
        }

        let (value_bytes, nonce_bytes) = bytes.split_at(FieldElement::BYTES);
        let value = modulus.decode(value_bytes)?;
        let mut nonce = [0u8; NONCE_BYTES];
        nonce.copy_from_slice(nonce_bytes);

        let commitment =
            self.commitments.get(party).ok_or(SpdzError::InvalidCommitment { party })?;
        if !commitment.verify(&value, &nonce) {
            return Err(SpdzError::InvalidCommitment { party });
        }

        Ok(value)
    }
}

#[async_trait]
impl Gate for DecommitGate {
    async fn evaluate(
        &mut self,
        round: usize,
        ctx: &mut EvaluationContext<'_, '_>,
    ) -> Result<EvaluationStatus, SpdzError> {
        let modulus = *ctx.pool.modulus();
        if round == 0 {
            let mut payload = modulus.encode(&self.value);
            payload.extend_from_slice(&self.nonce);
            ctx.network.broadcast(payload);
            return Ok(EvaluationStatus::HasMoreRounds);
        }

        let mut sum = self.value;
        let peers: Vec<_> = ctx.network.peers().collect();
        for peer in peers {
            let bytes = ctx.network.receive(peer).await?;
            sum = modulus.add(&sum, &self.open_peer(peer, &bytes, &modulus)?);
        }

        self.sum = Some(sum);
        Ok(EvaluationStatus::Done)
    }
}

/// Compresses one chunk of opened values, locally and in a single round
#[derive(Debug)]
pub struct AccumulateGate {
    /// The records of the chunk, in ledger order
    records: Vec<OpenedValue>,
    /// The public combiner
    combiner: FieldElement,
    /// The compressed chunk and the combiner raised to the chunk length
    output: Option<(FieldElement, FieldElement)>,
}

impl AccumulateGate {
    /// Constructor
    pub fn new(records: Vec<OpenedValue>, combiner: FieldElement) -> Self {
        Self { records, combiner, output: None }
    }

    /// The compressed chunk and `r^len`, once evaluated
    pub fn output(&self) -> Option<(FieldElement, FieldElement)> {
        self.output
    }
}

#[async_trait]
impl Gate for AccumulateGate {
    async fn evaluate(
        &mut self,
        _round: usize,
        ctx: &mut EvaluationContext<'_, '_>,
    ) -> Result<EvaluationStatus, SpdzError> {
        let pool = &*ctx.pool;
        self.output =
            Some(compress(&self.records, &self.combiner, pool.mac_key_share(), pool.modulus()));
        Ok(EvaluationStatus::Done)
    }
}

/// Any of the gates a MAC check evaluates
#[derive(Debug)]
pub enum MacCheckGate {
    /// Exchange commitments
    Commit(CommitGate),
    /// Exchange and verify decommitments
    Decommit(DecommitGate),
    /// Compress a chunk of opened values
    Accumulate(AccumulateGate),
}

impl MacCheckGate {
    /// The commitments exchanged by a commit gate
    pub fn into_commitments(self) -> Result<Vec<Commitment>, SpdzError> {
        match self {
            MacCheckGate::Commit(gate) if !gate.commitments.is_empty() => {
                Ok(gate.into_commitments())
            },
            _ => Err(SpdzError::Setup("expected an evaluated commit gate".to_string())),
        }
    }

    /// The verified sum revealed by a decommit gate
    pub fn decommitted_sum(&self) -> Result<FieldElement, SpdzError> {
        match self {
            MacCheckGate::Decommit(gate) => gate
                .sum()
                .ok_or_else(|| SpdzError::Setup("decommit gate was not evaluated".to_string())),
            _ => Err(SpdzError::Setup("expected a decommit gate".to_string())),
        }
    }
}

#[async_trait]
impl Gate for MacCheckGate {
    async fn evaluate(
        &mut self,
        round: usize,
        ctx: &mut EvaluationContext<'_, '_>,
    ) -> Result<EvaluationStatus, SpdzError> {
        match self {
            MacCheckGate::Commit(gate) => gate.evaluate(round, ctx).await,
            MacCheckGate::Decommit(gate) => gate.evaluate(round, ctx).await,
            MacCheckGate::Accumulate(gate) => gate.evaluate(round, ctx).await,
        }
    }
}
