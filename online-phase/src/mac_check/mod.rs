//! The MAC check: verifies in bulk that every opened value is consistent
//! with the parties' shares of the global MAC key
//!
//! The check runs as an explicit state machine that hands out bounded slices
//! of internal gates. The slices are evaluated by the
//! [`BatchedStrategy`](crate::evaluator::BatchedStrategy) like any circuit
//! batch and handed back to the state machine to advance it:
//!
//! 1. The parties agree on a random combiner `r` by committing to and then
//!    revealing one random field element each
//! 2. Each party compresses its pending records `(x_k, m_k)` into
//!    `sigma = sum_k r^(n-1-k) * (m_k - key_share * x_k)`
//! 3. The parties commit to and reveal their `sigma`, the check passes iff
//!    the revealed values sum to zero

mod commitment;
mod gates;

pub use commitment::*;
pub use gates::*;

use tracing::log;

use crate::{
    algebra::{FieldElement, Modulus},
    config::EvaluationConfig,
    error::SpdzError,
    evaluator::BatchedStrategy,
    ledger::{OpenedValue, OpenedValueLedger},
    network::{MpcNetwork, NetworkBatchDecorator, RoundPhase},
    resource_pool::SpdzResourcePool,
};

/// The states of a MAC check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MacCheckState {
    /// No gates have been produced yet
    Idle,
    /// The parties are agreeing on the combiner
    AwaitingCombiner,
    /// The pending records are being compressed
    Compressing,
    /// The compressed values are being committed to
    AwaitingCommit,
    /// The compressed values are being revealed and summed
    AwaitingOpen,
    /// The check passed
    Verified,
    /// The check failed
    Failed,
}

/// A single MAC check over a drained set of opened values
#[derive(Debug)]
pub struct MacCheckProtocol {
    /// The index of the check in the local party's check sequence
    check: u64,
    /// The field modulus
    modulus: Modulus,
    /// The current state
    state: MacCheckState,
    /// The records under verification, in ledger order
    records: Vec<OpenedValue>,
    /// The index of the first record not yet handed to an accumulation gate
    next_record: usize,
    /// The maximum number of records per accumulation gate
    accumulate_chunk_size: usize,
    /// The maximum number of gates per slice
    batch_size: usize,
    /// The local value and nonce of the commit-reveal exchange in progress
    contribution: Option<(FieldElement, [u8; NONCE_BYTES])>,
    /// The commitments of the exchange in progress, once exchanged
    commitments: Option<Vec<Commitment>>,
    /// The agreed combiner
    combiner: FieldElement,
    /// The local compressed check value, folded chunk by chunk
    sigma: FieldElement,
    /// Whether a slice has been handed out and not yet absorbed
    outstanding: bool,
}

impl MacCheckProtocol {
    /// Create a check over the given records
    ///
    /// A check over no records is verified without any gates
    pub fn new(
        check: u64,
        records: Vec<OpenedValue>,
        modulus: Modulus,
        config: &EvaluationConfig,
    ) -> Self {
        let state =
            if records.is_empty() { MacCheckState::Verified } else { MacCheckState::Idle };

        Self {
            check,
            modulus,
            state,
            records,
            next_record: 0,
            accumulate_chunk_size: config.accumulate_chunk_size.max(1),
            batch_size: config.mac_check_batch_size.max(1),
            contribution: None,
            commitments: None,
            combiner: FieldElement::ZERO,
            sigma: FieldElement::ZERO,
            outstanding: false,
        }
    }

    /// The current state
    pub fn state(&self) -> MacCheckState {
        self.state
    }

    /// The index of the check
    pub fn check(&self) -> u64 {
        self.check
    }

    /// Whether the check has more gates to evaluate
    pub fn has_next_gates(&self) -> bool {
        !matches!(self.state, MacCheckState::Verified | MacCheckState::Failed)
    }

    /// Produce the next slice of at most `mac_check_batch_size` gates
    ///
    /// The evaluated slice must be passed to [`Self::absorb`] before the next
    /// slice is requested
    pub fn next_gates(
        &mut self,
        pool: &mut SpdzResourcePool,
    ) -> Result<Vec<MacCheckGate>, SpdzError> {
        if self.outstanding {
            return Err(SpdzError::Setup(format!(
                "MAC check #{}: previous slice was not absorbed",
                self.check
            )));
        }

        if self.state == MacCheckState::Idle {
            self.state = MacCheckState::AwaitingCombiner;
        }

        let gates = match self.state {
            MacCheckState::AwaitingCombiner if self.commitments.is_none() => {
                let value = self.modulus.random(pool.rng());
                vec![self.commit_gate(value, pool)]
            },
            MacCheckState::AwaitingCombiner | MacCheckState::AwaitingOpen => {
                vec![self.decommit_gate()?]
            },
            MacCheckState::Compressing => self.accumulate_gates(),
            MacCheckState::AwaitingCommit => vec![self.commit_gate(self.sigma, pool)],
            MacCheckState::Idle | MacCheckState::Verified | MacCheckState::Failed => vec![],
        };

        self.outstanding = !gates.is_empty();
        Ok(gates)
    }

    /// Advance the state machine with an evaluated slice
    ///
    /// Returns `MacCheckFailed` if the slice completes a failing check
    pub fn absorb(&mut self, gates: Vec<MacCheckGate>) -> Result<(), SpdzError> {
        if !self.outstanding {
            return Err(SpdzError::Setup(format!(
                "MAC check #{}: no slice is outstanding",
                self.check
            )));
        }
        self.outstanding = false;

        match self.state {
            MacCheckState::AwaitingCombiner if self.commitments.is_none() => {
                self.commitments = Some(Self::single_gate(gates)?.into_commitments()?);
            },
            MacCheckState::AwaitingCombiner => {
                self.combiner = Self::single_gate(gates)?.decommitted_sum()?;
                self.contribution = None;
                self.commitments = None;
                self.state = MacCheckState::Compressing;
            },
            MacCheckState::Compressing => {
                for gate in gates {
                    self.fold_chunk(gate)?;
                }

                if self.next_record >= self.records.len() {
                    self.records = Vec::new();
                    self.state = MacCheckState::AwaitingCommit;
                }
            },
            MacCheckState::AwaitingCommit => {
                self.commitments = Some(Self::single_gate(gates)?.into_commitments()?);
                self.state = MacCheckState::AwaitingOpen;
            },
            MacCheckState::AwaitingOpen => {
                let sum = Self::single_gate(gates)?.decommitted_sum()?;
                self.contribution = None;
                self.commitments = None;

                if !sum.is_zero() {
                    self.state = MacCheckState::Failed;
                    log::error!("MAC check #{} failed, aborting evaluation", self.check);
                    return Err(SpdzError::MacCheckFailed { check: self.check });
                }

                self.state = MacCheckState::Verified;
            },
            MacCheckState::Idle | MacCheckState::Verified | MacCheckState::Failed => {},
        }

        Ok(())
    }

    /// Drive the check to completion over the network
    ///
    /// Every slice is exchanged under the phase of this check, so a peer that
    /// is at another point of the gate stream is detected
    pub async fn execute(
        mut self,
        pool: &mut SpdzResourcePool,
        network: &mut dyn MpcNetwork,
    ) -> Result<(), SpdzError> {
        // Check gates open nothing, they never write to the ledger
        let mut scratch = OpenedValueLedger::new();
        let phase = RoundPhase::MacCheck { check: self.check };

        while self.has_next_gates() {
            let mut gates = self.next_gates(pool)?;
            let mut decorator = NetworkBatchDecorator::new(network, phase);
            BatchedStrategy::process_batch(&mut gates, pool, &mut scratch, &mut decorator).await?;
            self.absorb(gates)?;
        }

        Ok(())
    }

    // -----------
    // | Helpers |
    // -----------

    /// Build the commit gate of a commit-reveal exchange of `value`
    fn commit_gate(&mut self, value: FieldElement, pool: &mut SpdzResourcePool) -> MacCheckGate {
        let nonce = random_nonce(pool.rng());
        self.contribution = Some((value, nonce));

        MacCheckGate::Commit(CommitGate::new(Commitment::commit(&value, &nonce)))
    }

    /// Build the decommit gate of the exchange in progress
    fn decommit_gate(&self) -> Result<MacCheckGate, SpdzError> {
        let (value, nonce) = self.contribution.ok_or_else(|| {
            SpdzError::Setup(format!("MAC check #{}: nothing was committed", self.check))
        })?;
        let commitments = self.commitments.clone().ok_or_else(|| {
            SpdzError::Setup(format!("MAC check #{}: commitments not exchanged", self.check))
        })?;

        Ok(MacCheckGate::Decommit(DecommitGate::new(value, nonce, commitments)))
    }

    /// Build the next slice of accumulation gates
    fn accumulate_gates(&mut self) -> Vec<MacCheckGate> {
        let mut gates = Vec::new();
        while gates.len() < self.batch_size && self.next_record < self.records.len() {
            let end = (self.next_record + self.accumulate_chunk_size).min(self.records.len());
            let chunk = self.records[self.next_record..end].to_vec();
            gates.push(MacCheckGate::Accumulate(AccumulateGate::new(chunk, self.combiner)));
            self.next_record = end;
        }

        gates
    }

    /// Fold the output of an accumulation gate into the check value
    fn fold_chunk(&mut self, gate: MacCheckGate) -> Result<(), SpdzError> {
        let (h, power) = match gate {
            MacCheckGate::Accumulate(gate) => gate.output(),
            _ => None,
        }
        .ok_or_else(|| {
            SpdzError::Setup(format!("MAC check #{}: expected an accumulation gate", self.check))
        })?;

        self.sigma = self.modulus.add(&self.modulus.mul(&self.sigma, &power), &h);
        Ok(())
    }

    /// Take the single gate of a commit-reveal slice
    fn single_gate(mut gates: Vec<MacCheckGate>) -> Result<MacCheckGate, SpdzError> {
        match (gates.pop(), gates.is_empty()) {
            (Some(gate), true) => Ok(gate),
            _ => Err(SpdzError::Setup("expected exactly one MAC check gate".to_string())),
        }
    }
}
