//! A decorator over a network that groups the many small messages produced
//! in one round into a single transport message per peer

use std::collections::VecDeque;

use crate::error::SpdzError;

use super::{MpcNetwork, NetworkOutbound, PartyId, RoundPhase};

/// Buffers the messages of a round and ships them to each peer in one
/// `NetworkOutbound`
///
/// Messages sent in one round are received in the next. Message boundaries
/// and per-party ordering are preserved
pub struct NetworkBatchDecorator<'a> {
    /// The underlying transport
    network: &'a mut dyn MpcNetwork,
    /// The phase every outbound message is tagged with, and every inbound
    /// message must carry
    phase: RoundPhase,
    /// The messages queued for each party in the current round
    outbox: Vec<Vec<Vec<u8>>>,
    /// The messages received from each party for the current round, not yet
    /// consumed
    inbox: Vec<VecDeque<Vec<u8>>>,
    /// Whether the current round's batch has been fetched from each party
    fetched: Vec<bool>,
}

impl<'a> NetworkBatchDecorator<'a> {
    /// Wrap a network for the duration of one phase
    pub fn new(network: &'a mut dyn MpcNetwork, phase: RoundPhase) -> Self {
        let n = network.num_parties();
        Self {
            network,
            phase,
            outbox: vec![Vec::new(); n],
            inbox: vec![VecDeque::new(); n],
            fetched: vec![false; n],
        }
    }

    /// The local party's ID
    pub fn party_id(&self) -> PartyId {
        self.network.party_id()
    }

    /// The number of parties in the MPC
    pub fn num_parties(&self) -> usize {
        self.outbox.len()
    }

    /// The phase this decorator tags messages with
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// The IDs of all parties other than the local one
    pub fn peers(&self) -> impl Iterator<Item = PartyId> {
        let me = self.party_id();
        (0..self.num_parties()).filter(move |p| *p != me)
    }

    /// Queue a message for the given party, delivered at the end of the round
    pub fn send(&mut self, party: PartyId, payload: Vec<u8>) -> Result<(), SpdzError> {
        if party >= self.num_parties() || party == self.party_id() {
            return Err(SpdzError::Setup(format!("cannot send to party {party}")));
        }

        self.outbox[party].push(payload);
        Ok(())
    }

    /// Queue a message for every other party
    pub fn broadcast(&mut self, payload: Vec<u8>) {
        let me = self.party_id();
        for (_, outbox) in self.outbox.iter_mut().enumerate().filter(|(p, _)| *p != me) {
            outbox.push(payload.clone());
        }
    }

    /// Receive the next message the given party sent in the previous round
    ///
    /// The first receive from a party in a round fetches that party's whole
    /// batch from the transport
    pub async fn receive(&mut self, party: PartyId) -> Result<Vec<u8>, SpdzError> {
        if party >= self.num_parties() || party == self.party_id() {
            return Err(SpdzError::Setup(format!("cannot receive from party {party}")));
        }

        if !self.fetched[party] {
            let batch = self.network.recv_from(party).await?;
            if batch.phase != self.phase {
                return Err(SpdzError::Desynchronized(format!(
                    "party {party} sent a message for {}, expected {}",
                    batch.phase, self.phase
                )));
            }

            self.inbox[party].extend(batch.messages);
            self.fetched[party] = true;
        }

        self.inbox[party].pop_front().ok_or_else(|| {
            SpdzError::Desynchronized(format!(
                "party {party} sent fewer messages than expected in {}",
                self.phase
            ))
        })
    }

    /// Ship the queued messages, one transport message per peer that has
    /// messages queued
    pub async fn flush(&mut self) -> Result<(), SpdzError> {
        for party in 0..self.outbox.len() {
            if self.outbox[party].is_empty() {
                continue;
            }

            let messages = std::mem::take(&mut self.outbox[party]);
            self.network.send_to(party, NetworkOutbound { phase: self.phase, messages }).await?;
        }

        Ok(())
    }

    /// Close the current round, every fetched message must have been consumed
    pub fn end_round(&mut self) -> Result<(), SpdzError> {
        self.fetched.iter_mut().for_each(|f| *f = false);

        let mut res = Ok(());
        for (party, inbox) in self.inbox.iter_mut().enumerate() {
            if !inbox.is_empty() && res.is_ok() {
                res = Err(SpdzError::Desynchronized(format!(
                    "party {party} sent {} more messages than expected in {}",
                    inbox.len(),
                    self.phase
                )));
            }
            inbox.clear();
        }

        res
    }
}

#[cfg(test)]
mod test {
    use crate::{
        error::SpdzError,
        network::{MockNetwork, MpcNetwork, RoundPhase},
        PARTY0, PARTY1,
    };

    use super::NetworkBatchDecorator;

    /// The phase used by the tests
    const PHASE: RoundPhase = RoundPhase::Circuit { batch: 7 };

    /// Tests that many messages in a round travel as one transport message
    #[tokio::test]
    async fn test_round_batching() {
        let mut mesh = MockNetwork::new_mesh(2);
        let mut net1 = mesh.pop().unwrap();
        let mut net0 = mesh.pop().unwrap();
        let stats0 = net0.stats();

        let mut sender = NetworkBatchDecorator::new(&mut net0, PHASE);
        sender.send(PARTY1, b"first".to_vec()).unwrap();
        sender.broadcast(b"second".to_vec());
        sender.send(PARTY1, Vec::new()).unwrap();
        sender.flush().await.unwrap();
        sender.end_round().unwrap();
        assert_eq!(stats0.sent(), 1);

        let mut receiver = NetworkBatchDecorator::new(&mut net1, PHASE);
        assert_eq!(receiver.receive(PARTY0).await.unwrap(), b"first".to_vec());
        assert_eq!(receiver.receive(PARTY0).await.unwrap(), b"second".to_vec());
        assert_eq!(receiver.receive(PARTY0).await.unwrap(), Vec::<u8>::new());
        receiver.end_round().unwrap();

        // Flushing an empty round sends nothing
        receiver.flush().await.unwrap();
        assert_eq!(net1.stats().sent(), 0);
    }

    /// Tests that a batch tagged with another phase is rejected
    #[tokio::test]
    async fn test_phase_mismatch() {
        let mut mesh = MockNetwork::new_mesh(2);
        let mut net1 = mesh.pop().unwrap();
        let mut net0 = mesh.pop().unwrap();

        let mut sender = NetworkBatchDecorator::new(&mut net0, RoundPhase::MacCheck { check: 0 });
        sender.broadcast(vec![1, 2, 3]);
        sender.flush().await.unwrap();

        let mut receiver = NetworkBatchDecorator::new(&mut net1, PHASE);
        let res = receiver.receive(PARTY0).await;
        assert!(matches!(res, Err(SpdzError::Desynchronized(_))));
    }

    /// Tests that unconsumed and missing messages are detected
    #[tokio::test]
    async fn test_message_count_mismatch() {
        let mut mesh = MockNetwork::new_mesh(2);
        let mut net1 = mesh.pop().unwrap();
        let mut net0 = mesh.pop().unwrap();

        let mut sender = NetworkBatchDecorator::new(&mut net0, PHASE);
        sender.broadcast(vec![1]);
        sender.broadcast(vec![2]);
        sender.flush().await.unwrap();
        sender.broadcast(vec![3]);
        sender.flush().await.unwrap();

        let mut receiver = NetworkBatchDecorator::new(&mut net1, PHASE);
        receiver.receive(PARTY0).await.unwrap();
        assert!(matches!(receiver.end_round(), Err(SpdzError::Desynchronized(_))));

        receiver.receive(PARTY0).await.unwrap();
        assert!(matches!(receiver.receive(PARTY0).await, Err(SpdzError::Desynchronized(_))));

        assert!(receiver.send(PARTY1, vec![]).is_err());
        net0.close().await.unwrap();
    }
}
