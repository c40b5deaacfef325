//! Defines a mock network for unit tests

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::MpcNetworkError;

use super::{MpcNetwork, NetworkOutbound, PartyId};

/// Counters describing the traffic a single party has seen
#[derive(Debug, Default)]
pub struct NetworkStats {
    /// The number of transport messages sent
    pub messages_sent: AtomicUsize,
    /// The number of payload bytes sent
    pub bytes_sent: AtomicUsize,
    /// The number of transport messages received
    pub messages_received: AtomicUsize,
    /// The number of payload bytes received
    pub bytes_received: AtomicUsize,
}

impl NetworkStats {
    /// Record an outbound message
    fn record_send(&self, message: &NetworkOutbound) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(message.payload_len(), Ordering::Relaxed);
    }

    /// Record an inbound message
    fn record_recv(&self, message: &NetworkOutbound) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(message.payload_len(), Ordering::Relaxed);
    }

    /// The number of transport messages sent so far
    pub fn sent(&self) -> usize {
        self.messages_sent.load(Ordering::Relaxed)
    }

    /// The number of transport messages received so far
    pub fn received(&self) -> usize {
        self.messages_received.load(Ordering::Relaxed)
    }
}

/// A dummy network implementation used for unit testing
///
/// Every pair of parties is connected by an unbounded channel in each
/// direction
pub struct MockNetwork {
    /// The ID of the local party
    party_id: PartyId,
    /// The send side of the channel to each party, `None` at the local index
    /// and once closed
    senders: Vec<Option<UnboundedSender<NetworkOutbound>>>,
    /// The receive side of the channel from each party, `None` at the local
    /// index
    receivers: Vec<Option<UnboundedReceiver<NetworkOutbound>>>,
    /// The traffic seen by the local party
    stats: Arc<NetworkStats>,
}

impl MockNetwork {
    /// Create a fully connected mesh of `n` parties, indexed by party ID
    pub fn new_mesh(n: usize) -> Vec<Self> {
        let mut senders: Vec<Vec<Option<UnboundedSender<NetworkOutbound>>>> =
            (0..n).map(|_| (0..n).map(|_| None).collect()).collect();
        let mut receivers: Vec<Vec<Option<UnboundedReceiver<NetworkOutbound>>>> =
            (0..n).map(|_| (0..n).map(|_| None).collect()).collect();

        for from in 0..n {
            for to in (0..n).filter(|to| *to != from) {
                let (send, recv) = unbounded_channel();
                senders[from][to] = Some(send);
                receivers[to][from] = Some(recv);
            }
        }

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(party_id, (senders, receivers))| Self {
                party_id,
                senders,
                receivers,
                stats: Arc::new(NetworkStats::default()),
            })
            .collect()
    }

    /// A handle to the traffic counters of the local party
    pub fn stats(&self) -> Arc<NetworkStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl MpcNetwork for MockNetwork {
    fn party_id(&self) -> PartyId {
        self.party_id
    }

    fn num_parties(&self) -> usize {
        self.senders.len()
    }

    async fn send_to(
        &mut self,
        party: PartyId,
        message: NetworkOutbound,
    ) -> Result<(), MpcNetworkError> {
        if party >= self.senders.len() || party == self.party_id {
            return Err(MpcNetworkError::UnknownParty(party));
        }

        let sender = self.senders[party].as_ref().ok_or(MpcNetworkError::ConnectionClosed)?;
        self.stats.record_send(&message);
        sender.send(message).map_err(|e| MpcNetworkError::SendError(e.to_string()))
    }

    async fn recv_from(&mut self, party: PartyId) -> Result<NetworkOutbound, MpcNetworkError> {
        let receiver = self
            .receivers
            .get_mut(party)
            .and_then(Option::as_mut)
            .ok_or(MpcNetworkError::UnknownParty(party))?;

        let message = receiver
            .recv()
            .await
            .ok_or_else(|| MpcNetworkError::RecvError("stream finished early".to_string()))?;
        self.stats.record_recv(&message);

        Ok(message)
    }

    async fn close(&mut self) -> Result<(), MpcNetworkError> {
        self.senders.iter_mut().for_each(|s| *s = None);
        Ok(())
    }
}
