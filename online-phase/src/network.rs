//! The `network` module defines abstractions of the transport used to
//! communicate during the course of an MPC
mod batch;
#[cfg(any(feature = "test_helpers", test))]
mod mock;

pub use batch::NetworkBatchDecorator;
#[cfg(any(feature = "test_helpers", test))]
pub use mock::{MockNetwork, NetworkStats};

use std::fmt::{Display, Formatter, Result as FmtResult};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MpcNetworkError;

/// A type alias of the id of a party in an MPC for readability
pub type PartyId = usize;

// ---------
// | Trait |
// ---------

/// The stage of the evaluation a message was produced in
///
/// Every party tags its messages with the stage it believes it is in, a
/// receiver that disagrees has diverged from the sender's schedule
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundPhase {
    /// A batch of circuit gates, numbered from zero
    Circuit {
        /// The index of the batch
        batch: u64,
    },
    /// A MAC check, numbered from zero
    MacCheck {
        /// The index of the check
        check: u64,
    },
}

impl Display for RoundPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RoundPhase::Circuit { batch } => write!(f, "circuit batch #{batch}"),
            RoundPhase::MacCheck { check } => write!(f, "MAC check #{check}"),
        }
    }
}

/// The unit of transport: all messages one party sends another in a round
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOutbound {
    /// The stage the sender was in
    pub phase: RoundPhase,
    /// The individual messages, in the order they were sent
    pub messages: Vec<Vec<u8>>,
}

impl NetworkOutbound {
    /// The number of payload bytes carried
    pub fn payload_len(&self) -> usize {
        self.messages.iter().map(Vec::len).sum()
    }
}

/// The `MpcNetwork` trait defines shared functionality for a network
/// connecting all parties of an MPC point to point
///
/// Delivery is reliable and ordered per pair of parties; timeouts are the
/// implementation's concern and surface as errors
#[async_trait]
pub trait MpcNetwork: Send {
    /// Get the party ID of the local party in the MPC
    fn party_id(&self) -> PartyId;
    /// Get the number of parties in the MPC
    fn num_parties(&self) -> usize;
    /// Send a message to the given party
    async fn send_to(
        &mut self,
        party: PartyId,
        message: NetworkOutbound,
    ) -> Result<(), MpcNetworkError>;
    /// Receive the next message from the given party
    async fn recv_from(&mut self, party: PartyId) -> Result<NetworkOutbound, MpcNetworkError>;
    /// Closes the connections to all parties
    async fn close(&mut self) -> Result<(), MpcNetworkError>;
}
