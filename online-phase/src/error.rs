//! Errors defined across the online phase
use std::{error::Error, fmt::Display};

use crate::network::PartyId;

/// The error type returned by every fallible operation in the online phase
///
/// None of these errors are recovered locally; any of them aborts the
/// evaluation for the local party
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SpdzError {
    /// The summed MAC check value of the given check was non-zero
    MacCheckFailed {
        /// The index of the failed check in the party's check sequence
        check: u64,
    },
    /// A party's decommitment did not open its commitment
    InvalidCommitment {
        /// The party that sent the bad decommitment
        party: PartyId,
    },
    /// The parties disagree on the position in the gate stream
    Desynchronized(String),
    /// An error in the underlying transport
    Network(MpcNetworkError),
    /// A malformed encoding was presented to a decoder
    Encoding(EncodingError),
    /// Invalid configuration or resource pool parameters
    Setup(String),
}

impl SpdzError {
    /// Whether the error indicates that an opened value failed authentication,
    /// as opposed to an I/O or scheduling fault
    pub fn is_verification_failure(&self) -> bool {
        matches!(self, SpdzError::MacCheckFailed { .. } | SpdzError::InvalidCommitment { .. })
    }
}

impl Display for SpdzError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpdzError::MacCheckFailed { check } => write!(f, "MAC check #{check} failed"),
            SpdzError::InvalidCommitment { party } => {
                write!(f, "party {party} sent a decommitment that does not match its commitment")
            },
            SpdzError::Desynchronized(e) => write!(f, "parties desynchronized: {e}"),
            SpdzError::Network(e) => write!(f, "network error: {e}"),
            SpdzError::Encoding(e) => write!(f, "encoding error: {e}"),
            SpdzError::Setup(e) => write!(f, "setup error: {e}"),
        }
    }
}
impl Error for SpdzError {}

impl From<MpcNetworkError> for SpdzError {
    fn from(e: MpcNetworkError) -> Self {
        SpdzError::Network(e)
    }
}

impl From<EncodingError> for SpdzError {
    fn from(e: EncodingError) -> Self {
        SpdzError::Encoding(e)
    }
}

/// Errors raised by a transport implementation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MpcNetworkError {
    /// Error sending a message
    SendError(String),
    /// Error receiving a message
    RecvError(String),
    /// A message was addressed to or expected from a party outside the MPC
    UnknownParty(PartyId),
    /// The connection has been closed
    ConnectionClosed,
}

impl Display for MpcNetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MpcNetworkError::SendError(e) => write!(f, "error sending message: {e}"),
            MpcNetworkError::RecvError(e) => write!(f, "error receiving message: {e}"),
            MpcNetworkError::UnknownParty(p) => write!(f, "unknown party: {p}"),
            MpcNetworkError::ConnectionClosed => write!(f, "connection closed"),
        }
    }
}
impl Error for MpcNetworkError {}

/// Errors raised when decoding fixed-width values from bytes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EncodingError {
    /// The buffer does not have the expected length
    InvalidLength {
        /// The number of bytes the decoder accepts
        expected: usize,
        /// The number of bytes presented
        actual: usize,
    },
    /// The decoded value is not a canonical field element
    OutOfRange,
}

impl Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingError::InvalidLength { expected, actual } => {
                write!(f, "expected {expected} bytes, got {actual}")
            },
            EncodingError::OutOfRange => write!(f, "value is not reduced modulo the field modulus"),
        }
    }
}
impl Error for EncodingError {}

#[cfg(test)]
mod test {
    use super::*;

    /// Tests that verification failures are distinguishable from I/O failures
    #[test]
    fn test_verification_failure_classification() {
        assert!(SpdzError::MacCheckFailed { check: 0 }.is_verification_failure());
        assert!(SpdzError::InvalidCommitment { party: 1 }.is_verification_failure());

        let io: SpdzError = MpcNetworkError::ConnectionClosed.into();
        assert!(!io.is_verification_failure());
        assert!(!SpdzError::Desynchronized("batch 1 vs 2".to_string()).is_verification_failure());
    }
}
