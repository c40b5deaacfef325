//! Hash commitments to field elements

use rand::RngCore;
use sha3::{Digest, Sha3_256};

use crate::{algebra::FieldElement, error::EncodingError};

/// The number of bytes in a commitment nonce
pub const NONCE_BYTES: usize = 32;
/// The number of bytes in a commitment
pub const COMMITMENT_BYTES: usize = 32;

/// A hiding, binding commitment to a field element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Commitment([u8; COMMITMENT_BYTES]);

impl Commitment {
    /// Commit to a value under the given nonce
    pub fn commit(value: &FieldElement, nonce: &[u8; NONCE_BYTES]) -> Self {
        let mut hasher = Sha3_256::new();
        hasher.update(value.to_bytes_be());
        hasher.update(nonce);

        let mut digest = [0u8; COMMITMENT_BYTES];
        digest.copy_from_slice(&hasher.finalize());
        Self(digest)
    }

    /// Check that a value and nonce open the commitment
    pub fn verify(&self, value: &FieldElement, nonce: &[u8; NONCE_BYTES]) -> bool {
        Self::commit(value, nonce) == *self
    }

    /// Parse a commitment received from the network
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EncodingError> {
        let digest: [u8; COMMITMENT_BYTES] = bytes.try_into().map_err(|_| {
            EncodingError::InvalidLength { expected: COMMITMENT_BYTES, actual: bytes.len() }
        })?;

        Ok(Self(digest))
    }

    /// The bytes of the commitment
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

/// Sample a fresh commitment nonce
pub fn random_nonce<R: RngCore>(rng: &mut R) -> [u8; NONCE_BYTES] {
    let mut nonce = [0u8; NONCE_BYTES];
    rng.fill_bytes(&mut nonce);
    nonce
}
