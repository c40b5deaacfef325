//! The per-party resources of one computation

use rand::{rngs::StdRng, SeedableRng};
use zeroize::Zeroize;

use crate::{
    algebra::{FieldElement, Modulus},
    error::SpdzError,
    network::PartyId,
};

/// Holds the local party's identity, the public modulus, the party's share
/// of the MAC key and a cryptographic random generator
///
/// The pool lives for one computation; the MAC key share is zeroized when it
/// is dropped
pub struct SpdzResourcePool {
    /// The local party's ID
    party_id: PartyId,
    /// The number of parties in the computation
    num_parties: usize,
    /// The field modulus
    modulus: Modulus,
    /// The local party's additive share of the global MAC key
    mac_key_share: FieldElement,
    /// The random generator used for the local party's coins
    rng: StdRng,
}

impl SpdzResourcePool {
    /// Constructor, seeds the random generator from the operating system
    pub fn new(
        party_id: PartyId,
        num_parties: usize,
        modulus: Modulus,
        mac_key_share: FieldElement,
    ) -> Result<Self, SpdzError> {
        Self::with_rng(party_id, num_parties, modulus, mac_key_share, StdRng::from_entropy())
    }

    /// Constructor with an explicit random generator
    pub fn with_rng(
        party_id: PartyId,
        num_parties: usize,
        modulus: Modulus,
        mac_key_share: FieldElement,
        rng: StdRng,
    ) -> Result<Self, SpdzError> {
        if num_parties < 2 {
            return Err(SpdzError::Setup(format!("need at least 2 parties, got {num_parties}")));
        }
        if party_id >= num_parties {
            return Err(SpdzError::Setup(format!(
                "party id {party_id} out of range for {num_parties} parties"
            )));
        }
        if mac_key_share >= modulus.value() {
            return Err(SpdzError::Setup("MAC key share is not reduced".to_string()));
        }

        Ok(Self { party_id, num_parties, modulus, mac_key_share, rng })
    }

    /// The local party's ID
    pub fn party_id(&self) -> PartyId {
        self.party_id
    }

    /// The number of parties in the computation
    pub fn num_parties(&self) -> usize {
        self.num_parties
    }

    /// The field modulus
    pub fn modulus(&self) -> &Modulus {
        &self.modulus
    }

    /// The local party's share of the MAC key
    pub fn mac_key_share(&self) -> &FieldElement {
        &self.mac_key_share
    }

    /// The local party's random generator
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}

impl Drop for SpdzResourcePool {
    fn drop(&mut self) {
        self.mac_key_share.zeroize();
    }
}
