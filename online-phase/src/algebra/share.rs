//! Defines the maliciously secure secret sharing primitive

use crate::{network::PartyId, PARTY0};

use super::{FieldElement, Modulus};

/// A type holding both an additive share and a share of its MAC
///
/// Summed over all parties, `mac = key * value` where `key` is the global
/// MAC key
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct AuthenticatedShare {
    /// The share
    share: FieldElement,
    /// The mac
    mac: FieldElement,
}

impl AuthenticatedShare {
    /// Constructor
    pub fn new(share: FieldElement, mac: FieldElement) -> Self {
        Self { share, mac }
    }

    /// Get the share
    pub fn share(&self) -> FieldElement {
        self.share
    }

    /// Get the mac
    pub fn mac(&self) -> FieldElement {
        self.mac
    }

    // --------------
    // | Arithmetic |
    // --------------

    /// Add two shared values
    pub fn add(&self, rhs: &Self, modulus: &Modulus) -> Self {
        Self::new(modulus.add(&self.share, &rhs.share), modulus.add(&self.mac, &rhs.mac))
    }

    /// Subtract a shared value
    pub fn sub(&self, rhs: &Self, modulus: &Modulus) -> Self {
        Self::new(modulus.sub(&self.share, &rhs.share), modulus.sub(&self.mac, &rhs.mac))
    }

    /// Add a public value to a shared value
    ///
    /// Only the first party shifts its share, every party shifts its MAC by
    /// its key share times the constant
    pub fn add_public(
        &self,
        rhs: &FieldElement,
        mac_key_share: &FieldElement,
        party_id: PartyId,
        modulus: &Modulus,
    ) -> Self {
        let share = if party_id == PARTY0 { modulus.add(&self.share, rhs) } else { self.share };
        let mac = modulus.add(&self.mac, &modulus.mul(mac_key_share, rhs));

        Self::new(share, mac)
    }

    /// Multiply a shared value by a public value
    pub fn mul_public(&self, rhs: &FieldElement, modulus: &Modulus) -> Self {
        Self::new(modulus.mul(&self.share, rhs), modulus.mul(&self.mac, rhs))
    }
}

#[cfg(test)]
mod test {
    use itertools::Itertools;
    use rand::thread_rng;

    use crate::test_helpers::{deal_mac_key, open_shares, share_value};

    use super::*;

    /// Tests that linear operations keep MACs consistent
    #[test]
    fn test_linear_operations() {
        const N_PARTIES: usize = 3;
        let mut rng = thread_rng();
        let modulus = Modulus::default();
        let (key, key_shares) = deal_mac_key(N_PARTIES, &modulus, &mut rng);

        let a = modulus.random(&mut rng);
        let b = modulus.random(&mut rng);
        let c = modulus.random(&mut rng);
        let a_shares = share_value(a, key, N_PARTIES, &modulus, &mut rng);
        let b_shares = share_value(b, key, N_PARTIES, &modulus, &mut rng);

        // (a + b) * c - b + c
        let res = a_shares
            .iter()
            .zip(b_shares.iter())
            .enumerate()
            .map(|(party, (a, b))| {
                a.add(b, &modulus)
                    .mul_public(&c, &modulus)
                    .sub(b, &modulus)
                    .add_public(&c, &key_shares[party], party, &modulus)
            })
            .collect_vec();

        let expected = modulus.add(
            &modulus.sub(&modulus.mul(&modulus.add(&a, &b), &c), &b),
            &c,
        );
        let (value, mac) = open_shares(&res, &modulus);
        assert_eq!(value, expected);
        assert_eq!(mac, modulus.mul(&key, &expected));
    }
}
