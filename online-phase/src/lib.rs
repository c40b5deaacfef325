#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

//! Defines the online phase of a SPDZ style MPC: gates are evaluated in
//! bounded batches, every publicly opened value is recorded, and the
//! recorded values are periodically verified in bulk against the parties'
//! shares of a global MAC key
//!
//! The [`round_sync`] controller decides when a MAC check runs; no output is
//! revealed while older opened values remain unverified

pub mod algebra;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod ledger;
pub mod mac_check;
pub mod network;
pub mod resource_pool;
pub mod round_sync;

// -------------
// | Constants |
// -------------

/// The first party
pub const PARTY0: usize = 0;
/// The second party
pub const PARTY1: usize = 1;

#[cfg(any(test, feature = "test_helpers"))]
pub mod test_helpers {
    //! Defines test helpers for use in unit and integration tests, as well as
    //! benchmarks
    use futures::{future, Future};
    use itertools::Itertools;
    use rand::{thread_rng, CryptoRng, RngCore};

    use crate::{
        algebra::{AuthenticatedShare, FieldElement, Modulus},
        ledger::OpenedValue,
        network::{MockNetwork, PartyId},
    };

    /// Sample a MAC key and split it into additive shares
    pub fn deal_mac_key<R: RngCore + CryptoRng>(
        n_parties: usize,
        modulus: &Modulus,
        rng: &mut R,
    ) -> (FieldElement, Vec<FieldElement>) {
        let key = modulus.random(rng);
        (key, additive_shares(key, n_parties, modulus, rng))
    }

    /// Split a value into authenticated shares under the given MAC key
    pub fn share_value<R: RngCore + CryptoRng>(
        value: FieldElement,
        key: FieldElement,
        n_parties: usize,
        modulus: &Modulus,
        rng: &mut R,
    ) -> Vec<AuthenticatedShare> {
        let shares = additive_shares(value, n_parties, modulus, rng);
        let macs = additive_shares(modulus.mul(&key, &value), n_parties, modulus, rng);

        shares.into_iter().zip(macs).map(|(s, m)| AuthenticatedShare::new(s, m)).collect_vec()
    }

    /// Reconstruct a value and its MAC from all parties' shares
    pub fn open_shares(
        shares: &[AuthenticatedShare],
        modulus: &Modulus,
    ) -> (FieldElement, FieldElement) {
        let value = modulus.sum(shares.iter().map(|s| s.share()).collect_vec().iter());
        let mac = modulus.sum(shares.iter().map(|s| s.mac()).collect_vec().iter());

        (value, mac)
    }

    /// Deal a MAC key and `n_values` consistently opened values, returning
    /// each party's key share and opening records
    pub fn deal_opened_values(
        n_values: usize,
        n_parties: usize,
        modulus: &Modulus,
    ) -> Vec<(FieldElement, Vec<OpenedValue>)> {
        let mut rng = thread_rng();
        let (key, key_shares) = deal_mac_key(n_parties, modulus, &mut rng);
        let shared = (0..n_values)
            .map(|_| share_value(modulus.random(&mut rng), key, n_parties, modulus, &mut rng))
            .collect_vec();

        key_shares
            .into_iter()
            .enumerate()
            .map(|(party, key_share)| {
                let records = shared
                    .iter()
                    .map(|s| OpenedValue {
                        value: open_shares(s, modulus).0,
                        mac_share: s[party].mac(),
                    })
                    .collect_vec();
                (key_share, records)
            })
            .collect_vec()
    }

    /// Split a value into uniformly random additive shares
    fn additive_shares<R: RngCore + CryptoRng>(
        value: FieldElement,
        n_parties: usize,
        modulus: &Modulus,
        rng: &mut R,
    ) -> Vec<FieldElement> {
        let mut shares = (1..n_parties).map(|_| modulus.random(rng)).collect_vec();
        let first = modulus.sub(&value, &modulus.sum(shares.iter()));
        shares.insert(0, first);

        shares
    }

    /// Run a mock MPC over a fully connected mesh of `n_parties` parties
    ///
    /// This will spawn one task per party, each given its party ID and its
    /// end of the mesh
    ///
    /// Returns the outputs of all parties, indexed by party ID
    pub async fn execute_mock_mpc<T, S, F>(n_parties: usize, mut f: F) -> Vec<T>
    where
        T: Send + 'static,
        S: Future<Output = T> + Send + 'static,
        F: FnMut(PartyId, MockNetwork) -> S,
    {
        let tasks = MockNetwork::new_mesh(n_parties)
            .into_iter()
            .enumerate()
            .map(|(party_id, network)| tokio::spawn(f(party_id, network)))
            .collect_vec();

        future::join_all(tasks).await.into_iter().map(|res| res.unwrap()).collect_vec()
    }
}
