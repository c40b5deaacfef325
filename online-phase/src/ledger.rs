//! The ledger of opened values awaiting MAC verification
//!
//! The ledger is owned by the party's evaluator and lent mutably to one gate
//! at a time, so a single writer is enforced by the borrow checker. A MAC
//! check takes ownership of the pending records by draining the ledger

use crate::algebra::FieldElement;

/// A publicly reconstructed value together with the local party's claimed
/// share of its MAC
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OpenedValue {
    /// The reconstructed value
    pub value: FieldElement,
    /// The local party's share of the MAC on `value`
    pub mac_share: FieldElement,
}

/// An append-only buffer of opened values that have not yet been verified
#[derive(Debug, Default)]
pub struct OpenedValueLedger {
    /// The pending records, in the order they were opened
    records: Vec<OpenedValue>,
}

impl OpenedValueLedger {
    /// Constructor
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an opened value and the local MAC share claimed for it
    pub fn append(&mut self, value: FieldElement, mac_share: FieldElement) {
        self.records.push(OpenedValue { value, mac_share });
    }

    /// Whether there are no unverified values
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The number of unverified values
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Take all pending records, leaving the ledger empty
    pub fn drain(&mut self) -> Vec<OpenedValue> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Tests that draining returns records in order and empties the ledger
    #[test]
    fn test_drain() {
        let mut ledger = OpenedValueLedger::new();
        assert!(ledger.is_empty());

        ledger.append(FieldElement::from(1u64), FieldElement::from(2u64));
        ledger.append(FieldElement::from(3u64), FieldElement::from(4u64));
        assert_eq!(ledger.len(), 2);

        let records = ledger.drain();
        assert!(ledger.is_empty());
        assert_eq!(records[0].value, FieldElement::from(1u64));
        assert_eq!(records[1].mac_share, FieldElement::from(4u64));

        assert!(ledger.drain().is_empty());
    }
}
