//! Message types exchanged between PSI-Sum protocol parties.
//!
//! All messages are plain serde-serializable structs; the embedding
//! application picks the encoding and transport.

use crate::group::GroupElement;
use crate::paillier::Ciphertext;
use num_bigint_dig::BigUint;
use serde::{Deserialize, Serialize};

/// Round 1, receiver → sender.
///
/// Each entry pairs a raw identifier with `H(id)^k_A`. Identifiers travel in
/// the clear: this protocol variant reveals the receiver's identifiers to the
/// sender and only hides which of the sender's identifiers match. Entries are
/// in a random order unrelated to the receiver's dataset order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round1Message {
    /// Pairs of (identifier, blinded_element) for each receiver identifier
    pub items: Vec<(Vec<u8>, GroupElement)>,
}

impl Round1Message {
    /// Create a new round 1 message.
    pub fn new(items: Vec<(Vec<u8>, GroupElement)>) -> Self {
        Self { items }
    }

    /// Returns the number of items in this message.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if this message contains no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get just the blinded elements (without identifiers).
    pub fn blinded_elements(&self) -> Vec<GroupElement> {
        self.items.iter().map(|(_, element)| element.clone()).collect()
    }
}

/// Round 2, sender → receiver.
///
/// The two lists are shuffled independently, so position in one says nothing
/// about position in the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round2Message {
    /// `(H(w)^k_B, Enc(value))` for each sender record
    pub encrypted_pairs: Vec<(GroupElement, Ciphertext)>,
    /// `(H(v)^k_A)^k_B` for each receiver element, without identifiers
    pub double_blinded: Vec<GroupElement>,
}

impl Round2Message {
    /// Create a new round 2 message.
    pub fn new(
        encrypted_pairs: Vec<(GroupElement, Ciphertext)>,
        double_blinded: Vec<GroupElement>,
    ) -> Self {
        Self {
            encrypted_pairs,
            double_blinded,
        }
    }
}

/// What the receiver learns after round 3.
///
/// `sum_ciphertext` is `None` when nothing matched; otherwise it is the
/// homomorphic product of every matching ciphertext, which only the sender
/// can decrypt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntersectionResult {
    /// Number of sender records whose identifier the receiver also holds
    pub size: usize,
    /// Aggregate ciphertext of the matching values
    pub sum_ciphertext: Option<Ciphertext>,
}

impl IntersectionResult {
    /// Create a new intersection result.
    pub fn new(size: usize, sum_ciphertext: Option<Ciphertext>) -> Self {
        Self {
            size,
            sum_ciphertext,
        }
    }

    /// Returns true if the intersection is empty.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// Final output of a complete run: intersection size and cleartext sum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PsiSumOutput {
    /// Number of identifiers held by both parties (known to the receiver)
    pub intersection_size: usize,
    /// Sum of the sender's values over those identifiers (known to the sender)
    pub intersection_sum: BigUint,
}
