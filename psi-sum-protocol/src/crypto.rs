//! Hashing and blinding operations for the PSI-Sum protocol.

use crate::group::{GroupElement, GroupParameters};
use num_bigint_dig::{BigUint, RandBigInt};
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Hash a byte array to a 32-byte SHA-256 digest.
///
/// # Arguments
/// * `input` - Input bytes to hash
///
/// # Returns
/// The 32-byte digest
pub fn hash_bytes(input: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Map an identifier to a nonzero group element.
///
/// The digest is read as a big-endian integer and reduced modulo `p`. A zero
/// residue is mapped to `1`, since zero would absorb every blinding.
///
/// # Arguments
/// * `identifier` - Identifier bytes
/// * `params` - Shared group parameters
///
/// # Returns
/// A group element in `[1, p-1]`
pub fn hash_to_group(identifier: &[u8], params: &GroupParameters) -> GroupElement {
    let digest = hash_bytes(identifier);
    let reduced = BigUint::from_bytes_be(&digest) % params.p();
    if reduced.is_zero() {
        GroupElement::new(BigUint::one())
    } else {
        GroupElement::new(reduced)
    }
}

/// Hash many identifiers to group elements, preserving order.
pub fn hash_identifiers(identifiers: &[Vec<u8>], params: &GroupParameters) -> Vec<GroupElement> {
    identifiers
        .par_iter()
        .map(|identifier| hash_to_group(identifier, params))
        .collect()
}

/// A party's secret blinding exponent, sampled from `[1, p-1)`.
///
/// The exponent is wiped from memory when dropped and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct BlindingExponent(BigUint);

impl BlindingExponent {
    /// Sample a fresh exponent uniformly from `[1, p-1)` using `OsRng`.
    pub fn random(params: &GroupParameters) -> Self {
        let mut rng = OsRng;
        let upper = params.p() - BigUint::one();
        Self(rng.gen_biguint_range(&BigUint::one(), &upper))
    }

    #[cfg(test)]
    pub(crate) fn from_biguint(value: BigUint) -> Self {
        Self(value)
    }
}

impl fmt::Debug for BlindingExponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingExponent(<redacted>)")
    }
}

/// Blind a group element by raising it to a secret exponent.
///
/// # Arguments
/// * `element` - The element to blind
/// * `exponent` - The secret exponent
/// * `params` - Shared group parameters
///
/// # Returns
/// `element^exponent mod p`
pub fn blind(
    element: &GroupElement,
    exponent: &BlindingExponent,
    params: &GroupParameters,
) -> GroupElement {
    GroupElement::new(element.as_biguint().modpow(&exponent.0, params.p()))
}

/// Blind many elements with the same exponent, preserving order.
pub fn blind_all(
    elements: &[GroupElement],
    exponent: &BlindingExponent,
    params: &GroupParameters,
) -> Vec<GroupElement> {
    elements
        .par_iter()
        .map(|element| blind(element, exponent, params))
        .collect()
}
