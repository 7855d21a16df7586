//! Multiplicative group parameters used for commutative blinding.
//!
//! Both parties share one `(p, g)` pair for the lifetime of a protocol run.
//! Blinding raises identifier hashes to secret exponents modulo `p`; because
//! exponentiation commutes, `(h^a)^b = (h^b)^a` and two parties reach the same
//! double-blinded value without exchanging exponents.

use crate::error::{PsiError, Result};
use num_bigint_dig::prime::probably_prime;
use num_bigint_dig::{BigUint, RandPrime};
use num_traits::One;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Smallest accepted bit length for the group modulus.
pub const MIN_GROUP_BITS: usize = 32;

/// Largest candidate tried when searching for a generator.
pub const GENERATOR_SEARCH_BOUND: u32 = 10_000;

/// Miller-Rabin rounds used when validating an externally supplied modulus.
const PRIMALITY_ROUNDS: usize = 20;

/// Shared group parameters `(p, g)`.
///
/// Instances are only built through [`GroupParameters::generate`] or
/// [`GroupParameters::from_parts`], both of which check the generator
/// conditions; deserialization goes through the same checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGroupParameters", into = "RawGroupParameters")]
pub struct GroupParameters {
    p: BigUint,
    g: BigUint,
}

#[derive(Serialize, Deserialize)]
struct RawGroupParameters {
    p: BigUint,
    g: BigUint,
}

impl TryFrom<RawGroupParameters> for GroupParameters {
    type Error = PsiError;

    fn try_from(raw: RawGroupParameters) -> Result<Self> {
        GroupParameters::from_parts(raw.p, raw.g)
    }
}

impl From<GroupParameters> for RawGroupParameters {
    fn from(params: GroupParameters) -> Self {
        Self {
            p: params.p,
            g: params.g,
        }
    }
}

impl GroupParameters {
    /// Sample a fresh `bits`-bit prime `p` and the smallest suitable generator.
    ///
    /// # Errors
    /// Returns `PsiError::Setup` if `bits` is below [`MIN_GROUP_BITS`] or no
    /// generator exists below [`GENERATOR_SEARCH_BOUND`]. The caller should
    /// retry, which re-samples `p`.
    pub fn generate(bits: usize) -> Result<Self> {
        if bits < MIN_GROUP_BITS {
            return Err(PsiError::Setup(format!(
                "group modulus must have at least {} bits, got {}",
                MIN_GROUP_BITS, bits
            )));
        }

        let mut rng = OsRng;
        let p = rng.gen_prime(bits);
        let g = find_generator(&p)?;
        debug!(bits, generator = %g, "generated group parameters");

        Ok(Self { p, g })
    }

    /// Build parameters from a known modulus and generator.
    ///
    /// # Errors
    /// Returns `PsiError::Setup` if `p` is not (probably) prime or `g` fails
    /// the generator conditions.
    pub fn from_parts(p: BigUint, g: BigUint) -> Result<Self> {
        if p.bits() < MIN_GROUP_BITS {
            return Err(PsiError::Setup(format!(
                "group modulus must have at least {} bits, got {}",
                MIN_GROUP_BITS,
                p.bits()
            )));
        }
        if !probably_prime(&p, PRIMALITY_ROUNDS) {
            return Err(PsiError::Setup("group modulus is not prime".to_string()));
        }
        if g < BigUint::from(2u32) || g >= p || !is_generator(&g, &p) {
            return Err(PsiError::Setup(format!(
                "{} does not generate a large subgroup",
                g
            )));
        }

        Ok(Self { p, g })
    }

    /// The prime modulus.
    pub fn p(&self) -> &BigUint {
        &self.p
    }

    /// The generator.
    pub fn g(&self) -> &BigUint {
        &self.g
    }

    /// Bit length of the modulus.
    pub fn bits(&self) -> usize {
        self.p.bits()
    }

    /// Whether `value` lies in `[1, p-1]`.
    pub fn contains(&self, value: &BigUint) -> bool {
        !num_traits::Zero::is_zero(value) && value < &self.p
    }

    /// Check that a received element belongs to the group.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidGroupElement` if the element is `0` or `≥ p`.
    pub fn check(&self, element: &GroupElement) -> Result<()> {
        if self.contains(element.as_biguint()) {
            Ok(())
        } else {
            Err(PsiError::InvalidGroupElement(format!(
                "{} is outside [1, p-1]",
                element
            )))
        }
    }
}

/// Smallest `g ≥ 2` with `g^((p-1)/2) ≠ 1` and `g² ≠ 1` modulo `p`.
fn find_generator(p: &BigUint) -> Result<BigUint> {
    (2..=GENERATOR_SEARCH_BOUND)
        .map(BigUint::from)
        .take_while(|candidate| candidate < p)
        .find(|candidate| is_generator(candidate, p))
        .ok_or_else(|| {
            PsiError::Setup(format!(
                "no generator found below {}",
                GENERATOR_SEARCH_BOUND
            ))
        })
}

fn is_generator(g: &BigUint, p: &BigUint) -> bool {
    let one = BigUint::one();
    let half_order = (p - &one) >> 1usize;
    g.modpow(&half_order, p) != one && g.modpow(&BigUint::from(2u32), p) != one
}

/// An element of `[1, p-1]`: a hashed identifier or one of its blindings.
///
/// Construction does not check the range, since elements arrive from the
/// peer; parties validate them with [`GroupParameters::check`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupElement(BigUint);

impl GroupElement {
    /// Wrap a raw integer.
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    /// Borrow the underlying integer.
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Consume the element, returning the underlying integer.
    pub fn into_inner(self) -> BigUint {
        self.0
    }
}

impl From<BigUint> for GroupElement {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl fmt::Display for GroupElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}
