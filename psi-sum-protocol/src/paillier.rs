//! Paillier additively homomorphic encryption.
//!
//! Only the sender ever holds a [`PaillierPrivateKey`]. The receiver gets the
//! [`PaillierPublicKey`] and uses it to multiply ciphertexts together, which
//! adds the underlying plaintexts without decrypting them.

use crate::error::{PsiError, Result};
use num_bigint_dig::prime::probably_prime;
use num_bigint_dig::{BigUint, ModInverse, RandBigInt, RandPrime, ToBigUint};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Smallest accepted bit length for each Paillier prime.
pub const MIN_PAILLIER_PRIME_BITS: usize = 16;

/// Attempts at drawing a second prime compatible with the first.
const KEYGEN_ATTEMPTS: usize = 64;

const PRIMALITY_ROUNDS: usize = 20;

/// A Paillier ciphertext, an integer in `[1, n²)` coprime to `n`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ciphertext(BigUint);

impl Ciphertext {
    /// Wrap a raw integer; use [`PaillierPublicKey::validate`] before trusting it.
    pub fn new(value: BigUint) -> Self {
        Self(value)
    }

    /// Get the underlying value (read-only)
    pub fn value(&self) -> &BigUint {
        &self.0
    }
}

/// Public key `(n, g = n + 1)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPublicKey", into = "RawPublicKey")]
pub struct PaillierPublicKey {
    n: BigUint,
    n_squared: BigUint,
    g: BigUint,
}

#[derive(Serialize, Deserialize)]
struct RawPublicKey {
    n: BigUint,
}

impl TryFrom<RawPublicKey> for PaillierPublicKey {
    type Error = PsiError;

    fn try_from(raw: RawPublicKey) -> Result<Self> {
        PaillierPublicKey::from_modulus(raw.n)
    }
}

impl From<PaillierPublicKey> for RawPublicKey {
    fn from(key: PaillierPublicKey) -> Self {
        Self { n: key.n }
    }
}

impl PaillierPublicKey {
    /// Rebuild a public key from its modulus.
    ///
    /// # Errors
    /// Returns `PsiError::Setup` if `n` is even or too small to be a product
    /// of two primes.
    pub fn from_modulus(n: BigUint) -> Result<Self> {
        if n.bits() < 2 * MIN_PAILLIER_PRIME_BITS - 1 || n.is_even() {
            return Err(PsiError::Setup(
                "Paillier modulus must be an odd product of two primes".to_string(),
            ));
        }
        let n_squared = &n * &n;
        let g = &n + BigUint::one();
        Ok(Self { n, n_squared, g })
    }

    /// The modulus `n`; plaintexts live in `[0, n)`.
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    /// The ciphertext modulus `n²`.
    pub fn n_squared(&self) -> &BigUint {
        &self.n_squared
    }

    /// The generator `g = n + 1`.
    pub fn g(&self) -> &BigUint {
        &self.g
    }

    /// Encrypt `m` under fresh randomness: `g^m · r^n mod n²`.
    ///
    /// # Errors
    /// Returns `PsiError::Range` if `m ≥ n`.
    pub fn encrypt(&self, m: &BigUint) -> Result<Ciphertext> {
        if m >= &self.n {
            return Err(PsiError::Range(format!(
                "plaintext needs {} bits but the modulus has {}",
                m.bits(),
                self.n.bits()
            )));
        }

        let r = self.random_unit();
        // (n + 1)^m = 1 + m·n (mod n²)
        let g_m = (BigUint::one() + m * &self.n) % &self.n_squared;
        let r_n = r.modpow(&self.n, &self.n_squared);
        Ok(Ciphertext((g_m * r_n) % &self.n_squared))
    }

    fn random_unit(&self) -> BigUint {
        let mut rng = OsRng;
        loop {
            let r = rng.gen_biguint_range(&BigUint::one(), &self.n);
            if r.gcd(&self.n).is_one() {
                return r;
            }
        }
    }

    /// Check that a ciphertext could have been produced under this key.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidCiphertext` if `c` is zero, `≥ n²`, or shares
    /// a factor with `n`.
    pub fn validate(&self, c: &Ciphertext) -> Result<()> {
        if c.0 >= self.n_squared {
            return Err(PsiError::InvalidCiphertext(
                "ciphertext is not below n²".to_string(),
            ));
        }
        if c.0.is_zero() || !c.0.gcd(&self.n).is_one() {
            return Err(PsiError::InvalidCiphertext(
                "ciphertext is not a unit modulo n".to_string(),
            ));
        }
        Ok(())
    }

    /// Homomorphic addition: `Dec(add(c1, c2)) = Dec(c1) + Dec(c2) mod n`.
    pub fn add(&self, c1: &Ciphertext, c2: &Ciphertext) -> Ciphertext {
        Ciphertext((&c1.0 * &c2.0) % &self.n_squared)
    }

    /// Fold [`add`](Self::add) over every ciphertext, or `None` if there are none.
    pub fn aggregate<'a, I>(&self, ciphertexts: I) -> Option<Ciphertext>
    where
        I: IntoIterator<Item = &'a Ciphertext>,
    {
        ciphertexts.into_iter().fold(None, |acc, c| match acc {
            None => Some(c.clone()),
            Some(sum) => Some(self.add(&sum, c)),
        })
    }
}

/// Private key `(λ, μ)`, wiped from memory when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PaillierPrivateKey {
    lambda: BigUint,
    mu: BigUint,
    n: BigUint,
    n_squared: BigUint,
}

impl PaillierPrivateKey {
    /// Decrypt `c`: `L(c^λ mod n²) · μ mod n` with `L(x) = (x - 1) / n`.
    ///
    /// The result is exact only while the true plaintext sum stays below `n`;
    /// larger sums wrap silently.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidCiphertext` for the same inputs that
    /// [`PaillierPublicKey::validate`] rejects.
    pub fn decrypt(&self, c: &Ciphertext) -> Result<BigUint> {
        if c.0 >= self.n_squared {
            return Err(PsiError::InvalidCiphertext(
                "ciphertext is not below n²".to_string(),
            ));
        }
        if c.0.is_zero() || !c.0.gcd(&self.n).is_one() {
            return Err(PsiError::InvalidCiphertext(
                "ciphertext is not a unit modulo n".to_string(),
            ));
        }

        let x = c.0.modpow(&self.lambda, &self.n_squared);
        let l = (x - BigUint::one()) / &self.n;
        Ok((l * &self.mu) % &self.n)
    }
}

impl fmt::Debug for PaillierPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaillierPrivateKey")
            .field("n_bits", &self.n.bits())
            .finish_non_exhaustive()
    }
}

/// A matched public/private key pair.
#[derive(Debug, Clone)]
pub struct PaillierKeyPair {
    public: PaillierPublicKey,
    private: PaillierPrivateKey,
}

impl PaillierKeyPair {
    /// Generate a key pair from two fresh `prime_bits`-bit primes.
    ///
    /// # Errors
    /// Returns `PsiError::Setup` if `prime_bits` is below
    /// [`MIN_PAILLIER_PRIME_BITS`] or no compatible second prime is found.
    pub fn generate(prime_bits: usize) -> Result<Self> {
        if prime_bits < MIN_PAILLIER_PRIME_BITS {
            return Err(PsiError::Setup(format!(
                "Paillier primes must have at least {} bits, got {}",
                MIN_PAILLIER_PRIME_BITS, prime_bits
            )));
        }

        let mut rng = OsRng;
        let p = rng.gen_prime(prime_bits);
        for _ in 0..KEYGEN_ATTEMPTS {
            let q = rng.gen_prime(prime_bits);
            match Self::from_primes(&p, &q) {
                Ok(pair) => return Ok(pair),
                Err(PsiError::Setup(reason)) => {
                    tracing::debug!(%reason, "discarding Paillier prime candidate");
                }
                Err(e) => return Err(e),
            }
        }

        Err(PsiError::Setup(
            "could not find a compatible pair of Paillier primes".to_string(),
        ))
    }

    /// Derive a key pair from two known primes.
    ///
    /// # Errors
    /// Returns `PsiError::Setup` if the primes are equal, composite, too small,
    /// or `gcd(n, (p-1)(q-1)) ≠ 1`, or if `μ` does not exist.
    pub fn from_primes(p: &BigUint, q: &BigUint) -> Result<Self> {
        if p == q {
            return Err(PsiError::Setup("Paillier primes must differ".to_string()));
        }
        if p.bits() < MIN_PAILLIER_PRIME_BITS || q.bits() < MIN_PAILLIER_PRIME_BITS {
            return Err(PsiError::Setup(format!(
                "Paillier primes must have at least {} bits",
                MIN_PAILLIER_PRIME_BITS
            )));
        }
        if !probably_prime(p, PRIMALITY_ROUNDS) || !probably_prime(q, PRIMALITY_ROUNDS) {
            return Err(PsiError::Setup("Paillier factor is not prime".to_string()));
        }

        let one = BigUint::one();
        let p_minus_one = p - &one;
        let q_minus_one = q - &one;
        let n = p * q;
        if !n.gcd(&(&p_minus_one * &q_minus_one)).is_one() {
            return Err(PsiError::Setup(
                "gcd(n, (p-1)(q-1)) must be 1".to_string(),
            ));
        }

        let public = PaillierPublicKey::from_modulus(n)?;
        let lambda = p_minus_one.lcm(&q_minus_one);
        let g_lambda = public.g.modpow(&lambda, &public.n_squared);
        let l = (g_lambda - &one) / &public.n;
        let mu = l
            .mod_inverse(&public.n)
            .and_then(|inverse| inverse.to_biguint())
            .ok_or_else(|| PsiError::Setup("L(g^λ mod n²) is not invertible mod n".to_string()))?;

        let private = PaillierPrivateKey {
            lambda,
            mu,
            n: public.n.clone(),
            n_squared: public.n_squared.clone(),
        };
        Ok(Self { public, private })
    }

    /// The public half, safe to hand to the peer.
    pub fn public_key(&self) -> &PaillierPublicKey {
        &self.public
    }

    /// The private half; never leaves its owner.
    pub fn private_key(&self) -> &PaillierPrivateKey {
        &self.private
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use proptest::prelude::*;

    const N: u64 = 998_244_359_987_710_471;

    /// Deterministic key over two well-known 30-bit primes.
    pub(crate) fn small_keypair() -> PaillierKeyPair {
        PaillierKeyPair::from_primes(
            &BigUint::from(1_000_000_007u64),
            &BigUint::from(998_244_353u64),
        )
        .unwrap()
    }

    #[test]
    fn test_from_primes_builds_expected_modulus() {
        let pair = small_keypair();
        assert_eq!(pair.public_key().n(), &BigUint::from(N));
        assert_eq!(
            pair.public_key().g(),
            &(BigUint::from(N) + BigUint::one())
        );
    }

    #[test]
    fn test_from_primes_rejects_equal_primes() {
        let p = BigUint::from(1_000_000_007u64);
        assert!(matches!(
            PaillierKeyPair::from_primes(&p, &p),
            Err(PsiError::Setup(_))
        ));
    }

    #[test]
    fn test_from_primes_rejects_composite() {
        let result = PaillierKeyPair::from_primes(
            &BigUint::from(1_000_000_007u64),
            &BigUint::from(1_000_000_011u64 * 3),
        );
        assert!(matches!(result, Err(PsiError::Setup(_))));
    }

    #[test]
    fn test_generate_rejects_small_primes() {
        assert!(matches!(
            PaillierKeyPair::generate(8),
            Err(PsiError::Setup(_))
        ));
    }

    #[test]
    fn test_generate_roundtrip() {
        let pair = PaillierKeyPair::generate(64).unwrap();
        assert!(pair.public_key().n().bits() >= 127);

        let m = BigUint::from(424_242u32);
        let c = pair.public_key().encrypt(&m).unwrap();
        assert_eq!(pair.private_key().decrypt(&c).unwrap(), m);
    }

    #[test]
    fn test_encrypt_is_randomized() {
        let pair = small_keypair();
        let m = BigUint::from(7u32);
        let c1 = pair.public_key().encrypt(&m).unwrap();
        let c2 = pair.public_key().encrypt(&m).unwrap();
        assert_ne!(c1, c2);
        assert_eq!(pair.private_key().decrypt(&c1).unwrap(), m);
        assert_eq!(pair.private_key().decrypt(&c2).unwrap(), m);
    }

    #[test]
    fn test_encrypt_rejects_out_of_range() {
        let pair = small_keypair();
        let n = pair.public_key().n().clone();
        assert!(matches!(
            pair.public_key().encrypt(&n),
            Err(PsiError::Range(_))
        ));
        let below = &n - BigUint::one();
        assert!(pair.public_key().encrypt(&below).is_ok());
    }

    #[test]
    fn test_decrypt_rejects_invalid_ciphertexts() {
        let pair = small_keypair();
        let public = pair.public_key();
        let too_large = Ciphertext::new(public.n_squared().clone());
        let zero = Ciphertext::new(BigUint::zero());
        let shares_factor = Ciphertext::new(public.n().clone());

        for c in [&too_large, &zero, &shares_factor] {
            assert!(matches!(
                pair.private_key().decrypt(c),
                Err(PsiError::InvalidCiphertext(_))
            ));
            assert!(matches!(
                public.validate(c),
                Err(PsiError::InvalidCiphertext(_))
            ));
        }
    }

    #[test]
    fn test_aggregate() {
        let pair = small_keypair();
        let public = pair.public_key();
        assert!(public.aggregate(std::iter::empty()).is_none());

        let ciphertexts: Vec<_> = [10u32, 20, 30]
            .iter()
            .map(|v| public.encrypt(&BigUint::from(*v)).unwrap())
            .collect();
        let total = public.aggregate(&ciphertexts).unwrap();
        assert_eq!(
            pair.private_key().decrypt(&total).unwrap(),
            BigUint::from(60u32)
        );
    }

    #[test]
    fn test_sum_wraps_modulo_n() {
        let pair = small_keypair();
        let public = pair.public_key();
        let big = BigUint::from(N - 1);
        let c1 = public.encrypt(&big).unwrap();
        let c2 = public.encrypt(&BigUint::from(5u32)).unwrap();
        let sum = public.add(&c1, &c2);
        assert_eq!(
            pair.private_key().decrypt(&sum).unwrap(),
            BigUint::from(4u32)
        );
    }

    #[test]
    fn test_private_key_debug_is_redacted() {
        let pair = small_keypair();
        let rendered = format!("{:?}", pair.private_key());
        assert!(!rendered.contains("lambda"));
        assert!(!rendered.contains("mu"));
    }

    #[test]
    fn test_public_key_serde_roundtrip() {
        let pair = small_keypair();
        let json = serde_json::to_string(pair.public_key()).unwrap();
        let decoded: PaillierPublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(&decoded, pair.public_key());
    }

    proptest! {
        #[test]
        fn prop_homomorphic_addition(m1 in 0u64..N, m2 in 0u64..N) {
            let pair = small_keypair();
            let public = pair.public_key();
            let c1 = public.encrypt(&BigUint::from(m1)).unwrap();
            let c2 = public.encrypt(&BigUint::from(m2)).unwrap();

            let expected = (BigUint::from(m1) + BigUint::from(m2)) % public.n();
            let decrypted = pair.private_key().decrypt(&public.add(&c1, &c2)).unwrap();
            prop_assert_eq!(decrypted, expected);
        }
    }
}
