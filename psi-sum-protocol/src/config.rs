//! Protocol configuration.

use crate::error::{PsiError, Result};
use crate::group::MIN_GROUP_BITS;
use crate::paillier::MIN_PAILLIER_PRIME_BITS;
use serde::{Deserialize, Serialize};

const DEFAULT_GROUP_BITS: usize = 256;
const DEFAULT_PAILLIER_PRIME_BITS: usize = 512;
const DEFAULT_MAX_SETUP_ATTEMPTS: u32 = 3;

/// Parameter sizes and retry policy for one protocol run.
///
/// The Paillier modulus has roughly `2 * paillier_prime_bits` bits and must
/// exceed the largest possible intersection sum, or the decrypted sum wraps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Bit length of the blinding group modulus `p`
    pub group_bits: usize,
    /// Bit length of each Paillier prime
    pub paillier_prime_bits: usize,
    /// How many fresh moduli to try before giving up on group setup
    pub max_setup_attempts: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            group_bits: DEFAULT_GROUP_BITS,
            paillier_prime_bits: DEFAULT_PAILLIER_PRIME_BITS,
            max_setup_attempts: DEFAULT_MAX_SETUP_ATTEMPTS,
        }
    }
}

impl ProtocolConfig {
    /// Check that the configuration can produce a run.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidConfig` for undersized bit lengths or zero
    /// setup attempts.
    pub fn validate(&self) -> Result<()> {
        if self.group_bits < MIN_GROUP_BITS {
            return Err(PsiError::InvalidConfig(format!(
                "group_bits must be at least {}",
                MIN_GROUP_BITS
            )));
        }
        if self.paillier_prime_bits < MIN_PAILLIER_PRIME_BITS {
            return Err(PsiError::InvalidConfig(format!(
                "paillier_prime_bits must be at least {}",
                MIN_PAILLIER_PRIME_BITS
            )));
        }
        if self.max_setup_attempts == 0 {
            return Err(PsiError::InvalidConfig(
                "max_setup_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
