//! # Private Set Intersection with Sum (PSI-Sum)
//!
//! This library implements a two-party PSI-Sum protocol. A *receiver* holds a
//! set of identifiers; a *sender* holds identifier-value pairs. Together they
//! learn the size of the intersection and the sum of the sender's values over
//! it, without either side learning the other's non-matching identifiers or
//! individual values.
//!
//! Two primitives are composed:
//!
//! - **Commutative blinding** in the multiplicative group modulo a prime `p`:
//!   `(H(x)^k_A)^k_B = (H(x)^k_B)^k_A`, so matches are found on
//!   double-blinded values without exchanging exponents.
//! - **Paillier encryption**: multiplying ciphertexts adds plaintexts, so the
//!   receiver aggregates matching values without seeing them.
//!
//! ## Protocol Overview
//!
//! 1. **Setup**: both parties receive the same [`GroupParameters`]; each
//!    samples a secret exponent, and the sender generates a Paillier key pair.
//! 2. **Round 1** (receiver → sender): `(id, H(id)^k_A)` pairs, shuffled.
//! 3. **Round 2** (sender → receiver): the receiver's elements raised to
//!    `k_B` (values only, shuffled), plus `(H(w)^k_B, Enc(value))` for every
//!    sender record (shuffled independently).
//! 4. **Round 3** (receiver): raise each `H(w)^k_B` to `k_A`; each hit in the
//!    double-blinded list is a match. Count the matches and multiply their
//!    ciphertexts.
//! 5. **Decrypt** (sender): decrypt the aggregate ciphertext.
//!
//! The library handles protocol logic only; message transport is left to the
//! caller. [`ProtocolCoordinator`] runs all rounds in-process.
//!
//! ## Example Usage
//!
//! ```ignore
//! use psi_sum_protocol::{ProtocolConfig, ProtocolCoordinator};
//!
//! let coordinator = ProtocolCoordinator::new(ProtocolConfig::default())?;
//! let output = coordinator.run_datasets(
//!     vec![b"u1".to_vec(), b"u2".to_vec()],
//!     vec![(b"u2".to_vec(), 20u64), (b"u3".to_vec(), 30u64)],
//! )?;
//! assert_eq!(output.intersection_size, 1);
//! # Ok::<(), psi_sum_protocol::PsiError>(())
//! ```
//!
//! ## Security Considerations
//!
//! - Participants are assumed honest-but-curious. Nothing here defends
//!   against a party that deviates from the protocol.
//! - Round 1 carries the receiver's identifiers in the clear next to their
//!   blinded form, so the sender learns the receiver's whole set. Only the
//!   sender's non-matching identifiers and all individual values stay hidden.
//! - Neither blinding exponent is ever exchanged, and the receiver only ever
//!   sees the Paillier *public* key.
//! - The decrypted sum is exact only while the true sum is below the Paillier
//!   modulus `n`; size `paillier_prime_bits` accordingly.
//!
//! ## Modules
//!
//! - [`group`] - Group parameters and elements
//! - [`crypto`] - Identifier hashing and blinding
//! - [`paillier`] - Additively homomorphic encryption
//! - [`messages`] - Message types for protocol exchange
//! - [`state`] - Party state machines
//! - [`receiver`] / [`sender`] - The two parties
//! - [`protocol`] - Round sequencing
//! - [`config`] - Protocol configuration
//! - [`error`] - Error types

pub use config::ProtocolConfig;
pub use crypto::{hash_bytes, hash_to_group};
pub use error::{PsiError, Result};
pub use group::{GroupElement, GroupParameters};
pub use messages::{IntersectionResult, PsiSumOutput, Round1Message, Round2Message};
pub use paillier::{Ciphertext, PaillierKeyPair, PaillierPrivateKey, PaillierPublicKey};
pub use protocol::ProtocolCoordinator;
pub use receiver::ReceiverParty;
pub use sender::SenderParty;
pub use state::{ReceiverPhase, SenderPhase};

pub mod config;
pub mod crypto;
pub mod error;
pub mod group;
pub mod messages;
pub mod paillier;
pub mod protocol;
pub mod receiver;
pub mod sender;
pub mod state;
