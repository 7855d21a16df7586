//! The receiver party: holds identifiers only.
//!
//! The receiver drives rounds 1 and 3. It learns how many of its identifiers
//! the sender also holds, plus an aggregate ciphertext of the matching values
//! that only the sender can decrypt.

use crate::crypto::{blind, blind_all, hash_identifiers, BlindingExponent};
use crate::error::{PsiError, Result};
use crate::group::{GroupElement, GroupParameters};
use crate::messages::{IntersectionResult, Round1Message, Round2Message};
use crate::paillier::{Ciphertext, PaillierPublicKey};
use crate::state::{require, ReceiverPhase};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

/// Per-run secrets, created by [`ReceiverParty::setup`].
#[derive(Debug)]
struct ReceiverSession {
    params: GroupParameters,
    exponent: BlindingExponent,
    hashed: Vec<GroupElement>,
}

/// One receiver run.
///
/// A `ReceiverParty` is good for exactly one protocol run; its exponent is
/// discarded with it.
#[derive(Debug)]
pub struct ReceiverParty {
    identifiers: Vec<Vec<u8>>,
    phase: ReceiverPhase,
    session: Option<ReceiverSession>,
    result: Option<IntersectionResult>,
}

impl ReceiverParty {
    /// Create a receiver over a set of identifiers.
    ///
    /// # Errors
    /// Returns `PsiError::DuplicateIdentifier` if an identifier repeats.
    pub fn new<I>(identifiers: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let identifiers: Vec<Vec<u8>> = identifiers.into_iter().collect();
        let mut seen = HashSet::with_capacity(identifiers.len());
        for identifier in &identifiers {
            if !seen.insert(identifier.as_slice()) {
                return Err(PsiError::DuplicateIdentifier(hex::encode(identifier)));
            }
        }

        Ok(Self {
            identifiers,
            phase: ReceiverPhase::Idle,
            session: None,
            result: None,
        })
    }

    /// Current state-machine phase.
    pub fn phase(&self) -> ReceiverPhase {
        self.phase
    }

    /// Number of identifiers held.
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Returns true if the receiver holds no identifiers.
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Sample the blinding exponent and hash every identifier into the group.
    ///
    /// Calling this again with the same parameters before round 1 is a no-op.
    ///
    /// # Errors
    /// Returns `PsiError::ProtocolSequence` if the party was already set up
    /// with different parameters, or once round 1 has been produced.
    pub fn setup(&mut self, params: &GroupParameters) -> Result<()> {
        if let Some(session) = &self.session {
            if &session.params == params && self.phase == ReceiverPhase::Idle {
                return Ok(());
            }
            return Err(PsiError::ProtocolSequence {
                operation: "setup",
                phase: self.phase.name(),
            });
        }
        require("setup", self.phase, ReceiverPhase::Idle)?;

        let exponent = BlindingExponent::random(params);
        let hashed = hash_identifiers(&self.identifiers, params);
        self.session = Some(ReceiverSession {
            params: params.clone(),
            exponent,
            hashed,
        });
        info!(identifiers = self.identifiers.len(), "receiver set up");
        Ok(())
    }

    fn session(&self, operation: &'static str) -> Result<&ReceiverSession> {
        self.session.as_ref().ok_or(PsiError::ProtocolSequence {
            operation,
            phase: self.phase.name(),
        })
    }

    /// Round 1: blind every identifier hash with `k_A`.
    ///
    /// # Returns
    /// `(identifier, H(id)^k_A)` pairs in a random order
    ///
    /// # Errors
    /// Returns `PsiError::ProtocolSequence` unless the party is set up and idle.
    pub fn round1(&mut self) -> Result<Round1Message> {
        require("round1", self.phase, ReceiverPhase::Idle)?;
        let session = self.session("round1")?;

        let blinded = blind_all(&session.hashed, &session.exponent, &session.params);
        let mut items: Vec<(Vec<u8>, GroupElement)> =
            self.identifiers.iter().cloned().zip(blinded).collect();
        items.shuffle(&mut OsRng);

        self.phase = ReceiverPhase::Round1Sent;
        debug!(items = items.len(), "round 1 prepared");
        Ok(Round1Message::new(items))
    }

    /// Round 3: finish the double blinding of the sender's elements, count
    /// matches and aggregate the matching ciphertexts.
    ///
    /// A sender element that double-blinds to a value already matched is
    /// ignored, so each distinct identifier counts once.
    ///
    /// # Errors
    /// Returns `PsiError::ProtocolSequence` unless round 1 was sent,
    /// `PsiError::InvalidGroupElement` or `PsiError::InvalidCiphertext` if the
    /// message is malformed.
    pub fn round3(
        &mut self,
        message: Round2Message,
        sender_key: &PaillierPublicKey,
    ) -> Result<IntersectionResult> {
        require("round3", self.phase, ReceiverPhase::Round1Sent)?;
        let session = self.session("round3")?;
        let params = &session.params;

        for element in &message.double_blinded {
            params.check(element)?;
        }
        for (element, ciphertext) in &message.encrypted_pairs {
            params.check(element)?;
            sender_key.validate(ciphertext)?;
        }

        let receiver_values: HashSet<&GroupElement> = message.double_blinded.iter().collect();
        let candidates: Vec<(GroupElement, &Ciphertext)> = message
            .encrypted_pairs
            .par_iter()
            .map(|(element, ciphertext)| (blind(element, &session.exponent, params), ciphertext))
            .collect();

        let mut matched = HashSet::new();
        let mut matching_ciphertexts = Vec::new();
        for (double_blinded, ciphertext) in candidates {
            if receiver_values.contains(&double_blinded) && matched.insert(double_blinded) {
                matching_ciphertexts.push(ciphertext);
            }
        }

        let result = IntersectionResult::new(
            matched.len(),
            sender_key.aggregate(matching_ciphertexts),
        );
        info!(intersection_size = result.size, "intersection computed");

        self.phase = ReceiverPhase::IntersectionComputed;
        self.result = Some(result.clone());
        Ok(result)
    }

    /// The round 3 result, once computed.
    pub fn result(&self) -> Option<&IntersectionResult> {
        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::tests::mersenne_61;
    use crate::paillier::tests::small_keypair;
    use num_bigint_dig::BigUint;

    fn ids(raw: &[&str]) -> Vec<Vec<u8>> {
        raw.iter().map(|s| s.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let result = ReceiverParty::new(ids(&["a", "b", "a"]));
        assert_eq!(
            result.unwrap_err(),
            PsiError::DuplicateIdentifier(hex::encode("a"))
        );
    }

    #[test]
    fn test_setup_is_idempotent() {
        let params = mersenne_61();
        let mut receiver = ReceiverParty::new(ids(&["a", "b"])).unwrap();
        receiver.setup(&params).unwrap();
        let first = receiver.session.as_ref().unwrap().hashed.clone();
        receiver.setup(&params).unwrap();
        assert_eq!(receiver.session.as_ref().unwrap().hashed, first);
        assert_eq!(receiver.phase(), ReceiverPhase::Idle);
    }

    #[test]
    fn test_setup_rejects_different_parameters() {
        let mut receiver = ReceiverParty::new(ids(&["a"])).unwrap();
        receiver.setup(&mersenne_61()).unwrap();
        let other = GroupParameters::generate(64).unwrap();
        assert!(matches!(
            receiver.setup(&other),
            Err(PsiError::ProtocolSequence { operation: "setup", .. })
        ));
    }

    #[test]
    fn test_setup_after_round1() {
        let params = mersenne_61();
        let mut receiver = ReceiverParty::new(ids(&["a"])).unwrap();
        receiver.setup(&params).unwrap();
        receiver.round1().unwrap();
        assert_eq!(
            receiver.setup(&params),
            Err(PsiError::ProtocolSequence {
                operation: "setup",
                phase: "Round1Sent"
            })
        );
    }

    #[test]
    fn test_round1_before_setup() {
        let mut receiver = ReceiverParty::new(ids(&["a"])).unwrap();
        assert_eq!(
            receiver.round1(),
            Err(PsiError::ProtocolSequence {
                operation: "round1",
                phase: "Idle"
            })
        );
    }

    #[test]
    fn test_round1_blinds_every_identifier() {
        let params = mersenne_61();
        let mut receiver = ReceiverParty::new(ids(&["u1", "u2", "u3"])).unwrap();
        receiver.setup(&params).unwrap();
        let message = receiver.round1().unwrap();

        assert_eq!(message.len(), 3);
        assert_eq!(receiver.phase(), ReceiverPhase::Round1Sent);

        let session = receiver.session.as_ref().unwrap();
        for (identifier, blinded) in &message.items {
            let expected = blind(
                &crate::crypto::hash_to_group(identifier, &params),
                &session.exponent,
                &params,
            );
            assert_eq!(blinded, &expected);
        }
    }

    #[test]
    fn test_round1_only_once() {
        let mut receiver = ReceiverParty::new(ids(&["u1"])).unwrap();
        receiver.setup(&mersenne_61()).unwrap();
        receiver.round1().unwrap();
        assert!(matches!(
            receiver.round1(),
            Err(PsiError::ProtocolSequence {
                operation: "round1",
                phase: "Round1Sent"
            })
        ));
    }

    #[test]
    fn test_round3_before_round1() {
        let keys = small_keypair();
        let mut receiver = ReceiverParty::new(ids(&["u1"])).unwrap();
        receiver.setup(&mersenne_61()).unwrap();
        let result = receiver.round3(Round2Message::new(vec![], vec![]), keys.public_key());
        assert!(matches!(
            result,
            Err(PsiError::ProtocolSequence {
                operation: "round3",
                phase: "Idle"
            })
        ));
    }

    #[test]
    fn test_round3_rejects_out_of_group_element() {
        let params = mersenne_61();
        let keys = small_keypair();
        let mut receiver = ReceiverParty::new(ids(&["u1"])).unwrap();
        receiver.setup(&params).unwrap();
        receiver.round1().unwrap();

        let bad = Round2Message::new(vec![], vec![GroupElement::new(BigUint::from(0u32))]);
        assert!(matches!(
            receiver.round3(bad, keys.public_key()),
            Err(PsiError::InvalidGroupElement(_))
        ));
        assert_eq!(receiver.phase(), ReceiverPhase::Round1Sent);
    }

    #[test]
    fn test_round3_rejects_invalid_ciphertext() {
        let params = mersenne_61();
        let keys = small_keypair();
        let mut receiver = ReceiverParty::new(ids(&["u1"])).unwrap();
        receiver.setup(&params).unwrap();
        receiver.round1().unwrap();

        let bad = Round2Message::new(
            vec![(
                GroupElement::new(BigUint::from(7u32)),
                Ciphertext::new(keys.public_key().n_squared().clone()),
            )],
            vec![],
        );
        assert!(matches!(
            receiver.round3(bad, keys.public_key()),
            Err(PsiError::InvalidCiphertext(_))
        ));
    }

    #[test]
    fn test_round3_with_empty_message() {
        let keys = small_keypair();
        let mut receiver = ReceiverParty::new(ids(&["u1"])).unwrap();
        receiver.setup(&mersenne_61()).unwrap();
        receiver.round1().unwrap();

        let result = receiver
            .round3(Round2Message::new(vec![], vec![]), keys.public_key())
            .unwrap();
        assert_eq!(result, IntersectionResult::new(0, None));
        assert_eq!(receiver.result(), Some(&result));
        assert_eq!(receiver.phase(), ReceiverPhase::IntersectionComputed);
    }
}
