//! The sender party: holds identifier-value pairs and the Paillier key.

use crate::crypto::{blind, blind_all, hash_identifiers, BlindingExponent};
use crate::error::{PsiError, Result};
use crate::group::{GroupElement, GroupParameters};
use crate::messages::{Round1Message, Round2Message};
use crate::paillier::{Ciphertext, PaillierKeyPair, PaillierPublicKey};
use crate::state::{require, SenderPhase};
use num_bigint_dig::BigUint;
use num_traits::Zero;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug)]
struct SenderSession {
    params: GroupParameters,
    exponent: BlindingExponent,
    keys: PaillierKeyPair,
    hashed: Vec<GroupElement>,
}

/// One sender run.
///
/// The blinding exponent `k_B` and the Paillier private key are created in
/// [`setup`](Self::setup) and never leave this struct.
#[derive(Debug)]
pub struct SenderParty {
    identifiers: Vec<Vec<u8>>,
    values: Vec<BigUint>,
    paillier_prime_bits: usize,
    phase: SenderPhase,
    session: Option<SenderSession>,
}

impl SenderParty {
    /// Create a sender over `(identifier, value)` records.
    ///
    /// Values are range-checked against the Paillier modulus in round 2, once
    /// the key exists.
    ///
    /// # Errors
    /// Returns `PsiError::DuplicateIdentifier` if an identifier repeats.
    pub fn new<I, V>(records: I, paillier_prime_bits: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (Vec<u8>, V)>,
        V: Into<BigUint>,
    {
        let mut identifiers = Vec::new();
        let mut values = Vec::new();
        let mut seen = HashSet::new();
        for (identifier, value) in records {
            if !seen.insert(identifier.clone()) {
                return Err(PsiError::DuplicateIdentifier(hex::encode(&identifier)));
            }
            identifiers.push(identifier);
            values.push(value.into());
        }

        Ok(Self {
            identifiers,
            values,
            paillier_prime_bits,
            phase: SenderPhase::Idle,
            session: None,
        })
    }

    /// Current state-machine phase.
    pub fn phase(&self) -> SenderPhase {
        self.phase
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.identifiers.len()
    }

    /// Returns true if the sender holds no records.
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }

    /// Sample `k_B`, generate a fresh Paillier key pair and hash every
    /// identifier into the group.
    ///
    /// Calling this again with the same parameters before round 2 is a no-op.
    ///
    /// # Errors
    /// Returns `PsiError::Setup` if key generation fails, or
    /// `PsiError::ProtocolSequence` if already set up with other parameters
    /// or once round 2 has been produced.
    pub fn setup(&mut self, params: &GroupParameters) -> Result<()> {
        if let Some(session) = &self.session {
            if &session.params == params && self.phase == SenderPhase::KeysGenerated {
                return Ok(());
            }
            return Err(PsiError::ProtocolSequence {
                operation: "setup",
                phase: self.phase.name(),
            });
        }
        require("setup", self.phase, SenderPhase::Idle)?;

        let keys = PaillierKeyPair::generate(self.paillier_prime_bits)?;
        let exponent = BlindingExponent::random(params);
        let hashed = hash_identifiers(&self.identifiers, params);
        self.session = Some(SenderSession {
            params: params.clone(),
            exponent,
            keys,
            hashed,
        });

        self.phase = SenderPhase::KeysGenerated;
        info!(
            records = self.identifiers.len(),
            modulus_bits = self.paillier_prime_bits * 2,
            "sender keys generated"
        );
        Ok(())
    }

    fn session(&self, operation: &'static str) -> Result<&SenderSession> {
        self.session.as_ref().ok_or(PsiError::ProtocolSequence {
            operation,
            phase: self.phase.name(),
        })
    }

    /// The Paillier public key to hand to the receiver.
    ///
    /// # Errors
    /// Returns `PsiError::ProtocolSequence` before [`setup`](Self::setup).
    pub fn public_key(&self) -> Result<&PaillierPublicKey> {
        Ok(self.session("public_key")?.keys.public_key())
    }

    /// Round 2: double-blind the receiver's elements, blind our own
    /// identifiers and encrypt our values.
    ///
    /// # Errors
    /// Returns `PsiError::ProtocolSequence` unless keys were generated and
    /// round 2 has not run, `PsiError::InvalidGroupElement` for a malformed
    /// round 1 message, or `PsiError::Range` if a value does not fit below `n`.
    pub fn round2(&mut self, message: Round1Message) -> Result<Round2Message> {
        require("round2", self.phase, SenderPhase::KeysGenerated)?;
        let session = self.session("round2")?;
        let params = &session.params;

        let received = message.blinded_elements();
        for element in &received {
            params.check(element)?;
        }

        // Identifiers are dropped: only the values travel back.
        let mut double_blinded = blind_all(&received, &session.exponent, params);
        double_blinded.shuffle(&mut OsRng);

        let public = session.keys.public_key();
        let mut encrypted_pairs: Vec<(GroupElement, Ciphertext)> = session
            .hashed
            .par_iter()
            .zip(self.values.par_iter())
            .map(|(hashed, value)| {
                let ciphertext = public.encrypt(value)?;
                Ok((blind(hashed, &session.exponent, params), ciphertext))
            })
            .collect::<Result<Vec<_>>>()?;
        encrypted_pairs.shuffle(&mut OsRng);

        self.phase = SenderPhase::Round2Sent;
        debug!(
            double_blinded = double_blinded.len(),
            encrypted_pairs = encrypted_pairs.len(),
            "round 2 prepared"
        );
        Ok(Round2Message::new(encrypted_pairs, double_blinded))
    }

    /// Decrypt the receiver's aggregate ciphertext.
    ///
    /// # Returns
    /// `0` when there is no aggregate (empty intersection), otherwise the sum
    /// of matching values modulo `n`
    ///
    /// # Errors
    /// Returns `PsiError::ProtocolSequence` unless round 2 was sent, or
    /// `PsiError::InvalidCiphertext` if the aggregate is malformed.
    pub fn decrypt_sum(&mut self, aggregate: Option<&Ciphertext>) -> Result<BigUint> {
        require("decrypt_sum", self.phase, SenderPhase::Round2Sent)?;
        let session = self.session("decrypt_sum")?;

        let sum = match aggregate {
            None => BigUint::zero(),
            Some(ciphertext) => session.keys.private_key().decrypt(ciphertext)?,
        };

        self.phase = SenderPhase::SumDecrypted;
        debug!("aggregate decrypted");
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash_to_group;
    use crate::group::tests::mersenne_61;

    fn records(raw: &[(&str, u64)]) -> Vec<(Vec<u8>, u64)> {
        raw.iter()
            .map(|(id, value)| (id.as_bytes().to_vec(), *value))
            .collect()
    }

    fn ready_sender(raw: &[(&str, u64)]) -> SenderParty {
        let mut sender = SenderParty::new(records(raw), 32).unwrap();
        sender.setup(&mersenne_61()).unwrap();
        sender
    }

    #[test]
    fn test_new_rejects_duplicates() {
        let result = SenderParty::new(records(&[("u1", 1), ("u1", 2)]), 32);
        assert!(matches!(result, Err(PsiError::DuplicateIdentifier(_))));
    }

    #[test]
    fn test_public_key_requires_setup() {
        let sender = SenderParty::new(records(&[("u1", 1)]), 32).unwrap();
        assert!(matches!(
            sender.public_key(),
            Err(PsiError::ProtocolSequence { operation: "public_key", .. })
        ));
    }

    #[test]
    fn test_setup_generates_keys() {
        let sender = ready_sender(&[("u1", 1)]);
        assert_eq!(sender.phase(), SenderPhase::KeysGenerated);
        assert!(sender.public_key().unwrap().n().bits() >= 63);
    }

    #[test]
    fn test_setup_twice_keeps_keys() {
        let params = mersenne_61();
        let mut sender = ready_sender(&[("u1", 1)]);
        let n = sender.public_key().unwrap().n().clone();
        sender.setup(&params).unwrap();
        assert_eq!(sender.public_key().unwrap().n(), &n);
        assert_eq!(sender.phase(), SenderPhase::KeysGenerated);
    }

    #[test]
    fn test_setup_after_round2() {
        let params = mersenne_61();
        let mut sender = ready_sender(&[("u1", 1)]);
        sender.round2(Round1Message::new(vec![])).unwrap();
        assert_eq!(
            sender.setup(&params),
            Err(PsiError::ProtocolSequence {
                operation: "setup",
                phase: "Round2Sent"
            })
        );

        sender.decrypt_sum(None).unwrap();
        assert_eq!(
            sender.setup(&params),
            Err(PsiError::ProtocolSequence {
                operation: "setup",
                phase: "SumDecrypted"
            })
        );
    }

    #[test]
    fn test_setup_propagates_key_generation_failure() {
        let mut sender = SenderParty::new(records(&[("u1", 1)]), 4).unwrap();
        assert!(matches!(
            sender.setup(&mersenne_61()),
            Err(PsiError::Setup(_))
        ));
        assert_eq!(sender.phase(), SenderPhase::Idle);
    }

    #[test]
    fn test_round2_before_setup() {
        let mut sender = SenderParty::new(records(&[("u1", 1)]), 32).unwrap();
        assert!(matches!(
            sender.round2(Round1Message::new(vec![])),
            Err(PsiError::ProtocolSequence {
                operation: "round2",
                phase: "Idle"
            })
        ));
    }

    #[test]
    fn test_round2_shapes_message() {
        let params = mersenne_61();
        let mut sender = ready_sender(&[("u1", 10), ("u2", 20), ("u5", 40)]);
        let incoming = Round1Message::new(vec![
            (b"u1".to_vec(), hash_to_group(b"u1", &params)),
            (b"u9".to_vec(), hash_to_group(b"u9", &params)),
        ]);

        let message = sender.round2(incoming).unwrap();
        assert_eq!(message.double_blinded.len(), 2);
        assert_eq!(message.encrypted_pairs.len(), 3);
        assert_eq!(sender.phase(), SenderPhase::Round2Sent);

        let public = sender.public_key().unwrap().clone();
        for (element, ciphertext) in &message.encrypted_pairs {
            assert!(params.contains(element.as_biguint()));
            assert!(public.validate(ciphertext).is_ok());
        }
    }

    #[test]
    fn test_round2_rejects_invalid_element() {
        let mut sender = ready_sender(&[("u1", 10)]);
        let p = mersenne_61().p().clone();
        let incoming = Round1Message::new(vec![(b"u1".to_vec(), GroupElement::new(p))]);
        assert!(matches!(
            sender.round2(incoming),
            Err(PsiError::InvalidGroupElement(_))
        ));
        assert_eq!(sender.phase(), SenderPhase::KeysGenerated);
    }

    #[test]
    fn test_round2_rejects_value_above_modulus() {
        let mut sender = SenderParty::new(records(&[("u1", u64::MAX)]), 16).unwrap();
        sender.setup(&mersenne_61()).unwrap();
        assert!(matches!(
            sender.round2(Round1Message::new(vec![])),
            Err(PsiError::Range(_))
        ));
    }

    #[test]
    fn test_decrypt_sum_of_empty_aggregate() {
        let mut sender = ready_sender(&[("u1", 10)]);
        sender.round2(Round1Message::new(vec![])).unwrap();
        assert_eq!(sender.decrypt_sum(None).unwrap(), BigUint::zero());
        assert_eq!(sender.phase(), SenderPhase::SumDecrypted);
    }

    #[test]
    fn test_decrypt_sum_before_round2() {
        let mut sender = ready_sender(&[("u1", 10)]);
        assert!(matches!(
            sender.decrypt_sum(None),
            Err(PsiError::ProtocolSequence {
                operation: "decrypt_sum",
                phase: "KeysGenerated"
            })
        ));
    }

    #[test]
    fn test_decrypt_sum_only_once() {
        let mut sender = ready_sender(&[("u1", 10)]);
        sender.round2(Round1Message::new(vec![])).unwrap();
        sender.decrypt_sum(None).unwrap();
        assert!(matches!(
            sender.decrypt_sum(None),
            Err(PsiError::ProtocolSequence { .. })
        ));
    }
}
