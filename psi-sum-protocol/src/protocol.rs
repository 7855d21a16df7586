//! Sequencing of the three PSI-Sum rounds.

use crate::config::ProtocolConfig;
use crate::error::{PsiError, Result};
use crate::group::GroupParameters;
use crate::messages::PsiSumOutput;
use crate::receiver::ReceiverParty;
use crate::sender::SenderParty;
use num_bigint_dig::BigUint;
use tracing::{debug, info, warn};

/// Hands each message from its producer to its consumer.
///
/// The coordinator holds no secrets. It generates the shared group, calls
/// each party in order, and returns the final output. Any error aborts the
/// run; the parties are then left in a non-terminal phase and must be
/// discarded.
#[derive(Debug, Clone, Default)]
pub struct ProtocolCoordinator {
    config: ProtocolConfig,
}

impl ProtocolCoordinator {
    /// Create a coordinator.
    ///
    /// # Errors
    /// Returns `PsiError::InvalidConfig` if the configuration is unusable.
    pub fn new(config: ProtocolConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Generate group parameters, re-sampling the modulus on setup failure.
    ///
    /// # Errors
    /// Returns the last `PsiError::Setup` once every attempt has failed.
    pub fn setup_group(&self) -> Result<GroupParameters> {
        let mut last_error = None;
        for attempt in 1..=self.config.max_setup_attempts {
            match GroupParameters::generate(self.config.group_bits) {
                Ok(params) => return Ok(params),
                Err(PsiError::Setup(reason)) => {
                    warn!(attempt, %reason, "group setup failed, retrying");
                    last_error = Some(PsiError::Setup(reason));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| PsiError::Setup("no setup attempts made".to_string())))
    }

    /// Run the full protocol between two parties.
    ///
    /// # Errors
    /// Propagates the first error raised by setup or any round.
    pub fn run(
        &self,
        receiver: &mut ReceiverParty,
        sender: &mut SenderParty,
    ) -> Result<PsiSumOutput> {
        let params = self.setup_group()?;
        self.run_with_group(&params, receiver, sender)
    }

    /// Run the full protocol over existing group parameters.
    pub fn run_with_group(
        &self,
        params: &GroupParameters,
        receiver: &mut ReceiverParty,
        sender: &mut SenderParty,
    ) -> Result<PsiSumOutput> {
        receiver.setup(params)?;
        sender.setup(params)?;
        info!(group_bits = params.bits(), "parties set up");

        let round1 = receiver.round1()?;
        debug!(items = round1.len(), "round 1 delivered");

        let round2 = sender.round2(round1)?;
        debug!(
            encrypted_pairs = round2.encrypted_pairs.len(),
            double_blinded = round2.double_blinded.len(),
            "round 2 delivered"
        );

        let result = receiver.round3(round2, sender.public_key()?)?;
        let intersection_sum = sender.decrypt_sum(result.sum_ciphertext.as_ref())?;
        debug!(%intersection_sum, "sum decrypted");

        let output = PsiSumOutput {
            intersection_size: result.size,
            intersection_sum,
        };
        info!(intersection_size = output.intersection_size, "protocol run complete");
        Ok(output)
    }

    /// Build both parties from raw datasets and run the protocol.
    pub fn run_datasets<I, R, V>(&self, identifiers: I, records: R) -> Result<PsiSumOutput>
    where
        I: IntoIterator<Item = Vec<u8>>,
        R: IntoIterator<Item = (Vec<u8>, V)>,
        V: Into<BigUint>,
    {
        let mut receiver = ReceiverParty::new(identifiers)?;
        let mut sender = SenderParty::new(records, self.config.paillier_prime_bits)?;
        self.run(&mut receiver, &mut sender)
    }
}
