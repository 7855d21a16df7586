//! Protocol state machines for the two PSI-Sum parties.
//!
//! Each round method checks the current phase before doing any work and
//! fails with `PsiError::ProtocolSequence` when called out of order.

use crate::error::{PsiError, Result};
use std::fmt;

/// Receiver lifecycle: `Idle → Round1Sent → IntersectionComputed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverPhase {
    /// Created, possibly set up; round 1 not yet produced
    Idle,
    /// Round 1 handed to the sender
    Round1Sent,
    /// Round 3 done; the result is available
    IntersectionComputed,
}

/// Sender lifecycle: `Idle → KeysGenerated → Round2Sent → SumDecrypted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderPhase {
    /// Created; no keys yet
    Idle,
    /// Exponent sampled and Paillier keys generated
    KeysGenerated,
    /// Round 2 handed to the receiver
    Round2Sent,
    /// Aggregate decrypted; the run is over
    SumDecrypted,
}

impl ReceiverPhase {
    /// Stable name used in error messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            ReceiverPhase::Idle => "Idle",
            ReceiverPhase::Round1Sent => "Round1Sent",
            ReceiverPhase::IntersectionComputed => "IntersectionComputed",
        }
    }
}

impl SenderPhase {
    /// Stable name used in error messages and logs.
    pub fn name(self) -> &'static str {
        match self {
            SenderPhase::Idle => "Idle",
            SenderPhase::KeysGenerated => "KeysGenerated",
            SenderPhase::Round2Sent => "Round2Sent",
            SenderPhase::SumDecrypted => "SumDecrypted",
        }
    }
}

impl fmt::Display for ReceiverPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for SenderPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fail unless `current` is `expected`.
pub(crate) fn require<P>(operation: &'static str, current: P, expected: P) -> Result<()>
where
    P: PartialEq + Copy + Into<&'static str>,
{
    if current == expected {
        Ok(())
    } else {
        Err(PsiError::ProtocolSequence {
            operation,
            phase: current.into(),
        })
    }
}

impl From<ReceiverPhase> for &'static str {
    fn from(phase: ReceiverPhase) -> Self {
        phase.name()
    }
}

impl From<SenderPhase> for &'static str {
    fn from(phase: SenderPhase) -> Self {
        phase.name()
    }
}
