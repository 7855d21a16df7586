//! Error types for the PSI-Sum protocol.

use thiserror::Error;

/// Errors that can occur during PSI-Sum protocol execution.
///
/// Every error is local and synchronous. Any of them invalidates the whole
/// protocol run; there is no partial-result recovery.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PsiError {
    /// Group or key generation failed; retry with fresh randomness.
    #[error("Setup failed: {0}")]
    Setup(String),

    /// A ciphertext is outside `[1, n²)` or shares a factor with `n`.
    #[error("Invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// A plaintext value does not fit below the Paillier modulus.
    #[error("Value out of range: {0}")]
    Range(String),

    /// A party operation was invoked out of state-machine order.
    #[error("Protocol sequence violation: {operation} called in phase {phase}")]
    ProtocolSequence {
        operation: &'static str,
        phase: &'static str,
    },

    /// A received group element is outside `[1, p-1]`.
    #[error("Invalid group element: {0}")]
    InvalidGroupElement(String),

    /// The same identifier appears twice in one party's dataset.
    #[error("Duplicate identifier: {0}")]
    DuplicateIdentifier(String),

    /// Protocol configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for PSI-Sum operations.
pub type Result<T> = std::result::Result<T, PsiError>;
