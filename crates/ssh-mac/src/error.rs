//! MAC layer error types.

use thiserror::Error;

/// MAC layer errors
///
/// None of these are transient. A failure either aborts the key-exchange
/// step in progress or terminates the session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MacError {
    /// Algorithm name not in the catalogue
    #[error("unknown MAC algorithm: {0}")]
    UnknownAlgorithm(String),

    /// Hash primitive failed during key derivation or tag computation
    #[error("digest error: {0}")]
    DigestError(String),

    /// A protected algorithm produced an empty tag
    #[error("MAC computation failed using {0}")]
    MacComputationFailed(String),

    /// Received tag does not match the computed tag
    #[error("MAC mismatch using {algorithm}")]
    MacMismatch {
        /// Algorithm the packet was verified with
        algorithm: String,
    },

    /// Buffer or context allocation failed
    #[error("allocation failure: {0}")]
    AllocationFailure(String),

    /// UMAC algorithm chosen with no universal-hash backend installed
    #[error("no backend available for {0}")]
    BackendUnavailable(String),

    /// `set_key` called without a preceding `set_algorithm`
    #[error("no MAC algorithm prepared for keying")]
    AlgorithmNotSet,

    /// Session identifier differs from the one pinned at the first exchange
    #[error("session identifier changed after first key exchange")]
    SessionIdChanged,

    /// Key length not accepted by the primitive
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Packet fields cannot be encoded in their wire widths
    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    /// Configuration rejected by validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl MacError {
    /// Whether the transport must tear down the connection.
    ///
    /// Handshake-step failures (bad algorithm name, missing backend, bad
    /// configuration) abort the exchange; everything else means the
    /// integrity of the direction can no longer be trusted.
    #[must_use]
    pub fn is_fatal_to_session(&self) -> bool {
        !matches!(
            self,
            Self::UnknownAlgorithm(_)
                | Self::BackendUnavailable(_)
                | Self::AlgorithmNotSet
                | Self::InvalidConfig(_)
        )
    }
}
