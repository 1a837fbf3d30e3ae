//! MAC layer configuration.

use crate::{MAX_TAG_LEN, MacError};
use serde::{Deserialize, Serialize};

/// Key length used for peers that cannot handle full-size MAC keys.
pub const LEGACY_MAC_KEY_LEN: usize = 16;

/// Interop settings consumed by the key derivation path.
///
/// The transport decides `peer_supports_full_mac_key` from the peer's
/// version banner; this crate only consumes the flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacConfig {
    /// Derive full-length MAC keys. When false, keys are clamped to
    /// `legacy_mac_key_len` bytes.
    pub peer_supports_full_mac_key: bool,

    /// Clamped key length for legacy peers
    pub legacy_mac_key_len: usize,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            peer_supports_full_mac_key: true,
            legacy_mac_key_len: LEGACY_MAC_KEY_LEN,
        }
    }
}

impl MacConfig {
    /// Config for a peer that truncates MAC keys.
    #[must_use]
    pub fn legacy_peer() -> Self {
        Self {
            peer_supports_full_mac_key: false,
            ..Self::default()
        }
    }

    /// Check the configuration for values the KDF cannot honour.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::InvalidConfig`] if the legacy key length is zero
    /// or larger than [`MAX_TAG_LEN`].
    pub fn validate(&self) -> Result<(), MacError> {
        if self.legacy_mac_key_len == 0 {
            return Err(MacError::InvalidConfig(
                "legacy_mac_key_len must be non-zero".to_string(),
            ));
        }
        if self.legacy_mac_key_len > MAX_TAG_LEN {
            return Err(MacError::InvalidConfig(format!(
                "legacy_mac_key_len {} exceeds {MAX_TAG_LEN}",
                self.legacy_mac_key_len
            )));
        }
        Ok(())
    }

    /// Apply the interop clamp to a natural key length.
    ///
    /// The clamp only ever shortens a key.
    #[must_use]
    pub fn effective_key_len(&self, natural: usize) -> usize {
        if self.peer_supports_full_mac_key {
            natural
        } else {
            natural.min(self.legacy_mac_key_len)
        }
    }
}
