//! MAC key derivation (RFC 4253 §7.2).
//!
//! ```text
//! K1 = HASH(K || H || X || session_id)      X = 'E' or 'F'
//! K2 = HASH(K || H || K1)
//! K3 = HASH(K || H || K1 || K2)
//! key = (K1 || K2 || ...)[..required_len]
//! ```
//!
//! `K` is the shared secret as the caller encoded it for the exchange hash
//! (an SSH `mpint` or string); it is hashed as given.

use crate::{Direction, MacError, Role};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Letter for the client-to-server integrity key
pub const CLIENT_TO_SERVER_LETTER: u8 = b'E';

/// Letter for the server-to-client integrity key
pub const SERVER_TO_CLIENT_LETTER: u8 = b'F';

/// Hash used by the key exchange, consumed as an opaque capability.
pub trait ExchangeHash {
    /// Digest output size in bytes.
    fn output_len(&self) -> usize;

    /// Hash the concatenation of `parts`.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::DigestError`] if the primitive fails.
    fn hash(&self, parts: &[&[u8]]) -> Result<Vec<u8>, MacError>;
}

/// Exchange-hash digests used by the supported key-exchange methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KexDigest {
    /// SHA-1 (`diffie-hellman-group14-sha1` and older)
    Sha1,
    /// SHA-256 (`curve25519-sha256`, `ecdh-sha2-nistp256`, ...)
    Sha256,
    /// SHA-384 (`ecdh-sha2-nistp384`)
    Sha384,
    /// SHA-512 (`diffie-hellman-group16-sha512`, ...)
    Sha512,
}

impl KexDigest {
    /// Resolve a digest from its short name.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::UnknownAlgorithm`] for unsupported digests.
    pub fn from_name(name: &str) -> Result<Self, MacError> {
        match name {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            _ => Err(MacError::UnknownAlgorithm(name.to_string())),
        }
    }
}

fn hash_parts<D: Digest>(parts: &[&[u8]]) -> Vec<u8> {
    let mut hasher = D::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().to_vec()
}

impl ExchangeHash for KexDigest {
    fn output_len(&self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    fn hash(&self, parts: &[&[u8]]) -> Result<Vec<u8>, MacError> {
        Ok(match self {
            Self::Sha1 => hash_parts::<Sha1>(parts),
            Self::Sha256 => hash_parts::<Sha256>(parts),
            Self::Sha384 => hash_parts::<Sha384>(parts),
            Self::Sha512 => hash_parts::<Sha512>(parts),
        })
    }
}

/// Derived MAC key. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MacKey(Vec<u8>);

impl MacKey {
    /// Get the raw key bytes.
    ///
    /// # Security
    ///
    /// Handle with extreme care - this exposes the raw key material.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the key is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacKey([REDACTED; {}])", self.0.len())
    }
}

/// Letter selecting the integrity key for `direction` as seen by `role`.
///
/// A client writes client-to-server (`E`) and reads server-to-client
/// (`F`); a server does the opposite.
#[must_use]
pub fn direction_letter(role: Role, direction: Direction) -> u8 {
    match (role, direction) {
        (Role::Client, Direction::Write) | (Role::Server, Direction::Read) => {
            CLIENT_TO_SERVER_LETTER
        }
        (Role::Client, Direction::Read) | (Role::Server, Direction::Write) => {
            SERVER_TO_CLIENT_LETTER
        }
    }
}

/// Derive `required_len` bytes of MAC key material.
///
/// Any partially derived material is zeroed before an error propagates.
///
/// # Errors
///
/// Returns [`MacError::DigestError`] if the hash fails or returns a block of
/// the wrong size, and [`MacError::AllocationFailure`] if the key buffer
/// cannot be reserved.
pub fn derive_key<H: ExchangeHash + ?Sized>(
    hash: &H,
    shared_secret: &[u8],
    exchange_hash: &[u8],
    session_id: &[u8],
    letter: u8,
    required_len: usize,
) -> Result<MacKey, MacError> {
    let block_len = hash.output_len();
    if block_len == 0 {
        return Err(MacError::DigestError(
            "exchange hash has zero output size".to_string(),
        ));
    }

    let capacity = required_len
        .div_ceil(block_len)
        .max(1)
        .checked_mul(block_len)
        .ok_or_else(|| {
            MacError::AllocationFailure(format!("MAC key buffer: {required_len} bytes"))
        })?;

    let mut key = Zeroizing::new(Vec::new());
    key.try_reserve_exact(capacity)
        .map_err(|e| MacError::AllocationFailure(format!("MAC key buffer: {e}")))?;

    let letter = [letter];
    let first = Zeroizing::new(hash.hash(&[
        shared_secret,
        exchange_hash,
        letter.as_slice(),
        session_id,
    ])?);
    check_block(&first, block_len)?;
    key.extend_from_slice(&first);

    while key.len() < required_len {
        let next = Zeroizing::new(hash.hash(&[shared_secret, exchange_hash, key.as_slice()])?);
        check_block(&next, block_len)?;
        key.extend_from_slice(&next);
    }

    key[required_len..].zeroize();
    key.truncate(required_len);

    Ok(MacKey(std::mem::take(&mut *key)))
}

fn check_block(block: &[u8], expected: usize) -> Result<(), MacError> {
    if block.len() == expected {
        Ok(())
    } else {
        Err(MacError::DigestError(format!(
            "digest produced {} bytes, expected {expected}",
            block.len()
        )))
    }
}
