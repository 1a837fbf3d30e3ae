//! MAC algorithm catalogue.
//!
//! Maps the algorithm identifiers negotiated in `SSH_MSG_KEXINIT` to a
//! [`MacDescriptor`]. Lookup is byte-exact and case-sensitive; anything
//! outside the table is [`MacError::UnknownAlgorithm`].
//!
//! | Name | Family | Tag |
//! |------|--------|-----|
//! | `hmac-sha2-512` | HMAC-SHA-512 | 64 |
//! | `hmac-sha2-256` | HMAC-SHA-256 | 32 |
//! | `umac-128@openssh.com` | UMAC-128 | 16 |
//! | `umac-64@openssh.com` | UMAC-64 | 8 |
//! | `hmac-sha1` | HMAC-SHA-1 | 20 |
//! | `hmac-sha1-96` | HMAC-SHA-1 | 12 |
//! | `hmac-ripemd160` | HMAC-RIPEMD-160 | 20 |
//! | `hmac-ripemd160@openssh.com` | HMAC-RIPEMD-160 | 20 |
//! | `hmac-md5` | HMAC-MD5 | 16 |
//! | `hmac-md5-96` | HMAC-MD5 | 12 |
//! | `none` | none | 0 |

use crate::MacError;

/// UMAC-64 tag size
pub const UMAC64_TAG_LEN: usize = 8;

/// UMAC-128 tag size
pub const UMAC128_TAG_LEN: usize = 16;

/// Hash underlying an HMAC algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HmacDigest {
    /// SHA-1 (20 bytes)
    Sha1,
    /// SHA-256 (32 bytes)
    Sha256,
    /// SHA-512 (64 bytes)
    Sha512,
    /// MD5 (16 bytes)
    Md5,
    /// RIPEMD-160 (20 bytes)
    Ripemd160,
}

impl HmacDigest {
    /// Native digest output size in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 | Self::Ripemd160 => 20,
            Self::Sha256 => 32,
            Self::Sha512 => 64,
            Self::Md5 => 16,
        }
    }
}

/// MAC algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacFamily {
    /// No integrity protection
    None,
    /// Hash-based MAC
    Hmac(HmacDigest),
    /// Nonce-keyed universal hash, 64-bit tag
    Umac64,
    /// Nonce-keyed universal hash, 128-bit tag
    Umac128,
}

impl MacFamily {
    /// Native tag length, or `None` for the unprotected family.
    #[must_use]
    pub const fn native_len(self) -> Option<usize> {
        match self {
            Self::None => None,
            Self::Hmac(digest) => Some(digest.output_len()),
            Self::Umac64 => Some(UMAC64_TAG_LEN),
            Self::Umac128 => Some(UMAC128_TAG_LEN),
        }
    }

    /// Whether this family uses the universal-hash wire encoding.
    #[must_use]
    pub const fn is_umac(self) -> bool {
        matches!(self, Self::Umac64 | Self::Umac128)
    }
}

/// Resolved, immutable description of a negotiated MAC algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacDescriptor {
    name: &'static str,
    family: MacFamily,
    truncated_len: Option<u32>,
}

impl MacDescriptor {
    /// Negotiated identifier
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Algorithm family
    #[must_use]
    pub fn family(&self) -> MacFamily {
        self.family
    }

    /// Truncated tag length, when the name carries a bit-length suffix.
    #[must_use]
    pub fn truncated_len(&self) -> Option<u32> {
        self.truncated_len
    }

    /// Effective tag length after truncation. Zero for `none`.
    #[must_use]
    pub fn mac_len(&self) -> usize {
        match (self.truncated_len, self.family.native_len()) {
            (Some(truncated), Some(_)) => truncated as usize,
            (None, Some(native)) => native,
            (_, None) => 0,
        }
    }
}

const CATALOG: &[(&str, MacFamily)] = &[
    ("hmac-sha2-512", MacFamily::Hmac(HmacDigest::Sha512)),
    ("hmac-sha2-256", MacFamily::Hmac(HmacDigest::Sha256)),
    ("umac-128@openssh.com", MacFamily::Umac128),
    ("umac-64@openssh.com", MacFamily::Umac64),
    ("hmac-sha1", MacFamily::Hmac(HmacDigest::Sha1)),
    ("hmac-sha1-96", MacFamily::Hmac(HmacDigest::Sha1)),
    ("hmac-ripemd160", MacFamily::Hmac(HmacDigest::Ripemd160)),
    ("hmac-ripemd160@openssh.com", MacFamily::Hmac(HmacDigest::Ripemd160)),
    ("hmac-md5", MacFamily::Hmac(HmacDigest::Md5)),
    ("hmac-md5-96", MacFamily::Hmac(HmacDigest::Md5)),
    ("none", MacFamily::None),
];

/// Resolve a negotiated algorithm name.
///
/// # Errors
///
/// Returns [`MacError::UnknownAlgorithm`] for any name outside the catalogue.
pub fn resolve(name: &str) -> Result<MacDescriptor, MacError> {
    let (name, family) = CATALOG
        .iter()
        .copied()
        .find(|(candidate, _)| *candidate == name)
        .ok_or_else(|| MacError::UnknownAlgorithm(name.to_string()))?;

    let truncated_len = match family {
        MacFamily::Hmac(digest) => truncation_suffix(name, digest.output_len()),
        _ => None,
    };

    Ok(MacDescriptor {
        name,
        family,
        truncated_len,
    })
}

/// All supported algorithm names, strongest first.
#[must_use]
pub fn supported_algorithms() -> Vec<&'static str> {
    CATALOG.iter().map(|(name, _)| *name).collect()
}

/// Parse a trailing `-<bits>` suffix into a truncated tag length in bytes.
///
/// A suffix equal to the native size (`hmac-sha2-256`) is not a truncation.
fn truncation_suffix(name: &str, native_len: usize) -> Option<u32> {
    let (_, suffix) = name.rsplit_once('-')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let bits: u32 = suffix.parse().ok()?;
    if bits == 0 || bits % 8 != 0 {
        return None;
    }

    let bytes = bits / 8;
    ((bytes as usize) < native_len).then_some(bytes)
}
