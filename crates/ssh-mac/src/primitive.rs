//! Keyed MAC primitives.
//!
//! The engine drives every algorithm through [`KeyedMac`], a
//! `{init, reset, update, finalize}` capability. HMAC backends are built in
//! (RustCrypto `hmac` over SHA-1, SHA-2, MD5 and RIPEMD-160); universal-hash
//! backends for the UMAC family are injected through [`UmacProvider`].

use crate::MacError;
use crate::catalog::{HmacDigest, UMAC64_TAG_LEN, UMAC128_TAG_LEN};
use hmac::{Hmac, Mac};
use md5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Sha256, Sha512};

/// UMAC key size (AES-128 keyed).
pub const UMAC_KEY_LEN: usize = 16;

/// UMAC nonce size: the packet sequence number as a big-endian `u64`.
pub const UMAC_NONCE_LEN: usize = 8;

/// Per-packet UMAC nonce.
pub type UmacNonce = [u8; UMAC_NONCE_LEN];

/// Keyed MAC engine state.
///
/// `init` installs a key, `reset` rewinds to the freshly keyed state,
/// `update` absorbs data, and `finalize` produces the tag and leaves the
/// context ready for the next packet. Nonce-keyed backends require the
/// nonce at `finalize`; hash-based backends ignore it.
pub trait KeyedMac: Send {
    /// Install a key.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the key.
    fn init(&mut self, key: &[u8]) -> Result<(), MacError>;

    /// Rewind to the keyed state, discarding absorbed data.
    fn reset(&mut self);

    /// Absorb data.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::DigestError`] if the context is not keyed.
    fn update(&mut self, data: &[u8]) -> Result<(), MacError>;

    /// Produce the tag for the absorbed data.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::DigestError`] if the context is not keyed or a
    /// required nonce is missing.
    fn finalize(&mut self, nonce: Option<&UmacNonce>) -> Result<Vec<u8>, MacError>;

    /// Native tag length.
    fn output_len(&self) -> usize;
}

/// UMAC output width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UmacVariant {
    /// 64-bit tag
    Umac64,
    /// 128-bit tag
    Umac128,
}

impl UmacVariant {
    /// Tag length in bytes.
    #[must_use]
    pub const fn tag_len(self) -> usize {
        match self {
            Self::Umac64 => UMAC64_TAG_LEN,
            Self::Umac128 => UMAC128_TAG_LEN,
        }
    }
}

/// Factory for universal-hash contexts.
///
/// Installed once per session and shared by both directions.
pub trait UmacProvider: Send + Sync {
    /// Allocate an unkeyed context.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::AllocationFailure`] if the context cannot be created.
    fn allocate(&self, variant: UmacVariant) -> Result<Box<dyn KeyedMac>, MacError>;

    /// Key size the backend expects.
    fn key_len(&self) -> usize {
        UMAC_KEY_LEN
    }
}

enum HmacState {
    Sha1(Hmac<Sha1>),
    Sha256(Hmac<Sha256>),
    Sha512(Hmac<Sha512>),
    Md5(Hmac<Md5>),
    Ripemd160(Hmac<Ripemd160>),
}

macro_rules! with_state {
    ($state:expr, $mac:ident => $body:expr) => {
        match $state {
            HmacState::Sha1($mac) => $body,
            HmacState::Sha256($mac) => $body,
            HmacState::Sha512($mac) => $body,
            HmacState::Md5($mac) => $body,
            HmacState::Ripemd160($mac) => $body,
        }
    };
}

impl HmacState {
    fn new(digest: HmacDigest, key: &[u8]) -> Result<Self, MacError> {
        let state = match digest {
            HmacDigest::Sha1 => <Hmac<Sha1> as Mac>::new_from_slice(key).map(Self::Sha1),
            HmacDigest::Sha256 => <Hmac<Sha256> as Mac>::new_from_slice(key).map(Self::Sha256),
            HmacDigest::Sha512 => <Hmac<Sha512> as Mac>::new_from_slice(key).map(Self::Sha512),
            HmacDigest::Md5 => <Hmac<Md5> as Mac>::new_from_slice(key).map(Self::Md5),
            HmacDigest::Ripemd160 => {
                <Hmac<Ripemd160> as Mac>::new_from_slice(key).map(Self::Ripemd160)
            }
        };

        state.map_err(|e| MacError::DigestError(format!("HMAC key rejected: {e}")))
    }

    /// State keyed with the all-zero block. Its midstates are public.
    fn blank(digest: HmacDigest) -> Self {
        match digest {
            HmacDigest::Sha1 => Self::Sha1(<Hmac<Sha1> as Mac>::new(&Default::default())),
            HmacDigest::Sha256 => Self::Sha256(<Hmac<Sha256> as Mac>::new(&Default::default())),
            HmacDigest::Sha512 => Self::Sha512(<Hmac<Sha512> as Mac>::new(&Default::default())),
            HmacDigest::Md5 => Self::Md5(<Hmac<Md5> as Mac>::new(&Default::default())),
            HmacDigest::Ripemd160 => {
                Self::Ripemd160(<Hmac<Ripemd160> as Mac>::new(&Default::default()))
            }
        }
    }

    fn update(&mut self, data: &[u8]) {
        with_state!(self, mac => mac.update(data));
    }

    fn reset(&mut self) {
        with_state!(self, mac => Mac::reset(mac));
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        with_state!(self, mac => mac.finalize_reset().into_bytes().to_vec())
    }

    fn finalize(self) -> Vec<u8> {
        with_state!(self, mac => mac.finalize().into_bytes().to_vec())
    }
}

/// HMAC backend over one of the catalogue digests.
///
/// Holds one keyed context that rewinds in place after every tag. The keyed
/// ipad/opad midstates are overwritten when the backend is wiped or dropped.
pub struct HmacBackend {
    digest: HmacDigest,
    state: Option<HmacState>,
}

impl HmacBackend {
    /// Create an unkeyed backend.
    #[must_use]
    pub fn new(digest: HmacDigest) -> Self {
        Self {
            digest,
            state: None,
        }
    }

    /// Digest this backend hashes with.
    #[must_use]
    pub fn digest(&self) -> HmacDigest {
        self.digest
    }

    /// Whether a key has been installed.
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        self.state.is_some()
    }

    /// Overwrite the keyed state with a public one and release it.
    pub fn wipe(&mut self) {
        let digest = self.digest;
        if let Some(state) = self.state.as_mut() {
            *state = HmacState::blank(digest);
            let _ = std::hint::black_box(&*state);
        }
        self.state = None;
    }

    /// One-shot HMAC of `data` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::DigestError`] if the key is rejected.
    pub fn oneshot(digest: HmacDigest, key: &[u8], data: &[u8]) -> Result<Vec<u8>, MacError> {
        let mut state = HmacState::new(digest, key)?;
        state.update(data);
        Ok(state.finalize())
    }

    fn keyed_state(&mut self) -> Result<&mut HmacState, MacError> {
        self.state
            .as_mut()
            .ok_or_else(|| MacError::DigestError("HMAC context not keyed".to_string()))
    }
}

impl KeyedMac for HmacBackend {
    fn init(&mut self, key: &[u8]) -> Result<(), MacError> {
        let state = HmacState::new(self.digest, key)?;
        self.wipe();
        self.state = Some(state);
        Ok(())
    }

    fn reset(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.reset();
        }
    }

    fn update(&mut self, data: &[u8]) -> Result<(), MacError> {
        self.keyed_state()?.update(data);
        Ok(())
    }

    fn finalize(&mut self, _nonce: Option<&UmacNonce>) -> Result<Vec<u8>, MacError> {
        Ok(self.keyed_state()?.finalize_reset())
    }

    fn output_len(&self) -> usize {
        self.digest.output_len()
    }
}

impl Drop for HmacBackend {
    fn drop(&mut self) {
        self.wipe();
    }
}
