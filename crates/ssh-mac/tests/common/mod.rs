//! Shared fixtures for integration tests.
//!
//! `FakeUmac` stands in for a real UMAC backend: a keyed BLAKE3 over the
//! absorbed data followed by the nonce, truncated to the variant's tag size.
//! It records the last input and nonce so tests can check the wire encoding.

#![allow(dead_code)]

use ssh_mac::MacError;
use ssh_mac::primitive::{KeyedMac, UMAC_KEY_LEN, UmacNonce, UmacProvider, UmacVariant};
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness (`RUST_LOG=ssh_mac=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// What the last `finalize` call saw.
#[derive(Debug, Default, Clone)]
pub struct Observed {
    pub key: Vec<u8>,
    pub input: Vec<u8>,
    pub nonce: Option<UmacNonce>,
}

pub struct FakeUmac {
    variant: UmacVariant,
    key: Option<[u8; 32]>,
    raw_key: Vec<u8>,
    buffer: Vec<u8>,
    observed: Arc<Mutex<Observed>>,
}

impl KeyedMac for FakeUmac {
    fn init(&mut self, key: &[u8]) -> Result<(), MacError> {
        if key.len() != UMAC_KEY_LEN {
            return Err(MacError::InvalidKeyLength {
                expected: UMAC_KEY_LEN,
                actual: key.len(),
            });
        }
        self.key = Some(blake3::derive_key("ssh-mac fake umac", key));
        self.raw_key = key.to_vec();
        self.buffer.clear();
        Ok(())
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn update(&mut self, data: &[u8]) -> Result<(), MacError> {
        if self.key.is_none() {
            return Err(MacError::DigestError("fake umac not keyed".to_string()));
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    fn finalize(&mut self, nonce: Option<&UmacNonce>) -> Result<Vec<u8>, MacError> {
        let key = self
            .key
            .ok_or_else(|| MacError::DigestError("fake umac not keyed".to_string()))?;
        let nonce = nonce.ok_or_else(|| MacError::DigestError("missing nonce".to_string()))?;

        let mut hasher = blake3::Hasher::new_keyed(&key);
        hasher.update(&self.buffer);
        hasher.update(nonce);
        let mut tag = vec![0u8; self.variant.tag_len()];
        hasher.finalize_xof().fill(&mut tag);

        *self.observed.lock().unwrap() = Observed {
            key: self.raw_key.clone(),
            input: std::mem::take(&mut self.buffer),
            nonce: Some(*nonce),
        };
        Ok(tag)
    }

    fn output_len(&self) -> usize {
        self.variant.tag_len()
    }
}

/// Provider handing out `FakeUmac` contexts that share one observation slot.
#[derive(Default)]
pub struct FakeUmacProvider {
    pub observed: Arc<Mutex<Observed>>,
}

impl FakeUmacProvider {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn last(&self) -> Observed {
        self.observed.lock().unwrap().clone()
    }
}

impl UmacProvider for FakeUmacProvider {
    fn allocate(&self, variant: UmacVariant) -> Result<Box<dyn KeyedMac>, MacError> {
        Ok(Box::new(FakeUmac {
            variant,
            key: None,
            raw_key: Vec::new(),
            buffer: Vec::new(),
            observed: Arc::clone(&self.observed),
        }))
    }
}

/// Provider whose contexts return tags one byte short.
pub struct ShortTagProvider;

struct ShortTag;

impl KeyedMac for ShortTag {
    fn init(&mut self, _key: &[u8]) -> Result<(), MacError> {
        Ok(())
    }

    fn reset(&mut self) {}

    fn update(&mut self, _data: &[u8]) -> Result<(), MacError> {
        Ok(())
    }

    fn finalize(&mut self, _nonce: Option<&UmacNonce>) -> Result<Vec<u8>, MacError> {
        Ok(vec![0u8; 7])
    }

    fn output_len(&self) -> usize {
        8
    }
}

impl UmacProvider for ShortTagProvider {
    fn allocate(&self, _variant: UmacVariant) -> Result<Box<dyn KeyedMac>, MacError> {
        Ok(Box::new(ShortTag))
    }
}
