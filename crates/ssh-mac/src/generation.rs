//! Two-generation MAC slots and the rekey transition.
//!
//! Each direction owns two [`MacGeneration`] slots and an active pointer.
//! A rekey runs strictly in order:
//!
//! 1. `set_algorithm` prepares the inactive slot (or the active one when
//!    nothing is keyed yet). Traffic keeps using the active generation.
//! 2. `set_key` derives and installs the new key, then retires the old
//!    generation (key zeroized, context dropped) and flips the active
//!    pointer in one synchronous step.
//!
//! The active pointer is only ever changed inside `set_key`.

use crate::catalog::{self, MacDescriptor, MacFamily};
use crate::kdf::{self, ExchangeHash, MacKey};
use crate::primitive::{HmacBackend, KeyedMac, UmacProvider, UmacVariant};
use crate::{Direction, MacConfig, MacError, Role};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroize;

/// Position in a direction's two-slot ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotIndex {
    /// First slot
    Zero,
    /// Second slot
    One,
}

impl SlotIndex {
    /// The opposite slot.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Zero => Self::One,
            Self::One => Self::Zero,
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Zero => 0,
            Self::One => 1,
        }
    }
}

/// Keyed MAC state for one slot of one direction.
pub struct MacGeneration {
    descriptor: Option<MacDescriptor>,
    key: Option<MacKey>,
    pub(crate) primitive: Option<Box<dyn KeyedMac>>,
    mac_len: usize,
    block_size: usize,
}

impl MacGeneration {
    const fn empty() -> Self {
        Self {
            descriptor: None,
            key: None,
            primitive: None,
            mac_len: 0,
            block_size: 0,
        }
    }

    /// Algorithm this slot was prepared with
    #[must_use]
    pub fn descriptor(&self) -> Option<&MacDescriptor> {
        self.descriptor.as_ref()
    }

    /// Algorithm name, if prepared
    #[must_use]
    pub fn algorithm(&self) -> Option<&'static str> {
        self.descriptor.map(|d| d.name())
    }

    /// Installed key bytes.
    ///
    /// # Security
    ///
    /// Handle with extreme care - this exposes the raw key material.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.key.as_ref().map(MacKey::as_bytes)
    }

    /// Installed key length, zero when keyless
    #[must_use]
    pub fn key_length(&self) -> usize {
        self.key.as_ref().map_or(0, MacKey::len)
    }

    /// Effective tag length after truncation
    #[must_use]
    pub fn mac_length(&self) -> usize {
        self.mac_len
    }

    /// Whether key material is installed
    #[must_use]
    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// Tag-derived block granularity contributed by this slot
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn prepare(&mut self, descriptor: MacDescriptor, primitive: Option<Box<dyn KeyedMac>>) {
        if let Some(mut key) = self.key.take() {
            key.zeroize();
        }
        self.primitive = primitive;
        self.mac_len = descriptor.mac_len();
        self.descriptor = Some(descriptor);
    }

    fn install_key(&mut self, key: MacKey) -> Result<(), MacError> {
        let primitive = self.primitive.as_deref_mut().ok_or_else(|| {
            MacError::DigestError("no primitive context allocated for slot".to_string())
        })?;
        primitive.init(key.as_bytes())?;

        if let Some(mut old) = self.key.replace(key) {
            old.zeroize();
        }
        Ok(())
    }

    fn raise_block_size(&mut self, size: usize) {
        if size > self.block_size {
            self.block_size = size;
        }
    }

    fn retire(&mut self) {
        if let Some(mut key) = self.key.take() {
            key.zeroize();
        }
        self.primitive = None;
        self.descriptor = None;
        self.mac_len = 0;
        self.block_size = 0;
    }
}

impl fmt::Debug for MacGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacGeneration")
            .field("algorithm", &self.algorithm())
            .field("key_length", &self.key_length())
            .field("mac_length", &self.mac_len)
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

/// MAC state for one direction: two generation slots and the active pointer.
pub struct DirectionState {
    direction: Direction,
    slots: [MacGeneration; 2],
    active: SlotIndex,
    pending: Option<SlotIndex>,
    umac: Option<Arc<dyn UmacProvider>>,
    config: MacConfig,
}

impl DirectionState {
    /// Create keyless state for `direction`.
    #[must_use]
    pub fn new(
        direction: Direction,
        config: MacConfig,
        umac: Option<Arc<dyn UmacProvider>>,
    ) -> Self {
        Self {
            direction,
            slots: [MacGeneration::empty(), MacGeneration::empty()],
            active: SlotIndex::Zero,
            pending: None,
            umac,
            config,
        }
    }

    /// Direction this state serves
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Install or replace the universal-hash backend.
    pub fn set_umac_provider(&mut self, provider: Arc<dyn UmacProvider>) {
        self.umac = Some(provider);
    }

    /// Prepare a generation for the negotiated algorithm `name`.
    ///
    /// Targets the inactive slot while the active one holds a key (a rekey),
    /// otherwise the active slot itself. Key material and the active pointer
    /// are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::UnknownAlgorithm`] for unsupported names and
    /// [`MacError::BackendUnavailable`] for UMAC without a provider.
    pub fn set_algorithm(&mut self, name: &str) -> Result<(), MacError> {
        let descriptor = catalog::resolve(name)?;
        let primitive = self.allocate(&descriptor)?;

        let target = if self.current().is_keyed() {
            self.active.other()
        } else {
            self.active
        };

        self.slots[target.index()].prepare(descriptor, primitive);
        self.pending = Some(target);

        tracing::debug!(
            "Prepared {} MAC {} in slot {:?} (rekey: {})",
            self.direction.as_str(),
            descriptor.name(),
            target,
            target != self.active
        );
        Ok(())
    }

    /// Derive the key for the prepared generation and make it active.
    ///
    /// The previous generation is retired only after the new key is
    /// installed, so a failure leaves the old generation serving traffic.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::AlgorithmNotSet`] if no generation is prepared,
    /// or any derivation / primitive error.
    pub fn set_key<H: ExchangeHash + ?Sized>(
        &mut self,
        hash: &H,
        shared_secret: &[u8],
        exchange_hash: &[u8],
        session_id: &[u8],
        role: Role,
    ) -> Result<(), MacError> {
        let target = self.pending.ok_or(MacError::AlgorithmNotSet)?;
        let descriptor = self.slots[target.index()]
            .descriptor
            .ok_or(MacError::AlgorithmNotSet)?;

        if let Some(key_len) = self.required_key_len(&descriptor)? {
            let letter = kdf::direction_letter(role, self.direction);
            let key = kdf::derive_key(
                hash,
                shared_secret,
                exchange_hash,
                session_id,
                letter,
                key_len,
            )?;
            self.slots[target.index()].install_key(key)?;
        }

        self.pending = None;
        self.switch_to(target);
        Ok(())
    }

    fn switch_to(&mut self, target: SlotIndex) {
        if target != self.active {
            let previous = &mut self.slots[self.active.index()];
            let retired = previous.algorithm();
            previous.retire();
            tracing::debug!(
                "Retired {} MAC generation {:?} ({})",
                self.direction.as_str(),
                self.active,
                retired.unwrap_or("none")
            );
            self.active = target;
        }

        let active = &mut self.slots[target.index()];
        let mac_len = active.mac_len;
        active.raise_block_size(mac_len);

        tracing::debug!(
            "Activated {} MAC {} in slot {:?}",
            self.direction.as_str(),
            active.algorithm().unwrap_or("none"),
            target
        );
    }

    fn umac_provider(&self, descriptor: &MacDescriptor) -> Result<&dyn UmacProvider, MacError> {
        self.umac
            .as_deref()
            .ok_or_else(|| MacError::BackendUnavailable(descriptor.name().to_string()))
    }

    /// Allocate an unkeyed context, rejecting backends too narrow for the tag.
    fn allocate(&self, descriptor: &MacDescriptor) -> Result<Option<Box<dyn KeyedMac>>, MacError> {
        let primitive: Box<dyn KeyedMac> = match descriptor.family() {
            MacFamily::None => return Ok(None),
            MacFamily::Hmac(digest) => Box::new(HmacBackend::new(digest)),
            MacFamily::Umac64 => self
                .umac_provider(descriptor)?
                .allocate(UmacVariant::Umac64)?,
            MacFamily::Umac128 => self
                .umac_provider(descriptor)?
                .allocate(UmacVariant::Umac128)?,
        };

        if primitive.output_len() < descriptor.mac_len() {
            tracing::error!(
                "Backend for {} outputs {} bytes, tag needs {}",
                descriptor.name(),
                primitive.output_len(),
                descriptor.mac_len()
            );
            return Err(MacError::BackendUnavailable(descriptor.name().to_string()));
        }
        Ok(Some(primitive))
    }

    /// Key length for `descriptor`, or `None` when the algorithm is keyless.
    ///
    /// HMAC keys are the full digest size even for truncated tags.
    fn required_key_len(&self, descriptor: &MacDescriptor) -> Result<Option<usize>, MacError> {
        let natural = match descriptor.family() {
            MacFamily::None => return Ok(None),
            MacFamily::Hmac(digest) => digest.output_len(),
            MacFamily::Umac64 | MacFamily::Umac128 => self.umac_provider(descriptor)?.key_len(),
        };
        Ok(Some(self.config.effective_key_len(natural)))
    }

    /// Generation serving packet traffic
    #[must_use]
    pub fn current(&self) -> &MacGeneration {
        &self.slots[self.active.index()]
    }

    pub(crate) fn current_mut(&mut self) -> &mut MacGeneration {
        &mut self.slots[self.active.index()]
    }

    /// Read-only view of either slot
    #[must_use]
    pub fn generation(&self, index: SlotIndex) -> &MacGeneration {
        &self.slots[index.index()]
    }

    /// Slot currently serving traffic
    #[must_use]
    pub fn active_slot(&self) -> SlotIndex {
        self.active
    }

    /// Whether a prepared generation is waiting for its key
    #[must_use]
    pub fn pending_rekey(&self) -> bool {
        self.pending.is_some()
    }

    /// Active algorithm name, when keyed or when the algorithm is `none`.
    #[must_use]
    pub fn algorithm(&self) -> Option<&'static str> {
        let current = self.current();
        let descriptor = current.descriptor()?;
        (current.is_keyed() || descriptor.family() == MacFamily::None).then(|| descriptor.name())
    }

    /// Tag-derived block granularity for read-ahead sizing.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.current().block_size
    }

    /// Raise the active generation's block granularity. Never lowers it.
    pub fn set_block_size(&mut self, size: usize) {
        self.current_mut().raise_block_size(size);
    }

    /// Zeroize and release both slots.
    pub fn teardown(&mut self) {
        for slot in &mut self.slots {
            slot.retire();
        }
        self.active = SlotIndex::Zero;
        self.pending = None;
        tracing::debug!("Released {} MAC state", self.direction.as_str());
    }
}

impl fmt::Debug for DirectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectionState")
            .field("direction", &self.direction)
            .field("slots", &self.slots)
            .field("active", &self.active)
            .field("pending", &self.pending)
            .field("umac", &self.umac.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Packet;
    use crate::kdf::KexDigest;
    use crate::primitive::UmacNonce;

    const K: &[u8] = b"shared secret";
    const H: &[u8] = b"exchange hash";
    const SID: &[u8] = b"session id";

    fn state() -> DirectionState {
        DirectionState::new(Direction::Write, MacConfig::default(), None)
    }

    fn key(state: &mut DirectionState, h: &[u8]) {
        state
            .set_key(&KexDigest::Sha256, K, h, SID, Role::Client)
            .unwrap();
    }

    #[test]
    fn test_new_state_is_keyless() {
        let state = state();
        assert!(!state.current().is_keyed());
        assert_eq!(state.algorithm(), None);
        assert_eq!(state.block_size(), 0);
        assert!(!state.pending_rekey());
    }

    #[test]
    fn test_first_setup_uses_active_slot() {
        let mut state = state();
        state.set_algorithm("hmac-sha2-256").unwrap();
        assert_eq!(state.active_slot(), SlotIndex::Zero);
        assert!(state.pending_rekey());

        key(&mut state, H);
        assert_eq!(state.active_slot(), SlotIndex::Zero);
        assert_eq!(state.algorithm(), Some("hmac-sha2-256"));
        assert_eq!(state.current().key_length(), 32);
        assert_eq!(state.block_size(), 32);
        assert!(!state.pending_rekey());
    }

    #[test]
    fn test_rekey_prepares_other_slot() {
        let mut state = state();
        state.set_algorithm("hmac-sha1").unwrap();
        key(&mut state, H);

        state.set_algorithm("hmac-sha2-512").unwrap();
        assert_eq!(state.active_slot(), SlotIndex::Zero);
        assert_eq!(state.algorithm(), Some("hmac-sha1"));
        assert_eq!(
            state.generation(SlotIndex::One).algorithm(),
            Some("hmac-sha2-512")
        );
        assert!(!state.generation(SlotIndex::One).is_keyed());

        key(&mut state, b"second exchange hash");
        assert_eq!(state.active_slot(), SlotIndex::One);
        assert_eq!(state.algorithm(), Some("hmac-sha2-512"));
        assert!(!state.generation(SlotIndex::Zero).is_keyed());
        assert_eq!(state.generation(SlotIndex::Zero).algorithm(), None);
        assert_eq!(state.generation(SlotIndex::Zero).block_size(), 0);
    }

    #[test]
    fn test_truncated_hmac_gets_full_key() {
        let mut state = state();
        state.set_algorithm("hmac-sha1-96").unwrap();
        key(&mut state, H);
        assert_eq!(state.current().key_length(), 20);
        assert_eq!(state.current().mac_length(), 12);
        assert_eq!(state.block_size(), 12);
    }

    #[test]
    fn test_legacy_peer_key_clamp() {
        let mut state = DirectionState::new(Direction::Read, MacConfig::legacy_peer(), None);
        state.set_algorithm("hmac-sha2-512").unwrap();
        key(&mut state, H);
        assert_eq!(state.current().key_length(), 16);
        assert_eq!(state.current().mac_length(), 64);
    }

    #[test]
    fn test_set_key_without_algorithm() {
        let mut state = state();
        let result = state.set_key(&KexDigest::Sha256, K, H, SID, Role::Server);
        assert_eq!(result, Err(MacError::AlgorithmNotSet));
    }

    #[test]
    fn test_unknown_algorithm_leaves_state() {
        let mut state = state();
        state.set_algorithm("hmac-sha1").unwrap();
        key(&mut state, H);

        assert!(matches!(
            state.set_algorithm("hmac-sha3-256"),
            Err(MacError::UnknownAlgorithm(_))
        ));
        assert!(!state.pending_rekey());
        assert_eq!(state.algorithm(), Some("hmac-sha1"));
    }

    #[test]
    fn test_umac_without_provider() {
        let mut state = state();
        assert_eq!(
            state.set_algorithm("umac-64@openssh.com"),
            Err(MacError::BackendUnavailable(
                "umac-64@openssh.com".to_string()
            ))
        );
    }

    struct Narrow;

    impl KeyedMac for Narrow {
        fn init(&mut self, _key: &[u8]) -> Result<(), MacError> {
            Ok(())
        }

        fn reset(&mut self) {}

        fn update(&mut self, _data: &[u8]) -> Result<(), MacError> {
            Ok(())
        }

        fn finalize(&mut self, _nonce: Option<&UmacNonce>) -> Result<Vec<u8>, MacError> {
            Ok(vec![0u8; 4])
        }

        fn output_len(&self) -> usize {
            4
        }
    }

    struct NarrowProvider;

    impl UmacProvider for NarrowProvider {
        fn allocate(&self, _variant: UmacVariant) -> Result<Box<dyn KeyedMac>, MacError> {
            Ok(Box::new(Narrow))
        }
    }

    #[test]
    fn test_narrow_backend_rejected() {
        let mut state = DirectionState::new(
            Direction::Read,
            MacConfig::default(),
            Some(Arc::new(NarrowProvider)),
        );
        assert_eq!(
            state.set_algorithm("umac-128@openssh.com"),
            Err(MacError::BackendUnavailable(
                "umac-128@openssh.com".to_string()
            ))
        );
        assert!(!state.pending_rekey());
        assert_eq!(state.generation(SlotIndex::Zero).algorithm(), None);
    }

    struct BrokenHash;

    impl ExchangeHash for BrokenHash {
        fn output_len(&self) -> usize {
            32
        }

        fn hash(&self, _parts: &[&[u8]]) -> Result<Vec<u8>, MacError> {
            Err(MacError::DigestError("hash unavailable".to_string()))
        }
    }

    #[test]
    fn test_failed_rekey_keeps_old_generation() {
        let mut state = state();
        state.set_algorithm("hmac-sha2-256").unwrap();
        key(&mut state, H);

        let packet = Packet::new(b"in flight", b"padding!").unwrap();
        let tag = state.compute(4, &packet).unwrap();

        state.set_algorithm("hmac-sha2-512").unwrap();
        let result = state.set_key(&BrokenHash, K, b"next", SID, Role::Client);
        assert!(matches!(result, Err(MacError::DigestError(_))));

        assert_eq!(state.active_slot(), SlotIndex::Zero);
        assert_eq!(state.algorithm(), Some("hmac-sha2-256"));
        assert_eq!(state.block_size(), 32);
        assert!(state.pending_rekey());
        assert!(!state.generation(SlotIndex::One).is_keyed());
        assert_eq!(state.compute(4, &packet).unwrap(), tag);
        assert!(state.verify(4, &packet, &tag).is_ok());

        // The prepared generation can still be keyed afterwards
        key(&mut state, b"next");
        assert_eq!(state.active_slot(), SlotIndex::One);
        assert_eq!(state.algorithm(), Some("hmac-sha2-512"));
    }

    #[test]
    fn test_none_algorithm_reported() {
        let mut state = state();
        state.set_algorithm("none").unwrap();
        key(&mut state, H);
        assert!(!state.current().is_keyed());
        assert_eq!(state.algorithm(), Some("none"));
        assert_eq!(state.block_size(), 0);
    }

    #[test]
    fn test_rekey_to_none_retires_old_key() {
        let mut state = state();
        state.set_algorithm("hmac-md5").unwrap();
        key(&mut state, H);

        state.set_algorithm("none").unwrap();
        key(&mut state, H);
        assert_eq!(state.active_slot(), SlotIndex::One);
        assert_eq!(state.algorithm(), Some("none"));
        assert!(!state.generation(SlotIndex::Zero).is_keyed());
    }

    #[test]
    fn test_set_block_size_only_raises() {
        let mut state = state();
        state.set_algorithm("hmac-sha1").unwrap();
        key(&mut state, H);

        state.set_block_size(16);
        assert_eq!(state.block_size(), 20);
        state.set_block_size(32);
        assert_eq!(state.block_size(), 32);
    }

    #[test]
    fn test_teardown_clears_everything() {
        let mut state = state();
        state.set_algorithm("hmac-sha1").unwrap();
        key(&mut state, H);
        state.set_algorithm("hmac-sha2-256").unwrap();

        state.teardown();
        for index in [SlotIndex::Zero, SlotIndex::One] {
            let generation = state.generation(index);
            assert!(!generation.is_keyed());
            assert_eq!(generation.key(), None);
            assert_eq!(generation.algorithm(), None);
        }
        assert!(!state.pending_rekey());
        assert_eq!(state.block_size(), 0);
    }

    #[test]
    fn test_debug_never_prints_key() {
        let mut state = state();
        state.set_algorithm("hmac-sha2-256").unwrap();
        key(&mut state, H);

        let key_hex: String = state
            .current()
            .key()
            .unwrap()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let debug = format!("{state:?}");
        assert!(debug.contains("hmac-sha2-256"));
        assert!(!debug.contains(&key_hex));
    }
}
