//! Session-level MAC state: one [`DirectionState`] per direction.

use crate::engine::Packet;
use crate::generation::{DirectionState, MacGeneration};
use crate::kdf::ExchangeHash;
use crate::primitive::UmacProvider;
use crate::{Direction, MacConfig, MacError, Role};
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// MAC state for one SSH session.
///
/// Owns both directions and the session identifier, which is fixed by the
/// first key exchange and must not change on rekey. Key material is
/// zeroized on [`teardown`](Self::teardown) and on drop.
pub struct MacSession {
    read: DirectionState,
    write: DirectionState,
    session_id: Option<Zeroizing<Vec<u8>>>,
    config: MacConfig,
}

impl MacSession {
    /// Create keyless state for both directions.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::InvalidConfig`] if `config` is invalid.
    pub fn init(config: MacConfig) -> Result<Self, MacError> {
        config.validate()?;
        if !config.peer_supports_full_mac_key {
            tracing::info!(
                "Peer requires legacy MAC key length of {} bytes",
                config.legacy_mac_key_len
            );
        }

        Ok(Self {
            read: DirectionState::new(Direction::Read, config.clone(), None),
            write: DirectionState::new(Direction::Write, config.clone(), None),
            session_id: None,
            config,
        })
    }

    /// Install a universal-hash backend for both directions.
    #[must_use]
    pub fn with_umac_provider(mut self, provider: Arc<dyn UmacProvider>) -> Self {
        self.read.set_umac_provider(Arc::clone(&provider));
        self.write.set_umac_provider(provider);
        self
    }

    /// Configuration the session was created with
    #[must_use]
    pub fn config(&self) -> &MacConfig {
        &self.config
    }

    /// Pinned session identifier, once the first key is installed
    #[must_use]
    pub fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_ref().map(|id| id.as_slice())
    }

    /// State for one direction
    #[must_use]
    pub fn direction(&self, direction: Direction) -> &DirectionState {
        match direction {
            Direction::Read => &self.read,
            Direction::Write => &self.write,
        }
    }

    /// Mutable state for one direction
    pub fn direction_mut(&mut self, direction: Direction) -> &mut DirectionState {
        match direction {
            Direction::Read => &mut self.read,
            Direction::Write => &mut self.write,
        }
    }

    /// Borrow both directions at once, `(read, write)`.
    pub fn split_mut(&mut self) -> (&mut DirectionState, &mut DirectionState) {
        (&mut self.read, &mut self.write)
    }

    /// Prepare a generation for `name` in `direction`.
    ///
    /// # Errors
    ///
    /// See [`DirectionState::set_algorithm`].
    pub fn set_algorithm(&mut self, direction: Direction, name: &str) -> Result<(), MacError> {
        self.direction_mut(direction).set_algorithm(name)
    }

    /// Derive and activate the key for the prepared generation.
    ///
    /// The first call pins `session_id`; later calls must pass the same
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::SessionIdChanged`] if `session_id` differs from
    /// the pinned value, otherwise see [`DirectionState::set_key`].
    pub fn set_key<H: ExchangeHash + ?Sized>(
        &mut self,
        direction: Direction,
        hash: &H,
        shared_secret: &[u8],
        exchange_hash: &[u8],
        session_id: &[u8],
        role: Role,
    ) -> Result<(), MacError> {
        if let Some(pinned) = &self.session_id {
            if !crate::constant_time::ct_eq(pinned, session_id) {
                tracing::warn!(
                    "Rejected {} MAC key: session identifier changed",
                    direction.as_str()
                );
                return Err(MacError::SessionIdChanged);
            }
        }

        self.direction_mut(direction).set_key(
            hash,
            shared_secret,
            exchange_hash,
            session_id,
            role,
        )?;

        if self.session_id.is_none() {
            self.session_id = Some(Zeroizing::new(session_id.to_vec()));
        }
        Ok(())
    }

    /// Compute the tag for an outgoing packet.
    ///
    /// # Errors
    ///
    /// See [`DirectionState::compute`].
    pub fn compute(
        &mut self,
        direction: Direction,
        sequence_no: u32,
        packet: &Packet<'_>,
    ) -> Result<Vec<u8>, MacError> {
        self.direction_mut(direction).compute(sequence_no, packet)
    }

    /// Append the tag for an outgoing packet to `out`.
    ///
    /// # Errors
    ///
    /// See [`DirectionState::compute_into`].
    pub fn compute_into(
        &mut self,
        direction: Direction,
        sequence_no: u32,
        packet: &Packet<'_>,
        out: &mut Vec<u8>,
    ) -> Result<usize, MacError> {
        self.direction_mut(direction)
            .compute_into(sequence_no, packet, out)
    }

    /// Verify the tag of an incoming packet.
    ///
    /// # Errors
    ///
    /// See [`DirectionState::verify`].
    pub fn verify(
        &mut self,
        direction: Direction,
        sequence_no: u32,
        packet: &Packet<'_>,
        received: &[u8],
    ) -> Result<(), MacError> {
        self.direction_mut(direction)
            .verify(sequence_no, packet, received)
    }

    /// Active generation for `direction`
    #[must_use]
    pub fn current(&self, direction: Direction) -> &MacGeneration {
        self.direction(direction).current()
    }

    /// Active algorithm name for `direction`, when keyed or `none`.
    #[must_use]
    pub fn algorithm(&self, direction: Direction) -> Option<&'static str> {
        self.direction(direction).algorithm()
    }

    /// Whether `direction` has a prepared generation awaiting its key
    #[must_use]
    pub fn pending_rekey(&self, direction: Direction) -> bool {
        self.direction(direction).pending_rekey()
    }

    /// Tag-derived block granularity for `direction`
    #[must_use]
    pub fn block_size(&self, direction: Direction) -> usize {
        self.direction(direction).block_size()
    }

    /// Raise the block granularity for `direction`.
    pub fn set_block_size(&mut self, direction: Direction, size: usize) {
        self.direction_mut(direction).set_block_size(size);
    }

    /// Zeroize and release all key material and the session identifier.
    pub fn teardown(&mut self) {
        self.read.teardown();
        self.write.teardown();
        self.session_id = None;
    }
}

impl Drop for MacSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for MacSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacSession")
            .field("read", &self.read)
            .field("write", &self.write)
            .field("session_id_pinned", &self.session_id.is_some())
            .field("config", &self.config)
            .finish()
    }
}
