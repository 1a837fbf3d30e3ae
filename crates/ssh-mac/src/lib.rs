//! # ssh-mac
//!
//! Per-packet integrity layer for SSH-family transports.
//!
//! This crate provides:
//! - An algorithm catalogue for the negotiated MAC identifiers
//! - RFC 4253 §7.2 MAC key derivation with iterative hash extension
//! - HMAC tags over `seq || packet` and UMAC tags over `packet` with a
//!   sequence-number nonce
//! - Two-generation slots per direction so packets framed under the old key
//!   keep verifying until the new key is installed
//! - Zeroization of key material on every retirement path
//!
//! ## Supported Algorithms
//!
//! | Family | Names | Tag |
//! |--------|-------|-----|
//! | HMAC | `hmac-sha2-512`, `hmac-sha2-256`, `hmac-sha1`, `hmac-ripemd160`, `hmac-md5` | digest size |
//! | HMAC (truncated) | `hmac-sha1-96`, `hmac-md5-96` | 12 |
//! | UMAC | `umac-64@openssh.com`, `umac-128@openssh.com` | 8 / 16 |
//! | None | `none` | 0 |
//!
//! UMAC contexts come from an injected [`primitive::UmacProvider`].
//!
//! ## Usage
//!
//! ```ignore
//! use ssh_mac::{Direction, MacConfig, MacSession, Packet, Role};
//! use ssh_mac::kdf::KexDigest;
//!
//! let mut session = MacSession::init(MacConfig::default())?;
//! session.set_algorithm(Direction::Write, "hmac-sha2-256")?;
//! session.set_key(Direction::Write, &KexDigest::Sha256, &k, &h, &session_id, Role::Client)?;
//!
//! let tag = session.compute(Direction::Write, seq, &packet)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod constant_time;
pub mod engine;
pub mod error;
pub mod generation;
pub mod kdf;
pub mod primitive;
pub mod session;

pub use catalog::{MacDescriptor, MacFamily};
pub use config::MacConfig;
pub use engine::Packet;
pub use error::MacError;
pub use generation::{DirectionState, MacGeneration};
pub use session::MacSession;

/// Largest tag any catalogue algorithm produces (HMAC-SHA-512).
pub const MAX_TAG_LEN: usize = 64;

/// Packet flow direction, from the local side's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Packets received from the peer
    Read,
    /// Packets sent to the peer
    Write,
}

impl Direction {
    /// Lowercase label for logging
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Local SSH role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Connection initiator
    Client,
    /// Connection responder
    Server,
}
