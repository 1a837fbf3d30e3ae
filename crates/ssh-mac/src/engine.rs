//! Per-packet MAC computation and verification.
//!
//! The two families authenticate different encodings of the same packet:
//!
//! ```text
//! HMAC:  MAC(key, uint32 seq || uint32 packet_length || byte padding_length
//!                 || payload || padding)
//! UMAC:  UMAC(key, nonce = uint64 seq,
//!             uint32 packet_length || byte padding_length || payload || padding)
//! ```
//!
//! All integers are big-endian. Verification recomputes the tag and
//! compares it in constant time.

use crate::catalog::MacFamily;
use crate::constant_time;
use crate::generation::{DirectionState, MacGeneration};
use crate::primitive::UmacNonce;
use crate::MacError;
use zeroize::Zeroizing;

/// Fields of a framed binary packet, as supplied by the framing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    /// `packet_length` field (padding length byte + payload + padding)
    pub packet_length: u32,
    /// `padding_length` field
    pub padding_length: u8,
    /// Payload bytes
    pub payload: &'a [u8],
    /// Random padding bytes
    pub padding: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Build a packet, filling in both length fields.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::InvalidPacket`] if `padding` is longer than 255
    /// bytes or the packet does not fit a `u32` length field.
    pub fn new(payload: &'a [u8], padding: &'a [u8]) -> Result<Self, MacError> {
        let padding_length = u8::try_from(padding.len()).map_err(|_| {
            MacError::InvalidPacket(format!("padding of {} bytes exceeds 255", padding.len()))
        })?;
        let packet_length = payload
            .len()
            .checked_add(1 + padding.len())
            .and_then(|len| u32::try_from(len).ok())
            .ok_or_else(|| {
                MacError::InvalidPacket(format!("payload of {} bytes too long", payload.len()))
            })?;

        Ok(Self {
            packet_length,
            padding_length,
            payload,
            padding,
        })
    }

    fn encoded_len(&self) -> usize {
        4 + 1 + self.payload.len() + self.padding.len()
    }
}

fn encode(sequence_no: Option<u32>, packet: &Packet<'_>) -> Result<Zeroizing<Vec<u8>>, MacError> {
    let len = sequence_no.map_or(0, |_| 4) + packet.encoded_len();

    let mut buf = Zeroizing::new(Vec::new());
    buf.try_reserve_exact(len)
        .map_err(|e| MacError::AllocationFailure(format!("MAC input buffer: {e}")))?;

    if let Some(seq) = sequence_no {
        buf.extend_from_slice(&seq.to_be_bytes());
    }
    buf.extend_from_slice(&packet.packet_length.to_be_bytes());
    buf.push(packet.padding_length);
    buf.extend_from_slice(packet.payload);
    buf.extend_from_slice(packet.padding);
    Ok(buf)
}

/// HMAC input: `seq || packet_length || padding_length || payload || padding`.
///
/// # Errors
///
/// Returns [`MacError::AllocationFailure`] if the buffer cannot be reserved.
pub fn hmac_input(sequence_no: u32, packet: &Packet<'_>) -> Result<Zeroizing<Vec<u8>>, MacError> {
    encode(Some(sequence_no), packet)
}

/// UMAC input: `packet_length || padding_length || payload || padding`.
///
/// # Errors
///
/// Returns [`MacError::AllocationFailure`] if the buffer cannot be reserved.
pub fn umac_input(packet: &Packet<'_>) -> Result<Zeroizing<Vec<u8>>, MacError> {
    encode(None, packet)
}

/// UMAC nonce: the sequence number widened to a big-endian `u64`.
#[must_use]
pub fn umac_nonce(sequence_no: u32) -> UmacNonce {
    u64::from(sequence_no).to_be_bytes()
}

impl MacGeneration {
    /// Compute the tag for `packet` under this generation.
    ///
    /// Returns an empty tag for `none` and for a generation without a key.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::MacComputationFailed`] if a protected algorithm
    /// yields a short or empty tag, or any primitive error.
    pub fn compute(&mut self, sequence_no: u32, packet: &Packet<'_>) -> Result<Vec<u8>, MacError> {
        let Some(descriptor) = self.descriptor().copied() else {
            return Ok(Vec::new());
        };
        if descriptor.family() == MacFamily::None || !self.is_keyed() {
            return Ok(Vec::new());
        }

        let name = descriptor.name();
        let mac_len = self.mac_length();
        let primitive = self
            .primitive
            .as_deref_mut()
            .ok_or_else(|| MacError::MacComputationFailed(name.to_string()))?;

        primitive.reset();
        let mut tag = if descriptor.family().is_umac() {
            let input = umac_input(packet)?;
            primitive.update(&input)?;
            primitive.finalize(Some(&umac_nonce(sequence_no)))?
        } else {
            let input = hmac_input(sequence_no, packet)?;
            primitive.update(&input)?;
            primitive.finalize(None)?
        };

        if tag.is_empty() || tag.len() < mac_len {
            tracing::error!(
                "MAC computation using {} produced {} bytes, expected {}",
                name,
                tag.len(),
                mac_len
            );
            return Err(MacError::MacComputationFailed(name.to_string()));
        }

        tag.truncate(mac_len);
        Ok(tag)
    }

    /// Verify `received` against the tag computed for `packet`.
    ///
    /// Always succeeds for `none` and for a generation without a key.
    ///
    /// # Errors
    ///
    /// Returns [`MacError::MacMismatch`] when the tags differ in content or
    /// length, or any computation error.
    pub fn verify(
        &mut self,
        sequence_no: u32,
        packet: &Packet<'_>,
        received: &[u8],
    ) -> Result<(), MacError> {
        let expected = self.compute(sequence_no, packet)?;
        if expected.is_empty() {
            return Ok(());
        }

        if constant_time::verify_tag(&expected, received) {
            Ok(())
        } else {
            Err(MacError::MacMismatch {
                algorithm: self.algorithm().unwrap_or("none").to_string(),
            })
        }
    }
}

impl DirectionState {
    /// Compute the tag for an outgoing packet with the active generation.
    ///
    /// # Errors
    ///
    /// See [`MacGeneration::compute`].
    pub fn compute(&mut self, sequence_no: u32, packet: &Packet<'_>) -> Result<Vec<u8>, MacError> {
        self.current_mut().compute(sequence_no, packet)
    }

    /// Append the tag to `out`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// See [`MacGeneration::compute`]; also [`MacError::AllocationFailure`]
    /// if `out` cannot grow.
    pub fn compute_into(
        &mut self,
        sequence_no: u32,
        packet: &Packet<'_>,
        out: &mut Vec<u8>,
    ) -> Result<usize, MacError> {
        let tag = self.compute(sequence_no, packet)?;
        out.try_reserve(tag.len())
            .map_err(|e| MacError::AllocationFailure(format!("tag output buffer: {e}")))?;
        out.extend_from_slice(&tag);
        Ok(tag.len())
    }

    /// Verify an incoming packet's tag with the active generation.
    ///
    /// A mismatch is fatal: the transport must disconnect.
    ///
    /// # Errors
    ///
    /// See [`MacGeneration::verify`].
    pub fn verify(
        &mut self,
        sequence_no: u32,
        packet: &Packet<'_>,
        received: &[u8],
    ) -> Result<(), MacError> {
        let direction = self.direction();
        let result = self.current_mut().verify(sequence_no, packet, received);

        if let Err(MacError::MacMismatch { algorithm }) = &result {
            tracing::warn!(
                "{} MAC mismatch using {} at sequence {}",
                direction.as_str(),
                algorithm,
                sequence_no
            );
        }
        result
    }
}
