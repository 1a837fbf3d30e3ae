//! Constant-time tag comparison.
//!
//! Tag verification must not leak how many leading bytes matched, or a
//! peer observing response timing could forge a tag byte by byte.

use subtle::ConstantTimeEq;

/// Constant-time comparison of byte slices.
///
/// Returns `true` if slices are equal, `false` otherwise.
/// Execution time depends only on slice length, not content.
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}

/// Timing-safe comparison of a computed tag against a received one.
///
/// A length mismatch is a mismatch. Lengths are public (they come from the
/// negotiated algorithm), so the early return leaks nothing secret.
#[must_use]
#[inline(never)]
pub fn verify_tag(expected: &[u8], received: &[u8]) -> bool {
    ct_eq(expected, received)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ct_eq_same() {
        let a = [1u8; 32];
        let b = [1u8; 32];
        assert!(ct_eq(&a, &b));
    }

    #[test]
    fn test_ct_eq_different() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert!(!ct_eq(&a, &b));
    }

    #[test]
    fn test_ct_eq_different_lengths() {
        let a = [1u8; 32];
        let b = [1u8; 16];
        assert!(!ct_eq(&a, &b));
    }

    #[test]
    fn test_verify_tag_last_byte() {
        let a = [0x42u8; 20];
        let mut b = a;
        b[19] ^= 0x01;

        assert!(verify_tag(&a, &a));
        assert!(!verify_tag(&a, &b));
    }

    #[test]
    fn test_verify_tag_empty() {
        assert!(verify_tag(&[], &[]));
        assert!(!verify_tag(&[], &[0u8]));
    }
}
