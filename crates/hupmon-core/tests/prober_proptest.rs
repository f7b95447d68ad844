//! Property-based tests for the CPR validator.
//!
//! These generate random row/column pairs and random noise and verify
//! the acceptor's round-trip laws from the specification: every
//! well-formed CPR reply is accepted silently, and no input panics the
//! validator.

use proptest::prelude::*;

use hupmon_core::device_state::DeviceState;
use hupmon_core::validate_bytes;

fn cpr_reply(row: u32, col: u32) -> Vec<u8> {
    format!("\x1b[{row};{col}R").into_bytes()
}

proptest! {
    /// For all row in [0, 999] and column in [0, 999], a clean CPR
    /// reply with no interleaved non-control bytes is accepted as
    /// ONLINE with nothing left to forward.
    #[test]
    fn clean_cpr_always_accepted(row in 0u32..=999, col in 0u32..=999) {
        let bytes = cpr_reply(row, col);
        let (state, reply) = validate_bytes(&bytes);
        prop_assert_eq!(state, DeviceState::Online);
        prop_assert_eq!(reply.len(), 0);
    }

    /// The validator never panics on arbitrary byte sequences.
    #[test]
    fn validator_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = validate_bytes(&bytes);
    }

    /// A single non-ESC printable byte is reported ONLINE with exactly
    /// that byte captured for forwarding.
    #[test]
    fn single_printable_byte_is_forwarded(byte in 0x20u8..=0x7E) {
        prop_assume!(byte != b'\x1b');
        let (state, reply) = validate_bytes(&[byte]);
        prop_assert_eq!(state, DeviceState::Online);
        prop_assert_eq!(reply.as_slice(), &[byte]);
    }

    /// A truncated CPR (valid prefix, then garbage instead of `R`) is
    /// reported ONLINE with the captured prefix forwarded, never lost.
    #[test]
    fn truncated_sequence_forwards_prefix(row in 0u32..=999) {
        let mut bytes = format!("\x1b[{row}").into_bytes();
        bytes.push(b'z'); // never valid at any validator state
        let (state, reply) = validate_bytes(&bytes);
        prop_assert_eq!(state, DeviceState::Online);
        prop_assert_eq!(reply.len(), bytes.len());
    }
}
