//! # Protocol Constants
//!
//! Every magic number in the escrow lives here. The values below are wire
//! conventions, not tunables -- changing any of them silently breaks
//! compatibility with every signature and commitment already in the wild.

/// ASCII prefix of the canonical signed-message digest, per the widely
/// deployed "personal sign" convention. The decimal byte length of the
/// payload is appended before the payload itself; since the escrow only
/// ever signs 32-byte digests, that length literal is always `"32"`.
pub const PERSONAL_SIGN_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Length in bytes of every digest in the system (Keccak-256 output).
pub const DIGEST_LEN: usize = 32;

/// Length in bytes of a release signature: `r (32) || s (32) || v (1)`.
pub const SIGNATURE_LEN: usize = 65;

/// Length in bytes of a participant address.
pub const ADDRESS_LEN: usize = 20;

/// Offset added to the raw recovery id to form the `v` byte of a release
/// signature. Signatures with `v ∈ {0, 1}` (raw) are accepted on the way
/// in; signatures we produce always carry `v ∈ {27, 28}`.
pub const RECOVERY_ID_OFFSET: u8 = 27;
