//! # Hashing Utilities
//!
//! Keccak-256 is the only hash function in this crate, for one reason:
//! compatibility. Commitments and signed-message digests must match what the
//! ecosystem's wallets and contracts already produce, and that world settled
//! on Keccak-256 (the pre-standardization SHA-3 finalist) a decade ago.
//! Using anything else would produce commitments nobody can release against.
//!
//! Two constructions live on top of the raw hash:
//!
//! - **Commitment digest**: `keccak256(address_bytes)`. Deterministic and
//!   unsalted -- a commitment, not a secret. It binds the claimed
//!   beneficiary at release time but does nothing to stop an observer from
//!   testing candidate addresses offline.
//! - **Signed-message digest**: `keccak256(prefix || "32" || inner)`, the
//!   "personal sign" envelope. The prefix makes the signed payload
//!   impossible to confuse with a real transaction, which is exactly why
//!   wallets are willing to sign it.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha3::{Digest as _, Keccak256};

use crate::config::{DIGEST_LEN, PERSONAL_SIGN_PREFIX};
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Digest
// ---------------------------------------------------------------------------

/// A 32-byte Keccak-256 digest.
///
/// Used for beneficiary commitments and signed-message hashes. The all-zero
/// digest is reserved: together with a zero amount it marks a consumed
/// deposit record, so no live commitment is ever all zeros.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// The all-zero digest, denoting "no commitment" in a cleared record.
    pub const ZERO: Digest = Digest([0u8; DIGEST_LEN]);

    /// Construct from raw 32 bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Digest(bytes)
    }

    /// Borrow the underlying 32-byte array.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Returns `true` for the all-zero digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_LEN]
    }

    /// Hex-encode with a `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse a hex-encoded digest. Accepts an optional `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)?;
        if bytes.len() != DIGEST_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; DIGEST_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Digest(arr))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}...)", &self.to_hex()[..14])
    }
}

// ---------------------------------------------------------------------------
// Hash functions
// ---------------------------------------------------------------------------

/// Compute the Keccak-256 hash of the input data.
pub fn keccak256(data: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut output = [0u8; DIGEST_LEN];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Hash multiple byte slices together without concatenation overhead.
///
/// Feeding the parts sequentially into the hasher produces the same digest
/// as hashing their concatenation, minus the temporary buffer.
pub fn keccak256_multi(parts: &[&[u8]]) -> [u8; DIGEST_LEN] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; DIGEST_LEN];
    output.copy_from_slice(&hasher.finalize());
    output
}

/// Compute the commitment digest for a beneficiary address.
///
/// `keccak256` over the raw 20 address bytes, nothing else. No salt, no
/// nonce: equal addresses always commit to equal digests, which is what
/// lets the release path confirm a claimed beneficiary by re-hashing.
pub fn commit_address(address: &Address) -> Digest {
    Digest(keccak256(address.as_bytes()))
}

/// Wrap a 32-byte digest in the personal-sign envelope and hash it.
///
/// Produces `keccak256(PREFIX || "32" || inner)`. This is the exact digest
/// a wallet signs when asked to personal-sign 32 bytes, so signatures
/// produced by ordinary wallet tooling verify here without adaptation.
pub fn personal_message_digest(inner: &[u8; DIGEST_LEN]) -> [u8; DIGEST_LEN] {
    keccak256_multi(&[
        PERSONAL_SIGN_PREFIX.as_bytes(),
        DIGEST_LEN.to_string().as_bytes(),
        inner,
    ])
}
