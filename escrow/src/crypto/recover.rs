//! # Signature Recovery
//!
//! The verification half of the release protocol: given the 65-byte
//! signature a beneficiary produced over a recipient digest, recover the
//! address that signed it. No key registry, no lookup -- the signature
//! itself tells us who signed, and the ledger then checks that identity
//! against the stored commitment.
//!
//! Everything here is pure and stateless. Malformed input fails loudly with
//! [`SignatureError::MalformedSignature`]; a well-formed signature by the
//! wrong key recovers to the wrong address, and rejecting that is the
//! ledger's job, not ours.

use std::fmt;

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, VerifyingKey};
use thiserror::Error;

use crate::config::{RECOVERY_ID_OFFSET, SIGNATURE_LEN};
use crate::crypto::hash::personal_message_digest;
use crate::crypto::keys::address_from_verifying_key;
use crate::identity::Address;

/// Errors during signature recovery.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The signature bytes are structurally invalid: wrong length, a
    /// recovery id outside the accepted range, out-of-range scalars, or
    /// bytes from which no public key can be recovered.
    #[error("malformed signature: {0}")]
    MalformedSignature(&'static str),
}

// ---------------------------------------------------------------------------
// ReleaseSignature
// ---------------------------------------------------------------------------

/// A 65-byte release authorization: `r (32) || s (32) || v (1)`.
///
/// `v` is the recovery id, either raw (`0`/`1`) or offset by 27 the way
/// wallet tooling emits it (`27`/`28`). Both forms are accepted; signatures
/// produced by [`EscrowKeypair`](crate::crypto::keys::EscrowKeypair) carry
/// the offset form.
#[derive(Clone, PartialEq, Eq)]
pub struct ReleaseSignature([u8; SIGNATURE_LEN]);

impl ReleaseSignature {
    /// Construct from raw 65-byte representation.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LEN]) -> Self {
        ReleaseSignature(bytes)
    }

    /// Try to construct from a byte slice of any length.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, SignatureError> {
        let arr: [u8; SIGNATURE_LEN] = slice
            .try_into()
            .map_err(|_| SignatureError::MalformedSignature("expected 65 bytes"))?;
        Ok(ReleaseSignature(arr))
    }

    /// The raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LEN] {
        &self.0
    }

    /// The `r` scalar bytes.
    pub fn r_bytes(&self) -> &[u8] {
        &self.0[..32]
    }

    /// The `s` scalar bytes.
    pub fn s_bytes(&self) -> &[u8] {
        &self.0[32..64]
    }

    /// The raw `v` byte as it appears on the wire.
    pub fn v(&self) -> u8 {
        self.0[64]
    }

    /// Hex-encode with a `0x` prefix. 132 characters all told.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse a hex-encoded signature. Accepts an optional `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, SignatureError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)
            .map_err(|_| SignatureError::MalformedSignature("invalid hex"))?;
        Self::try_from_slice(&bytes)
    }

    /// Normalize `v` to a raw recovery id, rejecting anything that is not
    /// `0`, `1`, `27`, or `28`.
    fn recovery_id(&self) -> Result<RecoveryId, SignatureError> {
        let raw = match self.v() {
            v @ (0 | 1) => v,
            v @ (27 | 28) => v - RECOVERY_ID_OFFSET,
            _ => return Err(SignatureError::MalformedSignature("invalid recovery id")),
        };
        RecoveryId::from_byte(raw)
            .ok_or(SignatureError::MalformedSignature("invalid recovery id"))
    }
}

impl fmt::Display for ReleaseSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ReleaseSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        write!(
            f,
            "ReleaseSignature({}...{})",
            &hex_str[..10],
            &hex_str[hex_str.len() - 6..]
        )
    }
}

impl serde::Serialize for ReleaseSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> serde::Deserialize<'de> for ReleaseSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            ReleaseSignature::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            ReleaseSignature::try_from_slice(&bytes).map_err(serde::de::Error::custom)
        }
    }
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Recover the address that signed the given 32-byte digest.
///
/// Reconstructs the personal-sign envelope around `inner_digest` and runs
/// ECDSA public-key recovery against it, so the caller passes the *inner*
/// digest (for a release: the recipient's commitment digest) and never
/// touches the envelope themselves.
///
/// Structural failures surface as [`SignatureError::MalformedSignature`].
/// A structurally valid signature always recovers to *some* address; if it
/// was produced by the wrong key, that address simply will not match the
/// claimed beneficiary.
pub fn recover_signer(
    inner_digest: &[u8; 32],
    signature: &ReleaseSignature,
) -> Result<Address, SignatureError> {
    let digest = personal_message_digest(inner_digest);
    let recovery_id = signature.recovery_id()?;
    let sig = EcdsaSignature::from_slice(&signature.as_bytes()[..64])
        .map_err(|_| SignatureError::MalformedSignature("invalid r/s scalars"))?;
    let key = VerifyingKey::recover_from_prehash(&digest, &sig, recovery_id)
        .map_err(|_| SignatureError::MalformedSignature("public key recovery failed"))?;
    Ok(address_from_verifying_key(&key))
}

/// The pure verification predicate: did `expected` sign `inner_digest`?
///
/// Collapses every failure mode to `false`. The ledger's release path uses
/// [`recover_signer`] directly so it can report *which* address actually
/// signed; this predicate is for callers who only want a yes or a no.
pub fn is_signed_by(
    inner_digest: &[u8; 32],
    signature: &ReleaseSignature,
    expected: &Address,
) -> bool {
    recover_signer(inner_digest, signature)
        .map(|recovered| recovered == *expected)
        .unwrap_or(false)
}
