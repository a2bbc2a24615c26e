//! # Key Management
//!
//! secp256k1 keypair handling for escrow participants.
//!
//! The escrow core never holds anyone's keys in production -- key custody is
//! explicitly out of scope -- but beneficiaries have to produce release
//! signatures somehow, and tests and demos need real keypairs. This module
//! provides exactly that: generation, deterministic derivation from a seed,
//! address derivation, and the one signing operation the protocol defines.
//!
//! ## Why ECDSA over secp256k1?
//!
//! Not for love of ECDSA. Recovery-based verification is the whole design:
//! the ledger stores only a hash of the beneficiary's address, so at release
//! time there is no public key on file to verify against. The verifier must
//! *recover* the signer identity from the signature itself, and recoverable
//! ECDSA over secp256k1 is the scheme the surrounding ecosystem's wallets
//! actually produce.
//!
//! ## Security notes
//!
//! - Key generation uses `OsRng`. If your OS RNG is broken, this crate is
//!   the least of your problems.
//! - Key bytes are never logged and never appear in `Debug` output.

use std::fmt;

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use thiserror::Error;

use crate::config::RECOVERY_ID_OFFSET;
use crate::crypto::hash::{commit_address, keccak256, personal_message_digest};
use crate::crypto::recover::ReleaseSignature;
use crate::identity::Address;

/// Errors that can occur during key operations.
///
/// Deliberately vague about *why* something failed; error messages are not
/// the place to leak information about key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("signing failed")]
    SigningFailed,
}

/// A secp256k1 keypair for an escrow participant.
///
/// `EscrowKeypair` intentionally does NOT implement `Serialize` or
/// `Deserialize`. Persisting private keys should be a deliberate act, not a
/// side effect of serializing whatever struct the keypair happened to live
/// in. Use [`secret_key_bytes`](Self::secret_key_bytes) explicitly.
pub struct EscrowKeypair {
    signing_key: SigningKey,
}

impl EscrowKeypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Construct a keypair deterministically from a 32-byte seed.
    ///
    /// The seed is interpreted as a big-endian secp256k1 secret scalar.
    /// Fails for the zero scalar and values at or above the group order,
    /// which is why this returns a `Result` where an Ed25519 equivalent
    /// would not.
    pub fn from_seed(seed: &[u8; 32]) -> Result<Self, KeyError> {
        let signing_key =
            SigningKey::from_slice(seed).map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self { signing_key })
    }

    /// The participant address derived from this keypair's public key.
    pub fn address(&self) -> Address {
        address_from_verifying_key(self.signing_key.verifying_key())
    }

    /// Sign a recipient address, authorizing release to it.
    ///
    /// This is the beneficiary's half of the protocol. The payload is the
    /// recipient's commitment digest wrapped in the personal-sign envelope;
    /// the output is the 65-byte `r || s || v` signature that anyone can
    /// later hand to [`EscrowLedger::release_funds`](crate::ledger::EscrowLedger::release_funds).
    ///
    /// The signed payload names only the recipient. No nonce, no expiry,
    /// no depositor binding: the signature stays valid for any deposit
    /// committed to this beneficiary until a release consumes it.
    pub fn sign_recipient(&self, recipient: &Address) -> Result<ReleaseSignature, KeyError> {
        let inner = commit_address(recipient);
        self.sign_digest(inner.as_bytes())
    }

    /// Sign an arbitrary 32-byte digest under the personal-sign envelope.
    ///
    /// [`sign_recipient`](Self::sign_recipient) is the protocol operation;
    /// this lower-level variant exists for tests that need signatures over
    /// digests the protocol would never produce.
    pub fn sign_digest(&self, inner: &[u8; 32]) -> Result<ReleaseSignature, KeyError> {
        let digest = personal_message_digest(inner);
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(&digest)
            .map_err(|_| KeyError::SigningFailed)?;

        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(signature.to_bytes().as_slice());
        bytes[64] = recovery_id.to_byte() + RECOVERY_ID_OFFSET;
        Ok(ReleaseSignature::from_bytes(bytes))
    }

    /// Export the raw 32-byte secret key material. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Clone for EscrowKeypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: self.signing_key.clone(),
        }
    }
}

impl fmt::Debug for EscrowKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material, not even partially.
        write!(f, "EscrowKeypair(addr={})", self.address())
    }
}

/// Derive the participant address from a secp256k1 verifying key.
///
/// Uncompressed SEC1 encoding (65 bytes, `0x04` tag first), drop the tag,
/// Keccak-256 the remaining 64 bytes, keep the right-most 20.
pub(crate) fn address_from_verifying_key(key: &k256::ecdsa::VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..]);
    Address::from_bytes(addr)
}
