//! # Cryptographic Primitives
//!
//! Everything security-relevant in the escrow flows through this module:
//! the Keccak-256 commitments that hide a beneficiary until release, the
//! personal-sign envelope that wallets are willing to sign, and the ECDSA
//! recovery that turns a signature back into a signer address.
//!
//! The choices are dictated by compatibility, not preference:
//!
//! - **Keccak-256** for every digest, because commitments must match what
//!   existing wallets and contracts compute.
//! - **Recoverable ECDSA over secp256k1** for signatures, because the
//!   verifier has no public key on file -- only a hash commitment -- and
//!   must recover the signer identity from the signature alone.
//!
//! Nothing here is hand-rolled. These are thin, type-safe wrappers around
//! audited RustCrypto implementations, and they should stay that way.

pub mod hash;
pub mod keys;
pub mod recover;

// Re-export the working set so call sites don't need the full paths.
pub use hash::{commit_address, keccak256, personal_message_digest, Digest};
pub use keys::{EscrowKeypair, KeyError};
pub use recover::{is_signed_by, recover_signer, ReleaseSignature, SignatureError};
