//! # Participant Addresses
//!
//! The canonical identity type for every party the escrow deals with:
//! depositors, beneficiaries, recipients, and token contracts all go by a
//! 20-byte address. An address is derived from a secp256k1 public key as
//! `Keccak256(uncompressed_pubkey)[12..32]` (the right-most 20 bytes of the
//! 32-byte hash); see [`crate::crypto::keys`] for the derivation itself.
//!
//! The all-zero address doubles as the native-asset sentinel in deposit
//! records: a deposit whose asset address is zero escrows native value, not
//! a token balance.
//!
//! Internally and in binary serialization: raw 20 bytes. At API boundaries:
//! `0x`-prefixed hex, 40 characters.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ADDRESS_LEN;

/// A 20-byte participant address.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address. Used as the native-asset sentinel and never
    /// derivable from a real public key in practice.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Construct from a 20-byte array (canonical form).
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    /// Borrow the underlying 20-byte array.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Returns `true` for the all-zero (native sentinel) address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Hex-encode with the conventional `0x` prefix.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parse a hex-encoded address. Accepts an optional `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)?;
        if bytes.len() != ADDRESS_LEN {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; ADDRESS_LEN];
        arr.copy_from_slice(&bytes);
        Ok(Address(arr))
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl std::str::FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address_is_zero() {
        assert!(Address::ZERO.is_zero());
        assert!(!Address::from_bytes([1u8; 20]).is_zero());
    }

    #[test]
    fn hex_roundtrip() {
        let addr = Address::from_bytes([0xAB; 20]);
        let hex_str = addr.to_hex();
        assert!(hex_str.starts_with("0x"));
        assert_eq!(hex_str.len(), 42);
        assert_eq!(Address::from_hex(&hex_str).unwrap(), addr);
    }

    #[test]
    fn from_hex_without_prefix() {
        let addr = Address::from_bytes([0x11; 20]);
        let bare = hex::encode(addr.as_bytes());
        assert_eq!(Address::from_hex(&bare).unwrap(), addr);
    }

    #[test]
    fn from_hex_wrong_length_rejected() {
        assert!(Address::from_hex("0xdeadbeef").is_err());
        assert!(Address::from_hex(&"ff".repeat(32)).is_err());
    }

    #[test]
    fn from_hex_garbage_rejected() {
        assert!(Address::from_hex("0xzzzz").is_err());
    }

    #[test]
    fn display_matches_to_hex() {
        let addr = Address::from_bytes([0x42; 20]);
        assert_eq!(format!("{addr}"), addr.to_hex());
    }

    #[test]
    fn serde_json_roundtrip() {
        let addr = Address::from_bytes([7u8; 20]);
        let json = serde_json::to_string(&addr).unwrap();
        let recovered: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, recovered);
    }

    #[test]
    fn ordering_is_bytewise() {
        let low = Address::from_bytes([0u8; 20]);
        let high = Address::from_bytes([0xFF; 20]);
        assert!(low < high);
    }
}
