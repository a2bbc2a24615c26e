//! # Asset Transfer Abstraction
//!
//! The escrow releases two very different kinds of value -- native currency
//! and balances on external fungible tokens -- and the ledger's release
//! logic should not care which. This module defines the seam:
//!
//! - [`AssetKind`] names what a deposit escrows. In storage it is a single
//!   asset address with the zero address meaning "native", exactly how the
//!   deposit record commits to it.
//! - [`AssetTransferAdapter`] is the payout interface the ledger calls.
//!   One method, all-or-nothing: a partial transfer is not a representable
//!   outcome.
//! - [`TokenContract`] is the external collaborator surface for tokens.
//!   The escrow never does token accounting itself; it only asks a token
//!   to pull funds from the depositor's balance using a pre-granted
//!   allowance.
//!
//! [`InMemoryAssets`] is the reference adapter. Tests, demos, and anyone
//! embedding the ledger without a chain underneath use it; a deployment
//! against real settlement rails supplies its own adapter instead.

pub mod memory;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::Address;

pub use memory::{InMemoryAssets, InMemoryToken};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while moving escrowed value to a recipient.
///
/// Transfer failures never mutate ledger state; the deposit record stays
/// intact so the caller can fix the cause (typically an allowance) and
/// retry the release.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransferError {
    /// The recipient cannot accept a native-value transfer.
    #[error("native transfer to {recipient} failed: {detail}")]
    NativeTransferFailed {
        /// The recipient that could not be paid.
        recipient: Address,
        /// What went wrong.
        detail: &'static str,
    },

    /// The token's pull-transfer failed for a reason other than allowance
    /// (unknown token, insufficient depositor balance, overflow).
    #[error("token {token} transfer failed: {detail}")]
    TokenTransferFailed {
        /// The token contract address.
        token: Address,
        /// What went wrong.
        detail: String,
    },

    /// The escrow's allowance on the depositor's token balance is smaller
    /// than the amount to release. A special case of token-transfer
    /// failure, split out because it is the one callers can actually fix.
    #[error("insufficient allowance on token {token}: granted {granted}, required {required}")]
    InsufficientAllowance {
        /// The token contract address.
        token: Address,
        /// The allowance currently granted to the escrow.
        granted: u64,
        /// The amount the release needed.
        required: u64,
    },
}

impl TransferError {
    /// Whether this failure came from the token path. `InsufficientAllowance`
    /// counts: it is a token-transfer failure with a better diagnosis.
    pub fn is_token_failure(&self) -> bool {
        !matches!(self, TransferError::NativeTransferFailed { .. })
    }
}

// ---------------------------------------------------------------------------
// AssetKind
// ---------------------------------------------------------------------------

/// What a deposit escrows: native value or a balance on a token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetKind {
    /// Native currency, attached to the deposit call itself.
    Native,
    /// A fungible token identified by its contract address.
    Token(Address),
}

impl AssetKind {
    /// The asset address as stored in a deposit record: the token's
    /// contract address, or the zero sentinel for native value.
    pub fn asset_address(&self) -> Address {
        match self {
            AssetKind::Native => Address::ZERO,
            AssetKind::Token(addr) => *addr,
        }
    }

    /// Decode a stored asset address; the zero sentinel means native.
    pub fn from_address(addr: Address) -> Self {
        if addr.is_zero() {
            AssetKind::Native
        } else {
            AssetKind::Token(addr)
        }
    }

    /// Returns `true` for the native variant.
    pub fn is_native(&self) -> bool {
        matches!(self, AssetKind::Native)
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Native => write!(f, "native"),
            AssetKind::Token(addr) => write!(f, "token {addr}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Payout mechanism behind the ledger's release path.
///
/// One implementation per settlement environment. The contract is strict:
/// on `Ok(())` the full `amount` has reached `recipient`; on `Err` nothing
/// moved at all. The ledger relies on that to keep "clear after success"
/// atomic.
pub trait AssetTransferAdapter {
    /// Move `amount` of `asset` to `recipient`.
    ///
    /// For native value the source is the escrow's own custody (value was
    /// attached at deposit time). For tokens the source is the
    /// **depositor's** balance at release time, pulled via the token's
    /// allowance mechanism -- tokens are never custodied by the escrow.
    fn payout(
        &self,
        asset: &AssetKind,
        depositor: &Address,
        recipient: &Address,
        amount: u64,
    ) -> Result<(), TransferError>;
}

/// The external fungible-token collaborator.
///
/// Mirrors the standard token surface the escrow depends on. The escrow is
/// the only spender in this protocol, so `approve` and `allowance` are
/// modeled from the depositor's point of view against the escrow rather
/// than as a full `(owner, spender)` matrix.
pub trait TokenContract: Send + Sync {
    /// This token's contract address.
    fn address(&self) -> Address;

    /// Create `amount` new units in `to`'s balance.
    fn mint(&self, to: &Address, amount: u64) -> Result<(), TransferError>;

    /// Current balance of `owner`.
    fn balance_of(&self, owner: &Address) -> u64;

    /// Grant the escrow permission to pull up to `amount` from `owner`.
    /// Overwrites any prior grant.
    fn approve(&self, owner: &Address, amount: u64);

    /// The amount the escrow may currently pull from `owner`.
    fn allowance(&self, owner: &Address) -> u64;

    /// Pull `amount` from `from` into `to`, consuming allowance.
    /// All-or-nothing.
    fn transfer_from(&self, from: &Address, to: &Address, amount: u64)
        -> Result<(), TransferError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address_decodes_to_native() {
        assert_eq!(AssetKind::from_address(Address::ZERO), AssetKind::Native);
        assert!(AssetKind::Native.is_native());
    }

    #[test]
    fn nonzero_address_decodes_to_token() {
        let token = Address::from_bytes([9u8; 20]);
        assert_eq!(AssetKind::from_address(token), AssetKind::Token(token));
        assert_eq!(AssetKind::Token(token).asset_address(), token);
    }

    #[test]
    fn asset_address_roundtrip() {
        for kind in [AssetKind::Native, AssetKind::Token(Address::from_bytes([3u8; 20]))] {
            assert_eq!(AssetKind::from_address(kind.asset_address()), kind);
        }
    }

    #[test]
    fn allowance_failure_counts_as_token_failure() {
        let err = TransferError::InsufficientAllowance {
            token: Address::from_bytes([1u8; 20]),
            granted: 5,
            required: 10,
        };
        assert!(err.is_token_failure());

        let native = TransferError::NativeTransferFailed {
            recipient: Address::ZERO,
            detail: "refused",
        };
        assert!(!native.is_token_failure());
    }
}
