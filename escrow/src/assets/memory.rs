//! # In-Memory Reference Assets
//!
//! A self-contained settlement environment for tests and demos: a native
//! balance map standing in for the value layer, plus deployable in-memory
//! fungible tokens implementing [`TokenContract`].
//!
//! Faithfulness matters more than realism here. The token side reproduces
//! the pull-transfer-at-release mechanic exactly: deposits never move
//! tokens, and a release pulls from the depositor's *current* balance and
//! allowance, so revoking an allowance between deposit and release makes
//! the release fail the same way it would against a real token contract.
//! The native side can be told to refuse transfers to a given recipient,
//! standing in for receivers that reject incoming value.
//!
//! All monetary arithmetic is checked. Wrapping arithmetic and money do
//! not mix.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::crypto::hash::keccak256;
use crate::identity::Address;

use super::{AssetKind, AssetTransferAdapter, TokenContract, TransferError};

// ---------------------------------------------------------------------------
// InMemoryToken
// ---------------------------------------------------------------------------

/// An in-memory fungible token with escrow-directed allowances.
pub struct InMemoryToken {
    address: Address,
    state: RwLock<TokenState>,
}

#[derive(Default)]
struct TokenState {
    balances: HashMap<Address, u64>,
    /// Allowance granted by each holder to the escrow (the sole spender
    /// in this protocol).
    allowances: HashMap<Address, u64>,
}

impl InMemoryToken {
    /// Create a token whose address is derived from its name:
    /// `keccak256(name)[12..32]`. Deterministic, so tests can re-derive it.
    pub fn new(name: &str) -> Self {
        let hash = keccak256(name.as_bytes());
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash[12..]);
        Self {
            address: Address::from_bytes(addr),
            state: RwLock::new(TokenState::default()),
        }
    }

    /// A plain holder-initiated transfer. Not part of the collaborator
    /// surface the escrow depends on, but tests and demos need a way for
    /// holders to move their own funds around.
    pub fn transfer(&self, from: &Address, to: &Address, amount: u64) -> Result<(), TransferError> {
        let mut state = self.state.write();
        let from_balance = state.balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(TransferError::TokenTransferFailed {
                token: self.address,
                detail: format!(
                    "insufficient balance: {from} holds {from_balance}, transfer needs {amount}"
                ),
            });
        }
        let to_balance = state.balances.get(to).copied().unwrap_or(0);
        let new_to_balance =
            to_balance
                .checked_add(amount)
                .ok_or_else(|| TransferError::TokenTransferFailed {
                    token: self.address,
                    detail: format!("balance overflow for {to}"),
                })?;
        state.balances.insert(*from, from_balance - amount);
        state.balances.insert(*to, new_to_balance);
        Ok(())
    }
}

impl TokenContract for InMemoryToken {
    fn address(&self) -> Address {
        self.address
    }

    fn mint(&self, to: &Address, amount: u64) -> Result<(), TransferError> {
        let mut state = self.state.write();
        let balance = state.balances.entry(*to).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::TokenTransferFailed {
                token: self.address,
                detail: format!("mint overflow for {to}"),
            })?;
        Ok(())
    }

    fn balance_of(&self, owner: &Address) -> u64 {
        self.state.read().balances.get(owner).copied().unwrap_or(0)
    }

    fn approve(&self, owner: &Address, amount: u64) {
        self.state.write().allowances.insert(*owner, amount);
    }

    fn allowance(&self, owner: &Address) -> u64 {
        self.state.read().allowances.get(owner).copied().unwrap_or(0)
    }

    fn transfer_from(
        &self,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TransferError> {
        let mut state = self.state.write();

        // All checks happen before any mutation so a failure leaves the
        // token untouched.
        let granted = state.allowances.get(from).copied().unwrap_or(0);
        if granted < amount {
            return Err(TransferError::InsufficientAllowance {
                token: self.address,
                granted,
                required: amount,
            });
        }

        let from_balance = state.balances.get(from).copied().unwrap_or(0);
        if from_balance < amount {
            return Err(TransferError::TokenTransferFailed {
                token: self.address,
                detail: format!(
                    "insufficient balance: {from} holds {from_balance}, transfer needs {amount}"
                ),
            });
        }

        let to_balance = state.balances.get(to).copied().unwrap_or(0);
        let new_to_balance =
            to_balance
                .checked_add(amount)
                .ok_or_else(|| TransferError::TokenTransferFailed {
                    token: self.address,
                    detail: format!("balance overflow for {to}"),
                })?;

        state.allowances.insert(*from, granted - amount);
        state.balances.insert(*from, from_balance - amount);
        state.balances.insert(*to, new_to_balance);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemoryAssets
// ---------------------------------------------------------------------------

/// The reference [`AssetTransferAdapter`]: native balances plus a registry
/// of deployed in-memory tokens.
///
/// Cheap to clone; clones share state, so a test can keep a handle for
/// balance assertions while the ledger owns another.
#[derive(Clone, Default)]
pub struct InMemoryAssets {
    inner: Arc<RwLock<AssetsInner>>,
}

#[derive(Default)]
struct AssetsInner {
    native: HashMap<Address, u64>,
    /// Recipients that reject incoming native value.
    refusing: HashSet<Address>,
    tokens: HashMap<Address, Arc<InMemoryToken>>,
}

impl InMemoryAssets {
    /// Create an empty settlement environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a fresh in-memory token and return a handle to it.
    pub fn deploy_token(&self, name: &str) -> Arc<InMemoryToken> {
        let token = Arc::new(InMemoryToken::new(name));
        self.inner
            .write()
            .tokens
            .insert(token.address(), Arc::clone(&token));
        token
    }

    /// Look up a deployed token by its contract address.
    pub fn token(&self, address: &Address) -> Option<Arc<InMemoryToken>> {
        self.inner.read().tokens.get(address).cloned()
    }

    /// Credit native value to an account. Test/demo seeding.
    pub fn credit_native(&self, account: &Address, amount: u64) {
        let mut inner = self.inner.write();
        let balance = inner.native.entry(*account).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Current native balance of an account.
    pub fn native_balance(&self, account: &Address) -> u64 {
        self.inner.read().native.get(account).copied().unwrap_or(0)
    }

    /// Make `account` refuse all incoming native value from now on.
    /// Models receivers that reject value transfers.
    pub fn refuse_native(&self, account: &Address) {
        self.inner.write().refusing.insert(*account);
    }

    /// Let `account` accept incoming native value again.
    pub fn accept_native(&self, account: &Address) {
        self.inner.write().refusing.remove(account);
    }
}

impl AssetTransferAdapter for InMemoryAssets {
    fn payout(
        &self,
        asset: &AssetKind,
        depositor: &Address,
        recipient: &Address,
        amount: u64,
    ) -> Result<(), TransferError> {
        match asset {
            AssetKind::Native => {
                let mut inner = self.inner.write();
                if inner.refusing.contains(recipient) {
                    return Err(TransferError::NativeTransferFailed {
                        recipient: *recipient,
                        detail: "recipient refuses incoming value",
                    });
                }
                let balance = inner.native.entry(*recipient).or_insert(0);
                *balance = balance.checked_add(amount).ok_or(
                    TransferError::NativeTransferFailed {
                        recipient: *recipient,
                        detail: "recipient balance overflow",
                    },
                )?;
                Ok(())
            }
            AssetKind::Token(token_addr) => {
                let token = self.token(token_addr).ok_or_else(|| {
                    TransferError::TokenTransferFailed {
                        token: *token_addr,
                        detail: "no token deployed at this address".into(),
                    }
                })?;
                token.transfer_from(depositor, recipient, amount)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    #[test]
    fn token_address_is_deterministic() {
        let a = InMemoryToken::new("VUSD");
        let b = InMemoryToken::new("VUSD");
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), InMemoryToken::new("VBRL").address());
    }

    #[test]
    fn mint_and_balance() {
        let token = InMemoryToken::new("VUSD");
        token.mint(&addr(1), 500).unwrap();
        token.mint(&addr(1), 250).unwrap();
        assert_eq!(token.balance_of(&addr(1)), 750);
        assert_eq!(token.balance_of(&addr(2)), 0);
    }

    #[test]
    fn mint_overflow_rejected() {
        let token = InMemoryToken::new("VUSD");
        token.mint(&addr(1), u64::MAX).unwrap();
        assert!(token.mint(&addr(1), 1).is_err());
    }

    #[test]
    fn transfer_from_requires_allowance() {
        let token = InMemoryToken::new("VUSD");
        token.mint(&addr(1), 100).unwrap();

        let err = token.transfer_from(&addr(1), &addr(2), 100).unwrap_err();
        assert_eq!(
            err,
            TransferError::InsufficientAllowance {
                token: token.address(),
                granted: 0,
                required: 100,
            }
        );
    }

    #[test]
    fn transfer_from_requires_balance() {
        let token = InMemoryToken::new("VUSD");
        token.approve(&addr(1), 100);

        // Allowance alone is not enough; the holder has nothing to pull.
        let err = token.transfer_from(&addr(1), &addr(2), 100).unwrap_err();
        assert!(matches!(err, TransferError::TokenTransferFailed { .. }));
        assert_eq!(token.allowance(&addr(1)), 100, "failed pull must not burn allowance");
    }

    #[test]
    fn transfer_from_moves_funds_and_consumes_allowance() {
        let token = InMemoryToken::new("VUSD");
        token.mint(&addr(1), 100).unwrap();
        token.approve(&addr(1), 60);

        token.transfer_from(&addr(1), &addr(2), 40).unwrap();
        assert_eq!(token.balance_of(&addr(1)), 60);
        assert_eq!(token.balance_of(&addr(2)), 40);
        assert_eq!(token.allowance(&addr(1)), 20);
    }

    #[test]
    fn plain_transfer_ignores_allowance() {
        let token = InMemoryToken::new("VUSD");
        token.mint(&addr(1), 100).unwrap();
        token.approve(&addr(1), 30);

        token.transfer(&addr(1), &addr(2), 80).unwrap();
        assert_eq!(token.balance_of(&addr(2)), 80);
        assert_eq!(token.allowance(&addr(1)), 30);

        assert!(token.transfer(&addr(1), &addr(2), 21).is_err());
    }

    #[test]
    fn approve_overwrites_prior_grant() {
        let token = InMemoryToken::new("VUSD");
        token.approve(&addr(1), 100);
        token.approve(&addr(1), 5);
        assert_eq!(token.allowance(&addr(1)), 5);
    }

    #[test]
    fn native_payout_credits_recipient() {
        let assets = InMemoryAssets::new();
        assets
            .payout(&AssetKind::Native, &addr(1), &addr(2), 100)
            .unwrap();
        assert_eq!(assets.native_balance(&addr(2)), 100);
    }

    #[test]
    fn refusing_recipient_fails_native_payout() {
        let assets = InMemoryAssets::new();
        assets.refuse_native(&addr(2));

        let err = assets
            .payout(&AssetKind::Native, &addr(1), &addr(2), 100)
            .unwrap_err();
        assert!(matches!(err, TransferError::NativeTransferFailed { .. }));
        assert_eq!(assets.native_balance(&addr(2)), 0);

        assets.accept_native(&addr(2));
        assets
            .payout(&AssetKind::Native, &addr(1), &addr(2), 100)
            .unwrap();
        assert_eq!(assets.native_balance(&addr(2)), 100);
    }

    #[test]
    fn token_payout_pulls_from_depositor() {
        let assets = InMemoryAssets::new();
        let token = assets.deploy_token("VUSD");
        token.mint(&addr(1), 100).unwrap();
        token.approve(&addr(1), 100);

        assets
            .payout(&AssetKind::Token(token.address()), &addr(1), &addr(2), 100)
            .unwrap();
        assert_eq!(token.balance_of(&addr(1)), 0);
        assert_eq!(token.balance_of(&addr(2)), 100);
    }

    #[test]
    fn unknown_token_payout_rejected() {
        let assets = InMemoryAssets::new();
        let err = assets
            .payout(&AssetKind::Token(addr(9)), &addr(1), &addr(2), 1)
            .unwrap_err();
        assert!(matches!(err, TransferError::TokenTransferFailed { .. }));
    }

    #[test]
    fn clones_share_state() {
        let assets = InMemoryAssets::new();
        let clone = assets.clone();
        assets.credit_native(&addr(3), 42);
        assert_eq!(clone.native_balance(&addr(3)), 42);
    }
}
