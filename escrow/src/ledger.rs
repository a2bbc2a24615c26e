//! # Escrow Ledger
//!
//! The single shared resource of the system: a map from depositor address
//! to that depositor's one active [`Deposit`]. Two operations create
//! records, one consumes them, and nothing else may write the map.
//!
//! ## Lifecycle of a deposit
//!
//! 1. **Created** by [`deposit`](EscrowLedger::deposit) (native value) or
//!    [`deposit_token`](EscrowLedger::deposit_token). A new deposit for the
//!    same depositor **overwrites** the prior record: no accumulation, no
//!    merge. A depositor who deposits twice without an intervening release
//!    has forfeited the first amount's protection.
//! 2. **Consumed** exactly once by a successful
//!    [`release_funds`](EscrowLedger::release_funds), which zeroes the
//!    record. Clearing happens strictly after the payout succeeds.
//! 3. Optionally **recreated** afterward. There is no cancel or refund.
//!
//! ## The release handshake
//!
//! The beneficiary was never written to the ledger, only the Keccak-256
//! commitment to their address. Release therefore has to prove two things:
//! that the claimed beneficiary hashes to the stored commitment, and that
//! the release signature was produced *by* that beneficiary *over* the
//! recipient's address digest. The signature names the recipient, not the
//! sender, so the beneficiary can direct payout anywhere without ever
//! submitting a transaction themselves -- whoever holds the signature can
//! trigger the release.
//!
//! ## Known weaknesses, reproduced deliberately
//!
//! - Tokens are not custodied at deposit time. The pull happens at release,
//!   from the depositor's then-current balance and allowance. The allowance
//!   must be granted after (or independently of) the deposit and must still
//!   be sufficient when release runs.
//! - The signed payload carries no nonce and no expiry. A signature is
//!   neutralized only by the release clearing the deposit; recreate the
//!   same depositor/beneficiary pair and the old signature authorizes the
//!   new deposit too.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::assets::{AssetKind, AssetTransferAdapter, TransferError};
use crate::crypto::hash::{commit_address, Digest};
use crate::crypto::recover::{recover_signer, ReleaseSignature, SignatureError};
use crate::identity::Address;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by ledger operations.
///
/// Every variant is synchronous and final: the ledger never retries, and a
/// failed operation leaves the depositor's record exactly as it was.
#[derive(Debug, Error)]
pub enum EscrowError {
    /// No active deposit exists for the depositor (never created, or
    /// already consumed by a release).
    #[error("no active deposit for depositor {0}")]
    NoActiveDeposit(Address),

    /// The claimed beneficiary does not hash to the stored commitment.
    #[error("claimed beneficiary does not match the commitment stored for {depositor}")]
    BeneficiaryMismatch {
        /// The depositor whose record was checked.
        depositor: Address,
    },

    /// The signature is well-formed but was not produced by the claimed
    /// beneficiary over this recipient's digest.
    #[error("signature signer mismatch: expected {expected}, recovered {recovered}")]
    InvalidSignature {
        /// The claimed beneficiary.
        expected: Address,
        /// The address the signature actually recovers to.
        recovered: Address,
    },

    /// The signature is structurally invalid.
    #[error(transparent)]
    Signature(#[from] SignatureError),

    /// The payout failed; the deposit record was left untouched.
    #[error(transparent)]
    Transfer(#[from] TransferError),
}

// ---------------------------------------------------------------------------
// Deposit
// ---------------------------------------------------------------------------

/// One depositor's active escrow record.
///
/// `amount == 0` together with a zero commitment is the "no active deposit"
/// sentinel left behind by a successful release; every query treats that
/// state as absence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Escrowed quantity, in native units or the token's smallest unit.
    pub amount: u64,
    /// Keccak-256 commitment to the beneficiary's address.
    pub hashed_beneficiary: Digest,
    /// What is escrowed: native value or a token balance.
    pub asset: AssetKind,
    /// Timestamp of the last write to this record.
    pub updated_at: DateTime<Utc>,
}

impl Deposit {
    fn new(amount: u64, hashed_beneficiary: Digest, asset: AssetKind) -> Self {
        Self {
            amount,
            hashed_beneficiary,
            asset,
            updated_at: Utc::now(),
        }
    }

    /// The post-release sentinel record.
    fn cleared() -> Self {
        Self::new(0, Digest::ZERO, AssetKind::Native)
    }

    /// Returns `true` if this record is the post-release sentinel.
    pub fn is_cleared(&self) -> bool {
        self.amount == 0 && self.hashed_beneficiary.is_zero()
    }
}

// ---------------------------------------------------------------------------
// EscrowLedger
// ---------------------------------------------------------------------------

/// The depositor -> deposit map, plus the payout adapter consulted at
/// release time.
///
/// All mutations are serialized behind one mutex. Deposit volume is low and
/// correctness dominates throughput, so per-key locking would buy nothing
/// but complexity; the release sequence (read, verify, pay out, clear) runs
/// as one indivisible critical section and no other operation can observe a
/// record mid-release.
pub struct EscrowLedger<A: AssetTransferAdapter> {
    deposits: Mutex<HashMap<Address, Deposit>>,
    assets: A,
}

impl<A: AssetTransferAdapter> EscrowLedger<A> {
    /// Create an empty ledger over the given payout adapter.
    pub fn new(assets: A) -> Self {
        Self {
            deposits: Mutex::new(HashMap::new()),
            assets,
        }
    }

    /// The payout adapter this ledger settles through.
    pub fn assets(&self) -> &A {
        &self.assets
    }

    /// Record a native-value deposit for `depositor`.
    ///
    /// `value` is the amount attached to the call; the runtime boundary
    /// that collected it is outside this component. Zero is allowed and
    /// produces a degenerate deposit that releases zero value. Any prior
    /// record for `depositor` is overwritten whole.
    ///
    /// Returns a copy of the stored record.
    pub fn deposit(&self, depositor: Address, hashed_beneficiary: Digest, value: u64) -> Deposit {
        let record = Deposit::new(value, hashed_beneficiary, AssetKind::Native);
        let previous = self
            .deposits
            .lock()
            .insert(depositor, record.clone());

        if let Some(prev) = previous.filter(|p| !p.is_cleared()) {
            warn!(
                %depositor,
                replaced_amount = prev.amount,
                "deposit overwrote an unreleased record"
            );
        }
        debug!(%depositor, amount = value, asset = %AssetKind::Native, "deposit recorded");
        record
    }

    /// Record a token deposit for `depositor`.
    ///
    /// **Does not move tokens.** This only records intent; custody is
    /// deferred to release time, when the token is asked to pull `amount`
    /// from the depositor's balance using the allowance the depositor must
    /// have granted the escrow by then. Nothing is validated here -- an
    /// absent allowance or balance surfaces later as a transfer failure on
    /// release, which can then be retried.
    pub fn deposit_token(
        &self,
        depositor: Address,
        hashed_beneficiary: Digest,
        token: Address,
        amount: u64,
    ) -> Deposit {
        let record = Deposit::new(amount, hashed_beneficiary, AssetKind::Token(token));
        let previous = self
            .deposits
            .lock()
            .insert(depositor, record.clone());

        if let Some(prev) = previous.filter(|p| !p.is_cleared()) {
            warn!(
                %depositor,
                replaced_amount = prev.amount,
                "deposit overwrote an unreleased record"
            );
        }
        debug!(%depositor, amount, token = %token, "token deposit recorded");
        record
    }

    /// Release `depositor`'s escrowed funds to `recipient`, authorized by
    /// `beneficiary`'s signature over the recipient's address digest.
    ///
    /// The full verification-then-payout sequence:
    ///
    /// 1. Look up the depositor's record; absent or cleared fails with
    ///    [`EscrowError::NoActiveDeposit`].
    /// 2. Re-hash the claimed beneficiary and compare against the stored
    ///    commitment; mismatch fails with [`EscrowError::BeneficiaryMismatch`].
    /// 3. Recover the signer of the recipient's digest from `signature`;
    ///    a structurally bad signature fails with
    ///    [`SignatureError::MalformedSignature`], a signer other than the
    ///    claimed beneficiary with [`EscrowError::InvalidSignature`].
    /// 4. Ask the asset adapter to move the recorded amount to the
    ///    recipient. On failure the record is **not** cleared, so a
    ///    corrected retry (say, after fixing an allowance) can succeed.
    /// 5. Zero the record. The deposit is consumed; releasing again fails
    ///    at step 1.
    ///
    /// Returns the released amount on success. Any caller may invoke this;
    /// holding a valid signature is the only authorization that matters.
    pub fn release_funds(
        &self,
        depositor: Address,
        beneficiary: Address,
        recipient: Address,
        signature: &ReleaseSignature,
    ) -> Result<u64, EscrowError> {
        let mut deposits = self.deposits.lock();

        let record = deposits
            .get(&depositor)
            .filter(|d| !d.is_cleared())
            .cloned()
            .ok_or(EscrowError::NoActiveDeposit(depositor))?;

        if commit_address(&beneficiary) != record.hashed_beneficiary {
            warn!(%depositor, claimed = %beneficiary, "release rejected: commitment mismatch");
            return Err(EscrowError::BeneficiaryMismatch { depositor });
        }

        let recipient_digest = commit_address(&recipient);
        let recovered = recover_signer(recipient_digest.as_bytes(), signature)?;
        if recovered != beneficiary {
            warn!(
                %depositor,
                expected = %beneficiary,
                %recovered,
                "release rejected: signer mismatch"
            );
            return Err(EscrowError::InvalidSignature {
                expected: beneficiary,
                recovered,
            });
        }

        // Verification passed; move the money. The record stays intact
        // until the transfer has actually succeeded.
        self.assets
            .payout(&record.asset, &depositor, &recipient, record.amount)?;

        deposits.insert(depositor, Deposit::cleared());
        info!(
            %depositor,
            %recipient,
            amount = record.amount,
            asset = %record.asset,
            "escrow released"
        );
        Ok(record.amount)
    }

    /// The depositor's current record, if an active one exists.
    ///
    /// The post-release sentinel and never-deposited both read as `None`.
    pub fn deposit_of(&self, depositor: &Address) -> Option<Deposit> {
        self.deposits
            .lock()
            .get(depositor)
            .filter(|d| !d.is_cleared())
            .cloned()
    }

    /// Number of active (non-cleared) deposits.
    pub fn active_deposits(&self) -> usize {
        self.deposits
            .lock()
            .values()
            .filter(|d| !d.is_cleared())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{InMemoryAssets, TokenContract};
    use crate::crypto::keys::EscrowKeypair;

    fn addr(tag: u8) -> Address {
        Address::from_bytes([tag; 20])
    }

    fn keypair(tag: u8) -> EscrowKeypair {
        let mut seed = [0u8; 32];
        seed[31] = tag;
        EscrowKeypair::from_seed(&seed).unwrap()
    }

    fn ledger() -> EscrowLedger<InMemoryAssets> {
        EscrowLedger::new(InMemoryAssets::new())
    }

    #[test]
    fn deposit_stores_record() {
        let ledger = ledger();
        let commitment = commit_address(&addr(2));

        ledger.deposit(addr(1), commitment, 100);

        let record = ledger.deposit_of(&addr(1)).unwrap();
        assert_eq!(record.amount, 100);
        assert_eq!(record.hashed_beneficiary, commitment);
        assert_eq!(record.asset, AssetKind::Native);
        assert_eq!(record.asset.asset_address(), Address::ZERO);
    }

    #[test]
    fn deposit_overwrites_not_accumulates() {
        let ledger = ledger();
        ledger.deposit(addr(1), commit_address(&addr(2)), 100);
        ledger.deposit(addr(1), commit_address(&addr(3)), 7);

        let record = ledger.deposit_of(&addr(1)).unwrap();
        assert_eq!(record.amount, 7);
        assert_eq!(record.hashed_beneficiary, commit_address(&addr(3)));
        assert_eq!(ledger.active_deposits(), 1);
    }

    #[test]
    fn token_deposit_records_intent_without_moving_tokens() {
        let assets = InMemoryAssets::new();
        let token = assets.deploy_token("VUSD");
        token.mint(&addr(1), 500).unwrap();
        let ledger = EscrowLedger::new(assets);

        ledger.deposit_token(addr(1), commit_address(&addr(2)), token.address(), 500);

        // Intent only: the depositor still holds every unit.
        assert_eq!(token.balance_of(&addr(1)), 500);
        let record = ledger.deposit_of(&addr(1)).unwrap();
        assert_eq!(record.asset, AssetKind::Token(token.address()));
    }

    #[test]
    fn zero_value_deposit_is_active() {
        let ledger = ledger();
        ledger.deposit(addr(1), commit_address(&addr(2)), 0);
        // Degenerate but live: the commitment is non-zero.
        assert!(ledger.deposit_of(&addr(1)).is_some());
    }

    #[test]
    fn query_of_unknown_depositor_is_none() {
        assert!(ledger().deposit_of(&addr(1)).is_none());
    }

    #[test]
    fn release_requires_active_deposit() {
        let ledger = ledger();
        let beneficiary = keypair(2);
        let sig = beneficiary.sign_recipient(&addr(3)).unwrap();

        let err = ledger
            .release_funds(addr(1), beneficiary.address(), addr(3), &sig)
            .unwrap_err();
        assert!(matches!(err, EscrowError::NoActiveDeposit(d) if d == addr(1)));
    }

    #[test]
    fn release_rejects_wrong_beneficiary_even_with_their_valid_signature() {
        let ledger = ledger();
        let committed = keypair(2);
        let impostor = keypair(3);
        ledger.deposit(addr(1), commit_address(&committed.address()), 100);

        // The impostor signs correctly for themselves; the commitment
        // check must still reject them.
        let sig = impostor.sign_recipient(&addr(4)).unwrap();
        let err = ledger
            .release_funds(addr(1), impostor.address(), addr(4), &sig)
            .unwrap_err();
        assert!(matches!(err, EscrowError::BeneficiaryMismatch { .. }));
        assert!(ledger.deposit_of(&addr(1)).is_some());
    }

    #[test]
    fn release_rejects_signature_over_different_recipient() {
        let ledger = ledger();
        let beneficiary = keypair(2);
        ledger.deposit(addr(1), commit_address(&beneficiary.address()), 100);

        let sig = beneficiary.sign_recipient(&addr(4)).unwrap();
        let err = ledger
            .release_funds(addr(1), beneficiary.address(), addr(5), &sig)
            .unwrap_err();
        assert!(matches!(err, EscrowError::InvalidSignature { .. }));
        assert!(ledger.deposit_of(&addr(1)).is_some());
    }

    #[test]
    fn release_rejects_malformed_signature() {
        let ledger = ledger();
        let beneficiary = keypair(2);
        ledger.deposit(addr(1), commit_address(&beneficiary.address()), 100);

        let sig = ReleaseSignature::from_bytes([0u8; 65]);
        let err = ledger
            .release_funds(addr(1), beneficiary.address(), addr(4), &sig)
            .unwrap_err();
        assert!(matches!(
            err,
            EscrowError::Signature(SignatureError::MalformedSignature(_))
        ));
        assert!(ledger.deposit_of(&addr(1)).is_some());
    }

    #[test]
    fn successful_native_release_pays_and_clears() {
        let assets = InMemoryAssets::new();
        let ledger = EscrowLedger::new(assets.clone());
        let beneficiary = keypair(2);
        ledger.deposit(addr(1), commit_address(&beneficiary.address()), 100);

        let sig = beneficiary.sign_recipient(&addr(4)).unwrap();
        let released = ledger
            .release_funds(addr(1), beneficiary.address(), addr(4), &sig)
            .unwrap();

        assert_eq!(released, 100);
        assert_eq!(assets.native_balance(&addr(4)), 100);
        assert!(ledger.deposit_of(&addr(1)).is_none());
        assert_eq!(ledger.active_deposits(), 0);
    }

    #[test]
    fn release_is_single_use() {
        let ledger = ledger();
        let beneficiary = keypair(2);
        ledger.deposit(addr(1), commit_address(&beneficiary.address()), 100);

        let sig = beneficiary.sign_recipient(&addr(4)).unwrap();
        ledger
            .release_funds(addr(1), beneficiary.address(), addr(4), &sig)
            .unwrap();

        let err = ledger
            .release_funds(addr(1), beneficiary.address(), addr(4), &sig)
            .unwrap_err();
        assert!(matches!(err, EscrowError::NoActiveDeposit(_)));
    }

    #[test]
    fn failed_transfer_leaves_record_for_retry() {
        let assets = InMemoryAssets::new();
        let ledger = EscrowLedger::new(assets.clone());
        let beneficiary = keypair(2);
        ledger.deposit(addr(1), commit_address(&beneficiary.address()), 100);
        assets.refuse_native(&addr(4));

        let sig = beneficiary.sign_recipient(&addr(4)).unwrap();
        let err = ledger
            .release_funds(addr(1), beneficiary.address(), addr(4), &sig)
            .unwrap_err();
        assert!(matches!(
            err,
            EscrowError::Transfer(TransferError::NativeTransferFailed { .. })
        ));
        assert!(ledger.deposit_of(&addr(1)).is_some(), "record must survive the failure");

        // Fix the cause; the identical retry succeeds.
        assets.accept_native(&addr(4));
        let released = ledger
            .release_funds(addr(1), beneficiary.address(), addr(4), &sig)
            .unwrap();
        assert_eq!(released, 100);
    }

    #[test]
    fn signature_replays_against_a_recreated_deposit() {
        // Documented weakness: no nonce or expiry in the signed payload.
        // The same signature authorizes a recreated deposit for the same
        // depositor/beneficiary pair.
        let ledger = ledger();
        let beneficiary = keypair(2);
        let sig = beneficiary.sign_recipient(&addr(4)).unwrap();

        ledger.deposit(addr(1), commit_address(&beneficiary.address()), 100);
        ledger
            .release_funds(addr(1), beneficiary.address(), addr(4), &sig)
            .unwrap();

        ledger.deposit(addr(1), commit_address(&beneficiary.address()), 50);
        let released = ledger
            .release_funds(addr(1), beneficiary.address(), addr(4), &sig)
            .unwrap();
        assert_eq!(released, 50);
    }

    #[test]
    fn deposit_record_serializes() {
        let ledger = ledger();
        let record = ledger.deposit(addr(1), commit_address(&addr(2)), 42);
        let json = serde_json::to_string(&record).unwrap();
        let recovered: Deposit = serde_json::from_str(&json).unwrap();
        assert_eq!(record, recovered);
    }
}
