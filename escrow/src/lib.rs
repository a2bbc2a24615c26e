// Copyright (c) 2026 Veil Systems. MIT License.
// See LICENSE for details.

//! # Veil Escrow — Core Library
//!
//! A conditional-release escrow with hash-committed beneficiaries. A
//! depositor locks value -- native currency or a fungible-token balance --
//! against the Keccak-256 digest of a beneficiary's address, without
//! revealing the beneficiary. The beneficiary later authorizes payout by
//! signing the digest of a recipient address of their choosing; anyone
//! holding that signature can trigger the release, and each deposit can be
//! released exactly once.
//!
//! ## Architecture
//!
//! The crate is split along the three concerns of the protocol:
//!
//! - **ledger** — The depositor → deposit map and the deposit/release state
//!   machine. This is where the invariants live: one active deposit per
//!   depositor, overwrite on re-deposit, clear-after-success atomicity.
//! - **crypto** — Keccak-256 commitments, the personal-sign envelope, and
//!   ECDSA public-key recovery. Pure functions; the ledger calls in, state
//!   never flows back.
//! - **assets** — The payout seam. Native transfers and token
//!   pull-transfers behind one all-or-nothing interface, with an in-memory
//!   reference implementation for tests and demos.
//! - **identity** / **config** — The 20-byte address type and the protocol
//!   constants everything else agrees on.
//!
//! ## What this crate deliberately is not
//!
//! No key custody, no transport, no persistence, no token accounting of its
//! own. The token contract is an external collaborator reached through a
//! trait; the escrow only ever asks it to pull funds the depositor
//! pre-authorized.
//!
//! Two properties of the source protocol are reproduced as-is and
//! documented rather than "fixed": token deposits record intent without
//! taking custody (the pull happens at release time, against the
//! depositor's then-current allowance), and release signatures carry no
//! nonce or expiry. See the `ledger` module docs before relying on either.

pub mod assets;
pub mod config;
pub mod crypto;
pub mod identity;
pub mod ledger;
