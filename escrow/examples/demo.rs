//! Walkthrough of the full escrow lifecycle on the in-memory settlement
//! environment: a native-value release, then a token release that first
//! trips over a missing allowance and succeeds on retry.
//!
//! Run with:
//!   cargo run --example demo

use anyhow::Result;

use veil_escrow::assets::{InMemoryAssets, TokenContract};
use veil_escrow::crypto::hash::commit_address;
use veil_escrow::crypto::keys::EscrowKeypair;
use veil_escrow::ledger::EscrowLedger;

const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

fn section(title: &str) {
    println!();
    println!("{BOLD}{CYAN}== {title} =={RESET}");
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "veil_escrow=debug".into()),
        )
        .init();

    let assets = InMemoryAssets::new();
    let ledger = EscrowLedger::new(assets.clone());

    let depositor = EscrowKeypair::generate();
    let beneficiary = EscrowKeypair::generate();
    let recipient = EscrowKeypair::generate();

    section("Participants");
    println!("  depositor    {}", depositor.address());
    println!("  beneficiary  {}  {DIM}(only its hash goes on record){RESET}", beneficiary.address());
    println!("  recipient    {}  {DIM}(chosen later, at signing time){RESET}", recipient.address());

    // ------------------------------------------------------------------
    // Native value
    // ------------------------------------------------------------------
    section("Native deposit");
    let commitment = commit_address(&beneficiary.address());
    let record = ledger.deposit(depositor.address(), commitment, 100);
    println!("  locked {} native units under {}", record.amount, record.hashed_beneficiary);

    section("Release");
    let signature = beneficiary.sign_recipient(&recipient.address())?;
    println!("  beneficiary signed the recipient digest: {signature}");
    let released = ledger.release_funds(
        depositor.address(),
        beneficiary.address(),
        recipient.address(),
        &signature,
    )?;
    println!(
        "  {GREEN}released {released} units{RESET} -> recipient balance is now {}",
        assets.native_balance(&recipient.address())
    );
    println!(
        "  depositor record active: {}",
        ledger.deposit_of(&depositor.address()).is_some()
    );

    // ------------------------------------------------------------------
    // Token, with the allowance gap on display
    // ------------------------------------------------------------------
    section("Token deposit (intent only)");
    let token = assets.deploy_token("VUSD");
    token.mint(&depositor.address(), 250)?;
    ledger.deposit_token(depositor.address(), commitment, token.address(), 250);
    println!(
        "  recorded 250 VUSD; depositor still holds {} (no custody taken)",
        token.balance_of(&depositor.address())
    );

    section("Release without allowance");
    let signature = beneficiary.sign_recipient(&recipient.address())?;
    match ledger.release_funds(
        depositor.address(),
        beneficiary.address(),
        recipient.address(),
        &signature,
    ) {
        Err(err) => println!("  {YELLOW}failed as expected:{RESET} {err}"),
        Ok(_) => unreachable!("release cannot succeed before the allowance exists"),
    }

    section("Grant allowance and retry");
    token.approve(&depositor.address(), 250);
    let released = ledger.release_funds(
        depositor.address(),
        beneficiary.address(),
        recipient.address(),
        &signature,
    )?;
    println!(
        "  {GREEN}released {released} VUSD{RESET} -> recipient holds {}, depositor {}",
        token.balance_of(&recipient.address()),
        token.balance_of(&depositor.address())
    );

    Ok(())
}
