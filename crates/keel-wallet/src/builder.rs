//! Transaction builder.
//!
//! 1. Select the sender's outputs covering the amount (read-only).
//! 2. One input per selected output, one output per payee, plus change back
//!    to the sender when the selection overshoots.
//! 3. Leave the unlock proofs empty (raw) or sign every input (signed).
//!
//! The unspent set is never modified here; the transaction only takes
//! effect once it is committed in a block.

use keel_core::constants::TX_VERSION;
use keel_core::crypto::{sign_transaction_input, KeyPair};
use keel_core::traits::UtxoSource;
use keel_core::types::{Hash256, Transaction, TxInput, TxOutput};
use tracing::debug;

use crate::error::WalletError;

/// A transaction recipient: address and amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payee {
    pub address: Hash256,
    pub amount: u64,
}

impl Payee {
    pub fn new(address: Hash256, amount: u64) -> Self {
        Self { address, amount }
    }
}

/// How inputs are unlocked.
#[derive(Debug, Clone, Copy)]
pub enum Unlock<'a> {
    /// Empty signature and public key on every input.
    Raw,
    /// Every input signed with this key, which must own the sending address.
    Signed(&'a KeyPair),
}

/// Build a transaction spending `amount` from `from` to `payees`.
///
/// Returns `Ok(None)` when `from` cannot cover `amount`. The payee total may
/// be less than `amount`; the difference is neither paid out nor returned.
///
/// # Errors
///
/// - [`WalletError::InvalidAmount`] if the payee total overflows or exceeds `amount`
/// - [`WalletError::KeyMismatch`] if the signing key does not own `from`
pub fn build_transaction(
    source: &dyn UtxoSource,
    from: &Hash256,
    amount: u64,
    payees: &[Payee],
    unlock: Unlock<'_>,
) -> Result<Option<Transaction>, WalletError> {
    let payee_total = payees
        .iter()
        .try_fold(0u64, |acc, p| acc.checked_add(p.amount))
        .ok_or_else(|| WalletError::InvalidAmount("payee total overflows".into()))?;
    if payee_total > amount {
        return Err(WalletError::InvalidAmount(format!(
            "payees receive {payee_total}, more than the {amount} being spent"
        )));
    }
    if let Unlock::Signed(kp) = unlock {
        let key_owner = kp.pubkey_hash();
        if key_owner != *from {
            return Err(WalletError::KeyMismatch { from: *from, key_owner });
        }
    }

    let Some(selection) = source.select_entries(from, amount) else {
        debug!(%from, amount, "insufficient funds");
        return Ok(None);
    };

    let inputs = selection
        .entries
        .iter()
        .map(|(outpoint, _)| TxInput::unsigned(outpoint.clone()))
        .collect();

    let mut outputs: Vec<TxOutput> = payees
        .iter()
        .map(|p| TxOutput { value: p.amount, pubkey_hash: p.address })
        .collect();
    if selection.change > 0 {
        outputs.push(TxOutput { value: selection.change, pubkey_hash: *from });
    }

    let mut tx = Transaction {
        version: TX_VERSION,
        inputs,
        outputs,
        lock_time: 0,
    };

    if let Unlock::Signed(kp) = unlock {
        for (i, (_, spent)) in selection.entries.iter().enumerate() {
            sign_transaction_input(&mut tx, i, spent, kp)?;
        }
    }

    debug!(
        %from,
        amount,
        inputs = tx.inputs.len(),
        change = selection.change,
        "built transaction"
    );
    Ok(Some(tx))
}

/// Builder collecting payees before building; the amount spent is the payee total.
///
/// # Example
/// ```ignore
/// let tx = TransactionBuilder::new(sender)
///     .add_payee(alice, 40)
///     .add_payee(bob, 60)
///     .build(&tracker, Unlock::Signed(&keypair))?;
/// ```
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    from: Hash256,
    payees: Vec<Payee>,
}

impl TransactionBuilder {
    pub fn new(from: Hash256) -> Self {
        Self { from, payees: Vec::new() }
    }

    pub fn add_payee(&mut self, address: Hash256, amount: u64) -> &mut Self {
        self.payees.push(Payee::new(address, amount));
        self
    }

    pub fn payees(&self) -> &[Payee] {
        &self.payees
    }

    pub fn build(
        &self,
        source: &dyn UtxoSource,
        unlock: Unlock<'_>,
    ) -> Result<Option<Transaction>, WalletError> {
        let amount = self
            .payees
            .iter()
            .try_fold(0u64, |acc, p| acc.checked_add(p.amount))
            .ok_or_else(|| WalletError::InvalidAmount("payee total overflows".into()))?;
        build_transaction(source, &self.from, amount, &self.payees, unlock)
    }
}
