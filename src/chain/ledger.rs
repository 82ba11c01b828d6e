//! Balance Ledger
//! Stake accounting for validators: a plain account map whose every change
//! is surfaced as a balance event by the owning transaction

use std::collections::HashMap;

use crate::chain::ChainError;

/// A validator account.
pub type Address = [u8; 20];

/// Stake bonded when creating an assertion, in wei.
pub const ASSERTION_STAKE: u128 = 100 * 10u128.pow(18);

/// Stake bonded when adding a challenge leaf, in wei.
pub const CHALLENGE_VERTEX_STAKE: u128 = 10u128.pow(18);

/// Account balances, held inside the chain state.
#[derive(Debug, Clone, Default)]
pub struct BalanceLedger {
    balances: HashMap<Address, u128>,
}

impl BalanceLedger {
    pub fn balance(&self, account: Address) -> u128 {
        self.balances.get(&account).copied().unwrap_or(0)
    }

    /// Overwrite an account balance, returning `(old, new)`
    pub(crate) fn set(&mut self, account: Address, amount: u128) -> (u128, u128) {
        let old = self.balance(account);
        self.balances.insert(account, amount);
        (old, amount)
    }

    /// Add to an account balance, returning `(old, new)`
    pub(crate) fn credit(&mut self, account: Address, amount: u128) -> (u128, u128) {
        let old = self.balance(account);
        let new = old + amount;
        self.balances.insert(account, new);
        (old, new)
    }

    /// Remove from an account balance, returning `(old, new)`
    pub(crate) fn debit(
        &mut self,
        account: Address,
        amount: u128,
    ) -> Result<(u128, u128), ChainError> {
        let old = self.balance(account);
        if old < amount {
            return Err(ChainError::InsufficientBalance);
        }
        let new = old - amount;
        self.balances.insert(account, new);
        Ok((old, new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = [1u8; 20];

    #[test]
    fn test_missing_account_reads_zero() {
        let ledger = BalanceLedger::default();
        assert_eq!(ledger.balance(ALICE), 0);
    }

    #[test]
    fn test_credit_and_debit() {
        let mut ledger = BalanceLedger::default();
        assert_eq!(ledger.credit(ALICE, 50), (0, 50));
        assert_eq!(ledger.debit(ALICE, 20).unwrap(), (50, 30));
        assert_eq!(ledger.balance(ALICE), 30);
    }

    #[test]
    fn test_overdraft_refused() {
        let mut ledger = BalanceLedger::default();
        ledger.set(ALICE, 10);
        assert_eq!(
            ledger.debit(ALICE, 11).unwrap_err(),
            ChainError::InsufficientBalance
        );
        // Balance untouched after the refused debit.
        assert_eq!(ledger.balance(ALICE), 10);
    }

    #[test]
    fn test_stake_constants() {
        assert_eq!(ASSERTION_STAKE, 100_000_000_000_000_000_000);
        assert_eq!(CHALLENGE_VERTEX_STAKE, 1_000_000_000_000_000_000);
    }
}
