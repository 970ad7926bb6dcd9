//! ERC-20 balances of every token the model knows about.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};

use crate::error::GravityError;

#[derive(Debug, Clone, Default)]
pub struct TokenLedger {
    balances: BTreeMap<(Address, Address), U256>,
}

impl TokenLedger {
    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .get(&(token, holder))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    pub fn mint(&mut self, token: Address, to: Address, amount: U256) {
        let balance = self.balances.entry((token, to)).or_insert(U256::ZERO);
        *balance = balance.saturating_add(amount);
    }

    pub fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), GravityError> {
        let have = self.balance_of(token, from);
        if have < amount {
            return Err(GravityError::InsufficientBalance {
                token,
                holder: from,
                have,
                need: amount,
            });
        }
        self.balances.insert((token, from), have - amount);
        self.mint(token, to, amount);
        Ok(())
    }
}
