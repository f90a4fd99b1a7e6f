//! Yield source variants the vault can park its assets in.
//!
//! - [`DirectFarm`]: a plain staking balance, 1:1 with what was deposited.
//! - [`FarmBar`]: the farm position folded into a share-priced bar; deposits
//!   buy bar shares at the current price and farm rewards compound into the
//!   bar's assets, raising the price.

use kiln_core::error::{KilnError, MathError, VaultError};
use kiln_core::math::{checked_add, checked_sub, mul_div, mul_div_up};
use kiln_core::traits::YieldSource;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectFarm {
    staked: u128,
}

impl DirectFarm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl YieldSource for DirectFarm {
    fn deposit(&mut self, amount: u128) -> Result<(), MathError> {
        self.staked = checked_add(self.staked, amount)?;
        Ok(())
    }

    fn withdraw(&mut self, amount: u128) -> Result<(), KilnError> {
        if amount > self.staked {
            return Err(VaultError::InsufficientAssets {
                have: self.staked,
                need: amount,
            }
            .into());
        }
        self.staked -= amount;
        Ok(())
    }

    fn total_balance(&self) -> u128 {
        self.staked
    }
}

/// Vault position held as shares of a compounding bar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmBar {
    /// Bar shares owned by the vault.
    shares: u128,
    /// Underlying assets backing those shares.
    assets: u128,
}

impl FarmBar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shares(&self) -> u128 {
        self.shares
    }

    /// Fold harvested farm rewards into the bar. Shares stay, price rises.
    pub fn compound(&mut self, rewards: u128) -> Result<(), MathError> {
        self.assets = checked_add(self.assets, rewards)?;
        Ok(())
    }

    fn shares_for(&self, amount: u128) -> Result<u128, MathError> {
        if self.shares == 0 || self.assets == 0 {
            return Ok(amount);
        }
        mul_div(amount, self.shares, self.assets)
    }
}

impl YieldSource for FarmBar {
    fn deposit(&mut self, amount: u128) -> Result<(), MathError> {
        let minted = self.shares_for(amount)?;
        let shares = checked_add(self.shares, minted)?;
        let assets = checked_add(self.assets, amount)?;
        self.shares = shares;
        self.assets = assets;
        Ok(())
    }

    fn withdraw(&mut self, amount: u128) -> Result<(), KilnError> {
        if amount > self.assets {
            return Err(VaultError::InsufficientAssets {
                have: self.assets,
                need: amount,
            }
            .into());
        }
        // Round the burn up so the bar never pays out more than it backs.
        let burned = if amount == self.assets {
            self.shares
        } else {
            mul_div_up(amount, self.shares, self.assets)?.min(self.shares)
        };
        self.shares = checked_sub(self.shares, burned)?;
        self.assets -= amount;
        Ok(())
    }

    fn total_balance(&self) -> u128 {
        self.assets
    }
}
