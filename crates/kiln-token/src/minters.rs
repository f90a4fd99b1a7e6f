//! Governance-controlled minter authorization.

use std::collections::BTreeSet;

use kiln_core::error::TokenError;
use kiln_core::traits::MinterRegistry;
use kiln_core::Address;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Set of addresses allowed to mint, toggled by a single governance address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinterSet {
    governance: Address,
    minters: BTreeSet<Address>,
}

impl MinterSet {
    pub fn new(governance: Address) -> Self {
        Self {
            governance,
            minters: BTreeSet::new(),
        }
    }

    pub fn governance(&self) -> Address {
        self.governance
    }

    /// Grant or revoke minting rights.
    ///
    /// # Errors
    ///
    /// [`TokenError::Unauthorized`] unless `caller` is governance.
    pub fn set_minter(&mut self, caller: &Address, account: Address, enabled: bool) -> Result<(), TokenError> {
        if *caller != self.governance {
            return Err(TokenError::Unauthorized(*caller));
        }
        if enabled {
            self.minters.insert(account);
        } else {
            self.minters.remove(&account);
        }
        info!(%account, enabled, "minters: updated");
        Ok(())
    }

    /// Hand governance to another address.
    pub fn transfer_governance(&mut self, caller: &Address, to: Address) -> Result<(), TokenError> {
        if *caller != self.governance {
            return Err(TokenError::Unauthorized(*caller));
        }
        info!(from = %self.governance, %to, "minters: governance transferred");
        self.governance = to;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.minters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.minters.is_empty()
    }
}

impl MinterRegistry for MinterSet {
    fn is_minter(&self, account: &Address) -> bool {
        self.minters.contains(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gov() -> Address {
        Address::from_seed(0xaa)
    }

    #[test]
    fn governance_toggles_minters() {
        let mut set = MinterSet::new(gov());
        let chef = Address::from_seed(1);
        assert!(!set.is_minter(&chef));

        set.set_minter(&gov(), chef, true).unwrap();
        assert!(set.is_minter(&chef));
        assert_eq!(set.len(), 1);

        set.set_minter(&gov(), chef, false).unwrap();
        assert!(!set.is_minter(&chef));
        assert!(set.is_empty());
    }

    #[test]
    fn non_governance_is_rejected() {
        let mut set = MinterSet::new(gov());
        let mallory = Address::from_seed(0x66);
        let err = set.set_minter(&mallory, mallory, true).unwrap_err();
        assert_eq!(err, TokenError::Unauthorized(mallory));
        assert!(!set.is_minter(&mallory));
    }

    #[test]
    fn governance_transfer() {
        let mut set = MinterSet::new(gov());
        let next = Address::from_seed(0xbb);
        set.transfer_governance(&gov(), next).unwrap();
        assert_eq!(set.governance(), next);
        assert!(set.set_minter(&gov(), next, true).is_err());
        assert!(set.set_minter(&next, next, true).is_ok());
    }
}
