//! Shared test helpers for scenario and adversarial tests.

use kiln_core::time::Timestamp;
use kiln_core::Address;
use kiln_sim::{Protocol, ProtocolConfig};
use kiln_token::{EmissionToken, MinterSet};
use kiln_vault::{DirectFarm, LockVault};

/// 2023-01-01T00:00:00Z, a Sunday. Weeks start on Thursdays, so this sits
/// mid-week.
pub const DEPLOY: Timestamp = 1_672_531_200;

pub fn addr(seed: u8) -> Address {
    Address::from_seed(seed)
}

pub fn gov() -> Address {
    addr(0xaa)
}

pub fn vault_addr() -> Address {
    addr(0xee)
}

/// Token deployed at [`DEPLOY`] with governance as the only minter.
pub fn token() -> EmissionToken {
    let mut minters = MinterSet::new(gov());
    minters
        .set_minter(&gov(), gov(), true)
        .expect("governance may add minters");
    EmissionToken::new(minters, DEPLOY, 520)
}

pub fn vault() -> LockVault<DirectFarm> {
    LockVault::new(vault_addr(), DirectFarm::new(), DEPLOY, 520)
}

pub fn protocol() -> Protocol {
    protocol_with(&ProtocolConfig::default())
}

pub fn protocol_with(config: &ProtocolConfig) -> Protocol {
    Protocol::new(config, gov(), DEPLOY).expect("deployment succeeds")
}
