//! Deterministic multi-week scenario behind `kiln simulate`.
//!
//! Cast: a large holder locking long, a staker in the main pool who also
//! locks short and re-locks on maturity, a staker in a smaller pool, and a
//! yield payer topping up the vault every four weeks.

use kiln_core::constants::{ONE, WEEK};
use kiln_core::error::KilnError;
use kiln_core::time::{week_start, Timestamp};
use kiln_core::{Address, PoolId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::protocol::{Event, Protocol, WeeklyReport};
use crate::settings::ProtocolConfig;

const HOUR: u64 = 3_600;
const YIELD_EVERY_WEEKS: u64 = 4;

/// Outcome of a scenario run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub deployed_at: Timestamp,
    pub ended_at: Timestamp,
    pub reports: Vec<WeeklyReport>,
    pub events: Vec<Event>,
    /// Rewards paid to stakers over the whole run.
    pub total_claimed: u128,
}

pub fn governance() -> Address {
    Address::from_seed(0xaa)
}

pub fn whale() -> Address {
    Address::from_seed(1)
}

pub fn staker() -> Address {
    Address::from_seed(2)
}

pub fn minnow() -> Address {
    Address::from_seed(3)
}

pub fn yield_payer() -> Address {
    Address::from_seed(4)
}

/// Run `weeks` weeks of activity starting at `deployed_at`.
pub fn run_scenario(config: &ProtocolConfig, deployed_at: Timestamp, weeks: u64) -> Result<Simulation, KilnError> {
    let mut p = Protocol::new(config, governance(), deployed_at)?;
    let (main_pool, side_pool) = (PoolId(0), PoolId(1));

    p.mint(&whale(), 1_000_000 * ONE, deployed_at)?;
    p.mint(&staker(), 200_000 * ONE, deployed_at)?;
    p.mint(&minnow(), 50_000 * ONE, deployed_at)?;
    p.mint(&yield_payer(), 100_000 * ONE, deployed_at)?;

    p.add_pool(main_pool, 3 * ONE, deployed_at)?;
    p.add_pool(side_pool, ONE, deployed_at)?;
    p.stake(main_pool, &staker(), 150_000 * ONE, deployed_at)?;
    p.stake(side_pool, &minnow(), 40_000 * ONE, deployed_at)?;

    let opens = p.vault().opens_at();
    p.lock(&whale(), 400_000 * ONE, 52, opens)?;
    p.lock(&staker(), 50_000 * ONE, 4, opens)?;

    let first_week = p.vault().start_week();
    let mut total_claimed = 0u128;
    let mut now = opens;
    for i in 1..=weeks {
        now = week_start(first_week + i) + HOUR;
        p.catch_up(now)?;

        for (pid, account) in [(main_pool, staker()), (side_pool, minnow())] {
            if let Some(claim) = p.claim(pid, &account, now)? {
                total_claimed += claim.amount;
            }
        }

        if i % YIELD_EVERY_WEEKS == 0 {
            let amount = 1_000 * ONE;
            if p.token().balance_of(&yield_payer()) >= amount {
                p.inject_yield(&yield_payer(), amount, now)?;
            }
        }

        // The staker rolls matured locks straight back in.
        let matured = p.vault().preview_withdraw(&staker(), now)?;
        if matured.principal > 0 {
            let out = p.unlock(&staker(), now)?;
            p.lock(&staker(), out.principal, 4, now)?;
        }
        if p.vault().preview_withdraw(&whale(), now)?.principal > 0 {
            p.unlock(&whale(), now)?;
        }

        // Halfway through, the side pool gets a bigger share.
        if i == weeks / 2 {
            p.update_weight(side_pool, 2 * ONE, now)?;
        }
    }

    let ended_at = now.max(opens) + WEEK;
    p.catch_up(ended_at)?;
    info!(weeks, total_claimed, events = p.events().len(), "scenario: finished");

    Ok(Simulation {
        deployed_at,
        ended_at,
        reports: p.reports(ended_at),
        events: p.events().to_vec(),
        total_claimed,
    })
}
