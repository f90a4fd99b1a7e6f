//! # kiln-sim — Protocol composition, configuration and simulation.
//!
//! Wires one emission token, one lock vault, one reward controller and a
//! distributor per pool into a [`Protocol`], loads [`ProtocolConfig`] from a
//! TOML file and `KILN_*` environment variables, and runs the deterministic
//! scenario behind `kiln simulate`.

pub mod settings;
pub mod logging;
pub mod protocol;
pub mod scenario;

pub use settings::{ConfigError, ProtocolConfig};
pub use logging::init_logging;
pub use protocol::{Event, Protocol, WeeklyReport};
pub use scenario::{run_scenario, Simulation};
