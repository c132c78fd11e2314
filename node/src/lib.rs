//! Agora marketplace node.
//!
//! Wires the reputation system, verification committee, task manager,
//! dispute manager and signed ledger into one node, runs the flows that
//! span them, and drives their periodic sweeps.

pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod shutdown;

pub use config::{NodeConfig, SweepConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::{MarketNode, COMMITTEE_KEY, LEDGER_KEY, REPUTATION_KEY};
pub use shutdown::ShutdownController;
