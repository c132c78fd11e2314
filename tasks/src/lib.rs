//! Task manager.
//!
//! Tasks move through a fixed status table from `Draft` to `Completed` (or
//! `Disputed`, `Cancelled`, `Expired`). Publishing is gated on reputation and
//! an hourly, reputation-scaled quota. Executors are chosen by bidding,
//! self-claim or requester assignment. Delivery produces a [`DeliveryProof`]
//! that the requester confirms before settlement.
//!
//! All state (tasks, capabilities, delivery proofs) is written through a
//! [`agora_store::SnapshotStore`] after every successful mutation.

pub mod config;
pub mod error;
pub mod filter;
pub mod manager;
pub mod quota;
pub mod task;

pub use config::TaskManagerConfig;
pub use error::TaskError;
pub use filter::TaskFilter;
pub use manager::{TaskManager, TaskSnapshot, TaskStatistics, TASKS_KEY};
pub use quota::PublishQuota;
pub use task::{
    AgentCapability, DeliveryProof, PublishMode, RiskLevel, SettlementResult, Task,
    TaskAssignment, TaskBid, TaskClaim, TaskStatus, TaskType,
};
