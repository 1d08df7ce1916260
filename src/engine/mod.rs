//! Round Engine
//! Mission: Idempotent draw, settlement and housekeeping per scheduler tick
//!
//! Stateless between invocations by construction: every entry point re-reads
//! the store, and every mutation is a conditional write, so duplicate,
//! overlapping and delayed scheduler triggers are all safe.

pub mod draw;
pub mod retention;
pub mod settle;
pub mod tick;

pub use draw::{ensure_result, DrawStatus};
pub use settle::{settle_round, SettlementSummary};
pub use tick::{run_tick, TickParams, TickReport};
