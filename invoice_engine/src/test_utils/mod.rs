//! Helpers for tests in this crate and in crates that build on it. Enabled with the `test_utils` feature.
mod doubles;
mod memory_ledger;
pub mod prepare_env;

pub use doubles::{CountingLedger, FixedPriceSource, RecordingNotifier, ScriptedGateway, SentMessage};
pub use memory_ledger::MemoryLedger;
