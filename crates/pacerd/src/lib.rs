//! pacerd library surface.
//!
//! The binary in `main.rs` is a thin CLI around [`cycle::CycleDriver`];
//! exposing the driver here lets integration tests run full cycles
//! against a mock cluster API and an in-memory ledger.

pub mod cycle;

pub use cycle::{CycleDriver, CycleOutcome};
