//! gridpacer-policy — the decision engine.
//!
//! Pure, synchronous, no I/O. The daemon builds one [`CycleContext`] per
//! cycle and calls [`PolicyEngine::evaluate`] per job; the engine mutates
//! the job's ledger entry in place and returns a [`JobDecision`] for the
//! actuator. Jobs are evaluated independently — all cross-job context
//! (pressure, fair share, user usage) is precomputed in the context.

pub mod context;
pub mod engine;

pub use context::CycleContext;
pub use engine::{JobDecision, PhaseTarget, PolicyEngine};
