//! Hash-distributed bidirectional A* engine internals and public API.

mod engine;
mod heap;
mod inbox;
mod node;
mod table;
mod worker;

pub use engine::{solve, PathSummary, SolverConfig};
