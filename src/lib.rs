//! Parallel bidirectional A* search over memory-mapped block mazes.

pub mod grid;
pub mod search;

pub use grid::MazeFile;
pub use search::{solve, PathSummary, SolverConfig};
