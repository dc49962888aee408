//! Stream benchmarks over a cooperative shared-memory cluster.
//!
//! Each benchmark partitions one logical array across an
//! `nodes x threads-per-node` grid of workers, transforms it in
//! barrier-delimited phases, and verifies the result against a closed form
//! on node 0. The multi-threaded variant additionally runs a per-node
//! monitor thread that shares the console between nodes on a wall-clock
//! round-robin schedule.

pub mod error;
pub mod monitor;
pub mod options;
pub mod partition;
mod printer;
pub mod progress;
pub mod run;
pub mod worker;

pub use error::{BenchError, Result};
