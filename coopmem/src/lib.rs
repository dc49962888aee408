//! Cooperative shared-memory substrate for single-machine benchmark runs.
//!
//! A "cluster" here is a set of cooperating nodes sharing one logical memory
//! space. Nodes run as OS threads of the current process, so sharing is the
//! address space itself; everything the benchmarks rely on is expressed
//! through the collective operations on [`NodeCtx`]: `barrier`, `co_alloc`
//! and `co_free`. [`LocalCluster::run`] is the init/finalize bracket.
//!
//! Every collective operation must be called by all nodes of the cluster,
//! in the same order, with the same arguments.

mod barrier;
mod cluster;
mod coarray;

pub use cluster::{ClusterError, LocalCluster, NodeCtx};
pub use coarray::{CoArray, MemError};
