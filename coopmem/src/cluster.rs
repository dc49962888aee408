use std::cell::Cell;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::barrier::Barrier;
use crate::coarray::{CoArray, MemError, SharedBuf};

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("cluster requires at least one node")]
    NoNodes,

    #[error("node {node} panicked")]
    NodePanicked { node: usize },
}

/// Launches a cluster of cooperating nodes as threads of this process and
/// runs one body per node. The builder mirrors the usual world-builder
/// shape: configure, then `run`.
pub struct LocalCluster {
    num_nodes: usize,
    mem_budget: usize,
}

impl LocalCluster {
    pub fn new(num_nodes: usize) -> Self {
        LocalCluster {
            num_nodes,
            mem_budget: usize::MAX,
        }
    }

    /// Cap the total bytes live in cooperative allocations at any one time.
    /// Exceeding the cap makes `co_alloc` fail on every node.
    pub fn mem_budget(mut self, bytes: usize) -> Self {
        self.mem_budget = bytes;
        self
    }

    /// Collective init/finalize bracket: spawns one thread per node, hands
    /// each a [`NodeCtx`], joins them all, and returns the per-node results
    /// in node order. A panicking node fails the whole run.
    pub fn run<F, R>(self, body: F) -> Result<Vec<R>, ClusterError>
    where
        F: Fn(NodeCtx) -> R + Sync,
        R: Send,
    {
        if self.num_nodes == 0 {
            return Err(ClusterError::NoNodes);
        }
        let state = Arc::new(ClusterState {
            num_nodes: self.num_nodes,
            barrier: Barrier::new(self.num_nodes),
            allocs: Mutex::new(AllocRegistry {
                slots: Vec::new(),
                bytes_in_use: 0,
                budget: self.mem_budget,
            }),
        });
        debug!(num_nodes = self.num_nodes, "launching local cluster");

        let results = std::thread::scope(|s| {
            let handles: Vec<_> = (0..self.num_nodes)
                .map(|node_id| {
                    let state = Arc::clone(&state);
                    let body = &body;
                    s.spawn(move || {
                        body(NodeCtx {
                            node_id,
                            num_nodes: state.num_nodes,
                            alloc_seq: Cell::new(0),
                            state,
                        })
                    })
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(node, h)| h.join().map_err(|_| ClusterError::NodePanicked { node }))
                .collect::<Result<Vec<R>, ClusterError>>()
        })?;

        debug!("local cluster finalized");
        Ok(results)
    }
}

pub(crate) struct ClusterState {
    num_nodes: usize,
    barrier: Barrier,
    allocs: Mutex<AllocRegistry>,
}

struct AllocRegistry {
    slots: Vec<AllocSlot>,
    bytes_in_use: usize,
    budget: usize,
}

struct AllocSlot {
    buf: Option<Arc<SharedBuf>>,
    len: usize,
    released: usize,
}

/// This node's view of the cluster: identity plus the collective
/// operations. One instance per node, moved into the node body at spawn.
pub struct NodeCtx {
    node_id: usize,
    num_nodes: usize,
    // local count of collective allocations performed; since every node
    // issues the same sequence of collective calls, allocation N on one
    // node is allocation N on all of them
    alloc_seq: Cell<usize>,
    state: Arc<ClusterState>,
}

impl NodeCtx {
    pub fn node_id(&self) -> usize {
        self.node_id
    }

    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// Collective barrier: blocks until every node has called it. Also a
    /// visibility fence, see [`crate::barrier`] — writes made before the
    /// barrier on any node are visible on all nodes after it.
    pub fn barrier(&self) {
        self.state.barrier.wait();
    }

    /// Cooperative allocation: every node must call with the same `count`
    /// and receives a handle to the same zero-initialized array. Includes
    /// an implicit barrier so the allocation is established everywhere
    /// before any node touches it.
    pub fn co_alloc(&self, count: usize) -> Result<CoArray, MemError> {
        let seq = self.alloc_seq.get();
        self.alloc_seq.set(seq + 1);

        let outcome = {
            let mut reg = self.state.allocs.lock();
            if let Some(slot) = reg.slots.get(seq) {
                if slot.len != count {
                    Err(MemError::SizeMismatch {
                        seq,
                        requested: count,
                        actual: slot.len,
                    })
                } else {
                    // first arrival already allocated; share its storage
                    Ok(slot
                        .buf
                        .clone()
                        .expect("collective allocation reused after co_free"))
                }
            } else {
                let bytes = count * std::mem::size_of::<f64>();
                if reg.bytes_in_use.saturating_add(bytes) > reg.budget {
                    Err(MemError::BudgetExceeded {
                        requested: bytes,
                        in_use: reg.bytes_in_use,
                        budget: reg.budget,
                    })
                } else {
                    let buf = Arc::new(SharedBuf::zeroed(count));
                    reg.bytes_in_use += bytes;
                    reg.slots.push(AllocSlot {
                        buf: Some(Arc::clone(&buf)),
                        len: count,
                        released: 0,
                    });
                    debug!(seq, count, bytes, "cooperative allocation established");
                    Ok(buf)
                }
            }
        };

        // rendezvous before the outcome is unwrapped so a failing node
        // cannot strand its peers inside the collective
        self.barrier();
        Ok(CoArray {
            id: seq,
            buf: outcome?,
        })
    }

    /// Cooperative deallocation: every node returns its handle; the storage
    /// is reclaimed once the last node has released it. Includes an
    /// implicit barrier.
    pub fn co_free(&self, arr: CoArray) {
        let id = arr.id;
        drop(arr);

        let mut reg = self.state.allocs.lock();
        reg.slots[id].released += 1;
        if reg.slots[id].released == self.num_nodes {
            if let Some(buf) = reg.slots[id].buf.take() {
                reg.bytes_in_use -= buf.len() * std::mem::size_of::<f64>();
                debug!(id, "cooperative allocation released");
            }
        }
        drop(reg);

        self.barrier();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_come_back_in_node_order() {
        let results = LocalCluster::new(4).run(|node| node.node_id()).unwrap();
        assert_eq!(results, vec![0, 1, 2, 3]);
    }

    #[test]
    fn zero_nodes_is_rejected() {
        assert!(matches!(
            LocalCluster::new(0).run(|_| ()),
            Err(ClusterError::NoNodes)
        ));
    }

    #[test]
    fn co_alloc_hands_every_node_the_same_array() {
        let nodes = 4;
        let results = LocalCluster::new(nodes)
            .run(|node| {
                let arr = node.co_alloc(nodes).unwrap();
                unsafe {
                    arr.slice_mut(node.node_id()..node.node_id() + 1)[0] =
                        node.node_id() as f64 + 1.0;
                }
                node.barrier();
                let seen: Vec<f64> = unsafe { arr.as_slice() }.to_vec();
                node.barrier();
                node.co_free(arr);
                seen
            })
            .unwrap();

        for seen in results {
            assert_eq!(seen, vec![1.0, 2.0, 3.0, 4.0]);
        }
    }

    #[test]
    fn budget_is_enforced_on_every_node() {
        let results = LocalCluster::new(2)
            .mem_budget(64)
            .run(|node| node.co_alloc(1024).err().is_some())
            .unwrap();
        assert_eq!(results, vec![true, true]);
    }

    #[test]
    fn mismatched_collective_sizes_are_rejected() {
        let results = LocalCluster::new(2)
            .run(|node| {
                // nodes disagree on the element count; whichever arrives
                // second must get the mismatch error
                let count = if node.node_id() == 0 { 16 } else { 32 };
                node.co_alloc(count).map(|arr| arr.len()).map_err(|e| {
                    assert!(matches!(e, MemError::SizeMismatch { .. }));
                })
            })
            .unwrap();
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    }

    #[test]
    fn sequential_allocations_are_distinct() {
        LocalCluster::new(2)
            .run(|node| {
                let a = node.co_alloc(8).unwrap();
                let b = node.co_alloc(8).unwrap();
                if node.node_id() == 0 {
                    unsafe {
                        a.slice_mut(0..8).fill(1.0);
                        b.slice_mut(0..8).fill(2.0);
                    }
                }
                node.barrier();
                assert_eq!(unsafe { a.as_slice() }[7], 1.0);
                assert_eq!(unsafe { b.as_slice() }[7], 2.0);
                node.barrier();
                node.co_free(b);
                node.co_free(a);
            })
            .unwrap();
    }
}
