use std::cell::UnsafeCell;
use std::ops::Range;
use std::sync::Arc;

use thiserror::Error;

/// Errors surfaced by the cooperative allocator. All are fatal to the run;
/// nothing here is retried.
#[derive(Error, Debug)]
pub enum MemError {
    #[error(
        "cooperative allocation of {requested} bytes exceeds the memory \
         budget ({in_use} of {budget} bytes already in use)"
    )]
    BudgetExceeded {
        requested: usize,
        in_use: usize,
        budget: usize,
    },

    #[error(
        "collective allocation {seq} mismatch: this node requested \
         {requested} elements but the allocation holds {actual}"
    )]
    SizeMismatch {
        seq: usize,
        requested: usize,
        actual: usize,
    },
}

/// Backing storage for one cooperative allocation. `UnsafeCell` because
/// nodes and their worker threads write concurrently to disjoint ranges;
/// the disjointness contract lives on the accessors of [`CoArray`].
pub(crate) struct SharedBuf {
    cells: Box<[UnsafeCell<f64>]>,
}

// Concurrent access is governed by the unsafe accessors below.
unsafe impl Sync for SharedBuf {}

impl SharedBuf {
    pub(crate) fn zeroed(len: usize) -> Self {
        SharedBuf {
            cells: (0..len).map(|_| UnsafeCell::new(0.0)).collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.cells.len()
    }
}

/// Handle to one cooperatively allocated array of `f64`. Every node holds
/// its own handle to the same storage; handles are obtained from
/// [`crate::NodeCtx::co_alloc`] and returned through
/// [`crate::NodeCtx::co_free`].
///
/// Element access is deliberately `unsafe`: the array is written by many
/// threads with no per-element synchronization, and it is the caller's
/// partitioning that makes this sound. The benchmarks uphold the contract
/// by construction (worker ranges are an exact partition) and by phase
/// barriers (no node reads another node's slice while it is being written).
pub struct CoArray {
    pub(crate) id: usize,
    pub(crate) buf: Arc<SharedBuf>,
}

impl CoArray {
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.len() == 0
    }

    /// Mutable view of `range`.
    ///
    /// # Safety
    /// For the lifetime of the returned slice no other thread may read or
    /// write any element of `range`. Panics if `range` is out of bounds
    /// (an ownership-computation defect, fatal by design).
    pub unsafe fn slice_mut(&self, range: Range<usize>) -> &mut [f64] {
        assert!(
            range.start <= range.end && range.end <= self.len(),
            "range {range:?} out of bounds for cooperative array of length {}",
            self.len()
        );
        // UnsafeCell<f64> is repr(transparent) over f64
        let base = self.buf.cells.as_ptr() as *mut f64;
        std::slice::from_raw_parts_mut(base.add(range.start), range.len())
    }

    /// Shared view of `range`.
    ///
    /// # Safety
    /// For the lifetime of the returned slice no thread may write any
    /// element of `range`. Panics on an out-of-bounds range.
    pub unsafe fn slice(&self, range: Range<usize>) -> &[f64] {
        assert!(
            range.start <= range.end && range.end <= self.len(),
            "range {range:?} out of bounds for cooperative array of length {}",
            self.len()
        );
        let base = self.buf.cells.as_ptr() as *const f64;
        std::slice::from_raw_parts(base.add(range.start), range.len())
    }

    /// Shared view of the whole array; same contract as [`CoArray::slice`].
    ///
    /// # Safety
    /// No thread may write any element while the slice is alive.
    pub unsafe fn as_slice(&self) -> &[f64] {
        self.slice(0..self.len())
    }
}
