use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use coopmem::{CoArray, NodeCtx};

use crate::error::{BenchError, Result};
use crate::monitor::Monitor;
use crate::options::{PageFetchCli, ScaleCli, StreamCli};
use crate::partition::{chunk_range, node_range};
use crate::printer;
use crate::progress::ProgressVec;
use crate::worker::{run_worker, WorkerAssignment};

pub const PAGE_BYTES: usize = 4096;
pub(crate) const DOUBLES_PER_PAGE: usize = PAGE_BYTES / std::mem::size_of::<f64>();
const FETCH_PATTERN: f64 = 42.0;

/// Timing captured by node 0 for one stream run.
#[derive(Debug, Clone, Copy)]
pub struct RunStats {
    pub elapsed_secs: f64,
    pub mflops: f64,
}

/// Node 0's summary of a page fetch run.
#[derive(Debug, Clone, Copy)]
pub struct FetchStats {
    pub pages_loaded: u64,
    pub elapsed_secs: f64,
    pub mb_per_s: f64,
    pub load_micros: f64,
}

fn mflops(size: usize, iterations: usize, elapsed_secs: f64) -> f64 {
    // one multiply and one add per transform application
    let ops = 2.0 * size as f64 * iterations as f64;
    ops / elapsed_secs.max(1e-12) / 1e6
}

/// The multi-threaded accumulate benchmark, run once per node. Returns the
/// run stats on node 0, `None` elsewhere.
pub fn stream_accum(node: &NodeCtx, cli: &StreamCli) -> Result<Option<RunStats>> {
    let node_id = node.node_id();
    let num_nodes = node.num_nodes();

    let in_array = node.co_alloc(cli.size)?;
    let out_array = node.co_alloc(cli.size)?;
    // allocations established on every node before any touches the arrays
    node.barrier();

    if node_id == 0 {
        println!("Initializing data.");
    }
    // each node initializes only its own slice
    let my_slice = node_range(cli.size, num_nodes, node_id);
    {
        // Safety: node slices are disjoint and nothing reads them before
        // the next barrier
        unsafe { in_array.slice_mut(my_slice.clone()) }.fill(cli.seed);
        unsafe { out_array.slice_mut(my_slice.clone()) }.fill(0.0);
    }

    // every slice initialized before compute begins
    node.barrier();
    if node_id == 0 {
        println!(
            "Executing with {num_nodes} nodes x {} threads.",
            cli.threads
        );
    }
    let start = Instant::now();

    let progress = Arc::new(ProgressVec::new(cli.threads));
    let cancel = Arc::new(AtomicBool::new(false));

    std::thread::scope(|s| {
        let mut workers = Vec::with_capacity(cli.threads);
        for local in 0..cli.threads {
            let tid = node_id * cli.threads + local;
            let assign = WorkerAssignment {
                range: chunk_range(cli.size, num_nodes, cli.threads, tid),
                alpha: cli.alpha,
                iterations: cli.iterations,
                slot: local,
            };
            let in_array = &in_array;
            let out_array = &out_array;
            let progress = Arc::clone(&progress);
            workers.push(s.spawn(move || run_worker(in_array, out_array, &progress, &assign)));
        }
        let monitor = Monitor::new(node_id, num_nodes, Arc::clone(&progress), Arc::clone(&cancel));
        let monitor_handle = s.spawn(move || monitor.run());

        for w in workers {
            w.join().expect("worker thread panicked");
        }
        // worker completion is the authoritative stopping condition
        cancel.store(true, Ordering::Release);
        monitor_handle.join().expect("monitor thread panicked");
    });

    // every node's compute is complete before verification
    node.barrier();

    let mut stats = None;
    let verdict = if node_id == 0 {
        println!("Checking results.");
        let elapsed = start.elapsed().as_secs_f64();
        let expected = cli.seed * cli.alpha * cli.iterations as f64;
        let verdict = verify_output(&out_array, expected);
        if verdict.is_ok() {
            let s = RunStats {
                elapsed_secs: elapsed,
                mflops: mflops(cli.size, cli.iterations, elapsed),
            };
            printer::print_stream_summary("stream_accum", &s);
            stats = Some(s);
        }
        verdict
    } else {
        Ok(())
    };

    // teardown stays collective even after a failed verification; the
    // error surfaces once every node has left the collective sequence
    node.barrier();
    node.co_free(out_array);
    node.co_free(in_array);

    verdict?;
    Ok(stats)
}

/// The single-threaded scale benchmark: one pass of
/// `output = input * alpha` over each node's slice, no worker pool, no
/// monitor.
pub fn stream_scale(node: &NodeCtx, cli: &ScaleCli) -> Result<()> {
    let node_id = node.node_id();
    let num_nodes = node.num_nodes();

    let in_array = node.co_alloc(cli.size)?;
    let out_array = node.co_alloc(cli.size)?;
    node.barrier();

    if node_id == 0 {
        println!("Initializing data.");
    }
    let my_slice = node_range(cli.size, num_nodes, node_id);
    {
        // Safety: node slices are disjoint until the next barrier
        unsafe { in_array.slice_mut(my_slice.clone()) }.fill(cli.seed);
        unsafe { out_array.slice_mut(my_slice.clone()) }.fill(0.0);
    }

    node.barrier();
    if node_id == 0 {
        println!("Executing.");
    }
    {
        // Safety: same slice discipline as initialization
        let out = unsafe { out_array.slice_mut(my_slice.clone()) };
        let inp = unsafe { in_array.slice(my_slice.clone()) };
        for (o, i) in out.iter_mut().zip(inp) {
            *o = i * cli.alpha;
        }
    }

    node.barrier();
    let verdict = if node_id == 0 {
        println!("Checking results.");
        let verdict = verify_output(&out_array, cli.seed * cli.alpha);
        if verdict.is_ok() {
            println!("Test successful.");
        }
        verdict
    } else {
        Ok(())
    };

    node.barrier();
    node.co_free(out_array);
    node.co_free(in_array);
    verdict
}

/// The page fetch benchmark: node 0 initializes every page, the remaining
/// nodes repeatedly fault the first double of each page in, one chunk of
/// pages per fetch thread, one barrier per iteration. Node 0 reports
/// aggregate throughput.
pub fn page_fetch(node: &NodeCtx, cli: &PageFetchCli) -> Result<Option<FetchStats>> {
    let node_id = node.node_id();
    let array = node.co_alloc(cli.num_pages * DOUBLES_PER_PAGE)?;
    node.barrier();

    if node_id == 0 {
        println!("Initializing data.");
        // Safety: only node 0 writes, and only before the next barrier
        unsafe { array.slice_mut(0..array.len()) }.fill(FETCH_PATTERN);
    }
    node.barrier();

    if node_id == 0 {
        println!("Running throughput benchmark...");
    }
    let start = Instant::now();
    let pages_per_worker = cli.num_pages / cli.threads;

    for iteration in 0..cli.iterations {
        if node_id == 0 {
            println!("Running iteration: {}", iteration + 1);
        } else {
            std::thread::scope(|s| {
                for t in 0..cli.threads {
                    let array = &array;
                    s.spawn(move || {
                        let first_page = t * pages_per_worker;
                        for page in first_page..first_page + pages_per_worker {
                            // Safety: all writes completed before the
                            // post-initialization barrier
                            let v = unsafe {
                                array.slice(page * DOUBLES_PER_PAGE..page * DOUBLES_PER_PAGE + 1)
                            }[0];
                            assert_eq!(v, FETCH_PATTERN, "page {page} read back corrupt data");
                        }
                    });
                }
            });
        }
        node.barrier();
    }

    let stats = if node_id == 0 {
        println!("Execution completed. Calculating stats.");
        let elapsed = start.elapsed().as_secs_f64();
        let pages_loaded = (cli.num_pages * cli.iterations) as u64;
        let stats = FetchStats {
            pages_loaded,
            elapsed_secs: elapsed,
            mb_per_s: pages_loaded as f64 * PAGE_BYTES as f64
                / elapsed.max(1e-12)
                / (1024.0 * 1024.0),
            load_micros: elapsed * 1e6 / pages_loaded as f64,
        };
        printer::print_fetch_summary(&stats);
        Some(stats)
    } else {
        None
    };

    node.barrier();
    node.co_free(array);
    Ok(stats)
}

/// Node 0's strict post-compute check: every output element must equal the
/// closed-form expectation exactly. The first mismatch aborts the run with
/// its index and both values.
pub fn verify_output(out: &CoArray, expected: f64) -> Result<()> {
    // Safety: called after the post-compute barrier; no writers remain
    let data = unsafe { out.as_slice() };
    for (index, &actual) in data.iter().enumerate() {
        if actual != expected {
            return Err(BenchError::Verification {
                index,
                expected,
                actual,
            });
        }
    }
    Ok(())
}
