use std::ops::Range;

use coopmem::CoArray;

use crate::progress::ProgressVec;

/// Elements between periodic progress stores.
const PROGRESS_INTERVAL: usize = 500;

/// Everything a worker needs to know about its share of the run.
pub struct WorkerAssignment {
    /// Half-open element range this worker owns in both arrays.
    pub range: Range<usize>,
    /// Scalar applied on every transform application.
    pub alpha: f64,
    /// Transform applications per element.
    pub iterations: usize,
    /// This worker's slot in the node-local progress vector.
    pub slot: usize,
}

/// Applies the transform over the assigned range: accumulates
/// `input[i] * alpha` into `output[i]`, `iterations` times per element.
/// Publishes fractional completion into the progress slot as it goes
/// (offsets at exact multiples of the interval are skipped) and always
/// finishes with an unconditional `1.0` so the monitor can observe
/// termination regardless of where the periodic cadence landed.
pub fn run_worker(
    input: &CoArray,
    output: &CoArray,
    progress: &ProgressVec,
    assign: &WorkerAssignment,
) {
    let len = assign.range.len();
    // Safety: worker ranges form an exact partition of the arrays and no
    // other thread touches this range until the post-compute barrier.
    let out = unsafe { output.slice_mut(assign.range.clone()) };
    let inp = unsafe { input.slice(assign.range.clone()) };

    for off in 0..len {
        for _ in 0..assign.iterations {
            out[off] += inp[off] * assign.alpha;
        }
        // update progress occasionally
        if off % PROGRESS_INTERVAL != 0 {
            progress.publish(assign.slot, off as f64 / len as f64);
        }
    }
    progress.publish(assign.slot, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use coopmem::LocalCluster;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn transform_matches_closed_form() {
        LocalCluster::new(1)
            .run(|node| {
                let input = node.co_alloc(512).unwrap();
                let output = node.co_alloc(512).unwrap();
                unsafe { input.slice_mut(0..512) }.fill(21.0);

                let progress = ProgressVec::new(1);
                let assign = WorkerAssignment {
                    range: 128..384,
                    alpha: 2.0,
                    iterations: 100,
                    slot: 0,
                };
                run_worker(&input, &output, &progress, &assign);

                let out = unsafe { output.as_slice() };
                for (i, &v) in out.iter().enumerate() {
                    if (128..384).contains(&i) {
                        assert_eq!(v, 4200.0, "element {i}");
                    } else {
                        // untouched outside the assigned range
                        assert_eq!(v, 0.0, "element {i}");
                    }
                }
                assert_eq!(progress.snapshot(0), 1.0);

                node.co_free(output);
                node.co_free(input);
            })
            .unwrap();
    }

    #[test]
    fn completion_is_signaled_even_for_tiny_ranges() {
        // a one-element range never hits the periodic publish condition
        LocalCluster::new(1)
            .run(|node| {
                let input = node.co_alloc(8).unwrap();
                let output = node.co_alloc(8).unwrap();
                unsafe { input.slice_mut(0..8) }.fill(1.0);

                let progress = ProgressVec::new(1);
                let assign = WorkerAssignment {
                    range: 3..4,
                    alpha: 3.0,
                    iterations: 2,
                    slot: 0,
                };
                run_worker(&input, &output, &progress, &assign);

                assert_eq!(progress.snapshot(0), 1.0);
                assert_eq!(unsafe { output.as_slice() }[3], 6.0);

                node.co_free(output);
                node.co_free(input);
            })
            .unwrap();
    }

    #[test]
    fn observed_progress_is_monotonic() {
        LocalCluster::new(1)
            .run(|node| {
                let input = node.co_alloc(4096).unwrap();
                let output = node.co_alloc(4096).unwrap();
                unsafe { input.slice_mut(0..4096) }.fill(1.0);

                let progress = Arc::new(ProgressVec::new(1));
                let done = Arc::new(AtomicBool::new(false));

                std::thread::scope(|s| {
                    let sampler = {
                        let progress = Arc::clone(&progress);
                        let done = Arc::clone(&done);
                        s.spawn(move || {
                            let mut samples = Vec::new();
                            while !done.load(Ordering::Acquire) {
                                samples.push(progress.snapshot(0));
                                std::thread::yield_now();
                            }
                            samples.push(progress.snapshot(0));
                            samples
                        })
                    };

                    let assign = WorkerAssignment {
                        range: 0..4096,
                        alpha: 2.0,
                        iterations: 5,
                        slot: 0,
                    };
                    run_worker(&input, &output, &progress, &assign);
                    done.store(true, Ordering::Release);

                    let samples = sampler.join().unwrap();
                    let mut last = 0.0;
                    for v in samples {
                        assert!(v >= last, "progress went backwards: {v} after {last}");
                        last = v;
                    }
                    assert_eq!(last, 1.0);
                });

                node.co_free(output);
                node.co_free(input);
            })
            .unwrap();
    }
}
