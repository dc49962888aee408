use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::progress::ProgressVec;

/// Whether `node_id` owns the console during wall-clock second
/// `elapsed_secs`. Nodes share one console on a time-division round-robin:
/// node `k` prints only in seconds where
/// `elapsed % (num_nodes + 1) == k + 1`. The cycle is one second longer
/// than the node count, leaving one unclaimed second per cycle as slack
/// against clock skew between nodes.
pub fn owns_console_second(elapsed_secs: u64, node_id: usize, num_nodes: usize) -> bool {
    elapsed_secs % (num_nodes as u64 + 1) == node_id as u64 + 1
}

/// Per-node progress reporter. Polls the node's progress vector in a
/// busy-yield loop, prints one snapshot line per owned console second, and
/// exits once every local worker has been observed at 1.0 or the cancel
/// flag is raised by the coordinator after worker join.
pub struct Monitor {
    node_id: usize,
    num_nodes: usize,
    progress: Arc<ProgressVec>,
    cancel: Arc<AtomicBool>,
}

impl Monitor {
    pub fn new(
        node_id: usize,
        num_nodes: usize,
        progress: Arc<ProgressVec>,
        cancel: Arc<AtomicBool>,
    ) -> Self {
        Monitor {
            node_id,
            num_nodes,
            progress,
            cancel,
        }
    }

    pub fn run(&self) {
        let start = Instant::now();
        let mut done = vec![false; self.progress.len()];
        let mut last_report: Option<u64> = None;

        loop {
            if done.iter().all(|&d| d) {
                println!("[{}] COMPLETED.", self.node_id);
                return;
            }
            if self.cancel.load(Ordering::Acquire) {
                return;
            }
            let t = start.elapsed().as_secs();
            if owns_console_second(t, self.node_id, self.num_nodes) && last_report != Some(t) {
                last_report = Some(t);
                self.report(&mut done);
            }
            // sub-second granularity is needed to catch the window; yield
            // instead of sleeping
            std::thread::yield_now();
        }
    }

    // one snapshot line covering every local worker; slots observed at
    // exactly 1.0 are marked done locally
    fn report(&self, done: &mut [bool]) {
        let mut line = format!("[{}] [", self.node_id);
        for slot in 0..self.progress.len() {
            let p = self.progress.snapshot(slot);
            if p == 1.0 {
                done[slot] = true;
            }
            let _ = write!(line, " {:3.0}%", p * 100.0);
        }
        line.push(']');
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn round_robin_gives_each_node_exactly_one_second() {
        for num_nodes in 1..=5 {
            let cycle = num_nodes as u64 + 1;
            for window_start in 0..3 * cycle {
                // within any full cycle each node owns exactly one second
                // and no second is owned twice
                let mut owners_seen = vec![0usize; num_nodes];
                for t in window_start..window_start + cycle {
                    let owners: Vec<usize> = (0..num_nodes)
                        .filter(|&id| owns_console_second(t, id, num_nodes))
                        .collect();
                    assert!(owners.len() <= 1, "second {t} shared by {owners:?}");
                    if let Some(&id) = owners.first() {
                        owners_seen[id] += 1;
                    }
                }
                assert!(owners_seen.iter().all(|&n| n == 1));
            }
        }
    }

    #[test]
    fn slack_second_is_never_owned() {
        for num_nodes in 1..=5 {
            let cycle = num_nodes as u64 + 1;
            for k in 0..4 {
                let t = k * cycle; // remainder 0
                assert!((0..num_nodes).all(|id| !owns_console_second(t, id, num_nodes)));
            }
        }
    }

    #[test]
    fn monitor_completes_when_all_slots_reach_one() {
        let progress = Arc::new(ProgressVec::new(3));
        for slot in 0..3 {
            progress.publish(slot, 1.0);
        }
        let cancel = Arc::new(AtomicBool::new(false));
        let monitor = Monitor::new(0, 1, Arc::clone(&progress), cancel);
        // terminates on its own within the first owned second
        let handle = std::thread::spawn(move || monitor.run());
        handle.join().unwrap();
    }

    #[test]
    fn monitor_does_not_complete_below_one() {
        let progress = Arc::new(ProgressVec::new(2));
        progress.publish(0, 1.0);
        progress.publish(1, 0.999);
        let cancel = Arc::new(AtomicBool::new(false));
        let monitor = Monitor::new(0, 1, Arc::clone(&progress), Arc::clone(&cancel));

        let handle = std::thread::spawn(move || monitor.run());
        // give it time to pass several reporting windows, then cancel;
        // a completed monitor would have returned already
        std::thread::sleep(Duration::from_millis(2500));
        assert!(!handle.is_finished());
        cancel.store(true, Ordering::Release);
        handle.join().unwrap();
    }

    #[test]
    fn cancel_stops_an_idle_monitor() {
        let progress = Arc::new(ProgressVec::new(4));
        let cancel = Arc::new(AtomicBool::new(false));
        let monitor = Monitor::new(0, 4, Arc::clone(&progress), Arc::clone(&cancel));

        let handle = std::thread::spawn(move || monitor.run());
        cancel.store(true, Ordering::Release);
        handle.join().unwrap();
    }
}
