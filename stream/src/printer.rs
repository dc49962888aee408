use crate::run::{FetchStats, RunStats};

// Result lines are printed by node 0 only; callers gate on node id.

pub(crate) fn print_stream_summary(name: &str, stats: &RunStats) {
    println!("{name} SUCCESSFUL.");
    println!(
        "Time: {:.2}ms MFLOPS: {:.2}",
        stats.elapsed_secs * 1e3,
        stats.mflops
    );
}

pub(crate) fn print_fetch_summary(stats: &FetchStats) {
    println!("\nThroughput test completed.");
    println!("\tPages loaded:\t{:>12}", stats.pages_loaded);
    println!("\tExec time:\t{:>10.2}ms", stats.elapsed_secs * 1e3);
    println!("\tMB/s:\t\t{:>12.2}", stats.mb_per_s);
    println!("\tAvg load time:\t{:>10.2}us", stats.load_micros);
}
