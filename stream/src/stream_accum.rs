use clap::Parser;
use coopmem::LocalCluster;
use run_record::RunRecord;
use stream::options::StreamCli;
use stream::run::{self, RunStats};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = StreamCli::parse();
    match execute(&cli) {
        Ok(stats) => record(&cli, &stats),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}

fn execute(cli: &StreamCli) -> stream::Result<RunStats> {
    cli.validate()?;
    cli.describe();

    // input + output arrays plus a little slack
    let budget = 2 * cli.size * std::mem::size_of::<f64>() + 8192;
    let results = LocalCluster::new(cli.nodes)
        .mem_budget(budget)
        .run(|node| run::stream_accum(&node, cli))?;

    let mut stats = None;
    for result in results {
        if let Some(s) = result? {
            stats = Some(s);
        }
    }
    Ok(stats.expect("node 0 reports stats on success"))
}

fn record(cli: &StreamCli, stats: &RunStats) {
    let mut rec = RunRecord::new("stream_accum");
    rec.insert_output("nodes", cli.nodes.to_string());
    rec.insert_output("threads_per_node", cli.threads.to_string());
    rec.insert_output("size", cli.size.to_string());
    rec.insert_output("iterations", cli.iterations.to_string());
    rec.insert_output("alpha", cli.alpha.to_string());
    rec.insert_output("elapsed_secs", format!("{:.6}", stats.elapsed_secs));
    rec.insert_output("mflops", format!("{:.2}", stats.mflops));
    rec.write(&rec.default_output_path("."));
}
