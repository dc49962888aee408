use clap::Parser;
use coopmem::LocalCluster;
use stream::options::ScaleCli;
use stream::run;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = ScaleCli::parse();
    if let Err(err) = execute(&cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn execute(cli: &ScaleCli) -> stream::Result<()> {
    cli.validate()?;
    cli.describe();

    let budget = 2 * cli.size * std::mem::size_of::<f64>() + 8192;
    let results = LocalCluster::new(cli.nodes)
        .mem_budget(budget)
        .run(|node| run::stream_scale(&node, cli))?;

    for result in results {
        result?;
    }
    Ok(())
}
