use clap::Parser;
use coopmem::LocalCluster;
use stream::options::PageFetchCli;
use stream::run::{self, PAGE_BYTES};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = PageFetchCli::parse();
    if let Err(err) = execute(&cli) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn execute(cli: &PageFetchCli) -> stream::Result<()> {
    cli.validate()?;
    cli.describe();

    let budget = cli.num_pages * PAGE_BYTES + 8192;
    let results = LocalCluster::new(cli.nodes)
        .mem_budget(budget)
        .run(|node| run::page_fetch(&node, cli))?;

    for result in results {
        result?;
    }
    Ok(())
}
