use clap::Parser;
use tracing::warn;

use crate::error::{BenchError, Result};

/// Options for the multi-threaded accumulate benchmark.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct StreamCli {
    /// Total element count; must be a power of two.
    #[arg(short = 's', long, default_value_t = 1 << 20)]
    pub size: usize,

    /// Transform applications per element.
    #[arg(short, long, default_value_t = 100)]
    pub iterations: usize,

    /// Scalar applied on every transform application.
    #[arg(short, long, default_value_t = 2.0)]
    pub alpha: f64,

    /// Worker threads per node.
    #[arg(short = 'n', long, default_value_t = 8)]
    pub threads: usize,

    /// Cooperating nodes to launch in this process.
    #[arg(short = 'm', long, default_value_t = 1)]
    pub nodes: usize,

    /// Initial value of every input element.
    #[arg(long, default_value_t = 21.0)]
    pub seed: f64,
}

impl StreamCli {
    /// All configuration errors are caught here, before any substrate
    /// allocation happens.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 || !self.size.is_power_of_two() {
            return Err(BenchError::config(format!(
                "-s size must be > 0 and a power of two (got {})",
                self.size
            )));
        }
        if self.iterations == 0 {
            return Err(BenchError::config("-i iterations must be > 0"));
        }
        if self.nodes == 0 {
            return Err(BenchError::config("-m nodes must be > 0"));
        }
        if self.threads == 0 || self.size % (self.nodes * self.threads) != 0 {
            return Err(BenchError::config(format!(
                "-n threads must be > 0 and nodes * threads ({}) must divide size ({})",
                self.nodes * self.threads,
                self.size
            )));
        }
        warn_if_oversubscribed(self.nodes * self.threads);
        Ok(())
    }

    pub fn describe(&self) {
        println!("size: {}", self.size);
        println!("size per node: {}", self.size / self.nodes);
        println!("chunk per worker: {}", self.size / (self.nodes * self.threads));
        println!("iterations: {}", self.iterations);
        println!("alpha: {}", self.alpha);
        println!("threads per node: {}", self.threads);
        println!("nodes: {}", self.nodes);
    }
}

/// Options for the single-threaded scale benchmark.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct ScaleCli {
    /// Total element count; must be a power of two.
    #[arg(short = 's', long, default_value_t = 4096)]
    pub size: usize,

    /// Scalar applied to each input element.
    #[arg(short, long, default_value_t = 2.0)]
    pub alpha: f64,

    /// Cooperating nodes to launch in this process.
    #[arg(short = 'm', long, default_value_t = 1)]
    pub nodes: usize,

    /// Initial value of every input element.
    #[arg(long, default_value_t = 21.0)]
    pub seed: f64,
}

impl ScaleCli {
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 || !self.size.is_power_of_two() {
            return Err(BenchError::config(format!(
                "-s size must be > 0 and a power of two (got {})",
                self.size
            )));
        }
        if self.nodes == 0 || self.size % self.nodes != 0 {
            return Err(BenchError::config(format!(
                "-m nodes must be > 0 and divide size ({})",
                self.size
            )));
        }
        Ok(())
    }

    pub fn describe(&self) {
        println!("size: {}", self.size);
        println!("size per node: {}", self.size / self.nodes);
        println!("alpha: {}", self.alpha);
        println!("nodes: {}", self.nodes);
    }
}

/// Options for the page fetch benchmark. Node 0 serves pages; every other
/// node fetches.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct PageFetchCli {
    /// Number of pages; must be a power of two.
    #[arg(short = 's', long, default_value_t = 16384)]
    pub num_pages: usize,

    /// Fetch sweeps over the whole page set.
    #[arg(short, long, default_value_t = 10)]
    pub iterations: usize,

    /// Fetch threads per fetching node.
    #[arg(short = 'n', long, default_value_t = 4)]
    pub threads: usize,

    /// Cooperating nodes to launch in this process; at least two.
    #[arg(short = 'm', long, default_value_t = 2)]
    pub nodes: usize,
}

impl PageFetchCli {
    pub fn validate(&self) -> Result<()> {
        if self.num_pages == 0 || !self.num_pages.is_power_of_two() {
            return Err(BenchError::config(format!(
                "-s num_pages must be > 0 and a power of two (got {})",
                self.num_pages
            )));
        }
        if self.iterations == 0 {
            return Err(BenchError::config("-i iterations must be > 0"));
        }
        if self.nodes < 2 || self.num_pages % (self.nodes - 1) != 0 {
            return Err(BenchError::config(format!(
                "-m nodes must be >= 2 and nodes - 1 must divide num_pages ({})",
                self.num_pages
            )));
        }
        if self.threads == 0 || self.num_pages % self.threads != 0 {
            return Err(BenchError::config(format!(
                "-n threads must be > 0 and divide num_pages ({})",
                self.num_pages
            )));
        }
        warn_if_oversubscribed((self.nodes - 1) * self.threads);
        Ok(())
    }

    pub fn describe(&self) {
        println!("num pages: {}", self.num_pages);
        println!("iterations: {}", self.iterations);
        println!("threads per node: {}", self.threads);
        println!("nodes: {}", self.nodes);
    }
}

fn warn_if_oversubscribed(requested: usize) {
    let available = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if requested > available {
        warn!(
            requested,
            available, "more worker threads than hardware threads; performance may suffer"
        );
    }
}
