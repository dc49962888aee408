use thiserror::Error;

pub type Result<T> = std::result::Result<T, BenchError>;

/// Benchmark-fatal conditions. Every variant terminates the run; nothing
/// is retried and no partial results are reported.
#[derive(Error, Debug)]
pub enum BenchError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("verification failed: out[{index}] = {actual} (expected {expected})")]
    Verification {
        index: usize,
        expected: f64,
        actual: f64,
    },

    #[error(transparent)]
    Mem(#[from] coopmem::MemError),

    #[error(transparent)]
    Cluster(#[from] coopmem::ClusterError),
}

impl BenchError {
    pub fn config(msg: impl Into<String>) -> Self {
        BenchError::Config(msg.into())
    }
}
