use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlacetError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("simulator pipe failed: {0}")]
    Io(#[from] io::Error),
    #[error("no reply from simulator within {timeout_ms} ms while {waiting_for}")]
    Timeout { timeout_ms: u64, waiting_for: String },
    #[error("simulator process has exited")]
    ProcessExited,
    #[error("simulator reported an error: {0}")]
    Simulator(String),
    #[error("unexpected simulator reply: {0}")]
    Protocol(String),
}
