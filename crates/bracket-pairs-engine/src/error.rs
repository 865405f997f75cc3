use thiserror::Error;

/// Errors surfaced by the bracket pair engine.
///
/// Malformed bracket input is never an error: unmatched closers and
/// unterminated openers are represented structurally in the tree.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to compile bracket pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("computation was cancelled by a newer request")]
    Cancelled,

    #[error("bracket worker has been shut down")]
    WorkerStopped,

    #[error("failed to start bracket worker: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
