//! Error type for the delegation sweep.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Chain(#[from] bulk_revoke_core::Error),

    #[error("checkpoint {}: {source}", path.display())]
    CheckpointIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("checkpoint {} line {line}: {value:?} is not a decimal token id", path.display())]
    CheckpointParse {
        path: PathBuf,
        line: usize,
        value: String,
    },

    #[error("invalid setting: {0}")]
    Config(String),

    #[error("signer: {0}")]
    Signer(String),

    #[error("prompt: {0}")]
    Prompt(#[source] std::io::Error),
}
