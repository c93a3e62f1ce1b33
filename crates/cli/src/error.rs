use std::path::PathBuf;

use apigen_core::{GenerateError, SpecError};
use thiserror::Error;

/// Everything that can stop a CLI run.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("API document `{0}` does not exist")]
    NotFound(String),
    #[error("failed to read `{path}`: {error}")]
    Read {
        path: String,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to fetch `{url}`: {error}")]
    Fetch {
        url: String,
        #[source]
        error: reqwest::Error,
    },
    #[error("invalid API document `{location}`: {error}")]
    Document {
        location: String,
        #[source]
        error: SpecError,
    },
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error("failed to write `{}`: {error}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}
