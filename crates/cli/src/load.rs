//! Loading the API document from disk or over HTTP.

use std::io::ErrorKind;

use apigen_core::SpecModel;
use tracing::debug;

use crate::error::CliError;

/// Document syntax, chosen from the source's extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    /// Unknown extension: JSON when it looks like JSON, YAML otherwise.
    Auto,
}

impl Format {
    fn of(source: &str) -> Self {
        // Query strings and fragments never carry the extension.
        let path = source.split(['?', '#']).next().unwrap_or(source).to_ascii_lowercase();
        if path.ends_with(".yaml") || path.ends_with(".yml") {
            Format::Yaml
        } else if path.ends_with(".json") {
            Format::Json
        } else {
            Format::Auto
        }
    }
}

fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Read and parse the API document at `source` (a path or an http(s) URL).
pub async fn load_document(source: &str) -> Result<SpecModel, CliError> {
    let text = if is_remote(source) {
        fetch(source).await?
    } else {
        tokio::fs::read_to_string(source).await.map_err(|error| match error.kind() {
            ErrorKind::NotFound => CliError::NotFound(source.to_string()),
            _ => CliError::Read {
                path: source.to_string(),
                error,
            },
        })?
    };
    debug!(source = %source, bytes = text.len(), "Loaded API document.");

    let parsed = match Format::of(source) {
        Format::Json => SpecModel::from_json(&text),
        Format::Yaml => SpecModel::from_yaml(&text),
        Format::Auto => SpecModel::from_str_auto(&text),
    };
    parsed.map_err(|error| CliError::Document {
        location: source.to_string(),
        error,
    })
}

async fn fetch(url: &str) -> Result<String, CliError> {
    let fetch_error = |error| CliError::Fetch {
        url: url.to_string(),
        error,
    };
    let response = reqwest::get(url).await.map_err(fetch_error)?;
    let response = response.error_for_status().map_err(fetch_error)?;
    response.text().await.map_err(fetch_error)
}
