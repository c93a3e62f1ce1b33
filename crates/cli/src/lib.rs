#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]

//! Command line front end: load a document, generate, write the package.

use std::path::PathBuf;

use apigen_core::{GenerateOptions, generate};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod error;
mod load;
mod write;

pub use error::CliError;
pub use load::load_document;
pub use write::write_package;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "APIGEN_LOG";

#[derive(Parser, Debug, Clone)]
#[command(
    name = "apigen",
    version,
    about = "Generate a typed Python client package from an OpenAPI document"
)]
pub struct Cli {
    /// Path or http(s) URL of the OpenAPI document (JSON or YAML)
    #[arg(value_name = "SOURCE")]
    pub source: String,
    /// Directory the package is written to
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,
    /// HTTP library used by the generated services: httpx, requests or aiohttp
    #[arg(long, short = 'l', default_value = "httpx")]
    pub library: String,
    /// Default base URL written into `APIConfig` (overrides the document's servers)
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,
}

/// Parse `args`, run the generator and return the process exit code.
pub fn run_cli(args: Vec<String>) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let code = e.exit_code();
            let _ = e.print();
            return code;
        }
    };
    init_tracing();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Failed to create tokio runtime: {err}");
            return 1;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(files) => {
            println!("Generated {files} files.");
            0
        }
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}

/// Generate the package described by `cli`, returning how many files were written.
pub async fn run(cli: Cli) -> Result<usize, CliError> {
    let spec = load_document(&cli.source).await?;
    let options = GenerateOptions {
        base_url: cli.base_url.clone(),
    };
    let result = generate(&spec, &cli.library, &options)?;
    for diagnostic in &result.diagnostics {
        eprintln!("warning: {diagnostic}");
    }

    let written = write_package(&result, &cli.output)?;
    info!(
        output = %cli.output.display(),
        files = written.len(),
        "Client package written."
    );
    Ok(written.len())
}

fn init_tracing() {
    // APIGEN_LOG is either a plain level ("debug") or a full filter spec
    let filter = match std::env::var(LOG_ENV) {
        Ok(level) if is_plain_level(&level) => format!("apigen_cli={level},apigen_core={level}"),
        Ok(spec) => spec,
        Err(_) => "apigen_cli=warn,apigen_core=warn".to_string(),
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_filter(EnvFilter::new(&filter));

    if tracing_subscriber::registry().with(fmt_layer).try_init().is_err() {
        eprintln!("Warning: tracing subscriber already initialized");
    } else {
        debug!(filter = %filter, "Tracing initialized.");
    }
}

fn is_plain_level(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let cli = Cli::try_parse_from(["apigen", "openapi.yaml", "out", "--library", "aiohttp"]).unwrap();
        assert_eq!(cli.source, "openapi.yaml");
        assert_eq!(cli.output, PathBuf::from("out"));
        assert_eq!(cli.library, "aiohttp");
        assert_eq!(cli.base_url, None);
    }

    #[test]
    fn test_library_defaults_to_httpx() {
        let cli = Cli::try_parse_from(["apigen", "api.json", "out", "--base-url", "http://api"]).unwrap();
        assert_eq!(cli.library, "httpx");
        assert_eq!(cli.base_url.as_deref(), Some("http://api"));
    }

    #[test]
    fn test_missing_output_is_a_usage_error() {
        assert_eq!(run_cli(vec!["apigen".into(), "api.json".into()]), 2);
    }

    #[test]
    fn test_plain_levels() {
        assert!(is_plain_level("DEBUG"));
        assert!(!is_plain_level("apigen_core=debug"));
    }
}
