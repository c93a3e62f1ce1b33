#![forbid(unsafe_code)]
#![deny(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]

//! OpenAPI to Python client package generation.
//!
//! An API document ([`SpecModel`]) is normalized into a [`ir::types::TypeGraph`]
//! plus a list of operations, then emitted as a set of Python source units:
//! one pydantic model per type declaration, one request module per service
//! group and calling convention, and a single `api_config` module. The HTTP
//! library is chosen from a closed set of [`backend::HttpLibrary`] values.
//!
//! ```no_run
//! use apigen_core::{GenerateOptions, SpecModel, generate};
//!
//! let spec = SpecModel::from_str_auto(r#"{"openapi": "3.0.0", "info": {"title": "T", "version": "1"}}"#)?;
//! let result = generate(&spec, "httpx", &GenerateOptions::default())?;
//! assert!(result.models.is_empty());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backend;
pub mod codegen;
pub mod error;
pub mod generator;
pub mod ir;
pub mod python;
pub mod spec;

pub use backend::{BackendConfig, HttpLibrary, lookup};
pub use error::{Diagnostic, DiagnosticKind, GenerateError, SpecError};
pub use generator::{ConfigUnit, DEFAULT_BASE_URL, GenerateOptions, GenerationResult, generate, generate_with};
pub use spec::SpecModel;
