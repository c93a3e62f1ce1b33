//! Error and diagnostic types.
//!
//! Structural problems abort a run with a [`GenerateError`]; ambiguities that
//! have a deterministic resolution are recorded as [`Diagnostic`]s instead.

use std::fmt;

use thiserror::Error;

/// The document could not be turned into a [`crate::SpecModel`].
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to parse API document at `{path}`: {message}")]
    Parse { path: String, message: String },
    #[error("unsupported API document version `{0}` (expected OpenAPI 3.x or Swagger 2.0)")]
    UnsupportedVersion(String),
    #[error("API document declares neither an `openapi` nor a `swagger` version")]
    MissingVersion,
    #[error("invalid path `{0}`: path keys must start with `/`")]
    InvalidPath(String),
}

/// A fatal generation failure. No partial output is produced.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("unresolved reference `{reference}` in {context}")]
    UnresolvedReference { reference: String, context: String },
    #[error("unsupported backend `{0}` (supported: httpx, requests, aiohttp)")]
    UnsupportedBackend(String),
    #[error("identifier collision: {kind} `{name}` would be generated for both {first} and {second}")]
    IdentifierCollision {
        kind: &'static str,
        name: String,
        first: String,
        second: String,
    },
    #[error(transparent)]
    Spec(#[from] SpecError),
}

impl GenerateError {
    pub(crate) fn unresolved(reference: &str, context: impl Into<String>) -> Self {
        Self::UnresolvedReference {
            reference: reference.to_string(),
            context: context.into(),
        }
    }
}

/// Non-fatal condition kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A request body declares several content types; one was picked.
    AmbiguousRequestBody,
    /// A parameter location the generated clients cannot send (cookie, formData).
    SkippedParameter,
    /// An `allOf` member was still being resolved and could not contribute fields.
    CyclicComposition,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::AmbiguousRequestBody => "ambiguous-request-body",
            DiagnosticKind::SkippedParameter => "skipped-parameter",
            DiagnosticKind::CyclicComposition => "cyclic-composition",
        };
        f.write_str(label)
    }
}

/// A deterministic note about a resolved ambiguity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Where it happened, e.g. `POST /pets` or `schema Pet`.
    pub location: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.location, self.message)
    }
}
