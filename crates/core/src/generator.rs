//! Generation entry points.
//!
//! The pipeline is:
//! 1. Resolve the backend (an unknown library aborts before any work)
//! 2. Normalize: SpecModel -> ApiIR (TypeGraph plus operations)
//! 3. Emit model, service and config units
//! 4. Collect everything into a [`GenerationResult`]

use std::collections::HashMap;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::backend::{self, BackendConfig, CallTemplate};
use crate::codegen::{CONFIG_UNIT, ServiceGroup, emit_config, emit_model, emit_service, group_operations, unit_name};
use crate::error::{Diagnostic, GenerateError};
use crate::ir::normalize_spec;
use crate::spec::SpecModel;

/// Base URL used when neither the caller nor the document provides one.
pub const DEFAULT_BASE_URL: &str = "http://localhost";

/// Caller-supplied generation settings.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Overrides the document's first server URL as the `APIConfig` default.
    pub base_url: Option<String>,
}

/// The generated config unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigUnit {
    pub name: String,
    pub source: String,
}

/// All generated source units, keyed by unit name in emission order.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub models: IndexMap<String, String>,
    pub services: IndexMap<String, String>,
    pub config: ConfigUnit,
    pub diagnostics: Vec<Diagnostic>,
}

/// Generate a client package for `spec` using the library named `library_id`.
pub fn generate(spec: &SpecModel, library_id: &str, options: &GenerateOptions) -> Result<GenerationResult, GenerateError> {
    let backend = backend::lookup(library_id)?;
    generate_with(spec, backend, options)
}

/// Generate a client package for `spec` with an already resolved backend.
pub fn generate_with(
    spec: &SpecModel,
    backend: &BackendConfig,
    options: &GenerateOptions,
) -> Result<GenerationResult, GenerateError> {
    debug!(library = %backend.library, title = %spec.info.title, "Normalizing API document.");
    let api = normalize_spec(spec)?;

    let models: IndexMap<String, String> = api
        .types
        .decls()
        .par_iter()
        .map(|decl| (decl.name.clone(), emit_model(&api.types, decl)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    let groups = group_operations(&api.operations);
    let jobs = service_jobs(&groups, backend)?;
    let services: IndexMap<String, String> = jobs
        .par_iter()
        .map(|(name, group, template)| {
            (
                name.clone(),
                emit_service(&api.types, backend, template, &group.operations),
            )
        })
        .collect::<Vec<_>>()
        .into_iter()
        .collect();

    let base_url = options
        .base_url
        .as_deref()
        .or(api.server_url.as_deref())
        .unwrap_or(DEFAULT_BASE_URL);
    debug!(base_url = %base_url, "Emitting config unit.");
    let config = ConfigUnit {
        name: CONFIG_UNIT.to_string(),
        source: emit_config(backend, base_url),
    };

    info!(
        library = %backend.library,
        models = models.len(),
        services = services.len(),
        diagnostics = api.diagnostics.len(),
        "Generated client package."
    );

    Ok(GenerationResult {
        models,
        services,
        config,
        diagnostics: api.diagnostics,
    })
}

/// Named service units to emit, one per group and template. Unit names must be unique.
fn service_jobs<'a>(
    groups: &'a [ServiceGroup<'a>],
    backend: &'a BackendConfig,
) -> Result<Vec<(String, &'a ServiceGroup<'a>, &'a CallTemplate)>, GenerateError> {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut jobs = Vec::new();
    for group in groups {
        for template in backend.templates {
            let name = unit_name(group.name, template);
            let owner = format!(
                "{} group `{}`",
                if template.is_async() { "async" } else { "blocking" },
                group.name
            );
            if let Some(first) = owners.get(&name) {
                return Err(GenerateError::IdentifierCollision {
                    kind: "service",
                    name,
                    first: first.clone(),
                    second: owner,
                });
            }
            owners.insert(name.clone(), owner);
            jobs.push((name, group, template));
        }
    }
    Ok(jobs)
}
