//! Writing a [`GenerationResult`] out as a Python package.

use std::fs;
use std::path::{Path, PathBuf};

use apigen_core::GenerationResult;
use tracing::debug;

use crate::error::CliError;

const PACKAGE_INIT: &str = "";

/// Write the package rooted at `output`, returning the files written in order.
///
/// The `models` and `services` subpackages always exist, even when empty.
pub fn write_package(result: &GenerationResult, output: &Path) -> Result<Vec<PathBuf>, CliError> {
    let models_dir = output.join("models");
    let services_dir = output.join("services");
    for dir in [output, models_dir.as_path(), services_dir.as_path()] {
        fs::create_dir_all(dir).map_err(|error| CliError::Write {
            path: dir.to_path_buf(),
            error,
        })?;
    }

    let mut written = Vec::new();
    let mut write = |path: PathBuf, contents: &str| -> Result<(), CliError> {
        fs::write(&path, contents).map_err(|error| CliError::Write {
            path: path.clone(),
            error,
        })?;
        debug!(path = %path.display(), bytes = contents.len(), "Wrote unit.");
        written.push(path);
        Ok(())
    };

    write(output.join("__init__.py"), PACKAGE_INIT)?;
    write(output.join(format!("{}.py", result.config.name)), &result.config.source)?;

    write(models_dir.join("__init__.py"), &models_init(result))?;
    for (name, source) in &result.models {
        write(models_dir.join(format!("{name}.py")), source)?;
    }

    write(services_dir.join("__init__.py"), PACKAGE_INIT)?;
    for (name, source) in &result.services {
        write(services_dir.join(format!("{name}.py")), source)?;
    }

    Ok(written)
}

/// `models/__init__.py`: re-exports every model unit.
fn models_init(result: &GenerationResult) -> String {
    result.models.keys().map(|name| format!("from .{name} import *\n")).collect()
}
