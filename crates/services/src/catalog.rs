//! Catalog loading. Course data is read from a JSON fixture.

use std::path::Path;

use ead_core::model::Catalog;
use tracing::info;

use crate::error::CatalogLoadError;

const DEMO_CATALOG: &str = include_str!("../fixtures/demo_catalog.json");

/// Parse and validate a catalog from JSON text.
///
/// # Errors
///
/// Returns `CatalogLoadError::Json` for malformed or invalid entries (bad
/// URLs, broken exams, duplicate ids).
pub fn parse_catalog(json: &str) -> Result<Catalog, CatalogLoadError> {
    Ok(serde_json::from_str(json)?)
}

/// Load a catalog fixture from disk.
///
/// # Errors
///
/// Returns `CatalogLoadError::Io` if the file cannot be read, or a parse error.
pub fn load_catalog(path: &Path) -> Result<Catalog, CatalogLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CatalogLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let catalog = parse_catalog(&raw)?;
    info!(path = %path.display(), courses = catalog.courses().len(), "catalog loaded");
    Ok(catalog)
}

/// The bundled demo catalog.
///
/// # Errors
///
/// Returns `CatalogLoadError` only if the bundled fixture is broken.
pub fn demo_catalog() -> Result<Catalog, CatalogLoadError> {
    parse_catalog(DEMO_CATALOG)
}

/// Load `path` when given, otherwise the demo catalog.
///
/// # Errors
///
/// See [`load_catalog`].
pub fn load_or_demo(path: Option<&Path>) -> Result<Catalog, CatalogLoadError> {
    match path {
        Some(path) => load_catalog(path),
        None => demo_catalog(),
    }
}
