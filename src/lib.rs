pub mod collection;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod value;

use std::path::Path;

pub use collection::{AxisId, Collection, MultiValue};
pub use diagnostics::Warning;
pub use error::{Location, ParameterError, Position, Result};
pub use value::{FromValue, Value, ValueKind};

// ── Core API ───────────────────────────────────────────────────────

/// A loaded collection together with the non-fatal warnings raised while
/// parsing it.
#[derive(Debug)]
pub struct LoadResult {
    pub collection: Collection,
    pub warnings: Vec<Warning>,
}

/// Load a configuration file, following its imports.
///
/// Redefinition warnings are logged and discarded; use
/// [`load_with_warnings`] to inspect them.
pub fn load(path: impl AsRef<Path>) -> Result<Collection> {
    load_with_warnings(path).map(|result| result.collection)
}

/// Load a configuration file and keep the redefinition warnings.
pub fn load_with_warnings(path: impl AsRef<Path>) -> Result<LoadResult> {
    let mut collection = Collection::new();
    let warnings = collection.read_from_file(path)?;
    Ok(LoadResult {
        collection,
        warnings,
    })
}

/// Parse configuration text. Relative imports resolve against `base_dir`.
pub fn load_str(source: &str, base_dir: impl AsRef<Path>) -> Result<LoadResult> {
    let mut collection = Collection::new();
    let warnings = collection.read_from_str(source, base_dir)?;
    Ok(LoadResult {
        collection,
        warnings,
    })
}
