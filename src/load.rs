//! Schema documents in their JSON form, with JSON-path context in errors.
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LoadError;
use crate::ir::Schema;

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str, origin: &str) -> Result<T, LoadError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| LoadError::Parse {
        origin: origin.to_string(),
        json_path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

pub fn schema_from_str(src: &str) -> Result<Schema, LoadError> {
    from_str_with_path(src, "<input>")
}

pub fn load_schema(path: &Path) -> Result<Schema, LoadError> {
    let src = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let schema: Schema = from_str_with_path(&src, &path.display().to_string())?;
    debug!(path = %path.display(), types = schema.len(), "schema file loaded");
    Ok(schema)
}

/// Load every file and concatenate their definitions in argument order.
/// Duplicates across files surface later, at resolution.
pub fn load_schemas<P: AsRef<Path>>(paths: &[P]) -> Result<Schema, LoadError> {
    let mut schema = Schema::new();
    for path in paths {
        schema.extend(load_schema(path.as_ref())?);
    }
    Ok(schema)
}
