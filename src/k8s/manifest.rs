//! Loading resource manifests from disk

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Read a `.json`, `.yml` or `.yaml` manifest
pub fn load_manifest(path: &str) -> AppResult<Value> {
    let extension = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    match extension.as_deref() {
        Some("json") => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        Some("yml") | Some("yaml") => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_yaml::from_str(&raw)?)
        }
        _ => Err(AppError::Configuration(format!("cannot process {}", path))),
    }
}

/// Read a manifest straight into a typed resource
pub fn load_typed<K: DeserializeOwned>(path: &str) -> AppResult<K> {
    Ok(serde_json::from_value(load_manifest(path)?)?)
}

/// Take the inline body when given, otherwise read it from `path`
pub fn load_body(resource: Option<&Value>, path: Option<&str>) -> AppResult<Value> {
    match (resource, path) {
        (Some(resource), _) => Ok(resource.clone()),
        (None, Some(path)) if Path::new(path).is_file() => load_manifest(path),
        _ => Err(AppError::configuration(
            "Either `resource` or `resource_as_yaml_file` must be provided. \
             And if you provided the path, make sure the file exists.",
        )),
    }
}
