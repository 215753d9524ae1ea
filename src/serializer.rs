//! Serialization module for writing generated documents as YAML or JSON.
//!
//! This module provides functions to serialize documents into standard formats
//! and write them to files or return them as strings.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Serializes a document to YAML format.
///
/// Map keys keep their insertion order, so a document converted to a
/// `serde_json::Value` keeps the `openapi`, `info`, `servers`, ... layout.
///
/// # Errors
///
/// Returns an error if serialization fails.
///
/// # Example
///
/// ```
/// use rdm_ops::serializer::serialize_yaml;
///
/// let yaml = serialize_yaml(&serde_json::json!({"openapi": "3.0.3"})).unwrap();
/// assert!(yaml.starts_with("openapi:"));
/// ```
pub fn serialize_yaml<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize document to YAML")
}

/// Serializes a document to YAML, preceded by a comment header.
///
/// The header is written verbatim, followed by a newline if it lacks one.
pub fn serialize_yaml_with_header<T: Serialize>(doc: &T, header: Option<&str>) -> Result<String> {
    let body = serialize_yaml(doc)?;
    Ok(match header {
        Some(header) if !header.is_empty() => {
            let mut out = String::with_capacity(header.len() + body.len() + 1);
            out.push_str(header);
            if !header.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&body);
            out
        }
        _ => body,
    })
}

/// Serializes a document to JSON format with pretty printing.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize document to JSON")
}

/// Writes string content to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does.
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}
