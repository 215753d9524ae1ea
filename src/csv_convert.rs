//! Converts the advisory CSV (`package,=1.0.0 || =1.0.1`) into the infected-list JSON.

use crate::error::{Error, Result};
use log::{info, warn};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Convert one CSV line into `(package, versions)`.
///
/// The line is split at its first comma; `=` and spaces are removed from the versions and
/// `||` becomes `,`. Returns `None` for lines without a comma.
pub fn convert_line(line: &str) -> Option<(String, String)> {
    let (package, versions) = line.split_once(',')?;
    let versions = versions
        .replace('=', "")
        .replace("||", ",")
        .replace(' ', "")
        .trim()
        .to_string();
    Some((package.to_string(), versions))
}

/// Convert CSV text to a JSON object, preserving input order.
///
/// Blank lines are ignored and malformed lines are skipped with a warning. A package listed
/// twice keeps its first position and its last versions.
pub fn convert(content: &str) -> Map<String, Value> {
    let mut output = Map::new();
    for line in content.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match convert_line(line) {
            Some((package, versions)) => {
                output.insert(package, Value::String(versions));
            }
            None => warn!("Skipping malformed line: {}", line),
        }
    }
    output
}

/// Convert `csv_path` and write the JSON object to `json_path` with 2-space indentation
pub fn csv_to_json(csv_path: &Path, json_path: &Path) -> Result<usize> {
    if !csv_path.exists() {
        return Err(Error::MissingFile {
            what: "CSV file",
            path: csv_path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(csv_path)?;
    let output = convert(&content);
    let json = serde_json::to_string_pretty(&output)?;
    fs::write(json_path, json)?;

    info!(
        "Wrote {} packages from {} to {}",
        output.len(),
        csv_path.display(),
        json_path.display()
    );
    Ok(output.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_convert_line() {
        assert_eq!(
            convert_line("pkg-a,=1.0.0 || =1.0.1"),
            Some(("pkg-a".to_string(), "1.0.0,1.0.1".to_string()))
        );
        assert_eq!(
            convert_line("@scope/pkg,= 2.0.0"),
            Some(("@scope/pkg".to_string(), "2.0.0".to_string()))
        );
        assert_eq!(convert_line("no-comma-here"), None);
    }

    #[test]
    fn test_convert_keeps_order_and_skips_bad_lines() {
        let output = convert("zeta,=1.0.0\n\nmalformed\nalpha,=2.0.0 || =2.0.1\n");

        let keys: Vec<&String> = output.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(output["alpha"], json!("2.0.0,2.0.1"));
    }

    #[test]
    fn test_csv_to_json_writes_indented_file() {
        let temp_dir = TempDir::new().unwrap();
        let csv = temp_dir.path().join("infected.csv");
        let out = temp_dir.path().join("infected.json");
        fs::write(&csv, "pkg-a,=1.0.0 || =1.0.1\n").unwrap();

        let count = csv_to_json(&csv, &out).unwrap();

        assert_eq!(count, 1);
        let written = fs::read_to_string(&out).unwrap();
        assert_eq!(written, "{\n  \"pkg-a\": \"1.0.0,1.0.1\"\n}");
    }

    #[test]
    fn test_csv_to_json_missing_input() {
        let temp_dir = TempDir::new().unwrap();
        let err = csv_to_json(
            &temp_dir.path().join("absent.csv"),
            &temp_dir.path().join("out.json"),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("CSV file not found"));
    }
}
