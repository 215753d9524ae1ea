use anyhow::Result;
use log::warn;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File scanner for traversing a schema catalog directory.
///
/// The `CatalogScanner` recursively walks the directory the host's schema export was written
/// to and collects every catalog document (`.json`, `.yaml` or `.yml`). Hidden directories
/// (those starting with `.`) are skipped.
///
/// # Example
///
/// ```no_run
/// use rdm_ops::scanner::CatalogScanner;
/// use std::path::PathBuf;
///
/// let scanner = CatalogScanner::new(PathBuf::from("./schema-catalog"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} catalog files", result.catalog_files.len());
/// ```
pub struct CatalogScanner {
    root_path: PathBuf,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Paths to all discovered catalog documents, sorted
    pub catalog_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

const CATALOG_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

impl CatalogScanner {
    /// Creates a new `CatalogScanner` for the specified root directory.
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects all catalog documents.
    ///
    /// If any directories or files cannot be accessed, warnings are logged and added to
    /// the result, but scanning continues.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut catalog_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }
                !e.file_name().to_string_lossy().starts_with('.')
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file() && is_catalog_file(path) {
                        catalog_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        catalog_files.sort();

        Ok(ScanResult {
            catalog_files,
            warnings,
        })
    }
}

fn is_catalog_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| CATALOG_EXTENSIONS.contains(&ext))
        .unwrap_or(false)
}
