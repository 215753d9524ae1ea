//! Supply-chain check: installed pnpm packages against a known-infected list.
//!
//! The infected list is a JSON object mapping a package name to comma-separated versions
//! (`{"left-pad": "1.3.1,1.3.2"}`); [`crate::csv_convert`] produces it from the advisory CSV.

use crate::error::{Error, Result};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

const PNPM: &str = "pnpm";
const PNPM_LIST_ARGS: [&str; 6] = [
    "list",
    "--recursive",
    "--depth",
    "Infinity",
    "--parseable",
    "--long",
];

/// Version protocols that point at local sources rather than registry releases
const LOCAL_PROTOCOLS: [&str; 3] = ["workspace", "link", "file"];

/// Load the infected list as a set of `name@version` strings
pub fn load_infected(path: &Path) -> Result<BTreeSet<String>> {
    if !path.exists() {
        return Err(Error::MissingFile {
            what: "Infected list",
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path)?;
    let raw: Map<String, Value> = serde_json::from_str(&content).map_err(|e| Error::ParseError {
        file: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut infected = BTreeSet::new();
    for (package, versions) in &raw {
        let Some(versions) = versions.as_str() else {
            debug!("Ignoring non-string versions for {}", package);
            continue;
        };
        for version in versions.split(',').map(str::trim).filter(|v| !v.is_empty()) {
            infected.insert(format!("{}@{}", package, version));
        }
    }

    debug!("Loaded {} infected package versions", infected.len());
    Ok(infected)
}

/// Parse `pnpm list --parseable --long` output into `name@version` strings.
///
/// Each line is `path:spec[:...]`; the spec is split at its last `@`. Private packages and
/// local (`workspace:`, `link:`, `file:`) versions are skipped.
pub fn parse_pnpm_list(output: &str) -> BTreeSet<String> {
    let mut installed = BTreeSet::new();

    for line in output.lines() {
        let mut parts = line.trim().splitn(3, ':');
        let (Some(_path), Some(spec)) = (parts.next(), parts.next()) else {
            continue;
        };

        let spec = spec.trim();
        if spec.is_empty() || spec.eq_ignore_ascii_case("PRIVATE") {
            continue;
        }

        let Some((name, version)) = spec.rsplit_once('@') else {
            debug!("Skipping pnpm entry without version: {}", spec);
            continue;
        };
        let version = version.trim();
        if name.is_empty() || version.is_empty() {
            continue;
        }
        // `name@workspace:*` is cut at its colon, leaving only the protocol as version
        if LOCAL_PROTOCOLS.contains(&version) {
            continue;
        }

        installed.insert(format!("{}@{}", name, version));
    }

    installed
}

/// Run `pnpm list` in the workspace and parse its output
pub fn collect_installed(workspace: &Path) -> Result<BTreeSet<String>> {
    if !workspace.is_dir() {
        return Err(Error::MissingFile {
            what: "pnpm workspace",
            path: workspace.to_path_buf(),
        });
    }

    debug!("Running {} {} in {}", PNPM, PNPM_LIST_ARGS.join(" "), workspace.display());
    let output = Command::new(PNPM)
        .args(PNPM_LIST_ARGS)
        .current_dir(workspace)
        .output()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => Error::MissingExecutable(PNPM.to_string()),
            _ => Error::Io(e),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let details = Some(stderr.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| stdout.trim());
        let code = output
            .status
            .code()
            .map_or_else(|| "signal".to_string(), |c| c.to_string());

        let mut message = format!("Exit code {}.", code);
        if !details.is_empty() {
            message.push(' ');
            message.push_str(details);
        }
        return Err(Error::CommandFailed {
            command: "pnpm list".to_string(),
            message,
        });
    }

    let installed = parse_pnpm_list(&String::from_utf8_lossy(&output.stdout));
    info!("pnpm reports {} installed package versions", installed.len());
    Ok(installed)
}

/// Installed packages that are on the infected list, sorted
pub fn find_infected(installed: &BTreeSet<String>, infected: &BTreeSet<String>) -> Vec<String> {
    installed.intersection(infected).cloned().collect()
}

/// Full check: verify inputs, list installed packages and intersect
pub fn check(lockfile: &Path, workspace: &Path, infected_list: &Path) -> Result<Vec<String>> {
    if !lockfile.exists() {
        return Err(Error::MissingFile {
            what: "Lockfile",
            path: lockfile.to_path_buf(),
        });
    }
    let infected = load_infected(infected_list)?;
    let installed = collect_installed(workspace)?;
    Ok(find_infected(&installed, &infected))
}
