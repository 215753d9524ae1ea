//! Package freshness checker.
//!
//! Compares the packages installed in a Python environment against the public PyPI JSON
//! API and reports how old the installed and the latest releases are, color-coded by age.
//! Lookups run on a bounded rayon pool; results are printed live (gray, unsorted) and then
//! as a sorted summary.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::ValueEnum;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub const RED: &str = "\x1b[31m";
pub const ORANGE: &str = "\x1b[38;5;208m";
pub const YELLOW: &str = "\x1b[33m";
pub const BLUE: &str = "\x1b[94m";
pub const GRAY: &str = "\x1b[90m";
pub const RESET: &str = "\x1b[0m";

pub const PYPI_URL: &str = "https://pypi.org/pypi";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Width of both age columns
const AGE_WIDTH: usize = 18;
/// Sort key used for packages whose age is unknown
const UNKNOWN_DAYS: i64 = 1_000_000_000;

/// Which age column drives sorting and coloring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SortBy {
    /// Age of the installed version
    #[default]
    Current,
    /// Age of the latest release on PyPI
    Latest,
}

/// One installed package and what PyPI says about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageAge {
    pub name: String,
    pub current: String,
    pub latest: Option<String>,
    pub current_days: Option<i64>,
    pub latest_days: Option<i64>,
}

impl PackageAge {
    fn unknown(name: &str, current: &str) -> Self {
        Self {
            name: name.to_string(),
            current: current.to_string(),
            latest: None,
            current_days: None,
            latest_days: None,
        }
    }

    /// Age in the column selected by `sort_by`
    pub fn days(&self, sort_by: SortBy) -> Option<i64> {
        match sort_by {
            SortBy::Current => self.current_days,
            SortBy::Latest => self.latest_days,
        }
    }
}

/// Source of package metadata documents (`{"info": {...}, "releases": {...}}`)
pub trait ReleaseIndex: Sync {
    /// Metadata for a package, or `None` when it cannot be fetched
    fn fetch(&self, name: &str) -> Option<Value>;
}

/// [`ReleaseIndex`] backed by the PyPI JSON API
pub struct PypiClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl PypiClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(PYPI_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl ReleaseIndex for PypiClient {
    fn fetch(&self, name: &str) -> Option<Value> {
        let url = format!("{}/{}/json", self.base_url, name);
        let response = match self.client.get(&url).send() {
            Ok(response) => response,
            Err(e) => {
                debug!("Request for {} failed: {}", url, e);
                return None;
            }
        };
        if !response.status().is_success() {
            debug!("{} returned {}", url, response.status());
            return None;
        }
        // Control characters in descriptions break strict JSON parsing
        let body: String = response
            .text()
            .ok()?
            .chars()
            .filter(|c| !c.is_control())
            .collect();
        serde_json::from_str(&body).ok()
    }
}

/// Command used to list installed packages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl FreezeCommand {
    /// `uv pip freeze` when uv is on PATH, else pip from the venv, else pip from `python3`
    pub fn detect(venv: Option<&Path>) -> Self {
        Self::choose(find_on_path("uv").is_some(), venv)
    }

    fn choose(uv_available: bool, venv: Option<&Path>) -> Self {
        let pip_args = ["-m", "pip", "freeze"].map(String::from).to_vec();
        if uv_available {
            return Self {
                program: PathBuf::from("uv"),
                args: vec!["pip".to_string(), "freeze".to_string()],
            };
        }
        match venv {
            Some(venv) => Self {
                program: venv.join("bin").join("python"),
                args: pip_args,
            },
            None => Self {
                program: PathBuf::from("python3"),
                args: pip_args,
            },
        }
    }

    /// Run the command and return its stdout
    pub fn run(&self) -> Result<String> {
        let command = format!("{} {}", self.program.display(), self.args.join(" "));
        debug!("Running {}", command);

        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Error::MissingExecutable(self.program.display().to_string())
                }
                _ => Error::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(Error::CommandFailed {
                command,
                message: if stderr.is_empty() {
                    "Failed to run pip freeze".to_string()
                } else {
                    stderr
                },
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// Parse `pip freeze` output into `(name, version)` pairs.
///
/// Editable installs (`-e `) and direct references (anything containing `@`) are skipped.
pub fn parse_freeze(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-e ") && !line.contains('@'))
        .filter_map(|line| line.split_once("=="))
        .filter(|(name, version)| !name.is_empty() && !version.is_empty())
        .map(|(name, version)| (name.to_string(), version.to_string()))
        .collect()
}

/// PEP 503 style fallback name
pub fn normalized_name(name: &str) -> String {
    name.replace('_', "-").to_lowercase()
}

/// Parse an upload timestamp; naive timestamps are UTC
pub fn parse_upload_time(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Newest upload time among a release's files
pub fn newest_upload(files: &Value) -> Option<DateTime<Utc>> {
    files
        .as_array()?
        .iter()
        .filter_map(|file| {
            file.get("upload_time_iso_8601")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .or_else(|| file.get("upload_time").and_then(Value::as_str))
        })
        .filter_map(parse_upload_time)
        .max()
}

/// Whole days elapsed, rounded down
pub fn days_since(then: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - then).num_seconds().div_euclid(86_400)
}

/// Look a package up by its exact name, then by its normalized name
pub fn lookup(index: &dyn ReleaseIndex, name: &str, current: &str, now: DateTime<Utc>) -> PackageAge {
    let normalized = normalized_name(name);
    let mut candidates = vec![name];
    if normalized != name {
        candidates.push(normalized.as_str());
    }

    for candidate in candidates {
        let Some(data) = index.fetch(candidate) else {
            continue;
        };
        let Some(latest) = data
            .pointer("/info/version")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
        else {
            continue;
        };

        let releases = data.get("releases");
        let age = |version: &str| {
            releases
                .and_then(|r| r.get(version))
                .and_then(newest_upload)
                .map(|uploaded| days_since(uploaded, now))
        };

        return PackageAge {
            name: name.to_string(),
            current: current.to_string(),
            latest: Some(latest.to_string()),
            current_days: age(current),
            latest_days: age(latest),
        };
    }

    warn!("No release data for {}", name);
    PackageAge::unknown(name, current)
}

pub fn color_for_days(days: Option<i64>) -> &'static str {
    match days {
        Some(0) => RED,
        Some(1) => ORANGE,
        Some(2..=3) => YELLOW,
        Some(4..=7) => BLUE,
        _ => RESET,
    }
}

/// Freshness group: today, yesterday, 2-3 days, 4-7 days, older, unknown
pub fn group_rank(days: Option<i64>) -> u8 {
    match days {
        None => 5,
        Some(0) => 0,
        Some(1) => 1,
        Some(2..=3) => 2,
        Some(4..=7) => 3,
        Some(_) => 4,
    }
}

/// Sort by freshness group, then age (unknown last), then case-insensitive name
pub fn sort_results(results: &mut [PackageAge], sort_by: SortBy) {
    results.sort_by_cached_key(|r| {
        let days = r.days(sort_by);
        (group_rank(days), days.unwrap_or(UNKNOWN_DAYS), r.name.to_lowercase())
    });
}

/// `min(32, cpus * 4)`, or 32 when the cpu count is unknown
pub fn default_workers() -> usize {
    let cpus = thread::available_parallelism().map_or(8, |n| n.get());
    (cpus * 4).min(32)
}

/// Fixed column layout so live rows and the summary line up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Columns {
    pub name: usize,
    pub current: usize,
    pub latest: usize,
}

impl Columns {
    pub fn new(packages: &[(String, String)]) -> Self {
        let name = packages
            .iter()
            .map(|(n, _)| n.len())
            .chain(["Package".len()])
            .max()
            .unwrap_or_default()
            + 2;
        let current = packages
            .iter()
            .map(|(_, v)| v.len())
            .chain(["Current".len()])
            .max()
            .unwrap_or_default()
            + 2;
        let latest = "Latest".len().max(current) + 2;
        Self { name, current, latest }
    }

    pub fn header(&self) -> String {
        self.line("Package", "Current", "Current Age", "Latest", "Latest Age")
    }

    pub fn rule(&self) -> String {
        "-".repeat(self.name + self.current + AGE_WIDTH + self.latest + AGE_WIDTH + 4)
    }

    pub fn row(&self, pkg: &PackageAge) -> String {
        self.line(
            &pkg.name,
            &pkg.current,
            &describe_age(pkg.current_days),
            pkg.latest.as_deref().unwrap_or("N/A"),
            &describe_age(pkg.latest_days),
        )
    }

    fn line(&self, name: &str, current: &str, current_age: &str, latest: &str, latest_age: &str) -> String {
        format!(
            "{:<nw$} {:<cw$} {:<aw$} {:<lw$} {:<aw$}",
            name,
            current,
            current_age,
            latest,
            latest_age,
            nw = self.name,
            cw = self.current,
            lw = self.latest,
            aw = AGE_WIDTH,
        )
    }
}

fn describe_age(days: Option<i64>) -> String {
    days.map_or_else(|| "N/A".to_string(), |d| format!("{} days ago", d))
}

/// Look up every package on a pool of `workers` threads.
///
/// `on_result` is called on the calling thread as each lookup completes, in completion order.
pub fn check_packages<F>(
    index: &dyn ReleaseIndex,
    packages: &[(String, String)],
    workers: usize,
    mut on_result: F,
) -> Result<Vec<PackageAge>>
where
    F: FnMut(&PackageAge),
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| Error::InvalidArgument(format!("cannot start {} workers: {}", workers, e)))?;
    let now = Utc::now();
    let (tx, rx) = mpsc::channel();

    let results = thread::scope(|scope| {
        scope.spawn(move || {
            pool.install(|| {
                packages.par_iter().for_each_with(tx, |tx, (name, current)| {
                    // The receiver outlives the pool, so a send only fails after a panic
                    let _ = tx.send(lookup(index, name, current, now));
                });
            });
        });

        let mut results = Vec::with_capacity(packages.len());
        for result in rx {
            on_result(&result);
            results.push(result);
        }
        results
    });

    Ok(results)
}

/// Options for [`run`]
#[derive(Debug, Clone)]
pub struct FreshnessOptions {
    pub venv: Option<PathBuf>,
    pub workers: usize,
    pub sort_by: SortBy,
}

impl Default for FreshnessOptions {
    fn default() -> Self {
        Self {
            venv: env::var_os("VIRTUAL_ENV").map(PathBuf::from),
            workers: default_workers(),
            sort_by: SortBy::default(),
        }
    }
}

/// Print the live table and the sorted summary to stdout
pub fn run(options: &FreshnessOptions, index: &dyn ReleaseIndex) -> Result<Vec<PackageAge>> {
    let env_label = options
        .venv
        .as_ref()
        .map_or_else(|| "system python3".to_string(), |v| v.display().to_string());
    println!("{}Using environment at: {}", GRAY, env_label);
    println!();
    println!("this is unsorted output - see final summary below");
    println!("{}", RESET);

    let freeze = FreezeCommand::detect(options.venv.as_deref()).run()?;
    let packages = parse_freeze(&freeze);
    if packages.is_empty() {
        println!("No packages found.");
        return Ok(Vec::new());
    }
    info!("Checking {} packages with {} workers", packages.len(), options.workers);

    let columns = Columns::new(&packages);
    let header = columns.header();
    let rule = columns.rule();
    println!("{}{}", GRAY, header);
    println!("{}", rule);
    println!("{}", RESET);

    let mut results = check_packages(index, &packages, options.workers, |pkg| {
        println!("{}{}{}", GRAY, columns.row(pkg), RESET);
    })?;

    println!("\n{}", "=".repeat(rule.len()));
    for line in summary_banner(options.sort_by) {
        println!("{}", line);
    }
    println!();
    println!("{}", header);
    println!("{}", rule);

    sort_results(&mut results, options.sort_by);
    for pkg in &results {
        let color = color_for_days(pkg.days(options.sort_by));
        println!("{}{}{}", color, columns.row(pkg), RESET);
    }

    Ok(results)
}

fn summary_banner(sort_by: SortBy) -> [&'static str; 3] {
    match sort_by {
        SortBy::Current => [
            "Sorted by CURRENT version age (newest first):",
            "use --sort-by latest to see packages with newest releases first",
            "Color indicates CURRENT version age - Red: today | Orange: 1 day | Yellow: 2-3 days | Blue: 4-7 days | Normal: 8+ days",
        ],
        SortBy::Latest => [
            "Sorted by LATEST version age (newest first):",
            "use --sort-by current or remove the --sort-by option to see packages with newest installed versions first",
            "Color indicates LATEST version age - Red: today | Orange: 1 day | Yellow: 2-3 days | Blue: 4-7 days | Normal: 8+ days",
        ],
    }
}
