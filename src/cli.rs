use crate::config::{GeneratorConfig, DEFAULT_OUTPUT_FILE};
use crate::freshness::{self, FreshnessOptions, PypiClient, SortBy};
use crate::generator::generate;
use crate::serializer::{serialize_json, serialize_yaml_with_header, write_to_file};
use crate::upload_sim::{self, DEFAULT_SERVER_URL, DEFAULT_TOKEN_FILE};
use crate::{csv_convert, infected};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use std::io;
use std::path::{Path, PathBuf};

const DEFAULT_LOCKFILE: &str = ".venv/var/instance/assets/pnpm-lock.yaml";
const DEFAULT_INFECTED_LIST: &str = "npm_infected_versions.json";

/// Operational tools for an InvenioRDM deployment
#[derive(Parser, Debug)]
#[command(name = "rdm-ops")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the OpenAPI document from the exported route table and schema catalog
    Openapi {
        /// Route table exported from the host application (YAML or JSON)
        #[arg(long, value_name = "FILE")]
        routes: PathBuf,

        /// Directory of exported schema modules
        #[arg(long, value_name = "DIR")]
        catalog: PathBuf,

        /// Output file path
        #[arg(short = 'o', long = "output", value_name = "FILE", default_value = DEFAULT_OUTPUT_FILE)]
        output: PathBuf,

        /// Output format (yaml or json)
        #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
        format: OutputFormat,

        /// Generator config file (YAML or JSON)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Check installed pnpm packages against a list of infected versions
    CheckInfected {
        /// pnpm workspace to list (defaults to the lockfile's directory)
        #[arg(long, value_name = "DIR")]
        workspace: Option<PathBuf>,

        #[arg(long, value_name = "FILE", default_value = DEFAULT_LOCKFILE)]
        lockfile: PathBuf,

        /// JSON object of package name to comma-separated versions
        #[arg(long, value_name = "FILE", default_value = DEFAULT_INFECTED_LIST)]
        infected: PathBuf,
    },

    /// Convert the infected-package CSV into the JSON list used by check-infected
    CsvToJson {
        #[arg(value_name = "INPUT_CSV")]
        input: PathBuf,

        #[arg(value_name = "OUTPUT_JSON")]
        output: PathBuf,
    },

    /// Show how old installed Python packages and their latest releases are
    Freshness {
        /// Virtual environment to inspect (defaults to $VIRTUAL_ENV)
        #[arg(long, value_name = "DIR")]
        venv: Option<PathBuf>,

        /// Parallel requests (default: CPU*4, max 32)
        #[arg(long)]
        workers: Option<usize>,

        #[arg(long = "sort-by", value_enum, default_value = "current")]
        sort_by: SortBy,
    },

    /// Create a draft with a dangling multipart upload, then clean it up
    SimulateUpload {
        #[arg(long, default_value = DEFAULT_SERVER_URL)]
        server: String,

        /// Cached upload token
        #[arg(long = "token-file", value_name = "FILE", default_value = DEFAULT_TOKEN_FILE)]
        token_file: PathBuf,
    },
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Run the selected subcommand
pub fn run(cli: Cli) -> Result<()> {
    debug!("Parsed arguments: {:?}", cli);

    match cli.command {
        Command::Openapi {
            routes,
            catalog,
            output,
            format,
            config,
        } => run_openapi(&routes, &catalog, &output, format, config.as_deref()),
        Command::CheckInfected {
            workspace,
            lockfile,
            infected,
        } => run_check_infected(workspace, &lockfile, &infected),
        Command::CsvToJson { input, output } => {
            csv_convert::csv_to_json(&input, &output)?;
            println!("Converted {} -> {}", input.display(), output.display());
            Ok(())
        }
        Command::Freshness {
            venv,
            workers,
            sort_by,
        } => {
            let defaults = FreshnessOptions::default();
            let options = FreshnessOptions {
                venv: venv.or(defaults.venv),
                workers: workers.unwrap_or(defaults.workers),
                sort_by,
            };
            let client = PypiClient::new()?;
            freshness::run(&options, &client)?;
            Ok(())
        }
        Command::SimulateUpload { server, token_file } => {
            let stdin = io::stdin();
            upload_sim::run(&server, &token_file, &mut stdin.lock(), &mut io::stdout())?;
            Ok(())
        }
    }
}

fn run_openapi(
    routes: &Path,
    catalog: &Path,
    output: &Path,
    format: OutputFormat,
    config_path: Option<&Path>,
) -> Result<()> {
    info!("Starting OpenAPI document generation...");
    info!("Route table: {}", routes.display());
    info!("Schema catalog: {}", catalog.display());

    let config = GeneratorConfig::load(config_path)?;
    let generated = generate(routes, catalog, &config)?;

    info!("Serializing to {:?} format...", format);
    let content = match format {
        OutputFormat::Yaml => serialize_yaml_with_header(&generated.document, config.yaml_header())?,
        OutputFormat::Json => serialize_json(&generated.document)?,
    };

    info!("Writing output to: {}", output.display());
    write_to_file(&content, output)?;

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Catalog files: {}", generated.catalog_files);
    info!("  - Registered schemas: {}", generated.registered_schemas);
    info!("  - Endpoints: {}", generated.endpoints);
    info!("  - Paths: {}", generated.paths);
    info!("  - Component schemas: {}", generated.component_schemas);
    println!("OpenAPI spec generated: {}", output.display());

    Ok(())
}

fn run_check_infected(workspace: Option<PathBuf>, lockfile: &Path, infected_list: &Path) -> Result<()> {
    let workspace = workspace
        .or_else(|| lockfile.parent().map(Path::to_path_buf))
        .filter(|w| !w.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from("."));
    info!("Checking {} against {}", workspace.display(), infected_list.display());

    let found = infected::check(lockfile, &workspace, infected_list)?;
    if found.is_empty() {
        println!("No infected packages found in your lockfile.");
    } else {
        println!("Infected packages found:");
        for package in &found {
            println!("  - {}", package);
        }
    }
    Ok(())
}
