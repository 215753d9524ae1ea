//! rdm-ops - operational tools for an InvenioRDM deployment.
//!
//! # Usage
//!
//! ```bash
//! rdm-ops [OPTIONS] <COMMAND>
//! ```
//!
//! # Examples
//!
//! Generate the OpenAPI document:
//! ```bash
//! rdm-ops openapi --routes routes.yaml --catalog schema-catalog -o openapi.yaml
//! ```
//!
//! Check installed pnpm packages against the infected list:
//! ```bash
//! rdm-ops check-infected --infected npm_infected_versions.json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! rdm-ops -v freshness --sort-by latest
//! ```

use anyhow::Result;
use clap::Parser;
use log::debug;
use rdm_ops::cli;

fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    debug!("rdm-ops starting...");

    cli::run(args)
}
