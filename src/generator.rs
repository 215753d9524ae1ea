//! End-to-end OpenAPI generation: catalog + route table in, sanitized document out.

use crate::analyzer::EndpointAnalyzer;
use crate::config::GeneratorConfig;
use crate::openapi_builder::OpenApiBuilder;
use crate::parser::{CatalogParser, ParsedModule};
use crate::registry::SchemaRegistry;
use crate::route_table::RouteTable;
use crate::sanitizer::sanitize;
use crate::scanner::CatalogScanner;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde_json::Value;
use std::path::Path;

/// Generated document plus counters for the run summary
#[derive(Debug, Clone)]
pub struct Generated {
    pub document: Value,
    pub catalog_files: usize,
    pub registered_schemas: usize,
    pub endpoints: usize,
    pub paths: usize,
    pub component_schemas: usize,
}

/// Run the whole pipeline
pub fn generate(routes: &Path, catalog: &Path, config: &GeneratorConfig) -> Result<Generated> {
    // Step 1: Load the schema catalog
    if !catalog.is_dir() {
        anyhow::bail!("Catalog directory does not exist: {}", catalog.display());
    }
    info!("Scanning schema catalog...");
    let scan_result = CatalogScanner::new(catalog.to_path_buf()).scan()?;
    info!("Found {} catalog files", scan_result.catalog_files.len());

    let parsed: Vec<ParsedModule> = CatalogParser::parse_files(&scan_result.catalog_files)
        .into_iter()
        .filter_map(|r| match r {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Skipping catalog file: {:#}", e);
                None
            }
        })
        .collect();

    // Step 2: Build the registry
    info!("Building schema registry...");
    let registry = SchemaRegistry::from_modules(&config.schema_modules, &parsed);
    info!("Registered {} schema names", registry.len());
    if registry.is_empty() {
        warn!("Schema registry is empty; every body will be an inline object");
    }

    // Step 3: Analyze the route table
    info!("Analyzing route table...");
    let table = RouteTable::load(routes)?;
    let endpoints = EndpointAnalyzer::new(&registry).analyze(&table);
    info!("Found {} endpoints", endpoints.len());

    // Step 4: Assemble and sanitize
    info!("Building OpenAPI document...");
    let server_url = config.server_url(table.site_url());
    let mut builder = OpenApiBuilder::from_config(&registry, config, server_url);
    builder.add_endpoints(&endpoints);
    let document = builder.build();

    let paths = document.paths.len();
    let component_schemas = document.components.schemas.len();
    let value = serde_json::to_value(&document).context("Failed to convert document")?;

    Ok(Generated {
        document: sanitize(value),
        catalog_files: scan_result.catalog_files.len(),
        registered_schemas: registry.len(),
        endpoints: endpoints.len(),
        paths,
        component_schemas,
    })
}
