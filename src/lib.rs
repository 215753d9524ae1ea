//! rdm-ops - operational tools surrounding an InvenioRDM deployment.
//!
//! # Tools
//!
//! - **OpenAPI generation**: builds an OpenAPI 3.0.3 document from the host's exported route
//!   table and schema catalog
//! - **Infected package check**: intersects installed pnpm packages with a known-bad list
//! - **CSV conversion**: turns the advisory CSV into that list
//! - **Freshness check**: reports package ages against the PyPI JSON API
//! - **Upload simulation**: leaves a multipart upload dangling and cleans it up
//!
//! # OpenAPI Pipeline
//!
//! 1. [`scanner`] - Finds catalog documents in the exported schema directory
//! 2. [`parser`] - Parses catalog documents into schema definitions
//! 3. [`registry`] - Indexes schemas by name in module priority order
//! 4. [`route_table`] - Loads the exported route table
//! 5. [`analyzer`] - Filters routes and derives paths, categories and schema hints
//! 6. [`schema_generator`] - Converts schema definitions to OpenAPI schemas
//! 7. [`openapi_builder`] - Constructs the complete OpenAPI document
//! 8. [`sanitizer`] - Cleans the document for strict tooling
//! 9. [`serializer`] - Serializes the document to YAML or JSON
//!
//! [`generator`] chains the steps together.
//!
//! # Example Usage
//!
//! ```no_run
//! use rdm_ops::{config::GeneratorConfig, generator::generate, serializer::serialize_yaml};
//! use std::path::Path;
//!
//! let config = GeneratorConfig::default();
//! let generated = generate(Path::new("routes.yaml"), Path::new("schema-catalog"), &config).unwrap();
//! println!("{}", serialize_yaml(&generated.document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod csv_convert;
pub mod error;
pub mod freshness;
pub mod generator;
pub mod infected;
pub mod openapi_builder;
pub mod parser;
pub mod registry;
pub mod route_table;
pub mod sanitizer;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod upload_sim;
