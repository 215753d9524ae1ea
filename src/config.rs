//! Configuration for the OpenAPI generator.
//!
//! Every setting has a built-in default, so the config file is optional. A file may set
//! any subset of the keys:
//!
//! ```yaml
//! title: My Repository API
//! version: "13.0.0"
//! site_url: https://repository.example.org
//! schema_modules:
//!   - invenio_rdm_records.services.schemas
//! header: |
//!   # Generated file, do not edit.
//! ```
//!
//! # Environment Variables
//!
//! - `SITE_URL`: server url used when the config file does not set `site_url`

use crate::registry::DEFAULT_SCHEMA_MODULES;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub const OPENAPI_VERSION: &str = "3.0.3";
pub const DEFAULT_API_TITLE: &str = "Invenio REST API";
pub const DEFAULT_API_VERSION: &str = "13.0.0";
pub const DEFAULT_SITE_URL: &str = "https://localhost:5000";
pub const DEFAULT_OUTPUT_FILE: &str = "openapi_generated.yaml";
pub const SITE_URL_ENV: &str = "SITE_URL";

pub const DEFAULT_API_DESCRIPTION: &str = "## **Summary**

The following document is a reference guide for all the REST APIs that InvenioRDM exposes.

## **Resources**

- [Product documentation](https://inveniordm.docs.cern.ch)
- [OpenAPI GitHub repository](https://github.com/inveniosoftware/invenio-openapi)
- [Invenio project](https://inveniosoftware.org)
- [Community support](https://inveniordm-dev.docs.cern.ch/install/troubleshoot/)
";

pub const DEFAULT_YAML_HEADER: &str = "# -*- coding: utf-8 -*-
#
# Copyright (C) 2025 KTH Royal Institute of Technology.
# Copyright (C) 2025 CERN.
#
# Invenio-openapi is free software; you can redistribute it and/or modify it
# under the terms of the MIT License; see LICENSE file for more details.

";

/// Settings for the `openapi` subcommand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub title: String,
    pub version: String,
    pub description: String,
    /// Server url; when unset, `SITE_URL` or the route table's exported config is used
    pub site_url: Option<String>,
    /// Schema modules in registry priority order
    pub schema_modules: Vec<String>,
    /// Comment block written above YAML output. An empty string disables it.
    pub header: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_API_TITLE.to_string(),
            version: DEFAULT_API_VERSION.to_string(),
            description: DEFAULT_API_DESCRIPTION.to_string(),
            site_url: None,
            schema_modules: DEFAULT_SCHEMA_MODULES.iter().map(|m| m.to_string()).collect(),
            header: Some(DEFAULT_YAML_HEADER.to_string()),
        }
    }
}

impl GeneratorConfig {
    /// Load a config file (JSON by extension, YAML otherwise)
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading generator config from {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = if path.extension().and_then(|e| e.to_str()) == Some("json") {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config JSON: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config YAML: {}", path.display()))?
        };

        Ok(config)
    }

    /// Load from an optional path, falling back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Resolve the server url: config file, then `SITE_URL`, then the host's exported
    /// config, then the built-in default.
    pub fn server_url(&self, exported_site_url: Option<&str>) -> String {
        if let Some(url) = self.site_url.as_deref().filter(|u| !u.is_empty()) {
            return url.to_string();
        }
        if let Ok(url) = env::var(SITE_URL_ENV) {
            if !url.is_empty() {
                return url;
            }
        }
        exported_site_url
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_SITE_URL)
            .to_string()
    }

    /// The YAML header, if enabled
    pub fn yaml_header(&self) -> Option<&str> {
        self.header.as_deref().filter(|h| !h.is_empty())
    }
}
