//! Exported route table of the host application.
//!
//! The host dumps its url map, view-function docstrings and a few config values to a JSON or
//! YAML document. Both a full document and a bare list of rules are accepted:
//!
//! ```yaml
//! config:
//!   SITE_URL: https://127.0.0.1:5000
//! rules:
//!   - rule: /api/records/<pid_value>
//!     methods: [GET, HEAD, OPTIONS, PUT]
//!     endpoint: records.read
//! view_functions:
//!   records.read: "Read a record.\n\nReturns the latest revision."
//! ```

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

/// HTTP methods, ordered by primary-endpoint priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Options,
    Head,
}

impl HttpMethod {
    /// Parse a method name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "OPTIONS" => Some(HttpMethod::Options),
            "HEAD" => Some(HttpMethod::Head),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Methods the framework adds implicitly to every rule
    pub fn is_implicit(&self) -> bool {
        matches!(self, HttpMethod::Options | HttpMethod::Head)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One url rule as exported from the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteRule {
    /// Rule template with `<converter:name>` placeholders
    pub rule: String,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Docstring of the view function, when exported inline
    #[serde(default)]
    pub doc: Option<String>,
}

/// The host's url map, view docstrings and exported config
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    #[serde(default)]
    pub rules: Vec<RouteRule>,
    /// Endpoint name -> view function docstring
    #[serde(default)]
    pub view_functions: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RouteTableDocument {
    Full(RouteTable),
    Rules(Vec<RouteRule>),
}

impl RouteTable {
    /// Load the exported route table.
    ///
    /// A missing or unreadable table means the host application could not be initialized,
    /// which is fatal for the generator.
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading route table from {}", path.display());

        let content = fs::read_to_string(path).with_context(|| {
            format!(
                "Failed to initialize application: cannot read route table {}",
                path.display()
            )
        })?;

        let document: RouteTableDocument =
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                serde_json::from_str(&content).with_context(|| {
                    format!(
                        "Failed to initialize application: invalid route table JSON {}",
                        path.display()
                    )
                })?
            } else {
                serde_yaml::from_str(&content).with_context(|| {
                    format!(
                        "Failed to initialize application: invalid route table YAML {}",
                        path.display()
                    )
                })?
            };

        let table = match document {
            RouteTableDocument::Full(table) => table,
            RouteTableDocument::Rules(rules) => RouteTable {
                rules,
                ..Default::default()
            },
        };

        debug!("Route table holds {} rules", table.rules.len());
        Ok(table)
    }

    /// Docstring for a rule: inline doc first, then the view-function registry
    pub fn docstring<'a>(&'a self, rule: &'a RouteRule) -> Option<&'a str> {
        if let Some(doc) = rule.doc.as_deref() {
            return Some(doc);
        }
        rule.endpoint
            .as_ref()
            .and_then(|endpoint| self.view_functions.get(endpoint))
            .and_then(|doc| doc.as_deref())
    }

    /// `SITE_URL` from the exported host config
    pub fn site_url(&self) -> Option<&str> {
        self.config.get("SITE_URL").and_then(Value::as_str)
    }
}
