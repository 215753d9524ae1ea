//! Endpoint analysis over the exported route table.
//!
//! Each url rule becomes an [`EndpointDescriptor`]: the OpenAPI path template, its explicit
//! HTTP methods, a category used for tagging and a schema hint used for request and
//! response bodies.

use crate::registry::SchemaRegistry;
use crate::route_table::{HttpMethod, RouteTable};
use log::{debug, info};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

/// Rules that never appear in the API description
static SKIP_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^/static/",
        r"^/_debug",
        r"^/admin/static",
        r"^/favicon\.ico",
        r"^/robots\.txt",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(?:[^:<>]+:)?([^<>]+)>").expect("valid regex"));

/// Ordered category table; the first matching pattern wins
static CATEGORY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Drafts", r"/records/.*draft"),
        ("Records", r"/records"),
        ("Communities", r"/communities"),
        ("Users", r"/users"),
        ("Users", r"/accounts"),
        ("Requests", r"/requests"),
        ("Vocabularies", r"/vocabularies"),
        ("Files", r"/files"),
        ("Statistics", r"/stats"),
        ("OAI-PMH", r"/oai"),
        ("Jobs", r"/jobs"),
        ("Search", r"/search"),
    ]
    .iter()
    .map(|(category, pattern)| {
        let regex = Regex::new(&format!("(?i){}", pattern)).expect("valid regex");
        (*category, regex)
    })
    .collect()
});

/// Path substrings with a fixed schema hint, checked in order
const SPECIAL_HINTS: [(&str, &str); 7] = [
    ("/communities", "CommunitySchema"),
    ("/records", "RDMRecordSchema"),
    ("/users", "UserSchema"),
    ("/accounts", "UserSchema"),
    ("/vocabularies", "VocabularySchema"),
    ("/requests", "RequestSchema"),
    ("/files", "FileSchema"),
];

pub const DEFAULT_CATEGORY: &str = "Misc";

/// One analyzed route
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct EndpointDescriptor {
    /// OpenAPI path template, e.g. `/api/records/{pid_value}`
    pub path: String,
    /// Explicit methods; HEAD and OPTIONS are never included
    pub methods: BTreeSet<HttpMethod>,
    pub category: String,
    /// Schema name (or name fragment) describing the resource
    pub schema_hint: Option<String>,
    /// First line of the view docstring
    pub description: Option<String>,
}

/// Turns url rules into endpoint descriptors
pub struct EndpointAnalyzer<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> EndpointAnalyzer<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// Analyze every rule of the table, sorted by path then methods
    pub fn analyze(&self, table: &RouteTable) -> Vec<EndpointDescriptor> {
        let mut endpoints = Vec::new();

        for rule in &table.rules {
            if should_skip(&rule.rule) {
                debug!("Skipping rule {}", rule.rule);
                continue;
            }

            let methods: BTreeSet<HttpMethod> = rule
                .methods
                .iter()
                .filter_map(|m| {
                    let parsed = HttpMethod::parse(m);
                    if parsed.is_none() {
                        debug!("Ignoring unsupported method {} on {}", m, rule.rule);
                    }
                    parsed
                })
                .filter(|m| !m.is_implicit())
                .collect();

            if methods.is_empty() {
                debug!("Rule {} has no explicit methods, skipping", rule.rule);
                continue;
            }

            let path = flask_to_openapi_path(&rule.rule);
            let category = categorize(&path).to_string();
            let schema_hint = self.schema_hint(&path);
            let description = table.docstring(rule).and_then(first_line);

            endpoints.push(EndpointDescriptor {
                path,
                methods,
                category,
                schema_hint,
                description,
            });
        }

        endpoints.sort();
        // Converters differ per rule but translate to the same template
        endpoints.dedup_by(|a, b| a.path == b.path && a.methods == b.methods);
        info!("Analyzed {} endpoints from {} rules", endpoints.len(), table.rules.len());
        endpoints
    }

    /// Derive a schema hint from the path.
    ///
    /// Well-known resource prefixes map to fixed schemas; otherwise the first resource
    /// segment and the last literal segment are tried against the registry in their
    /// plain, singular and title-cased forms.
    pub fn schema_hint(&self, path: &str) -> Option<String> {
        let parts: Vec<&str> = path
            .trim_matches('/')
            .split('/')
            .filter(|p| !p.is_empty() && !p.starts_with('{'))
            .collect();

        if parts.is_empty() {
            return None;
        }

        let path_lower = path.to_lowercase();
        if let Some((_, hint)) = SPECIAL_HINTS
            .iter()
            .find(|(fragment, _)| path_lower.contains(fragment))
        {
            return Some(hint.to_string());
        }

        let mut hints = Vec::new();
        if parts[0] == "api" && parts.len() > 1 {
            hints.push(parts[1]);
        } else {
            hints.push(parts[0]);
        }
        if parts.len() > 1 {
            hints.push(parts[parts.len() - 1]);
        }

        for hint in hints {
            let singular = singularize(hint);
            let variations = [
                hint.to_string(),
                singular.clone(),
                title_case(hint),
                title_case(&singular),
            ];
            for variation in &variations {
                if let Some(name) = self.registry.find_schema(variation) {
                    return Some(name.to_string());
                }
            }
        }

        None
    }
}

/// Whether a rule is on the denylist
pub fn should_skip(rule: &str) -> bool {
    SKIP_PATTERNS.iter().any(|p| p.is_match(rule))
}

/// Convert `<name>` and `<converter:name>` placeholders to `{name}`
pub fn flask_to_openapi_path(rule: &str) -> String {
    PLACEHOLDER.replace_all(rule, "{$1}").into_owned()
}

/// Category of a path, `Misc` when nothing matches
pub fn categorize(path: &str) -> &'static str {
    CATEGORY_PATTERNS
        .iter()
        .find(|(_, regex)| regex.is_match(path))
        .map(|(category, _)| *category)
        .unwrap_or(DEFAULT_CATEGORY)
}

pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{}y", stem)
    } else if word.len() > 1 && word.ends_with('s') {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_word_start = true;
    for c in word.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}

fn first_line(doc: &str) -> Option<String> {
    doc.trim()
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParsedModule;
    use crate::route_table::RouteRule;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;

    fn rule(path: &str, methods: &[&str]) -> RouteRule {
        RouteRule {
            rule: path.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            endpoint: None,
            doc: None,
        }
    }

    fn registry_with(names: &[&str]) -> SchemaRegistry {
        let schemas = names
            .iter()
            .map(|n| (n.to_string(), json!({"fields": {}})))
            .collect();
        let mut registry = SchemaRegistry::new();
        registry.register_module(&ParsedModule {
            path: PathBuf::from("catalog.yaml"),
            module: "invenio_jobs.services.schema".to_string(),
            schemas,
        });
        registry
    }

    #[test]
    fn test_path_translation() {
        assert_eq!(
            flask_to_openapi_path("/api/records/<pid_value>/files/<path:key>"),
            "/api/records/{pid_value}/files/{key}"
        );
        assert_eq!(flask_to_openapi_path("/api/ping"), "/api/ping");
    }

    #[test]
    fn test_path_translation_is_idempotent() {
        for rule in [
            "/api/records/<pid_value>/draft",
            "/api/communities/<string:pid_value>/members",
            "/api/{already}/<int:id>",
            "/plain",
        ] {
            let once = flask_to_openapi_path(rule);
            assert_eq!(flask_to_openapi_path(&once), once);
        }
    }

    #[test]
    fn test_rules_with_same_template_are_merged() {
        let table = RouteTable {
            rules: vec![
                rule("/api/x/<id>", &["GET"]),
                rule("/api/x/<int:id>", &["GET", "HEAD"]),
                rule("/api/x/<string:id>", &["PUT"]),
            ],
            ..Default::default()
        };

        let endpoints = EndpointAnalyzer::new(&SchemaRegistry::new()).analyze(&table);

        assert_eq!(endpoints.len(), 2);
        assert!(endpoints.iter().all(|e| e.path == "/api/x/{id}"));
        assert_eq!(
            endpoints[0].methods,
            BTreeSet::from([HttpMethod::Get])
        );
        assert_eq!(
            endpoints[1].methods,
            BTreeSet::from([HttpMethod::Put])
        );
    }

    #[test]
    fn test_denylist() {
        assert!(should_skip("/static/js/app.js"));
        assert!(should_skip("/_debug_toolbar/static"));
        assert!(should_skip("/favicon.ico"));
        assert!(!should_skip("/api/static/thing"));
        assert!(!should_skip("/api/records"));
    }

    #[test]
    fn test_categorize() {
        assert_eq!(categorize("/api/records/{pid_value}/draft"), "Drafts");
        assert_eq!(categorize("/api/records"), "Records");
        assert_eq!(categorize("/api/ACCOUNTS/login"), "Users");
        assert_eq!(categorize("/api/stats"), "Statistics");
        assert_eq!(categorize("/oai2d"), "OAI-PMH");
        assert_eq!(categorize("/api/banners"), "Misc");
    }

    #[test]
    fn test_singularize_and_title_case() {
        assert_eq!(singularize("communities"), "community");
        assert_eq!(singularize("jobs"), "job");
        assert_eq!(singularize("s"), "s");
        assert_eq!(singularize("oai"), "oai");
        assert_eq!(title_case("jobs"), "Jobs");
        assert_eq!(title_case("oai-pmh"), "Oai-Pmh");
        assert_eq!(title_case("uSER_tokens"), "User_Tokens");
    }

    #[test]
    fn test_special_schema_hints() {
        let registry = SchemaRegistry::new();
        let analyzer = EndpointAnalyzer::new(&registry);

        assert_eq!(
            analyzer.schema_hint("/api/communities/{pid_value}").as_deref(),
            Some("CommunitySchema")
        );
        assert_eq!(
            analyzer.schema_hint("/api/records/{pid_value}/draft").as_deref(),
            Some("RDMRecordSchema")
        );
        assert_eq!(analyzer.schema_hint("/api/accounts/login").as_deref(), Some("UserSchema"));
        assert_eq!(analyzer.schema_hint("/{id}"), None);
    }

    #[test]
    fn test_registry_schema_hints() {
        let registry = registry_with(&["JobSchema", "RunSchema"]);
        let analyzer = EndpointAnalyzer::new(&registry);

        // first resource segment, singularized
        assert_eq!(analyzer.schema_hint("/api/jobs").as_deref(), Some("Job"));
        // last literal segment
        assert_eq!(
            analyzer.schema_hint("/api/tasks/{id}/runs").as_deref(),
            Some("Run")
        );
        assert_eq!(analyzer.schema_hint("/api/banners"), None);
    }

    #[test]
    fn test_analyze_filters_and_sorts() {
        let registry = SchemaRegistry::new();
        let analyzer = EndpointAnalyzer::new(&registry);

        let mut read = rule("/api/records/<pid_value>", &["GET", "HEAD", "OPTIONS", "PUT"]);
        read.endpoint = Some("records.read".to_string());

        let table = RouteTable {
            rules: vec![
                read,
                rule("/static/<path:filename>", &["GET"]),
                rule("/api/records", &["OPTIONS", "HEAD"]),
                rule("/api/communities", &["POST", "get"]),
            ],
            view_functions: [(
                "records.read".to_string(),
                Some("  Read a record.\n\nDetails follow.".to_string()),
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };

        let endpoints = analyzer.analyze(&table);

        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].path, "/api/communities");
        assert_eq!(
            endpoints[0].methods.iter().copied().collect::<Vec<_>>(),
            vec![HttpMethod::Get, HttpMethod::Post]
        );
        assert_eq!(endpoints[0].category, "Communities");

        assert_eq!(endpoints[1].path, "/api/records/{pid_value}");
        assert_eq!(
            endpoints[1].methods.iter().copied().collect::<Vec<_>>(),
            vec![HttpMethod::Get, HttpMethod::Put]
        );
        assert_eq!(endpoints[1].description.as_deref(), Some("Read a record."));
        assert_eq!(endpoints[1].schema_hint.as_deref(), Some("RDMRecordSchema"));
    }
}
