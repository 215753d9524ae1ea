use pretty_assertions::assert_eq;
use rdm_ops::{
    analyzer::{flask_to_openapi_path, EndpointAnalyzer},
    config::GeneratorConfig,
    csv_convert::csv_to_json,
    generator::generate,
    infected::{find_infected, load_infected, parse_pnpm_list},
    parser::CatalogParser,
    registry::SchemaRegistry,
    route_table::RouteTable,
    sanitizer::ALLOWED_TYPES,
    scanner::CatalogScanner,
    serializer::{serialize_json, serialize_yaml_with_header},
};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

fn test_config() -> GeneratorConfig {
    GeneratorConfig {
        site_url: Some("https://rdm.test".to_string()),
        ..GeneratorConfig::default()
    }
}

fn generate_fixture_document() -> Value {
    generate(
        &fixtures().join("routes.yaml"),
        &fixtures().join("catalog"),
        &test_config(),
    )
    .expect("Failed to generate document")
    .document
}

/// Helper function to create a temporary test project
fn create_test_project(files: Vec<(&str, &str)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

fn collect_refs(value: &Value, refs: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "$ref" {
                    if let Some(r) = child.as_str() {
                        refs.push(r.to_string());
                    }
                }
                collect_refs(child, refs);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, refs)),
        _ => {}
    }
}

fn collect_types(value: &Value, in_properties: bool, types: &mut Vec<Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if key == "type" && !in_properties {
                    types.push(child.clone());
                    continue;
                }
                let child_in_properties = !in_properties && key == "properties";
                collect_types(child, child_in_properties, types);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_types(item, false, types)),
        _ => {}
    }
}

#[test]
fn test_end_to_end_generation() {
    // Step 1: Scan the catalog
    let scan_result = CatalogScanner::new(fixtures().join("catalog"))
        .scan()
        .expect("Failed to scan catalog");
    assert_eq!(scan_result.catalog_files.len(), 6);

    // Step 2: Parse, losing only the broken document
    let parsed: Vec<_> = CatalogParser::parse_files(&scan_result.catalog_files)
        .into_iter()
        .filter_map(Result::ok)
        .collect();
    assert_eq!(parsed.len(), 5);

    // Step 3: Registry only takes the configured modules
    let config = test_config();
    let registry = SchemaRegistry::from_modules(&config.schema_modules, &parsed);
    assert!(registry.contains("RDMRecordSchema"));
    assert!(registry.contains("RDMRecord"));
    assert!(registry.contains("Community"));
    assert!(!registry.contains("WidgetSchema"));
    assert!(!registry.contains("BrokenSchema"));

    // Step 4: Analyze routes
    let table = RouteTable::load(&fixtures().join("routes.yaml")).expect("Failed to load routes");
    let endpoints = EndpointAnalyzer::new(&registry).analyze(&table);
    let paths: Vec<&str> = endpoints.iter().map(|e| e.path.as_str()).collect();

    assert_eq!(endpoints.len(), 10, "Unexpected endpoints: {:?}", paths);
    assert!(paths.contains(&"/api/communities/{pid_value}"));
    assert!(paths.contains(&"/api/requests/{id}/actions/{action}"));
    assert!(!paths.iter().any(|p| p.starts_with("/static") || p.starts_with("/_debug")));
    assert!(!paths.contains(&"/ping"), "Rules with only implicit methods are dropped");
}

#[test]
fn test_document_structure() {
    let doc = generate_fixture_document();

    assert_eq!(doc["openapi"], "3.0.3");
    assert_eq!(doc["info"]["title"], "Invenio REST API");
    assert_eq!(doc["servers"][0]["url"], "https://rdm.test");

    let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["openapi", "info", "servers", "tags", "paths", "components"]);

    let tags: BTreeSet<&str> = doc["tags"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    for expected in ["Communities", "Drafts", "Misc", "Records", "Requests", "Users"] {
        assert!(tags.contains(expected), "Missing tag {}: {:?}", expected, tags);
    }

    let records = &doc["paths"]["/api/records"];
    assert_eq!(records["get"]["summary"], "Search published records.");
    assert_eq!(records["get"]["tags"][0], "Records");
    assert!(records["post"]["requestBody"].is_object());
    assert!(records.get("head").is_none());
    assert!(records.get("options").is_none());

    let draft = &doc["paths"]["/api/records/{pid_value}/draft/files"];
    assert_eq!(draft["get"]["tags"][0], "Drafts");

    let delete = &doc["paths"]["/api/records/{pid_value}"]["delete"];
    assert!(delete["responses"]["204"].is_object());
    assert!(delete["responses"].get("200").is_none());
}

#[test]
fn test_path_parameters_are_declared() {
    let doc = generate_fixture_document();

    let action = &doc["paths"]["/api/requests/{id}/actions/{action}"]["post"];
    let names: Vec<&str> = action["parameters"]
        .as_array()
        .expect("Path parameters should be declared")
        .iter()
        .filter(|p| p["in"] == "path")
        .filter_map(|p| p["name"].as_str())
        .collect();
    assert_eq!(names, vec!["id", "action"]);
    assert_eq!(action["summary"], "Execute an action on a request.");
}

#[test]
fn test_known_request_body_for_login() {
    let doc = generate_fixture_document();

    let body = &doc["paths"]["/api/login"]["post"]["requestBody"]["content"]["application/json"]["schema"];
    assert_eq!(body["type"], "object");
    assert!(body["properties"]["email"].is_object());
    assert!(body["required"]
        .as_array()
        .unwrap()
        .contains(&Value::from("password")));
}

#[test]
fn test_no_dangling_refs() {
    let doc = generate_fixture_document();

    let mut refs = Vec::new();
    collect_refs(&doc, &mut refs);
    assert!(!refs.is_empty(), "Fixture should produce references");

    let schemas = doc["components"]["schemas"].as_object().unwrap();
    for reference in refs {
        let name = reference
            .strip_prefix("#/components/schemas/")
            .unwrap_or_else(|| panic!("Unexpected ref format: {}", reference));
        assert!(schemas.contains_key(name), "Dangling reference: {}", reference);
    }

    // unknown hints degrade to inline objects
    assert!(!schemas.contains_key("Widget"));
    assert!(!schemas.contains_key("WidgetSchema"));
}

#[test]
fn test_only_allowed_types_remain() {
    let doc = generate_fixture_document();

    let mut types = Vec::new();
    collect_types(&doc, false, &mut types);
    assert!(!types.is_empty());
    for t in types {
        let t = t.as_str().unwrap_or_else(|| panic!("Non-string type: {}", t));
        assert!(ALLOWED_TYPES.contains(&t), "Disallowed type: {}", t);
    }

    // a property literally called `type` is a field, not a keyword
    let metadata = &doc["components"]["schemas"]["MetadataSchema"]["properties"];
    assert_eq!(metadata["type"]["type"], "string");
}

#[test]
fn test_sanitized_components() {
    let doc = generate_fixture_document();
    let schemas = &doc["components"]["schemas"];

    // missing-value defaults are dropped
    assert!(schemas["RDMRecordSchema"]["properties"]["status"].get("default").is_none());

    // one-of members are merged into a single object
    let entity = &schemas["EntitySchema"];
    assert!(entity.get("oneOf").is_none());
    assert_eq!(entity["type"], "object");
    assert!(entity["properties"]["user"].is_object());
    assert!(entity["properties"]["group"].is_object());

    // a field nested to a one-of schema is merged the same way
    let receiver = &schemas["RequestSchema"]["properties"]["receiver"];
    assert!(receiver.get("oneOf").is_none());
    assert!(receiver.get("discriminator").is_none());
    assert!(receiver["properties"]["user"].is_object());
    assert!(receiver["properties"]["group"].is_object());
}

#[test]
fn test_yaml_output_with_header() {
    let doc = generate_fixture_document();
    let config = test_config();

    let yaml = serialize_yaml_with_header(&doc, config.yaml_header()).expect("Failed to serialize");
    assert!(yaml.starts_with("# -*- coding: utf-8 -*-"));
    assert!(yaml.contains("\nopenapi: 3.0.3\n"));

    let parsed: Value = serde_yaml::from_str(&yaml).expect("YAML output should parse");
    assert_eq!(parsed, doc);
}

#[test]
fn test_json_output() {
    let doc = generate_fixture_document();
    let json = serialize_json(&doc).expect("Failed to serialize");

    let parsed: Value = serde_json::from_str(&json).expect("JSON output should parse");
    assert_eq!(parsed["paths"], doc["paths"]);
}

#[test]
fn test_generation_is_deterministic() {
    let first = serialize_json(&generate_fixture_document()).unwrap();
    let second = serialize_json(&generate_fixture_document()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unparseable_route_table_fails() {
    let temp_dir = create_test_project(vec![
        ("routes.yaml", "rules: [ {rule: "),
        ("catalog/empty.yaml", "module: nothing\nschemas: {}\n"),
    ]);

    let err = generate(
        &temp_dir.path().join("routes.yaml"),
        &temp_dir.path().join("catalog"),
        &test_config(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("Failed to initialize application"));
}

#[test]
fn test_empty_catalog_still_generates() {
    let temp_dir = create_test_project(vec![(
        "routes.json",
        r#"[{"rule": "/api/records/<pid_value>", "methods": ["GET"]}]"#,
    )]);
    std::fs::create_dir_all(temp_dir.path().join("catalog")).unwrap();

    let generated = generate(
        &temp_dir.path().join("routes.json"),
        &temp_dir.path().join("catalog"),
        &test_config(),
    )
    .expect("Generation should tolerate an empty catalog");

    let schema = &generated.document["paths"]["/api/records/{pid_value}"]["get"]["responses"]["200"]
        ["content"]["application/json"]["schema"];
    assert_eq!(schema["type"], "object");
    assert!(schema.get("$ref").is_none());
}

#[test]
fn test_path_translation_is_idempotent() {
    for rule in [
        "/api/records/<pid_value>",
        "/api/communities/<string:pid_value>/members",
        "/files/<path:key>/content",
        "/api/plain",
    ] {
        let once = flask_to_openapi_path(rule);
        assert_eq!(flask_to_openapi_path(&once), once);
        assert!(!once.contains('<'));
    }
}

#[test]
fn test_infected_check_from_csv() {
    let temp_dir = create_test_project(vec![(
        "infected.csv",
        "chalk,=5.6.1\ndebug,=4.4.2 || =4.4.3\n",
    )]);
    let json_path = temp_dir.path().join("npm_infected_versions.json");

    csv_to_json(&temp_dir.path().join("infected.csv"), &json_path).expect("Failed to convert CSV");
    let infected = load_infected(&json_path).expect("Failed to load infected list");
    assert_eq!(infected.len(), 3);

    let installed = parse_pnpm_list(
        "/repo:PRIVATE\n/repo/node_modules/debug:debug@4.4.3\n/repo/node_modules/chalk:chalk@5.6.0\n",
    );
    assert_eq!(find_infected(&installed, &infected), vec!["debug@4.4.3"]);
}
