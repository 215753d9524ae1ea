use anyhow::{Context, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Parser for schema catalog documents.
///
/// A catalog document is the exported introspection of one host module: its dotted module
/// name and every serialization schema class it defines, keyed by class name. Schemas are kept
/// as raw values here so that one malformed schema can be rejected later without losing the
/// rest of the module.
///
/// ```yaml
/// module: invenio_requests.services.schemas
/// schemas:
///   RequestSchema:
///     fields:
///       id: { kind: String }
///       status: { kind: String, enum: [submitted, accepted] }
/// ```
pub struct CatalogParser;

/// A successfully parsed catalog document.
#[derive(Debug, Clone)]
pub struct ParsedModule {
    /// Path to the source document
    pub path: PathBuf,
    /// Dotted module name, falling back to the file stem when the document omits it
    pub module: String,
    /// Schema class name -> raw schema description
    pub schemas: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ModuleDocument {
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    schemas: BTreeMap<String, Value>,
}

/// Structural description of one schema class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDef {
    /// Declared fields by name
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDef>,
    /// Member schema names for polymorphic (one-of) schemas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<String>>,
    /// Discriminator field of a one-of schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_field: Option<String>,
}

/// Introspected definition of a single schema field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub allow_none: bool,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "validate", default)]
    pub validators: Vec<Validator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Element definition of a `List`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner: Option<Box<FieldDef>>,
    /// Value definition of a `Dict`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Box<FieldDef>>,
    /// Target of a `Nested` field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nested: Option<NestedTarget>,
    #[serde(default)]
    pub many: bool,
    /// Load/dump default as rendered by the exporter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Free-form field metadata, passed through to the generated schema
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,
}

/// Field classes recognised by the schema generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    String,
    Email,
    #[serde(alias = "URL")]
    Url,
    #[serde(alias = "UUID")]
    Uuid,
    Integer,
    Float,
    Decimal,
    Boolean,
    DateTime,
    Date,
    Time,
    Method,
    Function,
    Raw,
    List,
    Dict,
    Nested,
    Constant,
    #[serde(other)]
    Unknown,
}

/// Target of a nested field: either a schema name or an inline definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NestedTarget {
    Named(String),
    Inline(Box<SchemaDef>),
}

/// Validators attached to a field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Validator {
    Range {
        #[serde(default)]
        min: Option<serde_json::Number>,
        #[serde(default)]
        max: Option<serde_json::Number>,
    },
    Length {
        #[serde(default)]
        min: Option<u64>,
        #[serde(default)]
        max: Option<u64>,
    },
    Regexp {
        pattern: String,
    },
    OneOf {
        choices: Vec<Value>,
    },
    #[serde(other)]
    Other,
}

impl CatalogParser {
    /// Parses a single catalog document (JSON by extension, YAML otherwise).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid catalog document.
    pub fn parse_file(path: &Path) -> Result<ParsedModule> {
        debug!("Parsing catalog file: {}", path.display());

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path.display()))?;

        let document: ModuleDocument = if path.extension().and_then(|e| e.to_str()) == Some("json")
        {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse catalog JSON: {}", path.display()))?
        } else {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse catalog YAML: {}", path.display()))?
        };

        let module = document.module.unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default()
        });

        debug!(
            "Catalog {} declares {} schemas",
            module,
            document.schemas.len()
        );

        Ok(ParsedModule {
            path: path.to_path_buf(),
            module,
            schemas: document.schemas,
        })
    }

    /// Parses multiple catalog documents, continuing even if some fail.
    pub fn parse_files(paths: &[PathBuf]) -> Vec<Result<ParsedModule>> {
        debug!("Parsing {} catalog files", paths.len());

        let results: Vec<Result<ParsedModule>> = paths
            .iter()
            .map(|path| {
                Self::parse_file(path).map_err(|e| {
                    warn!("Failed to parse {}: {:#}", path.display(), e);
                    e
                })
            })
            .collect();

        let success_count = results.iter().filter(|r| r.is_ok()).count();
        debug!(
            "Parsing complete: {} succeeded, {} failed",
            success_count,
            results.len() - success_count
        );

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_temp_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let file_path = dir.path().join(name);
        let mut file = fs::File::create(&file_path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file_path
    }

    #[test]
    fn test_parse_yaml_module() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(
            &temp_dir,
            "requests.yaml",
            r#"
module: invenio_requests.services.schemas
schemas:
  RequestSchema:
    fields:
      id: { kind: String }
      status:
        kind: String
        required: true
        validate:
          - { type: OneOf, choices: [submitted, accepted] }
"#,
        );

        let parsed = CatalogParser::parse_file(&path).unwrap();
        assert_eq!(parsed.module, "invenio_requests.services.schemas");
        assert!(parsed.schemas.contains_key("RequestSchema"));

        let def: SchemaDef =
            serde_json::from_value(parsed.schemas["RequestSchema"].clone()).unwrap();
        assert_eq!(def.fields.len(), 2);
        assert!(def.fields["status"].required);
        assert_eq!(
            def.fields["status"].validators[0],
            Validator::OneOf {
                choices: vec![Value::from("submitted"), Value::from("accepted")]
            }
        );
    }

    #[test]
    fn test_parse_json_module_without_name_uses_stem() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(
            &temp_dir,
            "invenio_jobs.services.schema.json",
            r#"{"schemas": {"JobSchema": {"fields": {"title": {"kind": "String"}}}}}"#,
        );

        let parsed = CatalogParser::parse_file(&path).unwrap();
        assert_eq!(parsed.module, "invenio_jobs.services.schema");
        assert_eq!(parsed.schemas.len(), 1);
    }

    #[test]
    fn test_parse_invalid_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = create_temp_file(&temp_dir, "broken.yaml", "schemas: [unclosed");

        let err = CatalogParser::parse_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse catalog YAML"));
    }

    #[test]
    fn test_parse_nonexistent_file() {
        let err = CatalogParser::parse_file(Path::new("/nonexistent/catalog.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[test]
    fn test_parse_files_continues_after_failure() {
        let temp_dir = TempDir::new().unwrap();
        let good = create_temp_file(&temp_dir, "good.yaml", "module: good\nschemas: {}");
        let bad = create_temp_file(&temp_dir, "bad.json", "{not json");

        let results = CatalogParser::parse_files(&[good, bad]);

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_field_kind_aliases_and_unknown() {
        let url: FieldKind = serde_json::from_value(Value::from("URL")).unwrap();
        let uuid: FieldKind = serde_json::from_value(Value::from("UUID")).unwrap();
        let other: FieldKind = serde_json::from_value(Value::from("SanitizedHTML")).unwrap();

        assert_eq!(url, FieldKind::Url);
        assert_eq!(uuid, FieldKind::Uuid);
        assert_eq!(other, FieldKind::Unknown);
    }

    #[test]
    fn test_nested_target_named_and_inline() {
        let named: NestedTarget = serde_json::from_value(Value::from("UserSchema")).unwrap();
        assert_eq!(named, NestedTarget::Named("UserSchema".to_string()));

        let inline: NestedTarget = serde_json::from_value(serde_json::json!({
            "fields": {"id": {"kind": "String"}}
        }))
        .unwrap();
        match inline {
            NestedTarget::Inline(def) => assert!(def.fields.contains_key("id")),
            other => panic!("expected inline target, got {:?}", other),
        }
    }
}
