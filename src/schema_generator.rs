use crate::parser::{FieldDef, FieldKind, NestedTarget, SchemaDef, Validator};
use crate::registry::SchemaRegistry;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Field names treated as language maps when they are string-valued dicts
const LANG_MAP_NAMES: [&str; 7] = [
    "title",
    "titles",
    "description",
    "descriptions",
    "title_l10n",
    "subtitle_l10n",
    "alternative_titles",
];

/// Schema keywords with a dedicated `Schema` slot that metadata must not shadow
const RESERVED_KEYWORDS: [&str; 13] = [
    "nullable",
    "minimum",
    "maximum",
    "minLength",
    "maxLength",
    "pattern",
    "properties",
    "required",
    "items",
    "additionalProperties",
    "$ref",
    "oneOf",
    "discriminator",
];

/// Schema generator - converts catalog schema definitions to OpenAPI schemas
pub struct SchemaGenerator<'a> {
    /// Registry used to resolve nested schema names
    registry: &'a SchemaRegistry,
    /// Schemas currently being converted, to break reference cycles
    resolving_stack: HashSet<String>,
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g., "date-time", "uuid")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Enum values
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<serde_json::Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<serde_json::Number>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Required field names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    /// Value schema for map-like objects
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    /// Reference to another schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Schema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    /// Pass-through metadata with no dedicated slot
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

/// OpenAPI discriminator object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discriminator {
    #[serde(rename = "propertyName")]
    pub property_name: String,
}

impl Schema {
    /// Schema with only a type
    pub fn typed(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    /// Schema with a type and format
    pub fn formatted(schema_type: &str, format: &str) -> Self {
        Self {
            format: Some(format.to_string()),
            ..Self::typed(schema_type)
        }
    }

    pub fn string() -> Self {
        Self::typed("string")
    }

    pub fn integer() -> Self {
        Self::typed("integer")
    }

    pub fn boolean() -> Self {
        Self::typed("boolean")
    }

    /// The inline `{"type": "object"}` literal
    pub fn object() -> Self {
        Self::typed("object")
    }

    /// Array of the given item schema
    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::typed("array")
        }
    }

    /// Object with the given properties and required names
    pub fn object_with(properties: Vec<(&str, Schema)>, required: &[&str]) -> Self {
        Self {
            properties: Some(
                properties
                    .into_iter()
                    .map(|(name, schema)| (name.to_string(), schema))
                    .collect(),
            ),
            required: if required.is_empty() {
                None
            } else {
                Some(required.iter().map(|s| s.to_string()).collect())
            },
            ..Self::object()
        }
    }

    /// `$ref` to a component schema
    pub fn reference(name: &str) -> Self {
        Self {
            reference: Some(format!("#/components/schemas/{}", name)),
            ..Default::default()
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|v| Value::from(*v)).collect());
        self
    }

    pub fn with_min_length(mut self, min: u64) -> Self {
        self.min_length = Some(min);
        self
    }

    pub fn with_range(mut self, min: Option<i64>, max: Option<i64>) -> Self {
        self.minimum = min.map(serde_json::Number::from);
        self.maximum = max.map(serde_json::Number::from);
        self
    }

    /// Whether this is a bare object with nothing inside (renders as `{}` in viewers)
    pub fn is_empty_object(&self) -> bool {
        self.reference.is_none()
            && self.one_of.is_none()
            && self.properties.as_ref().map_or(true, |p| p.is_empty())
            && self.additional_properties.is_none()
            && matches!(self.schema_type.as_deref(), None | Some("object"))
    }
}

impl<'a> SchemaGenerator<'a> {
    /// Create a new SchemaGenerator over a registry
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            registry,
            resolving_stack: HashSet::new(),
        }
    }

    /// Convert every registered schema into a component, keyed by registry name
    pub fn generate_components(&mut self) -> BTreeMap<String, Schema> {
        let mut components = BTreeMap::new();
        for name in self.registry.names() {
            if let Some(entry) = self.registry.get(name) {
                let schema = self.generate_named(name, &entry.definition);
                components.insert(name.to_string(), schema);
            }
        }
        debug!("Generated {} component schemas", components.len());
        components
    }

    /// Convert one schema definition, tracking its name for cycle detection
    fn generate_named(&mut self, name: &str, def: &SchemaDef) -> Schema {
        if self.resolving_stack.contains(name) {
            warn!("Circular reference detected for schema: {}", name);
            return Schema::object();
        }
        self.resolving_stack.insert(name.to_string());
        let schema = self.generate_schema(def);
        self.resolving_stack.remove(name);
        schema
    }

    /// Generate an object (or one-of) schema for a definition
    pub fn generate_schema(&mut self, def: &SchemaDef) -> Schema {
        if let Some(members) = &def.one_of {
            let one_of = members
                .iter()
                .map(|member| self.resolve_named(member))
                .collect();
            return Schema {
                one_of: Some(one_of),
                discriminator: Some(Discriminator {
                    property_name: def.type_field.clone().unwrap_or_else(|| "type".to_string()),
                }),
                ..Default::default()
            };
        }

        let mut properties = BTreeMap::new();
        let mut required = Vec::new();

        for (name, field) in &def.fields {
            let mut property = self.field_schema(field);
            enhance_lang_map(name, &mut property);
            properties.insert(name.clone(), property);

            if field.required && !field.allow_none {
                required.push(name.clone());
            }
        }

        required.sort();
        required.dedup();

        Schema {
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required)
            },
            ..Schema::object()
        }
    }

    /// Resolve a schema by registry name, falling back to an empty object
    fn resolve_named(&mut self, name: &str) -> Schema {
        match self.registry.get(name) {
            Some(entry) => {
                let def = entry.definition.clone();
                self.generate_named(name, &def)
            }
            None => {
                warn!("Nested schema {} is not registered, using object placeholder", name);
                Schema::object()
            }
        }
    }

    /// Generate the schema for a single field
    pub fn field_schema(&mut self, field: &FieldDef) -> Schema {
        let mut schema = match field.kind {
            FieldKind::String | FieldKind::Constant | FieldKind::Method | FieldKind::Function
            | FieldKind::Raw | FieldKind::Unknown => Schema::string(),
            FieldKind::Email => Schema::formatted("string", "email"),
            FieldKind::Url => Schema::formatted("string", "uri"),
            FieldKind::Uuid => Schema::formatted("string", "uuid"),
            FieldKind::Integer => Schema::integer(),
            FieldKind::Float | FieldKind::Decimal => Schema::typed("number"),
            FieldKind::Boolean => Schema::boolean(),
            FieldKind::DateTime => Schema::formatted("string", "date-time"),
            FieldKind::Date => Schema::formatted("string", "date"),
            FieldKind::Time => Schema::formatted("string", "time"),
            FieldKind::List => {
                let items = match &field.inner {
                    Some(inner) => self.field_schema(inner),
                    None => Schema::string(),
                };
                Schema::array(items)
            }
            FieldKind::Dict => {
                let values = match &field.values {
                    Some(values) => self.field_schema(values),
                    None => Schema::string(),
                };
                Schema {
                    additional_properties: Some(Box::new(values)),
                    ..Schema::object()
                }
            }
            FieldKind::Nested => {
                let nested = match &field.nested {
                    Some(NestedTarget::Named(name)) => self.resolve_named(name),
                    Some(NestedTarget::Inline(def)) => self.generate_schema(def),
                    None => Schema::object(),
                };
                if field.many {
                    Schema::array(nested)
                } else if nested.one_of.is_some() {
                    // members are merged later by the builder
                    nested
                } else {
                    Schema {
                        properties: Some(nested.properties.unwrap_or_default()),
                        required: nested.required,
                        ..Schema::object()
                    }
                }
            }
        };

        if field.allow_none {
            schema.nullable = Some(true);
        }

        // Containers only carry constraints, not enums or descriptions
        if !matches!(field.kind, FieldKind::List | FieldKind::Dict | FieldKind::Nested) {
            schema.enum_values = enum_from_field(field);
            if let Some(description) = &field.description {
                schema.description = Some(description.clone());
            }
            if field.default.is_some() {
                schema.default = field.default.clone();
            }
        }
        if !matches!(field.kind, FieldKind::Dict | FieldKind::Nested) {
            apply_validators(&field.validators, &mut schema);
        }
        apply_metadata(&field.metadata, &mut schema);

        schema
    }
}

/// Enum values from the explicit list, then from a `OneOf` validator
fn enum_from_field(field: &FieldDef) -> Option<Vec<Value>> {
    if let Some(values) = field.enum_values.as_ref().filter(|v| !v.is_empty()) {
        return Some(values.clone());
    }
    if let Some(Value::Array(values)) = field.metadata.get("enum") {
        if !values.is_empty() {
            return Some(values.clone());
        }
    }
    field.validators.iter().find_map(|v| match v {
        Validator::OneOf { choices } if !choices.is_empty() => Some(choices.clone()),
        _ => None,
    })
}

fn apply_validators(validators: &[Validator], schema: &mut Schema) {
    for validator in validators {
        match validator {
            Validator::Range { min, max } => {
                if min.is_some() {
                    schema.minimum = min.clone();
                }
                if max.is_some() {
                    schema.maximum = max.clone();
                }
            }
            Validator::Length { min, max } => {
                if min.is_some() {
                    schema.min_length = *min;
                }
                if max.is_some() {
                    schema.max_length = *max;
                }
            }
            Validator::Regexp { pattern } => schema.pattern = Some(pattern.clone()),
            Validator::OneOf { .. } | Validator::Other => {}
        }
    }
}

/// Merge free-form field metadata into the schema.
///
/// A non-string `type` is kept verbatim under `extensions` so the sanitizer can coerce it.
fn apply_metadata(metadata: &serde_json::Map<String, Value>, schema: &mut Schema) {
    for (key, value) in metadata {
        match key.as_str() {
            "enum" => {}
            "description" => {
                if let Value::String(s) = value {
                    schema.description = Some(s.clone());
                }
            }
            "type" => match value {
                Value::String(s) => schema.schema_type = Some(s.clone()),
                other => {
                    schema.schema_type = None;
                    schema.extensions.insert("type".to_string(), other.clone());
                }
            },
            "format" => match value {
                Value::String(s) => schema.format = Some(s.clone()),
                other => {
                    schema.format = None;
                    schema.extensions.insert("format".to_string(), other.clone());
                }
            },
            "example" => schema.example = Some(value.clone()),
            "default" => schema.default = Some(value.clone()),
            reserved if RESERVED_KEYWORDS.contains(&reserved) => {
                debug!("Ignoring metadata key {} that names a schema keyword", reserved);
            }
            _ => {
                schema.extensions.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Make language maps readable in Swagger UI.
fn enhance_lang_map(field_name: &str, schema: &mut Schema) {
    if schema.schema_type.as_deref() != Some("object") {
        return;
    }
    let string_values = schema
        .additional_properties
        .as_ref()
        .map_or(false, |ap| ap.schema_type.as_deref() == Some("string"));
    if !string_values {
        return;
    }
    if LANG_MAP_NAMES.contains(&field_name) || field_name.ends_with("_l10n") {
        if schema.description.is_none() {
            schema.description = Some("Language map (ISO language codes as keys).".to_string());
        }
        if schema.example.is_none() {
            schema.example = Some(serde_json::json!({"en": "Example text"}));
        }
    }
}
