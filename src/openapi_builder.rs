use crate::analyzer::EndpointDescriptor;
use crate::config::{
    GeneratorConfig, DEFAULT_API_DESCRIPTION, DEFAULT_API_TITLE, DEFAULT_API_VERSION,
    DEFAULT_SITE_URL, OPENAPI_VERSION,
};
use crate::registry::SchemaRegistry;
use crate::route_table::HttpMethod;
use crate::schema_generator::{Schema, SchemaGenerator};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static ID_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\{[^}]*id[^}]*\}").expect("valid regex"));

static PATH_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^}]+)\}").expect("valid regex"));

/// Path fragments whose collection GETs return a paginated search envelope
const PAGINATED_FRAGMENTS: [&str; 4] = ["/search", "/communities", "/records", "/users"];

const ERROR_RESPONSES: [(&str, &str); 5] = [
    ("400", "Bad Request"),
    ("401", "Unauthorized"),
    ("403", "Forbidden"),
    ("404", "Not Found"),
    ("500", "Internal Server Error"),
];

const JSON_CONTENT: &str = "application/json";

/// OpenAPI document builder
pub struct OpenApiBuilder<'a> {
    /// Registry backing `$ref` resolution and components
    registry: &'a SchemaRegistry,
    /// OpenAPI info section
    info: Info,
    servers: Vec<Server>,
    /// Paths collection (URL path -> PathItem)
    paths: BTreeMap<String, PathItem>,
    /// Categories seen across all endpoints, one tag each
    categories: BTreeSet<String>,
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub tags: Vec<String>,
    pub summary: String,
    /// Query parameters followed by path parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code
    pub responses: BTreeMap<String, Response>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query)
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub required: bool,
    /// Content types and their schemas
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    pub schemas: BTreeMap<String, Schema>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    pub servers: Vec<Server>,
    pub tags: Vec<Tag>,
    pub paths: BTreeMap<String, PathItem>,
    pub components: Components,
}

impl PathItem {
    fn set(&mut self, method: HttpMethod, operation: Operation) {
        let slot = match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        };
        *slot = Some(operation);
    }

    /// Operations in method order
    pub fn operations(&self) -> Vec<(HttpMethod, &Operation)> {
        [
            (HttpMethod::Get, &self.get),
            (HttpMethod::Post, &self.post),
            (HttpMethod::Put, &self.put),
            (HttpMethod::Patch, &self.patch),
            (HttpMethod::Delete, &self.delete),
            (HttpMethod::Options, &self.options),
            (HttpMethod::Head, &self.head),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
        .collect()
    }
}

impl Response {
    fn plain(description: &str) -> Self {
        Self {
            description: description.to_string(),
            content: None,
        }
    }

    fn json(description: &str, schema: Schema) -> Self {
        Self {
            description: description.to_string(),
            content: Some(json_content(schema)),
        }
    }
}

fn json_content(schema: Schema) -> BTreeMap<String, MediaType> {
    let mut content = BTreeMap::new();
    content.insert(JSON_CONTENT.to_string(), MediaType { schema });
    content
}

impl<'a> OpenApiBuilder<'a> {
    /// Create a new OpenApiBuilder with the default InvenioRDM info
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            registry,
            info: Info {
                title: DEFAULT_API_TITLE.to_string(),
                version: DEFAULT_API_VERSION.to_string(),
                description: Some(DEFAULT_API_DESCRIPTION.to_string()),
                contact: Some(Contact {
                    name: "InvenioRDM Community".to_string(),
                    url: "https://inveniosoftware.org/".to_string(),
                }),
                license: Some(License {
                    name: "MIT".to_string(),
                    url: "https://opensource.org/licenses/MIT".to_string(),
                }),
            },
            servers: vec![Server {
                url: DEFAULT_SITE_URL.to_string(),
                description: Some("InvenioRDM instance".to_string()),
            }],
            paths: BTreeMap::new(),
            categories: BTreeSet::new(),
        }
    }

    /// Builder configured from generator settings and the resolved server url
    pub fn from_config(
        registry: &'a SchemaRegistry,
        config: &GeneratorConfig,
        server_url: String,
    ) -> Self {
        Self::new(registry)
            .with_info(
                config.title.clone(),
                config.version.clone(),
                Some(config.description.clone()).filter(|d| !d.is_empty()),
            )
            .with_server(server_url)
    }

    /// Set custom title, version and description, keeping contact and license
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info.title = title;
        self.info.version = version;
        self.info.description = description;
        self
    }

    pub fn with_server(mut self, url: String) -> Self {
        self.servers = vec![Server {
            url,
            description: Some("InvenioRDM instance".to_string()),
        }];
        self
    }

    /// Add analyzed endpoints, merging all methods that share a path
    pub fn add_endpoints(&mut self, endpoints: &[EndpointDescriptor]) {
        let mut by_path: BTreeMap<&str, Vec<&EndpointDescriptor>> = BTreeMap::new();
        for endpoint in endpoints {
            by_path.entry(endpoint.path.as_str()).or_default().push(endpoint);
            self.categories.insert(endpoint.category.clone());
        }

        for (path, group) in by_path {
            self.add_path(path, &group);
        }
    }

    fn add_path(&mut self, path: &str, endpoints: &[&EndpointDescriptor]) {
        let Some(primary) = select_primary_endpoint(endpoints) else {
            return;
        };

        let methods: BTreeSet<HttpMethod> = endpoints
            .iter()
            .flat_map(|ep| ep.methods.iter().copied())
            .collect();
        let path_params = path_parameters(path);

        let mut item = PathItem::default();
        for method in methods {
            debug!("Adding operation: {} {}", method, path);
            let mut operation = self.create_operation(method, primary);
            if !path_params.is_empty() {
                operation
                    .parameters
                    .get_or_insert_with(Vec::new)
                    .extend(path_params.iter().cloned());
            }
            item.set(method, operation);
        }

        self.paths.insert(path.to_string(), item);
    }

    fn create_operation(&self, method: HttpMethod, endpoint: &EndpointDescriptor) -> Operation {
        let summary = endpoint
            .description
            .clone()
            .unwrap_or_else(|| format!("{} {}", method, endpoint.path));

        let parameters = if method == HttpMethod::Get {
            Some(query_parameters(&endpoint.path)).filter(|p| !p.is_empty())
        } else {
            None
        };

        let request_body = if matches!(
            method,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch
        ) {
            self.request_schema(endpoint, method).map(|schema| RequestBody {
                required: true,
                content: json_content(schema),
            })
        } else {
            None
        };

        let mut responses = BTreeMap::new();
        if method == HttpMethod::Delete {
            responses.insert("204".to_string(), Response::plain("No Content"));
        } else {
            let response = match self.hint_schema(endpoint) {
                Some(schema) => {
                    let schema = if method == HttpMethod::Get && !has_id_parameter(&endpoint.path) {
                        collection_schema(&endpoint.path, schema)
                    } else {
                        schema
                    };
                    Response::json("Successful response", schema)
                }
                None => Response::plain("Successful response"),
            };
            responses.insert("200".to_string(), response);
        }
        for (status, description) in ERROR_RESPONSES {
            responses.insert(status.to_string(), Response::plain(description));
        }

        Operation {
            tags: vec![endpoint.category.clone()],
            summary,
            parameters,
            request_body,
            responses,
        }
    }

    /// Schema for the endpoint's hint: a `$ref` when the registry knows it, else `{type: object}`
    fn hint_schema(&self, endpoint: &EndpointDescriptor) -> Option<Schema> {
        let hint = endpoint.schema_hint.as_deref()?;
        Some(match self.registry.find_schema(hint) {
            Some(name) => Schema::reference(name),
            None => {
                debug!("Schema hint {} not in registry, using inline object", hint);
                Schema::object()
            }
        })
    }

    fn request_schema(&self, endpoint: &EndpointDescriptor, method: HttpMethod) -> Option<Schema> {
        if method == HttpMethod::Post {
            if let Some(schema) = known_request_body(&endpoint.path.to_lowercase()) {
                return Some(schema);
            }
        }
        self.hint_schema(endpoint)
    }

    /// Build the final OpenAPI document
    pub fn build(self) -> OpenApiDocument {
        debug!("Building final OpenAPI document");

        let mut generator = SchemaGenerator::new(self.registry);
        let mut schemas = generator.generate_components();
        enrich_components(&mut schemas);
        for schema in schemas.values_mut() {
            flatten_one_of(schema);
        }

        let tags = self
            .categories
            .iter()
            .map(|category| Tag {
                name: category.clone(),
                description: Some(tag_description(category)),
            })
            .collect();

        info!(
            "Built document with {} paths and {} schemas",
            self.paths.len(),
            schemas.len()
        );

        OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info,
            servers: self.servers,
            tags,
            paths: self.paths,
            components: Components { schemas },
        }
    }
}

/// The endpoint whose best method ranks highest (GET, then POST, PUT, PATCH, DELETE)
fn select_primary_endpoint<'e>(endpoints: &[&'e EndpointDescriptor]) -> Option<&'e EndpointDescriptor> {
    endpoints
        .iter()
        .copied()
        .min_by_key(|ep| ep.methods.iter().next().copied())
}

fn has_id_parameter(path: &str) -> bool {
    ID_PLACEHOLDER.is_match(path)
}

fn path_parameters(path: &str) -> Vec<Parameter> {
    PATH_PLACEHOLDER
        .captures_iter(path)
        .map(|cap| {
            let name = cap[1].to_string();
            Parameter {
                description: Some(format!("The {} identifier", name)),
                name,
                location: "path".to_string(),
                required: true,
                schema: Schema::string(),
            }
        })
        .collect()
}

fn query_parameter(name: &str, schema: Schema, description: &str) -> Parameter {
    Parameter {
        name: name.to_string(),
        location: "query".to_string(),
        required: false,
        schema,
        description: Some(description.to_string()),
    }
}

/// Search and pagination parameters for collection GETs
fn query_parameters(path: &str) -> Vec<Parameter> {
    if has_id_parameter(path) {
        return Vec::new();
    }

    let mut params = vec![
        query_parameter("q", Schema::string(), "Search query"),
        query_parameter(
            "sort",
            Schema::string(),
            "Sort order (e.g., 'bestmatch', 'newest', 'oldest')",
        ),
        query_parameter(
            "size",
            Schema::integer()
                .with_range(Some(1), Some(100))
                .with_default(Value::from(10)),
            "Number of results per page",
        ),
        query_parameter(
            "page",
            Schema::integer()
                .with_range(Some(1), None)
                .with_default(Value::from(1)),
            "Page number",
        ),
    ];

    let path_lower = path.to_lowercase();
    if path_lower.contains("/communities") {
        params.push(query_parameter("type", Schema::string(), "Filter by community type"));
        params.push(query_parameter("featured", Schema::boolean(), "Filter featured communities"));
    } else if path_lower.contains("/records") {
        params.push(query_parameter("type", Schema::string(), "Filter by record type"));
        params.push(query_parameter(
            "access",
            Schema::string().with_enum(&["public", "restricted"]),
            "Filter by access level",
        ));
        params.push(query_parameter("created", Schema::string(), "Filter by creation date range"));
    } else if path_lower.contains("/users") {
        params.push(query_parameter("domain", Schema::string(), "Filter by email domain"));
    }

    params
}

/// Wrap a collection GET response in a search envelope or a plain array
fn collection_schema(path: &str, item: Schema) -> Schema {
    let path_lower = path.to_lowercase();
    if PAGINATED_FRAGMENTS.iter().any(|f| path_lower.contains(f)) {
        Schema::object_with(
            vec![
                (
                    "hits",
                    Schema::object_with(
                        vec![("hits", Schema::array(item)), ("total", Schema::integer())],
                        &[],
                    ),
                ),
                ("links", Schema::object()),
                ("aggregations", Schema::object()),
            ],
            &[],
        )
    } else {
        Schema::array(item)
    }
}

fn email() -> Schema {
    Schema::formatted("string", "email")
}

fn password() -> Schema {
    Schema::string().with_min_length(8)
}

fn date_time() -> Schema {
    Schema::formatted("string", "date-time")
}

/// Request bodies for POST endpoints with no usable schema of their own
fn known_request_body(path_lower: &str) -> Option<Schema> {
    let schema = if path_lower.contains("/login") {
        Schema::object_with(
            vec![
                ("email", email()),
                ("password", Schema::string()),
                ("remember", Schema::boolean().with_default(Value::Bool(false))),
            ],
            &["email", "password"],
        )
    } else if path_lower.contains("/register") {
        Schema::object_with(
            vec![
                ("email", email()),
                ("password", password()),
                ("password_confirm", password()),
                (
                    "profile",
                    Schema::object_with(
                        vec![
                            ("full_name", Schema::string()),
                            ("affiliations", Schema::string()),
                        ],
                        &[],
                    ),
                ),
            ],
            &["email", "password", "password_confirm"],
        )
    } else if path_lower.contains("/change-password") {
        Schema::object_with(
            vec![
                ("current_password", Schema::string()),
                ("new_password", password()),
                ("new_password_confirm", password()),
            ],
            &["current_password", "new_password", "new_password_confirm"],
        )
    } else if path_lower.contains("/forgot-password") {
        Schema::object_with(vec![("email", email())], &["email"])
    } else if path_lower.contains("/reset-password") {
        Schema::object_with(
            vec![
                ("token", Schema::string()),
                ("password", password()),
                ("password_confirm", password()),
            ],
            &["token", "password", "password_confirm"],
        )
    } else if path_lower.contains("/send-confirmation-email") {
        Schema::object_with(vec![("email", email())], &["email"])
    } else if path_lower.contains("/confirm-email") {
        Schema::object_with(vec![("token", Schema::string())], &["token"])
    } else if path_lower.contains("/oauth") {
        Schema::object_with(
            vec![("code", Schema::string()), ("state", Schema::string())],
            &[],
        )
    } else if path_lower.contains("/signup") {
        Schema::object_with(
            vec![
                ("email", email()),
                ("password", Schema::string()),
                ("password_confirm", Schema::string()),
                ("profile", Schema::object()),
            ],
            &["email", "password", "password_confirm"],
        )
    } else if path_lower.contains("/banners") {
        Schema::object_with(
            vec![
                ("message", Schema::string()),
                (
                    "category",
                    Schema::string().with_enum(&["info", "warning", "error", "success"]),
                ),
                ("start_datetime", date_time()),
                ("end_datetime", date_time()),
                ("url_path", Schema::string()),
                ("active", Schema::boolean().with_default(Value::Bool(true))),
            ],
            &["message", "category"],
        )
    } else if path_lower.contains("/pages") {
        Schema::object_with(
            vec![
                ("title", Schema::string()),
                ("content", Schema::string()),
                ("template_name", Schema::string()),
                ("url", Schema::string()),
                ("description", Schema::string()),
            ],
            &["title", "content", "url"],
        )
    } else if path_lower.contains("/stats") {
        Schema::object_with(
            vec![
                ("views", Schema::integer()),
                ("downloads", Schema::integer()),
                ("recid", Schema::string()),
                ("timestamp", date_time()),
            ],
            &[],
        )
    } else if path_lower.contains("/vocabularies") && path_lower.contains("/tasks") {
        Schema::object_with(
            vec![
                ("type", Schema::string()),
                ("config", Schema::object()),
                ("title", Schema::string()),
                ("description", Schema::string()),
            ],
            &["type"],
        )
    } else if path_lower.contains("/vocabularies") {
        let english = || Schema::object_with(vec![("en", Schema::string())], &[]);
        Schema::object_with(
            vec![
                ("id", Schema::string()),
                ("title", english()),
                ("description", english()),
                ("icon", Schema::string()),
                ("props", Schema::object()),
                ("tags", Schema::array(Schema::string())),
            ],
            &["id", "title"],
        )
    } else {
        return None;
    };
    Some(schema)
}

fn tag_description(category: &str) -> String {
    match category {
        "Records" => "Published research records and publications".to_string(),
        "Drafts" => "Draft records before publication".to_string(),
        "Communities" => "Research communities and collections".to_string(),
        "Users" => "User accounts and profiles".to_string(),
        "Requests" => "Workflow requests and approvals".to_string(),
        "Vocabularies" => "Controlled vocabularies and taxonomies".to_string(),
        "Files" => "File management and storage".to_string(),
        "Statistics" => "Usage and download statistics".to_string(),
        "OAI-PMH" => "OAI-PMH metadata harvesting".to_string(),
        "Jobs" => "Background jobs and tasks".to_string(),
        "Search" => "Search and discovery".to_string(),
        "Misc" => "Miscellaneous endpoints".to_string(),
        other => format!("{} related operations", other),
    }
}

fn user_fallback() -> Schema {
    Schema::object_with(vec![("id", Schema::string()), ("email", email())], &[])
}

/// Known sparse fields and their replacements
fn sparse_field_patches() -> Vec<(&'static str, &'static str, Schema)> {
    let string_map = Schema {
        additional_properties: Some(Box::new(Schema::string())),
        ..Schema::object()
    };
    vec![
        ("RunSchema", "args", Schema::array(Schema::string())),
        ("RunSchema", "custom_args", string_map),
        ("JobLogEntrySchema", "sort", Schema::array(Schema::string())),
        (
            "JobLogEntrySchema",
            "context",
            Schema::object_with(
                vec![("job_id", Schema::string()), ("run_id", Schema::string())],
                &[],
            ),
        ),
    ]
}

/// Fill known sparse spots so viewers don't render them as `{}`.
///
/// Patches apply to a schema under both its class name and its clean alias, and only where
/// the field is missing or an empty object.
pub fn enrich_components(components: &mut BTreeMap<String, Schema>) {
    let user = components
        .get("UserSchema")
        .or_else(|| components.get("User"))
        .cloned()
        .unwrap_or_else(user_fallback);

    let mut patches = vec![("RunSchema", "started_by", user)];
    patches.extend(sparse_field_patches());

    for (schema_name, field, patch) in patches {
        let alias = SchemaRegistry::clean_schema_name(schema_name);
        for target in [schema_name, alias.as_str()] {
            if let Some(schema) = components.get_mut(target) {
                let properties = schema.properties.get_or_insert_with(BTreeMap::new);
                let sparse = properties.get(field).map_or(true, Schema::is_empty_object);
                if sparse {
                    debug!("Enriching {}.{}", target, field);
                    properties.insert(field.to_string(), patch.clone());
                }
            }
        }
    }
}

/// Replace every `oneOf` with one object merging the object members' properties and
/// required names.
pub fn flatten_one_of(schema: &mut Schema) {
    if let Some(members) = schema.one_of.take() {
        let mut properties = BTreeMap::new();
        let mut required = BTreeSet::new();
        for mut member in members {
            flatten_one_of(&mut member);
            if member.schema_type.as_deref() == Some("object") {
                properties.extend(member.properties.unwrap_or_default());
                required.extend(member.required.unwrap_or_default());
            }
        }
        *schema = Schema {
            properties: Some(properties),
            required: if required.is_empty() {
                None
            } else {
                Some(required.into_iter().collect())
            },
            nullable: schema.nullable,
            ..Schema::object()
        };
    }

    if let Some(properties) = schema.properties.as_mut() {
        for property in properties.values_mut() {
            flatten_one_of(property);
        }
    }
    if let Some(items) = schema.items.as_mut() {
        flatten_one_of(items);
    }
    if let Some(values) = schema.additional_properties.as_mut() {
        flatten_one_of(values);
    }
}
