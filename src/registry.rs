//! Schema registry built from the host's exported schema modules.
//!
//! Modules are registered in priority order. Each schema is indexed under its clean name
//! (trailing `Schema` stripped) and its original class name; the first module to define a
//! name owns it and later duplicates are ignored.

use crate::parser::{ParsedModule, SchemaDef};
use log::{debug, warn};
use std::collections::HashMap;

/// Known InvenioRDM modules that contain schema definitions, in lookup priority order
pub const DEFAULT_SCHEMA_MODULES: [&str; 22] = [
    "invenio_rdm_records.services.schemas",
    "invenio_rdm_records.services.schemas.metadata",
    "invenio_rdm_records.services.schemas.parent",
    "invenio_rdm_records.services.schemas.access",
    "invenio_rdm_records.services.schemas.files",
    "invenio_communities.communities.schema",
    "invenio_communities.services.schemas",
    "invenio_communities.members.services.schemas",
    "invenio_users_resources.services.schemas",
    "invenio_accounts.services.schemas",
    "invenio_requests.services.schemas",
    "invenio_requests.customizations.schemas",
    "invenio_vocabularies.services.schema",
    "invenio_vocabularies.services.schemas",
    "invenio_records_resources.services.files.schema",
    "invenio_records_resources.services.records.schema",
    "invenio_records_resources.services.schemas",
    "invenio_jobs.services.schema",
    "invenio_oaiserver.services.schemas",
    "invenio_notifications.services.schemas",
    "invenio_statistics.services.schemas",
    "invenio_search.services.schemas",
];

/// One registered schema
#[derive(Debug, Clone)]
pub struct SchemaEntry {
    /// Name the entry is registered under
    pub name: String,
    /// Module that defined it
    pub module: String,
    /// Category derived from the module name
    pub category: &'static str,
    pub definition: SchemaDef,
}

/// Name-indexed schema registry with hint lookup
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    entries: HashMap<String, SchemaEntry>,
    /// Registration order, used for deterministic iteration and fuzzy lookup
    order: Vec<String>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from parsed catalog modules, honouring the given module order.
    ///
    /// Modules absent from `parsed` are skipped; parsed modules not named in `module_names`
    /// are ignored.
    pub fn from_modules(module_names: &[String], parsed: &[ParsedModule]) -> Self {
        let mut registry = Self::new();

        for module_name in module_names {
            match parsed.iter().find(|m| &m.module == module_name) {
                Some(module) => registry.register_module(module),
                None => debug!("Schema module {} not available, skipping", module_name),
            }
        }

        debug!(
            "Registry holds {} schema names from {} modules",
            registry.len(),
            module_names.len()
        );
        registry
    }

    /// Register every schema of one module. Malformed schemas are skipped with a warning.
    pub fn register_module(&mut self, module: &ParsedModule) {
        let category = Self::categorize_module(&module.module);

        for (name, raw) in &module.schemas {
            let definition: SchemaDef = match serde_json::from_value(raw.clone()) {
                Ok(def) => def,
                Err(e) => {
                    warn!(
                        "Skipping malformed schema {} in {}: {}",
                        name, module.module, e
                    );
                    continue;
                }
            };

            let clean_name = Self::clean_schema_name(name);
            self.insert_if_absent(&clean_name, &module.module, category, &definition);
            if clean_name != *name {
                self.insert_if_absent(name, &module.module, category, &definition);
            }
        }
    }

    fn insert_if_absent(
        &mut self,
        name: &str,
        module: &str,
        category: &'static str,
        definition: &SchemaDef,
    ) {
        if self.entries.contains_key(name) {
            debug!("Schema {} already registered, ignoring duplicate from {}", name, module);
            return;
        }
        self.entries.insert(
            name.to_string(),
            SchemaEntry {
                name: name.to_string(),
                module: module.to_string(),
                category,
                definition: definition.clone(),
            },
        );
        self.order.push(name.to_string());
    }

    /// Categorize a module by its name
    pub fn categorize_module(module_name: &str) -> &'static str {
        if module_name.contains("rdm_records") {
            "Records"
        } else if module_name.contains("communities") {
            "Communities"
        } else if module_name.contains("users") || module_name.contains("accounts") {
            "Users"
        } else if module_name.contains("requests") {
            "Requests"
        } else if module_name.contains("vocabularies") {
            "Vocabularies"
        } else if module_name.contains("files") {
            "Files"
        } else if module_name.contains("jobs") {
            "Jobs"
        } else if module_name.contains("oai") {
            "OAI-PMH"
        } else if module_name.contains("notifications") {
            "Notifications"
        } else if module_name.contains("statistics") {
            "Statistics"
        } else {
            "Core"
        }
    }

    /// Strip a trailing `Schema` suffix, unless nothing would remain
    pub fn clean_schema_name(name: &str) -> String {
        match name.strip_suffix("Schema") {
            Some(base) if !base.is_empty() => base.to_string(),
            _ => name.to_string(),
        }
    }

    /// Find a schema name from a hint (e.g. a URL path segment).
    ///
    /// Tries, in order: exact match, `hint + "Schema"`, hint without its `Schema` suffix,
    /// case-insensitive match, then substring containment in either direction.
    pub fn find_schema(&self, hint: &str) -> Option<&str> {
        if hint.is_empty() {
            return None;
        }

        if let Some(entry) = self.entries.get(hint) {
            return Some(&entry.name);
        }

        if let Some(entry) = self.entries.get(&format!("{}Schema", hint)) {
            return Some(&entry.name);
        }

        if let Some(entry) = hint
            .strip_suffix("Schema")
            .filter(|base| !base.is_empty())
            .and_then(|base| self.entries.get(base))
        {
            return Some(&entry.name);
        }

        let hint_lower = hint.to_lowercase();
        if let Some(name) = self.order.iter().find(|n| n.to_lowercase() == hint_lower) {
            return Some(name);
        }

        self.order
            .iter()
            .find(|n| {
                let lower = n.to_lowercase();
                lower.contains(&hint_lower) || hint_lower.contains(&lower)
            })
            .map(|n| n.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&SchemaEntry> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|n| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn module(name: &str, schemas: serde_json::Value) -> ParsedModule {
        ParsedModule {
            path: PathBuf::from(format!("{}.yaml", name)),
            module: name.to_string(),
            schemas: serde_json::from_value(schemas).unwrap(),
        }
    }

    fn simple(field: &str) -> serde_json::Value {
        json!({"fields": {field: {"kind": "String"}}})
    }

    #[test]
    fn test_registers_clean_and_original_names() {
        let mut registry = SchemaRegistry::new();
        registry.register_module(&module(
            "invenio_requests.services.schemas",
            json!({"RequestSchema": simple("id"), "Schema": simple("x")}),
        ));

        assert!(registry.contains("Request"));
        assert!(registry.contains("RequestSchema"));
        // A bare "Schema" is too short to strip
        assert!(registry.contains("Schema"));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get("Request").unwrap().category, "Requests");
    }

    #[test]
    fn test_first_module_wins() {
        let modules = vec![
            module("invenio_communities.communities.schema", json!({"CommunitySchema": simple("slug")})),
            module("invenio_communities.services.schemas", json!({"CommunitySchema": simple("other")})),
        ];
        let names: Vec<String> = modules.iter().map(|m| m.module.clone()).collect();

        let registry = SchemaRegistry::from_modules(&names, &modules);

        let entry = registry.get("CommunitySchema").unwrap();
        assert_eq!(entry.module, "invenio_communities.communities.schema");
        assert!(entry.definition.fields.contains_key("slug"));
    }

    #[test]
    fn test_module_order_controls_precedence() {
        let modules = vec![
            module("b.module", json!({"ThingSchema": simple("from_b")})),
            module("a.module", json!({"ThingSchema": simple("from_a")})),
        ];
        let names = vec!["a.module".to_string(), "b.module".to_string()];

        let registry = SchemaRegistry::from_modules(&names, &modules);

        assert!(registry.get("Thing").unwrap().definition.fields.contains_key("from_a"));
    }

    #[test]
    fn test_missing_module_is_skipped() {
        let modules = vec![module("present.module", json!({"UserSchema": simple("id")}))];
        let names = vec!["absent.module".to_string(), "present.module".to_string()];

        let registry = SchemaRegistry::from_modules(&names, &modules);
        assert!(registry.contains("User"));
    }

    #[test]
    fn test_malformed_schema_is_skipped() {
        let mut registry = SchemaRegistry::new();
        registry.register_module(&module(
            "invenio_jobs.services.schema",
            json!({
                "JobSchema": simple("title"),
                "BrokenSchema": {"fields": {"x": {"required": true}}}
            }),
        ));

        assert!(registry.contains("Job"));
        assert!(!registry.contains("Broken"));
        assert!(!registry.contains("BrokenSchema"));
    }

    #[test]
    fn test_categorize_module() {
        assert_eq!(SchemaRegistry::categorize_module("invenio_rdm_records.services.schemas"), "Records");
        assert_eq!(SchemaRegistry::categorize_module("invenio_accounts.services.schemas"), "Users");
        assert_eq!(SchemaRegistry::categorize_module("invenio_records_resources.services.files.schema"), "Files");
        assert_eq!(SchemaRegistry::categorize_module("invenio_oaiserver.services.schemas"), "OAI-PMH");
        assert_eq!(SchemaRegistry::categorize_module("invenio_search.services.schemas"), "Core");
    }

    #[test]
    fn test_find_schema_precedence() {
        let mut registry = SchemaRegistry::new();
        registry.register_module(&module(
            "invenio_vocabularies.services.schema",
            json!({
                "VocabularySchema": simple("id"),
                "AwardSchema": simple("number"),
                "FunderRelationSchema": simple("funder")
            }),
        ));

        // exact
        assert_eq!(registry.find_schema("AwardSchema"), Some("AwardSchema"));
        assert_eq!(registry.find_schema("Award"), Some("Award"));
        // case-insensitive
        assert_eq!(registry.find_schema("vocabulary"), Some("Vocabulary"));
        // fuzzy containment
        assert_eq!(registry.find_schema("funder"), Some("FunderRelation"));
        assert_eq!(registry.find_schema("nothing-like-it"), None);
        assert_eq!(registry.find_schema(""), None);
    }

    #[test]
    fn test_find_schema_suffix_variants() {
        let mut registry = SchemaRegistry::new();
        registry.insert_if_absent("Banner", "m", "Core", &SchemaDef::default());
        registry.insert_if_absent("PageSchema", "m", "Core", &SchemaDef::default());

        // hint + "Schema"
        assert_eq!(registry.find_schema("Page"), Some("PageSchema"));
        // suffix-stripped hint
        assert_eq!(registry.find_schema("BannerSchema"), Some("Banner"));
    }

    #[test]
    fn test_names_follow_registration_order() {
        let mut registry = SchemaRegistry::new();
        registry.register_module(&module(
            "invenio_users_resources.services.schemas",
            json!({"UserSchema": simple("id"), "GroupSchema": simple("id")}),
        ));

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["Group", "GroupSchema", "User", "UserSchema"]);
    }
}
