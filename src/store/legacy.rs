//! The flat pre-migration JSON schema and its mapping onto the nested
//! `project` / `tech_stack` / `generation` payload.

use std::fs;
use std::path::Path;

use serde_json::{Map, Value, json};

use crate::error::{StoreError, StoreResult};
use crate::store::codec::{Metadata, Payload};
use crate::store::document::Scope;
use crate::store::util::now_display_stamp;

pub const DEFAULT_VERSION: &str = "1.0.0";
pub const DEFAULT_JAVA_VERSION: &str = "17";
pub const DEFAULT_SPRING_BOOT_VERSION: &str = "3.2.0";
pub const DEFAULT_OUTPUT_DIR: &str = "./output";
pub const DEFAULT_DATABASE: &str = "h2";
pub const DEFAULT_ORM: &str = "jpa";
pub const DEFAULT_CACHE: &str = "none";
pub const DEFAULT_MQ: &str = "none";
pub const DEFAULT_WEB_FRAMEWORK: &str = "spring-mvc";
pub const DEFAULT_TESTING: &str = "junit5";

pub const TEMPLATE_BASIC: &str = "spring-boot-basic";
pub const TEMPLATE_MICROSERVICE: &str = "spring-boot-microservice";
pub const TEMPLATE_WEB: &str = "spring-boot-web";

const MIGRATION_AUTHOR: &str = "Project Generator";
const MIGRATION_CREATOR: &str = "migration";

/// One parsed legacy file.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyConfig {
    pub file_name: String,
    pub stem: String,
    pub raw: Map<String, Value>,
}

/// Parse a legacy file: strict JSON first, then JSON5 for hand-edited files.
pub fn read_legacy(path: &Path) -> StoreResult<LegacyConfig> {
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let text = fs::read_to_string(path).map_err(|err| StoreError::io(path, err))?;

    let value = match serde_json::from_str::<Value>(&text) {
        Ok(value) => value,
        Err(strict_err) => json5::from_str::<Value>(&text).map_err(|_| StoreError::InvalidLegacy {
            file: file_name.clone(),
            reason: format!("not valid JSON: {strict_err}"),
        })?,
    };

    match value {
        Value::Object(raw) => Ok(LegacyConfig {
            file_name,
            stem,
            raw,
        }),
        _ => Err(StoreError::InvalidLegacy {
            file: file_name,
            reason: "top level is not an object".to_string(),
        }),
    }
}

/// Filename heuristic: `default` or `template` anywhere in the name marks a
/// template, everything else is history.
pub fn classify(file_name: &str) -> Scope {
    let lower = file_name.to_lowercase();
    if lower.contains("default") || lower.contains("template") {
        Scope::Template
    } else {
        Scope::History
    }
}

impl LegacyConfig {
    fn str_or(&self, key: &str, fallback: &str) -> Value {
        self.raw
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::String(fallback.to_string()))
    }

    fn bool_or(&self, key: &str, fallback: bool) -> Value {
        self.raw.get(key).cloned().unwrap_or(Value::Bool(fallback))
    }

    fn tech_stack(&self) -> Map<String, Value> {
        match self.raw.get("tech_stack") {
            Some(Value::Object(map)) => map.clone(),
            _ => Map::new(),
        }
    }

    pub fn is_multi_module(&self) -> bool {
        self.raw
            .get("multi_module")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn web_framework(&self) -> Option<&str> {
        self.raw
            .get("tech_stack")
            .and_then(|ts| ts.get("web_framework"))
            .and_then(Value::as_str)
    }

    /// Display name: `project_name`, else `name`, else empty.
    pub fn project_name(&self) -> &str {
        ["project_name", "name"]
            .into_iter()
            .filter_map(|key| self.raw.get(key).and_then(Value::as_str))
            .find(|name| !name.trim().is_empty())
            .unwrap_or("")
    }

    /// Legacy `name` when it disagrees with `project_name`.
    fn alternate_name(&self) -> Option<&str> {
        let project_name = self.raw.get("project_name").and_then(Value::as_str)?;
        let name = self.raw.get("name").and_then(Value::as_str)?;
        (name != project_name && !name.trim().is_empty()).then_some(name)
    }

    /// Reshape into the nested schema. Missing fields take fixed defaults;
    /// `cache` and `mq` are carried as-is (scalar or list).
    pub fn to_payload(&self) -> Payload {
        let mut project = Map::new();
        project.insert("name".to_string(), Value::String(self.project_name().to_string()));
        if let Some(alt) = self.alternate_name() {
            project.insert("display_name".to_string(), Value::String(alt.to_string()));
        }
        project.insert("package_name".to_string(), self.str_or("package_name", ""));
        project.insert("version".to_string(), self.str_or("version", DEFAULT_VERSION));
        project.insert("description".to_string(), self.str_or("description", ""));
        project.insert(
            "java_version".to_string(),
            self.str_or("java_version", DEFAULT_JAVA_VERSION),
        );
        project.insert(
            "spring_boot_version".to_string(),
            self.str_or("spring_boot_version", DEFAULT_SPRING_BOOT_VERSION),
        );
        if let Some(multi) = self.raw.get("multi_module") {
            project.insert("multi_module".to_string(), multi.clone());
        }

        let ts = self.tech_stack();
        let ts_or = |key: &str, fallback: Value| ts.get(key).cloned().unwrap_or(fallback);
        let tech_stack = json!({
            "database": ts_or("database", json!(DEFAULT_DATABASE)),
            "orm": ts_or("orm", json!(DEFAULT_ORM)),
            "cache": ts_or("cache", json!(DEFAULT_CACHE)),
            "mq": ts_or("mq", json!(DEFAULT_MQ)),
            "nosql": {
                "mongodb": ts_or("mongodb", json!(false)),
                "elasticsearch": ts_or("elasticsearch", json!(false)),
            },
            "documentation": ts_or("doc", json!(false)),
            "security": ts_or("security", json!(false)),
            "web_framework": ts_or("web_framework", json!(DEFAULT_WEB_FRAMEWORK)),
            "monitoring": {
                "actuator": ts_or("actuator", json!(false)),
            },
            "testing": ts_or("testing_framework", json!(DEFAULT_TESTING)),
        });

        let generation = json!({
            "output_dir": self.str_or("output_dir", DEFAULT_OUTPUT_DIR),
            "generate_examples": self.bool_or("generate_examples", true),
            "generate_tests": self.bool_or("generate_tests", true),
            "generate_docker": self.bool_or("generate_docker", true),
        });

        let mut out = Payload::new();
        out.insert("project".to_string(), Value::Object(project));
        out.insert("tech_stack".to_string(), tech_stack);
        out.insert("generation".to_string(), generation);
        if let Some(modules) = self.raw.get("modules") {
            out.insert("modules".to_string(), modules.clone());
        }
        out
    }

    pub fn template_id(&self) -> String {
        let lower = self.file_name.to_lowercase();
        if lower.contains("default") {
            TEMPLATE_BASIC.to_string()
        } else if lower.contains("template") {
            if self.is_multi_module() {
                TEMPLATE_MICROSERVICE.to_string()
            } else {
                TEMPLATE_WEB.to_string()
            }
        } else {
            self.stem.clone()
        }
    }

    pub fn template_metadata(&self) -> Metadata {
        let template_id = self.template_id();
        let (name, description) = match template_id.as_str() {
            TEMPLATE_BASIC => (
                "Spring Boot Basic Template".to_string(),
                "Baseline Spring Boot template for a single-module application".to_string(),
            ),
            TEMPLATE_MICROSERVICE => (
                "Spring Boot Microservice Template".to_string(),
                "Spring Boot template for a multi-module microservice layout".to_string(),
            ),
            TEMPLATE_WEB => (
                "Spring Boot Web Template".to_string(),
                "Spring Boot template for a web application".to_string(),
            ),
            other => (other.to_string(), "Spring Boot project template".to_string()),
        };
        let now = now_display_stamp();
        Metadata {
            name: Some(name),
            template_id: Some(template_id),
            version: Some(DEFAULT_VERSION.to_string()),
            description: Some(description),
            author: Some(MIGRATION_AUTHOR.to_string()),
            created_at: Some(now.clone()),
            updated_at: Some(now),
            ..Metadata::default()
        }
    }

    pub fn project_type(&self) -> &'static str {
        if self.is_multi_module() {
            "microservice"
        } else if self.web_framework() == Some("spring-webflux") {
            "reactive-web"
        } else {
            "monolith"
        }
    }

    pub fn history_metadata(&self) -> Metadata {
        let template_id = if self.is_multi_module() {
            TEMPLATE_MICROSERVICE
        } else {
            TEMPLATE_BASIC
        };
        Metadata {
            project_name: Some(self.stem.clone()),
            creator: Some(MIGRATION_CREATOR.to_string()),
            project_type: Some(self.project_type().to_string()),
            template_id: Some(template_id.to_string()),
            description: Some(format!("Migrated from {}", self.file_name)),
            ..Metadata::default()
        }
    }
}
