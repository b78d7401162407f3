use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::store::codec::{Metadata, Payload, SkippedBlock};

/// Filename stem of the single System document.
pub const SYSTEM_ID: &str = "system";

/// Extension shared by every persisted document.
pub const DOCUMENT_EXT: &str = "md";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    System,
    Template,
    History,
}

impl Scope {
    pub const ALL: [Scope; 3] = [Scope::System, Scope::Template, Scope::History];

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::System => "system",
            Scope::Template => "template",
            Scope::History => "history",
        }
    }

    /// Directory name of this scope under the store root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Scope::System => "system",
            Scope::Template => "templates",
            Scope::History => "history",
        }
    }

    /// Substitute used by the sanitizer when an id cleans down to nothing.
    pub fn fallback_id(self) -> &'static str {
        match self {
            Scope::System => SYSTEM_ID,
            Scope::Template => "template",
            Scope::History => "config",
        }
    }

    /// Scopes whose ids are chosen by the caller (or fixed) rather than
    /// synthesized per save. Only these carry a revision counter.
    pub fn has_stable_ids(self) -> bool {
        !matches!(self, Scope::History)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Scope::System),
            "template" | "templates" => Ok(Scope::Template),
            "history" | "histories" => Ok(Scope::History),
            other => Err(format!(
                "unknown scope `{other}`; use `system`, `template` or `history`"
            )),
        }
    }
}

/// A fully loaded document: identity, decoded metadata and payload, and any
/// blocks the codec had to skip while reading it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigDocument {
    pub id: String,
    pub scope: Scope,
    pub metadata: Metadata,
    pub payload: Payload,
    pub skipped: Vec<SkippedBlock>,
    pub path: PathBuf,
}

/// Listing entry: metadata only, payload is not parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub scope: Scope,
    pub metadata: Metadata,
    pub path: PathBuf,
}

impl DocumentSummary {
    /// Human label: the template name or history project name, falling back
    /// to the id when the header does not carry one.
    pub fn display_name(&self) -> &str {
        let named = match self.scope {
            Scope::History => self.metadata.project_name.as_deref(),
            Scope::System | Scope::Template => self.metadata.name.as_deref(),
        };
        named
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.id)
    }

    pub fn created_at(&self) -> &str {
        self.metadata.created_at.as_deref().unwrap_or("")
    }
}

/// Where a save landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedDocument {
    pub id: String,
    pub scope: Scope,
    pub path: PathBuf,
    pub revision: Option<u64>,
}
