//! Keyword lookup over template and history headers. No index is kept: every
//! call lists the requested scopes afresh.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::StoreResult;
use crate::store::document::{DocumentSummary, Scope};
use crate::store::scoped::ScopedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchFilter {
    #[default]
    All,
    Template,
    History,
}

impl SearchFilter {
    fn includes(self, scope: Scope) -> bool {
        match self {
            SearchFilter::All => true,
            SearchFilter::Template => scope == Scope::Template,
            SearchFilter::History => scope == Scope::History,
        }
    }
}

impl fmt::Display for SearchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchFilter::All => "all",
            SearchFilter::Template => "template",
            SearchFilter::History => "history",
        })
    }
}

impl FromStr for SearchFilter {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "all" | "" => Ok(SearchFilter::All),
            "template" | "templates" => Ok(SearchFilter::Template),
            "history" | "histories" => Ok(SearchFilter::History),
            other => Err(format!(
                "unknown search scope `{other}`; use `all`, `template` or `history`"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchResults {
    pub templates: Vec<DocumentSummary>,
    pub histories: Vec<DocumentSummary>,
}

impl SearchResults {
    pub fn total(&self) -> usize {
        self.templates.len() + self.histories.len()
    }
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

fn matches(summary: &DocumentSummary, needle_lower: &str) -> bool {
    let secondary = match summary.scope {
        Scope::History => summary.metadata.project_type.as_deref(),
        Scope::System | Scope::Template => summary.metadata.description.as_deref(),
    };
    contains_ci(summary.display_name(), needle_lower)
        || secondary.is_some_and(|text| contains_ci(text, needle_lower))
}

/// Case-insensitive substring match on `{name, description}` for templates
/// and `{project_name, project_type}` for histories. Results keep listing
/// order (newest first).
pub fn search(
    templates: &ScopedStore,
    histories: &ScopedStore,
    keyword: &str,
    filter: SearchFilter,
) -> StoreResult<SearchResults> {
    let needle = keyword.trim().to_lowercase();
    let mut out = SearchResults::default();

    if filter.includes(Scope::Template) {
        out.templates = templates
            .list(None)?
            .into_iter()
            .filter(|summary| matches(summary, &needle))
            .collect();
    }
    if filter.includes(Scope::History) {
        out.histories = histories
            .list(None)?
            .into_iter()
            .filter(|summary| matches(summary, &needle))
            .collect();
    }

    Ok(out)
}
