//! Target listing projection.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Projection of one remote listing record, reduced to the fields needed for filtering and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TargetSummary {
    /// Opaque target identifier used for detail and signup calls
    #[serde(default)]
    pub slug: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Category name, `null` when the record carries none
    #[serde(default)]
    pub category: Option<String>,
}

impl TargetSummary {
    /// Project a raw listing record.
    ///
    /// `category` comes from the nested `category.name`; missing string fields become empty.
    pub fn from_record(record: &Value) -> Self {
        let text = |key: &str| {
            record
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            slug: text("slug"),
            name: text("name"),
            category: record
                .get("category")
                .and_then(|category| category.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }

    /// Name used in log lines, falling back to the slug.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.slug
        } else {
            &self.name
        }
    }

    /// Whether this target's category is one the caller holds.
    pub fn is_eligible<S: AsRef<str>>(&self, eligible: &[S]) -> bool {
        self.category
            .as_deref()
            .is_some_and(|category| eligible.iter().any(|e| e.as_ref() == category))
    }
}
