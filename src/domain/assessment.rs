use serde::{Deserialize, Serialize};

use crate::ELLIPSIS;

/// Test type assigned to records that arrive without any category label.
pub const DEFAULT_TEST_TYPE: &str = "Knowledge & Skills";

/// Duration in minutes assumed when the catalog omits one.
pub const DEFAULT_DURATION: u32 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupportFlag {
    Yes,
    No,
}

/// Catalog record as it appears in the scraped JSON file.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawAssessment {
    pub name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub duration: Option<u32>,
    pub adaptive_support: Option<SupportFlag>,
    pub remote_support: Option<SupportFlag>,
    #[serde(default)]
    pub test_type: Vec<String>,
}

/// Validated catalog entry stored alongside its vector in the index.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub url: String,
    pub name: String,
    pub description: String,
    pub duration: u32,
    pub adaptive_support: SupportFlag,
    pub remote_support: SupportFlag,
    pub test_type: Vec<String>,
}

impl CatalogDocument {
    /// Build a document from its mandatory fields, applying catalog defaults
    /// for everything else.
    pub fn new(url: impl Into<String>, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            description: description.into(),
            duration: DEFAULT_DURATION,
            adaptive_support: SupportFlag::No,
            remote_support: SupportFlag::Yes,
            test_type: vec![DEFAULT_TEST_TYPE.to_string()],
        }
    }

    pub fn with_duration(mut self, duration: u32) -> Self {
        self.duration = duration;
        self
    }

    /// Replace the test types. An empty list falls back to the default label
    /// and repeated labels are collapsed.
    pub fn with_test_types<I, S>(mut self, test_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.test_type = normalize_test_types(test_types.into_iter().map(Into::into));
        self
    }

    pub fn has_test_type(&self, label: &str) -> bool {
        self.test_type.iter().any(|value| value == label)
    }

    /// Text fed to the embedder for this document.
    pub fn embedding_text(&self) -> String {
        let test_types = self.test_type.join(", ");
        format!(
            "Name: {}. Description: {}. Type: {test_types}",
            self.name, self.description
        )
    }
}

impl TryFrom<RawAssessment> for CatalogDocument {
    type Error = String;

    fn try_from(raw: RawAssessment) -> Result<Self, Self::Error> {
        let url = required_field(raw.url, "url")?;
        let name = required_field(raw.name, "name")?;
        let description = raw
            .description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("Assessment for {name}"));

        Ok(Self {
            url,
            name,
            description,
            duration: raw.duration.unwrap_or(DEFAULT_DURATION),
            adaptive_support: raw.adaptive_support.unwrap_or(SupportFlag::No),
            remote_support: raw.remote_support.unwrap_or(SupportFlag::Yes),
            test_type: normalize_test_types(raw.test_type),
        })
    }
}

fn required_field(value: Option<String>, field: &str) -> Result<String, String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| format!("missing `{field}`"))
}

fn normalize_test_types<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut test_types: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !test_types.iter().any(|existing| existing == value) {
            test_types.push(value.to_string());
        }
    }
    if test_types.is_empty() {
        test_types.push(DEFAULT_TEST_TYPE.to_string());
    }
    test_types
}

/// Single entry of a recommendation response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub url: String,
    pub name: String,
    pub description: String,
    pub duration: u32,
    pub test_type: Vec<String>,
}

impl RecommendationResult {
    pub fn from_document(document: &CatalogDocument, description_limit: usize) -> Self {
        Self {
            url: document.url.clone(),
            name: document.name.clone(),
            description: truncate_description(&document.description, description_limit),
            duration: document.duration,
            test_type: document.test_type.clone(),
        }
    }

    pub fn has_test_type(&self, label: &str) -> bool {
        self.test_type.iter().any(|value| value == label)
    }
}

/// Cut `text` to at most `limit` characters, appending [`ELLIPSIS`] only when
/// something was removed.
pub fn truncate_description(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => format!("{}{ELLIPSIS}", &text[..byte_index]),
        None => text.to_string(),
    }
}
