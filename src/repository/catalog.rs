use std::collections::HashSet;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::domain::assessment::{CatalogDocument, RawAssessment};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog record {position} is invalid: {reason}")]
    InvalidRecord { position: usize, reason: String },
}

/// Read the scraped catalog file and validate every record.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogDocument>, CatalogError> {
    let raw = fs::read(path)?;
    parse_catalog(&raw)
}

/// Parse a JSON array of catalog records.
///
/// Records sharing a url are collapsed to the first occurrence.
pub fn parse_catalog(raw: &[u8]) -> Result<Vec<CatalogDocument>, CatalogError> {
    let records: Vec<RawAssessment> = serde_json::from_slice(raw)?;
    let total = records.len();

    let mut seen = HashSet::new();
    let mut documents = Vec::with_capacity(total);
    for (position, record) in records.into_iter().enumerate() {
        let document = CatalogDocument::try_from(record)
            .map_err(|reason| CatalogError::InvalidRecord { position, reason })?;
        if !seen.insert(document.url.clone()) {
            log::warn!("Skipping duplicate catalog url {}", document.url);
            continue;
        }
        documents.push(document);
    }

    log::info!("Loaded {} catalog documents ({total} records)", documents.len());
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::assessment::SupportFlag;

    #[test]
    fn parses_records_with_defaults() {
        let raw = br#"[
            {"name": "Java 8", "url": "https://x.com/view/java-8/", "description": "Java test",
             "test_type": ["Knowledge & Skills"]},
            {"name": "OPQ32r", "url": "https://x.com/view/opq32r/", "description": "Personality",
             "duration": 25, "adaptive_support": "Yes", "remote_support": "No",
             "test_type": ["Personality & Behavior", "Personality"]}
        ]"#;

        let documents = parse_catalog(raw).expect("catalog should parse");

        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].duration, 30);
        assert_eq!(documents[1].duration, 25);
        assert_eq!(documents[1].adaptive_support, SupportFlag::Yes);
        assert_eq!(documents[1].remote_support, SupportFlag::No);
        assert!(documents[1].has_test_type("Personality"));
    }

    #[test]
    fn duplicate_urls_keep_first_record() {
        let raw = br#"[
            {"name": "First", "url": "https://x.com/view/a/", "description": "one"},
            {"name": "Second", "url": "https://x.com/view/a/", "description": "two"}
        ]"#;

        let documents = parse_catalog(raw).expect("catalog should parse");

        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].name, "First");
    }

    #[test]
    fn record_without_name_reports_position() {
        let raw = br#"[
            {"name": "First", "url": "https://x.com/view/a/"},
            {"url": "https://x.com/view/b/"}
        ]"#;

        let error = parse_catalog(raw).expect_err("second record is invalid");

        assert!(matches!(error, CatalogError::InvalidRecord { position: 1, .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(parse_catalog(b"{"), Err(CatalogError::Parse(_))));
    }
}
