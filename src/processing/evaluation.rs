//! Offline Recall@K evaluation against labeled queries.
//!
//! URLs are compared by slug only, so predictions still match when the
//! catalog was crawled under a different domain or path prefix.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::DEFAULT_TOP_K;

#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("failed to read labeled queries from {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid labeled queries: {0}")]
    Csv(#[from] csv::Error),
}

/// One labeled CSV row: a query and one relevant assessment url.
#[derive(Clone, Debug, Deserialize)]
pub struct LabeledRow {
    #[serde(rename = "Query", alias = "query")]
    pub query: String,
    #[serde(rename = "Assessment_url", alias = "assessment_url")]
    pub assessment_url: String,
}

/// A query with every relevant url gathered from the labeled rows.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationCase {
    pub query: String,
    pub relevant_urls: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QueryScore {
    pub query: String,
    pub recall: f64,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EvaluationReport {
    pub scores: Vec<QueryScore>,
    pub failed: usize,
}

impl EvaluationReport {
    pub fn mean_recall(&self) -> f64 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().map(|score| score.recall).sum::<f64>() / self.scores.len() as f64
    }
}

/// Last non-empty path segment of `url`.
///
/// Strings that do not parse as absolute URLs are split on `/` directly.
pub fn slug(url: &str) -> String {
    let trimmed = url.trim();
    if let Ok(parsed) = Url::parse(trimmed)
        && let Some(segments) = parsed.path_segments()
        && let Some(last) = segments.filter(|segment| !segment.is_empty()).last()
    {
        return last.to_string();
    }
    trimmed
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Fraction of distinct ground-truth slugs found among the first `k`
/// predictions. Returns `0.0` when there is no ground truth.
pub fn recall_at_k<P, T>(predictions: &[P], ground_truth: &[T], k: usize) -> f64
where
    P: AsRef<str>,
    T: AsRef<str>,
{
    let truth: HashSet<String> = ground_truth
        .iter()
        .map(|url| slug(url.as_ref()))
        .filter(|slug| !slug.is_empty())
        .collect();
    if truth.is_empty() {
        return 0.0;
    }

    let predicted: HashSet<String> = predictions
        .iter()
        .take(k)
        .map(|url| slug(url.as_ref()))
        .collect();

    truth.intersection(&predicted).count() as f64 / truth.len() as f64
}

/// Group labeled rows by query, keeping queries in first-appearance order.
pub fn group_rows(rows: Vec<LabeledRow>) -> Vec<EvaluationCase> {
    let mut cases: Vec<EvaluationCase> = Vec::new();
    for row in rows {
        let query = row.query.trim().to_string();
        if query.is_empty() {
            continue;
        }
        match cases.iter_mut().find(|case| case.query == query) {
            Some(case) => case.relevant_urls.push(row.assessment_url),
            None => cases.push(EvaluationCase {
                query,
                relevant_urls: vec![row.assessment_url],
            }),
        }
    }
    cases
}

/// Read the labeled CSV at `path` (columns `Query`, `Assessment_url`).
pub fn load_cases(path: &Path) -> Result<Vec<EvaluationCase>, EvaluationError> {
    let file = File::open(path).map_err(|source| EvaluationError::Io {
        path: path.display().to_string(),
        source,
    })?;
    read_cases(file)
}

/// Parse labeled CSV rows from any reader and group them by query.
pub fn read_cases<R: Read>(reader: R) -> Result<Vec<EvaluationCase>, EvaluationError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let rows = reader
        .deserialize::<LabeledRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(group_rows(rows))
}

/// Score every case with `recommend`, which returns predicted urls in rank
/// order. A failing query scores zero.
pub fn evaluate<F, E>(cases: &[EvaluationCase], mut recommend: F) -> EvaluationReport
where
    F: FnMut(&str) -> Result<Vec<String>, E>,
    E: std::fmt::Display,
{
    let mut report = EvaluationReport::default();

    for (position, case) in cases.iter().enumerate() {
        let recall = match recommend(&case.query) {
            Ok(predictions) => {
                let recall = recall_at_k(&predictions, &case.relevant_urls, DEFAULT_TOP_K);
                if recall == 0.0 {
                    log::debug!(
                        "Query {}: wanted {:?}, found {:?}",
                        position + 1,
                        case.relevant_urls.iter().take(3).map(|url| slug(url)).collect::<Vec<_>>(),
                        predictions.iter().take(3).map(|url| slug(url)).collect::<Vec<_>>()
                    );
                }
                recall
            }
            Err(e) => {
                log::warn!("Query {} failed: {e}", position + 1);
                report.failed += 1;
                0.0
            }
        };
        log::info!("Query {}: Recall@{DEFAULT_TOP_K} = {recall:.2}", position + 1);
        report.scores.push(QueryScore {
            query: case.query.clone(),
            recall,
        });
    }

    report
}
