//! Helpers for integration tests.

use assessment_recommender::domain::assessment::CatalogDocument;
use assessment_recommender::processing::embedding::{
    Embedder, EmbeddingResult, normalize_embedding, validate_input,
};

const VOCABULARY: &[&str] = &[
    "java", "python", "sql", "sales", "personality", "behavior", "team", "leadership",
    "numerical", "verbal", "developer", "manager",
];

/// Deterministic bag-of-words embedder over a fixed vocabulary.
///
/// The last dimension is a constant bias so that no text maps to the zero
/// vector.
pub struct BagOfWordsEmbedder;

impl Embedder for BagOfWordsEmbedder {
    fn dimension(&self) -> usize {
        VOCABULARY.len() + 1
    }

    fn max_input_chars(&self) -> usize {
        500
    }

    fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        validate_input(text, self.max_input_chars())?;
        let mut vector = vec![0.0_f32; self.dimension()];
        for word in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|word| !word.is_empty())
        {
            if let Some(position) = VOCABULARY.iter().position(|known| *known == word) {
                vector[position] += 1.0;
            }
        }
        vector[VOCABULARY.len()] = 0.1;
        Ok(normalize_embedding(&vector))
    }
}

pub fn sample_catalog() -> Vec<CatalogDocument> {
    vec![
        CatalogDocument::new(
            "https://www.shl.com/solutions/products/product-catalog/view/core-java/",
            "Core Java",
            "Multi-choice test measuring java developer knowledge.",
        ),
        CatalogDocument::new(
            "https://www.shl.com/solutions/products/product-catalog/view/opq32r/",
            "OPQ32r",
            "Occupational personality questionnaire covering team behavior.",
        )
        .with_duration(25)
        .with_test_types(["Personality"]),
        CatalogDocument::new(
            "https://www.shl.com/solutions/products/product-catalog/view/sql-server/",
            "SQL Server",
            "Knowledge of sql queries for developer roles.",
        ),
        CatalogDocument::new(
            "https://www.shl.com/solutions/products/product-catalog/view/python-new/",
            "Python (New)",
            "Python developer knowledge test.",
        ),
        CatalogDocument::new(
            "https://www.shl.com/solutions/products/product-catalog/view/sales-profiler/",
            "Sales Profiler",
            "Behavior and personality fit for sales roles.",
        )
        .with_test_types(["Personality", "Competencies"]),
        CatalogDocument::new(
            "https://www.shl.com/solutions/products/product-catalog/view/verify-numerical/",
            "Verify Numerical",
            "Numerical reasoning for manager roles.",
        )
        .with_test_types(["Ability & Aptitude"]),
        CatalogDocument::new(
            "https://www.shl.com/solutions/products/product-catalog/view/java-team-lead/",
            "Java Team Lead",
            "Java leadership simulation for team managers.",
        )
        .with_test_types(["Simulations"]),
    ]
}
