//! Closed set of task kinds a provider can serve.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::RepScoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    MathCompute,
    DataRetrieval,
    Reasoning,
    ImageGen,
    SemanticSearch,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::MathCompute,
        Category::DataRetrieval,
        Category::Reasoning,
        Category::ImageGen,
        Category::SemanticSearch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MathCompute => "MATH_COMPUTE",
            Category::DataRetrieval => "DATA_RETRIEVAL",
            Category::Reasoning => "REASONING",
            Category::ImageGen => "IMAGE_GEN",
            Category::SemanticSearch => "SEMANTIC_SEARCH",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RepScoreError;

    /// Accepts `MATH_COMPUTE`, `math_compute`, or `math-compute`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| RepScoreError::config("category", format!("unrecognized value {s:?}")))
    }
}
