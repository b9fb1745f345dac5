//! Provider catalog.
//!
//! The registry is built once at startup and handed to every component that
//! needs it; it is immutable afterwards.

use std::collections::BTreeMap;
use std::path::Path;

use repscore_state::ProviderId;
use serde::{Deserialize, Serialize};

use crate::domain::category::Category;
use crate::domain::error::{RepScoreError, Result};

/// Static metadata for one provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub category: Category,
    /// Currency per compute unit, > 0.
    pub cost_per_unit: f64,
    #[serde(alias = "error_rate")]
    pub base_error_rate: f64,
    /// Seconds, > 0.
    #[serde(alias = "avg_latency")]
    pub base_avg_latency: f64,
    /// Starting score; falls back to the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_score: Option<f64>,
}

impl Provider {
    pub fn new(
        id: impl Into<String>,
        category: Category,
        cost_per_unit: f64,
        base_error_rate: f64,
        base_avg_latency: f64,
    ) -> Self {
        Self {
            id: ProviderId::new(id),
            category,
            cost_per_unit,
            base_error_rate,
            base_avg_latency,
            initial_score: None,
        }
    }

    pub fn with_initial_score(mut self, score: f64) -> Self {
        self.initial_score = Some(score);
        self
    }

    fn validate(&self) -> Result<()> {
        let field = |name: &str| format!("provider {}: {name}", self.id);
        if !(self.cost_per_unit.is_finite() && self.cost_per_unit > 0.0) {
            return Err(RepScoreError::config(field("cost_per_unit"), "must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.base_error_rate) {
            return Err(RepScoreError::config(field("error_rate"), "must be within [0, 1]"));
        }
        if !(self.base_avg_latency.is_finite() && self.base_avg_latency > 0.0) {
            return Err(RepScoreError::config(field("avg_latency"), "must be > 0"));
        }
        if let Some(score) = self.initial_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(RepScoreError::config(
                    field("initial_score"),
                    "must be within [0, 1]",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    providers: Vec<Provider>,
}

/// Immutable provider catalog keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<ProviderId, Provider>,
}

impl ProviderRegistry {
    /// Build a registry, rejecting duplicate ids and out-of-range metadata.
    pub fn new(providers: Vec<Provider>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for provider in providers {
            provider.validate()?;
            if map.contains_key(&provider.id) {
                return Err(RepScoreError::config(
                    "providers",
                    format!("duplicate provider id {}", provider.id),
                ));
            }
            map.insert(provider.id.clone(), provider);
        }
        Ok(Self { providers: map })
    }

    /// The six reference servers with their seeded starting scores.
    pub fn reference_catalog() -> Self {
        let providers = vec![
            Provider::new("compute_server_1", Category::MathCompute, 0.005, 0.15, 0.3)
                .with_initial_score(0.85),
            Provider::new("data_server_2", Category::DataRetrieval, 0.001, 0.05, 0.2)
                .with_initial_score(0.95),
            Provider::new("low_score_server_3", Category::MathCompute, 0.0005, 0.40, 0.1),
            Provider::new("image_fast_4", Category::ImageGen, 0.05, 0.10, 0.5)
                .with_initial_score(0.88),
            Provider::new("image_cheap_5", Category::ImageGen, 0.008, 0.30, 1.5)
                .with_initial_score(0.65),
            Provider::new("semantic_db_6", Category::SemanticSearch, 0.003, 0.01, 0.15)
                .with_initial_score(0.92),
        ];
        Self {
            providers: providers.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Parse a `[[providers]]` TOML catalog.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(raw).map_err(|e| RepScoreError::config("catalog", e.to_string()))?;
        Self::new(file.providers)
    }

    /// Parse a `{ "providers": [...] }` JSON catalog.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(raw)
            .map_err(|e| RepScoreError::config("catalog", e.to_string()))?;
        Self::new(file.providers)
    }

    /// Load a catalog file; `.json` is parsed as JSON, anything else as TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_toml_str(&raw),
        }
    }

    pub fn get(&self, id: &ProviderId) -> Option<&Provider> {
        self.providers.get(id)
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.providers.contains_key(id)
    }

    /// All providers, ordered by id.
    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.values()
    }

    /// Providers serving `category`, ordered by id.
    pub fn by_category(&self, category: Category) -> Vec<&Provider> {
        self.iter().filter(|p| p.category == category).collect()
    }

    /// Mean declared unit cost for a category.
    pub fn average_cost(&self, category: Category) -> Option<f64> {
        let costs: Vec<f64> = self
            .by_category(category)
            .iter()
            .map(|p| p.cost_per_unit)
            .collect();
        if costs.is_empty() {
            None
        } else {
            Some(costs.iter().sum::<f64>() / costs.len() as f64)
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_catalog_shape() {
        let registry = ProviderRegistry::reference_catalog();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.by_category(Category::MathCompute).len(), 2);
        assert!(registry.by_category(Category::Reasoning).is_empty());
        let data = registry.get(&ProviderId::from("data_server_2")).unwrap();
        assert_eq!(data.initial_score, Some(0.95));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let p = Provider::new("dup", Category::Reasoning, 0.01, 0.1, 0.2);
        let err = ProviderRegistry::new(vec![p.clone(), p]).unwrap_err();
        assert!(matches!(err, RepScoreError::Configuration { .. }));
    }

    #[test]
    fn test_non_positive_cost_rejected() {
        let p = Provider::new("free", Category::Reasoning, 0.0, 0.1, 0.2);
        assert!(ProviderRegistry::new(vec![p]).is_err());
    }

    #[test]
    fn test_toml_catalog_accepts_short_field_names() {
        let raw = r#"
            [[providers]]
            id = "reasoner_a"
            category = "REASONING"
            cost_per_unit = 0.002
            error_rate = 0.05
            avg_latency = 0.4
            initial_score = 0.8
        "#;
        let registry = ProviderRegistry::from_toml_str(raw).unwrap();
        let p = registry.get(&ProviderId::from("reasoner_a")).unwrap();
        assert_eq!(p.category, Category::Reasoning);
        assert_eq!(p.base_error_rate, 0.05);
        assert_eq!(p.initial_score, Some(0.8));
    }

    #[test]
    fn test_unknown_category_in_catalog_is_rejected() {
        let raw = r#"{ "providers": [ { "id": "x", "category": "VIDEO", "cost_per_unit": 1.0,
            "error_rate": 0.1, "avg_latency": 0.1 } ] }"#;
        assert!(ProviderRegistry::from_json_str(raw).is_err());
    }

    #[test]
    fn test_average_cost() {
        let registry = ProviderRegistry::reference_catalog();
        let avg = registry.average_cost(Category::ImageGen).unwrap();
        assert!((avg - 0.029).abs() < 1e-12);
        assert!(registry.average_cost(Category::Reasoning).is_none());
    }
}
