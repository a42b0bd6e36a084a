//! Food records and the data source seam.

use crate::error::Result;
use crate::state::Macros;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const BUILTIN_CATALOG: &str = include_str!("../../data/foods.json");

/// Where a food record came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FoodSource {
    /// Authoritative nutrition database
    Usda,
    /// Crowd-sourced
    OpenFoodFacts,
    Custom,
}

impl FoodSource {
    pub fn label(&self) -> &'static str {
        match self {
            FoodSource::Usda => "USDA",
            FoodSource::OpenFoodFacts => "Open Food Facts",
            FoodSource::Custom => "Custom",
        }
    }
}

/// Macros are per `serving_size_g`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodItem {
    pub id: String,
    pub name: String,
    pub brand: Option<String>,
    pub category: String,
    pub serving_size_g: f64,
    pub macros: Macros,
    pub source: FoodSource,
    pub verified: bool,
}

impl FoodItem {
    /// Protein grams per kcal; zero-calorie foods rank by protein alone
    pub fn protein_density(&self) -> f64 {
        if self.macros.calories > 0.0 {
            self.macros.protein / self.macros.calories
        } else {
            self.macros.protein
        }
    }

    /// Macros for `grams`, scaled linearly from the reference serving
    pub fn macros_for(&self, grams: f64) -> Macros {
        if self.serving_size_g <= 0.0 {
            return self.macros;
        }
        self.macros.scaled(grams / self.serving_size_g)
    }

    pub fn matches(&self, terms: &[String]) -> bool {
        let haystack = format!(
            "{} {} {}",
            self.name,
            self.brand.as_deref().unwrap_or_default(),
            self.category
        )
        .to_lowercase();
        terms.iter().all(|t| haystack.contains(t.as_str()))
    }
}

#[async_trait]
pub trait FoodDataSource: Send + Sync {
    /// Free-text lookup; ordering is up to the source
    async fn search(&self, query: &str) -> Result<Vec<FoodItem>>;

    async fn get(&self, id: &str) -> Result<Option<FoodItem>>;
}

/// Catalog held in memory, seeded from the bundled food list
pub struct InMemoryFoodDatabase {
    foods: Vec<FoodItem>,
}

impl InMemoryFoodDatabase {
    pub fn new(foods: Vec<FoodItem>) -> Self {
        Self { foods }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn len(&self) -> usize {
        self.foods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.foods.is_empty()
    }
}

#[async_trait]
impl FoodDataSource for InMemoryFoodDatabase {
    async fn search(&self, query: &str) -> Result<Vec<FoodItem>> {
        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Ok(self
            .foods
            .iter()
            .filter(|f| f.matches(&terms))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<FoodItem>> {
        Ok(self.foods.iter().find(|f| f.id == id).cloned())
    }
}
