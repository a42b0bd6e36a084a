//! Tool Executor - the coach model's closed set of operations
//!
//! Each call resolves to a [`ToolResult`]. Unknown tools, bad arguments and
//! missing foods come back as `success: false` with an error message.

pub mod definitions;
pub mod food;
pub mod knowledge;
pub mod search_guard;

pub use definitions::{ToolCall, ToolResult, get_available_tools, parse_tool_calls};
pub use food::{FoodDataSource, FoodItem, FoodSource, InMemoryFoodDatabase};
pub use search_guard::DebouncedSearch;

use crate::context::defaults::resolve_targets;
use crate::error::{CoachError, Result};
use crate::state::{FoodEntry, Macros, MealType, UserStore};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoodFilters {
    pub verified_only: bool,
    pub min_protein: Option<f64>,
    pub max_calories: Option<f64>,
    pub max_carbs: Option<f64>,
    pub max_fat: Option<f64>,
    pub category: Option<String>,
}

impl FoodFilters {
    pub fn accepts(&self, food: &FoodItem) -> bool {
        (!self.verified_only || food.verified)
            && self.min_protein.is_none_or(|min| food.macros.protein >= min)
            && self.max_calories.is_none_or(|max| food.macros.calories <= max)
            && self.max_carbs.is_none_or(|max| food.macros.carbs <= max)
            && self.max_fat.is_none_or(|max| food.macros.fat <= max)
            && self
                .category
                .as_deref()
                .is_none_or(|c| food.category.eq_ignore_ascii_case(c))
    }
}

/// Filter, then verified first, then protein density descending, then truncate
pub fn rank_foods(foods: Vec<FoodItem>, filters: &FoodFilters, limit: usize) -> Vec<FoodItem> {
    let mut foods: Vec<FoodItem> = foods.into_iter().filter(|f| filters.accepts(f)).collect();
    foods.sort_by(|a, b| {
        b.verified
            .cmp(&a.verified)
            .then_with(|| b.protein_density().total_cmp(&a.protein_density()))
    });
    foods.truncate(limit);
    foods
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Boundaries at 05:00, 12:00, 17:00 and 21:00
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => TimeOfDay::Morning,
            12..=16 => TimeOfDay::Afternoon,
            17..=20 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn default_meal(&self) -> MealType {
        match self {
            TimeOfDay::Morning => MealType::Breakfast,
            TimeOfDay::Afternoon => MealType::Lunch,
            TimeOfDay::Evening => MealType::Dinner,
            TimeOfDay::Night => MealType::Snack,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserStatus {
    pub date: NaiveDate,
    pub time: NaiveDateTime,
    pub time_of_day: TimeOfDay,
    pub consumed: Macros,
    pub targets: Macros,
    pub targets_estimated: bool,
    /// Never negative
    pub remaining: Macros,
    pub steps: u32,
    pub meals_logged: usize,
}

#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub max_results: usize,
    pub default_portion_g: f64,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            max_results: 5,
            default_portion_g: 100.0,
        }
    }
}

pub struct ToolExecutor {
    foods: Arc<dyn FoodDataSource>,
    store: Arc<UserStore>,
    settings: ToolSettings,
}

fn invalid(tool: &str, reason: impl Into<String>) -> CoachError {
    CoachError::InvalidArguments {
        tool: tool.to_string(),
        reason: reason.into(),
    }
}

fn required_str<'a>(call: &'a ToolCall, key: &str) -> Result<&'a str> {
    call.arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| invalid(&call.name, format!("missing string argument '{}'", key)))
}

fn optional_str<'a>(call: &'a ToolCall, key: &str) -> Option<&'a str> {
    call.arguments.get(key).and_then(|v| v.as_str())
}

fn optional_f64(call: &ToolCall, key: &str) -> Option<f64> {
    call.arguments.get(key).and_then(|v| v.as_f64())
}

impl ToolExecutor {
    pub fn new(foods: Arc<dyn FoodDataSource>, store: Arc<UserStore>, settings: ToolSettings) -> Self {
        Self {
            foods,
            store,
            settings,
        }
    }

    /// Run one tool call; never fails, errors are folded into the result
    pub async fn execute(&self, call: &ToolCall) -> ToolResult {
        debug!(tool = %call.name, id = %call.id, "Executing tool");
        match self.dispatch(call).await {
            Ok(data) => ToolResult::ok(&call.id, data),
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                ToolResult::failure(&call.id, e.to_string())
            }
        }
    }

    async fn dispatch(&self, call: &ToolCall) -> Result<serde_json::Value> {
        match call.name.as_str() {
            definitions::SEARCH_FOOD_DATABASE => {
                let query = required_str(call, "query")?;
                let filters = FoodFilters {
                    verified_only: call
                        .arguments
                        .get("verified_only")
                        .and_then(|v| v.as_bool())
                        .unwrap_or(false),
                    min_protein: optional_f64(call, "min_protein"),
                    max_calories: optional_f64(call, "max_calories"),
                    max_carbs: optional_f64(call, "max_carbs"),
                    max_fat: optional_f64(call, "max_fat"),
                    category: optional_str(call, "category").map(str::to_string),
                };
                let foods = self.search_food_database(query, &filters).await?;
                Ok(serde_json::to_value(foods)?)
            }
            definitions::GET_USER_STATUS => Ok(serde_json::to_value(self.get_user_status())?),
            definitions::LOG_VERIFIED_FOOD => {
                let food_id = required_str(call, "food_id")?;
                let meal_type = match optional_str(call, "meal_type") {
                    Some(raw) => Some(
                        MealType::parse(raw)
                            .ok_or_else(|| invalid(&call.name, format!("unknown meal type '{}'", raw)))?,
                    ),
                    None => None,
                };
                let entry = self
                    .log_verified_food(food_id, optional_f64(call, "portion_grams"), meal_type)
                    .await?;
                Ok(serde_json::to_value(entry)?)
            }
            definitions::GET_FOOD_DETAILS => {
                let food = self.get_food_details(required_str(call, "food_id")?).await?;
                Ok(serde_json::to_value(food)?)
            }
            definitions::SEARCH_FITNESS_KNOWLEDGE => {
                let entries = knowledge::search(
                    required_str(call, "query")?,
                    optional_str(call, "category"),
                );
                Ok(serde_json::to_value(entries)?)
            }
            other => Err(CoachError::UnknownTool(other.to_string())),
        }
    }

    pub async fn search_food_database(&self, query: &str, filters: &FoodFilters) -> Result<Vec<FoodItem>> {
        let candidates = self.foods.search(query).await?;
        let found = candidates.len();
        let ranked = rank_foods(candidates, filters, self.settings.max_results);
        debug!(query, found, returned = ranked.len(), "Food search");
        Ok(ranked)
    }

    pub async fn get_food_details(&self, food_id: &str) -> Result<FoodItem> {
        self.foods
            .get(food_id)
            .await?
            .ok_or_else(|| CoachError::FoodNotFound(food_id.to_string()))
    }

    /// Log `portion_grams` of a catalog food against today.
    ///
    /// Missing or non-positive portions use the default portion; a missing
    /// meal type is taken from the time of day.
    pub async fn log_verified_food(
        &self,
        food_id: &str,
        portion_grams: Option<f64>,
        meal_type: Option<MealType>,
    ) -> Result<FoodEntry> {
        let food = self.get_food_details(food_id).await?;
        let portion = portion_grams
            .filter(|p| *p > 0.0)
            .unwrap_or(self.settings.default_portion_g);
        let now = self.store.now();
        let entry = FoodEntry {
            id: uuid::Uuid::new_v4().to_string(),
            food_id: Some(food.id.clone()),
            name: food.name.clone(),
            meal_type: meal_type.unwrap_or_else(|| TimeOfDay::from_hour(now.hour()).default_meal()),
            portion_grams: portion,
            macros: food.macros_for(portion),
            logged_at: now,
        };

        if !self.store.log_food(entry.clone()) {
            return Err(CoachError::Storage(format!("could not log {}", food.name)));
        }
        info!(food = %food.name, grams = portion, calories = entry.macros.calories, "Food logged");
        Ok(entry)
    }

    pub fn get_user_status(&self) -> UserStatus {
        let now = self.store.now();
        let log = self.store.today_log();
        let stored_targets = self.store.targets();
        let targets = resolve_targets(stored_targets.as_ref());
        let consumed = log.as_ref().map(|l| l.consumed).unwrap_or_default();

        UserStatus {
            date: now.date(),
            time: now,
            time_of_day: TimeOfDay::from_hour(now.hour()),
            consumed,
            targets,
            targets_estimated: stored_targets.is_none(),
            remaining: targets.remaining_after(&consumed),
            steps: log.as_ref().map_or(0, |l| l.steps),
            meals_logged: log.as_ref().map_or(0, |l| l.meal_totals().len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;

    fn food(id: &str, calories: f64, protein: f64, verified: bool) -> FoodItem {
        FoodItem {
            id: id.to_string(),
            name: format!("Food {id}"),
            brand: None,
            category: "test".to_string(),
            serving_size_g: 100.0,
            macros: Macros::new(calories, protein, 10.0, 5.0),
            source: if verified { FoodSource::Usda } else { FoodSource::OpenFoodFacts },
            verified,
        }
    }

    fn executor_at(hour: u32, foods: Vec<FoodItem>) -> (ToolExecutor, Arc<UserStore>) {
        let now = chrono::NaiveDate::from_ymd_opt(2026, 6, 10)
            .unwrap()
            .and_hms_opt(hour, 30, 0)
            .unwrap();
        let store = Arc::new(UserStore::new(Arc::new(FixedClock::new(now))));
        let db = Arc::new(InMemoryFoodDatabase::new(foods));
        (ToolExecutor::new(db, store.clone(), ToolSettings::default()), store)
    }

    fn call(name: &str, arguments: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "call_1".to_string(),
            name: name.to_string(),
            arguments,
        }
    }

    #[test]
    fn test_rank_verified_first_then_density() {
        let foods = vec![
            food("a", 100.0, 30.0, false),
            food("b", 200.0, 10.0, true),
            food("c", 100.0, 20.0, true),
            food("d", 100.0, 5.0, false),
        ];
        let ranked = rank_foods(foods, &FoodFilters::default(), 5);
        let ids: Vec<&str> = ranked.iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a", "d"]);

        for pair in ranked.windows(2) {
            if pair[0].verified == pair[1].verified {
                assert!(pair[0].protein_density() >= pair[1].protein_density());
            } else {
                assert!(pair[0].verified);
            }
        }
    }

    #[test]
    fn test_filters_are_independent_predicates() {
        let foods: Vec<FoodItem> = (0..10)
            .map(|i| food(&i.to_string(), 50.0 + 20.0 * i as f64, i as f64 * 3.0, i % 2 == 0))
            .collect();
        let filters = FoodFilters {
            verified_only: true,
            min_protein: Some(6.0),
            max_calories: Some(200.0),
            ..Default::default()
        };
        let ranked = rank_foods(foods, &filters, 5);
        assert!(!ranked.is_empty());
        assert!(ranked.iter().all(|f| f.verified && f.macros.protein >= 6.0 && f.macros.calories <= 200.0));
    }

    #[test]
    fn test_results_truncated_to_limit() {
        let foods: Vec<FoodItem> = (0..12).map(|i| food(&i.to_string(), 100.0, i as f64, true)).collect();
        assert_eq!(rank_foods(foods, &FoodFilters::default(), 5).len(), 5);
    }

    #[test]
    fn test_time_of_day_boundaries() {
        assert_eq!(TimeOfDay::from_hour(4), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(11), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(17), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(21), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(0), TimeOfDay::Night);
    }

    #[tokio::test]
    async fn test_log_half_portion() {
        let (executor, store) = executor_at(13, vec![food("f1", 200.0, 20.0, true)]);
        let result = executor
            .execute(&call("log_verified_food", serde_json::json!({"food_id": "f1", "portion_grams": 50})))
            .await;

        assert!(result.success);
        let log = store.today_log().unwrap();
        assert_eq!(log.consumed.calories, 100.0);
        assert_eq!(log.entries[0].meal_type, MealType::Lunch);
    }

    #[tokio::test]
    async fn test_log_defaults_to_100g() {
        let (executor, store) = executor_at(8, vec![food("f1", 200.0, 20.0, true)]);
        let entry = executor.log_verified_food("f1", None, None).await.unwrap();

        assert_eq!(entry.portion_grams, 100.0);
        assert_eq!(entry.meal_type, MealType::Breakfast);
        assert_eq!(store.today_log().unwrap().consumed.calories, 200.0);
    }

    #[tokio::test]
    async fn test_log_unknown_food_fails() {
        let (executor, store) = executor_at(8, Vec::new());
        let result = executor
            .execute(&call("log_verified_food", serde_json::json!({"food_id": "nope"})))
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("nope"));
        assert!(store.today_log().is_none());
    }

    #[tokio::test]
    async fn test_status_remaining_never_negative() {
        let (executor, store) = executor_at(19, vec![food("big", 1500.0, 10.0, true)]);
        store.set_daily_targets(Macros::new(2000.0, 150.0, 200.0, 65.0));
        executor.log_verified_food("big", Some(200.0), None).await.unwrap();

        let status = executor.get_user_status();
        assert_eq!(status.time_of_day, TimeOfDay::Evening);
        assert_eq!(status.consumed.calories, 3000.0);
        assert_eq!(status.remaining.calories, 0.0);
        assert_eq!(status.remaining.protein, 130.0);
        assert!(!status.targets_estimated);
    }

    #[tokio::test]
    async fn test_status_without_targets_uses_defaults() {
        let (executor, _) = executor_at(9, Vec::new());
        let status = executor.get_user_status();
        assert!(status.targets_estimated);
        assert_eq!(status.remaining, status.targets);
    }

    #[tokio::test]
    async fn test_unknown_tool_and_missing_args() {
        let (executor, _) = executor_at(9, Vec::new());

        let unknown = executor.execute(&call("delete_everything", serde_json::json!({}))).await;
        assert!(!unknown.success);
        assert_eq!(unknown.error.as_deref(), Some("Unknown tool: delete_everything"));

        let missing = executor.execute(&call("search_food_database", serde_json::json!({}))).await;
        assert!(!missing.success);
    }

    #[tokio::test]
    async fn test_search_verified_only_via_tool() {
        let db = InMemoryFoodDatabase::builtin().unwrap();
        let store = Arc::new(UserStore::new(Arc::new(crate::clock::SystemClock)));
        let executor = ToolExecutor::new(Arc::new(db), store, ToolSettings::default());

        let result = executor
            .execute(&call("search_food_database", serde_json::json!({"query": "", "verified_only": true})))
            .await;
        let foods: Vec<FoodItem> = serde_json::from_value(result.data).unwrap();
        assert_eq!(foods.len(), 5);
        assert!(foods.iter().all(|f| f.verified));
        // canned tuna has the best protein per kcal
        assert_eq!(foods[0].id, "usda-174032");
    }

    #[tokio::test]
    async fn test_knowledge_tool() {
        let (executor, _) = executor_at(9, Vec::new());
        let result = executor
            .execute(&call("search_verified_fitness_knowledge", serde_json::json!({"query": "creatine"})))
            .await;
        assert!(result.success);
        assert_eq!(result.data[0]["id"], "creatine");
    }
}
