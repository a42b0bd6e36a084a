//! User-scoped records owned by the user store

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub fn label(&self) -> &'static str {
        match self {
            ActivityLevel::Sedentary => "sedentary",
            ActivityLevel::Light => "lightly active",
            ActivityLevel::Moderate => "moderately active",
            ActivityLevel::Active => "active",
            ActivityLevel::VeryActive => "very active",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    LoseWeight,
    Maintain,
    GainMuscle,
}

impl GoalType {
    pub fn label(&self) -> &'static str {
        match self {
            GoalType::LoseWeight => "lose weight",
            GoalType::Maintain => "maintain weight",
            GoalType::GainMuscle => "build muscle",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Pro,
    Premium,
}

/// Every demographic field is optional: onboarding can be skipped
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserProfile {
    pub id: String,
    pub name: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    #[serde(default)]
    pub dietary_flags: Vec<String>,
    #[serde(default)]
    pub tier: SubscriptionTier,
    pub goal: Option<GoalType>,
    pub target_weight_kg: Option<f64>,
    /// kg per week, negative when losing
    pub weekly_rate_kg: Option<f64>,
}

/// Partial profile update; `None` leaves the field untouched
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub dietary_flags: Option<Vec<String>>,
    pub tier: Option<SubscriptionTier>,
    pub goal: Option<GoalType>,
    pub target_weight_kg: Option<f64>,
    pub weekly_rate_kg: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Preferences {
    pub units: String,
    pub coaching_tone: String,
    pub language: String,
    pub notifications: bool,
    #[serde(default)]
    pub disliked_foods: Vec<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            units: "metric".to_string(),
            coaching_tone: "supportive".to_string(),
            language: "en".to_string(),
            notifications: true,
            disliked_foods: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreferencesUpdate {
    pub units: Option<String>,
    pub coaching_tone: Option<String>,
    pub language: Option<String>,
    pub notifications: Option<bool>,
    pub disliked_foods: Option<Vec<String>>,
}

/// Calories in kcal, macros in grams
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Macros {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Macros {
    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories,
            protein,
            carbs,
            fat,
        }
    }

    pub fn add(&mut self, other: &Macros) {
        self.calories += other.calories;
        self.protein += other.protein;
        self.carbs += other.carbs;
        self.fat += other.fat;
    }

    pub fn scaled(&self, factor: f64) -> Macros {
        Macros {
            calories: self.calories * factor,
            protein: self.protein * factor,
            carbs: self.carbs * factor,
            fat: self.fat * factor,
        }
    }

    /// `max(0, self - consumed)` per field
    pub fn remaining_after(&self, consumed: &Macros) -> Macros {
        Macros {
            calories: (self.calories - consumed.calories).max(0.0),
            protein: (self.protein - consumed.protein).max(0.0),
            carbs: (self.carbs - consumed.carbs).max(0.0),
            fat: (self.fat - consumed.fat).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub fn label(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }

    pub fn parse(value: &str) -> Option<MealType> {
        match value.trim().to_lowercase().as_str() {
            "breakfast" => Some(MealType::Breakfast),
            "lunch" => Some(MealType::Lunch),
            "dinner" => Some(MealType::Dinner),
            "snack" | "snacks" => Some(MealType::Snack),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoodEntry {
    pub id: String,
    pub food_id: Option<String>,
    pub name: String,
    pub meal_type: MealType,
    pub portion_grams: f64,
    pub macros: Macros,
    pub logged_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workout {
    pub name: String,
    pub duration_minutes: u32,
    pub calories_burned: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyLog {
    pub date: NaiveDate,
    #[serde(default)]
    pub consumed: Macros,
    #[serde(default)]
    pub entries: Vec<FoodEntry>,
    #[serde(default)]
    pub steps: u32,
    #[serde(default)]
    pub workouts: Vec<Workout>,
    #[serde(default)]
    pub water_ml: u32,
}

impl DailyLog {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            consumed: Macros::default(),
            entries: Vec::new(),
            steps: 0,
            workouts: Vec::new(),
            water_ml: 0,
        }
    }

    /// A day counts as logged once any food has been recorded
    pub fn has_food(&self) -> bool {
        !self.entries.is_empty() || self.consumed.calories > 0.0
    }

    pub fn meal_totals(&self) -> BTreeMap<MealType, Macros> {
        let mut totals: BTreeMap<MealType, Macros> = BTreeMap::new();
        for entry in &self.entries {
            totals.entry(entry.meal_type).or_default().add(&entry.macros);
        }
        totals
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HealthMetrics {
    pub sleep_hours: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub hrv_ms: Option<f64>,
    pub weight_kg: Option<f64>,
    /// 0-100
    pub stress_level: Option<f64>,
    /// breaths per minute
    pub respiration_rate: Option<f64>,
}

impl HealthMetrics {
    /// Overlay the fields present in `other`
    pub fn merge(&mut self, other: &HealthMetrics) {
        if other.sleep_hours.is_some() {
            self.sleep_hours = other.sleep_hours;
        }
        if other.resting_heart_rate.is_some() {
            self.resting_heart_rate = other.resting_heart_rate;
        }
        if other.hrv_ms.is_some() {
            self.hrv_ms = other.hrv_ms;
        }
        if other.weight_kg.is_some() {
            self.weight_kg = other.weight_kg;
        }
        if other.stress_level.is_some() {
            self.stress_level = other.stress_level;
        }
        if other.respiration_rate.is_some() {
            self.respiration_rate = other.respiration_rate;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    Menstrual,
    Follicular,
    Ovulation,
    Luteal,
}

impl CyclePhase {
    pub fn label(&self) -> &'static str {
        match self {
            CyclePhase::Menstrual => "menstrual",
            CyclePhase::Follicular => "follicular",
            CyclePhase::Ovulation => "ovulation",
            CyclePhase::Luteal => "luteal",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleInfo {
    pub phase: CyclePhase,
    pub cycle_day: u32,
    pub cycle_length: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub price: u64,
    pub purchased_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerUp {
    pub id: String,
    pub kind: String,
    pub active_until: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Economy {
    pub balance: u64,
    #[serde(default)]
    pub purchase_history: Vec<StoreItem>,
    #[serde(default)]
    pub power_ups: Vec<PowerUp>,
    #[serde(default)]
    pub lifetime_earned: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Squad {
    pub id: String,
    pub name: String,
    pub member_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Social {
    pub squad: Option<Squad>,
    pub friends_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ConsistencyMetrics {
    pub streak: u32,
    pub last_streak_update: Option<NaiveDateTime>,
    /// Share of the trailing 7 days whose calories landed near target, 0-100
    pub weekly_compliance: f64,
    pub days_logged_last_week: u32,
    /// 0-100
    pub score: u8,
}

/// A coaching protocol the user has opted into (fasting window, creatine, ...)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Protocol {
    pub id: String,
    pub name: String,
    pub description: String,
    pub started_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroceryItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub quantity: Option<String>,
    pub checked: bool,
    /// Free-text label of the recipe it came from
    pub source_recipe: Option<String>,
}
