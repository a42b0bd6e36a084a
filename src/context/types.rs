//! Context snapshot handed to the AI coach.
//!
//! Fields the user may never have filled in stay `Option`; the formatter
//! resolves them through [`super::defaults`].

use crate::state::{
    ActivityLevel, CycleInfo, GoalType, Macros, MealType, Preferences, Protocol, Sex,
    SubscriptionTier,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserContext {
    pub generated_at: NaiveDateTime,
    pub profile: ProfileContext,
    pub today: DailySnapshot,
    /// Most recent first, only days that have a stored log
    pub history: Vec<DailySnapshot>,
    pub health: Option<HealthAverages>,
    pub goals: GoalsContext,
    pub preferences: Option<Preferences>,
    pub protocols: Vec<Protocol>,
    pub social: Option<SocialContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProfileContext {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub sex: Option<Sex>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<ActivityLevel>,
    pub dietary_flags: Vec<String>,
    pub tier: SubscriptionTier,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub nutrition: NutritionSnapshot,
    pub activity: ActivitySnapshot,
    pub health: Option<HealthSnapshot>,
    pub cycle: Option<CycleInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NutritionSnapshot {
    pub consumed: Macros,
    /// Read from the current daily target, not the one active on `date`
    pub target: Option<Macros>,
    pub meals: Vec<MealBreakdown>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MealBreakdown {
    pub meal_type: MealType,
    pub macros: Macros,
    pub items: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ActivitySnapshot {
    pub steps: u32,
    pub workouts: usize,
    pub active_minutes: u32,
    pub calories_burned: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HealthSnapshot {
    pub sleep_hours: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub weight_kg: Option<f64>,
    pub stress_level: Option<f64>,
    pub respiration_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct HealthAverages {
    pub days_with_data: u32,
    pub sleep_hours: Option<f64>,
    pub resting_heart_rate: Option<f64>,
    pub hrv_ms: Option<f64>,
    pub weight_kg: Option<f64>,
    pub stress_level: Option<f64>,
    pub respiration_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GoalsContext {
    pub goal: Option<GoalType>,
    pub target_weight_kg: Option<f64>,
    pub weekly_rate_kg: Option<f64>,
    pub daily_targets: Option<Macros>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SocialContext {
    pub squad_name: Option<String>,
    pub squad_members: Option<u32>,
    pub friends_count: u32,
    pub streak: u32,
    pub consistency_score: u8,
    pub coins: u64,
}
