//! Fallbacks for missing user data.
//!
//! The coach never waits on missing data: anything the user has not told us is
//! replaced by a population default here, and nowhere else. Resolved values
//! record which fields were estimated so the prompt can say so.

use super::types::{GoalsContext, ProfileContext};
use crate::state::{ActivityLevel, GoalType, Macros};

pub const DEFAULT_NAME: &str = "there";
pub const DEFAULT_AGE: u32 = 30;
pub const DEFAULT_HEIGHT_CM: f64 = 170.0;
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;
pub const DEFAULT_ACTIVITY: ActivityLevel = ActivityLevel::Moderate;
pub const DEFAULT_GOAL: GoalType = GoalType::Maintain;
pub const DEFAULT_TARGETS: Macros = Macros {
    calories: 2000.0,
    protein: 150.0,
    carbs: 200.0,
    fat: 65.0,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProfile {
    pub name: String,
    pub age: u32,
    pub sex: &'static str,
    pub height_cm: f64,
    pub weight_kg: f64,
    pub activity: ActivityLevel,
    /// Names of the fields that fell back to a default
    pub estimated: Vec<&'static str>,
}

impl ResolvedProfile {
    pub fn is_estimated(&self, field: &str) -> bool {
        self.estimated.contains(&field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGoals {
    pub goal: GoalType,
    pub target_weight_kg: Option<f64>,
    pub weekly_rate_kg: Option<f64>,
    pub targets: Macros,
    pub targets_estimated: bool,
}

pub fn resolve_profile(profile: &ProfileContext) -> ResolvedProfile {
    let mut estimated = Vec::new();

    let name = match &profile.name {
        Some(name) if !name.trim().is_empty() => name.clone(),
        _ => {
            estimated.push("name");
            DEFAULT_NAME.to_string()
        }
    };
    let age = profile.age.unwrap_or_else(|| {
        estimated.push("age");
        DEFAULT_AGE
    });
    let sex = match profile.sex {
        Some(crate::state::Sex::Male) => "male",
        Some(crate::state::Sex::Female) => "female",
        Some(crate::state::Sex::Other) => "other",
        None => {
            estimated.push("sex");
            "unspecified"
        }
    };
    let height_cm = profile.height_cm.filter(|h| *h > 0.0).unwrap_or_else(|| {
        estimated.push("height");
        DEFAULT_HEIGHT_CM
    });
    let weight_kg = profile.weight_kg.filter(|w| *w > 0.0).unwrap_or_else(|| {
        estimated.push("weight");
        DEFAULT_WEIGHT_KG
    });
    let activity = profile.activity_level.unwrap_or_else(|| {
        estimated.push("activity");
        DEFAULT_ACTIVITY
    });

    ResolvedProfile {
        name,
        age,
        sex,
        height_cm,
        weight_kg,
        activity,
        estimated,
    }
}

pub fn resolve_targets(targets: Option<&Macros>) -> Macros {
    targets.copied().unwrap_or(DEFAULT_TARGETS)
}

pub fn resolve_goals(goals: &GoalsContext) -> ResolvedGoals {
    ResolvedGoals {
        goal: goals.goal.unwrap_or(DEFAULT_GOAL),
        target_weight_kg: goals.target_weight_kg,
        weekly_rate_kg: goals.weekly_rate_kg,
        targets: resolve_targets(goals.daily_targets.as_ref()),
        targets_estimated: goals.daily_targets.is_none(),
    }
}
