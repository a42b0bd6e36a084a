//! Builds [`UserContext`] snapshots from the user store

use super::types::*;
use crate::state::{DailyLog, HealthMetrics, Macros, UserState, UserStore};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Days covered by the history and health-average sections
pub const HISTORY_DAYS: u32 = 7;

pub struct ContextAggregator {
    store: Arc<UserStore>,
}

impl ContextAggregator {
    pub fn new(store: Arc<UserStore>) -> Self {
        Self { store }
    }

    /// Full snapshot for a normal coaching turn.
    ///
    /// Every section is derived from one store snapshot.
    pub async fn build_context(&self) -> UserContext {
        let state = self.store.snapshot();
        let today = self.store.today();
        let history = recent_history(&state, today, HISTORY_DAYS);
        let health = health_averages(&state, today, HISTORY_DAYS);

        debug!(history_days = history.len(), has_health = health.is_some(), "Built full context");

        UserContext {
            generated_at: self.store.now(),
            profile: profile_section(&state),
            today: today_section(&state, today),
            history,
            health,
            goals: goals_section(&state),
            preferences: Some(state.preferences.clone()),
            protocols: state.protocols.clone(),
            social: Some(social_section(&state)),
        }
    }

    /// Profile, today and goals only
    pub async fn build_light_context(&self) -> UserContext {
        let state = self.store.snapshot();
        let today = self.store.today();

        UserContext {
            generated_at: self.store.now(),
            profile: profile_section(&state),
            today: today_section(&state, today),
            history: Vec::new(),
            health: None,
            goals: goals_section(&state),
            preferences: None,
            protocols: Vec::new(),
            social: None,
        }
    }

    pub async fn get_profile(&self) -> ProfileContext {
        profile_section(&self.store.snapshot())
    }

    /// Today's snapshot; an empty one when nothing is logged yet
    pub async fn get_today(&self) -> DailySnapshot {
        today_section(&self.store.snapshot(), self.store.today())
    }

    /// The `days` days before today that have a stored log, most recent first.
    ///
    /// Days without a log are skipped, so the result is not contiguous.
    pub async fn get_recent_history(&self, days: u32) -> Vec<DailySnapshot> {
        recent_history(&self.store.snapshot(), self.store.today(), days)
    }

    /// Averages of the health readings over the last `days` days including today
    pub async fn get_health_averages(&self, days: u32) -> Option<HealthAverages> {
        health_averages(&self.store.snapshot(), self.store.today(), days)
    }

    pub async fn get_goals(&self) -> GoalsContext {
        goals_section(&self.store.snapshot())
    }

    pub async fn get_preferences(&self) -> crate::state::Preferences {
        self.store.snapshot().preferences
    }

    pub async fn get_protocols(&self) -> Vec<crate::state::Protocol> {
        self.store.snapshot().protocols
    }

    pub async fn get_social(&self) -> SocialContext {
        social_section(&self.store.snapshot())
    }
}

fn profile_section(state: &UserState) -> ProfileContext {
    match &state.profile {
        Some(p) => ProfileContext {
            name: p.name.clone(),
            age: p.age,
            sex: p.sex,
            height_cm: p.height_cm,
            weight_kg: p.weight_kg,
            activity_level: p.activity_level,
            dietary_flags: p.dietary_flags.clone(),
            tier: p.tier,
        },
        None => ProfileContext::default(),
    }
}

fn today_section(state: &UserState, today: NaiveDate) -> DailySnapshot {
    match state.daily_logs.get(&today) {
        Some(log) => build_snapshot(state, log, true),
        None => build_snapshot(state, &DailyLog::empty(today), true),
    }
}

fn recent_history(state: &UserState, today: NaiveDate, days: u32) -> Vec<DailySnapshot> {
    let Some(start) = today.checked_sub_days(chrono::Days::new(u64::from(days))) else {
        return Vec::new();
    };

    state
        .daily_logs
        .range(start..today)
        .rev()
        .map(|(_, log)| build_snapshot(state, log, false))
        .collect()
}

fn health_averages(state: &UserState, today: NaiveDate, days: u32) -> Option<HealthAverages> {
    let start = today.checked_sub_days(chrono::Days::new(u64::from(days.saturating_sub(1))))?;
    average_health(&state.health, start, today)
}

fn goals_section(state: &UserState) -> GoalsContext {
    let profile = state.profile.as_ref();
    GoalsContext {
        goal: profile.and_then(|p| p.goal),
        target_weight_kg: profile.and_then(|p| p.target_weight_kg),
        weekly_rate_kg: profile.and_then(|p| p.weekly_rate_kg),
        daily_targets: state.targets,
    }
}

fn social_section(state: &UserState) -> SocialContext {
    SocialContext {
        squad_name: state.social.squad.as_ref().map(|s| s.name.clone()),
        squad_members: state.social.squad.as_ref().map(|s| s.member_count),
        friends_count: state.social.friends_count,
        streak: state.consistency.streak,
        consistency_score: state.consistency.score,
        coins: state.economy.balance,
    }
}

fn build_snapshot(state: &UserState, log: &DailyLog, include_cycle: bool) -> DailySnapshot {
    let meals = log
        .meal_totals()
        .into_iter()
        .map(|(meal_type, macros)| MealBreakdown {
            meal_type,
            macros,
            items: log.entries.iter().filter(|e| e.meal_type == meal_type).count(),
        })
        .collect();

    let health = state.health.get(&log.date).map(|m| HealthSnapshot {
        sleep_hours: m.sleep_hours,
        resting_heart_rate: m.resting_heart_rate,
        weight_kg: m.weight_kg,
        stress_level: m.stress_level,
        respiration_rate: m.respiration_rate,
    });

    DailySnapshot {
        date: log.date,
        nutrition: NutritionSnapshot {
            consumed: log.consumed,
            target: state.targets,
            meals,
        },
        activity: ActivitySnapshot {
            steps: log.steps,
            workouts: log.workouts.len(),
            active_minutes: log.workouts.iter().map(|w| w.duration_minutes).sum(),
            calories_burned: log.workouts.iter().map(|w| w.calories_burned).sum(),
        },
        health,
        // Cycle info is only tracked as current state
        cycle: if include_cycle { state.cycle.clone() } else { None },
    }
}

fn average_health(
    health: &BTreeMap<NaiveDate, HealthMetrics>,
    start: NaiveDate,
    end: NaiveDate,
) -> Option<HealthAverages> {
    let readings: Vec<&HealthMetrics> = health.range(start..=end).map(|(_, m)| m).collect();
    if readings.is_empty() {
        return None;
    }

    fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
        let present: Vec<f64> = values.flatten().collect();
        if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        }
    }

    Some(HealthAverages {
        days_with_data: readings.len() as u32,
        sleep_hours: mean(readings.iter().map(|m| m.sleep_hours)),
        resting_heart_rate: mean(readings.iter().map(|m| m.resting_heart_rate)),
        hrv_ms: mean(readings.iter().map(|m| m.hrv_ms)),
        weight_kg: mean(readings.iter().map(|m| m.weight_kg)),
        stress_level: mean(readings.iter().map(|m| m.stress_level)),
        respiration_rate: mean(readings.iter().map(|m| m.respiration_rate)),
    })
}

/// Consumed against target for a snapshot, using the default target if unset
pub fn progress(snapshot: &DailySnapshot) -> (Macros, Macros) {
    (
        snapshot.nutrition.consumed,
        super::defaults::resolve_targets(snapshot.nutrition.target.as_ref()),
    )
}
