//! Streak and consistency scoring

use super::types::{DailyLog, Macros};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::BTreeMap;

/// Streak length at which the streak component saturates
const STREAK_SATURATION: u32 = 30;

/// Calories within this fraction of target count as a compliant day
const COMPLIANCE_TOLERANCE: f64 = 0.2;

/// Outcome of comparing "now" against the last streak update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    /// Same calendar day, nothing to do
    Unchanged,
    Started,
    Extended,
    Reset,
}

/// Next streak value and the change kind.
///
/// Calendar-day difference only; no timezone or clock-skew handling.
pub fn next_streak(
    streak: u32,
    last_update: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> (u32, StreakChange) {
    let Some(last) = last_update else {
        return (1, StreakChange::Started);
    };

    let days = (now.date() - last.date()).num_days();
    match days {
        1 => (streak + 1, StreakChange::Extended),
        d if d > 1 => (0, StreakChange::Reset),
        // Same day, or a clock that went backwards
        _ => (streak, StreakChange::Unchanged),
    }
}

/// Compliance over the 7 days ending at `today` (inclusive).
///
/// Returns `(compliance_percent, days_logged)`. Without a calorie target,
/// compliance is the share of days with any food logged.
pub fn weekly_compliance(
    logs: &BTreeMap<NaiveDate, DailyLog>,
    targets: Option<&Macros>,
    today: NaiveDate,
) -> (f64, u32) {
    let start = today - chrono::Duration::days(6);
    let logged: Vec<&DailyLog> = logs
        .range(start..=today)
        .map(|(_, log)| log)
        .filter(|log| log.has_food())
        .collect();

    let days_logged = logged.len() as u32;
    let compliant = match targets.filter(|t| t.calories > 0.0) {
        Some(targets) => logged
            .iter()
            .filter(|log| {
                let ratio = log.consumed.calories / targets.calories;
                (ratio - 1.0).abs() <= COMPLIANCE_TOLERANCE
            })
            .count() as u32,
        None => days_logged,
    };

    (f64::from(compliant) / 7.0 * 100.0, days_logged)
}

/// Blend of streak (40), compliance (40) and logging frequency (20), 0-100
pub fn consistency_score(streak: u32, compliance_percent: f64, days_logged: u32) -> u8 {
    let streak_part = f64::from(streak.min(STREAK_SATURATION)) / f64::from(STREAK_SATURATION) * 40.0;
    let compliance_part = compliance_percent.clamp(0.0, 100.0) * 0.4;
    let frequency_part = f64::from(days_logged.min(7)) / 7.0 * 20.0;

    (streak_part + compliance_part + frequency_part).round().clamp(0.0, 100.0) as u8
}
