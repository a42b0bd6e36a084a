//! Prompt rendering for [`UserContext`].
//!
//! Total over its input: every optional field is resolved through
//! [`super::defaults`] or rendered as a placeholder.

use super::defaults::{resolve_goals, resolve_profile};
use super::types::{DailySnapshot, HealthAverages, UserContext};
use crate::state::Macros;
use std::fmt::Write;

pub fn format_for_prompt(context: &UserContext) -> String {
    let mut out = String::new();
    write_profile(&mut out, context);
    write_today(&mut out, &context.today, &context.goals.daily_targets);
    write_goals(&mut out, context);
    write_health(&mut out, context.health.as_ref());
    write_protocols(&mut out, context);
    write_social(&mut out, context);
    write_history(&mut out, &context.history);
    out
}

fn estimated(flag: bool) -> &'static str {
    if flag { " (estimated)" } else { "" }
}

fn write_profile(out: &mut String, context: &UserContext) {
    let profile = resolve_profile(&context.profile);

    let _ = writeln!(out, "## User Profile");
    let _ = writeln!(out, "- Name: {}", profile.name);
    let _ = writeln!(out, "- Age: {}{}", profile.age, estimated(profile.is_estimated("age")));
    let _ = writeln!(out, "- Sex: {}", profile.sex);
    let _ = writeln!(
        out,
        "- Height: {:.0} cm{}",
        profile.height_cm,
        estimated(profile.is_estimated("height"))
    );
    let _ = writeln!(
        out,
        "- Weight: {:.1} kg{}",
        profile.weight_kg,
        estimated(profile.is_estimated("weight"))
    );
    let _ = writeln!(
        out,
        "- Activity: {}{}",
        profile.activity.label(),
        estimated(profile.is_estimated("activity"))
    );
    if !context.profile.dietary_flags.is_empty() {
        let _ = writeln!(out, "- Diet: {}", context.profile.dietary_flags.join(", "));
    }
    out.push('\n');
}

fn write_macro_line(out: &mut String, label: &str, consumed: f64, target: f64, unit: &str) {
    let remaining = (target - consumed).max(0.0);
    let _ = writeln!(
        out,
        "- {}: {:.0} / {:.0} {} ({:.0} remaining)",
        label, consumed, target, unit, remaining
    );
}

fn write_today(out: &mut String, today: &DailySnapshot, targets: &Option<Macros>) {
    let target = super::defaults::resolve_targets(today.nutrition.target.as_ref().or(targets.as_ref()));
    let consumed = &today.nutrition.consumed;

    let _ = writeln!(out, "## Today's Progress ({})", today.date.format("%Y-%m-%d"));
    write_macro_line(out, "Calories", consumed.calories, target.calories, "kcal");
    write_macro_line(out, "Protein", consumed.protein, target.protein, "g");
    write_macro_line(out, "Carbs", consumed.carbs, target.carbs, "g");
    write_macro_line(out, "Fat", consumed.fat, target.fat, "g");

    if today.nutrition.meals.is_empty() {
        let _ = writeln!(out, "- Meals: nothing logged yet");
    } else {
        let meals: Vec<String> = today
            .nutrition
            .meals
            .iter()
            .map(|m| format!("{} {:.0} kcal", m.meal_type.label(), m.macros.calories))
            .collect();
        let _ = writeln!(out, "- Meals: {}", meals.join(", "));
    }

    let _ = writeln!(
        out,
        "- Activity: {} steps, {} workout(s), {} active min",
        today.activity.steps, today.activity.workouts, today.activity.active_minutes
    );
    if let Some(cycle) = &today.cycle {
        let _ = writeln!(out, "- Cycle: {} phase, day {}", cycle.phase.label(), cycle.cycle_day);
    }
    out.push('\n');
}

fn write_goals(out: &mut String, context: &UserContext) {
    let goals = resolve_goals(&context.goals);

    let _ = writeln!(out, "## Goals");
    let _ = writeln!(
        out,
        "- Primary goal: {}{}",
        goals.goal.label(),
        estimated(context.goals.goal.is_none())
    );
    if let Some(weight) = goals.target_weight_kg {
        let _ = writeln!(out, "- Target weight: {:.1} kg", weight);
    }
    if let Some(rate) = goals.weekly_rate_kg {
        let _ = writeln!(out, "- Weekly rate: {:+.2} kg/week", rate);
    }
    let _ = writeln!(
        out,
        "- Daily targets: {:.0} kcal, {:.0} g protein, {:.0} g carbs, {:.0} g fat{}",
        goals.targets.calories,
        goals.targets.protein,
        goals.targets.carbs,
        goals.targets.fat,
        estimated(goals.targets_estimated)
    );
    out.push('\n');
}

fn write_health(out: &mut String, health: Option<&HealthAverages>) {
    let _ = writeln!(out, "## 7-Day Health Averages");
    let Some(health) = health else {
        let _ = writeln!(out, "- No health data in the last 7 days");
        out.push('\n');
        return;
    };

    let fields = [
        ("Sleep", health.sleep_hours, "h"),
        ("Resting HR", health.resting_heart_rate, "bpm"),
        ("HRV", health.hrv_ms, "ms"),
        ("Weight", health.weight_kg, "kg"),
        ("Stress", health.stress_level, "/100"),
        ("Respiration", health.respiration_rate, "breaths/min"),
    ];
    for (label, value, unit) in fields {
        if let Some(value) = value {
            let _ = writeln!(out, "- {}: {:.1} {}", label, value, unit);
        }
    }
    let _ = writeln!(out, "- Days with data: {}", health.days_with_data);
    out.push('\n');
}

fn write_protocols(out: &mut String, context: &UserContext) {
    let _ = writeln!(out, "## Active Protocols");
    if context.protocols.is_empty() {
        let _ = writeln!(out, "- None");
    }
    for protocol in &context.protocols {
        let _ = writeln!(
            out,
            "- {} (since {}): {}",
            protocol.name,
            protocol.started_on.format("%Y-%m-%d"),
            protocol.description
        );
    }
    out.push('\n');
}

fn write_social(out: &mut String, context: &UserContext) {
    let Some(social) = &context.social else { return };

    let _ = writeln!(out, "## Consistency & Community");
    let _ = writeln!(
        out,
        "- Streak: {} day(s), consistency score {}/100",
        social.streak, social.consistency_score
    );
    let _ = writeln!(out, "- MacroCoins: {}", social.coins);
    if let Some(squad) = &social.squad_name {
        let _ = writeln!(
            out,
            "- Squad: {} ({} members)",
            squad,
            social.squad_members.unwrap_or(0)
        );
    }
    out.push('\n');
}

fn write_history(out: &mut String, history: &[DailySnapshot]) {
    if history.is_empty() {
        return;
    }
    let _ = writeln!(out, "## Recent Days");
    for day in history {
        let (consumed, target) = super::aggregator::progress(day);
        let _ = writeln!(
            out,
            "- {}: {:.0} / {:.0} kcal, {:.0} g protein, {} steps",
            day.date.format("%Y-%m-%d"),
            consumed.calories,
            target.calories,
            consumed.protein,
            day.activity.steps
        );
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::types::*;
    use crate::state::{CycleInfo, CyclePhase, Protocol};
    use chrono::NaiveDate;

    fn empty_context() -> UserContext {
        let date = NaiveDate::from_ymd_opt(2026, 6, 10).unwrap();
        UserContext {
            generated_at: date.and_hms_opt(9, 0, 0).unwrap(),
            profile: ProfileContext::default(),
            today: DailySnapshot {
                date,
                nutrition: NutritionSnapshot {
                    consumed: Macros::default(),
                    target: None,
                    meals: Vec::new(),
                },
                activity: ActivitySnapshot::default(),
                health: None,
                cycle: None,
            },
            history: Vec::new(),
            health: None,
            goals: GoalsContext::default(),
            preferences: None,
            protocols: Vec::new(),
            social: None,
        }
    }

    #[test]
    fn test_all_absent_still_renders_fixed_sections() {
        let prompt = format_for_prompt(&empty_context());

        for section in [
            "## User Profile",
            "## Today's Progress (2026-06-10)",
            "## Goals",
            "## 7-Day Health Averages",
            "## Active Protocols",
        ] {
            assert!(prompt.contains(section), "missing {section}");
        }
        assert!(prompt.contains("- Height: 170 cm (estimated)"));
        assert!(prompt.contains("- Calories: 0 / 2000 kcal (2000 remaining)"));
        assert!(prompt.contains("- No health data in the last 7 days"));
        assert!(!prompt.contains("## Recent Days"));
    }

    #[test]
    fn test_overshoot_shows_zero_remaining() {
        let mut context = empty_context();
        context.today.nutrition.consumed = Macros::new(2600.0, 90.0, 300.0, 80.0);
        context.today.nutrition.target = Some(Macros::new(2000.0, 150.0, 200.0, 65.0));

        let prompt = format_for_prompt(&context);
        assert!(prompt.contains("- Calories: 2600 / 2000 kcal (0 remaining)"));
        assert!(prompt.contains("- Protein: 90 / 150 g (60 remaining)"));
    }

    #[test]
    fn test_optional_sections_render() {
        let mut context = empty_context();
        context.today.cycle = Some(CycleInfo {
            phase: CyclePhase::Luteal,
            cycle_day: 21,
            cycle_length: Some(28),
        });
        context.protocols.push(Protocol {
            id: "p1".into(),
            name: "16:8 fasting".into(),
            description: "Eat between 12:00 and 20:00".into(),
            started_on: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        });
        context.social = Some(SocialContext {
            squad_name: Some("Early Birds".into()),
            squad_members: Some(6),
            streak: 4,
            consistency_score: 72,
            coins: 340,
            ..Default::default()
        });

        let prompt = format_for_prompt(&context);
        assert!(prompt.contains("- Cycle: luteal phase, day 21"));
        assert!(prompt.contains("- 16:8 fasting (since 2026-06-01): Eat between 12:00 and 20:00"));
        assert!(prompt.contains("- Squad: Early Birds (6 members)"));
        assert!(!prompt.contains("- None"));
    }
}
