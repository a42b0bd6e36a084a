//! User state store.
//!
//! All mutations go through [`UserStore::dispatch`], which applies a
//! [`UserAction`] to the in-memory state under one write lock and queues the
//! new snapshot for persistence. Convenience methods are thin wrappers.

use super::consistency::{self, StreakChange};
use super::persist::{self, Persister};
use super::types::*;
use crate::clock::Clock;
use crate::error::Result;
use crate::storage::{KvStore, keys};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UserState {
    pub profile: Option<UserProfile>,
    #[serde(default)]
    pub preferences: Preferences,
    /// Current daily target
    pub targets: Option<Macros>,
    #[serde(default)]
    pub daily_logs: BTreeMap<NaiveDate, DailyLog>,
    #[serde(default)]
    pub health: BTreeMap<NaiveDate, HealthMetrics>,
    pub cycle: Option<CycleInfo>,
    #[serde(default)]
    pub economy: Economy,
    #[serde(default)]
    pub social: Social,
    #[serde(default)]
    pub consistency: ConsistencyMetrics,
    #[serde(default)]
    pub protocols: Vec<Protocol>,
    #[serde(skip)]
    pub is_loading: bool,
    #[serde(skip)]
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub enum UserAction {
    SetUser(UserProfile),
    UpdateProfile(ProfileUpdate),
    UpdatePreferences(PreferencesUpdate),
    SetDailyTargets(Macros),
    AddDailyLog(DailyLog),
    LogFood(FoodEntry),
    AddWorkout { date: NaiveDate, workout: Workout },
    SetSteps { date: NaiveDate, steps: u32 },
    UpdateHealthMetrics { date: NaiveDate, metrics: HealthMetrics },
    UpdateCycleInfo(Option<CycleInfo>),
    AddCoins(u64),
    SpendCoins(u64),
    PurchaseItem(StoreItem),
    ActivatePowerUp { kind: String, price: u64, hours: i64 },
    JoinSquad(Squad),
    LeaveSquad,
    UpdateStreak,
    UpdateConsistencyMetrics,
    AddProtocol(Protocol),
    RemoveProtocol(String),
    Reset,
}

/// A wearable or health platform we can pull readings from
#[async_trait]
pub trait HealthDataSource: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> Result<HealthReading>;
}

#[derive(Debug, Clone, Default)]
pub struct HealthReading {
    pub metrics: HealthMetrics,
    pub steps: Option<u32>,
}

pub struct UserStore {
    state: RwLock<UserState>,
    clock: Arc<dyn Clock>,
    persister: Option<Persister>,
}

impl UserStore {
    /// An unpersisted store
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(UserState::default()),
            clock,
            persister: None,
        }
    }

    /// Hydrate from `kv` and persist every later mutation back to it
    pub async fn open(kv: &KvStore, clock: Arc<dyn Clock>) -> Self {
        let adapter = kv.adapter();
        let state = persist::load::<UserState>(&adapter, keys::USER_STORE)
            .await
            .unwrap_or_default();
        debug!(
            logs = state.daily_logs.len(),
            has_profile = state.profile.is_some(),
            "User store hydrated"
        );

        Self {
            state: RwLock::new(state),
            clock,
            persister: Some(Persister::spawn(adapter, keys::USER_STORE)),
        }
    }

    /// Replace in-memory state with the stored snapshot, if there is one
    pub async fn hydrate(&self, kv: &KvStore) -> bool {
        match persist::load::<UserState>(&kv.adapter(), keys::USER_STORE).await {
            Some(stored) => {
                *self.write() = stored;
                true
            }
            None => false,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn read(&self) -> RwLockReadGuard<'_, UserState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Apply one action. Returns whether it took effect.
    pub fn dispatch(&self, action: UserAction) -> bool {
        let now = self.clock.now();
        let mut state = self.write();
        let applied = reduce(&mut state, action, now);
        if applied {
            // Queued while still holding the lock so snapshots reach the
            // writer in commit order.
            if let Some(persister) = &self.persister {
                persister.persist(&*state);
            }
        }
        applied
    }

    /// Wait for queued snapshot writes
    pub async fn flush(&self) {
        if let Some(persister) = &self.persister {
            persister.flush().await;
        }
    }

    /// Immutable copy of the current state
    pub fn snapshot(&self) -> UserState {
        self.read().clone()
    }

    // Actions

    pub fn set_user(&self, profile: UserProfile) -> bool {
        self.dispatch(UserAction::SetUser(profile))
    }

    pub fn update_profile(&self, update: ProfileUpdate) -> bool {
        self.dispatch(UserAction::UpdateProfile(update))
    }

    pub fn update_preferences(&self, update: PreferencesUpdate) -> bool {
        self.dispatch(UserAction::UpdatePreferences(update))
    }

    pub fn set_daily_targets(&self, targets: Macros) -> bool {
        self.dispatch(UserAction::SetDailyTargets(targets))
    }

    pub fn add_daily_log(&self, log: DailyLog) -> bool {
        self.dispatch(UserAction::AddDailyLog(log))
    }

    pub fn log_food(&self, entry: FoodEntry) -> bool {
        self.dispatch(UserAction::LogFood(entry))
    }

    pub fn update_health_metrics(&self, date: NaiveDate, metrics: HealthMetrics) -> bool {
        self.dispatch(UserAction::UpdateHealthMetrics { date, metrics })
    }

    pub fn add_coins(&self, amount: u64) -> bool {
        self.dispatch(UserAction::AddCoins(amount))
    }

    /// Debit-if-sufficient; `false` leaves the balance untouched
    pub fn spend_coins(&self, amount: u64) -> bool {
        self.dispatch(UserAction::SpendCoins(amount))
    }

    pub fn purchase_item(&self, item: StoreItem) -> bool {
        self.dispatch(UserAction::PurchaseItem(item))
    }

    pub fn join_squad(&self, squad: Squad) -> bool {
        self.dispatch(UserAction::JoinSquad(squad))
    }

    pub fn update_streak(&self) -> bool {
        self.dispatch(UserAction::UpdateStreak)
    }

    pub fn update_consistency_metrics(&self) -> bool {
        self.dispatch(UserAction::UpdateConsistencyMetrics)
    }

    pub fn update_cycle_info(&self, cycle: Option<CycleInfo>) -> bool {
        self.dispatch(UserAction::UpdateCycleInfo(cycle))
    }

    pub fn activate_power_up(&self, kind: &str, price: u64, hours: i64) -> bool {
        self.dispatch(UserAction::ActivatePowerUp {
            kind: kind.to_string(),
            price,
            hours,
        })
    }

    pub fn leave_squad(&self) -> bool {
        self.dispatch(UserAction::LeaveSquad)
    }

    pub fn add_protocol(&self, protocol: Protocol) -> bool {
        self.dispatch(UserAction::AddProtocol(protocol))
    }

    pub fn remove_protocol(&self, id: &str) -> bool {
        self.dispatch(UserAction::RemoveProtocol(id.to_string()))
    }

    /// Back to an empty state
    pub fn reset(&self) -> bool {
        self.dispatch(UserAction::Reset)
    }

    /// Pull readings from a wearable.
    ///
    /// `is_loading` is set for the duration of the call; a failure is stored in
    /// `error` for display instead of being returned.
    pub async fn sync_health_data(&self, source: &dyn HealthDataSource) {
        let today = self.clock.today();
        {
            let mut state = self.write();
            state.is_loading = true;
            state.error = None;
        }

        let outcome = source.fetch(today).await;

        match outcome {
            Ok(reading) => {
                self.dispatch(UserAction::UpdateHealthMetrics {
                    date: today,
                    metrics: reading.metrics,
                });
                if let Some(steps) = reading.steps {
                    self.dispatch(UserAction::SetSteps { date: today, steps });
                }
                info!(date = %today, "Health data synced");
            }
            Err(e) => {
                warn!(error = %e, "Health sync failed");
                self.write().error = Some(e.to_string());
            }
        }

        self.write().is_loading = false;
    }

    // Selectors

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.read().profile.clone()
    }

    pub fn targets(&self) -> Option<Macros> {
        self.read().targets
    }

    pub fn log_for(&self, date: NaiveDate) -> Option<DailyLog> {
        self.read().daily_logs.get(&date).cloned()
    }

    pub fn today_log(&self) -> Option<DailyLog> {
        self.log_for(self.clock.today())
    }

    /// Remaining macros for today; `None` without a target
    pub fn remaining_macros(&self) -> Option<Macros> {
        let state = self.read();
        let targets = state.targets?;
        let consumed = state
            .daily_logs
            .get(&self.clock.today())
            .map(|log| log.consumed)
            .unwrap_or_default();
        Some(targets.remaining_after(&consumed))
    }

    pub fn balance(&self) -> u64 {
        self.read().economy.balance
    }

    pub fn has_active_power_up(&self, kind: &str) -> bool {
        let now = self.clock.now();
        self.read()
            .economy
            .power_ups
            .iter()
            .any(|p| p.kind == kind && p.active_until > now)
    }

    pub fn is_loading(&self) -> bool {
        self.read().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }
}

/// Pure state transition
pub fn reduce(state: &mut UserState, action: UserAction, now: NaiveDateTime) -> bool {
    let today = now.date();
    match action {
        UserAction::SetUser(profile) => {
            state.profile = Some(profile);
            true
        }
        UserAction::UpdateProfile(update) => {
            let Some(profile) = state.profile.as_mut() else {
                warn!("Profile update ignored, no user set");
                return false;
            };
            apply_profile_update(profile, update);
            true
        }
        UserAction::UpdatePreferences(update) => {
            let prefs = &mut state.preferences;
            if let Some(units) = update.units {
                prefs.units = units;
            }
            if let Some(tone) = update.coaching_tone {
                prefs.coaching_tone = tone;
            }
            if let Some(language) = update.language {
                prefs.language = language;
            }
            if let Some(notifications) = update.notifications {
                prefs.notifications = notifications;
            }
            if let Some(disliked) = update.disliked_foods {
                prefs.disliked_foods = disliked;
            }
            true
        }
        UserAction::SetDailyTargets(targets) => {
            state.targets = Some(targets);
            true
        }
        UserAction::AddDailyLog(log) => {
            let date = log.date;
            match state.daily_logs.get_mut(&date) {
                // Past days are frozen once recorded
                Some(_) if date < today => {
                    debug!(date = %date, "Ignoring log for a closed day");
                    return false;
                }
                Some(existing) => merge_log(existing, log),
                None => {
                    state.daily_logs.insert(date, log);
                }
            }
            recompute_consistency(state, today);
            true
        }
        UserAction::LogFood(entry) => {
            let date = entry.logged_at.date();
            if date != today {
                debug!(date = %date, "Food can only be logged against today");
                return false;
            }
            let log = state
                .daily_logs
                .entry(date)
                .or_insert_with(|| DailyLog::empty(date));
            log.consumed.add(&entry.macros);
            log.entries.push(entry);
            recompute_consistency(state, today);
            true
        }
        UserAction::AddWorkout { date, workout } => {
            if date != today {
                return false;
            }
            state
                .daily_logs
                .entry(date)
                .or_insert_with(|| DailyLog::empty(date))
                .workouts
                .push(workout);
            true
        }
        UserAction::SetSteps { date, steps } => {
            if date != today {
                return false;
            }
            let log = state
                .daily_logs
                .entry(date)
                .or_insert_with(|| DailyLog::empty(date));
            log.steps = log.steps.max(steps);
            true
        }
        UserAction::UpdateHealthMetrics { date, metrics } => {
            if let Some(weight) = metrics.weight_kg {
                if let Some(profile) = state.profile.as_mut() {
                    profile.weight_kg = Some(weight);
                }
            }
            state.health.entry(date).or_default().merge(&metrics);
            true
        }
        UserAction::UpdateCycleInfo(cycle) => {
            state.cycle = cycle;
            true
        }
        UserAction::AddCoins(amount) => {
            state.economy.balance = state.economy.balance.saturating_add(amount);
            state.economy.lifetime_earned = state.economy.lifetime_earned.saturating_add(amount);
            true
        }
        UserAction::SpendCoins(amount) => debit(&mut state.economy, amount),
        UserAction::PurchaseItem(mut item) => {
            if !debit(&mut state.economy, item.price) {
                return false;
            }
            item.purchased_at = Some(now);
            info!(item = %item.name, price = item.price, "Item purchased");
            state.economy.purchase_history.push(item);
            true
        }
        UserAction::ActivatePowerUp { kind, price, hours } => {
            if !debit(&mut state.economy, price) {
                return false;
            }
            state.economy.power_ups.retain(|p| p.active_until > now);
            state.economy.power_ups.push(PowerUp {
                id: uuid::Uuid::new_v4().to_string(),
                kind,
                active_until: now + chrono::Duration::hours(hours),
            });
            true
        }
        UserAction::JoinSquad(squad) => {
            state.social.squad = Some(squad);
            true
        }
        UserAction::LeaveSquad => state.social.squad.take().is_some(),
        UserAction::UpdateStreak => {
            let metrics = &mut state.consistency;
            let (streak, change) = consistency::next_streak(metrics.streak, metrics.last_streak_update, now);
            if change == StreakChange::Unchanged {
                return false;
            }
            debug!(from = metrics.streak, to = streak, ?change, "Streak updated");
            metrics.streak = streak;
            metrics.last_streak_update = Some(now);
            recompute_consistency(state, today);
            true
        }
        UserAction::UpdateConsistencyMetrics => {
            recompute_consistency(state, today);
            true
        }
        UserAction::AddProtocol(protocol) => {
            state.protocols.push(protocol);
            true
        }
        UserAction::RemoveProtocol(id) => {
            let before = state.protocols.len();
            state.protocols.retain(|p| p.id != id);
            state.protocols.len() != before
        }
        UserAction::Reset => {
            *state = UserState::default();
            true
        }
    }
}

/// Single check-and-decrement so two purchases cannot both pass the check
fn debit(economy: &mut Economy, amount: u64) -> bool {
    match economy.balance.checked_sub(amount) {
        Some(rest) => {
            economy.balance = rest;
            true
        }
        None => {
            debug!(balance = economy.balance, amount, "Insufficient MacroCoins");
            false
        }
    }
}

fn apply_profile_update(profile: &mut UserProfile, update: ProfileUpdate) {
    if let Some(v) = update.name {
        profile.name = Some(v);
    }
    if let Some(v) = update.age {
        profile.age = Some(v);
    }
    if let Some(v) = update.sex {
        profile.sex = Some(v);
    }
    if let Some(v) = update.height_cm {
        profile.height_cm = Some(v);
    }
    if let Some(v) = update.weight_kg {
        profile.weight_kg = Some(v);
    }
    if let Some(v) = update.activity_level {
        profile.activity_level = Some(v);
    }
    if let Some(v) = update.dietary_flags {
        profile.dietary_flags = v;
    }
    if let Some(v) = update.tier {
        profile.tier = v;
    }
    if let Some(v) = update.goal {
        profile.goal = Some(v);
    }
    if let Some(v) = update.target_weight_kg {
        profile.target_weight_kg = Some(v);
    }
    if let Some(v) = update.weekly_rate_kg {
        profile.weekly_rate_kg = Some(v);
    }
}

/// Upsert for the current day: consumed totals never go down
fn merge_log(existing: &mut DailyLog, incoming: DailyLog) {
    existing.consumed = Macros {
        calories: existing.consumed.calories.max(incoming.consumed.calories),
        protein: existing.consumed.protein.max(incoming.consumed.protein),
        carbs: existing.consumed.carbs.max(incoming.consumed.carbs),
        fat: existing.consumed.fat.max(incoming.consumed.fat),
    };
    for entry in incoming.entries {
        if !existing.entries.iter().any(|e| e.id == entry.id) {
            existing.entries.push(entry);
        }
    }
    existing.steps = existing.steps.max(incoming.steps);
    existing.water_ml = existing.water_ml.max(incoming.water_ml);
    if !incoming.workouts.is_empty() {
        existing.workouts = incoming.workouts;
    }
}

fn recompute_consistency(state: &mut UserState, today: NaiveDate) {
    let (compliance, days_logged) =
        consistency::weekly_compliance(&state.daily_logs, state.targets.as_ref(), today);
    let metrics = &mut state.consistency;
    metrics.weekly_compliance = compliance;
    metrics.days_logged_last_week = days_logged;
    metrics.score = consistency::consistency_score(metrics.streak, compliance, days_logged);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::storage::{KvStore, MemoryBlobStore};

    fn noon(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn store_at(day: u32) -> (UserStore, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(noon(day)));
        (UserStore::new(clock.clone()), clock)
    }

    fn item(price: u64) -> StoreItem {
        StoreItem {
            id: "theme-neon".into(),
            name: "Neon theme".into(),
            category: "themes".into(),
            price,
            purchased_at: None,
        }
    }

    fn entry(at: NaiveDateTime, calories: f64) -> FoodEntry {
        FoodEntry {
            id: uuid::Uuid::new_v4().to_string(),
            food_id: None,
            name: "Oats".into(),
            meal_type: MealType::Breakfast,
            portion_grams: 100.0,
            macros: Macros::new(calories, 10.0, 50.0, 5.0),
            logged_at: at,
        }
    }

    #[test]
    fn test_purchase_with_insufficient_balance() {
        let (store, _) = store_at(1);
        store.add_coins(1000);

        assert!(!store.purchase_item(item(1500)));
        assert_eq!(store.balance(), 1000);
        assert!(store.snapshot().economy.purchase_history.is_empty());
    }

    #[test]
    fn test_purchase_debits_exactly_once() {
        let (store, _) = store_at(1);
        store.add_coins(1000);

        assert!(store.purchase_item(item(400)));
        assert_eq!(store.balance(), 600);
        assert!(store.purchase_item(item(600)));
        assert_eq!(store.balance(), 0);

        let history = store.snapshot().economy.purchase_history;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|i| i.purchased_at == Some(noon(1))));
    }

    #[test]
    fn test_concurrent_purchases_never_overdraw() {
        let (store, _) = store_at(1);
        store.add_coins(1000);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.purchase_item(item(300)))
            })
            .collect();
        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(succeeded, 3);
        assert_eq!(store.balance(), 100);
        assert_eq!(store.snapshot().economy.purchase_history.len(), 3);
    }

    #[test]
    fn test_streak_updates() {
        let (store, clock) = store_at(1);

        assert!(store.update_streak());
        assert_eq!(store.snapshot().consistency.streak, 1);

        // Same day is a no-op
        assert!(!store.update_streak());
        assert_eq!(store.snapshot().consistency.streak, 1);

        clock.set(noon(2));
        store.update_streak();
        assert_eq!(store.snapshot().consistency.streak, 2);

        clock.set(noon(5));
        store.update_streak();
        let metrics = store.snapshot().consistency;
        assert_eq!(metrics.streak, 0);
        assert_eq!(metrics.last_streak_update, Some(noon(5)));
    }

    #[test]
    fn test_log_food_accumulates_and_scores() {
        let (store, _) = store_at(3);
        store.set_daily_targets(Macros::new(2000.0, 150.0, 200.0, 60.0));

        assert!(store.log_food(entry(noon(3), 900.0)));
        assert!(store.log_food(entry(noon(3), 900.0)));

        let log = store.today_log().unwrap();
        assert_eq!(log.entries.len(), 2);
        assert_eq!(log.consumed.calories, 1800.0);

        let metrics = store.snapshot().consistency;
        assert_eq!(metrics.days_logged_last_week, 1);
        assert!(metrics.score > 0);
    }

    #[test]
    fn test_log_food_rejects_other_days() {
        let (store, _) = store_at(3);
        assert!(!store.log_food(entry(noon(2), 500.0)));
        assert!(store.log_for(NaiveDate::from_ymd_opt(2026, 6, 2).unwrap()).is_none());
    }

    #[test]
    fn test_add_daily_log_never_decreases_today() {
        let (store, _) = store_at(3);
        let today = store.today();

        let mut first = DailyLog::empty(today);
        first.consumed = Macros::new(1200.0, 80.0, 100.0, 40.0);
        store.add_daily_log(first);

        let mut second = DailyLog::empty(today);
        second.consumed = Macros::new(800.0, 90.0, 50.0, 20.0);
        store.add_daily_log(second);

        let consumed = store.today_log().unwrap().consumed;
        assert_eq!(consumed, Macros::new(1200.0, 90.0, 100.0, 40.0));
    }

    #[test]
    fn test_closed_days_are_frozen() {
        let (store, clock) = store_at(3);
        let day = store.today();
        let mut log = DailyLog::empty(day);
        log.consumed.calories = 1500.0;
        store.add_daily_log(log.clone());

        clock.set(noon(4));
        log.consumed.calories = 3000.0;
        assert!(!store.add_daily_log(log));
        assert_eq!(store.log_for(day).unwrap().consumed.calories, 1500.0);
    }

    #[test]
    fn test_remaining_macros_never_negative() {
        let (store, _) = store_at(3);
        store.set_daily_targets(Macros::new(2000.0, 150.0, 200.0, 60.0));
        store.log_food(entry(noon(3), 2600.0));

        let remaining = store.remaining_macros().unwrap();
        assert_eq!(remaining.calories, 0.0);
        assert_eq!(remaining.protein, 140.0);
    }

    #[test]
    fn test_power_up_expires() {
        let (store, clock) = store_at(3);
        store.add_coins(100);
        assert!(store.dispatch(UserAction::ActivatePowerUp {
            kind: "double_xp".into(),
            price: 50,
            hours: 24,
        }));
        assert!(store.has_active_power_up("double_xp"));

        clock.advance(chrono::Duration::hours(25));
        assert!(!store.has_active_power_up("double_xp"));
        assert_eq!(store.balance(), 50);
    }

    struct FailingSource;

    #[async_trait]
    impl HealthDataSource for FailingSource {
        async fn fetch(&self, _date: NaiveDate) -> Result<HealthReading> {
            Err(crate::error::CoachError::HealthSync("token expired".into()))
        }
    }

    struct FixedSource;

    #[async_trait]
    impl HealthDataSource for FixedSource {
        async fn fetch(&self, _date: NaiveDate) -> Result<HealthReading> {
            Ok(HealthReading {
                metrics: HealthMetrics {
                    sleep_hours: Some(7.5),
                    weight_kg: Some(72.0),
                    ..Default::default()
                },
                steps: Some(8000),
            })
        }
    }

    #[tokio::test]
    async fn test_sync_health_data_records_error() {
        let (store, _) = store_at(3);
        store.sync_health_data(&FailingSource).await;

        assert!(!store.is_loading());
        assert!(store.error().unwrap().contains("token expired"));
    }

    #[tokio::test]
    async fn test_sync_health_data_updates_metrics() {
        let (store, _) = store_at(3);
        store.set_user(UserProfile {
            id: "u1".into(),
            ..Default::default()
        });
        store.sync_health_data(&FixedSource).await;

        let state = store.snapshot();
        assert_eq!(state.health[&store.today()].sleep_hours, Some(7.5));
        assert_eq!(state.profile.unwrap().weight_kg, Some(72.0));
        assert_eq!(store.today_log().unwrap().steps, 8000);
        assert!(store.error().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip_through_storage() {
        let kv = KvStore::new(Arc::new(MemoryBlobStore::new()));
        let clock = Arc::new(FixedClock::new(noon(3)));

        let store = UserStore::open(&kv, clock.clone()).await;
        store.set_user(UserProfile {
            id: "u1".into(),
            name: Some("Sam".into()),
            height_cm: Some(180.0),
            ..Default::default()
        });
        store.set_daily_targets(Macros::new(2200.0, 160.0, 220.0, 70.0));
        store.log_food(entry(noon(3), 450.0));
        store.add_coins(250);
        store.update_streak();
        store.write().is_loading = true;
        store.flush().await;

        let reloaded = UserStore::open(&kv, clock).await;
        let mut expected = store.snapshot();
        expected.is_loading = false;
        assert_eq!(reloaded.snapshot(), expected);
    }

    #[tokio::test]
    async fn test_hydrate_replaces_state() {
        let kv = KvStore::in_memory();
        let clock = Arc::new(FixedClock::new(noon(3)));
        let writer = UserStore::open(&kv, clock.clone()).await;
        writer.add_coins(40);
        writer.flush().await;

        let reader = UserStore::new(clock);
        assert_eq!(reader.balance(), 0);
        assert!(reader.hydrate(&kv).await);
        assert_eq!(reader.balance(), 40);
        assert!(!reader.hydrate(&KvStore::in_memory()).await);
    }
}
