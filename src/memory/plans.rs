//! Saved plans, stored as one list under the `plans` key.

use super::MemoryManager;
use super::types::{NewPlan, Plan, PlanType};
use crate::storage::keys;
use tracing::{debug, warn};

impl MemoryManager {
    pub async fn get_plans(&self) -> Vec<Plan> {
        self.kv.get(keys::PLANS).await.unwrap_or_default()
    }

    /// Store a new plan, dropping the oldest once the list is over capacity
    pub async fn save_plan(&self, new: NewPlan) -> Plan {
        let _guard = self.write_lock.lock().await;
        let plan = Plan {
            id: uuid::Uuid::new_v4().to_string(),
            plan_type: new.plan_type,
            name: new.name,
            details: new.details,
            created_at: self.clock.now(),
            valid_from: new.valid_from,
            valid_until: new.valid_until,
        };

        let mut plans = self.get_plans().await;
        plans.push(plan.clone());
        if plans.len() > self.settings.max_plans {
            let excess = plans.len() - self.settings.max_plans;
            plans.drain(..excess);
            debug!(dropped = excess, "Plan list over capacity");
        }
        if !self.kv.set(keys::PLANS, &plans).await {
            warn!(plan = %plan.name, "Plan not persisted");
        }
        plan
    }

    /// Plans valid today
    pub async fn get_active_plans(&self) -> Vec<Plan> {
        let today = self.clock.today();
        self.get_plans()
            .await
            .into_iter()
            .filter(|p| p.is_active_on(today))
            .collect()
    }

    /// Plans of one type valid today
    pub async fn get_plans_by_type(&self, plan_type: PlanType) -> Vec<Plan> {
        self.get_active_plans()
            .await
            .into_iter()
            .filter(|p| p.plan_type == plan_type)
            .collect()
    }

    pub async fn delete_plan(&self, id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let mut plans = self.get_plans().await;
        let before = plans.len();
        plans.retain(|p| p.id != id);
        if plans.len() == before {
            return false;
        }
        self.kv.set(keys::PLANS, &plans).await
    }
}
