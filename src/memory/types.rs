//! Memory Types - conversations, summaries, plans and search results

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Coach",
        }
    }
}

/// Structured attachments rendered alongside a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    FoodCard {
        food_id: String,
        name: String,
        calories: f64,
        protein: f64,
    },
    PlanRef {
        plan_id: String,
        name: String,
    },
    ToolResult {
        tool: String,
        success: bool,
        data: serde_json::Value,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<ContentBlock>,
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub topics: Vec<String>,
}

/// All messages exchanged on one calendar day
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub date: NaiveDate,
    pub messages: Vec<Message>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Conversation {
    pub fn new(date: NaiveDate, now: NaiveDateTime) -> Self {
        Self {
            date,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn last_timestamp(&self) -> Option<NaiveDateTime> {
        self.messages.last().map(|m| m.timestamp)
    }
}

/// Derived view of a conversation, cached per date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationSummary {
    pub date: NaiveDate,
    pub message_count: usize,
    pub user_messages: usize,
    /// Most frequent first
    pub topics: Vec<String>,
    pub opening_request: Option<String>,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanType {
    Meal,
    Workout,
    Supplement,
    Habit,
    Other,
}

impl PlanType {
    pub fn parse(value: &str) -> PlanType {
        match value.trim().to_lowercase().as_str() {
            "meal" | "meal_plan" | "nutrition" => PlanType::Meal,
            "workout" | "training" => PlanType::Workout,
            "supplement" | "supplements" => PlanType::Supplement,
            "habit" => PlanType::Habit,
            _ => PlanType::Other,
        }
    }
}

/// A saved recommendation. Duplicates by name/type are allowed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: String,
    pub plan_type: PlanType,
    pub name: String,
    pub details: String,
    pub created_at: NaiveDateTime,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
}

impl Plan {
    /// Inclusive on both ends; an open end is unbounded
    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.valid_from.is_none_or(|from| from <= date)
            && self.valid_until.is_none_or(|until| date <= until)
    }
}

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub plan_type: PlanType,
    pub name: String,
    pub details: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_until: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub topic: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            date_from: None,
            date_to: None,
            topic: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchHit {
    pub date: NaiveDate,
    pub message: Message,
    pub score: u32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CleanupReport {
    /// False when cleanup already ran today
    pub ran: bool,
    pub conversations_removed: usize,
    pub summaries_removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub conversations: usize,
    pub messages: usize,
    pub plans: usize,
    pub oldest: Option<NaiveDate>,
}

impl MemoryStats {
    pub fn format(&self) -> String {
        format!(
            "Memory Stats:\n\
            - Conversations: {}\n\
            - Messages: {}\n\
            - Plans: {}\n\
            - Oldest day: {}",
            self.conversations,
            self.messages,
            self.plans,
            self.oldest
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }
}
