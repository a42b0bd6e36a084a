//! Memory Manager - per-day coaching transcripts
//!
//! Owns the conversation, summary, plan and last-cleanup keys. Every public
//! operation degrades to an empty/absent result when storage fails.

pub mod consolidation;
pub mod plans;
pub mod search;
pub mod types;

pub use types::*;

use crate::clock::{Clock, date_key, parse_date_key};
use crate::storage::{KvStore, keys};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Upper bound on hits considered when rendering topic context
const TOPIC_SEARCH_LIMIT: usize = 30;

#[derive(Debug, Clone)]
pub struct MemorySettings {
    pub max_messages: usize,
    pub retention_days: i64,
    pub max_plans: usize,
    pub search_limit: usize,
    /// Per-message character budget in topic context
    pub excerpt_chars: usize,
    pub matches_per_day: usize,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            max_messages: 100,
            retention_days: 90,
            max_plans: 50,
            search_limit: 10,
            excerpt_chars: 200,
            matches_per_day: 5,
        }
    }
}

#[derive(Clone)]
pub struct MemoryManager {
    kv: KvStore,
    clock: Arc<dyn Clock>,
    settings: MemorySettings,
    /// Serializes read-modify-write cycles on memory keys
    write_lock: Arc<Mutex<()>>,
}

fn conversation_key(date: NaiveDate) -> String {
    format!("{}{}", keys::CONVERSATION_PREFIX, date_key(date))
}

fn summary_key(date: NaiveDate) -> String {
    format!("{}{}", keys::SUMMARY_PREFIX, date_key(date))
}

impl MemoryManager {
    pub fn new(kv: KvStore, clock: Arc<dyn Clock>, settings: MemorySettings) -> Self {
        Self {
            kv,
            clock,
            settings,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn settings(&self) -> &MemorySettings {
        &self.settings
    }

    /// Today's conversation, created (and stored) if this is the first access
    pub async fn get_today_conversation(&self) -> Conversation {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        match self.get_conversation(now.date()).await {
            Some(conversation) => conversation,
            None => {
                let conversation = Conversation::new(now.date(), now);
                self.save_conversation(&conversation).await;
                conversation
            }
        }
    }

    pub async fn get_conversation(&self, date: NaiveDate) -> Option<Conversation> {
        self.kv.get(&conversation_key(date)).await
    }

    async fn save_conversation(&self, conversation: &Conversation) -> bool {
        self.kv
            .set(&conversation_key(conversation.date), conversation)
            .await
    }

    /// Append to today's conversation, trimming the oldest past the cap
    pub async fn add_message(&self, role: Role, content: &str, blocks: Vec<ContentBlock>) -> Message {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let mut conversation = self
            .get_conversation(now.date())
            .await
            .unwrap_or_else(|| Conversation::new(now.date(), now));

        // Keep timestamps non-decreasing even if the clock steps back
        let timestamp = conversation
            .last_timestamp()
            .map_or(now, |last| last.max(now));

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.to_string(),
            blocks,
            timestamp,
            pinned: false,
            topics: search::detect_topics(content),
        };
        conversation.messages.push(message.clone());

        let max = self.settings.max_messages;
        if conversation.messages.len() > max {
            let excess = conversation.messages.len() - max;
            conversation.messages.drain(..excess);
            debug!(date = %conversation.date, trimmed = excess, "Trimmed oldest messages");
        }
        conversation.updated_at = now;

        if !self.save_conversation(&conversation).await {
            warn!(date = %conversation.date, "Message kept in memory only, storage write failed");
        }
        message
    }

    /// Flip the pinned flag; false if the message does not exist
    pub async fn toggle_pin(&self, date: NaiveDate, message_id: &str) -> bool {
        let _guard = self.write_lock.lock().await;
        let Some(mut conversation) = self.get_conversation(date).await else {
            return false;
        };
        let Some(message) = conversation.messages.iter_mut().find(|m| m.id == message_id) else {
            return false;
        };
        message.pinned = !message.pinned;
        self.save_conversation(&conversation).await
    }

    pub async fn get_pinned_messages(&self) -> Vec<(NaiveDate, Message)> {
        self.load_conversations()
            .await
            .into_iter()
            .flat_map(|c| {
                let date = c.date;
                c.messages
                    .into_iter()
                    .filter(|m| m.pinned)
                    .map(move |m| (date, m))
            })
            .collect()
    }

    /// Dates that have a stored conversation, oldest first
    pub async fn conversation_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .kv
            .keys()
            .await
            .iter()
            .filter_map(|k| k.strip_prefix(keys::CONVERSATION_PREFIX))
            .filter_map(parse_date_key)
            .collect();
        dates.sort();
        dates
    }

    async fn load_conversations(&self) -> Vec<Conversation> {
        let mut conversations = Vec::new();
        for date in self.conversation_dates().await {
            if let Some(conversation) = self.get_conversation(date).await {
                conversations.push(conversation);
            }
        }
        conversations
    }

    /// Conversations from the last `days` days including today, newest first
    pub async fn get_recent_conversations(&self, days: u32) -> Vec<Conversation> {
        let today = self.clock.today();
        let start = today - chrono::Duration::days(i64::from(days.saturating_sub(1)));
        let mut recent = Vec::new();
        for date in self.conversation_dates().await.into_iter().rev() {
            if date < start {
                break;
            }
            if date > today {
                continue;
            }
            if let Some(conversation) = self.get_conversation(date).await {
                recent.push(conversation);
            }
        }
        recent
    }

    pub async fn search_memory(&self, query: &str, options: &SearchOptions) -> Vec<SearchHit> {
        let conversations = self.load_conversations().await;
        let hits = search::rank(&conversations, query, options);
        debug!(query, hits = hits.len(), scanned = conversations.len(), "Memory search");
        hits
    }

    /// Default-limit search
    pub async fn search(&self, query: &str) -> Vec<SearchHit> {
        let options = SearchOptions {
            limit: self.settings.search_limit,
            ..Default::default()
        };
        self.search_memory(query, &options).await
    }

    /// Prompt block of past exchanges about `topic`; empty when nothing matches
    pub async fn get_context_for_topic(&self, topic: &str) -> String {
        let options = SearchOptions {
            limit: TOPIC_SEARCH_LIMIT,
            topic: Some(topic.to_string()),
            ..Default::default()
        };
        let hits = self.search_memory(topic, &options).await;
        if hits.is_empty() {
            return String::new();
        }

        let mut by_date: BTreeMap<NaiveDate, Vec<&SearchHit>> = BTreeMap::new();
        for hit in &hits {
            let day = by_date.entry(hit.date).or_default();
            if day.len() < self.settings.matches_per_day {
                day.push(hit);
            }
        }

        let mut out = format!("Previous conversations about \"{}\":\n", topic);
        for (date, day_hits) in by_date.iter().rev() {
            let _ = writeln!(out, "[{}]", date_key(*date));
            for hit in day_hits {
                let _ = writeln!(
                    out,
                    "- {}: {}",
                    hit.message.role.label(),
                    search::truncate_chars(&hit.message.content, self.settings.excerpt_chars)
                );
            }
        }
        out
    }

    pub async fn stats(&self) -> MemoryStats {
        let conversations = self.load_conversations().await;
        MemoryStats {
            conversations: conversations.len(),
            messages: conversations.iter().map(|c| c.messages.len()).sum(),
            plans: self.get_plans().await.len(),
            oldest: conversations.first().map(|c| c.date),
        }
    }

    /// Remove every memory-owned key
    pub async fn clear_all(&self) -> bool {
        let _guard = self.write_lock.lock().await;
        let mut ok = true;
        for key in self.kv.keys().await {
            let owned = key.starts_with(keys::CONVERSATION_PREFIX)
                || key.starts_with(keys::SUMMARY_PREFIX)
                || key == keys::PLANS
                || key == keys::LAST_CLEANUP;
            if owned {
                ok &= self.kv.remove(&key).await;
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::NaiveDateTime;

    pub(crate) fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 6, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    pub(crate) fn manager_at(now: NaiveDateTime) -> (MemoryManager, Arc<FixedClock>, KvStore) {
        let clock = Arc::new(FixedClock::new(now));
        let kv = KvStore::in_memory();
        let manager = MemoryManager::new(kv.clone(), clock.clone(), MemorySettings::default());
        (manager, clock, kv)
    }

    #[tokio::test]
    async fn test_conversation_is_lazy() {
        let (manager, _, _) = manager_at(at(1, 9));
        assert!(manager.conversation_dates().await.is_empty());

        let conversation = manager.get_today_conversation().await;
        assert!(conversation.messages.is_empty());
        assert_eq!(manager.conversation_dates().await.len(), 1);
    }

    #[tokio::test]
    async fn test_message_cap_keeps_most_recent() {
        let (manager, clock, _) = manager_at(at(1, 8));
        for i in 0..101 {
            clock.advance(chrono::Duration::seconds(1));
            manager.add_message(Role::User, &format!("message {i}"), Vec::new()).await;
        }

        let conversation = manager.get_today_conversation().await;
        assert_eq!(conversation.messages.len(), 100);
        assert_eq!(conversation.messages[0].content, "message 1");
        assert_eq!(conversation.messages[99].content, "message 100");
    }

    #[tokio::test]
    async fn test_timestamps_never_decrease() {
        let (manager, clock, _) = manager_at(at(1, 12));
        manager.add_message(Role::User, "first", Vec::new()).await;
        clock.set(at(1, 11));
        let second = manager.add_message(Role::Assistant, "second", Vec::new()).await;

        assert_eq!(second.timestamp, at(1, 12));
    }

    #[tokio::test]
    async fn test_messages_land_in_their_day() {
        let (manager, clock, _) = manager_at(at(1, 23));
        manager.add_message(Role::User, "late night snack?", Vec::new()).await;
        clock.set(at(2, 7));
        manager.add_message(Role::User, "breakfast ideas", Vec::new()).await;

        let dates = manager.conversation_dates().await;
        assert_eq!(dates.len(), 2);
        let recent = manager.get_recent_conversations(7).await;
        assert_eq!(recent[0].messages[0].content, "breakfast ideas");
    }

    #[tokio::test]
    async fn test_toggle_pin() {
        let (manager, _, _) = manager_at(at(1, 9));
        let message = manager.add_message(Role::Assistant, "Aim for 30 g protein at breakfast", Vec::new()).await;

        assert!(manager.toggle_pin(message.timestamp.date(), &message.id).await);
        let pinned = manager.get_pinned_messages().await;
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].1.id, message.id);

        assert!(!manager.toggle_pin(message.timestamp.date(), "missing").await);
    }

    #[tokio::test]
    async fn test_topic_context_groups_and_truncates() {
        let (manager, clock, _) = manager_at(at(1, 9));
        let long = format!("protein {}", "x".repeat(400));
        for _ in 0..7 {
            manager.add_message(Role::User, &long, Vec::new()).await;
        }
        clock.set(at(2, 9));
        manager.add_message(Role::Assistant, "More protein at lunch", Vec::new()).await;

        let block = manager.get_context_for_topic("protein").await;
        assert!(block.starts_with("Previous conversations about \"protein\""));
        // newest date first
        assert!(block.find("[2026-06-02]").unwrap() < block.find("[2026-06-01]").unwrap());
        assert_eq!(block.matches("- User: ").count(), 5);
        assert!(block.lines().all(|l| l.chars().count() <= 200 + "- User: ...".len()));
    }

    #[tokio::test]
    async fn test_topic_context_empty_without_hits() {
        let (manager, _, _) = manager_at(at(1, 9));
        manager.add_message(Role::User, "hello", Vec::new()).await;
        assert_eq!(manager.get_context_for_topic("sleep").await, "");
    }

    #[tokio::test]
    async fn test_search_survives_storage_failure() {
        let backend = Arc::new(crate::storage::MemoryBlobStore::new());
        let kv = KvStore::new(backend.clone());
        let clock = Arc::new(FixedClock::new(at(1, 9)));
        let manager = MemoryManager::new(kv, clock, MemorySettings::default());
        manager.add_message(Role::User, "protein", Vec::new()).await;

        backend.set_failing(true);
        assert!(manager.search("protein").await.is_empty());
        // Writes still hand back the message
        let message = manager.add_message(Role::User, "still here", Vec::new()).await;
        assert_eq!(message.content, "still here");
    }

    #[tokio::test]
    async fn test_clear_all_leaves_user_keys() {
        let (manager, _, kv) = manager_at(at(1, 9));
        kv.set(keys::USER_STORE, &"{}").await;
        manager.add_message(Role::User, "hi", Vec::new()).await;

        assert!(manager.clear_all().await);
        assert_eq!(kv.keys().await, vec![keys::USER_STORE.to_string()]);
    }
}
