//! Retention and per-day summaries.

use super::types::{CleanupReport, ConversationSummary, Role};
use super::{MemoryManager, conversation_key, summary_key};
use crate::clock::{date_key, parse_date_key};
use crate::storage::keys;
use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info};

impl MemoryManager {
    /// Delete conversations and summaries older than the retention window.
    ///
    /// Runs at most once per calendar day; the marker is written after the
    /// sweep so a failed sweep is retried on the next call. Takes no write
    /// lock: writers only touch today's conversation, which is never stale.
    pub async fn cleanup_old_conversations(&self) -> CleanupReport {
        let today = self.clock.today();
        let marker: Option<String> = self.kv.get(keys::LAST_CLEANUP).await;
        if marker.as_deref().and_then(parse_date_key) == Some(today) {
            debug!("Cleanup already ran today");
            return CleanupReport::default();
        }

        let cutoff = today - chrono::Duration::days(self.settings.retention_days);
        let mut report = CleanupReport {
            ran: true,
            ..Default::default()
        };

        for key in self.kv.keys().await {
            let (date, is_summary) = if let Some(rest) = key.strip_prefix(keys::CONVERSATION_PREFIX) {
                (parse_date_key(rest), false)
            } else if let Some(rest) = key.strip_prefix(keys::SUMMARY_PREFIX) {
                (parse_date_key(rest), true)
            } else {
                continue;
            };
            let Some(date) = date else { continue };
            if date >= cutoff || !self.kv.remove(&key).await {
                continue;
            }
            if is_summary {
                report.summaries_removed += 1;
            } else {
                report.conversations_removed += 1;
            }
        }

        self.kv.set(keys::LAST_CLEANUP, &date_key(today)).await;
        info!(
            conversations = report.conversations_removed,
            summaries = report.summaries_removed,
            cutoff = %cutoff,
            "Memory cleanup complete"
        );
        report
    }

    /// Summary for `date`, generated and cached on first request.
    ///
    /// A cached summary is regenerated once the conversation has grown.
    pub async fn get_summary(&self, date: NaiveDate) -> Option<ConversationSummary> {
        let conversation = self.get_conversation(date).await?;
        if let Some(cached) = self.kv.get::<ConversationSummary>(&summary_key(date)).await {
            if cached.message_count == conversation.messages.len() {
                return Some(cached);
            }
        }

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for message in &conversation.messages {
            for topic in &message.topics {
                *counts.entry(topic.as_str()).or_default() += 1;
            }
        }
        let mut topics: Vec<(&str, usize)> = counts.into_iter().collect();
        topics.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let summary = ConversationSummary {
            date,
            message_count: conversation.messages.len(),
            user_messages: conversation
                .messages
                .iter()
                .filter(|m| m.role == Role::User)
                .count(),
            topics: topics.into_iter().map(|(t, _)| t.to_string()).collect(),
            opening_request: conversation
                .messages
                .iter()
                .find(|m| m.role == Role::User)
                .map(|m| super::search::truncate_chars(&m.content, self.settings.excerpt_chars)),
            generated_at: self.clock.now(),
        };
        self.kv.set(&summary_key(date), &summary).await;
        debug!(date = %date_key(date), key = %conversation_key(date), "Summary generated");
        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{at, manager_at};
    use super::*;
    use crate::memory::{Conversation, MemoryManager, MemorySettings};
    use crate::storage::{BlobStore, KvStore, MemoryBlobStore};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    /// Backend whose removes are slow
    struct SlowRemoveStore {
        inner: MemoryBlobStore,
        delay: Duration,
    }

    #[async_trait]
    impl BlobStore for SlowRemoveStore {
        async fn get(&self, key: &str) -> crate::Result<Option<String>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> crate::Result<()> {
            self.inner.set(key, value).await
        }

        async fn remove(&self, key: &str) -> crate::Result<()> {
            tokio::time::sleep(self.delay).await;
            self.inner.remove(key).await
        }

        async fn keys(&self) -> crate::Result<Vec<String>> {
            self.inner.keys().await
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    #[tokio::test]
    async fn test_cleanup_respects_retention_window() {
        let (manager, _, kv) = manager_at(at(30, 9));
        let today = day(30);
        for age in [89, 90, 91, 120] {
            let date = today - chrono::Duration::days(age);
            let conversation = Conversation::new(date, date.and_hms_opt(8, 0, 0).unwrap());
            kv.set(&conversation_key(date), &conversation).await;
        }

        let report = manager.cleanup_old_conversations().await;
        assert!(report.ran);
        assert_eq!(report.conversations_removed, 2);

        let remaining = manager.conversation_dates().await;
        assert_eq!(
            remaining,
            vec![today - chrono::Duration::days(90), today - chrono::Duration::days(89)]
        );
    }

    #[tokio::test]
    async fn test_cleanup_once_per_day() {
        let (manager, clock, kv) = manager_at(at(30, 9));
        assert!(manager.cleanup_old_conversations().await.ran);

        let old = day(1) - chrono::Duration::days(100);
        kv.set(&conversation_key(old), &Conversation::new(old, at(1, 0))).await;
        let second = manager.cleanup_old_conversations().await;
        assert!(!second.ran);
        assert_eq!(manager.conversation_dates().await.len(), 1);

        clock.advance(chrono::Duration::days(1));
        let next_day = manager.cleanup_old_conversations().await;
        assert!(next_day.ran);
        assert_eq!(next_day.conversations_removed, 1);
    }

    #[tokio::test]
    async fn test_cleanup_removes_stale_summaries() {
        let (manager, clock, _) = manager_at(at(1, 9));
        manager.add_message(Role::User, "hello", Vec::new()).await;
        assert!(manager.get_summary(day(1)).await.is_some());

        clock.advance(chrono::Duration::days(120));
        let report = manager.cleanup_old_conversations().await;
        assert_eq!(report.conversations_removed, 1);
        assert_eq!(report.summaries_removed, 1);
    }

    #[tokio::test]
    async fn test_summary_counts_topics() {
        let (manager, _, _) = manager_at(at(3, 9));
        manager.add_message(Role::User, "Low sleep and a hard gym session", Vec::new()).await;
        manager.add_message(Role::Assistant, "Prioritise sleep tonight", Vec::new()).await;

        let summary = manager.get_summary(day(3)).await.unwrap();
        assert_eq!(summary.message_count, 2);
        assert_eq!(summary.user_messages, 1);
        assert_eq!(summary.topics[0], "sleep");
        assert_eq!(summary.opening_request.as_deref(), Some("Low sleep and a hard gym session"));

        manager.add_message(Role::User, "thanks", Vec::new()).await;
        assert_eq!(manager.get_summary(day(3)).await.unwrap().message_count, 3);
    }

    #[tokio::test]
    async fn test_summary_absent_without_conversation() {
        let (manager, _, _) = manager_at(at(3, 9));
        assert!(manager.get_summary(day(2)).await.is_none());
    }

    #[tokio::test]
    async fn test_cleanup_does_not_block_writers() {
        let kv = KvStore::new(Arc::new(SlowRemoveStore {
            inner: MemoryBlobStore::new(),
            delay: Duration::from_millis(100),
        }));
        let clock = Arc::new(crate::clock::FixedClock::new(at(30, 9)));
        let manager = MemoryManager::new(kv.clone(), clock, MemorySettings::default());
        for offset in 0..5 {
            let date = day(30) - chrono::Duration::days(100 + offset);
            kv.set(&conversation_key(date), &Conversation::new(date, at(1, 0))).await;
        }

        let sweeper = manager.clone();
        let cleanup = tokio::spawn(async move { sweeper.cleanup_old_conversations().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let started = Instant::now();
        manager.add_message(Role::User, "protein ideas?", Vec::new()).await;
        assert!(started.elapsed() < Duration::from_millis(100));

        let report = cleanup.await.unwrap();
        assert_eq!(report.conversations_removed, 5);
        assert_eq!(manager.conversation_dates().await, vec![day(30)]);
    }
}
