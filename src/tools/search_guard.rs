//! Debounced food search with request-id fencing.
//!
//! Each call takes a new id from a monotonic counter. A call that is no
//! longer the latest after the debounce delay, or after its response lands,
//! yields `None` instead of stale results.

use super::food::{FoodDataSource, FoodItem};
use crate::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

pub struct DebouncedSearch {
    source: Arc<dyn FoodDataSource>,
    delay: Duration,
    latest: AtomicU64,
}

impl DebouncedSearch {
    pub fn new(source: Arc<dyn FoodDataSource>, delay: Duration) -> Self {
        Self {
            source,
            delay,
            latest: AtomicU64::new(0),
        }
    }

    fn is_current(&self, id: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == id
    }

    /// `None` when a newer search superseded this one
    pub async fn search(&self, query: &str) -> Option<Result<Vec<FoodItem>>> {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if !self.is_current(id) {
            debug!(request_id = id, query, "Search superseded during debounce");
            return None;
        }

        let result = self.source.search(query).await;
        if !self.is_current(id) {
            debug!(request_id = id, query, "Discarding stale search response");
            return None;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::food::InMemoryFoodDatabase;
    use async_trait::async_trait;

    /// Delays responses for queries starting with "slow"
    struct SlowSource(InMemoryFoodDatabase);

    #[async_trait]
    impl FoodDataSource for SlowSource {
        async fn search(&self, query: &str) -> Result<Vec<FoodItem>> {
            if let Some(rest) = query.strip_prefix("slow ") {
                tokio::time::sleep(Duration::from_millis(80)).await;
                return self.0.search(rest).await;
            }
            self.0.search(query).await
        }

        async fn get(&self, id: &str) -> Result<Option<FoodItem>> {
            self.0.get(id).await
        }
    }

    fn guard(delay_ms: u64) -> DebouncedSearch {
        let db = InMemoryFoodDatabase::builtin().unwrap();
        DebouncedSearch::new(Arc::new(SlowSource(db)), Duration::from_millis(delay_ms))
    }

    #[tokio::test]
    async fn test_rapid_queries_only_fire_last() {
        let search = guard(20);
        let (first, second) = tokio::join!(search.search("chick"), search.search("chicken"));

        assert!(first.is_none());
        let foods = second.unwrap().unwrap();
        assert!(foods.iter().all(|f| f.name.to_lowercase().contains("chicken")));
    }

    #[tokio::test]
    async fn test_out_of_order_response_is_dropped() {
        let search = guard(5);
        let late = async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            search.search("salmon").await
        };
        let (slow, fast) = tokio::join!(search.search("slow egg"), late);

        assert!(slow.is_none());
        assert_eq!(fast.unwrap().unwrap()[0].id, "usda-175167");
    }

    #[tokio::test]
    async fn test_single_query_returns_results() {
        let search = guard(1);
        let foods = search.search("oats").await.unwrap().unwrap();
        assert_eq!(foods.len(), 1);
    }
}
