//! Keyword scoring over stored conversations.
//!
//! A linear scan: the corpus is bounded by retention (90 days) and the
//! per-day message cap (100).

use super::types::{Conversation, Message, SearchHit, SearchOptions};

const TERM_WEIGHT: u32 = 1;
const EXACT_PHRASE_BONUS: u32 = 3;
const TOPIC_BONUS: u32 = 2;

/// Keyword table for topic tagging
const TOPIC_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "nutrition",
        &[
            "meal", "protein", "calorie", "carb", "fat", "eat", "food", "diet", "macro", "snack",
            "breakfast", "lunch", "dinner", "recipe",
        ],
    ),
    (
        "workout",
        &[
            "workout", "exercise", "gym", "run", "lift", "training", "cardio", "squat", "steps",
            "strength",
        ],
    ),
    ("sleep", &["sleep", "tired", "nap", "insomnia", "bedtime"]),
    (
        "cycle",
        &["period", "cycle", "pms", "menstrual", "ovulation", "luteal", "follicular"],
    ),
    (
        "stress",
        &["stress", "anxious", "anxiety", "overwhelmed", "calm", "breathing", "respiration"],
    ),
    ("hydration", &["water", "hydrat", "thirst"]),
    ("weight", &["weight", "scale", "kg", "lbs", "plateau"]),
    ("supplements", &["supplement", "creatine", "vitamin", "magnesium", "caffeine"]),
];

/// Topics mentioned in `content`, in table order
pub fn detect_topics(content: &str) -> Vec<String> {
    let lower = content.to_lowercase();
    TOPIC_KEYWORDS
        .iter()
        .filter(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(topic, _)| topic.to_string())
        .collect()
}

/// Query terms worth matching: lowercase, longer than two characters
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

pub fn score_message(message: &Message, terms: &[String], phrase: &str, topic: Option<&str>) -> u32 {
    let content = message.content.to_lowercase();
    let mut score = terms
        .iter()
        .filter(|t| content.contains(t.as_str()))
        .count() as u32
        * TERM_WEIGHT;

    if !phrase.is_empty() && content.contains(phrase) {
        score += EXACT_PHRASE_BONUS;
    }
    if let Some(topic) = topic {
        if message.topics.iter().any(|t| t.eq_ignore_ascii_case(topic)) {
            score += TOPIC_BONUS;
        }
    }
    score
}

/// Score every message, drop non-matches, best first, truncated to `limit`
pub fn rank(conversations: &[Conversation], query: &str, options: &SearchOptions) -> Vec<SearchHit> {
    let terms = tokenize(query);
    let phrase = query.trim().to_lowercase();
    let topic = options.topic.as_deref();

    let mut hits: Vec<SearchHit> = conversations
        .iter()
        .filter(|c| options.date_from.is_none_or(|from| c.date >= from))
        .filter(|c| options.date_to.is_none_or(|to| c.date <= to))
        .flat_map(|c| {
            c.messages.iter().filter_map(|m| {
                let score = score_message(m, &terms, &phrase, topic);
                (score > 0).then(|| SearchHit {
                    date: c.date,
                    message: m.clone(),
                    score,
                })
            })
        })
        .collect();

    // Ties go to the more recent message
    hits.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.message.timestamp.cmp(&a.message.timestamp))
    });
    hits.truncate(options.limit);
    hits
}

/// First `max_chars` characters, with an ellipsis when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::Role;
    use chrono::NaiveDate;

    fn message(content: &str, minute: u32) -> Message {
        Message {
            id: format!("m{minute}"),
            role: Role::User,
            content: content.to_string(),
            blocks: Vec::new(),
            timestamp: NaiveDate::from_ymd_opt(2026, 6, 1)
                .unwrap()
                .and_hms_opt(10, minute, 0)
                .unwrap(),
            pinned: false,
            topics: detect_topics(content),
        }
    }

    fn conversation(day: u32, contents: &[&str]) -> Conversation {
        let date = NaiveDate::from_ymd_opt(2026, 6, day).unwrap();
        let now = date.and_hms_opt(10, 0, 0).unwrap();
        let mut conv = Conversation::new(date, now);
        for (i, content) in contents.iter().enumerate() {
            conv.messages.push(message(content, i as u32));
        }
        conv
    }

    #[test]
    fn test_tokenize_drops_short_terms() {
        assert_eq!(tokenize("How do I eat more protein?"), vec!["how", "eat", "more", "protein"]);
        assert!(tokenize("a an").is_empty());
    }

    #[test]
    fn test_detect_topics() {
        assert_eq!(detect_topics("Poor sleep before my gym session"), vec!["workout", "sleep"]);
        assert!(detect_topics("hello there").is_empty());
    }

    #[test]
    fn test_scoring_weights() {
        let msg = message("I want high protein breakfast ideas", 0);
        let terms = tokenize("protein breakfast");

        // two terms + exact phrase
        assert_eq!(score_message(&msg, &terms, "protein breakfast", None), 5);
        // plus topic
        assert_eq!(score_message(&msg, &terms, "protein breakfast", Some("nutrition")), 7);
        assert_eq!(score_message(&msg, &terms, "protein breakfast", Some("sleep")), 5);
    }

    #[test]
    fn test_rank_orders_and_limits() {
        let conversations = vec![
            conversation(1, &["protein shake after workout", "random chat"]),
            conversation(2, &["how much protein per day", "protein per day for cutting"]),
        ];
        let options = SearchOptions {
            limit: 2,
            ..Default::default()
        };

        let hits = rank(&conversations, "protein per day", &options);
        assert_eq!(hits.len(), 2);
        // protein + per + day, plus the phrase bonus
        assert!(hits.iter().all(|h| h.score == 6));
        // Equal scores: later message first
        assert_eq!(hits[0].message.content, "protein per day for cutting");
    }

    #[test]
    fn test_rank_date_filter() {
        let conversations = vec![
            conversation(1, &["sleep was bad"]),
            conversation(5, &["sleep was great"]),
        ];
        let options = SearchOptions {
            date_from: NaiveDate::from_ymd_opt(2026, 6, 3),
            ..Default::default()
        };

        let hits = rank(&conversations, "sleep", &options);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].date, NaiveDate::from_ymd_opt(2026, 6, 5).unwrap());
    }

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo...");
    }
}
