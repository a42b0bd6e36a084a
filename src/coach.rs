//! Chat Coach - one conversational turn end to end
//!
//! Records the user message, builds the system prompt from the user context
//! and memory, calls the model, runs any tool calls and records the reply.
//! Model failures never surface as errors; the turn ends with an offline
//! reply instead.

use crate::config::CoachConfig;
use crate::context::{ContextAggregator, format_for_prompt};
use crate::memory::{CleanupReport, ContentBlock, MemoryManager, Message, Role, search};
use crate::providers::retry::retry_with_backoff;
use crate::providers::{ChatMessage, CompletionClient, CompletionRequest};
use crate::state::{FoodEntry, UserStore};
use crate::tools::definitions::{self, create_tool_system_prompt, strip_tool_calls};
use crate::tools::{ToolExecutor, ToolResult, parse_tool_calls};
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const OFFLINE_REPLY: &str = "I'm having trouble connecting right now, so I'm in offline mode. \
Your message is saved and I'll pick this up once I'm back online. In the meantime, keep logging \
your meals and I'll catch up with you soon!";

pub const TOOL_LIMIT_REPLY: &str =
    "I gathered some information but couldn't finish that request. Could you ask again in a simpler way?";

const COACH_PERSONA: &str = "You are MacroCoach, a supportive, evidence-based nutrition and \
fitness coach. Keep answers short and practical, ground advice in the user's data below, and \
never invent numbers you were not given.";

#[derive(Debug, Clone)]
pub struct CoachSettings {
    pub max_tool_turns: usize,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub temperature: Option<f32>,
    /// Earlier messages from today sent along with each request
    pub history_messages: usize,
}

impl Default for CoachSettings {
    fn default() -> Self {
        Self {
            max_tool_turns: 3,
            max_retries: 2,
            retry_delay: Duration::from_millis(500),
            temperature: None,
            history_messages: 20,
        }
    }
}

impl CoachSettings {
    pub fn from_config(config: &CoachConfig) -> Self {
        Self {
            max_tool_turns: config.tools.max_tool_turns,
            max_retries: config.provider.max_retries,
            temperature: config.provider.temperature,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoachReply {
    pub message: Message,
    pub tool_results: Vec<ToolResult>,
    /// True when the model could not be reached
    pub offline: bool,
}

pub struct ChatCoach {
    client: Arc<dyn CompletionClient>,
    context: ContextAggregator,
    memory: MemoryManager,
    tools: ToolExecutor,
    settings: CoachSettings,
}

impl ChatCoach {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        store: Arc<UserStore>,
        memory: MemoryManager,
        tools: ToolExecutor,
        settings: CoachSettings,
    ) -> Self {
        Self {
            client,
            context: ContextAggregator::new(store),
            memory,
            tools,
            settings,
        }
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    /// Retention sweep off the request path
    pub fn spawn_cleanup(&self) -> JoinHandle<CleanupReport> {
        let memory = self.memory.clone();
        tokio::spawn(async move { memory.cleanup_old_conversations().await })
    }

    pub async fn build_system_prompt(&self, user_text: &str) -> String {
        let context = self.context.build_context().await;
        let mut prompt = format!("{}\n\n{}", COACH_PERSONA, format_for_prompt(&context));

        for topic in search::detect_topics(user_text).iter().take(2) {
            let recall = self.memory.get_context_for_topic(topic).await;
            if !recall.is_empty() {
                let _ = writeln!(prompt, "## Memory\n{}", recall);
            }
        }

        let plans = self.memory.get_active_plans().await;
        if !plans.is_empty() {
            let _ = writeln!(prompt, "## Saved Plans");
            for plan in &plans {
                let _ = writeln!(
                    prompt,
                    "- {} ({:?}): {}",
                    plan.name,
                    plan.plan_type,
                    search::truncate_chars(&plan.details, 200)
                );
            }
            prompt.push('\n');
        }

        prompt.push_str(&create_tool_system_prompt());
        prompt
    }

    async fn history(&self) -> Vec<ChatMessage> {
        let conversation = self.memory.get_today_conversation().await;
        let skip = conversation
            .messages
            .len()
            .saturating_sub(self.settings.history_messages);
        conversation
            .messages
            .into_iter()
            .skip(skip)
            .map(|m| match m.role {
                Role::User => ChatMessage::user(m.content),
                Role::Assistant => ChatMessage::assistant(m.content),
            })
            .collect()
    }

    /// Run one chat turn. Both sides of the turn are always recorded.
    pub async fn send(&self, text: &str) -> CoachReply {
        let system = self.build_system_prompt(text).await;
        let mut messages = vec![ChatMessage::system(system)];
        messages.extend(self.history().await);
        messages.push(ChatMessage::user(text));
        self.memory.add_message(Role::User, text, Vec::new()).await;

        let mut tool_results = Vec::new();
        let mut blocks = Vec::new();
        let mut offline = false;
        let mut turns = 0;

        let reply = loop {
            if !self.client.is_configured() {
                info!(client = self.client.name(), "No model configured, replying offline");
                offline = true;
                break OFFLINE_REPLY.to_string();
            }

            let request = CompletionRequest {
                messages: messages.clone(),
                temperature: self.settings.temperature,
                max_tokens: None,
            };
            let response = retry_with_backoff(self.settings.max_retries, self.settings.retry_delay, || {
                self.client.complete(request.clone())
            })
            .await;

            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, "Model unreachable, replying offline");
                    offline = true;
                    break OFFLINE_REPLY.to_string();
                }
            };

            let calls = parse_tool_calls(&response.content);
            if calls.is_empty() {
                break response.content.trim().to_string();
            }
            if turns >= self.settings.max_tool_turns {
                let text = strip_tool_calls(&response.content);
                break if text.is_empty() { TOOL_LIMIT_REPLY.to_string() } else { text };
            }
            turns += 1;

            messages.push(ChatMessage::assistant(response.content.clone()));
            for call in calls {
                let result = self.tools.execute(&call).await;
                debug!(tool = %call.name, success = result.success, "Tool result");
                if let Some(card) = food_card(&call.name, &result) {
                    blocks.push(card);
                }
                blocks.push(ContentBlock::ToolResult {
                    tool: call.name.clone(),
                    success: result.success,
                    data: result.data.clone(),
                });
                messages.push(ChatMessage::user(format!(
                    "[Tool result for {}]: {}",
                    call.name,
                    serde_json::to_string(&result).unwrap_or_default()
                )));
                tool_results.push(result);
            }
        };

        let message = self.memory.add_message(Role::Assistant, &reply, blocks).await;
        CoachReply {
            message,
            tool_results,
            offline,
        }
    }
}

fn food_card(tool: &str, result: &ToolResult) -> Option<ContentBlock> {
    if tool != definitions::LOG_VERIFIED_FOOD || !result.success {
        return None;
    }
    let entry: FoodEntry = serde_json::from_value(result.data.clone()).ok()?;
    Some(ContentBlock::FoodCard {
        food_id: entry.food_id.unwrap_or(entry.id),
        name: entry.name,
        calories: entry.macros.calories,
        protein: entry.macros.protein,
    })
}
