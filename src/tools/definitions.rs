use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const SEARCH_FOOD_DATABASE: &str = "search_food_database";
pub const GET_USER_STATUS: &str = "get_user_status";
pub const LOG_VERIFIED_FOOD: &str = "log_verified_food";
pub const GET_FOOD_DETAILS: &str = "get_food_details";
pub const SEARCH_FITNESS_KNOWLEDGE: &str = "search_verified_fitness_knowledge";

/// A function the coach model may call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A tool call made by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Outcome of one tool call. Failures carry `error` rather than an `Err`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(tool_call_id: &str, data: serde_json::Value) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            success: true,
            data,
            error: None,
        }
    }

    pub fn failure(tool_call_id: &str, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.to_string(),
            success: false,
            data: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Tools exposed to the coach model
pub fn get_available_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: SEARCH_FOOD_DATABASE.to_string(),
            description: "Search the food database. Use this when the user asks about a food, wants meal ideas that fit their macros, or is about to log something. Returns at most 5 foods, verified sources first.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Free-text food search (e.g., 'greek yogurt', 'chicken')"
                    },
                    "verified_only": {
                        "type": "boolean",
                        "description": "Only return foods from authoritative databases"
                    },
                    "min_protein": {
                        "type": "number",
                        "description": "Minimum protein (g) per serving"
                    },
                    "max_calories": {
                        "type": "number",
                        "description": "Maximum calories (kcal) per serving"
                    },
                    "max_carbs": {
                        "type": "number",
                        "description": "Maximum carbohydrates (g) per serving"
                    },
                    "max_fat": {
                        "type": "number",
                        "description": "Maximum fat (g) per serving"
                    },
                    "category": {
                        "type": "string",
                        "description": "Food category (e.g., 'protein', 'dairy', 'grains')"
                    }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: GET_USER_STATUS.to_string(),
            description: "Get the user's progress for today: consumed and remaining macros, steps, and the current time of day. Use this before recommending what to eat next.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        Tool {
            name: LOG_VERIFIED_FOOD.to_string(),
            description: "Log a food from the database to today's food log. Only use this when the user explicitly asks to log or track a food.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "food_id": {
                        "type": "string",
                        "description": "The id returned by search_food_database"
                    },
                    "portion_grams": {
                        "type": "number",
                        "description": "Portion size in grams (defaults to 100)"
                    },
                    "meal_type": {
                        "type": "string",
                        "enum": ["breakfast", "lunch", "dinner", "snack"],
                        "description": "Meal to log under; inferred from the time of day if omitted"
                    }
                },
                "required": ["food_id"]
            }),
        },
        Tool {
            name: GET_FOOD_DETAILS.to_string(),
            description: "Get the full nutrition record for a single food.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "food_id": {
                        "type": "string",
                        "description": "The food id"
                    }
                },
                "required": ["food_id"]
            }),
        },
        Tool {
            name: SEARCH_FITNESS_KNOWLEDGE.to_string(),
            description: "Look up evidence-based fitness and nutrition guidance with citations. Use this when making claims about training, nutrition science, sleep or supplements.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to look up (e.g., 'protein for muscle gain')"
                    },
                    "category": {
                        "type": "string",
                        "description": "Optional category: nutrition, training, recovery, activity, supplements, weight"
                    }
                },
                "required": ["query"]
            }),
        },
    ]
}

/// Tool instructions appended to the coach system prompt
pub fn create_tool_system_prompt() -> String {
    let mut prompt = String::from(
        "You have access to the following tools. When you need one, respond with ONLY a JSON \
        object in this exact format:\n\
        {\n  \"tool\": \"tool_name\",\n  \"arguments\": { ... }\n}\n\n",
    );

    for tool in get_available_tools() {
        prompt.push_str(&format!(
            "Tool: {}\nDescription: {}\nParameters: {}\n\n",
            tool.name,
            tool.description,
            serde_json::to_string(&tool.parameters).unwrap_or_default()
        ));
    }

    prompt.push_str(
        "RULES:\n\
        1. Check get_user_status before suggesting what to eat next\n\
        2. Never log food unless the user asked you to\n\
        3. After a tool result arrives, answer the user in plain language\n\
        4. Cite the source when you use search_verified_fitness_knowledge",
    );
    prompt
}

static CODE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)```").expect("invalid regex"));

fn tool_call_from_json(json: &serde_json::Value) -> Option<ToolCall> {
    let name = json.get("tool").and_then(|t| t.as_str())?;
    let arguments = json
        .get("arguments")
        .cloned()
        .unwrap_or(serde_json::json!({}));
    Some(ToolCall {
        id: format!("call_{}", uuid::Uuid::new_v4()),
        name: name.to_string(),
        arguments,
    })
}

/// Extract tool calls from fenced JSON blocks, or a bare JSON reply
pub fn parse_tool_calls(response: &str) -> Vec<ToolCall> {
    let mut tool_calls: Vec<ToolCall> = CODE_BLOCK_RE
        .captures_iter(response)
        .filter_map(|cap| cap.get(1))
        .filter_map(|m| serde_json::from_str::<serde_json::Value>(m.as_str().trim()).ok())
        .filter_map(|json| tool_call_from_json(&json))
        .collect();

    if tool_calls.is_empty() {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(response.trim()) {
            tool_calls.extend(tool_call_from_json(&json));
        }
    }
    tool_calls
}

/// Response text with tool-call blocks removed
pub fn strip_tool_calls(response: &str) -> String {
    if serde_json::from_str::<serde_json::Value>(response.trim())
        .ok()
        .and_then(|json| tool_call_from_json(&json))
        .is_some()
    {
        return String::new();
    }
    CODE_BLOCK_RE.replace_all(response, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_are_unique() {
        let tools = get_available_tools();
        let mut names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 5);
    }

    #[test]
    fn test_parse_fenced_tool_call() {
        let response = "Let me check.\n```json\n{\"tool\": \"get_user_status\", \"arguments\": {}}\n```";
        let calls = parse_tool_calls(response);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, GET_USER_STATUS);
        assert!(calls[0].id.starts_with("call_"));
        assert_eq!(strip_tool_calls(response), "Let me check.");
    }

    #[test]
    fn test_parse_raw_tool_call() {
        let response = r#"{"tool": "log_verified_food", "arguments": {"food_id": "usda-171077", "portion_grams": 150}}"#;
        let calls = parse_tool_calls(response);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["portion_grams"], 150);
        assert_eq!(strip_tool_calls(response), "");
    }

    #[test]
    fn test_plain_text_has_no_calls() {
        assert!(parse_tool_calls("Great job hitting your protein today!").is_empty());
        assert!(parse_tool_calls("```json\n{\"not\": \"a tool\"}\n```").is_empty());
    }

    #[test]
    fn test_system_prompt_lists_every_tool() {
        let prompt = create_tool_system_prompt();
        for tool in get_available_tools() {
            assert!(prompt.contains(&format!("Tool: {}", tool.name)));
        }
    }
}
