use async_trait::async_trait;
use pilot_core::{Message, PilotError, Result, ToolCall};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::provider::*;

/// OpenAI-compatible chat-completions provider (OpenAI, Azure, vLLM, etc.)
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    provider_name: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com/v1".into(),
            provider_name: "openai".into(),
        }
    }

    /// Use a custom base URL (for proxies and compatible servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.provider_name
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let body = build_body(request);
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat completion"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| PilotError::LlmProvider(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(PilotError::LlmProvider(format!("HTTP {status}: {text}")));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| PilotError::LlmProvider(e.to_string()))?;

        parse_response(&data)
    }

    async fn health_check(&self) -> Result<()> {
        info!(provider = self.provider_name, "checking API health");
        if self.api_key.is_empty() {
            return Err(PilotError::LlmProvider(format!(
                "{} API key not set",
                self.provider_name
            )));
        }
        Ok(())
    }
}

/// Build the chat-completions request body.
pub(crate) fn build_body(request: &LlmRequest) -> Value {
    let mut messages = Vec::new();

    if let Some(ref system) = request.system {
        messages.push(json!({
            "role": "system",
            "content": system,
        }));
    }

    for msg in &request.messages {
        match msg {
            Message::System { text } => {
                messages.push(json!({ "role": "system", "content": text }));
            }
            Message::Human { text } => {
                messages.push(json!({ "role": "user", "content": text }));
            }
            Message::Assistant { text, tool_calls } if tool_calls.is_empty() => {
                messages.push(json!({ "role": "assistant", "content": text }));
            }
            Message::Assistant { text, tool_calls } => {
                // Assistant message with tool calls must include the tool_calls array
                let tc: Vec<Value> = tool_calls
                    .iter()
                    .map(|tc| {
                        json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.tool_name,
                                "arguments": encode_arguments(&tc.arguments),
                            }
                        })
                    })
                    .collect();
                let content = if text.is_empty() { Value::Null } else { json!(text) };
                messages.push(json!({
                    "role": "assistant",
                    "content": content,
                    "tool_calls": tc,
                }));
            }
            Message::ToolResult(result) => {
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": result.tool_call_id,
                    "content": result.content(),
                }));
            }
        }
    }

    let mut body = json!({
        "model": &request.model,
        "temperature": request.temperature,
        "messages": messages,
    });

    // Newer OpenAI models (o1, o3, gpt-5, …) require max_completion_tokens
    if uses_max_completion_tokens(&request.model) {
        body["max_completion_tokens"] = json!(request.max_tokens);
    } else {
        body["max_tokens"] = json!(request.max_tokens);
    }

    if !request.tools.is_empty() {
        let tools: Vec<Value> = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.json_schema(),
                    }
                })
            })
            .collect();
        body["tools"] = json!(tools);
    }

    body
}

/// Arguments that were kept as raw text (unparseable) go back verbatim.
fn encode_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

/// Parse a chat-completions response body.
pub(crate) fn parse_response(data: &Value) -> Result<LlmResponse> {
    let choice = data["choices"]
        .get(0)
        .ok_or_else(|| PilotError::MalformedOutput("response has no choices".into()))?;
    let message = &choice["message"];
    let text = message["content"].as_str().unwrap_or("").to_string();

    let mut tool_calls = Vec::new();
    if let Some(calls) = message["tool_calls"].as_array() {
        for c in calls {
            let tool_name = c["function"]["name"].as_str().ok_or_else(|| {
                PilotError::MalformedOutput("tool call without a function name".into())
            })?;
            let id = c["id"]
                .as_str()
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4()));
            let raw = c["function"]["arguments"].as_str().unwrap_or("{}");
            // Unparseable arguments are kept as text and rejected at execution time.
            let arguments = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.into()));
            tool_calls.push(ToolCall {
                id,
                tool_name: tool_name.to_string(),
                arguments,
            });
        }
    }

    let has_tool_calls = !tool_calls.is_empty();
    let finish_reason = choice["finish_reason"].as_str().unwrap_or("");
    let usage_data = &data["usage"];

    Ok(LlmResponse {
        text,
        tool_calls,
        usage: Usage {
            input_tokens: usage_data["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            output_tokens: usage_data["completion_tokens"].as_u64().unwrap_or(0) as u32,
        },
        stop_reason: match finish_reason {
            "length" => StopReason::MaxTokens,
            "content_filter" => StopReason::ContentFilter,
            _ if has_tool_calls => StopReason::ToolUse,
            _ => StopReason::EndTurn,
        },
    })
}

/// Returns true for models that require `max_completion_tokens` instead of `max_tokens`.
fn uses_max_completion_tokens(model: &str) -> bool {
    let m = model.to_lowercase();
    m.starts_with("o1")
        || m.starts_with("o3")
        || m.starts_with("o4")
        || m.contains("gpt-5")
        || m.contains("gpt5")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pilot_core::{ParamKind, ParamSpec, ToolDefinition, ToolResult};

    fn request(messages: Vec<Message>) -> LlmRequest {
        LlmRequest {
            model: "gpt-4o-mini".into(),
            messages,
            tools: vec![],
            system: Some("directive".into()),
            max_tokens: 256,
            temperature: 0.2,
        }
    }

    #[test]
    fn test_body_puts_system_first() {
        let body = build_body(&request(vec![Message::human("hi")]));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[0]["content"], "directive");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(body["max_tokens"], 256);
    }

    #[test]
    fn test_body_encodes_tool_round_trip() {
        let call = ToolCall {
            id: "call_1".into(),
            tool_name: "get_single_task".into(),
            arguments: json!({ "task_id": 9 }),
        };
        let body = build_body(&request(vec![
            Message::human("작업 9 보여줘"),
            Message::Assistant {
                text: String::new(),
                tool_calls: vec![call.clone()],
            },
            Message::ToolResult(ToolResult::success(&call, json!({ "id": 9 }))),
        ]));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages[2]["content"], Value::Null);
        assert_eq!(messages[2]["tool_calls"][0]["function"]["arguments"], "{\"task_id\":9}");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_1");
    }

    #[test]
    fn test_body_includes_tool_schemas() {
        let mut req = request(vec![]);
        req.tools.push(ToolDefinition {
            name: "get_single_task".into(),
            description: "Fetch one task".into(),
            parameters: vec![ParamSpec {
                name: "task_id".into(),
                kind: ParamKind::Integer { min: None, max: None },
                required: true,
                description: "Task id".into(),
            }],
        });
        let body = build_body(&req);
        assert_eq!(body["tools"][0]["function"]["name"], "get_single_task");
        assert_eq!(body["tools"][0]["function"]["parameters"]["required"][0], "task_id");
    }

    #[test]
    fn test_reasoning_models_use_max_completion_tokens() {
        let mut req = request(vec![]);
        req.model = "o3-mini".into();
        let body = build_body(&req);
        assert_eq!(body["max_completion_tokens"], 256);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_parse_text_response() {
        let resp = parse_response(&json!({
            "choices": [{ "message": { "content": "안녕하세요" }, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5 }
        }))
        .unwrap();
        assert_eq!(resp.text, "안녕하세요");
        assert!(!resp.has_tool_calls());
        assert_eq!(resp.stop_reason, StopReason::EndTurn);
        assert_eq!(resp.usage.total_tokens(), 15);
    }

    #[test]
    fn test_parse_tool_calls_keeps_bad_arguments_as_text() {
        let resp = parse_response(&json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        { "id": "a", "function": { "name": "get_all_tasks", "arguments": "{}" } },
                        { "id": "b", "function": { "name": "create_task", "arguments": "{oops" } }
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        assert_eq!(resp.tool_calls.len(), 2);
        assert_eq!(resp.tool_calls[0].arguments, json!({}));
        assert_eq!(resp.tool_calls[1].arguments, Value::String("{oops".into()));
        assert_eq!(resp.stop_reason, StopReason::ToolUse);
    }

    #[test]
    fn test_parse_tool_calls_generates_missing_ids() {
        let resp = parse_response(&json!({
            "choices": [{
                "message": {
                    "tool_calls": [
                        { "id": "", "function": { "name": "get_projects", "arguments": "{}" } },
                        { "function": { "name": "get_all_tasks", "arguments": "{}" } }
                    ]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        assert_eq!(resp.tool_calls.len(), 2);
        assert!(resp.tool_calls.iter().all(|c| c.id.starts_with("call_")));
        assert_ne!(resp.tool_calls[0].id, resp.tool_calls[1].id);
    }

    #[test]
    fn test_parse_without_choices_is_malformed() {
        let err = parse_response(&json!({ "error": "x" })).unwrap_err();
        assert!(matches!(err, PilotError::MalformedOutput(_)));
    }
}
