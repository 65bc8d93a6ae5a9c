//! Google Gemini provider (Generative Language API, API-key auth).
//!
//! Sends one `generateContent` request per model round-trip. The system
//! prompt travels in `systemInstruction`; assistant turns use Gemini's
//! `model` role. Tools go out as `functionDeclarations` and come back as
//! `functionCall` parts.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use waweb_core::config::AgentConfig;
use waweb_core::Role;

use crate::provider::{
    ChatRequest, ChatResponse, LlmProvider, Message, ProviderError, ToolCall, ToolDefinition,
};
use crate::tools::ToolResult;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiProvider {
    /// Build a provider whose requests give up after `timeout`.
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Build from the `[agent]` config section. Fails with `NotConfigured`
    /// when no API key is set.
    pub fn from_config(cfg: &AgentConfig) -> Result<Self, ProviderError> {
        let key = cfg
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("agent.api_key is not set".into()))?;
        Self::new(
            key,
            Some(cfg.base_url.clone()),
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    fn build_body(&self, req: &ChatRequest) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = match &req.raw_messages {
            Some(raw) => raw.clone(),
            None => req.messages.iter().map(content_from_message).collect(),
        };

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": req.max_tokens,
                "temperature": req.temperature,
            }
        });

        if !req.system.is_empty() {
            body["systemInstruction"] = serde_json::json!({
                "parts": [{ "text": req.system }]
            });
        }

        if !req.tools.is_empty() {
            let declarations: Vec<serde_json::Value> =
                req.tools.iter().map(function_declaration).collect();
            body["tools"] = serde_json::json!([{ "functionDeclarations": declarations }]);
        }

        body
    }
}

/// One plain-text conversation entry in Gemini's `contents` shape.
pub(crate) fn content_from_message(m: &Message) -> serde_json::Value {
    let role = match m.role {
        Role::Assistant => "model",
        Role::User => "user",
    };
    serde_json::json!({
        "role": role,
        "parts": [{ "text": m.content }]
    })
}

/// The model turn that requested `resp.tool_calls`, echoed back verbatim.
pub(crate) fn model_turn(resp: &ChatResponse) -> serde_json::Value {
    let mut parts: Vec<serde_json::Value> = Vec::new();
    if !resp.content.is_empty() {
        parts.push(serde_json::json!({ "text": resp.content }));
    }
    for call in &resp.tool_calls {
        let mut part = serde_json::json!({
            "functionCall": { "name": call.name, "args": call.input }
        });
        if let Some(sig) = &call.signature {
            part["thoughtSignature"] = serde_json::json!(sig);
        }
        parts.push(part);
    }
    serde_json::json!({ "role": "model", "parts": parts })
}

/// Tool results for one round, in call order.
pub(crate) fn function_responses(results: &[(&ToolCall, ToolResult)]) -> serde_json::Value {
    let parts: Vec<serde_json::Value> = results
        .iter()
        .map(|(call, result)| {
            let response = if result.is_error {
                serde_json::json!({ "error": result.content })
            } else {
                serde_json::json!({ "content": result.content })
            };
            serde_json::json!({
                "functionResponse": { "name": call.name, "response": response }
            })
        })
        .collect();
    serde_json::json!({ "role": "user", "parts": parts })
}

fn function_declaration(def: &ToolDefinition) -> serde_json::Value {
    serde_json::json!({
        "name": def.name,
        "description": def.description,
        "parameters": clean_schema(&def.input_schema),
    })
}

/// Drop JSON Schema keywords Gemini rejects.
fn clean_schema(schema: &serde_json::Value) -> serde_json::Value {
    match schema {
        serde_json::Value::Object(map) => map
            .iter()
            .filter(|(k, _)| !matches!(k.as_str(), "additionalProperties" | "$schema"))
            .map(|(k, v)| (k.clone(), clean_schema(v)))
            .collect::<serde_json::Map<_, _>>()
            .into(),
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(clean_schema).collect())
        }
        other => other.clone(),
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let url = self.endpoint(&req.model);
        let body = self.build_body(req);

        debug!(model = %req.model, messages = req.messages.len(), "sending request to Gemini");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimited {
                retry_after_ms: retry,
            });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Gemini API error");
            return Err(ProviderError::Api {
                status,
                message: api_error_message(&text),
            });
        }

        let api_resp: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_response(api_resp, &req.model)
    }
}

fn parse_response(api_resp: GeminiResponse, model: &str) -> Result<ChatResponse, ProviderError> {
    let candidate = api_resp.candidates.into_iter().next();
    let parts = candidate
        .as_ref()
        .and_then(|c| c.content.as_ref())
        .map(|c| c.parts.as_slice())
        .unwrap_or_default();

    let content = parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    let tool_calls: Vec<ToolCall> = parts
        .iter()
        .filter_map(|p| p.function_call.as_ref().map(|f| (p, f)))
        .enumerate()
        .map(|(i, (part, call))| ToolCall {
            id: format!("call_{i}"),
            name: call.name.clone(),
            input: call.args.clone().unwrap_or_else(|| serde_json::json!({})),
            signature: part.thought_signature.clone(),
        })
        .collect();

    if content.trim().is_empty() && tool_calls.is_empty() {
        let reason = api_resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .or_else(|| candidate.as_ref().and_then(|c| c.finish_reason.clone()))
            .unwrap_or_else(|| "no text in response".to_string());
        return Err(ProviderError::Parse(format!("empty Gemini response: {reason}")));
    }

    let stop_reason = if tool_calls.is_empty() {
        candidate.and_then(|c| c.finish_reason).unwrap_or_default()
    } else {
        "tool_use".to_string()
    };
    let usage = api_resp.usage_metadata.unwrap_or_default();

    Ok(ChatResponse {
        content,
        model: api_resp.model_version.unwrap_or_else(|| model.to_string()),
        tokens_in: usage.prompt_token_count,
        tokens_out: usage.candidates_token_count,
        stop_reason,
        tool_calls,
    })
}

/// Pull `error.message` out of a Gemini error body, else return it verbatim.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<GeminiErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// ── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
    prompt_feedback: Option<PromptFeedback>,
    model_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    function_call: Option<GeminiFunctionCall>,
    thought_signature: Option<String>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const MODEL: &str = "gemini-test";

    fn request() -> ChatRequest {
        ChatRequest {
            model: MODEL.to_string(),
            system: "be brief".to_string(),
            messages: vec![
                Message { role: Role::User, content: "hi".to_string() },
                Message { role: Role::Assistant, content: "hello".to_string() },
                Message { role: Role::User, content: "what is rust?".to_string() },
            ],
            max_tokens: 256,
            temperature: 0.4,
            tools: Vec::new(),
            raw_messages: None,
        }
    }

    fn provider(base: String) -> GeminiProvider {
        GeminiProvider::new("test-key".into(), Some(base), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn sends_history_and_parses_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "hi" }] },
                    { "role": "model", "parts": [{ "text": "hello" }] },
                    { "role": "user", "parts": [{ "text": "what is rust?" }] }
                ],
                "systemInstruction": { "parts": [{ "text": "be brief" }] }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "candidates": [{
                        "content": { "parts": [{ "text": "A systems " }, { "text": "language." }] },
                        "finishReason": "STOP"
                    }],
                    "usageMetadata": { "promptTokenCount": 12, "candidatesTokenCount": 4 }
                }"#,
            )
            .create_async()
            .await;

        let resp = provider(server.url()).send(&request()).await.unwrap();
        mock.assert_async().await;
        assert_eq!(resp.content, "A systems language.");
        assert_eq!(resp.stop_reason, "STOP");
        assert_eq!(resp.tokens_in, 12);
        assert_eq!(resp.tokens_out, 4);
        assert_eq!(resp.model, MODEL);
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .with_status(400)
            .with_body(r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#)
            .create_async()
            .await;

        let err = provider(server.url()).send(&request()).await.unwrap_err();
        match err {
            ProviderError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_is_reported() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .with_status(429)
            .with_header("retry-after", "2")
            .create_async()
            .await;

        let err = provider(server.url()).send(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_ms: 2000 }));
    }

    #[tokio::test]
    async fn blocked_prompt_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .with_status(200)
            .with_body(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#)
            .create_async()
            .await;

        let err = provider(server.url()).send(&request()).await.unwrap_err();
        match err {
            ProviderError::Parse(msg) => assert!(msg.contains("SAFETY")),
            other => panic!("expected Parse error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_parse_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = provider(server.url()).send(&request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[tokio::test]
    async fn function_calls_are_parsed_with_tool_stop_reason() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/gemini-test:generateContent")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "tools": [{ "functionDeclarations": [{
                    "name": "get_repo",
                    "parameters": { "type": "object", "required": ["owner", "repo"] }
                }]}]
            })))
            .with_status(200)
            .with_body(
                r#"{
                    "candidates": [{
                        "content": { "role": "model", "parts": [{
                            "functionCall": { "name": "get_repo", "args": { "owner": "octo", "repo": "demo" } },
                            "thoughtSignature": "sig-1"
                        }]},
                        "finishReason": "STOP"
                    }]
                }"#,
            )
            .create_async()
            .await;

        let mut req = request();
        req.tools = vec![ToolDefinition {
            name: "get_repo".into(),
            description: "Fetch a repository".into(),
            input_schema: serde_json::json!({
                "$schema": "http://json-schema.org/draft-07/schema#",
                "type": "object",
                "additionalProperties": false,
                "properties": { "owner": { "type": "string" }, "repo": { "type": "string" } },
                "required": ["owner", "repo"]
            }),
        }];

        let resp = provider(server.url()).send(&req).await.unwrap();
        mock.assert_async().await;
        assert_eq!(resp.stop_reason, "tool_use");
        assert!(resp.content.is_empty());
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].name, "get_repo");
        assert_eq!(resp.tool_calls[0].input["owner"], "octo");
        assert_eq!(resp.tool_calls[0].signature.as_deref(), Some("sig-1"));
    }

    #[test]
    fn schema_cleaning_is_recursive() {
        let cleaned = clean_schema(&serde_json::json!({
            "$schema": "x",
            "type": "object",
            "additionalProperties": false,
            "properties": { "files": { "type": "array", "items": {
                "type": "object", "additionalProperties": false
            }}}
        }));
        assert!(cleaned.get("$schema").is_none());
        assert!(cleaned.get("additionalProperties").is_none());
        assert!(cleaned["properties"]["files"]["items"]
            .get("additionalProperties")
            .is_none());
        assert_eq!(cleaned["type"], "object");
    }

    #[test]
    fn tool_round_trip_entries() {
        let resp = ChatResponse {
            content: String::new(),
            model: MODEL.into(),
            tokens_in: 0,
            tokens_out: 0,
            stop_reason: "tool_use".into(),
            tool_calls: vec![ToolCall {
                id: "call_0".into(),
                name: "get_file".into(),
                input: serde_json::json!({ "path": "README.md" }),
                signature: None,
            }],
        };
        let turn = model_turn(&resp);
        assert_eq!(turn["role"], "model");
        assert_eq!(turn["parts"][0]["functionCall"]["name"], "get_file");
        assert!(turn["parts"][0].get("thoughtSignature").is_none());

        let results = vec![(&resp.tool_calls[0], ToolResult::error("404 Not Found"))];
        let reply = function_responses(&results);
        assert_eq!(reply["parts"][0]["functionResponse"]["name"], "get_file");
        assert_eq!(
            reply["parts"][0]["functionResponse"]["response"]["error"],
            "404 Not Found"
        );
    }

    #[test]
    fn from_config_requires_key() {
        let cfg = AgentConfig::default();
        assert!(matches!(
            GeminiProvider::from_config(&cfg),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let p = GeminiProvider::new("k".into(), Some("http://x/".into()), Duration::from_secs(1)).unwrap();
        assert_eq!(p.endpoint("m"), "http://x/v1beta/models/m:generateContent");
    }
}
