//! Tool execution loop.
//!
//! Flow: prompt → model → if tool calls → run tools → feed results → model → repeat.
//! Stops when the model answers without tool calls or `max_rounds` is reached.

use tracing::{debug, info, warn};

use crate::gemini::{content_from_message, function_responses, model_turn};
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError, ToolCall};

use super::{Tool, ToolResult};

/// Run the tool loop starting from `initial_request`.
///
/// Returns the final response and the name of every tool called, in order.
/// With no tools this is a single `send`. When the round limit is hit the
/// last response is returned as-is.
pub async fn run_tool_loop(
    provider: &dyn LlmProvider,
    initial_request: ChatRequest,
    tools: &[Box<dyn Tool>],
    max_rounds: usize,
) -> Result<(ChatResponse, Vec<String>), ProviderError> {
    let mut raw_messages: Vec<serde_json::Value> = match &initial_request.raw_messages {
        Some(raw) => raw.clone(),
        None => initial_request
            .messages
            .iter()
            .map(content_from_message)
            .collect(),
    };
    let mut called_tools: Vec<String> = Vec::new();

    for round in 0..=max_rounds {
        let mut req = initial_request.clone();
        req.raw_messages = Some(raw_messages.clone());

        debug!(round, "tool loop iteration");

        let response = provider.send(&req).await?;

        if response.tool_calls.is_empty() || response.stop_reason != "tool_use" {
            info!(round, tools = called_tools.len(), "tool loop complete");
            return Ok((response, called_tools));
        }
        if round == max_rounds {
            warn!(max_rounds, "tool loop hit maximum rounds");
            return Ok((response, called_tools));
        }

        raw_messages.push(model_turn(&response));

        let mut results: Vec<(&ToolCall, ToolResult)> = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            called_tools.push(call.name.clone());
            results.push((call, execute_tool(tools, call).await));
        }
        raw_messages.push(function_responses(&results));
    }

    Err(ProviderError::Parse(format!(
        "tool loop exceeded {max_rounds} rounds without a response"
    )))
}

/// Find and execute the named tool. Returns an error result if not found.
async fn execute_tool(tools: &[Box<dyn Tool>], call: &ToolCall) -> ToolResult {
    match tools.iter().find(|t| t.name() == call.name) {
        Some(tool) => {
            debug!(tool = %call.name, "executing tool");
            let result = tool.execute(call.input.clone()).await;
            if result.is_error {
                warn!(tool = %call.name, error = %result.content, "tool failed");
            }
            result
        }
        None => ToolResult::error(format!("unknown tool: {}", call.name)),
    }
}
