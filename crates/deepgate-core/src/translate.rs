//! Schema translation between the client API and the upstream API.
//!
//! Both directions are pure functions: no I/O, no shared state. The request
//! direction pins the upstream model and normalises tool payloads; the
//! response direction restores the advertised model name and filters tool
//! calls the client could not act on.

use tracing::{debug, trace, warn};

use crate::error::TranslateError;
use crate::models::{
    CHAT_COMPLETION_OBJECT, CLIENT_MODEL, ChatCompletionResponse, ChatRequest, Function, Message,
    Tool, ToolCall, ToolChoice, UpstreamRequest, UpstreamToolChoice,
};
use crate::profile::UpstreamProfile;

impl ToolChoice {
    /// Collapse into what the upstream understands.
    ///
    /// The upstream cannot pin a specific function, so a function hint
    /// degrades to `auto`.
    pub const fn collapse(self) -> Option<UpstreamToolChoice> {
        match self {
            Self::Absent => None,
            Self::Auto | Self::FunctionHint => Some(UpstreamToolChoice::Auto),
            Self::None => Some(UpstreamToolChoice::None),
        }
    }
}

/// Translate an inbound client request into the upstream request.
pub fn translate_request(
    request: ChatRequest,
    profile: &UpstreamProfile,
) -> Result<UpstreamRequest, TranslateError> {
    if request.model != CLIENT_MODEL {
        return Err(TranslateError::UnsupportedModel {
            requested: request.model,
            accepted: CLIENT_MODEL.to_string(),
        });
    }

    debug!(
        requested = %request.model,
        upstream = %profile.model,
        endpoint = %profile.endpoint,
        "Mapping client model to profile model"
    );

    let tools = select_tools(request.tools, request.functions);
    // Tool choice only means something next to a tool list.
    let tool_choice = tools.as_ref().and_then(|_| request.tool_choice.collapse());

    Ok(UpstreamRequest {
        model: profile.model.clone(),
        messages: convert_messages(request.messages),
        stream: request.stream,
        temperature: request.temperature,
        max_tokens: request.max_tokens,
        tools,
        tool_choice,
    })
}

/// Pick the tool list to forward: `tools` wins, otherwise lift `functions`.
fn select_tools(
    tools: Option<Vec<Tool>>,
    functions: Option<Vec<Function>>,
) -> Option<Vec<Tool>> {
    match (tools, functions) {
        (Some(tools), _) if !tools.is_empty() => Some(tools),
        (_, Some(functions)) if !functions.is_empty() => {
            debug!(count = functions.len(), "Lifting legacy functions into tools");
            Some(functions.into_iter().map(Tool::function).collect())
        }
        _ => None,
    }
}

/// Rewrite messages into the upstream dialect, preserving order.
pub fn convert_messages(messages: Vec<Message>) -> Vec<Message> {
    messages
        .into_iter()
        .enumerate()
        .map(|(i, mut msg)| {
            trace!(index = i, role = %msg.role, "Converting message");

            if msg.role == "assistant" && msg.has_tool_calls() {
                msg.tool_calls = msg.tool_calls.map(|calls| {
                    calls
                        .into_iter()
                        .map(|call| ToolCall {
                            id: call.id,
                            kind: "function".to_string(),
                            function: call.function,
                        })
                        .collect()
                });
            }

            if msg.role == "function" {
                msg.role = "tool".to_string();
            }

            msg
        })
        .collect()
}

/// Rewrite a parsed upstream completion into the client-facing shape.
pub fn translate_completion(mut completion: ChatCompletionResponse) -> ChatCompletionResponse {
    CLIENT_MODEL.clone_into(&mut completion.model);
    CHAT_COMPLETION_OBJECT.clone_into(&mut completion.object);

    for choice in &mut completion.choices {
        if let Some(calls) = choice.message.tool_calls.as_mut() {
            let before = calls.len();
            calls.retain(|call| !call.function.name.is_empty());
            if calls.len() != before {
                warn!(
                    choice = choice.index,
                    dropped = before - calls.len(),
                    "Dropping tool calls with empty function name"
                );
            }
        }
    }

    completion
}

/// Translate a raw upstream success body into the client-facing JSON body.
pub fn translate_response(body: &[u8]) -> Result<Vec<u8>, TranslateError> {
    let completion: ChatCompletionResponse = serde_json::from_slice(body)
        .map_err(|e| TranslateError::MalformedUpstreamBody(e.to_string()))?;

    let translated = translate_completion(completion);

    serde_json::to_vec(&translated).map_err(|e| TranslateError::Serialization(e.to_string()))
}
