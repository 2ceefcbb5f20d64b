//! Integration tests for request and response translation.
//!
//! These exercise the public translation API end to end on JSON payloads,
//! the way the proxy drives it.

use deepgate_core::{
    ChatRequest, UpstreamProfile, UpstreamToolChoice, translate_request, translate_response,
};
use serde_json::{Value, json};

fn profile() -> UpstreamProfile {
    UpstreamProfile::custom("http://127.0.0.1:1", "deepseek-chat", "test-key")
}

fn translate(value: Value) -> Value {
    let request: ChatRequest = serde_json::from_value(value).unwrap();
    let upstream = translate_request(request, &profile()).unwrap();
    serde_json::to_value(upstream).unwrap()
}

#[test]
fn test_tools_are_forwarded_unchanged() {
    let tools = json!([
        {
            "type": "function",
            "function": {
                "name": "search_files",
                "description": "Search the workspace",
                "parameters": {
                    "type": "object",
                    "properties": {"query": {"type": "string"}, "limit": {"type": "integer"}},
                    "required": ["query"]
                }
            }
        },
        {
            "type": "function",
            "function": {"name": "list_dir", "parameters": {"type": "object", "properties": {}}}
        }
    ]);

    let upstream = translate(json!({
        "model": "gpt-4o",
        "messages": [{"role": "user", "content": "find main.rs"}],
        "tools": tools,
    }));

    assert_eq!(upstream["tools"], tools);
    // Key order inside parameter schemas survives re-encoding.
    assert_eq!(
        serde_json::to_string(&upstream["tools"]).unwrap(),
        serde_json::to_string(&tools).unwrap()
    );
    assert!(upstream.get("tool_choice").is_none());
}

#[test]
fn test_tool_choice_table() {
    let cases = [
        (Value::Null, None),
        (json!("auto"), Some("auto")),
        (json!("none"), Some("none")),
        (json!({"type": "function", "function": {"name": "f"}}), Some("auto")),
        (json!("required"), None),
        (json!({"kind": "function"}), None),
        (json!(["auto"]), None),
    ];

    for (choice, expected) in cases {
        let upstream = translate(json!({
            "model": "gpt-4o",
            "messages": [],
            "tools": [{"type": "function", "function": {"name": "f"}}],
            "tool_choice": choice.clone(),
        }));

        assert_eq!(
            upstream.get("tool_choice").and_then(Value::as_str),
            expected,
            "tool_choice {choice}"
        );
    }
}

#[test]
fn test_legacy_functions_become_tools() {
    let upstream = translate(json!({
        "model": "gpt-4o",
        "messages": [],
        "functions": [
            {"name": "alpha", "description": "a", "parameters": {"type": "object"}},
            {"name": "beta", "description": "b", "parameters": {"type": "object"}},
            {"name": "gamma", "description": "c", "parameters": {"type": "object"}},
        ],
    }));

    let tools = upstream["tools"].as_array().unwrap();
    let names: Vec<_> = tools
        .iter()
        .map(|t| t["function"]["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["alpha", "beta", "gamma"]);
    assert!(tools.iter().all(|t| t["type"] == "function"));
    assert_eq!(tools[1]["function"]["description"], "b");
}

#[test]
fn test_conversation_with_tool_round_trip() {
    let upstream = translate(json!({
        "model": "gpt-4o",
        "stream": true,
        "messages": [
            {"role": "system", "content": "be brief"},
            {"role": "user", "content": "weather?"},
            {"role": "assistant", "content": null, "tool_calls": [
                {"id": "call_1", "type": "function",
                 "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}}
            ]},
            {"role": "function", "name": "get_weather", "tool_call_id": "call_1", "content": "cold"},
        ],
    }));

    assert_eq!(upstream["model"], "deepseek-chat");
    assert_eq!(upstream["stream"], true);
    let messages = upstream["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["tool_calls"][0]["id"], "call_1");
    assert_eq!(
        messages[2]["tool_calls"][0]["function"]["arguments"],
        "{\"city\":\"Oslo\"}"
    );
    assert_eq!(messages[3]["role"], "tool");
    assert_eq!(messages[3]["tool_call_id"], "call_1");
    assert_eq!(messages[3]["content"], "cold");
}

#[test]
fn test_upstream_tool_choice_enum_values() {
    let request: ChatRequest = serde_json::from_value(json!({
        "model": "gpt-4o",
        "messages": [],
        "tools": [{"type": "function", "function": {"name": "f"}}],
        "tool_choice": {"type": "function", "function": {"name": "f"}},
    }))
    .unwrap();
    let upstream = translate_request(request, &profile()).unwrap();
    assert_eq!(upstream.tool_choice, Some(UpstreamToolChoice::Auto));
}

fn upstream_reply(choices: &Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": "chatcmpl-9",
        "object": "chat.completion",
        "created": 1_718_000_000,
        "model": "deepseek-chat",
        "choices": choices,
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15},
    }))
    .unwrap()
}

#[test]
fn test_choices_round_trip_in_order() {
    let choices = json!([
        {"index": 0, "message": {"role": "assistant", "content": "first"}, "finish_reason": "stop"},
        {"index": 1, "message": {"role": "assistant", "content": "", "tool_calls": [
            {"id": "c1", "type": "function", "function": {"name": "a", "arguments": "{}"}},
            {"id": "c2", "type": "function", "function": {"name": "b", "arguments": "{\"k\":[1,2]}"}}
        ]}, "finish_reason": "tool_calls"},
        {"index": 2, "message": {"role": "assistant", "content": "third"}, "finish_reason": "length"},
    ]);

    let out: Value = serde_json::from_slice(&translate_response(&upstream_reply(&choices)).unwrap())
        .unwrap();

    assert_eq!(out["model"], "gpt-4o");
    assert_eq!(out["object"], "chat.completion");
    let out_choices = out["choices"].as_array().unwrap();
    assert_eq!(out_choices.len(), 3);
    for (i, choice) in out_choices.iter().enumerate() {
        assert_eq!(choice["index"], i);
        assert_eq!(choice["finish_reason"], choices[i]["finish_reason"]);
    }
    assert_eq!(
        out_choices[1]["message"]["tool_calls"],
        choices[1]["message"]["tool_calls"]
    );
    assert_eq!(out["usage"]["total_tokens"], 15);
}

#[test]
fn test_all_unnamed_tool_calls_leave_empty_list() {
    let choices = json!([
        {"index": 0, "message": {"role": "assistant", "content": "", "tool_calls": [
            {"id": "x", "type": "function", "function": {"name": "", "arguments": "{}"}},
            {"id": "y", "type": "function", "function": {"name": "", "arguments": ""}}
        ]}, "finish_reason": "tool_calls"},
    ]);

    let out: Value = serde_json::from_slice(&translate_response(&upstream_reply(&choices)).unwrap())
        .unwrap();

    let out_choices = out["choices"].as_array().unwrap();
    assert_eq!(out_choices.len(), 1);
    assert_eq!(out_choices[0]["message"]["tool_calls"], json!([]));
}

#[test]
fn test_translating_twice_is_stable() {
    let choices = json!([
        {"index": 0, "message": {"role": "assistant", "content": "hi"}, "finish_reason": "stop"},
    ]);

    let once = translate_response(&upstream_reply(&choices)).unwrap();
    let twice = translate_response(&once).unwrap();
    assert_eq!(once, twice);

    // Minimal bodies carrying only some of the fields still translate.
    let sparse = translate_response(br#"{"choices": []}"#).unwrap();
    let sparse: Value = serde_json::from_slice(&sparse).unwrap();
    assert_eq!(sparse["model"], "gpt-4o");
}

#[test]
fn test_null_fields_in_upstream_reply_read_as_defaults() {
    let body = br#"{
        "id": null,
        "object": null,
        "created": null,
        "model": null,
        "choices": [{
            "index": null,
            "message": {"role": "assistant", "content": null, "tool_calls": [
                {"id": null, "type": "function", "function": {"name": "lookup", "arguments": null}}
            ]},
            "finish_reason": null
        }],
        "usage": null
    }"#;

    let out: Value = serde_json::from_slice(&translate_response(body).unwrap()).unwrap();

    assert_eq!(out["id"], "");
    assert_eq!(out["model"], "gpt-4o");
    assert_eq!(out["object"], "chat.completion");
    assert_eq!(out["created"], 0);
    assert_eq!(out["usage"]["total_tokens"], 0);
    let call = &out["choices"][0]["message"]["tool_calls"][0];
    assert_eq!(call["id"], "");
    assert_eq!(call["function"]["name"], "lookup");
    assert_eq!(call["function"]["arguments"], "");

    let empty = translate_response(br#"{"choices": null, "usage": null}"#).unwrap();
    let empty: Value = serde_json::from_slice(&empty).unwrap();
    assert_eq!(empty["choices"], json!([]));
}

#[test]
fn test_extra_function_keys_survive_forwarding() {
    let tools = json!([{
        "type": "function",
        "function": {
            "name": "get_weather",
            "parameters": {"type": "object", "properties": {}},
            "strict": true
        }
    }]);

    let upstream = translate(json!({
        "model": "gpt-4o",
        "messages": [{"role": "user", "content": "weather?"}],
        "tools": tools,
    }));
    assert_eq!(upstream["tools"], tools);

    let lifted = translate(json!({
        "model": "gpt-4o",
        "messages": [{"role": "user", "content": "weather?"}],
        "functions": [{"name": "get_weather", "strict": true}],
    }));
    assert_eq!(lifted["tools"][0]["function"]["strict"], true);
}
