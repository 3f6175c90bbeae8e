//! Tool dispatch — schema validation, type coercion, timeouts, and
//! serial/parallel execution.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;

use al_domain::chat::ToolCall;
use al_domain::config::ToolsConfig;

use crate::registry::ToolRegistry;
use crate::tool::{Tool, ToolCapabilities, ToolContext, ToolResult};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation & coercion
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Validate `args` against a JSON schema and coerce string values to
/// the declared types (number, integer, boolean, array, object).
///
/// XML-style calls deliver every parameter as a string; coercion is
/// what makes them equivalent to native calls.
pub fn validate_and_coerce(schema: &Value, args: &Value) -> Result<Value, String> {
    let obj = match args {
        Value::Object(map) => map.clone(),
        Value::Null => Default::default(),
        other => return Err(format!("arguments must be an object, got {other}")),
    };
    let mut coerced = obj;

    let properties = schema.get("properties").and_then(|p| p.as_object());

    if let Some(required) = schema.get("required").and_then(|r| r.as_array()) {
        for req in required {
            if let Some(name) = req.as_str() {
                if !coerced.contains_key(name) {
                    return Err(format!("missing required parameter '{name}'"));
                }
            }
        }
    }

    if let Some(props) = properties {
        for (name, prop_schema) in props {
            let Some(value) = coerced.get(name) else {
                continue;
            };
            let Some(expected) = prop_schema.get("type").and_then(|t| t.as_str()) else {
                continue;
            };
            if let Some(new_value) = coerce_value(value, expected)? {
                coerced.insert(name.clone(), new_value);
            }
        }
    }

    Ok(Value::Object(coerced))
}

/// Coerce a single value to the expected JSON-schema type. Returns
/// `Ok(None)` when the value already matches.
fn coerce_value(value: &Value, expected: &str) -> Result<Option<Value>, String> {
    match (expected, value) {
        ("string", Value::String(_)) => Ok(None),
        ("number", Value::Number(_)) | ("integer", Value::Number(_)) => Ok(None),
        ("boolean", Value::Bool(_)) => Ok(None),
        ("array", Value::Array(_)) | ("object", Value::Object(_)) => Ok(None),

        ("number", Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(|n| serde_json::Number::from_f64(n).map(Value::Number))
            .map_err(|_| format!("'{s}' is not a number")),
        ("integer", Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(|n| Some(Value::Number(n.into())))
            .map_err(|_| format!("'{s}' is not an integer")),
        ("boolean", Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" => Ok(Some(Value::Bool(true))),
            "false" => Ok(Some(Value::Bool(false))),
            other => Err(format!("'{other}' is not a boolean")),
        },
        ("array", Value::String(s)) | ("object", Value::String(s)) => {
            serde_json::from_str::<Value>(s)
                .map(Some)
                .map_err(|e| format!("not valid JSON: {e}"))
        }
        // Schemas without a strict type match (e.g. unions) pass through.
        _ => Ok(None),
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Timeouts
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub fn timeout_for(caps: ToolCapabilities, config: &ToolsConfig) -> Duration {
    if caps.build {
        Duration::from_secs(config.build_timeout_seconds)
    } else if caps.long_running {
        Duration::from_secs(config.long_timeout_seconds)
    } else {
        Duration::from_secs(config.default_timeout_seconds)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Run one tool call: validate, coerce, invoke under timeout.
///
/// Validation and runtime failures come back as
/// `ToolResult { success: false }` so the model can react; they never
/// bubble out of the dispatcher.
pub async fn dispatch_one(
    tool: Arc<dyn Tool>,
    call: &ToolCall,
    ctx: &ToolContext,
    config: &ToolsConfig,
) -> ToolResult {
    let args = match validate_and_coerce(&tool.parameters(), &call.arguments) {
        Ok(args) => args,
        Err(message) => {
            tracing::debug!(tool = %call.tool_name, error = %message, "tool argument validation failed");
            return ToolResult::error(format!("invalid arguments: {message}"));
        }
    };

    let timeout = timeout_for(tool.capabilities(), config);
    match tokio::time::timeout(timeout, tool.invoke(args, ctx)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(tool = %call.tool_name, timeout_s = timeout.as_secs(), "tool call timed out");
            ToolResult::error(format!(
                "<timeout> tool '{}' exceeded {}s",
                call.tool_name,
                timeout.as_secs()
            ))
        }
    }
}

/// Run a batch of tool calls from one assistant turn.
///
/// Calls run serially in textual order, except that consecutive
/// parallel-safe calls form a group executed concurrently under the
/// configured limit. Results always come back in call order.
pub async fn dispatch_batch(
    registry: &ToolRegistry,
    calls: &[ToolCall],
    ctx: &ToolContext,
    config: &ToolsConfig,
) -> Vec<ToolResult> {
    let mut results: Vec<Option<ToolResult>> = vec![None; calls.len()];
    let limit = Arc::new(Semaphore::new(config.parallel_safe_limit.max(1)));

    let mut i = 0;
    while i < calls.len() {
        let tool = registry.get(&calls[i].tool_name);
        let parallel = tool
            .as_ref()
            .map(|t| t.capabilities().parallel_safe)
            .unwrap_or(false);

        if parallel {
            // Extend the group over consecutive parallel-safe calls.
            let start = i;
            while i < calls.len()
                && registry
                    .get(&calls[i].tool_name)
                    .map(|t| t.capabilities().parallel_safe)
                    .unwrap_or(false)
            {
                i += 1;
            }
            let group: Vec<_> = (start..i)
                .map(|idx| {
                    let call = &calls[idx];
                    let tool = registry.get(&call.tool_name);
                    let limit = limit.clone();
                    async move {
                        match tool {
                            Some(tool) => {
                                let _permit = limit.acquire().await;
                                (idx, dispatch_one(tool, call, ctx, config).await)
                            }
                            None => (idx, unknown_tool(&call.tool_name)),
                        }
                    }
                })
                .collect();
            for (idx, result) in futures_util::future::join_all(group).await {
                results[idx] = Some(result);
            }
        } else {
            let result = match tool {
                Some(tool) => dispatch_one(tool, &calls[i], ctx, config).await,
                None => unknown_tool(&calls[i].tool_name),
            };
            results[i] = Some(result);
            i += 1;
        }
    }

    results.into_iter().map(|r| r.unwrap()).collect()
}

fn unknown_tool(name: &str) -> ToolResult {
    ToolResult::error(format!("unknown tool '{name}'"))
}
