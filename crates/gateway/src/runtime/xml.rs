//! Streaming parser for XML-style tool calls.
//!
//! Models in XML mode emit blocks like:
//!
//! ```text
//! <function_calls>
//! <invoke name="create_tasks">
//! <parameter name="sections">[{"title": "Plan", "tasks": ["a"]}]</parameter>
//! </invoke>
//! </function_calls>
//! ```
//!
//! The scanner is fed the accumulated assistant text and finalizes an
//! invocation only once its `</invoke>` close tag has been seen, so it
//! can run repeatedly over a growing buffer. Parameter values arrive as
//! strings; they are coerced against the tool's declared schema so the
//! emitted call carries structured arguments, matching native calls.

use serde_json::{Map, Value};

use al_domain::chat::ToolCall;
use al_tools::dispatch::validate_and_coerce;
use al_tools::ToolRegistry;

pub struct XmlCallScanner {
    /// Byte offset into the accumulated text already consumed.
    consumed: usize,
    counter: u32,
}

impl Default for XmlCallScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl XmlCallScanner {
    pub fn new() -> Self {
        Self {
            consumed: 0,
            counter: 0,
        }
    }

    /// Scan the accumulated text and return invocations completed since
    /// the last call. A trailing partial block stays pending.
    pub fn scan(&mut self, text: &str, registry: &ToolRegistry) -> Vec<ToolCall> {
        let mut calls = Vec::new();

        loop {
            let haystack = &text[self.consumed..];
            let Some(open_rel) = haystack.find("<invoke") else {
                break;
            };
            let open_abs = self.consumed + open_rel;
            let Some(close_rel) = text[open_abs..].find("</invoke>") else {
                // Close tag not streamed yet; wait for more text.
                break;
            };
            let close_abs = open_abs + close_rel;
            let block = &text[open_abs..close_abs];

            if let Some(call) = self.parse_invoke(block, registry) {
                calls.push(call);
            }
            self.consumed = close_abs + "</invoke>".len();
        }

        calls
    }

    fn parse_invoke(&mut self, block: &str, registry: &ToolRegistry) -> Option<ToolCall> {
        let name = attr_value(block, "name")?;

        let mut params = Map::new();
        let mut rest = block;
        while let Some(start) = rest.find("<parameter") {
            let param_block = &rest[start..];
            let Some(tag_end) = param_block.find('>') else {
                break;
            };
            let Some(value_end) = param_block.find("</parameter>") else {
                break;
            };
            if let Some(key) = attr_value(&param_block[..tag_end + 1], "name") {
                let raw = &param_block[tag_end + 1..value_end];
                params.insert(key, Value::String(unescape(raw.trim())));
            }
            rest = &param_block[value_end + "</parameter>".len()..];
        }

        self.counter += 1;
        let raw_args = Value::Object(params);

        // Type the arguments by the tool's schema so the emitted call is
        // structurally identical to a native one. Validation failures
        // keep the raw arguments; the dispatcher reports them properly.
        let arguments = match registry.get(&name) {
            Some(tool) => {
                validate_and_coerce(&tool.parameters(), &raw_args).unwrap_or(raw_args)
            }
            None => raw_args,
        };

        Some(ToolCall {
            call_id: format!("xml_{}", self.counter),
            tool_name: name,
            arguments,
        })
    }
}

/// Extract `name="..."` from a tag.
fn attr_value(tag: &str, attr: &str) -> Option<String> {
    let marker = format!("{attr}=\"");
    let start = tag.find(&marker)? + marker.len();
    let end = tag[start..].find('"')? + start;
    Some(tag[start..end].to_string())
}

/// Undo the five standard XML entity escapes.
fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Render tool results as the feedback block sent back to an XML-mode
/// model in the next user message.
pub fn render_results_block(results: &[(String, String, bool)]) -> String {
    let mut out = String::from("<function_results>\n");
    for (name, output, success) in results {
        out.push_str(&format!(
            "<result tool=\"{name}\" success=\"{success}\">\n{output}\n</result>\n"
        ));
    }
    out.push_str("</function_results>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use al_tools::tool::{Tool, ToolContext, ToolResult};

    struct SectionsTool;

    #[async_trait::async_trait]
    impl Tool for SectionsTool {
        fn name(&self) -> &str {
            "create_tasks"
        }
        fn description(&self) -> &str {
            "create tasks"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "sections": {"type": "array"},
                    "confirm": {"type": "boolean"}
                }
            })
        }
        async fn invoke(&self, _args: Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::ok("ok")
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(SectionsTool).unwrap();
        r
    }

    #[test]
    fn parses_complete_invoke_with_typed_args() {
        let registry = registry();
        let mut scanner = XmlCallScanner::new();
        let text = r#"Setting up the plan.
<function_calls>
<invoke name="create_tasks">
<parameter name="sections">[{"title":"Plan","tasks":["a","b"]}]</parameter>
</invoke>
</function_calls>"#;

        let calls = scanner.scan(text, &registry);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tool_name, "create_tasks");
        // JSON string coerced to a structured array.
        assert_eq!(calls[0].arguments["sections"][0]["title"], "Plan");
        assert_eq!(
            calls[0].arguments["sections"][0]["tasks"],
            serde_json::json!(["a", "b"])
        );
    }

    #[test]
    fn waits_for_close_tag() {
        let registry = registry();
        let mut scanner = XmlCallScanner::new();

        let partial = r#"<invoke name="create_tasks"><parameter name="sections">["#;
        assert!(scanner.scan(partial, &registry).is_empty());

        let complete = format!(
            "{partial}{{\"title\":\"X\",\"tasks\":[]}}]</parameter></invoke> trailing"
        );
        let calls = scanner.scan(&complete, &registry);
        assert_eq!(calls.len(), 1);

        // Already-consumed invocations are not re-emitted.
        assert!(scanner.scan(&complete, &registry).is_empty());
    }

    #[test]
    fn multiple_invokes_in_order() {
        let registry = registry();
        let mut scanner = XmlCallScanner::new();
        let text = r#"
<invoke name="create_tasks"><parameter name="confirm">true</parameter></invoke>
<invoke name="create_tasks"><parameter name="confirm">false</parameter></invoke>
"#;
        let calls = scanner.scan(text, &registry);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call_id, "xml_1");
        assert_eq!(calls[1].call_id, "xml_2");
        // Boolean coercion applied per schema.
        assert_eq!(calls[0].arguments["confirm"], true);
        assert_eq!(calls[1].arguments["confirm"], false);
    }

    #[test]
    fn unknown_tool_keeps_raw_string_args() {
        let registry = registry();
        let mut scanner = XmlCallScanner::new();
        let text = r#"<invoke name="mystery"><parameter name="x">1</parameter></invoke>"#;
        let calls = scanner.scan(text, &registry);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["x"], "1");
    }

    #[test]
    fn entities_are_unescaped() {
        let registry = registry();
        let mut scanner = XmlCallScanner::new();
        let text = r#"<invoke name="mystery"><parameter name="x">a &lt; b &amp;&amp; c &gt; d</parameter></invoke>"#;
        let calls = scanner.scan(text, &registry);
        assert_eq!(calls[0].arguments["x"], "a < b && c > d");
    }

    #[test]
    fn results_block_renders() {
        let block = render_results_block(&[
            ("execute_command".into(), "a.txt".into(), true),
            ("read_file".into(), "no such file".into(), false),
        ]);
        assert!(block.contains("tool=\"execute_command\" success=\"true\""));
        assert!(block.contains("tool=\"read_file\" success=\"false\""));
    }
}
