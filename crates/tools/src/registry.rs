//! Tool registry — registration, lookup, definition building, and XML
//! example rendering.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use al_domain::chat::ToolDefinition;
use al_domain::error::{Error, Result};

use crate::tool::Tool;

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Rejects duplicate names and names that do not
    /// match `[a-z][a-z0-9_]*`.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<()> {
        let name = tool.name().to_string();
        if !valid_tool_name(&name) {
            return Err(Error::Config(format!(
                "invalid tool name '{name}' (expected [a-z][a-z0-9_]*)"
            )));
        }
        if self.tools.contains_key(&name) {
            return Err(Error::Config(format!("tool '{name}' already registered")));
        }
        self.tools.insert(name, Arc::new(tool));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool definitions for the LLM request, filtered to the enabled
    /// set when given, sorted by name for a stable prompt.
    pub fn definitions(&self, enabled: Option<&BTreeSet<String>>) -> Vec<ToolDefinition> {
        let mut names: Vec<&String> = self
            .tools
            .keys()
            .filter(|name| enabled.map_or(true, |set| set.contains(*name)))
            .collect();
        names.sort();
        names
            .into_iter()
            .map(|name| self.tools[name].definition())
            .collect()
    }

    /// Concatenated XML usage examples for prompt injection.
    pub fn xml_examples(&self, enabled: Option<&BTreeSet<String>>) -> String {
        let mut names: Vec<&String> = self
            .tools
            .keys()
            .filter(|name| enabled.map_or(true, |set| set.contains(*name)))
            .collect();
        names.sort();

        let mut out = String::new();
        for name in names {
            let tool = &self.tools[name];
            let examples = tool.examples();
            if examples.is_empty() {
                continue;
            }
            out.push_str(&format!("## {}\n{}\n{}\n\n", name, tool.description(), examples));
        }
        out
    }
}

fn valid_tool_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolContext, ToolResult};

    struct NamedTool(&'static str);

    #[async_trait::async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "a test tool"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        fn examples(&self) -> &str {
            "<function_calls><invoke name=\"demo\"></invoke></function_calls>"
        }
        async fn invoke(&self, _args: serde_json::Value, _ctx: &ToolContext) -> ToolResult {
            ToolResult::ok("ok")
        }
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(NamedTool("demo")).unwrap();
        assert!(registry.get("demo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(NamedTool("demo")).unwrap();
        assert!(registry.register(NamedTool("demo")).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalid_names_rejected() {
        let mut registry = ToolRegistry::new();
        assert!(registry.register(NamedTool("Demo")).is_err());
        assert!(registry.register(NamedTool("9lives")).is_err());
        assert!(registry.register(NamedTool("has-dash")).is_err());
        assert!(registry.register(NamedTool("snake_case_2")).is_ok());
    }

    #[test]
    fn definitions_filter_by_enabled_set() {
        let mut registry = ToolRegistry::new();
        registry.register(NamedTool("alpha")).unwrap();
        registry.register(NamedTool("beta")).unwrap();

        let all = registry.definitions(None);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "alpha"); // sorted

        let enabled = BTreeSet::from(["beta".to_string()]);
        let filtered = registry.definitions(Some(&enabled));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "beta");
    }

    #[test]
    fn xml_examples_render_enabled_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(NamedTool("alpha")).unwrap();
        let examples = registry.xml_examples(None);
        assert!(examples.contains("## alpha"));
        assert!(examples.contains("<function_calls>"));
    }
}
