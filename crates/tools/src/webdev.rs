//! Web-project scaffolder — writes a minimal Vite-style skeleton into
//! the sandbox so the agent can iterate on it with the file and shell
//! tools.

use serde_json::Value;

use crate::tool::{Tool, ToolCapabilities, ToolContext, ToolResult};

pub struct ScaffoldWebProjectTool;

fn package_json(name: &str) -> String {
    serde_json::to_string_pretty(&serde_json::json!({
        "name": name,
        "private": true,
        "version": "0.0.0",
        "type": "module",
        "scripts": {
            "dev": "vite",
            "build": "vite build",
            "preview": "vite preview"
        },
        "devDependencies": {
            "vite": "^5.0.0"
        }
    }))
    .unwrap_or_default()
}

fn index_html(title: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>{title}</title>
  </head>
  <body>
    <div id="app"></div>
    <script type="module" src="/src/main.js"></script>
  </body>
</html>
"#
    )
}

const MAIN_JS: &str = r#"import './style.css'

document.querySelector('#app').innerHTML = `
  <main>
    <h1>It works</h1>
    <p>Edit src/main.js to get started.</p>
  </main>
`
"#;

const STYLE_CSS: &str = r#":root {
  font-family: system-ui, sans-serif;
  color-scheme: light dark;
}

main {
  max-width: 60ch;
  margin: 4rem auto;
  padding: 0 1rem;
}
"#;

#[async_trait::async_trait]
impl Tool for ScaffoldWebProjectTool {
    fn name(&self) -> &str {
        "scaffold_web_project"
    }

    fn description(&self) -> &str {
        "Create a new web project skeleton (Vite layout: package.json, index.html, src/) in the workspace."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "Project directory name (kebab-case)" },
                "title": { "type": "string", "description": "Page title (defaults to the name)" }
            },
            "required": ["name"]
        })
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="scaffold_web_project">
<parameter name="name">landing-page</parameter>
<parameter name="title">My Landing Page</parameter>
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            requires_sandbox: true,
            long_running: true,
            build: true,
            ..Default::default()
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let sandbox = match ctx.require_sandbox() {
            Ok(s) => s,
            Err(e) => return e,
        };
        let name = args["name"].as_str().unwrap_or_default();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return ToolResult::error(format!(
                "invalid project name '{name}' (letters, digits, dash, underscore)"
            ));
        }
        let title = args
            .get("title")
            .and_then(|v| v.as_str())
            .unwrap_or(name)
            .to_string();

        let files = [
            (format!("{name}/package.json"), package_json(name)),
            (format!("{name}/index.html"), index_html(&title)),
            (format!("{name}/src/main.js"), MAIN_JS.to_string()),
            (format!("{name}/src/style.css"), STYLE_CSS.to_string()),
        ];

        let mut result = ToolResult::ok(format!(
            "scaffolded web project '{name}' with {} files; run `npm install && npm run dev` inside it",
            files.len()
        ));
        for (path, contents) in files {
            if let Err(e) = sandbox.write_file(&path, &contents).await {
                return ToolResult::error(format!("failed to write {path}: {e}"));
            }
            result = result.with_attachment("file", path);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasklist::ThreadLockMap;
    use crate::LocalSandbox;
    use std::sync::Arc;
    use uuid::Uuid;

    fn ctx(dir: &std::path::Path) -> (tempfile::TempDir, ToolContext) {
        let state = tempfile::tempdir().unwrap();
        let messages = Arc::new(al_store::MessageLog::open(state.path()).unwrap());
        let ctx = ToolContext {
            run_id: Uuid::new_v4(),
            thread_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            sandbox: Some(Arc::new(
                LocalSandbox::new(dir.to_path_buf(), 100_000).unwrap(),
            )),
            messages,
            tasklist_locks: Arc::new(ThreadLockMap::new()),
        };
        (state, ctx)
    }

    #[tokio::test]
    async fn scaffolds_expected_layout() {
        let dir = tempfile::tempdir().unwrap();
        let (_state, ctx) = ctx(dir.path());
        let result = ScaffoldWebProjectTool
            .invoke(serde_json::json!({"name": "demo-site"}), &ctx)
            .await;
        assert!(result.success, "{}", result.output);
        assert_eq!(result.attachments.len(), 4);
        assert!(dir.path().join("demo-site/package.json").exists());
        assert!(dir.path().join("demo-site/src/main.js").exists());

        let html = std::fs::read_to_string(dir.path().join("demo-site/index.html")).unwrap();
        assert!(html.contains("<title>demo-site</title>"));
    }

    #[tokio::test]
    async fn rejects_hostile_names() {
        let dir = tempfile::tempdir().unwrap();
        let (_state, ctx) = ctx(dir.path());
        let result = ScaffoldWebProjectTool
            .invoke(serde_json::json!({"name": "../evil"}), &ctx)
            .await;
        assert!(!result.success);
    }
}
