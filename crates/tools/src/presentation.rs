//! Presentation builder — writes one standalone HTML document per
//! slide plus a manifest under `presentations/<name>/`.

use serde_json::Value;

use crate::tool::{Tool, ToolCapabilities, ToolContext, ToolResult};

pub struct CreatePresentationTool;

fn slide_html(deck_title: &str, slide_title: &str, content: &str, number: usize) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <title>{deck_title} — {number}</title>
    <style>
      body {{
        width: 1920px;
        height: 1080px;
        margin: 0;
        display: flex;
        flex-direction: column;
        justify-content: center;
        padding: 96px;
        box-sizing: border-box;
        font-family: system-ui, sans-serif;
      }}
      h1 {{ font-size: 72px; margin: 0 0 48px; }}
      .content {{ font-size: 36px; line-height: 1.5; white-space: pre-wrap; }}
    </style>
  </head>
  <body>
    <h1>{slide_title}</h1>
    <div class="content">{content}</div>
  </body>
</html>
"#
    )
}

#[async_trait::async_trait]
impl Tool for CreatePresentationTool {
    fn name(&self) -> &str {
        "create_presentation"
    }

    fn description(&self) -> &str {
        "Create a slide deck in the workspace: one 1920x1080 HTML page per slide plus a manifest."
    }

    fn parameters(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "presentation_name": {
                    "type": "string",
                    "description": "Directory name for the deck (kebab-case)"
                },
                "title": { "type": "string", "description": "Deck title" },
                "slides": {
                    "type": "array",
                    "description": "Slides in order: [{\"title\": \"...\", \"content\": \"...\"}]"
                }
            },
            "required": ["presentation_name", "title", "slides"]
        })
    }

    fn examples(&self) -> &str {
        r#"<function_calls>
<invoke name="create_presentation">
<parameter name="presentation_name">quarterly-review</parameter>
<parameter name="title">Quarterly Review</parameter>
<parameter name="slides">[{"title": "Agenda", "content": "Wins\nMisses\nNext quarter"}]</parameter>
</invoke>
</function_calls>"#
    }

    fn capabilities(&self) -> ToolCapabilities {
        ToolCapabilities {
            requires_sandbox: true,
            long_running: true,
            ..Default::default()
        }
    }

    async fn invoke(&self, args: Value, ctx: &ToolContext) -> ToolResult {
        let sandbox = match ctx.require_sandbox() {
            Ok(s) => s,
            Err(e) => return e,
        };
        let name = args["presentation_name"].as_str().unwrap_or_default();
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return ToolResult::error(format!("invalid presentation name '{name}'"));
        }
        let deck_title = args["title"].as_str().unwrap_or(name);
        let Some(slides) = args["slides"].as_array() else {
            return ToolResult::error("'slides' must be an array");
        };
        if slides.is_empty() {
            return ToolResult::error("a presentation needs at least one slide");
        }

        let dir = format!("presentations/{name}");
        let mut manifest_slides = Vec::new();
        let mut result = ToolResult::ok(format!(
            "created presentation '{deck_title}' with {} slides under {dir}/",
            slides.len()
        ));

        for (i, slide) in slides.iter().enumerate() {
            let number = i + 1;
            let slide_title = slide.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let content = slide.get("content").and_then(|v| v.as_str()).unwrap_or("");
            let file = format!("{dir}/slide_{number:02}.html");
            let html = slide_html(deck_title, slide_title, content, number);
            if let Err(e) = sandbox.write_file(&file, &html).await {
                return ToolResult::error(format!("failed to write {file}: {e}"));
            }
            manifest_slides.push(serde_json::json!({
                "number": number,
                "title": slide_title,
                "file": file,
            }));
            result = result.with_attachment("slide", file);
        }

        let manifest = serde_json::json!({
            "title": deck_title,
            "slide_count": slides.len(),
            "slides": manifest_slides,
        });
        let manifest_path = format!("{dir}/manifest.json");
        let manifest_str = serde_json::to_string_pretty(&manifest).unwrap_or_default();
        if let Err(e) = sandbox.write_file(&manifest_path, &manifest_str).await {
            return ToolResult::error(format!("failed to write {manifest_path}: {e}"));
        }
        result.with_attachment("manifest", manifest_path)
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
    async fn writes_slides_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let (_state, ctx) = ctx(dir.path());
        let result = CreatePresentationTool
            .invoke(
                serde_json::json!({
                    "presentation_name": "demo",
                    "title": "Demo Deck",
                    "slides": [
                        {"title": "One", "content": "first"},
                        {"title": "Two", "content": "second"}
                    ]
                }),
                &ctx,
            )
            .await;
        assert!(result.success, "{}", result.output);

        let manifest_path = dir.path().join("presentations/demo/manifest.json");
        let manifest: Value =
            serde_json::from_str(&std::fs::read_to_string(manifest_path).unwrap()).unwrap();
        assert_eq!(manifest["slide_count"], 2);
        assert!(dir.path().join("presentations/demo/slide_01.html").exists());
        assert!(dir.path().join("presentations/demo/slide_02.html").exists());

        // 2 slides + manifest attachments.
        assert_eq!(result.attachments.len(), 3);
    }

    #[tokio::test]
    async fn empty_deck_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (_state, ctx) = ctx(dir.path());
        let result = CreatePresentationTool
            .invoke(
                serde_json::json!({
                    "presentation_name": "demo",
                    "title": "Demo",
                    "slides": []
                }),
                &ctx,
            )
            .await;
        assert!(!result.success);
    }
}
