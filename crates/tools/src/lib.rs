//! Tool contract, registry, dispatch, and the built-in adapters.
//!
//! Tools are values implementing [`Tool`], registered into a
//! [`ToolRegistry`] at process start. The dispatcher validates and
//! coerces arguments against each tool's JSON schema, applies
//! per-capability timeouts, and runs parallel-safe groups under a
//! bounded semaphore.

pub mod control;
pub mod dispatch;
pub mod files;
pub mod presentation;
pub mod registry;
pub mod sandbox;
pub mod shell;
pub mod tasklist;
pub mod tool;
pub mod webdev;
pub mod websearch;

pub use dispatch::{dispatch_batch, dispatch_one};
pub use registry::ToolRegistry;
pub use sandbox::{LocalSandbox, SandboxHandle};
pub use tasklist::ThreadLockMap;
pub use tool::{Tool, ToolCapabilities, ToolContext, ToolResult};

use al_domain::config::SearchConfig;
use al_domain::error::Result;

/// Build the registry of built-in tools.
pub fn builtin_registry(search: &SearchConfig) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();

    registry.register(shell::ExecuteCommandTool)?;
    registry.register(files::CreateFileTool)?;
    registry.register(files::ReadFileTool)?;
    registry.register(files::DeleteFileTool)?;
    registry.register(files::ListDirTool)?;

    registry.register(tasklist::CreateTasksTool)?;
    registry.register(tasklist::ViewTasksTool)?;
    registry.register(tasklist::UpdateTasksTool)?;
    registry.register(tasklist::DeleteTasksTool)?;
    registry.register(tasklist::ClearAllTool)?;

    registry.register(websearch::WebSearchTool::new(search)?)?;
    registry.register(websearch::ScrapeWebpageTool::new(search)?)?;

    registry.register(webdev::ScaffoldWebProjectTool)?;
    registry.register(presentation::CreatePresentationTool)?;

    registry.register(control::AskTool)?;
    registry.register(control::CompleteTool)?;
    registry.register(control::WebBrowserTakeoverTool)?;

    Ok(registry)
}
