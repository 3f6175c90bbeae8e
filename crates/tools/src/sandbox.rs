//! Sandbox access for tools.
//!
//! Tool adapters borrow a [`SandboxHandle`] from the project for the
//! duration of an invocation. [`LocalSandbox`] implements the handle
//! with subprocesses rooted at a per-project workspace directory; a
//! remote container runtime slots in behind the same trait.

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;

use al_domain::error::{Error, Result};

/// Outcome of a sandbox command.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub exit_code: i32,
    /// Interleaved stdout + stderr, truncated to the configured cap.
    pub output: String,
}

#[async_trait::async_trait]
pub trait SandboxHandle: Send + Sync {
    /// Run a shell command in the workspace, waiting up to `timeout`.
    async fn exec(&self, command: &str, timeout: Duration) -> Result<ExecOutcome>;

    async fn write_file(&self, path: &str, contents: &str) -> Result<()>;
    async fn read_file(&self, path: &str) -> Result<String>;
    async fn delete_file(&self, path: &str) -> Result<()>;
    async fn list_dir(&self, path: &str) -> Result<Vec<String>>;
}

/// Normalize a model-supplied path to be relative to the workspace.
///
/// Strips a leading `/workspace/` (the path the model sees), leading
/// slashes and `./`, and rejects any `..` component.
pub fn clean_path(raw: &str) -> Result<PathBuf> {
    let trimmed = raw
        .trim()
        .trim_start_matches("/workspace/")
        .trim_start_matches("/workspace")
        .trim_start_matches('/')
        .trim_start_matches("./");

    let path = Path::new(trimmed);
    for component in path.components() {
        if matches!(component, Component::ParentDir) {
            return Err(Error::Sandbox(format!(
                "path '{raw}' escapes the workspace"
            )));
        }
    }
    Ok(path.to_path_buf())
}

/// Local-process sandbox: `sh -c` rooted at a workspace directory.
pub struct LocalSandbox {
    root: PathBuf,
    max_output_chars: usize,
}

impl LocalSandbox {
    pub fn new(root: PathBuf, max_output_chars: usize) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            max_output_chars,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, raw: &str) -> Result<PathBuf> {
        Ok(self.root.join(clean_path(raw)?))
    }

    fn cap(&self, mut text: String) -> String {
        if text.len() > self.max_output_chars {
            let mut end = self.max_output_chars;
            while !text.is_char_boundary(end) && end > 0 {
                end -= 1;
            }
            text.truncate(end);
            text.push_str("\n[output truncated]");
        }
        text
    }
}

#[async_trait::async_trait]
impl SandboxHandle for LocalSandbox {
    async fn exec(&self, command: &str, timeout: Duration) -> Result<ExecOutcome> {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| Error::Sandbox(format!("spawn failed: {e}")))?;

        let result = tokio::time::timeout(timeout, child.wait_with_output()).await;
        match result {
            Ok(Ok(output)) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.is_empty() {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(&stderr);
                }
                Ok(ExecOutcome {
                    exit_code: output.status.code().unwrap_or(-1),
                    output: self.cap(text),
                })
            }
            Ok(Err(e)) => Err(Error::Sandbox(format!("wait failed: {e}"))),
            Err(_) => Err(Error::Timeout(format!(
                "command exceeded {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn write_file(&self, path: &str, contents: &str) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(full, contents).await?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        let contents = tokio::fs::read_to_string(full).await?;
        Ok(self.cap(contents))
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        tokio::fs::remove_file(full).await?;
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let full = self.resolve(path)?;
        let mut entries = tokio::fs::read_dir(full).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> (tempfile::TempDir, LocalSandbox) {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(dir.path().to_path_buf(), 10_000).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn clean_path_normalizes_workspace_prefix() {
        assert_eq!(clean_path("/workspace/a.txt").unwrap(), PathBuf::from("a.txt"));
        assert_eq!(clean_path("a/b.txt").unwrap(), PathBuf::from("a/b.txt"));
        assert_eq!(clean_path("./c.txt").unwrap(), PathBuf::from("c.txt"));
        assert_eq!(clean_path("/abs.txt").unwrap(), PathBuf::from("abs.txt"));
    }

    #[test]
    fn clean_path_rejects_escapes() {
        assert!(clean_path("../etc/passwd").is_err());
        assert!(clean_path("/workspace/../../etc").is_err());
        assert!(clean_path("a/../../b").is_err());
    }

    #[tokio::test]
    async fn exec_captures_output_and_exit_code() {
        let (_dir, sandbox) = sandbox();
        let outcome = sandbox
            .exec("echo hello && exit 3", Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 3);
        assert!(outcome.output.contains("hello"));
    }

    #[tokio::test]
    async fn exec_times_out() {
        let (_dir, sandbox) = sandbox();
        let result = sandbox.exec("sleep 5", Duration::from_millis(50)).await;
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[tokio::test]
    async fn file_round_trip() {
        let (_dir, sandbox) = sandbox();
        sandbox
            .write_file("sub/note.txt", "contents")
            .await
            .unwrap();
        assert_eq!(sandbox.read_file("sub/note.txt").await.unwrap(), "contents");
        assert_eq!(sandbox.list_dir("sub").await.unwrap(), vec!["note.txt"]);
        sandbox.delete_file("sub/note.txt").await.unwrap();
        assert!(sandbox.read_file("sub/note.txt").await.is_err());
    }

    #[tokio::test]
    async fn output_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(dir.path().to_path_buf(), 16).unwrap();
        let outcome = sandbox
            .exec("printf 'aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa'", Duration::from_secs(10))
            .await
            .unwrap();
        assert!(outcome.output.contains("[output truncated]"));
    }
}
