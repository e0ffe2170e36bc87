//! Content importer boundary
//!
//! The export tool is a black box: it is handed the Windmill base URL, a
//! token and a workspace name, runs inside the working directory and
//! overwrites it with the exported workspace. Its output is captured and
//! never forwarded verbatim.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command as AsyncCommand;
use tracing::{debug, info};

use crate::error::SyncError;

/// Populates the working directory with exported workspace content
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentImporter: Send + Sync {
    async fn run(
        &self,
        workdir: &Path,
        base_url: &str,
        token: &str,
        workspace: &str,
    ) -> Result<(), SyncError>;
}

/// Runs `wmill sync pull` against a Windmill server
#[derive(Debug, Clone)]
pub struct WmillCli {
    program: String,
}

impl WmillCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Arguments for a non-interactive pull
    fn pull_args<'a>(base_url: &'a str, token: &'a str, workspace: &'a str) -> [&'a str; 9] {
        [
            "sync",
            "pull",
            "--base-url",
            base_url,
            "--token",
            token,
            "--workspace",
            workspace,
            "--yes",
        ]
    }
}

#[async_trait]
impl ContentImporter for WmillCli {
    async fn run(
        &self,
        workdir: &Path,
        base_url: &str,
        token: &str,
        workspace: &str,
    ) -> Result<(), SyncError> {
        info!("Syncing Windmill workspace '{}' from {}", workspace, base_url);

        let output = AsyncCommand::new(&self.program)
            .args(Self::pull_args(base_url, token, workspace))
            .current_dir(workdir)
            .output()
            .await
            .map_err(|e| SyncError::import(format!("could not run {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let diagnostic = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };

            return Err(SyncError::import(format!(
                "{} exited with {}: {}",
                self.program, output.status, diagnostic
            )));
        }

        debug!(
            "{} produced {} bytes of output",
            self.program,
            output.stdout.len()
        );
        info!("Windmill sync completed successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_pull_args_contract() {
        let args = WmillCli::pull_args("http://windmill:8000", "E1", "prod");
        assert_eq!(
            args,
            [
                "sync",
                "pull",
                "--base-url",
                "http://windmill:8000",
                "--token",
                "E1",
                "--workspace",
                "prod",
                "--yes"
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_import_error() {
        let dir = tempfile::tempdir().unwrap();
        let importer = WmillCli::new("definitely-not-wmill");

        let err = importer
            .run(dir.path(), "http://windmill:8000", "E1", "prod")
            .await
            .unwrap_err();

        assert_matches!(err, SyncError::ImportTool { .. });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_carries_diagnostic() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-wmill");
        std::fs::write(&script, "#!/bin/sh\necho 'workspace not found' >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let importer = WmillCli::new(script.to_string_lossy().to_string());
        let err = importer
            .run(dir.path(), "http://windmill:8000", "E1", "missing")
            .await
            .unwrap_err();

        assert_matches!(err, SyncError::ImportTool { ref detail } if detail.contains("workspace not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_inside_workdir() {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = tempfile::tempdir().unwrap();
        let workdir = tempfile::tempdir().unwrap();
        let script = bin_dir.path().join("fake-wmill");
        std::fs::write(&script, "#!/bin/sh\necho \"$6\" > exported.txt\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let importer = WmillCli::new(script.to_string_lossy().to_string());
        importer
            .run(workdir.path(), "http://windmill:8000", "E1", "prod")
            .await
            .unwrap();

        let exported = std::fs::read_to_string(workdir.path().join("exported.txt")).unwrap();
        assert_eq!(exported.trim(), "E1");
    }
}
