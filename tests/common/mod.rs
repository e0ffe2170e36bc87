//! Common test utilities and helpers for windmill-git-sync tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

use windmill_git_sync::{Config, ContentImporter, SyncEngine, SyncError, SyncPayload};

/// Run git with a fixed identity and return trimmed stdout, panicking on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Test Seeder", "-c", "user.email=seed@example.com"])
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Whether `reference` resolves to a commit in `dir`
pub fn has_commit(dir: &Path, reference: &str) -> bool {
    Command::new("git")
        .args(["rev-parse", "--verify", "--quiet", &format!("{}^{{commit}}", reference)])
        .current_dir(dir)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Clone `remote` under `scratch`, commit `files` on `branch` and push it back
pub fn push_commit(
    remote: &Path,
    scratch: &Path,
    branch: &str,
    files: &[(&str, &str)],
    message: &str,
) -> String {
    let side = TempDir::new_in(scratch).expect("Failed to create side clone dir");
    git(side.path(), &["clone", "--quiet", &remote.to_string_lossy(), "."]);

    let tracking = format!("refs/remotes/origin/{}", branch);
    if has_commit(side.path(), &tracking) {
        git(side.path(), &["checkout", "--quiet", "-B", branch, &tracking]);
    } else {
        git(side.path(), &["symbolic-ref", "HEAD", &format!("refs/heads/{}", branch)]);
        git(side.path(), &["rm", "-r", "-q", "--cached", "--ignore-unmatch", "."]);
    }

    for (path, content) in files {
        let file = side.path().join(path);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dir");
        }
        std::fs::write(file, content).expect("Failed to write file");
    }

    git(side.path(), &["add", "-A"]);
    git(side.path(), &["commit", "--quiet", "-m", message]);
    git(side.path(), &["push", "--quiet", "origin", &format!("HEAD:refs/heads/{}", branch)]);
    git(side.path(), &["rev-parse", "HEAD"])
}

/// A bare remote plus a scratch area, all inside one temporary directory
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub remote: PathBuf,
    pub workdir: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let remote = temp_dir.path().join("remote.git");
        let workdir = temp_dir.path().join("workspace");

        std::fs::create_dir_all(&remote).expect("Failed to create remote dir");
        git(&remote, &["init", "--bare", "--quiet"]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        Self {
            temp_dir,
            remote,
            workdir,
        }
    }

    pub fn remote_url(&self) -> String {
        self.remote.to_string_lossy().to_string()
    }

    /// Push a commit containing `files` to `branch` of the remote from a side clone
    pub fn push_to_remote(&self, branch: &str, files: &[(&str, &str)], message: &str) -> String {
        push_commit(&self.remote, self.temp_dir.path(), branch, files, message)
    }

    /// Tip of `branch` on the remote, if it exists
    pub fn remote_tip(&self, branch: &str) -> Option<String> {
        let reference = format!("refs/heads/{}", branch);
        if has_commit(&self.remote, &reference) {
            Some(git(&self.remote, &["rev-parse", &reference]))
        } else {
            None
        }
    }

    /// Files tracked at the tip of `branch` on the remote
    pub fn remote_files(&self, branch: &str) -> Vec<String> {
        let listing = git(&self.remote, &["ls-tree", "-r", "--name-only", branch]);
        listing.lines().map(str::to_string).collect()
    }

    /// Install a pre-receive hook that declines every push
    #[cfg(unix)]
    pub fn reject_pushes(&self) {
        use std::os::unix::fs::PermissionsExt;

        let hook = self.remote.join("hooks").join("pre-receive");
        std::fs::create_dir_all(hook.parent().unwrap()).expect("Failed to create hooks dir");
        std::fs::write(&hook, "#!/bin/sh\necho 'pushes are frozen' >&2\nexit 1\n")
            .expect("Failed to write hook");
        std::fs::set_permissions(&hook, std::fs::Permissions::from_mode(0o755))
            .expect("Failed to make hook executable");
    }

    pub fn accept_pushes(&self) {
        let hook = self.remote.join("hooks").join("pre-receive");
        if hook.exists() {
            std::fs::remove_file(hook).expect("Failed to remove hook");
        }
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.workspace_dir = self.workdir.to_string_lossy().to_string();
        config
    }

    pub fn engine(&self, importer: impl ContentImporter + 'static) -> SyncEngine {
        SyncEngine::with_importer(self.config(), Arc::new(importer))
    }

    pub fn payload(&self, workspace: &str) -> SyncPayload {
        SyncPayload {
            windmill_token: Some("wm_export_token".into()),
            git_remote_url: Some(self.remote_url()),
            git_token: Some("ghp_push_token".into()),
            workspace: Some(workspace.to_string()),
            ..Default::default()
        }
    }
}

/// Writes a fixed set of files into the working directory, like an export would
pub struct FakeExport {
    pub files: Vec<(String, String)>,
}

impl FakeExport {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(path, content)| (path.to_string(), content.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl ContentImporter for FakeExport {
    async fn run(
        &self,
        workdir: &Path,
        _base_url: &str,
        _token: &str,
        _workspace: &str,
    ) -> Result<(), SyncError> {
        for (path, content) in &self.files {
            let file = workdir.join(path);
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent).map_err(SyncError::import)?;
            }
            std::fs::write(file, content).map_err(SyncError::import)?;
        }
        Ok(())
    }
}

/// An export tool that always fails with the given diagnostic
pub struct FailingExport(pub &'static str);

#[async_trait]
impl ContentImporter for FailingExport {
    async fn run(
        &self,
        _workdir: &Path,
        _base_url: &str,
        _token: &str,
        _workspace: &str,
    ) -> Result<(), SyncError> {
        Err(SyncError::import(self.0))
    }
}

/// An export that lands someone else's commit on the remote before writing its files
pub struct RacingExport {
    pub remote: PathBuf,
    pub scratch: PathBuf,
    pub branch: String,
    pub inner: FakeExport,
}

#[async_trait]
impl ContentImporter for RacingExport {
    async fn run(
        &self,
        workdir: &Path,
        base_url: &str,
        token: &str,
        workspace: &str,
    ) -> Result<(), SyncError> {
        push_commit(
            &self.remote,
            &self.scratch,
            &self.branch,
            &[("racer.txt", "pushed mid-sync")],
            "Concurrent edit",
        );
        self.inner.run(workdir, base_url, token, workspace).await
    }
}

/// An export that moves the remote out of reach before writing its files
pub struct VanishingRemoteExport {
    pub remote: PathBuf,
    pub moved_to: PathBuf,
    pub inner: FakeExport,
}

#[async_trait]
impl ContentImporter for VanishingRemoteExport {
    async fn run(
        &self,
        workdir: &Path,
        base_url: &str,
        token: &str,
        workspace: &str,
    ) -> Result<(), SyncError> {
        std::fs::rename(&self.remote, &self.moved_to).expect("Failed to move remote");
        self.inner.run(workdir, base_url, token, workspace).await
    }
}
