use std::path::Path;
use std::process::Output;
use thiserror::Error;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// Failure of a single git invocation
#[derive(Error, Debug)]
pub enum GitError {
    #[error("failed to execute git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// How the remote treated a single ref in `git push --porcelain` output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushFlag {
    FastForward,
    Forced,
    Deleted,
    NewRef,
    Rejected,
    UpToDate,
}

impl PushFlag {
    fn from_char(flag: char) -> Option<Self> {
        match flag {
            ' ' => Some(PushFlag::FastForward),
            '+' => Some(PushFlag::Forced),
            '-' => Some(PushFlag::Deleted),
            '*' => Some(PushFlag::NewRef),
            '!' => Some(PushFlag::Rejected),
            '=' => Some(PushFlag::UpToDate),
            _ => None,
        }
    }
}

/// Per-ref push result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRefStatus {
    pub flag: PushFlag,
    pub from: String,
    pub to: String,
    pub summary: String,
}

/// Outcome of a push, including refs the remote refused
#[derive(Debug, Clone)]
pub struct PushReport {
    pub success: bool,
    pub refs: Vec<PushRefStatus>,
    pub stderr: String,
}

impl PushReport {
    pub fn rejected(&self) -> impl Iterator<Item = &PushRefStatus> {
        self.refs.iter().filter(|r| r.flag == PushFlag::Rejected)
    }
}

/// Thin async wrapper around the `git` executable
#[derive(Debug, Clone)]
pub struct GitClient {
    binary: String,
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitClient {
    /// Create a client that invokes the given git binary
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Clone `url` into `dir`, which must exist and be empty
    pub async fn clone_into(&self, dir: &Path, url: &str) -> Result<(), GitError> {
        self.run(dir, &["clone", "--quiet", "--", url, "."]).await?;
        Ok(())
    }

    pub async fn set_config(&self, dir: &Path, key: &str, value: &str) -> Result<(), GitError> {
        self.run(dir, &["config", key, value]).await?;
        Ok(())
    }

    /// Resolve a ref to a commit id, `None` if it does not exist
    pub async fn resolve_commit(&self, dir: &Path, reference: &str) -> Result<Option<String>, GitError> {
        let spec = format!("{}^{{commit}}", reference);
        let output = self
            .output(dir, &["rev-parse", "--verify", "--quiet", &spec])
            .await?;

        if output.status.success() {
            Ok(Some(String::from_utf8_lossy(&output.stdout).trim().to_string()))
        } else {
            Ok(None)
        }
    }

    pub async fn fetch(&self, dir: &Path, remote: &str) -> Result<(), GitError> {
        self.run(dir, &["fetch", "--prune", "--quiet", remote]).await?;
        Ok(())
    }

    /// Create or reset `branch` to `start_point` and check it out, discarding local edits
    pub async fn force_checkout_at(&self, dir: &Path, branch: &str, start_point: &str) -> Result<(), GitError> {
        self.run(dir, &["checkout", "--quiet", "--force", "-B", branch, start_point])
            .await?;
        Ok(())
    }

    /// Point `HEAD` at a branch without touching the index or worktree
    pub async fn point_head_at(&self, dir: &Path, branch: &str) -> Result<(), GitError> {
        let reference = format!("refs/heads/{}", branch);
        self.run(dir, &["symbolic-ref", "HEAD", &reference]).await?;
        Ok(())
    }

    /// Remove every tracked path from the index and the worktree
    pub async fn remove_all_tracked(&self, dir: &Path) -> Result<(), GitError> {
        self.run(dir, &["rm", "-r", "-f", "--quiet", "--ignore-unmatch", "--", "."])
            .await?;
        Ok(())
    }

    /// Remove untracked files and directories (ignored files are kept)
    pub async fn clean_untracked(&self, dir: &Path) -> Result<(), GitError> {
        self.run(dir, &["clean", "-f", "-d", "--quiet"]).await?;
        Ok(())
    }

    /// Porcelain status including every untracked file
    pub async fn status_porcelain(&self, dir: &Path) -> Result<String, GitError> {
        self.run(dir, &["status", "--porcelain", "--untracked-files=all"])
            .await
    }

    /// Stage additions, modifications and deletions in one index update
    pub async fn add_all(&self, dir: &Path) -> Result<(), GitError> {
        self.run(dir, &["add", "--all"]).await?;
        Ok(())
    }

    pub async fn commit(&self, dir: &Path, message: &str) -> Result<(), GitError> {
        self.run(dir, &["commit", "--quiet", "-m", message]).await?;
        Ok(())
    }

    pub async fn remote_names(&self, dir: &Path) -> Result<Vec<String>, GitError> {
        let stdout = self.run(dir, &["remote"]).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn add_remote(&self, dir: &Path, name: &str, url: &str) -> Result<(), GitError> {
        self.run(dir, &["remote", "add", name, url]).await?;
        Ok(())
    }

    pub async fn set_remote_url(&self, dir: &Path, name: &str, url: &str) -> Result<(), GitError> {
        self.run(dir, &["remote", "set-url", name, url]).await?;
        Ok(())
    }

    /// Fast-forward-only push of `refspec`, reporting per-ref status
    pub async fn push(&self, dir: &Path, remote: &str, refspec: &str) -> Result<PushReport, GitError> {
        let output = self
            .output(dir, &["push", "--porcelain", remote, refspec])
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(PushReport {
            success: output.status.success(),
            refs: parse_push_porcelain(&stdout),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Move the branch tip back to `commit`, keeping index and worktree
    pub async fn soft_reset(&self, dir: &Path, commit: &str) -> Result<(), GitError> {
        self.run(dir, &["reset", "--soft", "--quiet", commit]).await?;
        Ok(())
    }

    pub async fn delete_ref(&self, dir: &Path, reference: &str) -> Result<(), GitError> {
        self.run(dir, &["update-ref", "-d", reference]).await?;
        Ok(())
    }

    // Helper methods for running git

    /// Run git and require a zero exit status, returning stdout
    async fn run(&self, dir: &Path, args: &[&str]) -> Result<String, GitError> {
        let output = self.output(dir, args).await?;

        if !output.status.success() {
            return Err(GitError::Failed {
                command: subcommand(args),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run git and hand back the raw output whatever the exit status
    async fn output(&self, dir: &Path, args: &[&str]) -> Result<Output, GitError> {
        debug!("Running git {} in {}", subcommand(args), dir.display());

        // Never block on an interactive credential prompt
        AsyncCommand::new(&self.binary)
            .args(args)
            .current_dir(dir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .await
            .map_err(|source| GitError::Spawn {
                command: subcommand(args),
                source,
            })
    }
}

/// Only the subcommand is ever echoed; arguments may carry credentials
fn subcommand(args: &[&str]) -> String {
    args.first().copied().unwrap_or_default().to_string()
}

/// Parse the ref lines of `git push --porcelain` output.
///
/// Ref lines look like `<flag>\t<from>:<to>\t<summary>`; the `To <url>`
/// header and the trailing `Done` are skipped.
pub fn parse_push_porcelain(stdout: &str) -> Vec<PushRefStatus> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut chars = line.chars();
            let flag = PushFlag::from_char(chars.next()?)?;
            let rest = chars.as_str().strip_prefix('\t')?;

            let mut fields = rest.splitn(2, '\t');
            let refs = fields.next()?;
            let summary = fields.next().unwrap_or_default().trim().to_string();
            let (from, to) = refs.split_once(':')?;

            Some(PushRefStatus {
                flag,
                from: from.to_string(),
                to: to.to_string(),
                summary,
            })
        })
        .collect()
}
