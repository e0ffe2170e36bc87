//! Repository reconciliation
//!
//! Whatever state the working directory is in, reconciliation leaves behind
//! a repository whose branch pointer matches the remote branch tip, or a
//! fresh orphan branch when the remote branch does not exist yet. It always
//! runs before content import so the import lands on a clean tree.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::SyncError;
use crate::git::{GitClient, GitError};
use crate::request::SyncRequest;
use crate::workdir::{self, WorkingDirectoryState};

/// Name of the single remote the working copy is bound to
pub const REMOTE_NAME: &str = "origin";

/// How the requested branch was brought in line with the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchAlignment {
    /// Branch hard-reset to the remote tip
    ResetToRemote,
    /// Remote branch absent; the existing local branch is kept and will create it on push
    KeptLocal,
    /// Remote branch absent; started a parentless branch with an empty tree
    Orphan,
}

/// Exclusive handle to the reconciled working tree for one run
#[derive(Debug)]
pub struct LocalRepository {
    path: PathBuf,
    branch: String,
    alignment: BranchAlignment,
    git: GitClient,
}

impl LocalRepository {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn alignment(&self) -> BranchAlignment {
        self.alignment
    }

    pub fn git(&self) -> &GitClient {
        &self.git
    }
}

/// Produces a [`LocalRepository`] mirroring the remote branch
#[derive(Debug, Clone)]
pub struct Reconciler {
    git: GitClient,
}

impl Reconciler {
    pub fn new(git: GitClient) -> Self {
        Self { git }
    }

    /// Clone, reset or reuse the working copy depending on what is on disk
    pub async fn reconcile(&self, workdir: &Path, request: &SyncRequest) -> Result<LocalRepository, SyncError> {
        let state = workdir::inspect(workdir).await?;
        info!(state = ?state, "Inspected working directory {}", workdir.display());

        match state {
            WorkingDirectoryState::Uninitialized => {
                info!("Workspace is empty, cloning from remote");
                self.clone_fresh(workdir, request).await
            }
            WorkingDirectoryState::UntrackedContent => {
                info!("Workspace has files but no git repository, cleaning and cloning from remote");
                let removed = workdir::clear_contents(workdir).await?;
                info!("Removed {} stale entries from workspace", removed);
                self.clone_fresh(workdir, request).await
            }
            WorkingDirectoryState::ExistingRepository => {
                info!("Opening existing Git repository");
                self.refresh_existing(workdir, request).await
            }
        }
    }

    async fn clone_fresh(&self, workdir: &Path, request: &SyncRequest) -> Result<LocalRepository, SyncError> {
        workdir::ensure_exists(workdir).await?;

        info!("Cloning remote repository from {}", request.display_remote_url());
        self.git
            .clone_into(workdir, &request.authenticated_remote_url())
            .await
            .map_err(|e| SyncError::remote("clone remote repository", e))?;

        let repo = self.finish(workdir, request).await?;
        info!("Repository cloned successfully");
        Ok(repo)
    }

    async fn refresh_existing(&self, workdir: &Path, request: &SyncRequest) -> Result<LocalRepository, SyncError> {
        // Tokens may rotate between runs, so fetch with the current one
        ensure_origin(&self.git, workdir, &request.authenticated_remote_url())
            .await
            .map_err(|e| SyncError::filesystem("configure remote origin", e))?;

        self.git
            .fetch(workdir, REMOTE_NAME)
            .await
            .map_err(|e| SyncError::remote("sync local repository with remote", e))?;
        info!("Fetched from remote");

        self.finish(workdir, request).await
    }

    async fn finish(&self, workdir: &Path, request: &SyncRequest) -> Result<LocalRepository, SyncError> {
        self.configure_identity(workdir, request).await?;
        let alignment = self.align_branch(workdir, &request.git_branch).await?;

        Ok(LocalRepository {
            path: workdir.to_path_buf(),
            branch: request.git_branch.clone(),
            alignment,
            git: self.git.clone(),
        })
    }

    async fn configure_identity(&self, workdir: &Path, request: &SyncRequest) -> Result<(), SyncError> {
        self.git
            .set_config(workdir, "user.name", &request.commit_author_name)
            .await
            .map_err(|e| SyncError::filesystem("configure commit author", e))?;
        self.git
            .set_config(workdir, "user.email", &request.commit_author_email)
            .await
            .map_err(|e| SyncError::filesystem("configure commit author", e))
    }

    async fn align_branch(&self, workdir: &Path, branch: &str) -> Result<BranchAlignment, SyncError> {
        let local = |e: GitError| SyncError::filesystem("prepare branch", e);
        let remote_ref = format!("refs/remotes/{}/{}", REMOTE_NAME, branch);

        if self.git.resolve_commit(workdir, &remote_ref).await.map_err(local)?.is_some() {
            self.git
                .force_checkout_at(workdir, branch, &remote_ref)
                .await
                .map_err(local)?;
            self.git.clean_untracked(workdir).await.map_err(local)?;
            info!("Reset local branch '{}' to match {}/{}", branch, REMOTE_NAME, branch);
            return Ok(BranchAlignment::ResetToRemote);
        }

        info!(
            "Branch '{}' doesn't exist on remote yet, will be created on push",
            branch
        );

        // Leftovers staged by an unpublished run never survive
        let local_ref = format!("refs/heads/{}", branch);
        if self.git.resolve_commit(workdir, &local_ref).await.map_err(local)?.is_some() {
            self.git
                .force_checkout_at(workdir, branch, &local_ref)
                .await
                .map_err(local)?;
            self.git.clean_untracked(workdir).await.map_err(local)?;
            info!("Reset working tree to existing local branch '{}'", branch);
            return Ok(BranchAlignment::KeptLocal);
        }

        // Orphan: HEAD on an unborn branch, nothing staged, nothing left behind
        self.git.point_head_at(workdir, branch).await.map_err(local)?;
        self.git.remove_all_tracked(workdir).await.map_err(local)?;
        self.git.clean_untracked(workdir).await.map_err(local)?;
        info!("Created orphan branch '{}'", branch);
        Ok(BranchAlignment::Orphan)
    }
}

/// Point `origin` at `url`, creating the remote if it is missing
pub(crate) async fn ensure_origin(git: &GitClient, workdir: &Path, url: &str) -> Result<(), GitError> {
    let remotes = git.remote_names(workdir).await?;

    if remotes.iter().any(|name| name == REMOTE_NAME) {
        git.set_remote_url(workdir, REMOTE_NAME, url).await
    } else {
        git.add_remote(workdir, REMOTE_NAME, url).await
    }
}
