//! Commit & publish
//!
//! Stages everything the import produced, records a single commit with a
//! fixed message and pushes it fast-forward only. A push that fails for any
//! ref is fatal and the commit is rolled back.

use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::git::GitError;
use crate::reconcile::{ensure_origin, LocalRepository, REMOTE_NAME};
use crate::request::SyncRequest;

/// What publishing did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Working tree matched the last commit; nothing was committed or pushed
    NoChanges,
    /// A commit was created and accepted by the remote
    Pushed { branch: String, commit: String },
}

/// Deterministic commit message for a workspace backup
pub fn commit_message(workspace: &str) -> String {
    format!("Automated Windmill workspace backup - {}", workspace)
}

/// Commit any changes in the working tree and push them to the remote branch
pub async fn commit_and_publish(repo: &LocalRepository, request: &SyncRequest) -> Result<PublishOutcome, SyncError> {
    let git = repo.git();
    let dir = repo.path();
    let local = |operation: &'static str| move |e: GitError| SyncError::filesystem(operation, e);

    let status = git
        .status_porcelain(dir)
        .await
        .map_err(local("inspect working tree"))?;

    if status.trim().is_empty() {
        info!("No changes to commit");
        return Ok(PublishOutcome::NoChanges);
    }
    debug!("{} changed paths in working tree", status.lines().count());

    git.add_all(dir).await.map_err(local("stage changes"))?;

    let previous_tip = git
        .resolve_commit(dir, "HEAD")
        .await
        .map_err(local("inspect repository"))?;

    let message = commit_message(&request.workspace_name);
    git.commit(dir, &message).await.map_err(local("create commit"))?;
    let commit = git
        .resolve_commit(dir, "HEAD")
        .await
        .map_err(local("inspect repository"))?
        .unwrap_or_default();
    info!("Created commit {}: {}", commit, message);

    if let Err(mut err) = push(repo, request).await {
        let restored = rollback(repo, previous_tip.as_deref()).await;
        if let SyncError::PushConflict { rolled_back, .. } = &mut err {
            *rolled_back = restored;
        }
        return Err(err);
    }

    Ok(PublishOutcome::Pushed {
        branch: repo.branch().to_string(),
        commit,
    })
}

async fn push(repo: &LocalRepository, request: &SyncRequest) -> Result<(), SyncError> {
    let git = repo.git();
    let dir = repo.path();

    // The URL must carry this request's token, not whatever an earlier run stored
    ensure_origin(git, dir, &request.authenticated_remote_url())
        .await
        .map_err(|e| SyncError::filesystem("configure remote origin", e))?;

    info!(
        "Pushing to {} (branch: {})",
        request.display_remote_url(),
        repo.branch()
    );

    let refspec = format!("HEAD:refs/heads/{}", repo.branch());
    let report = git
        .push(dir, REMOTE_NAME, &refspec)
        .await
        .map_err(|e| SyncError::remote("push to Git remote", e))?;

    if let Some(rejected) = report.rejected().next() {
        error!("Push rejected for {}: {}", rejected.to, rejected.summary);
        return Err(SyncError::PushConflict {
            reference: rejected.to.clone(),
            summary: rejected.summary.clone(),
            rolled_back: false,
        });
    }

    if !report.success {
        return Err(SyncError::remote("push to Git remote", report.stderr));
    }

    info!("Push completed successfully");
    Ok(())
}

/// Undo the commit that failed to publish, leaving its content staged.
/// Returns whether the branch is back where it was before the commit.
async fn rollback(repo: &LocalRepository, previous_tip: Option<&str>) -> bool {
    let git = repo.git();
    let dir = repo.path();

    let result = match previous_tip {
        Some(tip) => git.soft_reset(dir, tip).await,
        None => {
            git.delete_ref(dir, &format!("refs/heads/{}", repo.branch()))
                .await
        }
    };

    match result {
        Ok(()) => {
            warn!("Rolled back unpublished commit on '{}'", repo.branch());
            true
        }
        Err(e) => {
            warn!("Failed to roll back unpublished commit: {}", e);
            false
        }
    }
}
