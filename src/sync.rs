//! Sync Engine - Orchestrates one workspace-to-Git transaction
//!
//! A run validates the request, reconciles the working copy with the remote,
//! imports the Windmill workspace on top and publishes the result. Runs are
//! serialized: the working directory is shared state and only one sequence
//! may touch it at a time.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::credentials;
use crate::error::SyncError;
use crate::git::GitClient;
use crate::importer::{ContentImporter, WmillCli};
use crate::publish::{self, PublishOutcome};
use crate::reconcile::Reconciler;
use crate::request::{SyncPayload, SyncRequest};

/// Terminal result of a sync request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub message: String,
}

impl SyncResult {
    pub fn succeeded(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// The orchestrator that runs one sync transaction per request
pub struct SyncEngine {
    config: Arc<Config>,
    reconciler: Reconciler,
    importer: Arc<dyn ContentImporter>,
    run_lock: Mutex<()>,
}

impl SyncEngine {
    /// Create an engine that exports with the configured `wmill` CLI
    pub fn new(config: Config) -> Self {
        let importer = Arc::new(WmillCli::new(config.windmill.cli.clone()));
        Self::with_importer(config, importer)
    }

    /// Create an engine with a custom content importer
    pub fn with_importer(config: Config, importer: Arc<dyn ContentImporter>) -> Self {
        let reconciler = Reconciler::new(GitClient::new(config.git.binary.clone()));

        Self {
            config: Arc::new(config),
            reconciler,
            importer,
            run_lock: Mutex::new(()),
        }
    }

    /// Validate a payload without touching the filesystem or network
    pub fn prepare(&self, payload: SyncPayload) -> Result<SyncRequest, SyncError> {
        SyncRequest::from_payload(payload, &self.config)
    }

    /// Validate and run a sync, always producing a result
    pub async fn run(&self, payload: SyncPayload) -> SyncResult {
        match self.prepare(payload) {
            Ok(request) => self.execute(&request).await,
            Err(e) => {
                warn!(kind = e.kind(), "Rejected sync request: {}", e);
                SyncResult::failed(e.to_string())
            }
        }
    }

    /// Run a validated sync. Failures are logged and reduced to a one-line message.
    pub async fn execute(&self, request: &SyncRequest) -> SyncResult {
        let _guard = self.run_lock.lock().await;
        let start_time = Instant::now();

        info!(
            workspace = %request.workspace_name,
            branch = %request.git_branch,
            remote = %request.display_remote_url(),
            "Starting workspace sync"
        );

        match self.try_execute(request).await {
            Ok(outcome) => {
                let message = match outcome {
                    PublishOutcome::Pushed { branch, commit } => {
                        info!(branch = %branch, commit = %commit, "Published workspace backup");
                        format!(
                            "Successfully synced workspace '{}' to Git",
                            request.workspace_name
                        )
                    }
                    PublishOutcome::NoChanges => "Sync completed - no changes to commit".to_string(),
                };

                info!(
                    "Sync completed in {:.2}s: {}",
                    start_time.elapsed().as_secs_f64(),
                    message
                );
                SyncResult::succeeded(message)
            }
            Err(e) => {
                let detail = credentials::redact(&e.to_string(), &request.secrets());
                error!(
                    kind = e.kind(),
                    workspace = %request.workspace_name,
                    branch = %request.git_branch,
                    remote = %request.display_remote_url(),
                    "Sync failed after {:.2}s: {}",
                    start_time.elapsed().as_secs_f64(),
                    detail
                );
                SyncResult::failed(single_line(&detail))
            }
        }
    }

    async fn try_execute(&self, request: &SyncRequest) -> Result<PublishOutcome, SyncError> {
        let workdir = self.config.workspace_path();

        // Reconcile strictly before import so a reset can never discard exported content
        let repo = self.reconciler.reconcile(&workdir, request).await?;
        info!(
            alignment = ?repo.alignment(),
            "Working copy ready on branch '{}'",
            repo.branch()
        );

        self.importer
            .run(
                repo.path(),
                &self.config.windmill.base_url,
                request.export_auth_token.expose(),
                &request.workspace_name,
            )
            .await?;

        publish::commit_and_publish(&repo, request).await
    }
}

/// Collapse multi-line diagnostics into a single line
fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
