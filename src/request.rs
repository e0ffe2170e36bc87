//! Sync request model
//!
//! [`SyncPayload`] is what arrives over the wire; [`SyncRequest`] is the
//! validated form the core works with. Validation is pure so a bad payload
//! is rejected before any filesystem or network action.

use serde::Deserialize;

use crate::config::Config;
use crate::credentials::{self, Secret};
use crate::error::SyncError;

/// Raw trigger payload. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncPayload {
    #[serde(default, alias = "export_auth_token")]
    pub windmill_token: Option<Secret>,

    #[serde(default)]
    pub git_remote_url: Option<String>,

    #[serde(default, alias = "git_auth_token")]
    pub git_token: Option<Secret>,

    #[serde(default, alias = "workspace_name")]
    pub workspace: Option<String>,

    #[serde(default)]
    pub git_branch: Option<String>,

    #[serde(default, alias = "commit_author_name")]
    pub git_user_name: Option<String>,

    #[serde(default, alias = "commit_author_email")]
    pub git_user_email: Option<String>,
}

/// A validated request for one sync run
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub workspace_name: String,
    pub git_remote_url: String,
    pub git_auth_token: Secret,
    pub git_branch: String,
    pub export_auth_token: Secret,
    pub commit_author_name: String,
    pub commit_author_email: String,
}

impl SyncRequest {
    /// Validate a payload, filling optional fields from configuration defaults
    pub fn from_payload(payload: SyncPayload, config: &Config) -> Result<Self, SyncError> {
        let export_auth_token = present_secret(payload.windmill_token);
        let git_remote_url = present(payload.git_remote_url);
        let git_auth_token = present_secret(payload.git_token);

        let mut missing = Vec::new();
        if export_auth_token.is_none() {
            missing.push("windmill_token");
        }
        if git_remote_url.is_none() {
            missing.push("git_remote_url");
        }
        if git_auth_token.is_none() {
            missing.push("git_token");
        }

        match (export_auth_token, git_remote_url, git_auth_token) {
            (Some(export_auth_token), Some(git_remote_url), Some(git_auth_token)) => Ok(Self {
                workspace_name: present(payload.workspace)
                    .unwrap_or_else(|| config.windmill.default_workspace.clone()),
                git_remote_url,
                git_auth_token,
                git_branch: present(payload.git_branch)
                    .unwrap_or_else(|| config.git.default_branch.clone()),
                export_auth_token,
                commit_author_name: present(payload.git_user_name)
                    .unwrap_or_else(|| config.git.user_name.clone()),
                commit_author_email: present(payload.git_user_email)
                    .unwrap_or_else(|| config.git.user_email.clone()),
            }),
            _ => Err(SyncError::Validation { missing }),
        }
    }

    /// Remote URL carrying the git token, for git invocations only
    pub fn authenticated_remote_url(&self) -> String {
        credentials::authenticated_url(&self.git_remote_url, self.git_auth_token.expose())
    }

    /// Remote URL safe for logs
    pub fn display_remote_url(&self) -> String {
        credentials::strip_credentials(&self.git_remote_url)
    }

    /// Every secret this request carries, for redaction
    pub fn secrets(&self) -> [&Secret; 2] {
        [&self.git_auth_token, &self.export_auth_token]
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn present_secret(value: Option<Secret>) -> Option<Secret> {
    value.filter(|secret| !secret.is_blank())
}
