//! System health checks for windmill-git-sync
//!
//! This module provides preflight checks to verify the system is properly
//! configured before the listener starts accepting triggers.

use crate::Config;
use std::path::Path;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Windmill CLI installation status
    pub wmill: CheckResult,
    /// Working directory status (warning only, created on first sync)
    pub workspace_dir: CheckResult,
    /// Windmill base URL status
    pub base_url: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks
    pub fn run(config: &Config) -> Self {
        Self {
            git: Self::check_program(&config.git.binary, "Git", "https://git-scm.com/downloads"),
            wmill: Self::check_program(
                &config.windmill.cli,
                "Windmill CLI",
                "npm install -g windmill-cli",
            ),
            workspace_dir: Self::check_workspace_dir(&config.workspace_path()),
            base_url: Self::check_base_url(&config.windmill.base_url),
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.all_checks().iter().all(|(_, result)| result.passed)
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        [&self.git, &self.wmill, &self.workspace_dir, &self.base_url]
            .into_iter()
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        [&self.git, &self.wmill, &self.workspace_dir, &self.base_url]
            .into_iter()
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Check that an executable runs and reports a version
    fn check_program(program: &str, name: &str, install_hint: &str) -> CheckResult {
        match std::process::Command::new(program).arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                CheckResult::ok_with_details(format!("{} installed", name), version.trim().to_string())
            }
            Ok(_) => CheckResult::error(format!("{} command failed", name)),
            Err(_) => CheckResult::error_with_details(
                format!("{} not found in PATH ({})", name, program),
                format!("Install: {}", install_hint),
            ),
        }
    }

    /// Check the working directory
    fn check_workspace_dir(path: &Path) -> CheckResult {
        if path.is_dir() {
            CheckResult::ok_with_details("Working directory exists", path.display().to_string())
        } else if path.exists() {
            CheckResult::error_with_details(
                "Working directory path is not a directory",
                path.display().to_string(),
            )
        } else {
            CheckResult::warning_with_details(
                "Working directory does not exist yet",
                format!("It will be created on first sync: {}", path.display()),
            )
        }
    }

    /// Check the Windmill base URL looks usable
    fn check_base_url(base_url: &str) -> CheckResult {
        let trimmed = base_url.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            CheckResult::ok_with_details("Windmill base URL configured", trimmed.to_string())
        } else if trimmed.is_empty() {
            CheckResult::error_with_details(
                "Windmill base URL is empty",
                "Set windmill.base_url or WINDMILL_BASE_URL",
            )
        } else {
            CheckResult::error_with_details(
                "Windmill base URL must use http or https",
                trimmed.to_string(),
            )
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 4] {
        [
            ("Git Installation", &self.git),
            ("Windmill CLI", &self.wmill),
            ("Working Directory", &self.workspace_dir),
            ("Windmill Base URL", &self.base_url),
        ]
    }
}
