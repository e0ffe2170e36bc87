//! windmill-git-sync - Mirror a Windmill workspace into a Git repository
//!
//! Every webhook trigger pulls the current state of a Windmill workspace and
//! records it as a commit on a Git remote, producing an auditable history of
//! the workspace.
//!
//! ## Modules
//!
//! - [`sync`]: The orchestrator that runs one transaction per request
//! - [`reconcile`]: Clone, reset or reuse the local working copy
//! - [`publish`]: Commit and fast-forward push with per-ref result checks
//! - [`importer`]: The `wmill` export boundary
//! - [`server`]: HTTP trigger listener
//! - [`config`]: Configuration management and parsing

pub mod config;
pub mod credentials;
pub mod error;
pub mod git;
pub mod health;
pub mod importer;
pub mod publish;
pub mod reconcile;
pub mod request;
pub mod server;
pub mod sync;
pub mod workdir;

pub use config::Config;
pub use error::SyncError;
pub use health::HealthCheck;
pub use importer::{ContentImporter, WmillCli};
pub use request::{SyncPayload, SyncRequest};
pub use sync::{SyncEngine, SyncResult};
pub use workdir::WorkingDirectoryState;
