use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use windmill_git_sync::health::CheckResult;
use windmill_git_sync::{server, Config, HealthCheck, SyncEngine, SyncPayload};

#[derive(Parser)]
#[command(name = "windmill-git-sync")]
#[command(about = "Mirror a Windmill workspace into a Git repository")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook listener (default)
    Serve {
        /// Address to listen on, overrides configuration
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Run a single sync and print the result
    Sync {
        /// Windmill workspace to export
        #[arg(long)]
        workspace: Option<String>,

        /// Git remote to push to
        #[arg(long, env = "GIT_REMOTE_URL")]
        git_remote_url: Option<String>,

        /// Branch to push to
        #[arg(long)]
        git_branch: Option<String>,

        /// Commit author name
        #[arg(long)]
        git_user_name: Option<String>,

        /// Commit author email
        #[arg(long)]
        git_user_email: Option<String>,

        /// Windmill API token
        #[arg(long, env = "WINDMILL_TOKEN", hide_env_values = true)]
        windmill_token: Option<String>,

        /// Git authentication token
        #[arg(long, env = "GIT_TOKEN", hide_env_values = true)]
        git_token: Option<String>,
    },

    /// Write a default configuration file
    Init {
        /// Working directory for the mirrored repository
        #[arg(short, long, default_value = "/workspace")]
        workspace_dir: String,
    },

    /// System health check and diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let creating = matches!(cli.command, Some(Commands::Init { .. }));
    let config = load_config(cli.config.as_deref(), creating)?;

    init_logging(cli.verbose, &config)?;
    info!("Starting windmill-git-sync v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => cmd_serve(None, config).await,
        Some(Commands::Serve { listen }) => cmd_serve(listen, config).await,
        Some(Commands::Sync {
            workspace,
            git_remote_url,
            git_branch,
            git_user_name,
            git_user_email,
            windmill_token,
            git_token,
        }) => {
            let payload = SyncPayload {
                windmill_token: windmill_token.map(Into::into),
                git_remote_url,
                git_token: git_token.map(Into::into),
                workspace,
                git_branch,
                git_user_name,
                git_user_email,
            };
            cmd_sync(payload, config).await
        }
        Some(Commands::Init { workspace_dir }) => cmd_init(workspace_dir, cli.config, &config),
        Some(Commands::Doctor) => cmd_doctor(&config),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool, config: &Config) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };

    let registry = tracing_subscriber::registry().with(filter);

    match config.logging.format.as_str() {
        "pretty" => registry.with(fmt::layer().pretty().with_writer(std::io::stderr)).init(),
        "full" => registry.with(fmt::layer().with_writer(std::io::stderr)).init(),
        _ => registry.with(fmt::layer().compact().with_writer(std::io::stderr)).init(),
    }

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>, allow_missing: bool) -> Result<Config> {
    match config_path {
        Some(path) if allow_missing && !path.exists() => {
            let mut config = Config::default();
            config.apply_env_overrides();
            config.expand_paths()?;
            Ok(config)
        }
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Run the webhook listener
async fn cmd_serve(listen: Option<String>, config: Config) -> Result<()> {
    let health = HealthCheck::run(&config);
    for warning in health.warnings() {
        tracing::warn!("{}", warning.message);
    }
    for failure in health.errors() {
        tracing::warn!("Preflight check failed: {}", failure.message);
    }

    let listen = listen.unwrap_or_else(|| config.server.listen.clone());
    let engine = Arc::new(SyncEngine::new(config));

    server::serve(engine, &listen).await
}

/// Run one sync from the command line
async fn cmd_sync(payload: SyncPayload, config: Config) -> Result<()> {
    let engine = SyncEngine::new(config);
    let result = engine.run(payload).await;

    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}

/// Write a default configuration file
fn cmd_init(
    workspace_dir: String,
    config_path: Option<std::path::PathBuf>,
    config: &Config,
) -> Result<()> {
    let mut new_config = config.clone();
    new_config.workspace_dir = workspace_dir;

    let config_path = match config_path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };
    new_config.save(&config_path)?;

    info!("Configuration saved to: {:?}", config_path);

    println!("✅ windmill-git-sync initialized successfully!");
    println!("   Config: {:?}", config_path);
    println!("   Working directory: {}", new_config.workspace_dir);

    Ok(())
}

/// System health check and diagnostics
fn cmd_doctor(config: &Config) -> Result<()> {
    let health = HealthCheck::run(config);
    print_health_report(&health);

    if !health.all_passed() {
        std::process::exit(1);
    }

    Ok(())
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning { "⚠️ " } else { "✅" }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 windmill-git-sync System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}
