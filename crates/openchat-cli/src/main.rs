use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openchat_cli::cli::{init_tracing, run_command, CliConfig, Command};
use openchat_core::worker::{resolve_identity, Identity};
use openchat_core::{
    CoreRuntime, HttpServiceCaller, IdentityProvider, KeyringIdentityProvider,
    StaticIdentityProvider,
};

#[derive(Parser)]
#[command(name = "openchat-cli")]
#[command(about = "Command-line client for OpenChat")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (icUrl, canister ids, dataDir, principal)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the principal to act as in the OS keyring
    Login { principal: String },

    /// Forget the stored principal
    Logout,

    #[command(flatten)]
    Agent(Command),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing()?;

    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    };

    let command = match cli.command {
        Commands::Login { principal } => {
            let identity = KeyringIdentityProvider::default().store(&principal)?;
            println!("Stored principal {}", identity.principal());
            return Ok(());
        }
        Commands::Logout => {
            KeyringIdentityProvider::default().clear()?;
            println!("Logged out");
            return Ok(());
        }
        Commands::Agent(command) => command,
    };

    // The configured principal wins over the keyring
    let identity = match &config.principal {
        Some(principal) => Some(Identity::new(principal.clone())),
        None => resolve_identity(&KeyringIdentityProvider::default())
            .await
            .context("Failed to read the stored principal")?,
    };

    // An anonymous init is never answered, so fail here instead of timing out
    let Some(identity) = identity.filter(|id| !id.is_anonymous()) else {
        anyhow::bail!("No principal configured; run `openchat-cli login <principal>` first");
    };

    let core_config = config.core_config();
    let caller =
        HttpServiceCaller::new(core_config.agent.ic_url.clone()).with_principal(identity.principal());
    let identity_provider: Arc<dyn IdentityProvider> =
        Arc::new(StaticIdentityProvider::new(Some(identity)));

    let mut runtime = CoreRuntime::start(core_config, identity_provider, Arc::new(caller))?;
    let client = runtime.client();

    let result = async {
        client
            .wait_ready()
            .await
            .context("Worker did not initialize")?;
        run_command(command, &client, cli.pretty).await
    }
    .await;

    runtime.shutdown();
    result
}
