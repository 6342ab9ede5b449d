//! chaingate command line.
//!
//! ```text
//! chaingate [--config PATH] token      [--index N]   print "Bearer ..." for model N
//! chaingate [--config PATH] identity   [--index N]   print the session identity key
//! chaingate [--config PATH] model      [--index N]   print the resolved model endpoint
//! chaingate [--config PATH] check-cert [--index N]   download/validate the client certificate
//! ```
//!
//! Without `--config` the configuration is read from `CONFIG_PATH`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use chaingate::auth::CertificateManager;
use chaingate::clock::SystemClock;
use chaingate::config::{load_config, load_from_env};
use chaingate::observability::{logging, metrics};
use chaingate::TokenBroker;

#[derive(Parser)]
#[command(name = "chaingate")]
#[command(about = "Enterprise token gate for LLM access", long_about = None)]
struct Cli {
    /// Configuration file (YAML, or TOML by extension)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ModelArg {
    /// Model index in the `models` section
    #[arg(short, long, default_value = "1")]
    index: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a bearer token
    Token(ModelArg),
    /// Show the session identity key
    Identity(ModelArg),
    /// Issue a token and show the resolved model endpoint
    Model(ModelArg),
    /// Download (if missing) and validate the client certificate
    CheckCert(ModelArg),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!("chaingate v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let config = Arc::new(config);

    match cli.command {
        Commands::Token(arg) => {
            let broker = TokenBroker::from_config(config)?;
            println!("{}", broker.bearer_token(&arg.index).await?);
        }
        Commands::Identity(arg) => {
            let broker = TokenBroker::from_config(config)?;
            println!("{}", broker.identity(&arg.index)?);
        }
        Commands::Model(arg) => {
            let broker = TokenBroker::from_config(config)?;
            let handle = broker.model(&arg.index).await?;
            println!("kind:        {:?}", handle.kind);
            println!("model_name:  {}", handle.model_name.as_deref().unwrap_or("-"));
            println!("engine:      {}", handle.engine.as_deref().unwrap_or("-"));
            println!("api_base:    {}", handle.api_base.as_deref().unwrap_or("-"));
            println!("api_version: {}", handle.api_version.as_deref().unwrap_or("-"));
            if let Some(proxy) = &handle.proxy {
                println!("proxy:       {}", proxy.http_url());
            }
        }
        Commands::CheckCert(arg) => {
            let model = config.model(&arg.index)?;
            let certificates = CertificateManager::with_default_client(Arc::new(SystemClock))?;
            certificates.ensure_certificate(&config, model).await?;
            println!("certificate OK");
        }
    }

    Ok(())
}
