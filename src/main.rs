use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tenant_limits::admin::{limit_class, report_limit_class};
use tenant_limits::clock::SystemClock;
use tenant_limits::config::ServiceConfig;
use tenant_limits::limits::LimitSet;
use tenant_limits::middleware::TenantLimits;
use tenant_limits::resolver::RequestContext;
use tenant_limits::store::MemoryStore;

/// Tenant rate limit class administration and usage reporting.
#[derive(Debug, Parser)]
#[command(name = "tenant-limits", version, about)]
struct Cli {
    /// Configuration file (YAML)
    #[arg(short = 'C', long, global = true)]
    config: Option<String>,

    /// Run the tool in debug mode
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Query or change the rate limit class of a tenant
    Class {
        /// ID of the tenant
        tenant_id: String,

        /// If specified, sets the class associated with the tenant
        #[arg(short = 'c', long = "class")]
        klass: Option<String>,
    },
    /// Print the current limit usage report of a tenant as JSON
    Usage {
        /// ID of the tenant
        tenant_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ServiceConfig::load(cli.config.as_deref())?;
    info!(dialect = ?config.store.dialect, "Configuration loaded");

    let store = Arc::new(match &config.store.state_path {
        Some(path) => MemoryStore::load(path)?,
        None => MemoryStore::new(),
    });

    match cli.command {
        Command::Class { tenant_id, klass } => {
            let previous = limit_class(store.as_ref(), &tenant_id, klass.as_deref()).await?;
            print!("{}", report_limit_class(&tenant_id, &previous, klass.as_deref()));
        }
        Command::Usage { tenant_id } => {
            let limits = match &config.limits.path {
                Some(path) => LimitSet::from_file(path)?,
                None => LimitSet::default(),
            };
            info!(count = limits.len(), "Limit definitions ready");

            let hooks = TenantLimits::with_dialect(
                store.clone(),
                config.store.dialect,
                &config.store.bucket_pattern,
                Arc::new(limits),
                Arc::new(SystemClock),
            );

            let mut request = RequestContext::for_caller(tenant_id);
            hooks.process(&mut request).await?;

            let report = request.limits.unwrap_or_default();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if let Some(path) = &config.store.state_path {
        store.save(path)?;
    }

    Ok(())
}
