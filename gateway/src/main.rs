use clap::{Parser, Subcommand};
use gateway::config::{Config, ConfigError, LoggingConfig, MetricsConfig};
use metrics_exporter_statsd::StatsdBuilder;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(version, about = "Authenticating gateway in front of Mimir components")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Serve the gateway
    Run {
        #[arg(long)]
        config_file_path: PathBuf,
    },
    /// Print the routing table
    Routes {
        /// Include the routes declared in this config
        #[arg(long)]
        config_file_path: Option<PathBuf>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Proxy(#[from] proxy::ProxyError),
    #[error("invalid routing table: {0}")]
    Routing(#[from] routing::RegistryError),
    #[error("could not render routes: {0}")]
    Render(#[from] std::fmt::Error),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Run { config_file_path } => run(&config_file_path),
        CliCommand::Routes { config_file_path } => print_routes(config_file_path.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "gateway failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_file_path: &std::path::Path) -> Result<(), CliError> {
    let config = Config::from_file(config_file_path)?;

    let _sentry = init_logging(config.common.logging.as_ref());
    if let Some(metrics) = &config.common.metrics {
        init_metrics(metrics)?;
    }

    tracing::info!(config = %config_file_path.display(), "starting gateway");
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(proxy::run(config.gateway))?;
    Ok(())
}

fn print_routes(config_file_path: Option<&std::path::Path>) -> Result<(), CliError> {
    let mut registry = routing::build_registry()?;
    if let Some(path) = config_file_path {
        let config = Config::from_file(path)?;
        proxy::factory::register_config_routes(&mut registry, &config.gateway.components)?;
    }
    let mut out = String::new();
    gateway::routes::render(&registry, &mut out)?;
    print!("{out}");
    Ok(())
}

/// Installs the fmt subscriber, plus Sentry when a DSN is configured. The
/// returned guard flushes Sentry events on drop.
fn init_logging(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let level = config
        .and_then(|c| c.level.as_deref())
        .unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let guard = config
        .and_then(|c| c.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.as_str(), config.statsd_port)
        .build(Some(&config.prefix))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder)
        .map_err(|_| CliError::Metrics("a metrics recorder is already installed".to_owned()))?;
    tracing::info!(
        host = %config.statsd_host,
        port = config.statsd_port,
        "statsd metrics enabled"
    );
    Ok(())
}
