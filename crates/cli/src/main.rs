use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "botline", about = "Botline — chat-bot query gateway")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file path (skips the standard discovery order).
    #[arg(long, global = true, env = "BOTLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server (default when no subcommand is provided).
    Gateway,
    /// Run one catalog command and print the aggregated result as JSON.
    Query {
        /// Command name from the catalog.
        name: String,
        /// Subject id / query argument.
        #[arg(long)]
        subject: Option<String>,
    },
    /// Print the config file path in effect.
    ConfigPath,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<botline_config::BotlineConfig> {
    match &cli.config {
        Some(path) => botline_config::load_config(path),
        None => Ok(botline_config::discover_and_load()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "botline starting");

    match &cli.command {
        // Default: start the gateway when no subcommand is provided.
        None | Some(Commands::Gateway) => {
            let mut config = load_config(&cli)?;
            if let Some(bind) = &cli.bind {
                config.server.bind = bind.clone();
            }
            if let Some(port) = cli.port {
                config.server.port = port;
            }
            botline_gateway::start_gateway(config).await
        },
        Some(Commands::Query { name, subject }) => {
            let config = load_config(&cli)?;
            let runtime = botline_gateway::build_runtime(&config).await?;
            let result = runtime.state.run_command(name, subject.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            runtime.cancel.cancel();
            Ok(())
        },
        Some(Commands::ConfigPath) => {
            println!("{}", botline_config::find_or_default_config_path().display());
            Ok(())
        },
    }
}
