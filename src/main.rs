use clap::{Parser, Subcommand};
use rigol_dp_agent::config::{Config, ConfigLoader, LogFormat, LoggingConfig};
use rigol_dp_agent::{PsuService, Session};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Network driver and MCP server for Rigol DP800/DP700 power supplies.",
    long_about = "Talks SCPI over the instrument's TCP socket (port 5555). With no subcommand, serves MCP tools on stdio so an LLM agent can discover, configure and measure the power supply."
)]
struct Args {
    /// Configuration file (overrides RIGOL_DP_CONFIG and the default locations).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve MCP tools over stdio (default).
    Serve,

    /// Sweep a /24 subnet for instruments.
    Discover {
        /// First three octets, e.g. 192.168.68. Defaults to the configured or local subnet.
        #[arg(short, long)]
        network: Option<String>,

        /// SCPI socket port.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check whether an instrument answers at one address.
    Probe {
        /// IP address, host name or TCPIP0::<host>::<port>::SOCKET descriptor.
        ip: String,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Connect and print identity, output states, settings and measurements.
    Status {
        /// Instrument address. Defaults to RIGOL_DP832_IP, then discovery.
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Install the tracing subscriber. Logs go to stderr; stdout carries MCP frames.
fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Compact => builder.compact().init(),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, Box<dyn std::error::Error>> {
    let loader = match path {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    Ok(loader.into_config())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    init_tracing(&config.logging);

    let server_config = config.server.clone();
    let service = PsuService::from_session(Session::new(config));

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(service, &server_config).await?,

        Commands::Discover { network, port } => {
            let devices = service
                .blocking(move |s| s.discover_devices(network.as_deref(), port))
                .await?;
            info!("{} instrument(s) found", devices.len());
            print_json(&devices)?;
        }

        Commands::Probe { ip, port } => {
            let info = service
                .blocking(move |s| s.test_connection(Some(ip.as_str()), port))
                .await?;
            print_json(&info)?;
        }

        Commands::Status { host, port } => {
            let report = service
                .blocking(move |s| {
                    let connection = s.connect(host.as_deref(), port)?;
                    Ok(json!({
                        "connection": connection,
                        "outputs": s.get_all_output_states()?,
                        "settings": s.get_all_settings()?,
                        "measurements": s.get_all_measurements()?,
                    }))
                })
                .await?;
            service.disconnect();
            print_json(&report)?;
        }
    }

    Ok(())
}

#[cfg(feature = "mcp")]
async fn serve(
    service: PsuService,
    config: &rigol_dp_agent::config::ServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    rigol_dp_agent::mcp::run_server(service, config)
        .await
        .map_err(|e| format!("MCP server error: {e}"))?;
    Ok(())
}

#[cfg(not(feature = "mcp"))]
async fn serve(
    _service: PsuService,
    _config: &rigol_dp_agent::config::ServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    Err("this build has no MCP support; rebuild with --features mcp".into())
}
