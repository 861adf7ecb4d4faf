use clap::{Parser, Subcommand};
use lib::channels::OutboundReply;

#[derive(Parser)]
#[command(name = "wabridge")]
#[command(about = "WhatsApp to Gemini webhook relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook server (POST /inbound, POST /status, GET /).
    Serve {
        /// Config file path (default: WABRIDGE_CONFIG_PATH or ~/.wabridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Listen port (default from PORT, config, or 8000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one WhatsApp message through the configured transport (delivery check).
    Send {
        /// Config file path (default: WABRIDGE_CONFIG_PATH or ~/.wabridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Recipient number, international format without '+'
        #[arg(long)]
        to: String,

        /// Message text
        text: String,
    },
}

#[tokio::main]
async fn main() {
    // A missing .env is normal outside development.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("wabridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Send { config, to, text }) => {
            if let Err(e) = run_send(config, to, text).await {
                log::error!("send failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config: {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    lib::gateway::run_gateway(config).await
}

async fn run_send(
    config_path: Option<std::path::PathBuf>,
    to: String,
    text: String,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let transport = lib::channels::transport_from_config(&config.messaging)?;
    let reply = OutboundReply {
        recipient: to,
        text,
    };
    let receipt = transport.send(&reply).await?;
    println!(
        "sent via {} (message_uuid: {})",
        transport.name(),
        receipt.message_uuid.as_deref().unwrap_or("-")
    );
    Ok(())
}
