use clap::Parser;
use peer_match::config::{NodeConfig, RuntimeConfig};
use peer_match::server::Server;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path of the TOML runtime config
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Name of this peer, overrides the config file
    #[arg(short, long)]
    name: Option<String>,

    /// Port of the peer endpoint
    #[arg(long)]
    peer_port: Option<u16>,

    /// Port of the client http endpoint, defaults to peer port * 10
    #[arg(long)]
    http_port: Option<u16>,

    /// Port of the metrics endpoint, defaults to peer port + 10
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Seed peer as name=host:port, may be repeated
    #[arg(long = "seed", value_parser = parse_seed)]
    seeds: Vec<NodeConfig>,
}

fn parse_seed(value: &str) -> Result<NodeConfig, String> {
    match value.split_once('=') {
        Some((name, addr)) if !name.is_empty() && !addr.is_empty() => Ok(NodeConfig {
            name: name.to_string(),
            addr: addr.to_string(),
        }),
        _ => Err(format!("expected name=host:port, got {}", value)),
    }
}

fn apply_args(mut config: RuntimeConfig, args: Args) -> anyhow::Result<RuntimeConfig> {
    if let Some(name) = args.name {
        config.name = name;
    }
    if let Some(port) = args.peer_port {
        config.peer_addr = format!("127.0.0.1:{}", port);
        let http_port = match args.http_port {
            Some(http_port) => http_port,
            None => port
                .checked_mul(10)
                .ok_or_else(|| anyhow::anyhow!("peer port {} too large to derive http port", port))?,
        };
        config.http_addr = format!("127.0.0.1:{}", http_port);
        let metrics_port = match args.metrics_port {
            Some(metrics_port) => metrics_port,
            None => port
                .checked_add(10)
                .ok_or_else(|| anyhow::anyhow!("peer port {} too large to derive metrics port", port))?,
        };
        config.metrics_addr = format!("127.0.0.1:{}", metrics_port);
    } else {
        if let Some(http_port) = args.http_port {
            config.http_addr = format!("127.0.0.1:{}", http_port);
        }
        if let Some(metrics_port) = args.metrics_port {
            config.metrics_addr = format!("127.0.0.1:{}", metrics_port);
        }
    }
    config.node_list.extend(args.seeds);
    Ok(config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::try_init().unwrap_or_default();
    let args = Args::parse();
    let config = apply_args(RuntimeConfig::from_toml(&args.config), args)?;

    let mut server = Server::builder(config);
    server.start().await?;
    shutdown_signal().await;
    server.stop();
    Ok(())
}
