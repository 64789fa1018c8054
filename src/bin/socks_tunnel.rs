//! socks-tunnel: open a bearer-token SOCKS5 tunnel from the command line
//!
//! Usage: socks-tunnel [OPTIONS] <FILE> <HOST:PORT>
//!
//! Options:
//!   -c, --config <FILE> <HOST:PORT>  Relay stdin/stdout through a tunnel
//!   -t, --test <FILE> <HOST:PORT>    Run the handshake and report the outcome
//!   -h, --help                       Print help information

use std::env;

use tokio::io::{AsyncWriteExt, BufReader};

use tokensocks::{ClientConfig, Connector, TargetAddress};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays a clean data channel
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "-h" | "--help" => {
            print_usage();
        }
        "-t" | "--test" => {
            if args.len() < 4 {
                eprintln!("Error: --test requires a config file path and a target");
                return Ok(());
            }
            test_tunnel(&args[2], &args[3]).await?;
        }
        "-c" | "--config" => {
            if args.len() < 4 {
                eprintln!("Error: --config requires a config file path and a target");
                return Ok(());
            }
            run_relay(&args[2], &args[3]).await?;
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"socks-tunnel - SOCKS5 tunnel with bearer-token authentication

USAGE:
    socks-tunnel [OPTIONS] <FILE> <HOST:PORT>

OPTIONS:
    -c, --config <FILE> <HOST:PORT>  Relay stdin/stdout through a tunnel
    -t, --test <FILE> <HOST:PORT>    Run the handshake and report the outcome
    -h, --help                       Print help information

CONFIGURATION FILE FORMAT (JSON):
    {{
        "token": "<jwt>",
        "location_id": "loc1",
        "proxy": {{ "host": "proxy.example.com", "port": 20004 }},
        "use_ssh_tunnel": false,
        "connect_timeout_ms": 10000
    }}

    Without "proxy" (and with "use_ssh_tunnel" false) the proxy address is
    read from the VCAP_SERVICES environment variable.

EXAMPLES:
    Check that the proxy grants a tunnel:
        socks-tunnel --test client.json db.internal:5432

    Talk to a remote service over the tunnel:
        socks-tunnel --config client.json 10.0.0.5:6379
"#
    );
}

async fn test_tunnel(config_path: &str, target: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let target: TargetAddress = target.parse()?;
    let connector = Connector::new(&config)?;

    tracing::info!("Proxy: {}", connector.proxy()?);
    tracing::info!("Target: {}", target);

    match connector.connect(target).await {
        Ok(mut tunnel) => {
            tracing::info!("Tunnel established successfully!");
            tunnel.shutdown().await?;
        }
        Err(e) => {
            tracing::error!("Tunnel failed: {}", e);
            if let Some(status) = e.server_status() {
                tracing::error!("Proxy status code: 0x{:02x}", status.code());
            }
            return Err(e.into());
        }
    }

    Ok(())
}

async fn run_relay(config_path: &str, target: &str) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let target: TargetAddress = target.parse()?;
    let connector = Connector::new(&config)?;

    let tunnel = connector.connect(target).await?;
    let (mut remote_reader, mut remote_writer) = tokio::io::split(tunnel);

    let upstream = async {
        let mut stdin = BufReader::new(tokio::io::stdin());
        tokio::io::copy(&mut stdin, &mut remote_writer).await?;
        remote_writer.shutdown().await
    };
    let downstream = async {
        let mut stdout = tokio::io::stdout();
        tokio::io::copy(&mut remote_reader, &mut stdout).await?;
        stdout.flush().await
    };

    let (sent, received) = tokio::join!(upstream, downstream);
    sent?;
    received?;

    tracing::info!("Tunnel closed");
    Ok(())
}

fn load_config(path: &str) -> anyhow::Result<ClientConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: ClientConfig = serde_json::from_str(&content)?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;
    Ok(config)
}
