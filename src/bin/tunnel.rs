//! Connect Tunnel CLI binary.
//!
//! # Commands
//!
//! - `format` - Print the CONNECT request for a target
//! - `connect` - Negotiate a tunnel and report the outcome
//! - `pipe` - Negotiate a tunnel and relay stdin/stdout through it

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tunnel::{
    client::{self, begin_negotiate, Completion},
    format_request,
    transport::{connect_blocking, TcpTransport},
    Config, NegotiationOutcome, VERSION,
};

#[derive(Parser)]
#[command(name = "tunnel")]
#[command(version = VERSION)]
#[command(about = "HTTP CONNECT tunnel negotiation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CONNECT request for a target
    Format {
        /// Target as host:port
        #[arg(short, long)]
        target: String,

        /// Credential for the Authentication header
        #[arg(long)]
        token: Option<String>,
    },

    /// Negotiate a tunnel and report the outcome
    Connect {
        #[command(flatten)]
        opts: TunnelOpts,

        /// Use the blocking driver
        #[arg(long)]
        sync: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Negotiate a tunnel, then relay stdin/stdout through it
    Pipe {
        #[command(flatten)]
        opts: TunnelOpts,
    },
}

#[derive(Args)]
struct TunnelOpts {
    /// Proxy as host:port (overrides config)
    #[arg(short, long)]
    proxy: Option<String>,

    /// Target as host:port (overrides config)
    #[arg(short, long)]
    target: Option<String>,

    /// Credential for the Authentication header (overrides config and TUNNEL_AUTH_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Config file (default: <config dir>/tunnel/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Connect timeout in seconds
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Format { target, token } => cmd_format(&target, token.as_deref()),
        Commands::Connect { opts, sync, json } => cmd_connect(opts, sync, json),
        Commands::Pipe { opts } => cmd_pipe(opts),
    }
}

fn cmd_format(target: &str, token: Option<&str>) -> anyhow::Result<()> {
    let (host, port) = split_host_port(target)?;
    let bytes = format_request(host, port, token)?;
    print!("{}", String::from_utf8_lossy(&bytes).replace("\r\n", "\\r\\n\n"));
    Ok(())
}

fn cmd_connect(opts: TunnelOpts, sync: bool, json: bool) -> anyhow::Result<()> {
    init_logging(opts.verbose);
    let config = build_config(&opts)?;
    let request = config.request()?;
    let tcp = config.tcp_transport();

    let started = Instant::now();
    let outcome = if sync {
        let mut stream = connect_blocking(&tcp)
            .with_context(|| format!("Failed to connect to proxy {}", tcp.proxy_addr))?;
        match client::negotiate(&mut stream, &request) {
            Ok(()) => NegotiationOutcome::Success,
            Err(tunnel::TunnelError::Protocol(e)) => NegotiationOutcome::ProtocolError(e),
            Err(tunnel::TunnelError::Transport(e)) => NegotiationOutcome::TransportError(e),
            Err(e) => return Err(e.into()),
        }
    } else {
        let runtime = tokio::runtime::Runtime::new()?;
        runtime.block_on(async {
            let (tx, rx) = tokio::sync::oneshot::channel();
            begin_negotiate(
                TcpTransport::new(tcp.clone()),
                request.clone(),
                tx,
                |completion: Completion<TcpTransport>, tx| {
                    let _ = tx.send(completion.outcome);
                },
            );
            rx.await.context("negotiation task ended without reporting")
        })?
    };
    let elapsed_ms = started.elapsed().as_millis();

    if json {
        let report = json!({
            "proxy": tcp.proxy_addr,
            "target": request.authority(),
            "driver": if sync { "blocking" } else { "async" },
            "outcome": outcome.kind(),
            "status": match &outcome {
                NegotiationOutcome::ProtocolError(e) => e.status_code(),
                _ => None,
            },
            "detail": outcome.to_string(),
            "elapsed_ms": elapsed_ms,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} via {}: {} ({} ms)",
            request.authority(),
            tcp.proxy_addr,
            outcome,
            elapsed_ms
        );
    }

    if outcome.is_success() {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn cmd_pipe(opts: TunnelOpts) -> anyhow::Result<()> {
    init_logging(opts.verbose);
    let config = build_config(&opts)?;
    let request = config.request()?;
    let tcp = config.tcp_transport();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let mut transport = TcpTransport::new(tcp);
        client::negotiate_async(&mut transport, &request)
            .await
            .into_result()?;

        let stream = transport
            .into_stream()
            .context("transport reported success without a stream")?;
        let (mut reader, mut writer) = stream.into_split();

        let upload = async {
            let sent = tokio::io::copy(&mut tokio::io::stdin(), &mut writer).await?;
            writer.shutdown().await?;
            Ok::<_, std::io::Error>(sent)
        };
        let download = async {
            let mut stdout = tokio::io::stdout();
            let received = tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
            Ok::<_, std::io::Error>(received)
        };

        let (sent, received) = tokio::try_join!(upload, download)?;
        tracing::info!("tunnel closed: {} bytes sent, {} bytes received", sent, received);
        Ok::<(), anyhow::Error>(())
    })
}

fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();
}

fn build_config(opts: &TunnelOpts) -> anyhow::Result<Config> {
    let file_config = match &opts.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_default()?,
    };
    let mut config = file_config.merge(Config::from_env());

    if let Some(proxy) = &opts.proxy {
        let (host, port) = split_host_port(proxy)?;
        config.proxy.host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        config.proxy.port = u16::try_from(port).context("proxy port out of range")?;
    }
    if let Some(target) = &opts.target {
        let (host, port) = split_host_port(target)?;
        config.target.host = Some(host.to_string());
        config.target.port = port;
    }
    if let Some(token) = &opts.token {
        config.proxy.auth_token = Some(token.clone());
    }
    if let Some(secs) = opts.connect_timeout {
        config.transport.connect_timeout_secs = secs;
    }

    Ok(config)
}

fn split_host_port(value: &str) -> anyhow::Result<(&str, u32)> {
    let (host, port) = value
        .rsplit_once(':')
        .with_context(|| format!("expected host:port, got {value:?}"))?;
    let port = port
        .parse()
        .with_context(|| format!("invalid port in {value:?}"))?;
    Ok((host, port))
}
