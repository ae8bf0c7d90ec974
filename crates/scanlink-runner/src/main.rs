//! `scanlink`: drive a serial barcode scan engine from the console.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use scanlink_engine::sim::spawn_simulated;
use scanlink_engine::{CancellationToken, Engine, Mode, StreamTransport};
use scanlink_runner::error::{RunnerError, RunnerResult};
use scanlink_runner::sim_server::SimServer;
use scanlink_runner::{logging, menu, ScanlinkConfig};
use tracing::{error, info};

/// Barcode scan engine console
#[derive(Parser, Debug)]
#[command(name = "scanlink", version, about, long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to a scanner exposed over TCP
    Connect {
        /// Address of the scanner, e.g. 127.0.0.1:5000
        #[arg(short, long)]
        addr: String,

        /// Mode to switch to before showing the menu (trigger or continuous)
        #[arg(short, long)]
        mode: Option<Mode>,
    },
    /// Run the menu against an in-process simulated scanner
    Demo {
        /// Mode to switch to before showing the menu (trigger or continuous)
        #[arg(short, long)]
        mode: Option<Mode>,
    },
    /// Serve simulated scanners over TCP
    Simulate {
        /// Port to listen on
        #[arg(short, long, default_value_t = 5000)]
        port: u16,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    scanlink_engine::metrics::describe_metrics();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> RunnerResult<()> {
    let config = ScanlinkConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Connect { addr, mode } => {
            let transport = StreamTransport::connect_tcp(addr.as_str())
                .await
                .map_err(|source| RunnerError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
            info!("connected to {}", addr);
            drive(Engine::new(transport, config.engine), mode).await
        }
        Commands::Demo { mode } => {
            let (transport, _simulator) = spawn_simulated(config.simulator);
            drive(Engine::new(transport, config.engine), mode).await
        }
        Commands::Simulate { port } => {
            let server = SimServer::bind(("0.0.0.0", port), config.simulator).await?;
            let shutdown = CancellationToken::new();
            let stop = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    stop.cancel();
                }
            });
            server.serve(shutdown).await?;
            Ok(())
        }
    }
}

async fn drive(engine: Engine, mode: Option<Mode>) -> RunnerResult<()> {
    let engine = Arc::new(engine);
    if let Some(mode) = mode {
        if let Err(e) = engine.set_mode(mode, &CancellationToken::new()).await {
            engine.shutdown().await;
            return Err(e.into());
        }
        info!("switched to {} mode", mode);
    }
    let result = menu::run(engine.clone()).await;
    engine.shutdown().await;
    result
}
