//! RDS Tuner Server
//!
//! Serves an FM radio tuner over TCP. Every client receives the raw RDS
//! stream as one hex line per group and can tune the radio with text
//! commands. Run with `--simulate` to serve a virtual tuner instead of
//! `/dev/radio0`.

mod settings;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use rds_session::Server;
use rds_sim::{SimulatedSource, VirtualTuner};
use rds_tuner::TunerSource;
use settings::ServerSettings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// rds-server - stream RDS data and control an FM tuner over TCP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Radio device node
    #[arg(short, long)]
    device: Option<PathBuf>,

    /// Settings file (JSON)
    #[arg(short = 'f', long)]
    config: Option<PathBuf>,

    /// Upper bound on one session wait, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Serve a simulated tuner instead of hardware
    #[arg(long)]
    simulate: bool,

    /// Print the effective settings as JSON and exit
    #[arg(long)]
    print_config: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Load the settings file, then apply command line overrides
    fn settings(&self) -> anyhow::Result<ServerSettings> {
        let mut settings = match &self.config {
            Some(path) => ServerSettings::load(path)?,
            None => ServerSettings::default(),
        };

        if let Some(listen) = self.listen {
            settings.listen_addr = listen;
        }
        if let Some(device) = &self.device {
            settings.device = device.clone();
        }
        if let Some(ms) = self.poll_interval_ms {
            settings.poll_interval_ms = ms;
        }
        settings.simulate |= self.simulate;

        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "rds_server=debug,rds_session=debug,rds_tuner=debug,rds_sim=debug,rds_protocol=debug"
    } else {
        "rds_server=info,rds_session=info,rds_tuner=info,rds_sim=info,rds_protocol=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = args.settings()?;
    if args.print_config {
        println!("{}", settings.to_json()?);
        return Ok(());
    }

    info!("Starting RDS tuner server v{}", env!("CARGO_PKG_VERSION"));

    if settings.simulate {
        let tuner = VirtualTuner::from_config(settings.simulation.tuner.clone());
        let source = SimulatedSource::new(tuner)
            .with_group_interval(settings.group_interval())
            .with_corruption(settings.simulation.corrupt_every);
        return serve(&settings, source).await;
    }

    serve_device(&settings).await
}

#[cfg(target_os = "linux")]
async fn serve_device(settings: &ServerSettings) -> anyhow::Result<()> {
    serve(settings, rds_tuner::V4l2Source::new(settings.device.clone())).await
}

#[cfg(not(target_os = "linux"))]
async fn serve_device(settings: &ServerSettings) -> anyhow::Result<()> {
    anyhow::bail!(
        "radio device {} is only supported on Linux; use --simulate",
        settings.device.display()
    )
}

/// Serve clients until interrupted
async fn serve<S: TunerSource>(settings: &ServerSettings, source: S) -> anyhow::Result<()> {
    let server = Server::new(settings.server_config(), source);
    let listener = server.bind().map_err(|e| {
        anyhow::anyhow!("Failed to bind {}: {}", settings.listen_addr, e)
    })?;

    server.serve(listener, shutdown_signal()).await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
