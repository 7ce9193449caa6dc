mod args;

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use args::Args;
use clap::Parser as _;
use mqtt_influx_bridge::{
    bridge::{self, Dispatcher},
    influx::InfluxClient,
    mqtt::MqttBus,
};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = run().await {
        eprintln!("{e:#}");
        return ExitCode::from(1);
    }

    ExitCode::from(0)
}

async fn run() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let influx_config = args.influx_config();
    info!(url = %influx_config.url, bucket = %influx_config.bucket, "waiting for InfluxDB");
    let influx = InfluxClient::new(influx_config).context("failed to create InfluxDB client")?;
    influx
        .wait_until_ready()
        .await
        .context("failed to connect to InfluxDB")?;

    let mqtt_config = args.mqtt_config();
    info!(host = %mqtt_config.host, port = mqtt_config.port, "connecting to MQTT broker");
    let mut bus = MqttBus::new(mqtt_config);

    let mut dispatcher = Dispatcher::new(influx);
    bridge::run(&mut bus, &mut dispatcher, shutdown_signal())
        .await
        .context("MQTT bridge stopped unexpectedly")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
