//! Tracking server.
//!
//! Accepts GPS fixes over HTTP (and MQTT when configured), keeps location
//! history, checks each fix against the current geofence and publishes
//! alerts for animals outside it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use herdfence::alerts::{AlertSink, LogAlertSink, WebhookAlertSink};
use herdfence::config::Config;
use herdfence::models::Polygon;
use herdfence::mqtt;
use herdfence::store::{BoundaryStore, TrackingStore};
use herdfence::{GeofenceEvaluator, Tracker};

mod routes;
use routes::AppState;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Livestock tracking and geofence server")]
struct Args {
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// sled data directory (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if args.data_dir.is_some() {
        config.storage.data_dir = args.data_dir;
    }

    info!("Herdfence Tracking Server");

    let db = match &config.storage.data_dir {
        Some(dir) => {
            info!("Opening data directory {}", dir.display());
            sled::open(dir).context("Failed to open data directory")?
        }
        None => {
            warn!("No data directory configured, data will not survive a restart");
            sled::Config::new()
                .temporary(true)
                .open()
                .context("Failed to open temporary store")?
        }
    };

    let boundaries = BoundaryStore::open_sled(&db)?;
    let tracking = TrackingStore::open(&db)?;

    let evaluator = match config.geofence.default_polygon.clone() {
        Some(points) => GeofenceEvaluator::with_default_polygon(Polygon::new(points)),
        None => GeofenceEvaluator::new(),
    };

    let mut mqtt_link = None;
    let sink: Arc<dyn AlertSink> = if let Some(mqtt_config) = &config.mqtt {
        info!(
            "Publishing alerts to MQTT {}:{} on {}",
            mqtt_config.host, mqtt_config.port, mqtt_config.alerts_topic
        );
        let (sink, eventloop) = mqtt::connect(mqtt_config);
        mqtt_link = Some((eventloop, sink.client(), mqtt_config.gps_topic.clone()));
        Arc::new(sink)
    } else if let Some(webhook) = &config.webhook {
        info!("Publishing alerts to webhook {}", webhook.url);
        Arc::new(WebhookAlertSink::new(webhook.url.clone()))
    } else {
        warn!("No alert transport configured, alerts will only be logged");
        Arc::new(LogAlertSink)
    };

    let tracker = Arc::new(Tracker::new(boundaries, tracking, evaluator, sink));

    if let Some((eventloop, client, gps_topic)) = mqtt_link {
        tokio::spawn(mqtt::run_gps_listener(
            eventloop,
            client,
            gps_topic,
            Arc::clone(&tracker),
        ));
    }

    let app = routes::router(Arc::new(AppState { tracker }));

    info!("Starting server on {}", config.server.listen);

    let listener = tokio::net::TcpListener::bind(&config.server.listen).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.flush_async().await?;
    info!("Shut down cleanly");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
