//! Library root for `support-sentinel`.
//!
//! Two small LLM-backed agents sharing one runtime:
//! - The support agent answers watch-brand customer questions over `POST /ask`,
//!   resolving ticket questions from the ticket store and everything else from
//!   a conversational fallback over reference documents.
//! - The weather sentinel polls a weather feed, stores every reading, asks the
//!   model whether the recent trend is hazardous, and e-mails an alert if so.
//!
//! A simulated weather feed and a ticket import command round out the demo.
//! The architecture is built around extensible traits that allow for
//! different implementations of each service.

pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use std::path::Path;

use base::{
    config::Config,
    types::{Res, Ticket, Void},
};
use rustls::crypto;
use service::db::DbClient;
use service::weather::simulator::{self, WeatherMode};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Start the support agent and serve until Ctrl-C.
pub async fn start_support(config: Config) -> Void {
    info!("Starting support agent ...");

    install_crypto_provider();

    let runtime = runtime::Runtime::new(config).await?;
    runtime.start_support(shutdown_on_ctrl_c()).await
}

/// Start the weather sentinel and run until Ctrl-C.
pub async fn start_sentinel(config: Config) -> Void {
    info!("Starting weather sentinel ...");

    install_crypto_provider();

    let runtime = runtime::Runtime::new(config).await?;
    runtime.start_sentinel(shutdown_on_ctrl_c()).await
}

/// Serve the simulated weather feed until Ctrl-C.
pub async fn start_weather_feed(config: Config, mode: WeatherMode) -> Void {
    let listener = TcpListener::bind(&config.weather_bind_address).await?;

    info!("Simulated weather feed ({mode:?}) listening on {}.", listener.local_addr()?);

    axum::serve(listener, simulator::router(mode)).with_graceful_shutdown(shutdown_on_ctrl_c().cancelled_owned()).await?;

    Ok(())
}

/// Load a JSON array of tickets into the ticket store. Returns how many were written.
pub async fn import_tickets(config: Config, path: &Path) -> Res<usize> {
    let raw = std::fs::read_to_string(path)?;
    let tickets: Vec<Ticket> = serde_json::from_str(&raw)?;

    if config.db_endpoint.starts_with("mem://") {
        warn!("Importing into an in-memory database; the tickets are lost when this command exits.");
    }

    let db = DbClient::surreal(&config).await?;

    for ticket in &tickets {
        db.upsert_ticket(ticket).await?;
    }

    info!("Imported {} tickets.", tickets.len());

    Ok(tickets.len())
}

/// Install the process-wide rustls provider used by the TLS clients.
fn install_crypto_provider() {
    if crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed.");
    }
}

/// A token cancelled on the first Ctrl-C.
fn shutdown_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down ...");
                trigger.cancel();
            }
            Err(err) => warn!("Unable to listen for Ctrl-C: {err}"),
        }
    });

    token
}
