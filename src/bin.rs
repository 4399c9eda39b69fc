//! Binary entry point for `support-sentinel`.
//!
//! One binary drives every part of the demo: the support agent, the weather
//! sentinel, the simulated weather feed, and the ticket import.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use support_sentinel::{
    base::{config::Config, types::Void},
    service::weather::simulator::WeatherMode,
};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Support-sentinel – a watch-brand support agent and a weather sentinel.
///
/// Configuration can come from `config.toml` or `SUPPORT_SENTINEL_*`
/// environment variables.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Override the config file path (optional).
    ///
    /// By default, the config file is looked up at `.hidden/config.toml`
    /// in the current directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Export spans to an OTLP collector over HTTP.
    #[arg(long, global = true)]
    otlp: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the support agent (`POST /ask`).
    Support,
    /// Run the weather sentinel loop.
    Sentinel,
    /// Serve a simulated weather feed (`GET /weather`).
    WeatherFeed {
        /// Produce storm readings instead of calm ones.
        #[arg(long)]
        storm: bool,
    },
    /// Load a JSON array of tickets into the ticket store.
    ImportTickets {
        /// Path to the JSON file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Void {
    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stdout = tracing_subscriber::fmt::layer()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer.

    let otel = if args.otlp {
        let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
        let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("support-sentinel");

        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Support => support_sentinel::start_support(config).await,
        Command::Sentinel => support_sentinel::start_sentinel(config).await,
        Command::WeatherFeed { storm } => {
            let mode = if storm { WeatherMode::Storm } else { WeatherMode::Normal };

            support_sentinel::start_weather_feed(config, mode).await
        }
        Command::ImportTickets { path } => {
            support_sentinel::import_tickets(config, &path).await?;

            Ok(())
        }
    }
}
