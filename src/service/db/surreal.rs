//! SurrealDB implementation of the ticket and weather store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{info, instrument};

use crate::base::{
    config::Config,
    types::{RecordedReading, Res, Ticket, TicketId, Void, WeatherReading},
};

use super::{DbClient, GenericDbClient};

/// Schema definitions, applied on every start.
const SCHEMA: &str = r#"
    DEFINE TABLE IF NOT EXISTS ticket SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS cliente_nome ON ticket TYPE string;
    DEFINE FIELD IF NOT EXISTS defeito ON ticket TYPE string;
    DEFINE FIELD IF NOT EXISTS descricao ON ticket TYPE string;
    DEFINE FIELD IF NOT EXISTS status ON ticket TYPE string;
    DEFINE FIELD IF NOT EXISTS data ON ticket TYPE string;

    DEFINE TABLE IF NOT EXISTS weather SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS temperature ON weather TYPE float;
    DEFINE FIELD IF NOT EXISTS humidity ON weather TYPE int;
    DEFINE FIELD IF NOT EXISTS wind_speed ON weather TYPE float;
    DEFINE FIELD IF NOT EXISTS pressure ON weather TYPE float;
    DEFINE FIELD IF NOT EXISTS storm_risk ON weather TYPE bool;
    DEFINE FIELD IF NOT EXISTS timestamp ON weather TYPE datetime DEFAULT time::now();
    DEFINE INDEX IF NOT EXISTS weather_timestamp ON weather FIELDS timestamp;
"#;

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Connect to the SurrealDB endpoint named in the configuration.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealDbClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }

    /// Create an in-memory SurrealDB store.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealDbClient::connect("mem://", "support_sentinel", "test", None).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Records.

/// A ticket row; the ticket id is the record key.
#[derive(Debug, Serialize, Deserialize)]
struct TicketRecord {
    cliente_nome: String,
    defeito: String,
    descricao: String,
    status: String,
    data: String,
}

impl TicketRecord {
    fn into_ticket(self, id: TicketId) -> Ticket {
        Ticket {
            id,
            customer_name: self.cliente_nome,
            defect: self.defeito,
            description: self.descricao,
            status: self.status,
            date: self.data,
        }
    }
}

impl From<&Ticket> for TicketRecord {
    fn from(ticket: &Ticket) -> Self {
        Self {
            cliente_nome: ticket.customer_name.clone(),
            defeito: ticket.defect.clone(),
            descricao: ticket.description.clone(),
            status: ticket.status.clone(),
            data: ticket.date.clone(),
        }
    }
}

/// A weather row as read back, with the timestamp rendered as a string.
#[derive(Debug, Deserialize)]
struct WeatherRow {
    temperature: f64,
    humidity: i64,
    wind_speed: f64,
    pressure: f64,
    storm_risk: bool,
    recorded_at: String,
}

impl WeatherRow {
    fn into_recorded(self) -> Res<RecordedReading> {
        let timestamp = DateTime::parse_from_rfc3339(&self.recorded_at)?.with_timezone(&Utc);

        Ok(RecordedReading {
            reading: WeatherReading {
                temperature: self.temperature,
                humidity: self.humidity,
                wind_speed: self.wind_speed,
                pressure: self.pressure,
                storm_risk: self.storm_risk,
            },
            timestamp,
        })
    }
}

// Specific implementations.

/// SurrealDB client implementation.
#[derive(Clone)]
pub struct SurrealDbClient {
    db: Surreal<Any>,
}

impl SurrealDbClient {
    /// Create a new database client from the configuration.
    #[instrument(name = "SurrealDbClient::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        let credentials = match (&config.db_username, &config.db_password) {
            (Some(username), Some(password)) => Some((username.as_str(), password.as_str())),
            _ => None,
        };

        Self::connect(&config.db_endpoint, &config.db_namespace, &config.db_database, credentials).await
    }

    #[instrument(name = "SurrealDbClient::connect", skip(credentials))]
    async fn connect(endpoint: &str, namespace: &str, database: &str, credentials: Option<(&str, &str)>) -> Res<Self> {
        let db = any::connect(endpoint).await?;

        // Authenticate with the database, when credentials are given.
        if let Some((username, password)) = credentials {
            db.signin(Root { username, password }).await?;
        }

        db.use_ns(namespace).use_db(database).await?;

        // Define schemas.
        db.query(SCHEMA).await?.check()?;

        info!("Database initialized successfully.");

        Ok(Self { db })
    }
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip(self))]
    async fn get_ticket(&self, ticket_id: TicketId) -> Res<Option<Ticket>> {
        let record: Option<TicketRecord> = self.db.select(("ticket", ticket_id)).await?;

        Ok(record.map(|r| r.into_ticket(ticket_id)))
    }

    #[instrument(skip(self, ticket), fields(ticket_id = ticket.id))]
    async fn upsert_ticket(&self, ticket: &Ticket) -> Void {
        let _: Option<TicketRecord> = self.db.upsert(("ticket", ticket.id)).content(TicketRecord::from(ticket)).await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn add_weather_reading(&self, reading: &WeatherReading) -> Void {
        self.db
            .query("CREATE weather SET temperature = $temperature, humidity = $humidity, wind_speed = $wind_speed, pressure = $pressure, storm_risk = $storm_risk")
            .bind(("temperature", reading.temperature))
            .bind(("humidity", reading.humidity))
            .bind(("wind_speed", reading.wind_speed))
            .bind(("pressure", reading.pressure))
            .bind(("storm_risk", reading.storm_risk))
            .await?
            .check()?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_recent_weather_readings(&self, limit: usize) -> Res<Vec<RecordedReading>> {
        let mut response = self
            .db
            .query("SELECT temperature, humidity, wind_speed, pressure, storm_risk, timestamp, <string> timestamp AS recorded_at FROM weather ORDER BY timestamp DESC LIMIT $limit")
            .bind(("limit", limit as i64))
            .await?;

        let rows: Vec<WeatherRow> = response.take(0)?;

        rows.into_iter().map(WeatherRow::into_recorded).collect()
    }
}

// Tests.
