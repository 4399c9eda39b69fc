use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{RecordedReading, Res, Ticket, TicketId, Void, WeatherReading};

pub mod surreal;

// Traits.

/// Generic database client trait that clients must implement.
///
/// This trait defines the storage both agents rely on: point lookups of
/// service tickets, and an append-only log of weather readings. Implementing
/// this trait allows different database backends to be used.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Gets a ticket by its id, if it exists.
    async fn get_ticket(&self, ticket_id: TicketId) -> Res<Option<Ticket>>;

    /// Creates or replaces a ticket, keyed by its id.
    ///
    /// The support agent never writes tickets; this backs the import command.
    async fn upsert_ticket(&self, ticket: &Ticket) -> Void;

    /// Appends a weather reading; the store assigns its timestamp.
    async fn add_weather_reading(&self, reading: &WeatherReading) -> Void;

    /// Gets up to `limit` of the most recent readings, newest first.
    async fn get_recent_weather_readings(&self, limit: usize) -> Res<Vec<RecordedReading>>;
}

/// Database client for both agents.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    /// The database client instance.
    pub inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}
