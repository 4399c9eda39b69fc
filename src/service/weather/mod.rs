//! Weather data sources polled by the sentinel.

pub mod simulator;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::base::{
    config::Config,
    types::{Res, WeatherReading},
};

// Traits.

/// Generic weather source trait that feeds must implement.
#[async_trait]
pub trait GenericWeatherSource: Send + Sync + 'static {
    /// Fetch the current reading.
    async fn fetch_reading(&self) -> Res<WeatherReading>;
}

// Structs.

/// Weather source for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct WeatherSource {
    inner: Arc<dyn GenericWeatherSource>,
}

impl Deref for WeatherSource {
    type Target = dyn GenericWeatherSource;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl WeatherSource {
    pub fn new(inner: Arc<dyn GenericWeatherSource>) -> Self {
        Self { inner }
    }

    pub fn http(config: &Config) -> Res<Self> {
        Ok(Self::new(Arc::new(HttpWeatherSource::new(config)?)))
    }
}

// Specific implementations.

/// Polls a `GET /weather` endpoint returning one JSON reading.
pub struct HttpWeatherSource {
    client: reqwest::Client,
    url: String,
}

impl HttpWeatherSource {
    pub fn new(config: &Config) -> Res<Self> {
        let client = reqwest::Client::builder().timeout(config.sentinel_step_timeout()).build()?;

        Ok(Self {
            client,
            url: config.weather_source_url.clone(),
        })
    }
}

#[async_trait]
impl GenericWeatherSource for HttpWeatherSource {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn fetch_reading(&self) -> Res<WeatherReading> {
        let reading = self.client.get(&self.url).send().await?.error_for_status()?.json::<WeatherReading>().await?;

        debug!("Fetched reading: {reading:?}");

        Ok(reading)
    }
}
