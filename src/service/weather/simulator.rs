//! Simulated weather feed serving `GET /weather`.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use rand::Rng;

use crate::base::types::WeatherReading;

/// Which kind of weather the feed produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherMode {
    /// Small variations around 25°C, 10 km/h and 1013 hPa.
    Normal,
    /// Cold, humid, windy and low pressure.
    Storm,
}

/// Produce one reading for the mode.
pub fn simulate_reading<R: Rng + ?Sized>(mode: WeatherMode, rng: &mut R) -> WeatherReading {
    match mode {
        WeatherMode::Normal => WeatherReading {
            temperature: round1(25.0 + rng.gen_range(-0.5..=0.5)),
            humidity: rng.gen_range(40..=60),
            wind_speed: round1(10.0 + rng.gen_range(-1.0..=1.0)),
            pressure: round1(1013.0 + rng.gen_range(-1.0..=1.0)),
            storm_risk: false,
        },
        WeatherMode::Storm => WeatherReading {
            temperature: round1(rng.gen_range(5.0..=15.0)),
            humidity: rng.gen_range(80..=100),
            wind_speed: round1(rng.gen_range(25.0..=40.0)),
            pressure: round1(rng.gen_range(970.0..=985.0)),
            storm_risk: true,
        },
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Router serving the simulated feed.
pub fn router(mode: WeatherMode) -> Router {
    Router::new().route("/weather", get(get_weather)).with_state(Arc::new(mode))
}

async fn get_weather(State(mode): State<Arc<WeatherMode>>) -> Json<WeatherReading> {
    Json(simulate_reading(*mode, &mut rand::thread_rng()))
}

// Tests.
