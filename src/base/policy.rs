//! Deterministic weather risk policy.
//!
//! The same numbers the analyst directive mentions: wind above 25 km/h,
//! pressure below 980 hPa, or an abrupt temperature drop between two
//! consecutive readings.

use std::fmt::Write;

use crate::base::types::{WeatherReading, WeatherVerdict};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    /// Wind speed above which a reading is hazardous, in km/h.
    pub max_wind_speed: f64,
    /// Pressure below which a reading is hazardous, in hPa.
    pub min_pressure: f64,
    /// Drop between consecutive readings that counts as abrupt, in °C.
    pub max_temperature_drop: f64,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            max_wind_speed: 25.0,
            min_pressure: 980.0,
            max_temperature_drop: 5.0,
        }
    }
}

impl ThresholdPolicy {
    /// Evaluate readings ordered newest first.
    pub fn evaluate(&self, readings: &[WeatherReading]) -> WeatherVerdict {
        let mut findings = String::new();

        if let Some(max_wind) = readings.iter().map(|r| r.wind_speed).filter(|w| *w > self.max_wind_speed).reduce(f64::max) {
            let _ = write!(findings, "Ventos de até {max_wind} km/h (limite {} km/h). ", self.max_wind_speed);
        }

        if let Some(min_pressure) = readings.iter().map(|r| r.pressure).filter(|p| *p < self.min_pressure).reduce(f64::min) {
            let _ = write!(findings, "Pressão de {min_pressure} hPa (mínimo {} hPa). ", self.min_pressure);
        }

        // Newest first, so an older reading followed by a much colder newer one is a drop.
        let max_drop = readings.windows(2).map(|w| w[1].temperature - w[0].temperature).fold(0.0, f64::max);
        if max_drop >= self.max_temperature_drop {
            let _ = write!(findings, "Queda de temperatura de {max_drop:.1}°C entre leituras. ");
        }

        if findings.is_empty() {
            WeatherVerdict { risk: false, rationale: "Nenhum risco identificado.".to_string() }
        } else {
            WeatherVerdict { risk: true, rationale: findings.trim_end().to_string() }
        }
    }
}

// Tests.
