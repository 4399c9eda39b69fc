//! The weather sentinel: fetch, persist, analyze, maybe alert.

use std::{future::Future, time::Duration};

use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        policy::ThresholdPolicy,
        types::{Res, WeatherReading, WeatherVerdict},
    },
    service::{db::DbClient, llm::LlmClient, mailer::Mailer, weather::WeatherSource},
};

/// Whether the last cycle raised an alert. Re-evaluated every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelState {
    Monitoring,
    Alerting,
}

/// How a single cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The weather source could not be reached.
    FetchFailed,
    /// The reading could not be stored.
    PersistFailed,
    /// The store could not be read back.
    HistoryFailed,
    /// Nothing stored yet.
    NoHistory,
    /// The analyst could not be reached.
    AnalysisFailed,
    /// No risk found.
    Calm(WeatherVerdict),
    /// Risk found and the alert went out.
    Alerted(WeatherVerdict),
    /// Risk found but the alert could not be delivered.
    AlertFailed(WeatherVerdict),
}

impl CycleOutcome {
    pub fn state(&self) -> SentinelState {
        match self {
            CycleOutcome::Alerted(_) | CycleOutcome::AlertFailed(_) => SentinelState::Alerting,
            _ => SentinelState::Monitoring,
        }
    }
}

/// The sentinel and its collaborators.
#[derive(Clone)]
pub struct Sentinel {
    db: DbClient,
    llm: LlmClient,
    weather: WeatherSource,
    mailer: Mailer,
    history_len: usize,
    step_timeout: Duration,
    analysis_timeout: Duration,
    guard: Option<ThresholdPolicy>,
}

impl Sentinel {
    pub fn new(config: &Config, db: DbClient, llm: LlmClient, weather: WeatherSource, mailer: Mailer) -> Self {
        Self {
            db,
            llm,
            weather,
            mailer,
            history_len: config.sentinel_history_len,
            step_timeout: config.sentinel_step_timeout(),
            analysis_timeout: config.sentinel_analysis_timeout(),
            guard: config.sentinel_enforce_thresholds.then(ThresholdPolicy::default),
        }
    }

    /// Run cycles every `interval` until cancelled. The first cycle runs immediately.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Sentinel started, checking every {}s.", interval.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let outcome = tokio::select! {
                        outcome = self.run_cycle() => outcome,
                        _ = cancel.cancelled() => break,
                    };

                    info!("Cycle finished: {:?}", outcome.state());
                }
                _ = cancel.cancelled() => break,
            }
        }

        info!("Sentinel shutting down.");
    }

    /// One fetch → persist → analyze → maybe-alert pass.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> CycleOutcome {
        let reading = match self.step("fetch", self.step_timeout, self.weather.fetch_reading()).await {
            Ok(reading) => reading,
            Err(err) => {
                error!("Failed to collect weather data: {err:#}");
                return CycleOutcome::FetchFailed;
            }
        };

        if let Err(err) = self.step("persist", self.step_timeout, self.db.add_weather_reading(&reading)).await {
            error!("Failed to store weather data: {err:#}");
            return CycleOutcome::PersistFailed;
        }

        info!("Weather data collected.");

        let readings: Vec<WeatherReading> = match self.step("history", self.step_timeout, self.db.get_recent_weather_readings(self.history_len)).await {
            Ok(recorded) => recorded.into_iter().map(|r| r.reading).collect(),
            Err(err) => {
                error!("Failed to read weather history: {err:#}");
                return CycleOutcome::HistoryFailed;
            }
        };

        if readings.is_empty() {
            return CycleOutcome::NoHistory;
        }

        let verdict = match self.step("analyze", self.analysis_timeout, self.llm.assess_weather(&readings)).await {
            Ok(verdict) => self.apply_guard(verdict, &readings),
            Err(err) => {
                error!("Failed to analyze weather data: {err:#}");
                return CycleOutcome::AnalysisFailed;
            }
        };

        if !verdict.risk {
            info!("No risk identified.");
            return CycleOutcome::Calm(verdict);
        }

        warn!("Weather risk identified: {}", verdict.rationale);

        match self.step("alert", self.step_timeout, self.mailer.send_alert(&verdict.rationale)).await {
            Ok(()) => CycleOutcome::Alerted(verdict),
            Err(err) => {
                error!("Failed to send the alert e-mail: {err:#}");
                CycleOutcome::AlertFailed(verdict)
            }
        }
    }

    /// Overrule a calm verdict when the numeric thresholds are enforced and broken.
    fn apply_guard(&self, verdict: WeatherVerdict, readings: &[WeatherReading]) -> WeatherVerdict {
        let Some(policy) = &self.guard else {
            return verdict;
        };

        if verdict.risk {
            return verdict;
        }

        let checked = policy.evaluate(readings);
        if checked.risk {
            warn!("Thresholds broken although the analyst found no risk.");
            return checked;
        }

        verdict
    }

    /// Bound a step of the cycle. The analysis step gets the model's own retry budget.
    async fn step<T>(&self, name: &str, limit: Duration, fut: impl Future<Output = Res<T>>) -> Res<T> {
        match timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(anyhow::anyhow!("Step `{name}` timed out after {}s.", limit.as_secs())),
        }
    }
}
