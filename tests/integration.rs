#![cfg(test)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use mockall::mock;
use serde_json::{Value, json};
use support_sentinel::{
    base::{
        config::{Config, ConfigInner},
        policy::ThresholdPolicy,
        prompts,
        types::{ClassificationResult, IntentError, QueryKind, RecordedReading, Res, SupportContext, Ticket, TicketId, Void, WeatherReading, WeatherVerdict},
    },
    interaction::{
        sentinel::{CycleOutcome, Sentinel, SentinelState},
        support::{self, SupportAgent},
    },
    service::{
        db::{DbClient, GenericDbClient},
        llm::{GenericLlmClient, LlmClient},
        mailer::{GenericMailer, Mailer},
        retrieval::{KeywordRetriever, Retriever},
        session::{MemorySessionStore, SessionLimits, SessionStore},
        weather::{GenericWeatherSource, WeatherSource},
    },
};
use tower::ServiceExt;

// Mocks.

mock! {
    pub Llm {}

    #[async_trait]
    impl GenericLlmClient for Llm {
        async fn classify_ticket_intent(&self, question: &str) -> Result<ClassificationResult, IntentError>;
        async fn get_support_agent_response(&self, context: &SupportContext) -> Res<String>;
        async fn assess_weather(&self, readings: &[WeatherReading]) -> Res<WeatherVerdict>;
    }
}

mock! {
    pub Db {}

    #[async_trait]
    impl GenericDbClient for Db {
        async fn get_ticket(&self, ticket_id: TicketId) -> Res<Option<Ticket>>;
        async fn upsert_ticket(&self, ticket: &Ticket) -> Void;
        async fn add_weather_reading(&self, reading: &WeatherReading) -> Void;
        async fn get_recent_weather_readings(&self, limit: usize) -> Res<Vec<RecordedReading>>;
    }
}

mock! {
    pub Mailer {}

    #[async_trait]
    impl GenericMailer for Mailer {
        async fn send_alert(&self, rationale: &str) -> Void;
    }
}

mock! {
    pub Weather {}

    #[async_trait]
    impl GenericWeatherSource for Weather {
        async fn fetch_reading(&self) -> Res<WeatherReading>;
    }
}

/// Deterministic analyst that applies the numeric thresholds instead of asking a model.
struct ThresholdAnalyst {
    policy: ThresholdPolicy,
}

#[async_trait]
impl GenericLlmClient for ThresholdAnalyst {
    async fn classify_ticket_intent(&self, _question: &str) -> Result<ClassificationResult, IntentError> {
        Err(IntentError::Transport(anyhow::anyhow!("Not a classifier.")))
    }

    async fn get_support_agent_response(&self, _context: &SupportContext) -> Res<String> {
        Err(anyhow::anyhow!("Not a support agent."))
    }

    async fn assess_weather(&self, readings: &[WeatherReading]) -> Res<WeatherVerdict> {
        Ok(self.policy.evaluate(readings))
    }
}

/// Weather feed that answers long after the step timeout.
struct SlowWeather;

#[async_trait]
impl GenericWeatherSource for SlowWeather {
    async fn fetch_reading(&self) -> Res<WeatherReading> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(normal_reading())
    }
}

/// Analyst that takes a while, then reports risk.
struct SlowAnalyst {
    delay: Duration,
}

#[async_trait]
impl GenericLlmClient for SlowAnalyst {
    async fn classify_ticket_intent(&self, _question: &str) -> Result<ClassificationResult, IntentError> {
        Err(IntentError::Transport(anyhow::anyhow!("Not a classifier.")))
    }

    async fn get_support_agent_response(&self, _context: &SupportContext) -> Res<String> {
        Err(anyhow::anyhow!("Not a support agent."))
    }

    async fn assess_weather(&self, _readings: &[WeatherReading]) -> Res<WeatherVerdict> {
        tokio::time::sleep(self.delay).await;

        Ok(WeatherVerdict {
            risk: true,
            rationale: "Ventos fortes.".to_string(),
        })
    }
}

// Helpers.

fn ticket(id: TicketId) -> Ticket {
    Ticket {
        id,
        customer_name: "Maria".to_string(),
        defect: "Pulseira quebrada".to_string(),
        description: "Troca da pulseira de couro".to_string(),
        status: "Aguardando peça".to_string(),
        date: "2024-03-10".to_string(),
    }
}

fn ticket_intent(ticket_id: Option<TicketId>, query_kind: QueryKind) -> ClassificationResult {
    ClassificationResult {
        is_ticket: true,
        ticket_id,
        query_kind,
    }
}

/// A store holding ticket 42 only.
async fn seeded_db() -> DbClient {
    let db = DbClient::surreal_memory().await.unwrap();
    db.upsert_ticket(&ticket(42)).await.unwrap();
    db
}

fn support_agent(llm: impl GenericLlmClient, db: DbClient) -> SupportAgent {
    let sessions = SessionStore::new(Arc::new(MemorySessionStore::new(SessionLimits::default())));
    let retriever = Retriever::new(Arc::new(KeywordRetriever::from_documents(vec![])));

    SupportAgent::new(db, LlmClient::new(Arc::new(llm)), sessions, retriever, 4)
}

async fn ask(agent: &SupportAgent, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/ask")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();

    let response = support::router(agent.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn ask_question(agent: &SupportAgent, client_id: &str, question: &str) -> (StatusCode, Value) {
    ask(agent, json!({ "client_id": client_id, "question": question }).to_string()).await
}

fn sentinel_config(enforce_thresholds: bool) -> Config {
    Config {
        inner: Arc::new(ConfigInner {
            sentinel_history_len: 10,
            sentinel_step_timeout_secs: 5,
            sentinel_enforce_thresholds: enforce_thresholds,
            ..Default::default()
        }),
    }
}

fn normal_reading() -> WeatherReading {
    WeatherReading {
        temperature: 25.0,
        humidity: 50,
        wind_speed: 10.0,
        pressure: 1013.0,
        storm_risk: false,
    }
}

fn storm_reading() -> WeatherReading {
    WeatherReading {
        temperature: 23.0,
        humidity: 90,
        wind_speed: 40.0,
        pressure: 970.0,
        storm_risk: true,
    }
}

fn weather_returning(reading: WeatherReading) -> WeatherSource {
    let mut weather = MockWeather::new();
    weather.expect_fetch_reading().returning(move || Ok(reading));
    WeatherSource::new(Arc::new(weather))
}

fn mailer_expecting(times: usize) -> Mailer {
    let mut mailer = MockMailer::new();
    mailer.expect_send_alert().times(times).returning(|_| Ok(()));
    Mailer::new(Arc::new(mailer))
}

fn threshold_analyst() -> LlmClient {
    LlmClient::new(Arc::new(ThresholdAnalyst { policy: ThresholdPolicy::default() }))
}

// Support agent tests.

#[tokio::test]
async fn test_general_question_never_touches_ticket_store() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent().returning(|_| Ok(ClassificationResult::not_a_ticket()));
    llm.expect_get_support_agent_response()
        .withf(|context: &SupportContext| context.question == "Qual a garantia do relógio?")
        .returning(|_| Ok("A garantia é de dois anos.".to_string()));

    // No expectations: any store call panics.
    let db = DbClient::new(Arc::new(MockDb::new()));
    let agent = support_agent(llm, db);

    let (status, body) = ask_question(&agent, "c1", "Qual a garantia do relógio?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "answer": "A garantia é de dois anos." }));
    assert_eq!(agent.sessions().history("c1").len(), 2);
    assert_eq!(agent.sessions().last_ticket("c1"), None);
}

#[tokio::test]
async fn test_general_question_carries_history() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent().returning(|_| Ok(ClassificationResult::not_a_ticket()));
    llm.expect_get_support_agent_response().returning(|context: &SupportContext| Ok(format!("Turnos anteriores: {}", context.history.len())));

    let agent = support_agent(llm, DbClient::new(Arc::new(MockDb::new())));

    let (_, first) = ask_question(&agent, "c1", "Olá").await;
    let (_, second) = ask_question(&agent, "c1", "Tudo bem?").await;
    let (_, other) = ask_question(&agent, "c2", "Olá").await;

    assert_eq!(first["answer"], "Turnos anteriores: 0");
    assert_eq!(second["answer"], "Turnos anteriores: 2");
    assert_eq!(other["answer"], "Turnos anteriores: 0");
}

#[tokio::test]
async fn test_ticket_status_answer() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent().returning(|_| Ok(ticket_intent(Some(42), QueryKind::Status)));

    let agent = support_agent(llm, seeded_db().await);

    let (status, body) = ask_question(&agent, "c1", "Qual o status do atendimento 42?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "answer": "O status do atendimento 42 é: Aguardando peça." }));
    assert_eq!(agent.sessions().last_ticket("c1"), Some(42));
}

#[tokio::test]
async fn test_ticket_answers_for_every_query_kind() {
    let cases = [
        (QueryKind::Status, "O status do atendimento 42 é: Aguardando peça."),
        (QueryKind::Defect, "O defeito registrado no atendimento 42 foi: Pulseira quebrada."),
        (QueryKind::Description, "A descrição do atendimento 42 é: Troca da pulseira de couro."),
        (QueryKind::Date, "A data do atendimento 42 foi: 2024-03-10."),
        (QueryKind::General, "Olá Maria, o status do atendimento 42 é: Aguardando peça."),
    ];

    let db = seeded_db().await;

    for (kind, expected) in cases {
        let mut llm = MockLlm::new();
        llm.expect_classify_ticket_intent().returning(move |_| Ok(ticket_intent(Some(42), kind)));

        let agent = support_agent(llm, db.clone());
        let (status, body) = ask_question(&agent, "c1", "Atendimento 42").await;

        assert_eq!(status, StatusCode::OK, "{kind:?}");
        assert_eq!(body["answer"], expected, "{kind:?}");
    }
}

#[tokio::test]
async fn test_unknown_ticket_leaves_session_untouched() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent()
        .withf(|question: &str| question.contains("42"))
        .returning(|_| Ok(ticket_intent(Some(42), QueryKind::Status)));
    llm.expect_classify_ticket_intent()
        .withf(|question: &str| question.contains("777"))
        .returning(|_| Ok(ticket_intent(Some(777), QueryKind::Status)));

    let agent = support_agent(llm, seeded_db().await);

    ask_question(&agent, "c1", "Status do 42?").await;
    let (status, body) = ask_question(&agent, "c1", "Status do 777?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Não encontrei o atendimento número 777. Verifique se o número está correto.");
    assert_eq!(agent.sessions().last_ticket("c1"), Some(42));

    // A client that never resolved a ticket gets no session at all.
    ask_question(&agent, "c2", "Status do 777?").await;
    assert_eq!(agent.sessions().last_ticket("c2"), None);
}

#[tokio::test]
async fn test_repeated_question_is_idempotent() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent().returning(|_| Ok(ticket_intent(Some(42), QueryKind::Defect)));

    let agent = support_agent(llm, seeded_db().await);

    let first = ask_question(&agent, "c1", "Qual o defeito do 42?").await;
    let second = ask_question(&agent, "c1", "Qual o defeito do 42?").await;

    assert_eq!(first, second);
    assert_eq!(agent.sessions().last_ticket("c1"), Some(42));
    assert!(agent.sessions().history("c1").is_empty());
}

#[tokio::test]
async fn test_missing_ticket_id_uses_remembered_ticket() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent()
        .withf(|question: &str| question.contains("42"))
        .returning(|_| Ok(ticket_intent(Some(42), QueryKind::Status)));
    llm.expect_classify_ticket_intent()
        .withf(|question: &str| !question.contains("42"))
        .returning(|_| Ok(ticket_intent(None, QueryKind::Date)));

    let agent = support_agent(llm, seeded_db().await);

    ask_question(&agent, "c1", "Status do 42?").await;
    let (_, body) = ask_question(&agent, "c1", "E qual a data dele?").await;

    assert_eq!(body["answer"], "A data do atendimento 42 foi: 2024-03-10.");
}

#[tokio::test]
async fn test_missing_ticket_id_asks_for_number_without_store_access() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent().returning(|_| Ok(ticket_intent(None, QueryKind::Status)));

    let agent = support_agent(llm, DbClient::new(Arc::new(MockDb::new())));

    let (status, body) = ask_question(&agent, "c1", "Qual o status do meu atendimento?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], prompts::ASK_FOR_TICKET_NUMBER);
}

#[tokio::test]
async fn test_ticket_zero_counts_as_missing() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent().returning(|_| Ok(ticket_intent(Some(0), QueryKind::Status)));

    let agent = support_agent(llm, DbClient::new(Arc::new(MockDb::new())));

    let (_, body) = ask_question(&agent, "c1", "Status do atendimento 0?").await;

    assert_eq!(body["answer"], prompts::ASK_FOR_TICKET_NUMBER);
}

#[tokio::test]
async fn test_malformed_requests_are_rejected() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent().never();

    let agent = support_agent(llm, DbClient::new(Arc::new(MockDb::new())));

    let bodies = [
        json!({}).to_string(),
        json!({ "client_id": "c1" }).to_string(),
        json!({ "question": "Olá" }).to_string(),
        json!({ "client_id": 7, "question": "Olá" }).to_string(),
        json!({ "client_id": "c1", "question": null }).to_string(),
        "not json".to_string(),
        String::new(),
    ];

    for body in bodies {
        let (status, payload) = ask(&agent, body.clone()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(payload, json!({ "error": "Requisição inválida. Forneça 'client_id' e 'question'." }), "{body}");
    }
}

#[tokio::test]
async fn test_classifier_failures_fall_back_to_general_answer() {
    for transport in [true, false] {
        let mut llm = MockLlm::new();
        llm.expect_classify_ticket_intent().returning(move |_| {
            if transport {
                Err(IntentError::Transport(anyhow::anyhow!("connection refused")))
            } else {
                let source = serde_json::from_str::<ClassificationResult>("sim").unwrap_err();
                Err(IntentError::Parse { reply: "sim".to_string(), source })
            }
        });
        llm.expect_get_support_agent_response().returning(|_| Ok("Posso ajudar?".to_string()));

        let agent = support_agent(llm, DbClient::new(Arc::new(MockDb::new())));

        let (status, body) = ask_question(&agent, "c1", "Atendimento 42").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Posso ajudar?");
    }
}

#[tokio::test]
async fn test_fallback_failure_is_bad_gateway() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent().returning(|_| Ok(ClassificationResult::not_a_ticket()));
    llm.expect_get_support_agent_response().returning(|_| Err(anyhow::anyhow!("model down")));

    let agent = support_agent(llm, DbClient::new(Arc::new(MockDb::new())));

    let (status, body) = ask_question(&agent, "c1", "Olá").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body, json!({ "error": prompts::TEMPORARY_FAILURE }));
    assert!(agent.sessions().history("c1").is_empty());
}

#[tokio::test]
async fn test_ticket_store_failure_is_bad_gateway() {
    let mut llm = MockLlm::new();
    llm.expect_classify_ticket_intent().returning(|_| Ok(ticket_intent(Some(42), QueryKind::Status)));

    let mut db = MockDb::new();
    db.expect_get_ticket().returning(|_| Err(anyhow::anyhow!("store offline")));

    let agent = support_agent(llm, DbClient::new(Arc::new(db)));

    let (status, body) = ask_question(&agent, "c1", "Status do 42?").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], prompts::TEMPORARY_FAILURE);
    assert_eq!(agent.sessions().last_ticket("c1"), None);
}

// Sentinel tests.

#[tokio::test]
async fn test_normal_readings_do_not_alert() {
    let db = DbClient::surreal_memory().await.unwrap();
    for _ in 0..9 {
        db.add_weather_reading(&normal_reading()).await.unwrap();
    }

    let sentinel = Sentinel::new(&sentinel_config(false), db.clone(), threshold_analyst(), weather_returning(normal_reading()), mailer_expecting(0));

    let outcome = sentinel.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::Calm(_)), "{outcome:?}");
    assert_eq!(outcome.state(), SentinelState::Monitoring);
    assert_eq!(db.get_recent_weather_readings(20).await.unwrap().len(), 10);
}

#[tokio::test]
async fn test_storm_reading_alerts() {
    let db = DbClient::surreal_memory().await.unwrap();
    for _ in 0..9 {
        db.add_weather_reading(&normal_reading()).await.unwrap();
    }

    let mut mailer = MockMailer::new();
    mailer
        .expect_send_alert()
        .withf(|rationale: &str| rationale.contains("40") && rationale.contains("970"))
        .times(1)
        .returning(|_| Ok(()));

    let sentinel = Sentinel::new(&sentinel_config(false), db, threshold_analyst(), weather_returning(storm_reading()), Mailer::new(Arc::new(mailer)));

    let outcome = sentinel.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::Alerted(ref verdict) if verdict.risk), "{outcome:?}");
    assert_eq!(outcome.state(), SentinelState::Alerting);
}

#[tokio::test]
async fn test_fetch_failure_skips_cycle() {
    let mut weather = MockWeather::new();
    weather.expect_fetch_reading().returning(|| Err(anyhow::anyhow!("feed offline")));

    let sentinel = Sentinel::new(
        &sentinel_config(false),
        DbClient::new(Arc::new(MockDb::new())),
        LlmClient::new(Arc::new(MockLlm::new())),
        WeatherSource::new(Arc::new(weather)),
        mailer_expecting(0),
    );

    assert_eq!(sentinel.run_cycle().await, CycleOutcome::FetchFailed);
}

#[tokio::test]
async fn test_persist_failure_skips_analysis() {
    let mut db = MockDb::new();
    db.expect_add_weather_reading().returning(|_| Err(anyhow::anyhow!("disk full")));

    let sentinel = Sentinel::new(
        &sentinel_config(false),
        DbClient::new(Arc::new(db)),
        LlmClient::new(Arc::new(MockLlm::new())),
        weather_returning(normal_reading()),
        mailer_expecting(0),
    );

    assert_eq!(sentinel.run_cycle().await, CycleOutcome::PersistFailed);
}

#[tokio::test]
async fn test_empty_history_skips_analysis() {
    let mut db = MockDb::new();
    db.expect_add_weather_reading().returning(|_| Ok(()));
    db.expect_get_recent_weather_readings().withf(|limit: &usize| *limit == 10).returning(|_| Ok(vec![]));

    let sentinel = Sentinel::new(
        &sentinel_config(false),
        DbClient::new(Arc::new(db)),
        LlmClient::new(Arc::new(MockLlm::new())),
        weather_returning(normal_reading()),
        mailer_expecting(0),
    );

    assert_eq!(sentinel.run_cycle().await, CycleOutcome::NoHistory);
}

#[tokio::test]
async fn test_analysis_failure_skips_alert() {
    let mut llm = MockLlm::new();
    llm.expect_assess_weather().returning(|_| Err(anyhow::anyhow!("model down")));

    let sentinel = Sentinel::new(
        &sentinel_config(false),
        DbClient::surreal_memory().await.unwrap(),
        LlmClient::new(Arc::new(llm)),
        weather_returning(storm_reading()),
        mailer_expecting(0),
    );

    assert_eq!(sentinel.run_cycle().await, CycleOutcome::AnalysisFailed);
}

#[tokio::test]
async fn test_alert_failure_is_reported() {
    let mut mailer = MockMailer::new();
    mailer.expect_send_alert().times(1).returning(|_| Err(anyhow::anyhow!("smtp refused")));

    let sentinel = Sentinel::new(
        &sentinel_config(false),
        DbClient::surreal_memory().await.unwrap(),
        threshold_analyst(),
        weather_returning(storm_reading()),
        Mailer::new(Arc::new(mailer)),
    );

    let outcome = sentinel.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::AlertFailed(_)), "{outcome:?}");
    assert_eq!(outcome.state(), SentinelState::Alerting);
}

#[tokio::test]
async fn test_threshold_guard_overrules_calm_verdict() {
    for (enforce, expect_alert) in [(false, false), (true, true)] {
        let mut llm = MockLlm::new();
        llm.expect_assess_weather().returning(|_| {
            Ok(WeatherVerdict {
                risk: false,
                rationale: "Nenhum risco identificado.".to_string(),
            })
        });

        let sentinel = Sentinel::new(
            &sentinel_config(enforce),
            DbClient::surreal_memory().await.unwrap(),
            LlmClient::new(Arc::new(llm)),
            weather_returning(storm_reading()),
            mailer_expecting(usize::from(expect_alert)),
        );

        let outcome = sentinel.run_cycle().await;

        assert_eq!(outcome.state() == SentinelState::Alerting, expect_alert, "{outcome:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_step_times_out() {
    let sentinel = Sentinel::new(
        &sentinel_config(false),
        DbClient::new(Arc::new(MockDb::new())),
        LlmClient::new(Arc::new(MockLlm::new())),
        WeatherSource::new(Arc::new(SlowWeather)),
        mailer_expecting(0),
    );

    assert_eq!(sentinel.run_cycle().await, CycleOutcome::FetchFailed);
}

/// Store that accepts writes and always returns one storm reading.
fn storm_history_db() -> DbClient {
    let mut db = MockDb::new();
    db.expect_add_weather_reading().returning(|_| Ok(()));
    db.expect_get_recent_weather_readings().returning(|_| {
        Ok(vec![RecordedReading {
            reading: storm_reading(),
            timestamp: chrono::Utc::now(),
        }])
    });

    DbClient::new(Arc::new(db))
}

/// Model timings as shipped: 60s per attempt, one retry, 30s per ordinary step.
fn default_timing_config() -> Config {
    Config {
        inner: Arc::new(ConfigInner {
            openai_timeout_secs: 60,
            openai_max_retries: 1,
            sentinel_history_len: 10,
            sentinel_step_timeout_secs: 30,
            ..Default::default()
        }),
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_analysis_within_model_budget_still_alerts() {
    let sentinel = Sentinel::new(
        &default_timing_config(),
        storm_history_db(),
        LlmClient::new(Arc::new(SlowAnalyst { delay: Duration::from_secs(35) })),
        weather_returning(storm_reading()),
        mailer_expecting(1),
    );

    let outcome = sentinel.run_cycle().await;

    assert!(matches!(outcome, CycleOutcome::Alerted(_)), "{outcome:?}");
}

#[tokio::test(start_paused = true)]
async fn test_analysis_beyond_model_budget_times_out() {
    let sentinel = Sentinel::new(
        &default_timing_config(),
        storm_history_db(),
        LlmClient::new(Arc::new(SlowAnalyst { delay: Duration::from_secs(200) })),
        weather_returning(storm_reading()),
        mailer_expecting(0),
    );

    assert_eq!(sentinel.run_cycle().await, CycleOutcome::AnalysisFailed);
}

#[tokio::test(start_paused = true)]
async fn test_run_stops_when_cancelled() {
    let mut weather = MockWeather::new();
    weather.expect_fetch_reading().times(3).returning(|| Err(anyhow::anyhow!("feed offline")));

    let sentinel = Sentinel::new(
        &sentinel_config(false),
        DbClient::new(Arc::new(MockDb::new())),
        LlmClient::new(Arc::new(MockLlm::new())),
        WeatherSource::new(Arc::new(weather)),
        mailer_expecting(0),
    );

    let cancel = tokio_util::sync::CancellationToken::new();
    let task = tokio::spawn({
        let cancel = cancel.clone();
        async move { sentinel.run(Duration::from_secs(60), cancel).await }
    });

    // Ticks at 0s, 60s and 120s.
    tokio::time::sleep(Duration::from_secs(150)).await;
    cancel.cancel();

    task.await.unwrap();
}

// Command tests.

fn offline_config() -> Config {
    Config {
        inner: Arc::new(ConfigInner {
            db_endpoint: "mem://".to_string(),
            db_namespace: "support_sentinel".to_string(),
            db_database: "test".to_string(),
            ..Default::default()
        }),
    }
}

#[tokio::test]
async fn test_import_tickets_needs_no_api_key() {
    let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    std::io::Write::write_all(&mut file, serde_json::to_string(&vec![ticket(42), ticket(43)]).unwrap().as_bytes()).unwrap();

    let imported = support_sentinel::import_tickets(offline_config(), file.path()).await.unwrap();

    assert_eq!(imported, 2);
}

#[tokio::test]
async fn test_agents_need_an_api_key() {
    let result = support_sentinel::runtime::Runtime::new(offline_config()).await;

    assert!(result.is_err());
}
