//! Runtime services and shared state for both agents.

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::{
        sentinel::Sentinel,
        support::{self, SupportAgent},
    },
    service::{db::DbClient, llm::LlmClient, mailer::Mailer, retrieval::Retriever, session::SessionStore, weather::WeatherSource},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the database client, LLM client, and configuration.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The database client instance.
    pub db: DbClient,
    /// The LLM client instance.
    pub llm: LlmClient,
}

impl Runtime {
    /// Create a new runtime instance.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        config.require_openai_api_key()?;

        // Initialize the database.
        let db = DbClient::surreal(&config).await?;

        // Initialize the LLM client.
        let llm = LlmClient::openai(&config);

        Ok(Self { config, db, llm })
    }

    /// Build the support agent from the runtime services.
    pub fn support_agent(&self) -> Res<SupportAgent> {
        let sessions = SessionStore::memory(&self.config);
        let retriever = Retriever::keyword_from_folder(&self.config.documents_path)?;

        Ok(SupportAgent::new(self.db.clone(), self.llm.clone(), sessions, retriever, self.config.retrieval_top_k))
    }

    /// Build the sentinel from the runtime services.
    pub fn sentinel(&self) -> Res<Sentinel> {
        let weather = WeatherSource::http(&self.config)?;
        let mailer = Mailer::smtp(&self.config)?;

        Ok(Sentinel::new(&self.config, self.db.clone(), self.llm.clone(), weather, mailer))
    }

    /// Serve `POST /ask` until cancelled.
    pub async fn start_support(&self, shutdown: CancellationToken) -> Void {
        let agent = self.support_agent()?;
        let listener = TcpListener::bind(&self.config.support_bind_address).await?;

        info!("Support agent listening on {}.", listener.local_addr()?);

        axum::serve(listener, support::router(agent)).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

        Ok(())
    }

    /// Run the sentinel loop until cancelled.
    pub async fn start_sentinel(&self, shutdown: CancellationToken) -> Void {
        let sentinel = self.sentinel()?;

        sentinel.run(self.config.check_interval(), shutdown).await;

        Ok(())
    }
}
