//! Integration with Large Language Model services.
//!
//! The module defines the `GenericLlmClient` trait that can be implemented
//! for different LLM providers, with a default implementation for OpenAI.

pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{ClassificationResult, IntentError, Res, SupportContext, WeatherReading, WeatherVerdict};

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// This trait defines the three model calls both agents make. Implementing it
/// allows different LLM providers (or deterministic stubs) to be used.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Decide whether a question is about a service ticket.
    ///
    /// Transport failures and unparsable replies are reported as distinct
    /// `IntentError` variants so the caller can choose its fallback.
    async fn classify_ticket_intent(&self, question: &str) -> Result<ClassificationResult, IntentError>;

    /// Answer a general support question from documents and conversation history.
    async fn get_support_agent_response(&self, context: &SupportContext) -> Res<String>;

    /// Judge whether a window of readings (newest first) is hazardous.
    async fn assess_weather(&self, readings: &[WeatherReading]) -> Res<WeatherVerdict>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }
}
