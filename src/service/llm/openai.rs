//! OpenAI implementation of the LLM client, on top of the Responses API.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ReasoningEffort,
        responses::{Content, CreateResponseArgs, Input, InputItem, InputMessageArgs, OutputContent, ReasoningConfigArgs, Response, ResponseFormatJsonSchema, Role, TextConfig, TextResponseFormat},
    },
};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::base::{
    config::Config,
    prompts,
    types::{ChatRole, ClassificationResult, IntentError, Res, SupportContext, WeatherReading, WeatherVerdict},
};

use super::{GenericLlmClient, LlmClient};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    config: Config,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let mut cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone());

        if let Some(base_url) = &config.openai_base_url {
            cfg = cfg.with_api_base(base_url.clone());
        }

        Self {
            client: Client::with_config(cfg),
            config: config.clone(),
        }
    }

    /// Build the intent classifier input.
    #[instrument(name = "OpenAiLlmClient::build_intent_input", skip_all)]
    fn build_intent_input(&self, question: &str) -> Res<Input> {
        Ok(Input::Items(vec![InputItem::Message(
            InputMessageArgs::default().role(Role::User).content(prompts::intent_question(question)).build()?,
        )]))
    }

    /// Build the support conversation input: documents, history, then the question.
    #[instrument(name = "OpenAiLlmClient::build_support_input", skip_all)]
    fn build_support_input(&self, context: &SupportContext) -> Res<Input> {
        let mut items = Vec::with_capacity(context.history.len() + 2);

        let documents = if context.documents.is_empty() {
            "Nenhum documento relevante encontrado.".to_string()
        } else {
            context
                .documents
                .iter()
                .map(|d| format!("### {}\n\n{}", d.source, d.content))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        items.push(InputItem::Message(
            InputMessageArgs::default().role(Role::Developer).content(format!("## Documentos de referência\n\n{documents}\n\n")).build()?,
        ));

        for turn in &context.history {
            let role = match turn.role {
                ChatRole::User => Role::User,
                ChatRole::Assistant => Role::Assistant,
            };

            items.push(InputItem::Message(InputMessageArgs::default().role(role).content(turn.content.clone()).build()?));
        }

        items.push(InputItem::Message(InputMessageArgs::default().role(Role::User).content(context.question.clone()).build()?));

        Ok(Input::Items(items))
    }

    /// Build the weather analysis input.
    #[instrument(name = "OpenAiLlmClient::build_weather_input", skip_all)]
    fn build_weather_input(&self, readings: &[WeatherReading]) -> Res<Input> {
        Ok(Input::Items(vec![InputItem::Message(
            InputMessageArgs::default().role(Role::User).content(prompts::weather_question(readings)).build()?,
        )]))
    }

    /// Create a request with the model-dependent knobs applied.
    fn new_request(&self, instructions: &str, text_config: TextConfig, input: Input) -> Res<CreateResponseArgs> {
        let mut request = CreateResponseArgs::default();
        request
            .instructions(instructions.to_string())
            .max_output_tokens(self.config.openai_max_tokens)
            .model(&self.config.openai_model)
            .text(text_config)
            .input(input);

        // Add the temperature for the non-reasoning models.
        if self.config.openai_model.starts_with("gpt") {
            request.temperature(self.config.openai_temperature);
        }

        // Add the reasoning effort for `o` models.
        if self.config.openai_model.starts_with('o') {
            let reasoning_effort = parse_openai_reasoning_effort(&self.config.openai_reasoning_effort)?;
            request.reasoning(ReasoningConfigArgs::default().effort(reasoning_effort).build()?);
        }

        Ok(request)
    }

    /// Helper function to make OpenAI API calls with retry logic and timeout handling.
    async fn call_openai_api(&self, request_builder: CreateResponseArgs) -> Res<Response> {
        const RETRY_DELAY_MS: u64 = 1000;

        let max_retries = self.config.openai_max_retries;
        let mut retries = 0;

        loop {
            let request = request_builder.build()?;
            let result = timeout(self.config.openai_timeout(), self.client.responses().create(request)).await;

            match result {
                Ok(Ok(response)) => {
                    debug!("OpenAI API call succeeded after {} attempts", retries + 1);
                    return Ok(response);
                }
                Ok(Err(err)) => {
                    if retries >= max_retries {
                        return Err(anyhow::anyhow!("OpenAI API call failed after {max_retries} retries: {err}"));
                    }
                    retries += 1;
                    warn!("OpenAI API call failed, retrying {retries}/{max_retries}: {err}");
                }
                Err(_) => {
                    if retries >= max_retries {
                        return Err(anyhow::anyhow!("OpenAI API call timed out after {} attempts", max_retries + 1));
                    }
                    retries += 1;
                    warn!("OpenAI API call timed out, retrying {retries}/{max_retries}");
                }
            }

            let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1));
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::classify_ticket_intent", skip_all)]
    async fn classify_ticket_intent(&self, question: &str) -> Result<ClassificationResult, IntentError> {
        let input = self.build_intent_input(question).map_err(IntentError::Transport)?;
        let text_config = text_config_for(&self.config.openai_model, get_intent_text_config());
        let request = self.new_request(&self.config.intent_system_directive, text_config, input).map_err(IntentError::Transport)?;

        let response = self.call_openai_api(request).await.map_err(IntentError::Transport)?;
        let reply = collect_output_text(&response).map_err(IntentError::Transport)?;

        debug!("Intent classifier replied: {reply}");

        ClassificationResult::parse(&reply).map_err(|source| IntentError::Parse { reply, source })
    }

    #[instrument(name = "OpenAiLlmClient::get_support_agent_response", skip_all)]
    async fn get_support_agent_response(&self, context: &SupportContext) -> Res<String> {
        let input = self.build_support_input(context)?;
        let text_config = TextConfig { format: TextResponseFormat::Text };
        let request = self.new_request(&self.config.support_system_directive, text_config, input)?;

        let response = self.call_openai_api(request).await?;

        Ok(collect_output_text(&response)?.trim().to_string())
    }

    #[instrument(name = "OpenAiLlmClient::assess_weather", skip_all, fields(readings = readings.len()))]
    async fn assess_weather(&self, readings: &[WeatherReading]) -> Res<WeatherVerdict> {
        let input = self.build_weather_input(readings)?;
        let text_config = text_config_for(&self.config.openai_model, get_verdict_text_config());
        let request = self.new_request(&self.config.sentinel_system_directive, text_config, input)?;

        let response = self.call_openai_api(request).await?;
        let reply = collect_output_text(&response)?;

        Ok(WeatherVerdict::from_reply(&reply))
    }
}

/// Concatenate the text outputs of a response.
#[instrument(skip_all)]
pub fn collect_output_text(response: &Response) -> Res<String> {
    let mut texts = Vec::new();

    for output in &response.output {
        match output {
            OutputContent::Message(message) => {
                for message_content in &message.content {
                    match message_content {
                        Content::OutputText(text) => texts.push(text.text.clone()),
                        Content::Refusal(reason) => {
                            return Err(anyhow::anyhow!("Request refused: {reason:#?}"));
                        }
                    }
                }
            }
            _ => {
                warn!("Unexpected output: {output:#?}");
            }
        }
    }

    if texts.is_empty() {
        return Err(anyhow::anyhow!("Response contained no text output."));
    }

    info!("LLM response has {} text outputs.", texts.len());

    Ok(texts.join("\n"))
}

// Statics.

static OPENAI_INTENT_TEXT_CONFIG: OnceLock<TextConfig> = OnceLock::new();
static OPENAI_VERDICT_TEXT_CONFIG: OnceLock<TextConfig> = OnceLock::new();

/// Strict schema for the intent classifier reply.
fn get_intent_text_config() -> &'static TextConfig {
    OPENAI_INTENT_TEXT_CONFIG.get_or_init(|| TextConfig {
        format: TextResponseFormat::JsonSchema(ResponseFormatJsonSchema {
            name: "TicketIntent".to_string(),
            description: Some("Whether a question is about a service ticket, and which part of it.".to_string()),
            schema: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "is_atendimento": { "type": "boolean" },
                    "ticket_id": { "type": ["integer", "null"] },
                    "consulta": {
                        "type": ["string", "null"],
                        "enum": ["status", "defeito", "descrição", "data", null]
                    }
                },
                "required": ["is_atendimento", "ticket_id", "consulta"],
                "additionalProperties": false
            })),
            strict: Some(true),
        }),
    })
}

/// Strict schema for the weather verdict.
fn get_verdict_text_config() -> &'static TextConfig {
    OPENAI_VERDICT_TEXT_CONFIG.get_or_init(|| TextConfig {
        format: TextResponseFormat::JsonSchema(ResponseFormatJsonSchema {
            name: "WeatherVerdict".to_string(),
            description: Some("Whether the recent weather readings justify an alert.".to_string()),
            schema: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "risk": { "type": "boolean" },
                    "rationale": { "type": "string" }
                },
                "required": ["risk", "rationale"],
                "additionalProperties": false
            })),
            strict: Some(true),
        }),
    })
}

/// Whether the model accepts a strict `json_schema` text format.
///
/// Older chat models reject it with a 400, so they get plain text and the
/// replies are parsed leniently instead.
fn supports_structured_outputs(model: &str) -> bool {
    !(model.starts_with("gpt-3.5") || model == "gpt-4" || model.starts_with("gpt-4-") || model == "gpt-4o-2024-05-13")
}

/// The schema format for models that support it, plain text otherwise.
fn text_config_for(model: &str, schema: &TextConfig) -> TextConfig {
    if supports_structured_outputs(model) {
        schema.clone()
    } else {
        debug!("Model `{model}` does not support structured outputs, requesting plain text.");
        TextConfig { format: TextResponseFormat::Text }
    }
}

/// Convert a string reasoning effort to ReasoningEffort enum.
fn parse_openai_reasoning_effort(effort: &str) -> Res<ReasoningEffort> {
    match effort.to_lowercase().as_str() {
        "low" => Ok(ReasoningEffort::Low),
        "medium" => Ok(ReasoningEffort::Medium),
        "high" => Ok(ReasoningEffort::High),
        _ => Err(crate::base::types::Err::msg(format!("Invalid reasoning effort: {effort}. Must be one of: low, medium, high"))),
    }
}

// Tests.
