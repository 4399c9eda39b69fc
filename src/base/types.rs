use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// Identifier of a service ticket.
pub type TicketId = i64;

// Support agent.

/// A customer-service case record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    #[serde(rename = "cliente_nome")]
    pub customer_name: String,
    #[serde(rename = "defeito")]
    pub defect: String,
    #[serde(rename = "descricao")]
    pub description: String,
    pub status: String,
    #[serde(rename = "data")]
    pub date: String,
}

/// The piece of ticket information a question asks about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "Option<String>")]
pub enum QueryKind {
    Status,
    Defect,
    Description,
    Date,
    /// No kind given, or one we do not recognize.
    #[default]
    General,
}

impl FromStr for QueryKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "status" => QueryKind::Status,
            "defeito" => QueryKind::Defect,
            "descrição" | "descricao" => QueryKind::Description,
            "data" => QueryKind::Date,
            _ => QueryKind::General,
        })
    }
}

impl From<Option<String>> for QueryKind {
    fn from(value: Option<String>) -> Self {
        value.map(|v| v.parse().unwrap_or_default()).unwrap_or_default()
    }
}

impl From<QueryKind> for Option<String> {
    fn from(kind: QueryKind) -> Self {
        let wire = match kind {
            QueryKind::Status => "status",
            QueryKind::Defect => "defeito",
            QueryKind::Description => "descrição",
            QueryKind::Date => "data",
            QueryKind::General => return None,
        };

        Some(wire.to_string())
    }
}

/// What the intent classifier made of a question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    #[serde(rename = "is_atendimento")]
    pub is_ticket: bool,
    #[serde(default)]
    pub ticket_id: Option<TicketId>,
    #[serde(rename = "consulta", default)]
    pub query_kind: QueryKind,
}

impl ClassificationResult {
    /// The classification used whenever the model reply cannot be trusted.
    pub fn not_a_ticket() -> Self {
        Self::default()
    }

    /// Parse a raw model reply.
    ///
    /// Models occasionally wrap JSON in a code fence even when told not to, so the
    /// fence is stripped before parsing.
    pub fn parse(reply: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(strip_code_fence(reply))
    }
}

/// Typed failure of the intent classifier.
#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("language model unreachable: {0}")]
    Transport(#[source] Err),
    #[error("unparsable classification reply `{reply}`: {source}")]
    Parse {
        reply: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of a client's running conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: ChatRole::Assistant, content: content.into() }
    }
}

/// A reference document available to the conversational fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub content: String,
}

/// Everything the support agent sends to the model for a general question.
#[derive(Debug, Clone, Default)]
pub struct SupportContext {
    pub question: String,
    pub history: Vec<ChatTurn>,
    pub documents: Vec<Document>,
}

// Weather sentinel.

/// One weather measurement, as served by the weather feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature: f64,
    pub humidity: i64,
    pub wind_speed: f64,
    pub pressure: f64,
    pub storm_risk: bool,
}

/// A persisted reading with the timestamp assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedReading {
    pub reading: WeatherReading,
    pub timestamp: DateTime<Utc>,
}

/// The risk decision over a window of readings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherVerdict {
    pub risk: bool,
    pub rationale: String,
}

impl WeatherVerdict {
    /// Phrase the model uses to say the readings are fine.
    pub const NO_RISK_PHRASE: &'static str = "nenhum risco";

    /// Parse a model reply, accepting either the structured verdict or free text.
    ///
    /// Free text is judged by the legacy rule: risk unless it says "nenhum risco".
    pub fn from_reply(reply: &str) -> Self {
        if let Ok(verdict) = serde_json::from_str::<WeatherVerdict>(strip_code_fence(reply)) {
            return verdict;
        }

        Self::from_free_text(reply)
    }

    pub fn from_free_text(text: &str) -> Self {
        let text = text.trim();
        let risk = !text.to_lowercase().contains(Self::NO_RISK_PHRASE);

        Self { risk, rationale: text.to_string() }
    }
}

/// Remove a surrounding markdown code fence, if any.
fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);

    rest.strip_suffix("```").unwrap_or(rest).trim()
}

// Tests.
