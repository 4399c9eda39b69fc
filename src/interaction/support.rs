//! The support agent: ticket questions answered from the store, everything
//! else from the conversational fallback.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::{
    base::{
        prompts,
        types::{ClassificationResult, Res, SupportContext},
    },
    service::{db::DbClient, llm::LlmClient, retrieval::Retriever, session::SessionStore},
};

/// Body of `POST /ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub client_id: String,
    pub question: String,
}

/// Successful reply of `POST /ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

/// Error reply of `POST /ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Everything the support agent needs to answer a question.
///
/// This is trivially cloneable, so it doubles as the axum router state.
#[derive(Clone)]
pub struct SupportAgent {
    db: DbClient,
    llm: LlmClient,
    sessions: SessionStore,
    retriever: Retriever,
    retrieval_top_k: usize,
}

impl SupportAgent {
    pub fn new(db: DbClient, llm: LlmClient, sessions: SessionStore, retriever: Retriever, retrieval_top_k: usize) -> Self {
        Self {
            db,
            llm,
            sessions,
            retriever,
            retrieval_top_k,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Answer one client question.
    #[instrument(skip(self, question))]
    pub async fn answer(&self, client_id: &str, question: &str) -> Res<String> {
        let classification = match self.llm.classify_ticket_intent(question).await {
            Ok(classification) => classification,
            Err(err) => {
                warn!("Intent classification failed, treating as a general question: {err}");
                ClassificationResult::not_a_ticket()
            }
        };

        if classification.is_ticket {
            self.answer_ticket_question(client_id, &classification).await
        } else {
            self.answer_general_question(client_id, question).await
        }
    }

    /// Answer a question the classifier attributed to a ticket.
    #[instrument(skip(self))]
    pub async fn answer_ticket_question(&self, client_id: &str, classification: &ClassificationResult) -> Res<String> {
        // Ticket 0 is never valid; treat it like a missing number.
        let named = classification.ticket_id.filter(|id| *id != 0);

        let Some(ticket_id) = named.or_else(|| self.sessions.last_ticket(client_id)) else {
            info!("No ticket number given or remembered.");
            return Ok(prompts::ASK_FOR_TICKET_NUMBER.to_string());
        };

        let Some(ticket) = self.db.get_ticket(ticket_id).await? else {
            info!("Ticket {ticket_id} not found.");
            return Ok(prompts::ticket_not_found(ticket_id));
        };

        self.sessions.set_last_ticket(client_id, ticket_id);

        Ok(prompts::ticket_answer(&ticket, classification.query_kind))
    }

    /// Answer a general question from reference documents and the conversation so far.
    #[instrument(skip(self, question))]
    pub async fn answer_general_question(&self, client_id: &str, question: &str) -> Res<String> {
        let documents = self.retriever.retrieve(question, self.retrieval_top_k).await?;

        let context = SupportContext {
            question: question.to_string(),
            history: self.sessions.history(client_id),
            documents,
        };

        let answer = self.llm.get_support_agent_response(&context).await?;

        self.sessions.append_exchange(client_id, question, &answer);

        Ok(answer)
    }
}

/// Router serving `POST /ask`.
pub fn router(agent: SupportAgent) -> Router {
    Router::new().route("/ask", post(handle_ask)).with_state(agent)
}

#[instrument(skip_all)]
async fn handle_ask(State(agent): State<SupportAgent>, payload: Result<Json<AskRequest>, JsonRejection>) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected malformed request: {rejection}");
            return error_response(StatusCode::BAD_REQUEST, prompts::INVALID_REQUEST);
        }
    };

    match agent.answer(&request.client_id, &request.question).await {
        Ok(answer) => Json(AskResponse { answer }).into_response(),
        Err(err) => {
            error!("Error while answering: {err:#}");
            error_response(StatusCode::BAD_GATEWAY, prompts::TEMPORARY_FAILURE)
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(ErrorResponse { error: message.to_string() })).into_response()
}
