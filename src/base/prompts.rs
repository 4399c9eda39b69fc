//! Prompt templates, answer templates and alert texts.

use std::fmt::Write;

use crate::base::types::{QueryKind, Ticket, TicketId, WeatherReading};

/// Directive for the ticket intent classifier.
pub const INTENT_SYSTEM_DIRECTIVE: &str = r#####"
Você é um assistente que analisa perguntas para determinar se elas se referem a um atendimento técnico.
Se a pergunta for sobre atendimento, extraia o número do atendimento (um número inteiro) se presente e identifique o tipo de consulta, que pode ser: 'status', 'defeito', 'descrição' ou 'data'.
Caso a pergunta não seja sobre atendimento, retorne is_atendimento como false.
Sua resposta DEVE ser **exclusivamente** um JSON válido, sem qualquer texto adicional, no seguinte formato:
{"is_atendimento": <true ou false>, "ticket_id": <número ou null>, "consulta": <"status", "defeito", "descrição", "data" ou null>}.
"#####;

/// Directive for the general support conversation.
pub const SUPPORT_SYSTEM_DIRECTIVE: &str = r#####"
Você é um assistente virtual especializado no atendimento ao cliente para uma renomada marca de relógios.
Sua função é responder perguntas sobre especificações dos produtos, garantias, manutenções e suporte técnico.
Além disso, você também fornece informações sobre atendimentos na assistência técnica, incluindo status, defeitos relatados e datas dos atendimentos.
Responda sempre de maneira clara e objetiva, priorizando a precisão das informações.
Use os documentos de referência fornecidos sempre que forem relevantes.
Caso a pergunta não esteja relacionada ao atendimento ao cliente, especificações de relógios, garantias, manutenções ou suporte técnico, responda: 'Desculpe, mas não posso responder a esse tipo de pergunta.'
"#####;

/// Directive for the weather analyst.
pub const SENTINEL_SYSTEM_DIRECTIVE: &str = r#####"
Você é um meteorologista IA que analisa dados climáticos e gera alertas personalizados.

Sua tarefa:
1. Identifique se há **mudanças climáticas abruptas ou condições extremas** que justifiquem um alerta.
2. Se houver risco, explique a situação e dê recomendações.
3. Se **não houver mudanças climáticas relevantes**, responda "Nenhum risco identificado."

**Apenas considere risco se houver grandes variações, como quedas abruptas de temperatura, ventos acima de 25km/h ou pressão abaixo de 980 hPa.**

Responda exclusivamente com um JSON no formato {"risk": <true ou false>, "rationale": "<explicação e recomendações>"}.
"#####;

/// Subject line of the alert e-mail.
pub const ALERT_EMAIL_SUBJECT: &str = "⚠️ Alerta Meteorológico!";

/// Asked when a ticket question names no ticket and none is remembered.
pub const ASK_FOR_TICKET_NUMBER: &str = "Por favor, informe o número do atendimento para que eu possa buscar as informações.";

/// Returned to callers that send a malformed `/ask` body.
pub const INVALID_REQUEST: &str = "Requisição inválida. Forneça 'client_id' e 'question'.";

/// Returned to callers when a collaborator fails mid-request.
pub const TEMPORARY_FAILURE: &str = "Não foi possível processar a pergunta no momento.";

/// Answer for a ticket id missing from the store.
pub fn ticket_not_found(ticket_id: TicketId) -> String {
    format!("Não encontrei o atendimento número {ticket_id}. Verifique se o número está correto.")
}

/// Render the answer about a ticket for the kind of question asked.
pub fn ticket_answer(ticket: &Ticket, kind: QueryKind) -> String {
    let id = ticket.id;

    match kind {
        QueryKind::Defect => format!("O defeito registrado no atendimento {id} foi: {}.", ticket.defect),
        QueryKind::Description => format!("A descrição do atendimento {id} é: {}.", ticket.description),
        QueryKind::Date => format!("A data do atendimento {id} foi: {}.", ticket.date),
        QueryKind::Status => format!("O status do atendimento {id} é: {}.", ticket.status),
        QueryKind::General => format!("Olá {}, o status do atendimento {id} é: {}.", ticket.customer_name, ticket.status),
    }
}

/// The user message sent to the intent classifier.
pub fn intent_question(question: &str) -> String {
    format!("Pergunta: \"{question}\"")
}

/// One line per reading, in the order given.
pub fn format_readings(readings: &[WeatherReading]) -> String {
    let mut out = String::new();

    for r in readings {
        let _ = writeln!(
            out,
            "Temp: {}°C, Humidade: {}%, Vento: {}km/h, Pressão: {} hPa, Risco: {}",
            r.temperature, r.humidity, r.wind_speed, r.pressure, r.storm_risk
        );
    }

    out
}

/// The user message sent to the weather analyst.
pub fn weather_question(readings: &[WeatherReading]) -> String {
    format!("Aqui estão as últimas {} leituras do clima (mais recente primeiro):\n\n{}", readings.len(), format_readings(readings))
}

/// Body of the alert e-mail.
pub fn alert_email_body(rationale: &str) -> String {
    format!("🚨 Alerta de Clima!\n\n{rationale}\n\nFique atento e tome as precauções necessárias!")
}

// Tests.
