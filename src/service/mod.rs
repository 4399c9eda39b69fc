//! Service integrations for external APIs and clients.
//!
//! This module contains implementations for the services both agents use:
//! - Database services (e.g., SurrealDB)
//! - LLM services (e.g., OpenAI)
//! - E-mail alerts (SMTP)
//! - Reference document retrieval
//! - Client session state
//! - Weather feeds (HTTP, plus a simulator)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod db;
pub mod llm;
pub mod mailer;
pub mod retrieval;
pub mod session;
pub mod weather;
