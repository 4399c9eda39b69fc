//! Request handling and the sentinel loop.
//!
//! This module coordinates the services (LLM, database, sessions, mail):
//! - Answering support questions over `POST /ask`
//! - Running the fetch → persist → analyze → alert cycle

pub mod sentinel;
pub mod support;
