//! Core components, types, and utilities shared by both agents.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Prompts, answer templates and alert texts.
//! - The deterministic weather risk policy.
//! - Common types and result handling.

pub mod config;
pub mod policy;
pub mod prompts;
pub mod types;
