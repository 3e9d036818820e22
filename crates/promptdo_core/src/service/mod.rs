//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository and provider calls into use-case level APIs.
//! - Keep the CLI decoupled from storage and transport details.

pub mod assist_service;
pub mod todo_service;
