//! Core domain logic for PromptDo.
//! This crate is the single source of truth for todo invariants and the
//! AI assistance contract.

pub mod assist;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use assist::{AssistError, AssistProvider, GeminiClient, SpeechAudio, SubtaskDraft};
pub use config::{AppConfig, ConfigError, GeminiSettings};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::due::{is_due_alert, select_due_alerts, DueAlertTracker, DueStatus};
pub use model::filter::TodoFilter;
pub use model::todo::{
    ResearchResult, ResearchSource, Subtask, SubtaskId, Todo, TodoId, TodoValidationError,
};
pub use repo::todo_repo::{RepoError, RepoResult, SqliteTodoRepository, TodoRepository};
pub use service::assist_service::{
    AssistAction, AssistService, AssistServiceError, AssistServiceResult, Assisted,
};
pub use service::todo_service::{
    AlertSnapshot, EditOutcome, TodoService, TodoServiceError, TodoServiceResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
