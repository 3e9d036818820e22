//! Todo domain model.
//!
//! # Responsibility
//! - Define the canonical todo record and its owned subtasks/research.
//! - Validate record-level invariants before persistence.
//!
//! # Invariants
//! - `id` is stable and never reused for another todo.
//! - `text` is never empty after trimming.
//! - `subtasks == None` means "never fetched"; `Some(vec![])` is a cached
//!   empty decomposition and must not trigger another fetch.
//! - Subtask ids are unique within their parent todo.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a todo.
pub type TodoId = Uuid;

/// Stable identifier for a subtask, unique within its parent todo.
pub type SubtaskId = Uuid;

/// One actionable step produced by task decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: SubtaskId,
    pub text: String,
    pub completed: bool,
}

impl Subtask {
    /// Creates an open subtask with a generated id.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            completed: false,
        }
    }
}

/// One cited web source attached to a research summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchSource {
    pub uri: String,
    pub title: String,
}

/// Search-grounded summary for a todo topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchResult {
    /// Provider-generated summary text.
    pub summary: String,
    /// Cited sources in provider order.
    pub sources: Vec<ResearchSource>,
}

/// Canonical to-do record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    pub completed: bool,
    /// Calendar due date without time zone.
    pub due_date: Option<NaiveDate>,
    /// Cached decomposition; `None` until the first successful fetch.
    pub subtasks: Option<Vec<Subtask>>,
    /// Cached research; `None` until fetched or after an explicit clear.
    pub research: Option<ResearchResult>,
}

impl Todo {
    /// Creates an open todo with a generated stable ID.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), text)
    }

    /// Creates an open todo with a caller-provided stable ID.
    ///
    /// Used by tests and import paths where identity already exists.
    pub fn with_id(id: TodoId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            completed: false,
            due_date: None,
            subtasks: None,
            research: None,
        }
    }

    /// Sets the due date, builder style.
    pub fn due_on(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self
    }

    /// Returns whether the todo still needs doing.
    pub fn is_active(&self) -> bool {
        !self.completed
    }

    /// Returns whether a decomposition has already been fetched.
    pub fn has_subtasks(&self) -> bool {
        self.subtasks.is_some()
    }

    /// Looks up one subtask by id.
    pub fn subtask(&self, id: SubtaskId) -> Option<&Subtask> {
        self.subtasks.as_ref()?.iter().find(|item| item.id == id)
    }

    /// Checks record-level invariants.
    ///
    /// # Errors
    /// - `EmptyText` when the todo or any subtask text is blank.
    /// - `DuplicateSubtaskId` when two subtasks share an id.
    pub fn validate(&self) -> Result<(), TodoValidationError> {
        if self.text.trim().is_empty() {
            return Err(TodoValidationError::EmptyText);
        }

        if let Some(subtasks) = &self.subtasks {
            let mut seen = HashSet::with_capacity(subtasks.len());
            for subtask in subtasks {
                if subtask.text.trim().is_empty() {
                    return Err(TodoValidationError::EmptySubtaskText(subtask.id));
                }
                if !seen.insert(subtask.id) {
                    return Err(TodoValidationError::DuplicateSubtaskId(subtask.id));
                }
            }
        }

        Ok(())
    }
}

/// Validation failures for todo records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoValidationError {
    EmptyText,
    EmptySubtaskText(SubtaskId),
    DuplicateSubtaskId(SubtaskId),
}

impl Display for TodoValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "todo text cannot be empty"),
            Self::EmptySubtaskText(id) => write!(f, "subtask {id} has empty text"),
            Self::DuplicateSubtaskId(id) => write!(f, "duplicate subtask id {id}"),
        }
    }
}

impl Error for TodoValidationError {}
