//! AI-assisted todo use-cases.
//!
//! # Responsibility
//! - Fetch and cache task decompositions and research per todo.
//! - Compose the spoken summary of active todos.
//!
//! # Invariants
//! - Cached subtasks/research are returned without a provider call.
//! - A failed provider call leaves the todo unchanged.
//! - Provider errors carry the user-facing action that failed.

use crate::assist::{AssistError, AssistProvider, SpeechAudio, SubtaskDraft};
use crate::model::filter::TodoFilter;
use crate::model::todo::{Subtask, Todo, TodoId};
use crate::repo::todo_repo::{RepoError, TodoRepository};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

const SPOKEN_SEPARATOR: &str = ". ";

/// User-facing AI action, used to phrase failure notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistAction {
    BreakDown,
    Research,
    ReadAloud,
}

impl AssistAction {
    fn as_str(self) -> &'static str {
        match self {
            Self::BreakDown => "break_down",
            Self::Research => "research",
            Self::ReadAloud => "read_aloud",
        }
    }

    /// Notice shown to the user when the action fails.
    pub fn failure_notice(self) -> &'static str {
        match self {
            Self::BreakDown => "Failed to break down task.",
            Self::Research => "Failed to research topic.",
            Self::ReadAloud => "Failed to read todos aloud.",
        }
    }
}

/// Service error for AI-assisted use-cases.
#[derive(Debug)]
pub enum AssistServiceError {
    TodoNotFound(TodoId),
    /// No active todos to speak.
    NothingToRead,
    Provider {
        action: AssistAction,
        source: AssistError,
    },
    Repo(RepoError),
}

impl Display for AssistServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TodoNotFound(id) => write!(f, "todo not found: {id}"),
            Self::NothingToRead => write!(f, "No active todos to read."),
            Self::Provider { action, source } => {
                write!(f, "{} {source}", action.failure_notice())
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AssistServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Provider { source, .. } => Some(source),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for AssistServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TodoNotFound(id),
            other => Self::Repo(other),
        }
    }
}

pub type AssistServiceResult<T> = Result<T, AssistServiceError>;

/// A todo plus whether this call reached the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assisted {
    pub todo: Todo,
    /// `false` when the cached value was returned.
    pub fetched: bool,
}

/// Service combining persistence with an AI provider.
pub struct AssistService<R: TodoRepository, P: AssistProvider> {
    repo: R,
    provider: P,
}

impl<R: TodoRepository, P: AssistProvider> AssistService<R, P> {
    pub fn new(repo: R, provider: P) -> Self {
        Self { repo, provider }
    }

    fn load(&self, id: TodoId) -> AssistServiceResult<Todo> {
        self.repo
            .get_todo(id)?
            .ok_or(AssistServiceError::TodoNotFound(id))
    }

    fn call<T>(
        &self,
        action: AssistAction,
        op: impl FnOnce(&P) -> Result<T, AssistError>,
    ) -> AssistServiceResult<T> {
        let started_at = Instant::now();
        match op(&self.provider) {
            Ok(value) => {
                info!(
                    "event=assist_call module=service action={} status=ok duration_ms={}",
                    action.as_str(),
                    started_at.elapsed().as_millis()
                );
                Ok(value)
            }
            Err(source) => {
                error!(
                    "event=assist_call module=service action={} status=error duration_ms={} error={source}",
                    action.as_str(),
                    started_at.elapsed().as_millis()
                );
                Err(AssistServiceError::Provider { action, source })
            }
        }
    }

    /// Returns cached subtasks or fetches and caches a new decomposition.
    pub fn break_down(&self, id: TodoId) -> AssistServiceResult<Assisted> {
        let todo = self.load(id)?;
        if todo.has_subtasks() {
            return Ok(Assisted {
                todo,
                fetched: false,
            });
        }

        let drafts = self.call(AssistAction::BreakDown, |provider| {
            provider.break_down(&todo.text)
        })?;
        let subtasks = subtasks_from_drafts(drafts);
        self.repo.set_subtasks(id, &subtasks)?;

        Ok(Assisted {
            todo: self.load(id)?,
            fetched: true,
        })
    }

    /// Returns cached research or fetches and caches a new summary.
    pub fn research(&self, id: TodoId) -> AssistServiceResult<Assisted> {
        let todo = self.load(id)?;
        if todo.research.is_some() {
            return Ok(Assisted {
                todo,
                fetched: false,
            });
        }

        let research = self.call(AssistAction::Research, |provider| {
            provider.research(&todo.text)
        })?;
        self.repo.set_research(id, &research)?;

        Ok(Assisted {
            todo: self.load(id)?,
            fetched: true,
        })
    }

    /// Synthesizes speech for all active todos in list order.
    pub fn read_aloud(&self) -> AssistServiceResult<SpeechAudio> {
        let active = self.repo.list_todos(TodoFilter::Active)?;
        let text = spoken_list(&active);
        if text.is_empty() {
            return Err(AssistServiceError::NothingToRead);
        }
        self.call(AssistAction::ReadAloud, |provider| provider.speak(&text))
    }
}

/// Joins todo texts into one sentence sequence for speech.
pub fn spoken_list(todos: &[Todo]) -> String {
    todos
        .iter()
        .map(|todo| todo.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(SPOKEN_SEPARATOR)
}

fn subtasks_from_drafts(drafts: Vec<SubtaskDraft>) -> Vec<Subtask> {
    drafts
        .into_iter()
        .filter_map(|draft| {
            let text = draft.text.trim();
            if text.is_empty() {
                return None;
            }
            Some(Subtask {
                id: Uuid::new_v4(),
                text: text.to_string(),
                completed: draft.completed,
            })
        })
        .collect()
}
