//! Todo use-case service.
//!
//! # Responsibility
//! - Provide add/toggle/edit/delete/list entry points for callers.
//! - Resolve short id prefixes typed by users.
//! - Maintain the persisted due-alert banner state.
//!
//! # Invariants
//! - Stored text is trimmed and never blank.
//! - A blank edit deletes the todo instead of storing empty text.
//! - Completed todos are read-only for text edits.

use crate::model::due::{select_due_alerts, DueAlertTracker};
use crate::model::filter::TodoFilter;
use crate::model::todo::{SubtaskId, Todo, TodoId};
use crate::repo::todo_repo::{RepoError, TodoRepository};
use chrono::NaiveDate;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ALERT_STATE_KEY: &str = "due_alert_tracker";

/// Service error for todo use-cases.
#[derive(Debug)]
pub enum TodoServiceError {
    /// Submitted text is blank after trimming.
    EmptyText,
    TodoNotFound(TodoId),
    SubtaskNotFound {
        todo_id: TodoId,
        subtask_id: SubtaskId,
    },
    /// Id or prefix matched nothing.
    UnknownId(String),
    /// Id prefix matched more than one record.
    AmbiguousId(String),
    /// Text edits are disabled on completed todos.
    CompletedTodo(TodoId),
    Repo(RepoError),
}

impl Display for TodoServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyText => write!(f, "todo text cannot be empty"),
            Self::TodoNotFound(id) => write!(f, "todo not found: {id}"),
            Self::SubtaskNotFound {
                todo_id,
                subtask_id,
            } => write!(f, "subtask {subtask_id} not found in todo {todo_id}"),
            Self::UnknownId(input) => write!(f, "no item matches id `{input}`"),
            Self::AmbiguousId(input) => {
                write!(f, "id prefix `{input}` matches several items; type more characters")
            }
            Self::CompletedTodo(id) => write!(f, "todo {id} is completed; reopen it to edit"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TodoServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for TodoServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TodoNotFound(id),
            RepoError::SubtaskNotFound {
                todo_id,
                subtask_id,
            } => Self::SubtaskNotFound {
                todo_id,
                subtask_id,
            },
            other => Self::Repo(other),
        }
    }
}

pub type TodoServiceResult<T> = Result<T, TodoServiceError>;

/// Result of a text edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Updated(Todo),
    /// Blank text removed the todo.
    Deleted(TodoId),
}

/// Alert view for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSnapshot {
    /// Alerting todos in list order.
    pub alerts: Vec<Todo>,
    /// Banner text, `None` when dismissed or nothing is alerting.
    pub banner: Option<String>,
}

/// Todo service facade over repository implementations.
pub struct TodoService<R: TodoRepository> {
    repo: R,
}

impl<R: TodoRepository> TodoService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Adds a todo at the top of the list.
    pub fn add_todo(
        &self,
        text: &str,
        due_date: Option<NaiveDate>,
    ) -> TodoServiceResult<Todo> {
        let text = text.trim();
        if text.is_empty() {
            return Err(TodoServiceError::EmptyText);
        }

        let todo = Todo::new(text).due_on(due_date);
        self.repo.create_todo(&todo)?;
        info!(
            "event=todo_create module=service status=ok has_due_date={}",
            todo.due_date.is_some()
        );
        Ok(todo)
    }

    pub fn get_todo(&self, id: TodoId) -> TodoServiceResult<Todo> {
        self.repo
            .get_todo(id)?
            .ok_or(TodoServiceError::TodoNotFound(id))
    }

    pub fn list_todos(&self, filter: TodoFilter) -> TodoServiceResult<Vec<Todo>> {
        Ok(self.repo.list_todos(filter)?)
    }

    /// Flips completion and returns the new state.
    pub fn toggle_todo(&self, id: TodoId) -> TodoServiceResult<bool> {
        let todo = self.get_todo(id)?;
        let completed = !todo.completed;
        self.repo.set_completed(id, completed)?;
        info!("event=todo_toggle module=service status=ok completed={completed}");
        Ok(completed)
    }

    /// Replaces the text, or deletes the todo when `text` is blank.
    pub fn edit_todo(&self, id: TodoId, text: &str) -> TodoServiceResult<EditOutcome> {
        let mut todo = self.get_todo(id)?;
        if todo.completed {
            return Err(TodoServiceError::CompletedTodo(id));
        }

        let text = text.trim();
        if text.is_empty() {
            self.repo.delete_todo(id)?;
            info!("event=todo_edit module=service status=ok outcome=deleted");
            return Ok(EditOutcome::Deleted(id));
        }

        self.repo.update_text(id, text)?;
        todo.text = text.to_string();
        info!("event=todo_edit module=service status=ok outcome=updated");
        Ok(EditOutcome::Updated(todo))
    }

    pub fn delete_todo(&self, id: TodoId) -> TodoServiceResult<()> {
        self.repo.delete_todo(id)?;
        info!("event=todo_delete module=service status=ok");
        Ok(())
    }

    /// Flips one subtask and returns the refreshed parent todo.
    pub fn toggle_subtask(
        &self,
        todo_id: TodoId,
        subtask_id: SubtaskId,
    ) -> TodoServiceResult<Todo> {
        let todo = self.get_todo(todo_id)?;
        let subtask = todo
            .subtask(subtask_id)
            .ok_or(TodoServiceError::SubtaskNotFound {
                todo_id,
                subtask_id,
            })?;
        self.repo
            .set_subtask_completed(todo_id, subtask_id, !subtask.completed)?;
        self.get_todo(todo_id)
    }

    /// Drops cached research; needs no provider, so it works without an API key.
    pub fn clear_research(&self, id: TodoId) -> TodoServiceResult<Todo> {
        self.repo.clear_research(id)?;
        info!("event=research_clear module=service status=ok");
        self.get_todo(id)
    }

    /// Resolves a full id or a unique prefix of a todo id.
    pub fn resolve_id(&self, input: &str) -> TodoServiceResult<TodoId> {
        let todos = self.repo.list_todos(TodoFilter::All)?;
        resolve_prefix(input, todos.iter().map(|todo| todo.id))
    }

    /// Resolves a full id or a unique prefix of a subtask id within one todo.
    pub fn resolve_subtask_id(&self, todo_id: TodoId, input: &str) -> TodoServiceResult<SubtaskId> {
        let todo = self.get_todo(todo_id)?;
        let ids = todo
            .subtasks
            .iter()
            .flatten()
            .map(|subtask| subtask.id)
            .collect::<Vec<_>>();
        resolve_prefix(input, ids)
    }

    /// Computes alerts for `today` and updates the persisted banner state.
    pub fn alert_snapshot(&self, today: NaiveDate) -> TodoServiceResult<AlertSnapshot> {
        let (alerts, tracker) = self.refresh_alerts(today, false)?;
        Ok(AlertSnapshot {
            alerts,
            banner: tracker.banner(),
        })
    }

    /// Hides the banner until the set of alerting todos changes.
    pub fn dismiss_alert_banner(&self, today: NaiveDate) -> TodoServiceResult<()> {
        self.refresh_alerts(today, true)?;
        Ok(())
    }

    fn refresh_alerts(
        &self,
        today: NaiveDate,
        dismiss: bool,
    ) -> TodoServiceResult<(Vec<Todo>, DueAlertTracker)> {
        let todos = self.repo.list_todos(TodoFilter::Active)?;
        let alerts: Vec<Todo> = select_due_alerts(&todos, today)
            .into_iter()
            .cloned()
            .collect();

        let mut tracker = self.load_tracker()?;
        let mut changed = tracker.refresh(alerts.iter().map(|todo| todo.id));
        if dismiss {
            tracker.dismiss();
            changed = true;
        }
        if changed {
            self.save_tracker(&tracker)?;
        }
        Ok((alerts, tracker))
    }

    fn load_tracker(&self) -> TodoServiceResult<DueAlertTracker> {
        let Some(raw) = self.repo.load_state(ALERT_STATE_KEY)? else {
            return Ok(DueAlertTracker::default());
        };
        match serde_json::from_str(&raw) {
            Ok(tracker) => Ok(tracker),
            Err(err) => {
                warn!("event=alert_state_load module=service status=reset error={err}");
                Ok(DueAlertTracker::default())
            }
        }
    }

    fn save_tracker(&self, tracker: &DueAlertTracker) -> TodoServiceResult<()> {
        let raw = serde_json::to_string(tracker).map_err(|err| {
            TodoServiceError::Repo(RepoError::InvalidData(format!(
                "failed to encode alert state: {err}"
            )))
        })?;
        self.repo.save_state(ALERT_STATE_KEY, &raw)?;
        Ok(())
    }
}

fn resolve_prefix<I>(input: &str, ids: I) -> TodoServiceResult<Uuid>
where
    I: IntoIterator<Item = Uuid>,
{
    let needle = input.trim().to_ascii_lowercase();
    if needle.is_empty() {
        return Err(TodoServiceError::UnknownId(input.to_string()));
    }

    let mut matched = None;
    for id in ids {
        if !id.to_string().starts_with(&needle) {
            continue;
        }
        if matched.is_some() {
            return Err(TodoServiceError::AmbiguousId(input.to_string()));
        }
        matched = Some(id);
    }
    matched.ok_or_else(|| TodoServiceError::UnknownId(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::{resolve_prefix, TodoServiceError};
    use uuid::Uuid;

    fn id(text: &str) -> Uuid {
        Uuid::parse_str(text).unwrap()
    }

    #[test]
    fn prefix_resolution_requires_unique_match() {
        let a = id("aaaa0000-0000-4000-8000-000000000001");
        let b = id("aaab0000-0000-4000-8000-000000000002");

        assert_eq!(resolve_prefix("aaaa", [a, b]).unwrap(), a);
        assert_eq!(resolve_prefix("AAAB", [a, b]).unwrap(), b);
        assert!(matches!(
            resolve_prefix("aaa", [a, b]),
            Err(TodoServiceError::AmbiguousId(_))
        ));
        assert!(matches!(
            resolve_prefix("ffff", [a, b]),
            Err(TodoServiceError::UnknownId(_))
        ));
        assert!(matches!(
            resolve_prefix("  ", [a, b]),
            Err(TodoServiceError::UnknownId(_))
        ));
    }
}
