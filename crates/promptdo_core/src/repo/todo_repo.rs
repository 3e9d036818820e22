//! Todo repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over `todos` and its owned child tables.
//! - Keep SQL details inside core persistence boundary.
//!
//! # Invariants
//! - Write paths must call `Todo::validate()` before SQL mutations.
//! - Read paths must reject invalid persisted state instead of masking it.
//! - New todos get the smallest `position`, so lists read newest first.
//! - Multi-table writes run inside one transaction.

use crate::db::migrations::{current_user_version, latest_version, REQUIRED_TABLES};
use crate::db::DbError;
use crate::model::filter::TodoFilter;
use crate::model::todo::{
    ResearchResult, ResearchSource, Subtask, SubtaskId, Todo, TodoId, TodoValidationError,
};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const TODO_SELECT_SQL: &str = "SELECT
    uuid,
    text,
    completed,
    due_date,
    subtasks_fetched,
    research_summary
FROM todos";

const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for todo persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TodoValidationError),
    Db(DbError),
    NotFound(TodoId),
    SubtaskNotFound {
        todo_id: TodoId,
        subtask_id: SubtaskId,
    },
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "todo not found: {id}"),
            Self::SubtaskNotFound {
                todo_id,
                subtask_id,
            } => write!(f, "subtask {subtask_id} not found in todo {todo_id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted todo data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TodoValidationError> for RepoError {
    fn from(value: TodoValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for todo persistence.
pub trait TodoRepository {
    /// Inserts a todo (with any attached subtasks/research) at the top of the list.
    fn create_todo(&self, todo: &Todo) -> RepoResult<TodoId>;
    fn get_todo(&self, id: TodoId) -> RepoResult<Option<Todo>>;
    /// Lists todos newest first, restricted by `filter`.
    fn list_todos(&self, filter: TodoFilter) -> RepoResult<Vec<Todo>>;
    fn update_text(&self, id: TodoId, text: &str) -> RepoResult<()>;
    fn set_completed(&self, id: TodoId, completed: bool) -> RepoResult<()>;
    /// Hard-deletes a todo and everything it owns.
    fn delete_todo(&self, id: TodoId) -> RepoResult<()>;
    /// Replaces the cached decomposition and marks it fetched.
    fn set_subtasks(&self, id: TodoId, subtasks: &[Subtask]) -> RepoResult<()>;
    fn set_subtask_completed(
        &self,
        todo_id: TodoId,
        subtask_id: SubtaskId,
        completed: bool,
    ) -> RepoResult<()>;
    fn set_research(&self, id: TodoId, research: &ResearchResult) -> RepoResult<()>;
    fn clear_research(&self, id: TodoId) -> RepoResult<()>;
    /// Reads one small UI state value.
    fn load_state(&self, key: &str) -> RepoResult<Option<String>>;
    fn save_state(&self, key: &str, value: &str) -> RepoResult<()>;
}

/// SQLite-backed todo repository.
#[derive(Clone, Copy)]
pub struct SqliteTodoRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTodoRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when migrations were not applied.
    /// - `MissingRequiredTable` when the schema is incomplete.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version = current_user_version(conn)?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }

        for table in REQUIRED_TABLES {
            let exists: bool = conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
                );",
                [table],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(RepoError::MissingRequiredTable(*table));
            }
        }

        Ok(Self { conn })
    }

    fn load_subtasks(&self, id: TodoId) -> RepoResult<Vec<Subtask>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT uuid, text, completed
             FROM subtasks
             WHERE todo_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([id.to_string()])?;
        let mut subtasks = Vec::new();
        while let Some(row) = rows.next()? {
            subtasks.push(Subtask {
                id: parse_uuid(row, "uuid", "subtasks.uuid")?,
                text: row.get("text")?,
                completed: parse_flag(row, "completed", "subtasks.completed")?,
            });
        }
        Ok(subtasks)
    }

    fn load_sources(&self, id: TodoId) -> RepoResult<Vec<ResearchSource>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT uri, title
             FROM research_sources
             WHERE todo_uuid = ?1
             ORDER BY position ASC;",
        )?;
        let sources = stmt
            .query_map([id.to_string()], |row| {
                Ok(ResearchSource {
                    uri: row.get(0)?,
                    title: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    fn hydrate(&self, row: &Row<'_>) -> RepoResult<Todo> {
        let id = parse_uuid(row, "uuid", "todos.uuid")?;

        let due_date = match row.get::<_, Option<String>>("due_date")? {
            Some(value) => Some(
                NaiveDate::parse_from_str(&value, DUE_DATE_FORMAT).map_err(|_| {
                    RepoError::InvalidData(format!("invalid due date `{value}` in todos.due_date"))
                })?,
            ),
            None => None,
        };

        let subtasks = if parse_flag(row, "subtasks_fetched", "todos.subtasks_fetched")? {
            Some(self.load_subtasks(id)?)
        } else {
            None
        };

        let research = match row.get::<_, Option<String>>("research_summary")? {
            Some(summary) => Some(ResearchResult {
                summary,
                sources: self.load_sources(id)?,
            }),
            None => None,
        };

        let todo = Todo {
            id,
            text: row.get("text")?,
            completed: parse_flag(row, "completed", "todos.completed")?,
            due_date,
            subtasks,
            research,
        };
        todo.validate()?;
        Ok(todo)
    }

    fn ensure_exists(&self, id: TodoId) -> RepoResult<()> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM todos WHERE uuid = ?1;",
                [id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        found.ok_or(RepoError::NotFound(id))
    }
}

impl TodoRepository for SqliteTodoRepository<'_> {
    fn create_todo(&self, todo: &Todo) -> RepoResult<TodoId> {
        todo.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO todos (
                uuid,
                text,
                completed,
                due_date,
                position,
                subtasks_fetched,
                research_summary
            ) VALUES (
                ?1, ?2, ?3, ?4,
                (SELECT COALESCE(MIN(position), 0) - 1 FROM todos),
                ?5, ?6
            );",
            params![
                todo.id.to_string(),
                todo.text.as_str(),
                todo.completed,
                todo.due_date
                    .map(|date| date.format(DUE_DATE_FORMAT).to_string()),
                todo.subtasks.is_some(),
                todo.research.as_ref().map(|research| research.summary.as_str()),
            ],
        )?;
        if let Some(subtasks) = &todo.subtasks {
            insert_subtasks(&tx, todo.id, subtasks)?;
        }
        if let Some(research) = &todo.research {
            insert_sources(&tx, todo.id, &research.sources)?;
        }
        tx.commit()?;

        Ok(todo.id)
    }

    fn get_todo(&self, id: TodoId) -> RepoResult<Option<Todo>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TODO_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(self.hydrate(row)?));
        }
        Ok(None)
    }

    fn list_todos(&self, filter: TodoFilter) -> RepoResult<Vec<Todo>> {
        let condition = match filter {
            TodoFilter::All => "",
            TodoFilter::Active => " WHERE completed = 0",
            TodoFilter::Completed => " WHERE completed = 1",
        };
        let mut stmt = self.conn.prepare(&format!(
            "{TODO_SELECT_SQL}{condition} ORDER BY position ASC, uuid ASC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut todos = Vec::new();
        while let Some(row) = rows.next()? {
            todos.push(self.hydrate(row)?);
        }
        Ok(todos)
    }

    fn update_text(&self, id: TodoId, text: &str) -> RepoResult<()> {
        if text.trim().is_empty() {
            return Err(RepoError::Validation(TodoValidationError::EmptyText));
        }

        let changed = self.conn.execute(
            "UPDATE todos
             SET
                text = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), text],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn set_completed(&self, id: TodoId, completed: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE todos
             SET
                completed = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), completed],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn delete_todo(&self, id: TodoId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM todos WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn set_subtasks(&self, id: TodoId, subtasks: &[Subtask]) -> RepoResult<()> {
        let mut candidate = Todo::with_id(id, "-");
        candidate.subtasks = Some(subtasks.to_vec());
        candidate.validate()?;

        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE todos
             SET
                subtasks_fetched = 1,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        tx.execute("DELETE FROM subtasks WHERE todo_uuid = ?1;", [id.to_string()])?;
        insert_subtasks(&tx, id, subtasks)?;
        tx.commit()?;
        Ok(())
    }

    fn set_subtask_completed(
        &self,
        todo_id: TodoId,
        subtask_id: SubtaskId,
        completed: bool,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE subtasks
             SET completed = ?3
             WHERE todo_uuid = ?1 AND uuid = ?2;",
            params![todo_id.to_string(), subtask_id.to_string(), completed],
        )?;
        if changed == 0 {
            self.ensure_exists(todo_id)?;
            return Err(RepoError::SubtaskNotFound {
                todo_id,
                subtask_id,
            });
        }
        Ok(())
    }

    fn set_research(&self, id: TodoId, research: &ResearchResult) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE todos
             SET
                research_summary = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            params![id.to_string(), research.summary.as_str()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        tx.execute(
            "DELETE FROM research_sources WHERE todo_uuid = ?1;",
            [id.to_string()],
        )?;
        insert_sources(&tx, id, &research.sources)?;
        tx.commit()?;
        Ok(())
    }

    fn clear_research(&self, id: TodoId) -> RepoResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE todos
             SET
                research_summary = NULL,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1;",
            [id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        tx.execute(
            "DELETE FROM research_sources WHERE todo_uuid = ?1;",
            [id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn load_state(&self, key: &str) -> RepoResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM app_state WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save_state(&self, key: &str, value: &str) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO app_state (key, value) VALUES (?1, ?2)
             ON CONFLICT (key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, value],
        )?;
        Ok(())
    }
}

fn insert_subtasks(conn: &Connection, todo_id: TodoId, subtasks: &[Subtask]) -> RepoResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO subtasks (uuid, todo_uuid, text, completed, position)
         VALUES (?1, ?2, ?3, ?4, ?5);",
    )?;
    for (position, subtask) in subtasks.iter().enumerate() {
        stmt.execute(params![
            subtask.id.to_string(),
            todo_id.to_string(),
            subtask.text.as_str(),
            subtask.completed,
            position as i64,
        ])?;
    }
    Ok(())
}

fn insert_sources(
    conn: &Connection,
    todo_id: TodoId,
    sources: &[ResearchSource],
) -> RepoResult<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO research_sources (todo_uuid, position, uri, title)
         VALUES (?1, ?2, ?3, ?4);",
    )?;
    for (position, source) in sources.iter().enumerate() {
        stmt.execute(params![
            todo_id.to_string(),
            position as i64,
            source.uri.as_str(),
            source.title.as_str(),
        ])?;
    }
    Ok(())
}

fn parse_uuid(row: &Row<'_>, column: &str, label: &str) -> RepoResult<Uuid> {
    let text: String = row.get(column)?;
    Uuid::parse_str(&text)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{text}` in {label}")))
}

fn parse_flag(row: &Row<'_>, column: &str, label: &str) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {label}"
        ))),
    }
}
