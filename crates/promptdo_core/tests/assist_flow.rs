use promptdo_core::db::open_db_in_memory;
use promptdo_core::{
    AssistAction, AssistError, AssistProvider, AssistService, AssistServiceError, ResearchResult,
    ResearchSource, SpeechAudio, SqliteTodoRepository, SubtaskDraft, TodoService,
};
use std::cell::{Cell, RefCell};

/// Scripted provider that records every call.
#[derive(Default)]
struct FakeProvider {
    fail: bool,
    break_down_calls: Cell<usize>,
    research_calls: Cell<usize>,
    spoken: RefCell<Vec<String>>,
}

impl FakeProvider {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn outage(&self) -> AssistError {
        AssistError::Status {
            code: 503,
            message: "UNAVAILABLE: overloaded".to_string(),
        }
    }
}

impl AssistProvider for FakeProvider {
    fn break_down(&self, task_text: &str) -> Result<Vec<SubtaskDraft>, AssistError> {
        self.break_down_calls.set(self.break_down_calls.get() + 1);
        if self.fail {
            return Err(self.outage());
        }
        Ok(vec![
            SubtaskDraft {
                text: format!("outline {task_text}"),
                completed: false,
            },
            SubtaskDraft {
                text: format!("finish {task_text}"),
                completed: false,
            },
        ])
    }

    fn research(&self, topic: &str) -> Result<ResearchResult, AssistError> {
        self.research_calls.set(self.research_calls.get() + 1);
        if self.fail {
            return Err(self.outage());
        }
        Ok(ResearchResult {
            summary: format!("About {topic}."),
            sources: vec![ResearchSource {
                uri: "https://example.com/a".to_string(),
                title: "Source A".to_string(),
            }],
        })
    }

    fn speak(&self, text: &str) -> Result<SpeechAudio, AssistError> {
        self.spoken.borrow_mut().push(text.to_string());
        if self.fail {
            return Err(AssistError::EmptyAudio);
        }
        Ok(SpeechAudio::from_inline(Some("audio/L16;rate=24000"), vec![0; 8]))
    }
}

#[test]
fn break_down_fetches_once_then_serves_cache() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    let todo = TodoService::new(repo).add_todo("essay", None).unwrap();
    let provider = FakeProvider::default();
    let service = AssistService::new(repo, &provider);

    let first = service.break_down(todo.id).unwrap();
    assert!(first.fetched);
    let subtasks = first.todo.subtasks.clone().unwrap();
    assert_eq!(subtasks.len(), 2);
    assert_eq!(subtasks[0].text, "outline essay");

    let second = service.break_down(todo.id).unwrap();
    assert!(!second.fetched);
    assert_eq!(second.todo.subtasks.unwrap(), subtasks);
    assert_eq!(provider.break_down_calls.get(), 1);
}

#[test]
fn research_is_cached_until_cleared() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    let todos = TodoService::new(repo);
    let todo = todos.add_todo("solar panels", None).unwrap();
    let provider = FakeProvider::default();
    let service = AssistService::new(repo, &provider);

    let first = service.research(todo.id).unwrap();
    assert!(first.fetched);
    assert_eq!(
        first.todo.research.as_ref().unwrap().summary,
        "About solar panels."
    );
    assert!(!service.research(todo.id).unwrap().fetched);
    assert_eq!(provider.research_calls.get(), 1);

    let cleared = todos.clear_research(todo.id).unwrap();
    assert!(cleared.research.is_none());
    assert!(service.research(todo.id).unwrap().fetched);
    assert_eq!(provider.research_calls.get(), 2);
}

#[test]
fn provider_failure_leaves_todo_unchanged() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    let todos = TodoService::new(repo);
    let todo = todos.add_todo("garden", None).unwrap();
    let provider = FakeProvider::failing();
    let service = AssistService::new(repo, &provider);

    let err = service.break_down(todo.id).unwrap_err();
    assert!(matches!(
        err,
        AssistServiceError::Provider {
            action: AssistAction::BreakDown,
            ..
        }
    ));
    assert!(err.to_string().starts_with("Failed to break down task."));

    let err = service.research(todo.id).unwrap_err();
    assert!(err.to_string().starts_with("Failed to research topic."));

    let stored = todos.get_todo(todo.id).unwrap();
    assert!(stored.subtasks.is_none());
    assert!(stored.research.is_none());

    // nothing was cached, so a retry reaches the provider again
    let _ = service.break_down(todo.id);
    assert_eq!(provider.break_down_calls.get(), 2);
}

#[test]
fn read_aloud_speaks_active_todos_newest_first() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    let todos = TodoService::new(repo);
    todos.add_todo("feed cat", None).unwrap();
    let done = todos.add_todo("wash car", None).unwrap();
    todos.add_todo("buy bread", None).unwrap();
    todos.toggle_todo(done.id).unwrap();

    let provider = FakeProvider::default();
    let service = AssistService::new(repo, &provider);
    let audio = service.read_aloud().unwrap();

    assert!(!audio.is_empty());
    assert_eq!(
        provider.spoken.borrow().as_slice(),
        ["buy bread. feed cat".to_string()]
    );
}

#[test]
fn read_aloud_without_active_todos_skips_provider() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    let todos = TodoService::new(repo);
    let only = todos.add_todo("finished", None).unwrap();
    todos.toggle_todo(only.id).unwrap();

    let provider = FakeProvider::default();
    let service = AssistService::new(repo, &provider);
    assert!(matches!(
        service.read_aloud(),
        Err(AssistServiceError::NothingToRead)
    ));
    assert!(provider.spoken.borrow().is_empty());
}

#[test]
fn read_aloud_failure_uses_read_notice() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    TodoService::new(repo).add_todo("stretch", None).unwrap();

    let provider = FakeProvider::failing();
    let service = AssistService::new(repo, &provider);
    let err = service.read_aloud().unwrap_err();
    assert!(err.to_string().starts_with("Failed to read todos aloud."));
}

#[test]
fn unknown_todo_is_reported_before_provider_call() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    let provider = FakeProvider::default();
    let service = AssistService::new(repo, &provider);

    let missing = uuid::Uuid::new_v4();
    assert!(matches!(
        service.break_down(missing),
        Err(AssistServiceError::TodoNotFound(id)) if id == missing
    ));
    assert_eq!(provider.break_down_calls.get(), 0);
}
