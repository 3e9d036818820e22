use chrono::NaiveDate;
use promptdo_core::db::open_db_in_memory;
use promptdo_core::{
    EditOutcome, RepoError, ResearchResult, ResearchSource, SqliteTodoRepository, Subtask, Todo,
    TodoFilter, TodoRepository, TodoService, TodoServiceError,
};
use std::collections::HashSet;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn create_and_get_roundtrip_with_attachments() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();

    let mut todo = Todo::new("plan trip").due_on(Some(date(2024, 5, 1)));
    todo.subtasks = Some(vec![Subtask::new("book flights"), Subtask::new("pack")]);
    todo.research = Some(ResearchResult {
        summary: "Lisbon is nice in May.".to_string(),
        sources: vec![ResearchSource {
            uri: "https://example.com/lisbon".to_string(),
            title: "Lisbon guide".to_string(),
        }],
    });
    repo.create_todo(&todo).unwrap();

    let loaded = repo.get_todo(todo.id).unwrap().unwrap();
    assert_eq!(loaded, todo);
}

#[test]
fn unfetched_and_empty_subtasks_are_distinct() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();

    let todo = Todo::new("tiny task");
    repo.create_todo(&todo).unwrap();
    assert_eq!(repo.get_todo(todo.id).unwrap().unwrap().subtasks, None);

    repo.set_subtasks(todo.id, &[]).unwrap();
    assert_eq!(
        repo.get_todo(todo.id).unwrap().unwrap().subtasks,
        Some(Vec::new())
    );
}

#[test]
fn list_is_newest_first_and_filterable() {
    let conn = open_db_in_memory().unwrap();
    let service = TodoService::new(SqliteTodoRepository::try_new(&conn).unwrap());

    let first = service.add_todo("first", None).unwrap();
    let second = service.add_todo("second", None).unwrap();
    let third = service.add_todo("third", None).unwrap();
    service.toggle_todo(second.id).unwrap();

    let all: Vec<_> = service
        .list_todos(TodoFilter::All)
        .unwrap()
        .into_iter()
        .map(|todo| todo.id)
        .collect();
    assert_eq!(all, vec![third.id, second.id, first.id]);

    let active: Vec<_> = service
        .list_todos(TodoFilter::Active)
        .unwrap()
        .into_iter()
        .map(|todo| todo.id)
        .collect();
    assert_eq!(active, vec![third.id, first.id]);

    let completed = service.list_todos(TodoFilter::Completed).unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].id, second.id);
}

#[test]
fn add_trims_text_and_rejects_blank() {
    let conn = open_db_in_memory().unwrap();
    let service = TodoService::new(SqliteTodoRepository::try_new(&conn).unwrap());

    let todo = service
        .add_todo("  water plants  ", Some(date(2024, 6, 1)))
        .unwrap();
    assert_eq!(todo.text, "water plants");
    assert_eq!(service.get_todo(todo.id).unwrap().due_date, Some(date(2024, 6, 1)));

    assert!(matches!(
        service.add_todo("   ", None),
        Err(TodoServiceError::EmptyText)
    ));
    assert_eq!(service.list_todos(TodoFilter::All).unwrap().len(), 1);
}

#[test]
fn toggle_flips_completion_twice() {
    let conn = open_db_in_memory().unwrap();
    let service = TodoService::new(SqliteTodoRepository::try_new(&conn).unwrap());

    let todo = service.add_todo("stretch", None).unwrap();
    assert!(service.toggle_todo(todo.id).unwrap());
    assert!(service.get_todo(todo.id).unwrap().completed);
    assert!(!service.toggle_todo(todo.id).unwrap());
    assert!(!service.get_todo(todo.id).unwrap().completed);
}

#[test]
fn edit_updates_text_and_blank_edit_deletes() {
    let conn = open_db_in_memory().unwrap();
    let service = TodoService::new(SqliteTodoRepository::try_new(&conn).unwrap());

    let todo = service.add_todo("draft", None).unwrap();
    match service.edit_todo(todo.id, "  final text ").unwrap() {
        EditOutcome::Updated(updated) => assert_eq!(updated.text, "final text"),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(service.get_todo(todo.id).unwrap().text, "final text");

    assert_eq!(
        service.edit_todo(todo.id, "   ").unwrap(),
        EditOutcome::Deleted(todo.id)
    );
    assert!(matches!(
        service.get_todo(todo.id),
        Err(TodoServiceError::TodoNotFound(id)) if id == todo.id
    ));
}

#[test]
fn completed_todos_cannot_be_edited() {
    let conn = open_db_in_memory().unwrap();
    let service = TodoService::new(SqliteTodoRepository::try_new(&conn).unwrap());

    let todo = service.add_todo("done already", None).unwrap();
    service.toggle_todo(todo.id).unwrap();
    assert!(matches!(
        service.edit_todo(todo.id, "changed"),
        Err(TodoServiceError::CompletedTodo(_))
    ));
    assert_eq!(service.get_todo(todo.id).unwrap().text, "done already");
}

#[test]
fn delete_cascades_to_owned_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();

    let mut todo = Todo::new("with children");
    todo.subtasks = Some(vec![Subtask::new("child")]);
    todo.research = Some(ResearchResult {
        summary: "summary".to_string(),
        sources: vec![ResearchSource {
            uri: "https://example.com".to_string(),
            title: "Example".to_string(),
        }],
    });
    repo.create_todo(&todo).unwrap();
    repo.delete_todo(todo.id).unwrap();

    let orphans: i64 = conn
        .query_row(
            "SELECT (SELECT COUNT(*) FROM subtasks) + (SELECT COUNT(*) FROM research_sources);",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(orphans, 0);

    let err = repo.delete_todo(todo.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == todo.id));
}

#[test]
fn ids_stay_unique_across_many_adds() {
    let conn = open_db_in_memory().unwrap();
    let service = TodoService::new(SqliteTodoRepository::try_new(&conn).unwrap());

    for index in 0..25 {
        service.add_todo(&format!("item {index}"), None).unwrap();
    }
    let ids: HashSet<_> = service
        .list_todos(TodoFilter::All)
        .unwrap()
        .into_iter()
        .map(|todo| todo.id)
        .collect();
    assert_eq!(ids.len(), 25);
}

#[test]
fn subtask_toggle_updates_only_target() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    let service = TodoService::new(repo);

    let todo = service.add_todo("bake bread", None).unwrap();
    let knead = Subtask::new("knead");
    let proof = Subtask::new("proof");
    repo.set_subtasks(todo.id, &[knead.clone(), proof.clone()])
        .unwrap();

    let refreshed = service.toggle_subtask(todo.id, knead.id).unwrap();
    assert!(refreshed.subtask(knead.id).unwrap().completed);
    assert!(!refreshed.subtask(proof.id).unwrap().completed);

    let missing = Uuid::new_v4();
    assert!(matches!(
        service.toggle_subtask(todo.id, missing),
        Err(TodoServiceError::SubtaskNotFound { subtask_id, .. }) if subtask_id == missing
    ));
}

#[test]
fn subtask_ids_resolve_by_prefix() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    let service = TodoService::new(repo);

    let todo = service.add_todo("clean house", None).unwrap();
    let step = Subtask::new("vacuum");
    repo.set_subtasks(todo.id, &[step.clone()]).unwrap();

    let prefix = &step.id.to_string()[..6];
    assert_eq!(service.resolve_subtask_id(todo.id, prefix).unwrap(), step.id);
    assert_eq!(
        service.resolve_id(&todo.id.to_string()[..8]).unwrap(),
        todo.id
    );
}

#[test]
fn research_can_be_cleared_and_replaced() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();

    let todo = Todo::new("learn sourdough");
    repo.create_todo(&todo).unwrap();

    let first = ResearchResult {
        summary: "first".to_string(),
        sources: Vec::new(),
    };
    repo.set_research(todo.id, &first).unwrap();
    assert_eq!(repo.get_todo(todo.id).unwrap().unwrap().research, Some(first));

    repo.clear_research(todo.id).unwrap();
    assert_eq!(repo.get_todo(todo.id).unwrap().unwrap().research, None);
}

#[test]
fn invalid_persisted_due_date_is_reported() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();

    let todo = Todo::new("broken");
    repo.create_todo(&todo).unwrap();
    conn.execute(
        "UPDATE todos SET due_date = 'tomorrow' WHERE uuid = ?1;",
        [todo.id.to_string()],
    )
    .unwrap();

    assert!(matches!(
        repo.get_todo(todo.id),
        Err(RepoError::InvalidData(_))
    ));
}

#[test]
fn service_clears_research_without_provider() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTodoRepository::try_new(&conn).unwrap();
    let service = TodoService::new(repo);

    let todo = service.add_todo("compare laptops", None).unwrap();
    repo.set_research(
        todo.id,
        &ResearchResult {
            summary: "Battery life varies.".to_string(),
            sources: Vec::new(),
        },
    )
    .unwrap();

    let cleared = service.clear_research(todo.id).unwrap();
    assert_eq!(cleared.research, None);
    assert!(matches!(
        service.clear_research(Uuid::new_v4()),
        Err(TodoServiceError::TodoNotFound(_))
    ));
}
