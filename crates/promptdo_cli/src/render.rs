//! Plain-text rendering of todos for the terminal.

use chrono::NaiveDate;
use promptdo_core::{DueStatus, ResearchResult, Todo};

const SHORT_ID_LEN: usize = 8;

pub fn short_id(id: &impl ToString) -> String {
    id.to_string().chars().take(SHORT_ID_LEN).collect()
}

/// One list row: checkbox, short id, text and badges.
pub fn todo_line(todo: &Todo, today: NaiveDate, alerting: bool) -> String {
    let checkbox = if todo.completed { "[x]" } else { "[ ]" };
    let mut line = format!("{checkbox} {}  {}", short_id(&todo.id), todo.text);

    if let Some(due) = todo.due_date {
        let status = DueStatus::classify(due, today);
        let marker = if alerting && status.is_urgent() { "!" } else { "" };
        line.push_str(&format!("  ({}){marker}", status.label()));
    }

    if let Some(subtasks) = &todo.subtasks {
        let done = subtasks.iter().filter(|subtask| subtask.completed).count();
        line.push_str(&format!("  [subtasks {done}/{}]", subtasks.len()));
    }
    if todo.research.is_some() {
        line.push_str("  [research]");
    }
    line
}

pub fn subtask_lines(todo: &Todo) -> Vec<String> {
    match &todo.subtasks {
        Some(subtasks) if !subtasks.is_empty() => subtasks
            .iter()
            .map(|subtask| {
                let checkbox = if subtask.completed { "[x]" } else { "[ ]" };
                format!("    {checkbox} {}  {}", short_id(&subtask.id), subtask.text)
            })
            .collect(),
        Some(_) => vec!["    (no sub-tasks suggested)".to_string()],
        None => Vec::new(),
    }
}

pub fn research_lines(research: &ResearchResult) -> Vec<String> {
    let mut lines = vec![research.summary.trim().to_string()];
    if !research.sources.is_empty() {
        lines.push(String::new());
        lines.push("Sources:".to_string());
        for (index, source) in research.sources.iter().enumerate() {
            lines.push(format!("  {}. {} <{}>", index + 1, source.title, source.uri));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::{research_lines, subtask_lines, todo_line};
    use chrono::NaiveDate;
    use promptdo_core::{ResearchResult, ResearchSource, Subtask, Todo};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[test]
    fn line_shows_due_label_and_badges() {
        let mut todo = Todo::new("call bank").due_on(Some(today()));
        let mut step = Subtask::new("find number");
        step.completed = true;
        todo.subtasks = Some(vec![step, Subtask::new("dial")]);

        let line = todo_line(&todo, today(), true);
        assert!(line.starts_with("[ ] "));
        assert!(line.contains("call bank"));
        assert!(line.contains("(Due today)!"));
        assert!(line.contains("[subtasks 1/2]"));
    }

    #[test]
    fn empty_decomposition_is_called_out() {
        let mut todo = Todo::new("nap");
        todo.subtasks = Some(Vec::new());
        assert_eq!(subtask_lines(&todo), vec!["    (no sub-tasks suggested)"]);
    }

    #[test]
    fn research_lists_numbered_sources() {
        let research = ResearchResult {
            summary: "Summary.\n".to_string(),
            sources: vec![ResearchSource {
                uri: "https://example.com".to_string(),
                title: "Example".to_string(),
            }],
        };
        let lines = research_lines(&research);
        assert_eq!(lines[0], "Summary.");
        assert_eq!(lines.last().unwrap(), "  1. Example <https://example.com>");
    }
}
