//! Due-date classification and alert tracking.
//!
//! # Responsibility
//! - Classify a due date relative to the current calendar day.
//! - Select todos that need a "due soon or overdue" alert.
//! - Track banner visibility across alert-set changes.
//!
//! # Invariants
//! - Classification is date-only; time of day never matters.
//! - Completed todos never alert.
//! - The banner re-appears only when the alert id set changes.

use crate::model::todo::{Todo, TodoId};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Due-date bucket for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStatus {
    /// Due date already passed by `days` (always >= 1).
    Overdue { days: u64 },
    DueToday,
    DueTomorrow,
    /// Due two or more days from today.
    Upcoming(NaiveDate),
}

impl DueStatus {
    /// Classifies `due` relative to `today`.
    pub fn classify(due: NaiveDate, today: NaiveDate) -> Self {
        let diff_days = due.signed_duration_since(today).num_days();
        match diff_days {
            d if d < 0 => Self::Overdue {
                days: d.unsigned_abs(),
            },
            0 => Self::DueToday,
            1 => Self::DueTomorrow,
            _ => Self::Upcoming(due),
        }
    }

    /// Human-readable label, e.g. `Overdue by 2 day(s)` or `Due Mar 5`.
    pub fn label(&self) -> String {
        match self {
            Self::Overdue { days } => format!("Overdue by {days} day(s)"),
            Self::DueToday => "Due today".to_string(),
            Self::DueTomorrow => "Due tomorrow".to_string(),
            Self::Upcoming(date) => format!("Due {}", date.format("%b %-d")),
        }
    }

    /// Whether this bucket is highlighted when the todo is alerting.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::Overdue { .. } | Self::DueToday)
    }
}

/// Returns whether `todo` is due soon (today or tomorrow) or overdue.
pub fn is_due_alert(todo: &Todo, today: NaiveDate) -> bool {
    if !todo.is_active() {
        return false;
    }
    let Some(due) = todo.due_date else {
        return false;
    };
    match today.checked_add_days(Days::new(1)) {
        Some(tomorrow) => due <= tomorrow,
        None => true,
    }
}

/// Returns alerting todos preserving list order.
pub fn select_due_alerts<'a>(todos: &'a [Todo], today: NaiveDate) -> Vec<&'a Todo> {
    todos
        .iter()
        .filter(|todo| is_due_alert(todo, today))
        .collect()
}

/// Alert banner state persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueAlertTracker {
    alert_ids: BTreeSet<TodoId>,
    banner_visible: bool,
}

impl Default for DueAlertTracker {
    fn default() -> Self {
        Self {
            alert_ids: BTreeSet::new(),
            banner_visible: true,
        }
    }
}

impl DueAlertTracker {
    /// Replaces the tracked alert set.
    ///
    /// Returns `true` when the set changed. A changed, non-empty set makes the
    /// banner visible again even if it was dismissed before.
    pub fn refresh<I>(&mut self, alert_ids: I) -> bool
    where
        I: IntoIterator<Item = TodoId>,
    {
        let next: BTreeSet<TodoId> = alert_ids.into_iter().collect();
        if next == self.alert_ids {
            return false;
        }
        if !next.is_empty() {
            self.banner_visible = true;
        }
        self.alert_ids = next;
        true
    }

    /// Hides the banner until the alert set changes.
    pub fn dismiss(&mut self) {
        self.banner_visible = false;
    }

    /// Number of tracked alerts.
    pub fn alert_count(&self) -> usize {
        self.alert_ids.len()
    }

    /// Banner text when it should be shown.
    pub fn banner(&self) -> Option<String> {
        if !self.banner_visible || self.alert_count() == 0 {
            return None;
        }
        Some(format!(
            "Heads up! {} task(s) are due soon or overdue.",
            self.alert_count()
        ))
    }
}
