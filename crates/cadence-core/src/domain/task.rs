//! Task record: identity + recurrence rule + schedule state.
//!
//! 関係（親子・トリガー）はここには持たず、`RelationGraph` 側で一元管理します。
//! スケジュール状態の遷移はすべてメソッド経由で行います（フィールド直書きはしない）。

use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;
use super::recurrence::{OverdueBehavior, RecurrenceRule};

/// Schedule state captured right before a completion.
///
/// Undo on the same day restores exactly this state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSnapshot {
    /// The date of the completion this snapshot belongs to.
    pub completed_on: NaiveDate,
    pub next_due: Option<NaiveDate>,
    pub last_completed: Option<NaiveDate>,
    pub completion_streak: u32,
}

/// A tracked task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub active: bool,

    pub rule: RecurrenceRule,
    #[serde(default)]
    pub overdue_behavior: OverdueBehavior,
    #[serde(default)]
    pub delete_after_completion: bool,

    pub next_due: Option<NaiveDate>,
    pub last_completed: Option<NaiveDate>,
    pub completion_streak: u32,
    #[serde(default)]
    pub undo_snapshot: Option<CompletionSnapshot>,

    /// Ordering hint within a parent's child list.
    #[serde(default)]
    pub child_order: i32,
    /// When true the task never auto-completes from its children.
    #[serde(default)]
    pub requires_manual_completion: bool,
    #[serde(default)]
    pub requires_inventory: bool,
}

impl Task {
    /// Build a fresh task from a draft (schedule state empty).
    pub fn from_draft(id: TaskId, draft: TaskDraft) -> Self {
        Self {
            id,
            name: draft.name,
            category: draft.category,
            tags: draft.tags,
            description: draft.description,
            active: true,
            rule: draft.rule,
            overdue_behavior: draft.overdue_behavior,
            delete_after_completion: draft.delete_after_completion,
            next_due: draft.next_due,
            last_completed: None,
            completion_streak: 0,
            undo_snapshot: None,
            child_order: draft.child_order,
            requires_manual_completion: draft.requires_manual_completion,
            requires_inventory: draft.requires_inventory,
        }
    }

    /// Replace the user-editable fields. Schedule state survives unless the
    /// draft pins an explicit `next_due`.
    pub fn apply_draft(&mut self, draft: TaskDraft) {
        self.name = draft.name;
        self.category = draft.category;
        self.tags = draft.tags;
        self.description = draft.description;
        self.rule = draft.rule;
        self.overdue_behavior = draft.overdue_behavior;
        self.delete_after_completion = draft.delete_after_completion;
        self.child_order = draft.child_order;
        self.requires_manual_completion = draft.requires_manual_completion;
        self.requires_inventory = draft.requires_inventory;
        if draft.next_due.is_some() {
            self.next_due = draft.next_due;
        }
    }

    pub fn is_completed_on(&self, date: NaiveDate) -> bool {
        self.last_completed == Some(date)
    }

    /// Today-view predicate: due (or overdue) on `date`, or checked off on it.
    pub fn is_visible_on(&self, date: NaiveDate) -> bool {
        self.active && (self.next_due.is_some_and(|d| d <= date) || self.is_completed_on(date))
    }

    pub fn is_overdue_on(&self, date: NaiveDate) -> bool {
        self.active && self.next_due.is_some_and(|d| d < date)
    }

    /// Mark completed on `date` and move the schedule to `next_due`.
    ///
    /// The streak continues only when the previous completion was the day before.
    pub fn mark_completed(&mut self, date: NaiveDate, next_due: Option<NaiveDate>) {
        self.undo_snapshot = Some(CompletionSnapshot {
            completed_on: date,
            next_due: self.next_due,
            last_completed: self.last_completed,
            completion_streak: self.completion_streak,
        });

        let continues = date
            .checked_sub_days(Days::new(1))
            .is_some_and(|yesterday| self.last_completed == Some(yesterday));
        self.completion_streak = if continues {
            self.completion_streak.saturating_add(1)
        } else {
            1
        };
        self.last_completed = Some(date);
        self.next_due = next_due;
    }

    /// Undo the completion made on `date`.
    ///
    /// With a matching snapshot the previous state comes back verbatim;
    /// otherwise the task reappears as due on `date` with the streak reduced by one.
    pub fn mark_uncompleted(&mut self, date: NaiveDate) {
        match self.undo_snapshot.take() {
            Some(snapshot) if snapshot.completed_on == date => {
                self.next_due = snapshot.next_due;
                self.last_completed = snapshot.last_completed;
                self.completion_streak = snapshot.completion_streak;
            }
            _ => {
                self.last_completed = None;
                self.next_due = Some(date);
                self.completion_streak = self.completion_streak.saturating_sub(1);
            }
        }
    }

    /// Make the task due on `date` without touching completion state.
    pub fn activate(&mut self, date: NaiveDate) {
        self.next_due = Some(date);
    }

    pub fn reset_streak(&mut self) {
        self.completion_streak = 0;
    }

    pub fn reschedule(&mut self, next_due: NaiveDate) {
        self.next_due = Some(next_due);
    }
}

/// User-editable part of a task, as submitted on create/edit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskDraft {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rule: RecurrenceRule,
    #[serde(default)]
    pub overdue_behavior: OverdueBehavior,
    #[serde(default)]
    pub delete_after_completion: bool,
    /// Explicit due date. `None` lets the scheduler pick (new tasks) or
    /// keeps the current one (edits).
    #[serde(default)]
    pub next_due: Option<NaiveDate>,
    #[serde(default)]
    pub child_order: i32,
    #[serde(default)]
    pub requires_manual_completion: bool,
    #[serde(default)]
    pub requires_inventory: bool,
}

impl TaskDraft {
    pub fn new(name: impl Into<String>, rule: RecurrenceRule) -> Self {
        Self {
            name: name.into(),
            rule,
            ..Self::default()
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.next_due = Some(date);
        self
    }

    pub fn overdue(mut self, behavior: OverdueBehavior) -> Self {
        self.overdue_behavior = behavior;
        self
    }

    pub fn manual(mut self) -> Self {
        self.requires_manual_completion = true;
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.delete_after_completion = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn task(next_due: NaiveDate) -> Task {
        Task::from_draft(
            TaskId::from_ulid(Ulid::new()),
            TaskDraft::new("water plants", RecurrenceRule::daily()).due(next_due),
        )
    }

    #[test]
    fn streak_continues_on_consecutive_days() {
        let mut t = task(date(2025, 1, 1));
        t.mark_completed(date(2025, 1, 1), Some(date(2025, 1, 2)));
        t.mark_completed(date(2025, 1, 2), Some(date(2025, 1, 3)));
        t.mark_completed(date(2025, 1, 3), Some(date(2025, 1, 4)));
        assert_eq!(t.completion_streak, 3);
    }

    #[test]
    fn streak_resets_after_gap() {
        let mut t = task(date(2025, 1, 1));
        t.mark_completed(date(2025, 1, 1), Some(date(2025, 1, 2)));
        t.mark_completed(date(2025, 1, 3), Some(date(2025, 1, 4)));
        assert_eq!(t.completion_streak, 1);
    }

    #[test]
    fn undo_restores_snapshot() {
        let mut t = task(date(2025, 1, 1));
        t.mark_completed(date(2025, 1, 1), Some(date(2025, 1, 2)));
        let before = t.clone();

        t.mark_completed(date(2025, 1, 2), Some(date(2025, 1, 3)));
        t.mark_uncompleted(date(2025, 1, 2));

        assert_eq!(t.next_due, before.next_due);
        assert_eq!(t.last_completed, before.last_completed);
        assert_eq!(t.completion_streak, before.completion_streak);
    }

    #[test]
    fn undo_without_snapshot_falls_back_to_due_today() {
        let mut t = task(date(2025, 1, 9));
        t.last_completed = Some(date(2025, 1, 5));
        t.completion_streak = 0;

        t.mark_uncompleted(date(2025, 1, 5));

        assert_eq!(t.last_completed, None);
        assert_eq!(t.next_due, Some(date(2025, 1, 5)));
        assert_eq!(t.completion_streak, 0);
    }

    #[test]
    fn visibility_includes_checked_off_today() {
        let mut t = task(date(2025, 1, 1));
        t.mark_completed(date(2025, 1, 1), Some(date(2025, 1, 2)));
        assert!(t.is_visible_on(date(2025, 1, 1)));
        assert!(!t.is_overdue_on(date(2025, 1, 2)));
        assert!(t.is_overdue_on(date(2025, 1, 3)));
    }
}
