//! OverdueProcessor - 日付の繰り越し処理
//!
//! 「今日」が進んだときに 1 回だけ呼ばれます。処理はすべて 1 トランザクション。
//!
//! 1. 完了済みの使い捨てタスク（`delete_after_completion`）を削除
//!    （完了後にトリガーで再び有効になったものは残す）
//! 2. `next_due < current` の有効タスクごとに
//!    - 前日に完了していなければストリークを 0 に戻す
//!    - SkipToNext なら次回日付へ送る（`current` より前にはしない）
//!
//! 同じ日付で 2 回走らせても、2 回目は何も変えません。

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::recurrence::RecurrenceCalculator;
use crate::domain::{CadenceError, DomainEvent, OverdueBehavior, SchedulingConflict, TaskId};
use crate::ports::{EventSink, TaskStore};

/// One `next_due` move made by the rollover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reschedule {
    pub task_id: TaskId,
    pub from: Option<NaiveDate>,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloverReport {
    pub date: NaiveDate,
    pub streak_resets: Vec<TaskId>,
    pub rescheduled: Vec<Reschedule>,
    pub conflicts: Vec<(TaskId, SchedulingConflict)>,
    pub purged: Vec<TaskId>,
}

impl RolloverReport {
    fn new(date: NaiveDate) -> Self {
        Self {
            date,
            streak_resets: Vec::new(),
            rescheduled: Vec::new(),
            conflicts: Vec::new(),
            purged: Vec::new(),
        }
    }

    /// True when the rollover changed nothing.
    pub fn is_empty(&self) -> bool {
        self.streak_resets.is_empty() && self.rescheduled.is_empty() && self.purged.is_empty()
    }
}

pub struct OverdueProcessor {
    store: Arc<dyn TaskStore>,
    events: Arc<dyn EventSink>,
    calculator: RecurrenceCalculator,
}

impl OverdueProcessor {
    pub fn new(
        store: Arc<dyn TaskStore>,
        events: Arc<dyn EventSink>,
        calculator: RecurrenceCalculator,
    ) -> Self {
        Self {
            store,
            events,
            calculator,
        }
    }

    pub async fn roll_over(&self, current: NaiveDate) -> Result<RolloverReport, CadenceError> {
        let mut tx = self.store.begin().await?;
        let mut report = RolloverReport::new(current);
        let mut events = Vec::new();

        for task in tx.all_active().await? {
            // re-activated after its last completion (next_due <= last_completed): still pending
            let finished = task
                .last_completed
                .is_some_and(|done| done < current && task.next_due.is_none_or(|due| due > done));
            if task.delete_after_completion && finished {
                tx.delete(task.id).await?;
                debug!(task_id = %task.id, "ephemeral task purged");
                report.purged.push(task.id);
                events.push(DomainEvent::TaskDeleted { task_id: task.id });
            }
        }

        let yesterday = current.pred_opt();
        for mut task in tx.query_overdue(current).await? {
            let mut changed = false;

            if task.last_completed != yesterday && task.completion_streak > 0 {
                let previous = task.completion_streak;
                task.reset_streak();
                changed = true;
                debug!(task_id = %task.id, previous, "streak reset");
                report.streak_resets.push(task.id);
                events.push(DomainEvent::StreakReset {
                    task_id: task.id,
                    previous,
                });
            }

            let skips =
                task.overdue_behavior == OverdueBehavior::SkipToNext && !task.rule.is_adhoc();
            if skips && let Some(missed) = task.next_due {
                if let Some(schedule) = self.calculator.schedule(&task.rule, missed) {
                    if let Some(conflict) = schedule.conflict {
                        warn!(
                            task_id = %task.id,
                            ?conflict,
                            "scheduling fell back to unconstrained date"
                        );
                        report.conflicts.push((task.id, conflict));
                        events.push(DomainEvent::SchedulingConflict {
                            task_id: task.id,
                            conflict,
                        });
                    }
                    let to = schedule.date.max(current);
                    task.reschedule(to);
                    changed = true;
                    debug!(task_id = %task.id, %missed, %to, "missed occurrence skipped");
                    report.rescheduled.push(Reschedule {
                        task_id: task.id,
                        from: Some(missed),
                        to,
                    });
                    events.push(DomainEvent::TaskRescheduled {
                        task_id: task.id,
                        from: Some(missed),
                        to,
                    });
                }
            }

            if changed {
                tx.update(&task).await?;
            }
        }

        tx.commit().await?;
        info!(
            date = %current,
            streak_resets = report.streak_resets.len(),
            rescheduled = report.rescheduled.len(),
            purged = report.purged.len(),
            "rollover committed"
        );
        self.events.emit_all(events).await;
        Ok(report)
    }
}
