//! CompletionEngine - 完了トグルとカスケード
//!
//! # フロー（toggle_complete）
//! 1. トランザクション開始、タスク取得（無ければ何もしない）
//! 2. 当日完了済みなら undo、そうでなければ complete
//! 3. 本人を書き込んでからカスケードを評価
//! 4. 親カスケード（complete / undo の両方向、深さ優先・子→親の順）
//! 5. トリガーカスケード（complete のみ、1 段だけ）
//! 6. commit → イベント送信
//!
//! 本人の読み書きに失敗したら全体をロールバックします。
//! カスケード途中の失敗はその枝だけを諦め、`CascadeWarning` として返します。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::recurrence::RecurrenceCalculator;
use crate::domain::{
    CadenceError, CascadeFailure, CascadeWarning, DomainEvent, EdgeKind, SchedulingConflict, Task,
    TaskId,
};
use crate::ports::{EventSink, StoreError, TaskStore, TaskTransaction};

/// Which way a toggle went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Completed,
    Uncompleted,
}

/// Everything one `toggle_complete` call changed.
#[derive(Debug, Clone, Default)]
pub struct ToggleReport {
    /// `None` when the task did not exist (nothing was changed).
    pub transition: Option<Transition>,
    /// The toggled task after the whole cascade.
    pub task: Option<Task>,
    /// Ancestors completed by the parent cascade, in cascade order.
    pub auto_completed: Vec<TaskId>,
    /// Ancestors un-completed by the parent cascade, in cascade order.
    pub auto_uncompleted: Vec<TaskId>,
    /// Trigger targets made due on the toggle date.
    pub activated: Vec<TaskId>,
    pub conflicts: Vec<(TaskId, SchedulingConflict)>,
    pub warnings: Vec<CascadeWarning>,
}

/// Report + pending events, filled while the transaction is open.
#[derive(Default)]
struct CascadeLog {
    report: ToggleReport,
    events: Vec<DomainEvent>,
}

impl CascadeLog {
    fn skip(&mut self, from: TaskId, related: TaskId, failure: CascadeFailure) {
        warn!(%from, %related, ?failure, "cascade step skipped");
        let warning = CascadeWarning {
            from,
            related,
            failure,
        };
        self.report.warnings.push(warning.clone());
        self.events.push(DomainEvent::CascadeSkipped(warning));
    }

    fn store_failure(&mut self, from: TaskId, related: TaskId, err: StoreError) {
        self.skip(from, related, CascadeFailure::Store(err.to_string()));
    }

    fn conflict(&mut self, task_id: TaskId, conflict: SchedulingConflict) {
        warn!(%task_id, ?conflict, "scheduling fell back to unconstrained date");
        self.report.conflicts.push((task_id, conflict));
        self.events
            .push(DomainEvent::SchedulingConflict { task_id, conflict });
    }
}

pub struct CompletionEngine {
    store: Arc<dyn TaskStore>,
    events: Arc<dyn EventSink>,
    calculator: RecurrenceCalculator,
    ancestors_fire_triggers: bool,
}

impl CompletionEngine {
    pub fn new(
        store: Arc<dyn TaskStore>,
        events: Arc<dyn EventSink>,
        calculator: RecurrenceCalculator,
    ) -> Self {
        Self {
            store,
            events,
            calculator,
            ancestors_fire_triggers: true,
        }
    }

    /// Whether ancestors completed by the parent cascade activate their own
    /// trigger targets (default: true).
    pub fn with_ancestor_triggers(mut self, enabled: bool) -> Self {
        self.ancestors_fire_triggers = enabled;
        self
    }

    /// Toggle `task_id`'s completion for `date`.
    ///
    /// Missing task: no-op, empty report.
    pub async fn toggle_complete(
        &self,
        task_id: TaskId,
        date: NaiveDate,
    ) -> Result<ToggleReport, CadenceError> {
        let mut tx = self.store.begin().await?;
        let Some(mut task) = tx.get(task_id).await? else {
            debug!(%task_id, "toggle skipped: task not found");
            return Ok(ToggleReport::default());
        };

        let mut log = CascadeLog::default();

        if task.is_completed_on(date) {
            task.mark_uncompleted(date);
            tx.update(&task).await?;
            log.report.transition = Some(Transition::Uncompleted);
            log.events.push(DomainEvent::TaskUncompleted {
                task_id,
                on: date,
                cascaded: false,
            });

            self.undo_parents(tx.as_mut(), task_id, date, &mut log).await;
        } else {
            self.mark_completed(&mut task, date, false, &mut log);
            tx.update(&task).await?;
            log.report.transition = Some(Transition::Completed);

            self.complete_parents(tx.as_mut(), task_id, date, &mut log)
                .await;
            self.activate_targets(tx.as_mut(), task_id, date, &mut log)
                .await;
        }

        log.report.task = tx.get(task_id).await?;
        tx.commit().await?;

        info!(
            %task_id,
            %date,
            transition = ?log.report.transition,
            auto_completed = log.report.auto_completed.len(),
            auto_uncompleted = log.report.auto_uncompleted.len(),
            activated = log.report.activated.len(),
            warnings = log.report.warnings.len(),
            "toggle committed"
        );
        self.events.emit_all(log.events).await;
        Ok(log.report)
    }

    /// Apply the completion transition in memory and log it.
    fn mark_completed(
        &self,
        task: &mut Task,
        date: NaiveDate,
        cascaded: bool,
        log: &mut CascadeLog,
    ) {
        let schedule = self.calculator.schedule(&task.rule, date);
        if let Some(conflict) = schedule.and_then(|s| s.conflict) {
            log.conflict(task.id, conflict);
        }
        task.mark_completed(date, schedule.map(|s| s.date));
        debug!(
            task_id = %task.id,
            %date,
            streak = task.completion_streak,
            next_due = ?task.next_due,
            cascaded,
            "task completed"
        );
        log.events.push(DomainEvent::TaskCompleted {
            task_id: task.id,
            on: date,
            streak: task.completion_streak,
            next_due: task.next_due,
            cascaded,
        });
    }

    /// Parents of `child` as evaluation frames, first parent on top.
    async fn parent_frames(
        &self,
        tx: &mut dyn TaskTransaction,
        child: TaskId,
        log: &mut CascadeLog,
    ) -> Vec<(TaskId, TaskId)> {
        match tx.edges(EdgeKind::ChildOf, child).await {
            Ok(parents) => parents.into_iter().rev().map(|p| (p, child)).collect(),
            Err(e) => {
                log.store_failure(child, child, e);
                Vec::new()
            }
        }
    }

    async fn load_related(
        &self,
        tx: &mut dyn TaskTransaction,
        from: TaskId,
        related: TaskId,
        log: &mut CascadeLog,
    ) -> Option<Task> {
        match tx.get(related).await {
            Ok(Some(task)) => Some(task),
            Ok(None) => {
                log.skip(from, related, CascadeFailure::Missing);
                None
            }
            Err(e) => {
                log.store_failure(from, related, e);
                None
            }
        }
    }

    /// Complete every non-manual ancestor whose children are now all done.
    ///
    /// Depth-first: a completed parent's own parents are evaluated before its
    /// siblings.
    async fn complete_parents(
        &self,
        tx: &mut dyn TaskTransaction,
        origin: TaskId,
        date: NaiveDate,
        log: &mut CascadeLog,
    ) {
        let mut stack = self.parent_frames(tx, origin, log).await;
        let mut visited: HashSet<TaskId> = HashSet::from([origin]);

        while let Some((parent_id, child_id)) = stack.pop() {
            if !visited.insert(parent_id) {
                continue;
            }
            let Some(mut parent) = self.load_related(tx, child_id, parent_id, log).await else {
                continue;
            };
            if parent.requires_manual_completion || parent.is_completed_on(date) {
                continue;
            }

            let children = match tx.children(parent_id).await {
                Ok(children) => children,
                Err(e) => {
                    log.store_failure(child_id, parent_id, e);
                    continue;
                }
            };
            if children.is_empty() || !children.iter().all(|c| c.is_completed_on(date)) {
                continue;
            }

            let mut branch = CascadeLog::default();
            self.mark_completed(&mut parent, date, true, &mut branch);
            if let Err(e) = tx.update(&parent).await {
                log.store_failure(child_id, parent_id, e);
                continue;
            }
            log.report.conflicts.append(&mut branch.report.conflicts);
            log.events.append(&mut branch.events);
            log.report.auto_completed.push(parent_id);

            if self.ancestors_fire_triggers {
                self.activate_targets(tx, parent_id, date, log).await;
            }
            let mut next = self.parent_frames(tx, parent_id, log).await;
            stack.append(&mut next);
        }
    }

    /// Undo every non-manual ancestor that was completed on `date`.
    async fn undo_parents(
        &self,
        tx: &mut dyn TaskTransaction,
        origin: TaskId,
        date: NaiveDate,
        log: &mut CascadeLog,
    ) {
        let mut stack = self.parent_frames(tx, origin, log).await;
        let mut visited: HashSet<TaskId> = HashSet::from([origin]);

        while let Some((parent_id, child_id)) = stack.pop() {
            if !visited.insert(parent_id) {
                continue;
            }
            let Some(mut parent) = self.load_related(tx, child_id, parent_id, log).await else {
                continue;
            };
            if parent.requires_manual_completion || !parent.is_completed_on(date) {
                continue;
            }

            parent.mark_uncompleted(date);
            if let Err(e) = tx.update(&parent).await {
                log.store_failure(child_id, parent_id, e);
                continue;
            }
            debug!(task_id = %parent_id, %date, "task un-completed by cascade");
            log.events.push(DomainEvent::TaskUncompleted {
                task_id: parent_id,
                on: date,
                cascaded: true,
            });
            log.report.auto_uncompleted.push(parent_id);

            let mut next = self.parent_frames(tx, parent_id, log).await;
            stack.append(&mut next);
        }
    }

    /// Make every direct trigger target of `source` due on `date`.
    ///
    /// Single level: the targets' own targets are left alone.
    async fn activate_targets(
        &self,
        tx: &mut dyn TaskTransaction,
        source: TaskId,
        date: NaiveDate,
        log: &mut CascadeLog,
    ) {
        let targets = match tx.edges(EdgeKind::Triggers, source).await {
            Ok(targets) => targets,
            Err(e) => {
                log.store_failure(source, source, e);
                return;
            }
        };

        for target_id in targets {
            let Some(mut target) = self.load_related(tx, source, target_id, log).await else {
                continue;
            };
            target.activate(date);
            if let Err(e) = tx.update(&target).await {
                log.store_failure(source, target_id, e);
                continue;
            }
            debug!(task_id = %target_id, %source, %date, "task activated by trigger");
            log.events.push(DomainEvent::TaskActivated {
                task_id: target_id,
                by: source,
                on: date,
            });
            if !log.report.activated.contains(&target_id) {
                log.report.activated.push(target_id);
            }
        }
    }
}
