//! Tracker - 表示層から呼ばれる唯一の入口
//!
//! エンジン群と Clock・TaskStore を束ねます。
//! 日付を省略できる操作は Clock の「今日」を使います。

use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::SchedulerConfig;
use crate::domain::{CadenceError, Task, TaskId, TaskRelations};
use crate::engine::{
    CompletionEngine, OverdueProcessor, RelationshipGraphMaintainer, RolloverReport, SaveOutcome,
    SaveRequest, ToggleReport,
};
use crate::ports::{Clock, TaskStore};

pub struct Tracker {
    store: Arc<dyn TaskStore>,
    clock: Arc<dyn Clock>,
    completion: CompletionEngine,
    overdue: OverdueProcessor,
    maintainer: RelationshipGraphMaintainer,
    config: SchedulerConfig,
}

impl Tracker {
    pub(crate) fn new(
        store: Arc<dyn TaskStore>,
        clock: Arc<dyn Clock>,
        completion: CompletionEngine,
        overdue: OverdueProcessor,
        maintainer: RelationshipGraphMaintainer,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            clock,
            completion,
            overdue,
            maintainer,
            config,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub async fn toggle_complete(
        &self,
        task_id: TaskId,
        date: NaiveDate,
    ) -> Result<ToggleReport, CadenceError> {
        self.completion.toggle_complete(task_id, date).await
    }

    /// `toggle_complete` for the clock's today.
    pub async fn toggle_today(&self, task_id: TaskId) -> Result<ToggleReport, CadenceError> {
        self.toggle_complete(task_id, self.today()).await
    }

    /// Create or edit a task. New tasks are scheduled relative to the clock's today.
    pub async fn save(&self, request: SaveRequest) -> Result<SaveOutcome, CadenceError> {
        self.maintainer.save(request, self.today()).await
    }

    pub async fn roll_over(&self, current: NaiveDate) -> Result<RolloverReport, CadenceError> {
        self.overdue.roll_over(current).await
    }

    pub async fn archive(&self, id: TaskId) -> Result<Task, CadenceError> {
        self.maintainer.archive(id).await
    }

    pub async fn restore(&self, id: TaskId) -> Result<Task, CadenceError> {
        self.maintainer.restore(id).await
    }

    pub async fn delete(&self, id: TaskId) -> Result<(), CadenceError> {
        self.maintainer.delete(id).await
    }

    pub async fn relations(&self, id: TaskId) -> Result<TaskRelations, CadenceError> {
        self.maintainer.relations(id).await
    }

    pub async fn get(&self, id: TaskId) -> Result<Task, CadenceError> {
        self.store.get(id).await?.ok_or(CadenceError::NotFound(id))
    }

    /// Today view: active tasks due on or before `date`, plus the ones checked off on it.
    pub async fn due_tasks(&self, date: NaiveDate) -> Result<Vec<Task>, CadenceError> {
        Ok(self.store.query_due_on_or_before(date).await?)
    }

    pub async fn overdue_tasks(&self, date: NaiveDate) -> Result<Vec<Task>, CadenceError> {
        Ok(self.store.query_overdue(date).await?)
    }

    /// Children of `parent` in display order.
    pub async fn children(&self, parent: TaskId) -> Result<Vec<Task>, CadenceError> {
        Ok(self.store.children(parent).await?)
    }

    pub async fn parents(&self, child: TaskId) -> Result<Vec<Task>, CadenceError> {
        Ok(self.store.parents(child).await?)
    }

    /// Tasks activated when `source` completes.
    pub async fn trigger_targets(&self, source: TaskId) -> Result<Vec<Task>, CadenceError> {
        Ok(self.store.triggered_by(source).await?)
    }

    /// Tasks whose completion activates `target`.
    pub async fn trigger_sources(&self, target: TaskId) -> Result<Vec<Task>, CadenceError> {
        Ok(self.store.triggers_of(target).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::TrackerBuilder;
    use crate::domain::{DomainEvent, RecurrenceRule, RelationRequest, TaskDraft};
    use crate::impls::{InMemoryTaskStore, RecordingEventSink};
    use crate::ports::FixedClock;
    use chrono::{TimeDelta, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tracker(clock: Arc<FixedClock>, sink: Arc<RecordingEventSink>) -> Tracker {
        TrackerBuilder::new()
            .store(InMemoryTaskStore::new())
            .clock(clock)
            .event_sink(sink)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn clean_kitchen_through_the_facade() {
        let clock = Arc::new(FixedClock::on(date(2025, 11, 3)));
        let sink = Arc::new(RecordingEventSink::new());
        let tracker = tracker(clock.clone(), sink.clone());
        let rule = RecurrenceRule::weekly().on_days([Weekday::Mon, Weekday::Wed, Weekday::Fri]);

        let saved = tracker
            .save(SaveRequest::create(TaskDraft::new("Clean Kitchen", rule)))
            .await
            .unwrap();
        let id = saved.task.id;
        assert_eq!(saved.task.next_due, Some(date(2025, 11, 3)));

        let report = tracker.toggle_today(id).await.unwrap();
        let task = report.task.unwrap();
        assert_eq!(task.next_due, Some(date(2025, 11, 5)));
        assert_eq!(task.completion_streak, 1);

        // still listed today (checked off), gone tomorrow, back on Wednesday
        assert_eq!(tracker.due_tasks(date(2025, 11, 3)).await.unwrap().len(), 1);
        assert!(tracker.due_tasks(date(2025, 11, 4)).await.unwrap().is_empty());

        clock.advance(TimeDelta::days(2));
        let wednesday = tracker.today();
        assert_eq!(wednesday, date(2025, 11, 5));
        tracker.toggle_today(id).await.unwrap();
        assert_eq!(tracker.get(id).await.unwrap().next_due, Some(date(2025, 11, 7)));
        assert!(sink.events().await.len() >= 3);
    }

    #[tokio::test]
    async fn missed_day_resets_streak_on_rollover() {
        let clock = Arc::new(FixedClock::on(date(2025, 11, 3)));
        let tracker = tracker(clock, Arc::new(RecordingEventSink::new()));
        let id = tracker
            .save(SaveRequest::create(TaskDraft::new("meditate", RecurrenceRule::daily())))
            .await
            .unwrap()
            .task
            .id;
        tracker.toggle_complete(id, date(2025, 11, 3)).await.unwrap();

        // 11-04 missed
        tracker.roll_over(date(2025, 11, 5)).await.unwrap();

        let task = tracker.get(id).await.unwrap();
        assert_eq!(task.completion_streak, 0);
        assert_eq!(task.next_due, Some(date(2025, 11, 4)));
        assert_eq!(tracker.overdue_tasks(date(2025, 11, 5)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn relationship_views() {
        let clock = Arc::new(FixedClock::on(date(2025, 11, 3)));
        let sink = Arc::new(RecordingEventSink::new());
        let tracker = tracker(clock, sink.clone());
        let draft = |name: &str| TaskDraft::new(name, RecurrenceRule::daily());

        let parent = tracker.save(SaveRequest::create(draft("evening"))).await.unwrap().task.id;
        let target = tracker.save(SaveRequest::create(draft("lights out"))).await.unwrap().task.id;
        let child = tracker
            .save(SaveRequest::create(draft("brush teeth")).with_relations(
                RelationRequest::default().with_parents([parent]).with_triggers([target]),
            ))
            .await
            .unwrap()
            .task
            .id;

        let children: Vec<TaskId> = tracker
            .children(parent)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(children, vec![child]);
        let parents: Vec<TaskId> = tracker
            .parents(child)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(parents, vec![parent]);
        let targets: Vec<TaskId> = tracker
            .trigger_targets(child)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(targets, vec![target]);
        let sources: Vec<TaskId> = tracker
            .trigger_sources(target)
            .await
            .unwrap()
            .iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(sources, vec![child]);
        assert_eq!(
            tracker.relations(child).await.unwrap(),
            RelationRequest::default().with_parents([parent]).with_triggers([target])
        );

        tracker.delete(parent).await.unwrap();
        assert!(tracker.relations(child).await.unwrap().parents.is_empty());
        assert!(sink
            .events()
            .await
            .contains(&DomainEvent::TaskDeleted { task_id: parent }));
    }
}
