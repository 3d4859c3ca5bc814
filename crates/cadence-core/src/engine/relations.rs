//! RelationshipGraphMaintainer - 保存と関係グラフの整合
//!
//! # save のフロー
//! 1. フィールド検証（名前、繰り返しルール）
//! 2. トランザクション開始、新規なら ID 採番・初回日付を決定
//! 3. 自己参照チェック
//! 4. 存在しない参照先はスキップ（警告のみ）
//! 5. 永続化済みの辺と要求された辺の差分を取り、古い辺を外して新しい辺を足す
//!    （足すたびに到達可能性で閉路チェック）
//! 6. commit → イベント送信
//!
//! 検証エラーはトランザクションを drop するだけなので、何も書き込まれません。

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::recurrence::RecurrenceCalculator;
use crate::domain::{
    CadenceError, DomainEvent, EdgeKind, RelationRequest, SchedulingConflict, Task, TaskDraft,
    TaskId, TaskRelations, ValidationError,
};
use crate::ports::{EventSink, IdGenerator, StoreError, TaskStore, TaskTransaction};

/// `from -(kind)-> to`
pub type Edge = (EdgeKind, TaskId, TaskId);

/// A create (`id: None`) or edit of one task plus its full relationship sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub id: Option<TaskId>,
    pub draft: TaskDraft,
    #[serde(default)]
    pub relations: RelationRequest,
}

impl SaveRequest {
    pub fn create(draft: TaskDraft) -> Self {
        Self {
            id: None,
            draft,
            relations: RelationRequest::default(),
        }
    }

    pub fn edit(id: TaskId, draft: TaskDraft) -> Self {
        Self {
            id: Some(id),
            draft,
            relations: RelationRequest::default(),
        }
    }

    pub fn with_relations(mut self, relations: RelationRequest) -> Self {
        self.relations = relations;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub task: Task,
    pub created: bool,
    pub added: Vec<Edge>,
    pub removed: Vec<Edge>,
    /// Referenced ids that did not exist and were left out.
    pub skipped: Vec<TaskId>,
    /// Set when a freshly assigned first due date used a search fallback.
    pub conflict: Option<SchedulingConflict>,
}

pub struct RelationshipGraphMaintainer {
    store: Arc<dyn TaskStore>,
    events: Arc<dyn EventSink>,
    ids: Arc<dyn IdGenerator>,
    calculator: RecurrenceCalculator,
}

impl RelationshipGraphMaintainer {
    pub fn new(
        store: Arc<dyn TaskStore>,
        events: Arc<dyn EventSink>,
        ids: Arc<dyn IdGenerator>,
        calculator: RecurrenceCalculator,
    ) -> Self {
        Self {
            store,
            events,
            ids,
            calculator,
        }
    }

    pub async fn save(
        &self,
        request: SaveRequest,
        today: NaiveDate,
    ) -> Result<SaveOutcome, CadenceError> {
        let SaveRequest { id, draft, relations } = request;
        validate_draft(&draft)?;

        let mut tx = self.store.begin().await?;
        let (mut task, created) = match id {
            Some(id) => {
                let mut existing = tx.get(id).await?.ok_or(CadenceError::NotFound(id))?;
                existing.apply_draft(draft);
                (existing, false)
            }
            None => (Task::from_draft(self.ids.generate_task_id(), draft), true),
        };
        // recurring tasks always carry a due date (also after an ad hoc -> recurring edit)
        let mut conflict = None;
        if task.next_due.is_none()
            && let Some(first) = self.calculator.first_due(&task.rule, today)
        {
            conflict = first.conflict;
            task.next_due = Some(first.date);
        }
        let task_id = task.id;

        reject_self_reference(task_id, &relations)?;
        let (requested, skipped) = existing_only(tx.as_mut(), relations).await?;

        if created {
            tx.insert(task.clone()).await?;
        } else {
            tx.update(&task).await?;
        }

        let persisted = tx.relations(task_id).await?;
        let wanted: BTreeSet<Edge> = requested.edges_of(task_id).into_iter().collect();
        let current: BTreeSet<Edge> = persisted.edges_of(task_id).into_iter().collect();

        let removed: Vec<Edge> = current.difference(&wanted).copied().collect();
        let added: Vec<Edge> = wanted.difference(&current).copied().collect();

        for &(kind, from, to) in &removed {
            tx.remove_edge(kind, from, to).await?;
        }
        for &(kind, from, to) in &added {
            if let Some(path) = cycle_through(tx.as_mut(), kind, from, to).await? {
                debug!(%task_id, %kind, ?path, "save rejected: cycle");
                return Err(ValidationError::Cycle { kind, path }.into());
            }
            tx.add_edge(kind, from, to).await?;
        }

        tx.commit().await?;

        info!(
            %task_id,
            created,
            added = added.len(),
            removed = removed.len(),
            skipped = skipped.len(),
            "task saved"
        );
        let mut events = vec![DomainEvent::TaskSaved { task_id, created }];
        if let Some(conflict) = conflict {
            warn!(%task_id, ?conflict, "first due date fell back to unconstrained date");
            events.push(DomainEvent::SchedulingConflict { task_id, conflict });
        }
        self.events.emit_all(events).await;

        Ok(SaveOutcome {
            task,
            created,
            added,
            removed,
            skipped,
            conflict,
        })
    }

    /// Soft delete: the task keeps its edges but drops out of every query.
    pub async fn archive(&self, id: TaskId) -> Result<Task, CadenceError> {
        let task = self.set_active(id, false).await?;
        self.events.emit(DomainEvent::TaskArchived { task_id: id }).await;
        Ok(task)
    }

    pub async fn restore(&self, id: TaskId) -> Result<Task, CadenceError> {
        let task = self.set_active(id, true).await?;
        self.events.emit(DomainEvent::TaskRestored { task_id: id }).await;
        Ok(task)
    }

    /// Hard delete; every edge touching the task goes with it.
    pub async fn delete(&self, id: TaskId) -> Result<(), CadenceError> {
        let mut tx = self.store.begin().await?;
        if !tx.delete(id).await? {
            return Err(CadenceError::NotFound(id));
        }
        tx.commit().await?;
        info!(task_id = %id, "task deleted");
        self.events.emit(DomainEvent::TaskDeleted { task_id: id }).await;
        Ok(())
    }

    pub async fn relations(&self, id: TaskId) -> Result<TaskRelations, CadenceError> {
        if self.store.get(id).await?.is_none() {
            return Err(CadenceError::NotFound(id));
        }
        Ok(self.store.relations(id).await?)
    }

    async fn set_active(&self, id: TaskId, active: bool) -> Result<Task, CadenceError> {
        let mut tx = self.store.begin().await?;
        let mut task = tx.get(id).await?.ok_or(CadenceError::NotFound(id))?;
        task.active = active;
        tx.update(&task).await?;
        tx.commit().await?;
        info!(task_id = %id, active, "task activity changed");
        Ok(task)
    }
}

fn validate_draft(draft: &TaskDraft) -> Result<(), ValidationError> {
    if draft.name.trim().is_empty() {
        return Err(ValidationError::EmptyName);
    }
    draft.rule.validate()
}

fn reject_self_reference(task: TaskId, relations: &RelationRequest) -> Result<(), ValidationError> {
    let hit = |set: &BTreeSet<TaskId>, kind| {
        if set.contains(&task) {
            Err(ValidationError::SelfReference { task, kind })
        } else {
            Ok(())
        }
    };
    hit(&relations.parents, EdgeKind::ChildOf)?;
    hit(&relations.children, EdgeKind::ChildOf)?;
    hit(&relations.triggered_by, EdgeKind::Triggers)?;
    hit(&relations.triggers, EdgeKind::Triggers)
}

/// Drop referenced ids that do not exist. Returns the filtered request and
/// the dropped ids.
async fn existing_only(
    tx: &mut dyn TaskTransaction,
    relations: RelationRequest,
) -> Result<(RelationRequest, Vec<TaskId>), StoreError> {
    let mut skipped = Vec::new();
    let mut filtered = RelationRequest::default();
    let sets = [
        (relations.parents, &mut filtered.parents),
        (relations.children, &mut filtered.children),
        (relations.triggered_by, &mut filtered.triggered_by),
        (relations.triggers, &mut filtered.triggers),
    ];
    for (requested, out) in sets {
        for id in requested {
            if tx.get(id).await?.is_some() {
                out.insert(id);
            } else {
                warn!(related = %id, "referenced task does not exist, skipping");
                skipped.push(id);
            }
        }
    }
    Ok((filtered, skipped))
}

/// If `from -> to` would close a `kind` cycle, return it as `[from, to, ..., from]`.
async fn cycle_through(
    tx: &mut dyn TaskTransaction,
    kind: EdgeKind,
    from: TaskId,
    to: TaskId,
) -> Result<Option<Vec<TaskId>>, StoreError> {
    if from == to {
        return Ok(Some(vec![from, to]));
    }

    // BFS from `to` looking for `from`
    let mut prev: HashMap<TaskId, TaskId> = HashMap::new();
    let mut queue = VecDeque::from([to]);
    let mut seen = BTreeSet::from([to]);
    while let Some(node) = queue.pop_front() {
        if node == from {
            let mut back = vec![from];
            let mut current = from;
            while let Some(&p) = prev.get(&current) {
                back.push(p);
                current = p;
            }
            back.reverse();
            let mut cycle = vec![from];
            cycle.extend(back);
            return Ok(Some(cycle));
        }
        for next in tx.edges(kind, node).await? {
            if seen.insert(next) {
                prev.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorKind, IntervalUnit, RecurrenceRule};
    use crate::impls::{InMemoryTaskStore, RecordingEventSink};
    use crate::ports::{SystemClock, UlidGenerator};
    use chrono::Weekday;
    use ulid::Ulid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn today() -> NaiveDate {
        date(2025, 11, 4)
    }

    struct Fixture {
        store: InMemoryTaskStore,
        sink: Arc<RecordingEventSink>,
        maintainer: RelationshipGraphMaintainer,
    }

    impl Fixture {
        fn new() -> Self {
            let store = InMemoryTaskStore::new();
            let sink = Arc::new(RecordingEventSink::new());
            let maintainer = RelationshipGraphMaintainer::new(
                Arc::new(store.clone()),
                sink.clone(),
                Arc::new(UlidGenerator::new(SystemClock)),
                RecurrenceCalculator::default(),
            );
            Self {
                store,
                sink,
                maintainer,
            }
        }

        async fn create(&self, name: &str) -> TaskId {
            self.maintainer
                .save(SaveRequest::create(TaskDraft::new(name, RecurrenceRule::daily())), today())
                .await
                .unwrap()
                .task
                .id
        }

        async fn relate(
            &self,
            id: TaskId,
            relations: RelationRequest,
        ) -> Result<SaveOutcome, CadenceError> {
            let draft = self.draft_of(id).await;
            self.maintainer
                .save(SaveRequest::edit(id, draft).with_relations(relations), today())
                .await
        }

        async fn draft_of(&self, id: TaskId) -> TaskDraft {
            let task = self.store.get(id).await.unwrap().unwrap();
            let mut draft = TaskDraft::new(task.name, task.rule);
            draft.child_order = task.child_order;
            draft
        }
    }

    #[tokio::test]
    async fn new_task_gets_first_matching_day() {
        let fx = Fixture::new();
        let rule = RecurrenceRule::weekly().on_days([Weekday::Mon, Weekday::Wed, Weekday::Fri]);

        let outcome = fx
            .maintainer
            .save(SaveRequest::create(TaskDraft::new("Clean Kitchen", rule)), today())
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.task.next_due, Some(date(2025, 11, 5)));
        assert_eq!(outcome.task.completion_streak, 0);
        assert!(outcome.task.active);
        assert_eq!(fx.store.get(outcome.task.id).await.unwrap(), Some(outcome.task.clone()));
        assert_eq!(
            fx.sink.events().await,
            vec![DomainEvent::TaskSaved {
                task_id: outcome.task.id,
                created: true,
            }]
        );
    }

    #[tokio::test]
    async fn adhoc_and_explicit_due_dates() {
        let fx = Fixture::new();

        let adhoc = fx
            .maintainer
            .save(
                SaveRequest::create(TaskDraft::new("fix shelf", RecurrenceRule::adhoc())),
                today(),
            )
            .await
            .unwrap();
        assert_eq!(adhoc.task.next_due, None);

        let pinned = fx
            .maintainer
            .save(
                SaveRequest::create(
                    TaskDraft::new("dentist", RecurrenceRule::monthly()).due(date(2025, 12, 1)),
                ),
                today(),
            )
            .await
            .unwrap();
        assert_eq!(pinned.task.next_due, Some(date(2025, 12, 1)));
    }

    #[tokio::test]
    async fn invalid_fields_are_rejected_without_writes() {
        let fx = Fixture::new();

        let err = fx
            .maintainer
            .save(SaveRequest::create(TaskDraft::new("   ", RecurrenceRule::daily())), today())
            .await
            .unwrap_err();
        assert!(matches!(err, CadenceError::Validation(ValidationError::EmptyName)));

        let err = fx
            .maintainer
            .save(
                SaveRequest::create(TaskDraft::new(
                    "broken",
                    RecurrenceRule::new(IntervalUnit::Week, 0),
                )),
                today(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        assert!(fx.store.all_tasks().await.is_empty());
        assert!(fx.sink.events().await.is_empty());
    }

    #[tokio::test]
    async fn self_reference_is_rejected() {
        let fx = Fixture::new();
        let id = fx.create("loop").await;

        let err = fx
            .relate(id, RelationRequest::default().with_triggers([id]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CadenceError::Validation(ValidationError::SelfReference {
                kind: EdgeKind::Triggers,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn parent_and_child_of_same_task_is_a_cycle() {
        let fx = Fixture::new();
        let a = fx.create("a").await;
        let b = fx.create("b").await;

        let err = fx
            .relate(a, RelationRequest::default().with_parents([b]).with_children([b]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CadenceError::Validation(ValidationError::Cycle {
                kind: EdgeKind::ChildOf,
                ..
            })
        ));
        assert_eq!(fx.store.relations(a).await.unwrap(), TaskRelations::default());
    }

    #[tokio::test]
    async fn deeper_cycles_are_rejected_and_nothing_is_written() {
        let fx = Fixture::new();
        let [a, b, c] = [fx.create("a").await, fx.create("b").await, fx.create("c").await];
        fx.relate(a, RelationRequest::default().with_parents([b])).await.unwrap();
        fx.relate(b, RelationRequest::default().with_children([a]).with_parents([c]))
            .await
            .unwrap();

        let before = fx.store.relations(c).await.unwrap();
        assert_eq!(before.children, BTreeSet::from([b]));
        let err = fx
            .relate(c, RelationRequest::default().with_children([b]).with_parents([a]))
            .await
            .unwrap_err();

        match err {
            CadenceError::Validation(ValidationError::Cycle { kind, path }) => {
                assert_eq!(kind, EdgeKind::ChildOf);
                assert_eq!(path, vec![c, a, b, c]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fx.store.relations(c).await.unwrap(), before);
        assert!(fx.store.relations(a).await.unwrap().children.is_empty());
    }

    #[tokio::test]
    async fn trigger_cycles_are_rejected() {
        let fx = Fixture::new();
        let [a, b] = [fx.create("wash").await, fx.create("dry").await];
        fx.relate(a, RelationRequest::default().with_triggers([b])).await.unwrap();

        let err = fx
            .relate(b, RelationRequest::default().with_triggered_by([a]).with_triggers([a]))
            .await
            .unwrap_err();

        match err {
            CadenceError::Validation(ValidationError::Cycle { kind, path }) => {
                assert_eq!(kind, EdgeKind::Triggers);
                assert_eq!(path, vec![b, a, b]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fx.store.relations(b).await.unwrap().triggered_by, BTreeSet::from([a]));
    }

    #[tokio::test]
    async fn omitted_relations_are_dropped_on_save() {
        let fx = Fixture::new();
        let [a, b, c] = [fx.create("a").await, fx.create("b").await, fx.create("c").await];
        fx.relate(a, RelationRequest::default().with_parents([b])).await.unwrap();

        // b's request does not list a as a child any more
        let outcome = fx
            .relate(b, RelationRequest::default().with_parents([c]))
            .await
            .unwrap();

        assert_eq!(outcome.removed, vec![(EdgeKind::ChildOf, a, b)]);
        assert_eq!(outcome.added, vec![(EdgeKind::ChildOf, b, c)]);
        assert!(fx.store.relations(b).await.unwrap().children.is_empty());
        assert!(fx.store.relations(a).await.unwrap().parents.is_empty());
    }

    #[tokio::test]
    async fn edit_reconciles_edge_diff() {
        let fx = Fixture::new();
        let [task, old_parent, new_parent, target] = [
            fx.create("task").await,
            fx.create("old parent").await,
            fx.create("new parent").await,
            fx.create("target").await,
        ];
        let before = RelationRequest::default()
            .with_parents([old_parent])
            .with_triggers([target]);
        fx.relate(task, before).await.unwrap();

        let outcome = fx
            .relate(
                task,
                RelationRequest::default()
                    .with_parents([new_parent])
                    .with_triggers([target]),
            )
            .await
            .unwrap();

        assert_eq!(outcome.removed, vec![(EdgeKind::ChildOf, task, old_parent)]);
        assert_eq!(outcome.added, vec![(EdgeKind::ChildOf, task, new_parent)]);
        assert!(fx.store.relations(old_parent).await.unwrap().children.is_empty());
        assert_eq!(
            fx.store.relations(new_parent).await.unwrap().children,
            BTreeSet::from([task])
        );
        assert_eq!(
            fx.store.relations(target).await.unwrap().triggered_by,
            BTreeSet::from([task])
        );
    }

    #[tokio::test]
    async fn missing_references_are_skipped() {
        let fx = Fixture::new();
        let real = fx.create("real").await;
        let ghost = TaskId::from_ulid(Ulid::new());

        let outcome = fx
            .maintainer
            .save(
                SaveRequest::create(TaskDraft::new("child", RecurrenceRule::daily()))
                    .with_relations(RelationRequest::default().with_parents([real, ghost])),
                today(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.skipped, vec![ghost]);
        assert_eq!(outcome.added, vec![(EdgeKind::ChildOf, outcome.task.id, real)]);
    }

    #[tokio::test]
    async fn edit_keeps_schedule_state() {
        let fx = Fixture::new();
        let id = fx.create("floss").await;
        let mut tx = fx.store.begin().await.unwrap();
        let mut task = tx.get(id).await.unwrap().unwrap();
        task.mark_completed(today(), Some(date(2025, 11, 5)));
        tx.update(&task).await.unwrap();
        tx.commit().await.unwrap();

        let outcome = fx
            .maintainer
            .save(
                SaveRequest::edit(id, TaskDraft::new("floss twice", RecurrenceRule::daily())),
                today(),
            )
            .await
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.task.name, "floss twice");
        assert_eq!(outcome.task.completion_streak, 1);
        assert_eq!(outcome.task.last_completed, Some(today()));
        assert_eq!(outcome.task.next_due, Some(date(2025, 11, 5)));
    }

    #[tokio::test]
    async fn adhoc_edited_into_recurring_gets_a_due_date() {
        let fx = Fixture::new();
        let id = fx
            .maintainer
            .save(
                SaveRequest::create(TaskDraft::new("bake bread", RecurrenceRule::adhoc())),
                today(),
            )
            .await
            .unwrap()
            .task
            .id;
        assert_eq!(fx.store.get(id).await.unwrap().unwrap().next_due, None);

        let fridays = RecurrenceRule::weekly().on_days([Weekday::Fri]);
        let outcome = fx
            .maintainer
            .save(SaveRequest::edit(id, TaskDraft::new("bake bread", fridays)), today())
            .await
            .unwrap();

        assert_eq!(outcome.task.next_due, Some(date(2025, 11, 7)));
        assert!(outcome.conflict.is_none());
        let visible = fx.store.query_due_on_or_before(date(2025, 11, 7)).await.unwrap();
        assert!(visible.iter().any(|t| t.id == id));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let fx = Fixture::new();
        let ghost = TaskId::from_ulid(Ulid::new());

        let err = fx
            .maintainer
            .save(
                SaveRequest::edit(ghost, TaskDraft::new("ghost", RecurrenceRule::daily())),
                today(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(fx.maintainer.delete(ghost).await.unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(fx.maintainer.relations(ghost).await.unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn archive_restore_and_delete() {
        let fx = Fixture::new();
        let parent = fx.create("parent").await;
        let child = fx.create("child").await;
        fx.relate(child, RelationRequest::default().with_parents([parent])).await.unwrap();

        let archived = fx.maintainer.archive(child).await.unwrap();
        assert!(!archived.active);
        let visible = fx.store.query_due_on_or_before(date(2026, 1, 1)).await.unwrap();
        assert!(visible.iter().all(|t| t.id != child));

        let restored = fx.maintainer.restore(child).await.unwrap();
        assert!(restored.active);

        fx.maintainer.delete(child).await.unwrap();
        assert!(fx.store.get(child).await.unwrap().is_none());
        assert!(fx.maintainer.relations(parent).await.unwrap().children.is_empty());
    }
}
