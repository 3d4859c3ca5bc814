//! InMemoryTaskStore - 開発用・テスト用のストア
//!
//! # 実装詳細
//! - `Arc<Mutex<StoreState>>` で状態を共有
//! - トランザクション = 所有権付きロック（OwnedMutexGuard）+ 作業用コピー
//! - `commit` で作業用コピーを書き戻す。drop すれば何も残らない
//!
//! ロックをトランザクションの間ずっと握るので、書き込みは直列化されます。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{EdgeKind, RelationGraph, Task, TaskId, TaskRelations};
use crate::ports::{StoreError, TaskStore, TaskTransaction};

/// All tasks + the relationship graph.
#[derive(Debug, Clone, Default)]
struct StoreState {
    tasks: HashMap<TaskId, Task>,
    graph: RelationGraph,

    /// Ids whose reads fail (fault injection for cascade tests).
    #[cfg(test)]
    faults: std::collections::HashSet<TaskId>,
}

impl StoreState {
    #[cfg(test)]
    fn check(&self, id: TaskId) -> Result<(), StoreError> {
        if self.faults.contains(&id) {
            return Err(StoreError::Unavailable(format!("injected fault for {id}")));
        }
        Ok(())
    }

    #[cfg(not(test))]
    fn check(&self, _id: TaskId) -> Result<(), StoreError> {
        Ok(())
    }

    fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        self.check(id)?;
        Ok(self.tasks.get(&id).cloned())
    }

    /// Load the given ids, skipping ones that no longer exist.
    fn load(&self, ids: BTreeSet<TaskId>) -> Result<Vec<Task>, StoreError> {
        let mut tasks = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(task) = self.get(id)? {
                tasks.push(task);
            }
        }
        Ok(tasks)
    }

    fn select(&self, predicate: impl Fn(&Task) -> bool) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| predicate(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| (a.next_due, &a.name, a.id).cmp(&(b.next_due, &b.name, b.id)));
        tasks
    }

    fn children(&self, parent: TaskId) -> Result<Vec<Task>, StoreError> {
        let mut children = self.load(self.graph.sources(EdgeKind::ChildOf, parent))?;
        children.sort_by(|a, b| (a.child_order, &a.name).cmp(&(b.child_order, &b.name)));
        Ok(children)
    }

    fn parents(&self, child: TaskId) -> Result<Vec<Task>, StoreError> {
        self.load(self.graph.targets(EdgeKind::ChildOf, child))
    }

    fn triggered_by(&self, source: TaskId) -> Result<Vec<Task>, StoreError> {
        self.load(self.graph.targets(EdgeKind::Triggers, source))
    }

    fn triggers_of(&self, target: TaskId) -> Result<Vec<Task>, StoreError> {
        self.load(self.graph.sources(EdgeKind::Triggers, target))
    }

    fn due_on_or_before(&self, date: NaiveDate) -> Vec<Task> {
        self.select(|t| t.is_visible_on(date))
    }

    fn overdue(&self, date: NaiveDate) -> Vec<Task> {
        self.select(|t| t.is_overdue_on(date))
    }
}

/// In-memory TaskStore.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every task, active or not (for dumps and demos).
    pub async fn all_tasks(&self) -> Vec<Task> {
        let state = self.state.lock().await;
        state.select(|_| true)
    }

    /// Make every read of `id` fail with `StoreError::Unavailable`.
    #[cfg(test)]
    pub(crate) async fn inject_fault(&self, id: TaskId) {
        self.state.lock().await.faults.insert(id);
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn begin(&self) -> Result<Box<dyn TaskTransaction>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = StoreState::clone(&guard);
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError> {
        self.state.lock().await.get(id)
    }

    async fn query_due_on_or_before(&self, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        Ok(self.state.lock().await.due_on_or_before(date))
    }

    async fn query_overdue(&self, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        Ok(self.state.lock().await.overdue(date))
    }

    async fn relations(&self, id: TaskId) -> Result<TaskRelations, StoreError> {
        Ok(self.state.lock().await.graph.relations(id))
    }

    async fn children(&self, parent: TaskId) -> Result<Vec<Task>, StoreError> {
        self.state.lock().await.children(parent)
    }

    async fn parents(&self, child: TaskId) -> Result<Vec<Task>, StoreError> {
        self.state.lock().await.parents(child)
    }

    async fn triggered_by(&self, source: TaskId) -> Result<Vec<Task>, StoreError> {
        self.state.lock().await.triggered_by(source)
    }

    async fn triggers_of(&self, target: TaskId) -> Result<Vec<Task>, StoreError> {
        self.state.lock().await.triggers_of(target)
    }
}

/// Transaction implementation for InMemoryTaskStore.
struct InMemoryTransaction {
    guard: OwnedMutexGuard<StoreState>,
    working: StoreState,
}

#[async_trait]
impl TaskTransaction for InMemoryTransaction {
    async fn get(&mut self, id: TaskId) -> Result<Option<Task>, StoreError> {
        self.working.get(id)
    }

    async fn insert(&mut self, task: Task) -> Result<TaskId, StoreError> {
        let id = task.id;
        if self.working.tasks.contains_key(&id) {
            return Err(StoreError::DuplicateId(id));
        }
        self.working.tasks.insert(id, task);
        Ok(id)
    }

    async fn update(&mut self, task: &Task) -> Result<(), StoreError> {
        self.working.check(task.id)?;
        match self.working.tasks.get_mut(&task.id) {
            Some(slot) => {
                *slot = task.clone();
                Ok(())
            }
            None => Err(StoreError::UnknownTask(task.id)),
        }
    }

    async fn delete(&mut self, id: TaskId) -> Result<bool, StoreError> {
        let existed = self.working.tasks.remove(&id).is_some();
        self.working.graph.remove_task(id);
        Ok(existed)
    }

    async fn children(&mut self, parent: TaskId) -> Result<Vec<Task>, StoreError> {
        self.working.children(parent)
    }

    async fn edges(
        &mut self,
        kind: EdgeKind,
        from: TaskId,
    ) -> Result<BTreeSet<TaskId>, StoreError> {
        Ok(self.working.graph.targets(kind, from))
    }

    async fn add_edge(
        &mut self,
        kind: EdgeKind,
        from: TaskId,
        to: TaskId,
    ) -> Result<(), StoreError> {
        self.working.graph.add_edge(kind, from, to);
        Ok(())
    }

    async fn remove_edge(
        &mut self,
        kind: EdgeKind,
        from: TaskId,
        to: TaskId,
    ) -> Result<(), StoreError> {
        self.working.graph.remove_edge(kind, from, to);
        Ok(())
    }

    async fn relations(&mut self, id: TaskId) -> Result<TaskRelations, StoreError> {
        Ok(self.working.graph.relations(id))
    }

    async fn query_overdue(&mut self, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        Ok(self.working.overdue(date))
    }

    async fn query_due_on_or_before(&mut self, date: NaiveDate) -> Result<Vec<Task>, StoreError> {
        Ok(self.working.due_on_or_before(date))
    }

    async fn all_active(&mut self) -> Result<Vec<Task>, StoreError> {
        Ok(self.working.select(|t| t.active))
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
