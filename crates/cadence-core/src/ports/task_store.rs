//! TaskStore port - タスクと関係グラフの正本（source of truth）
//!
//! TaskStore は以下を管理します：
//! - タスクレコード（スケジュール状態を含む）
//! - 関係グラフ（ChildOf / Triggers の辺）
//!
//! # 設計原則
//! - 書き込みはすべて `TaskTransaction` 経由
//! - カスケード（本人・祖先・トリガー先）は 1 トランザクションに収める
//! - `commit` しないまま drop したトランザクションはロールバック
//! - トランザクション実行中、他の書き込みは待たされる

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{EdgeKind, Task, TaskId, TaskRelations};

/// StoreError はストア側の失敗
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("task id already exists: {0}")]
    DuplicateId(TaskId),

    #[error("cannot update unknown task: {0}")]
    UnknownTask(TaskId),
}

/// Read access outside of a transaction plus the transaction entry point.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Open a transaction. Held until `commit` or drop.
    async fn begin(&self) -> Result<Box<dyn TaskTransaction>, StoreError>;

    async fn get(&self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Active tasks with `next_due <= date`, or completed on `date`.
    async fn query_due_on_or_before(&self, date: NaiveDate) -> Result<Vec<Task>, StoreError>;

    /// Active tasks with `next_due < date`.
    async fn query_overdue(&self, date: NaiveDate) -> Result<Vec<Task>, StoreError>;

    async fn relations(&self, id: TaskId) -> Result<TaskRelations, StoreError>;

    /// Children of `parent`, ordered by `child_order`.
    async fn children(&self, parent: TaskId) -> Result<Vec<Task>, StoreError>;

    async fn parents(&self, child: TaskId) -> Result<Vec<Task>, StoreError>;

    /// Tasks that `source` activates on completion.
    async fn triggered_by(&self, source: TaskId) -> Result<Vec<Task>, StoreError>;

    /// Tasks whose completion activates `target`.
    async fn triggers_of(&self, target: TaskId) -> Result<Vec<Task>, StoreError>;
}

/// A unit of work against the store.
///
/// Reads observe the transaction's own writes.
#[async_trait]
pub trait TaskTransaction: Send {
    async fn get(&mut self, id: TaskId) -> Result<Option<Task>, StoreError>;

    /// Insert a new task. Fails with `DuplicateId` if the id is taken.
    async fn insert(&mut self, task: Task) -> Result<TaskId, StoreError>;

    /// Overwrite an existing task. Fails with `UnknownTask` otherwise.
    async fn update(&mut self, task: &Task) -> Result<(), StoreError>;

    /// Hard delete; prunes every edge touching the task. Returns false if absent.
    async fn delete(&mut self, id: TaskId) -> Result<bool, StoreError>;

    /// Children of `parent`, ordered by `child_order`.
    async fn children(&mut self, parent: TaskId) -> Result<Vec<Task>, StoreError>;

    /// Outgoing `kind` edges of `from` (parents for `ChildOf`, targets for `Triggers`).
    async fn edges(&mut self, kind: EdgeKind, from: TaskId)
    -> Result<BTreeSet<TaskId>, StoreError>;

    async fn add_edge(&mut self, kind: EdgeKind, from: TaskId, to: TaskId)
    -> Result<(), StoreError>;

    async fn remove_edge(
        &mut self,
        kind: EdgeKind,
        from: TaskId,
        to: TaskId,
    ) -> Result<(), StoreError>;

    async fn relations(&mut self, id: TaskId) -> Result<TaskRelations, StoreError>;

    async fn query_overdue(&mut self, date: NaiveDate) -> Result<Vec<Task>, StoreError>;

    async fn query_due_on_or_before(&mut self, date: NaiveDate) -> Result<Vec<Task>, StoreError>;

    async fn all_active(&mut self) -> Result<Vec<Task>, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
