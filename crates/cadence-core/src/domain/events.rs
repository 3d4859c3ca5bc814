//! Events - ドメインイベント
//!
//! コミット済みの作業単位ごとに EventSink へ送られます。
//! ロールバックされた変更のイベントは送りません。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Why a bounded date search fell back to the unmodified candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingConflict {
    /// No weekday in the specific-day set was found inside the search window.
    NoMatchingWeekday,
    /// Every date inside the exclusion search limit was excluded.
    ExclusionsExhausted,
}

/// Why one branch of a cascade was abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeFailure {
    /// The related task no longer exists.
    Missing,
    /// The store rejected a read or write for the related task.
    Store(String),
}

/// A cascade step that was skipped while the primary change still committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeWarning {
    /// Task whose cascade was being evaluated.
    pub from: TaskId,
    /// Related task the step was about.
    pub related: TaskId,
    pub failure: CascadeFailure,
}

/// DomainEvent はドメインで発生したイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    TaskSaved {
        task_id: TaskId,
        created: bool,
    },
    TaskArchived {
        task_id: TaskId,
    },
    TaskRestored {
        task_id: TaskId,
    },
    TaskDeleted {
        task_id: TaskId,
    },
    TaskCompleted {
        task_id: TaskId,
        on: NaiveDate,
        streak: u32,
        next_due: Option<NaiveDate>,
        /// Completed by the parent cascade rather than by the user.
        cascaded: bool,
    },
    TaskUncompleted {
        task_id: TaskId,
        on: NaiveDate,
        cascaded: bool,
    },
    TaskActivated {
        task_id: TaskId,
        by: TaskId,
        on: NaiveDate,
    },
    StreakReset {
        task_id: TaskId,
        previous: u32,
    },
    TaskRescheduled {
        task_id: TaskId,
        from: Option<NaiveDate>,
        to: NaiveDate,
    },
    SchedulingConflict {
        task_id: TaskId,
        conflict: SchedulingConflict,
    },
    CascadeSkipped(CascadeWarning),
}

impl DomainEvent {
    /// The task the event is about.
    pub fn task_id(&self) -> TaskId {
        match self {
            DomainEvent::TaskSaved { task_id, .. }
            | DomainEvent::TaskArchived { task_id }
            | DomainEvent::TaskRestored { task_id }
            | DomainEvent::TaskDeleted { task_id }
            | DomainEvent::TaskCompleted { task_id, .. }
            | DomainEvent::TaskUncompleted { task_id, .. }
            | DomainEvent::TaskActivated { task_id, .. }
            | DomainEvent::StreakReset { task_id, .. }
            | DomainEvent::TaskRescheduled { task_id, .. }
            | DomainEvent::SchedulingConflict { task_id, .. } => *task_id,
            DomainEvent::CascadeSkipped(warning) => warning.from,
        }
    }
}
