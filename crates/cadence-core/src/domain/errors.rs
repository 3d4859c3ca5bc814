//! Errors - エラー型と分類
//!
//! - NotFound: 参照先のタスクが存在しない
//! - Validation: 保存前の検証エラー（書き込みは一切行わない）
//! - Persistence: ストアが読み書きを拒否した

use thiserror::Error;

use super::ids::TaskId;
use super::recurrence::IntervalUnit;
use super::relations::EdgeKind;
use crate::ports::task_store::StoreError;

/// Coarse classification for callers that only branch on the category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Persistence,
}

/// Rejected before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task name must not be empty")]
    EmptyName,

    #[error("interval quantity {quantity} is invalid for unit {unit}")]
    InvalidInterval { unit: IntervalUnit, quantity: u32 },

    #[error("{task} cannot reference itself as {kind}")]
    SelfReference { task: TaskId, kind: EdgeKind },

    #[error("{kind} edge would close a cycle: {path:?}")]
    Cycle { kind: EdgeKind, path: Vec<TaskId> },
}

/// CadenceError はコア全体のエラー
#[derive(Debug, Error)]
pub enum CadenceError {
    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl CadenceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CadenceError::NotFound(_) => ErrorKind::NotFound,
            CadenceError::Validation(_) => ErrorKind::Validation,
            CadenceError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_variant() {
        let err: CadenceError = ValidationError::EmptyName.into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: CadenceError = StoreError::Unavailable("disk full".into()).into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn invalid_interval_message_names_unit() {
        let err = ValidationError::InvalidInterval {
            unit: IntervalUnit::Week,
            quantity: 0,
        };
        assert_eq!(err.to_string(), "interval quantity 0 is invalid for unit week");
    }
}
