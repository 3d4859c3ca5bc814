//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! タスクの ID は ULID で表現します。生成順にソートでき、
//! ストレージ側の採番に依存せずに作れます。
//!
//! ## Phantom Type パターン
//! `Id<T>` の `T` は実行時には使わないマーカー型です。
//! 今はタスクだけですが、他のエンティティが増えても
//! ID 同士を取り違えないようにしておきます。
//!
//! 表示形式は `task-01J...` のように prefix + ULID です。
//! serde でも同じ文字列形式を使います（prefix なしの ULID も読めます）。

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// Display で使うプレフィックス（例: "task-"）
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Failed to parse an id from its string form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id '{input}': {reason}")]
pub struct ParseIdError {
    pub input: String,
    pub reason: String,
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(T::prefix()).unwrap_or(s);
        Ulid::from_string(raw)
            .map(Self::from_ulid)
            .map_err(|e| ParseIdError {
                input: s.to_string(),
                reason: e.to_string(),
            })
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Task のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskMarker {}

impl IdMarker for TaskMarker {
    fn prefix() -> &'static str {
        "task-"
    }
}

/// Identifier of a tracked task.
pub type TaskId = Id<TaskMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_prefix() {
        let ulid = Ulid::new();
        let id = TaskId::from_ulid(ulid);
        assert_eq!(id.to_string(), format!("task-{ulid}"));
    }

    #[test]
    fn parses_with_and_without_prefix() {
        let ulid = Ulid::new();
        let with: TaskId = format!("task-{ulid}").parse().unwrap();
        let without: TaskId = ulid.to_string().parse().unwrap();
        assert_eq!(with, without);
        assert_eq!(with.as_ulid(), ulid);
    }

    #[test]
    fn rejects_garbage() {
        let err = "task-not-a-ulid".parse::<TaskId>().unwrap_err();
        assert_eq!(err.input, "task-not-a-ulid");
    }

    #[test]
    fn serializes_as_display_string() {
        let id = TaskId::from_ulid(Ulid::new());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));

        let back: TaskId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn phantom_data_does_not_consume_memory() {
        use std::mem::size_of;
        assert_eq!(size_of::<TaskId>(), size_of::<Ulid>());
    }
}
