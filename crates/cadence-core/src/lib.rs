//! cadence-core
//!
//! Scheduling and completion engine for recurring personal tasks.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, recurrence, task, relations, errors, events）
//! - **ports**: 抽象化レイヤー（TaskStore, Clock, IdGenerator, EventSink）
//! - **engine**: RecurrenceCalculator, CompletionEngine, OverdueProcessor, RelationshipGraphMaintainer
//! - **app**: TrackerBuilder, Tracker, RolloverLoop
//! - **impls**: 実装（InMemoryTaskStore など開発用）
//! - **config**: SchedulerConfig（JSON 読み込み + 検証）

pub mod app;
pub mod config;
pub mod domain;
pub mod engine;
pub mod impls;
pub mod ports;

pub use self::app::{BuildError, RolloverLoop, Tracker, TrackerBuilder};
pub use self::config::{ConfigError, SchedulerConfig};
pub use self::domain::{CadenceError, ErrorKind, Task, TaskDraft, TaskId};
