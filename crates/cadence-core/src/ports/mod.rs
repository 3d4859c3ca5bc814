//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部の協調者（永続化、時計、ID 採番、イベント配送）への
//! インターフェースです。コアはこれらの trait にだけ依存します。

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod task_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::{StoreError, TaskStore, TaskTransaction};
