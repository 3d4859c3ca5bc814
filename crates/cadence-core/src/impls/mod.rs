//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryTaskStore**: テスト・デモ用の正本（トランザクション付き）
//! - **NoopEventSink** / **RecordingEventSink**: イベントの破棄 / 記録
//!
//! # 本番用実装
//! 永続化エンジンは外部の協調者です。`TaskStore` / `TaskTransaction` を実装した
//! 別クレートを `TrackerBuilder::store` に渡してください。

pub mod event_sink;
pub mod inmem_store;

// 主要な型を再エクスポート
pub use self::event_sink::{NoopEventSink, RecordingEventSink};
pub use self::inmem_store::InMemoryTaskStore;
