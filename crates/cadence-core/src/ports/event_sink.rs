//! EventSink port - イベント記録の抽象化
//!
//! # 実装
//! - NoopEventSink: 何もしない（デフォルト）
//! - RecordingEventSink: メモリに溜める（テスト用）

use async_trait::async_trait;

use crate::domain::DomainEvent;

/// EventSink はコミット済みのドメインイベントを受け取る
///
/// 配送失敗でコアの処理を止めないため、戻り値はありません。
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: DomainEvent);

    async fn emit_all(&self, events: Vec<DomainEvent>) {
        for event in events {
            self.emit(event).await;
        }
    }
}
