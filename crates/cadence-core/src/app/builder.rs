//! TrackerBuilder - Tracker の構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンの実装
//! - 起動時検証（Fail-fast 設計）
//! - 省略した協調者にはデフォルト実装を差し込む

use std::sync::Arc;

use crate::config::{ConfigError, SchedulerConfig};
use crate::engine::{
    CompletionEngine, OverdueProcessor, RecurrenceCalculator, RelationshipGraphMaintainer,
};
use crate::impls::NoopEventSink;
use crate::ports::{Clock, EventSink, IdGenerator, SystemClock, TaskStore, UlidGenerator};

use super::tracker::Tracker;

/// TrackerBuilder は Tracker を構築
///
/// # 使用例
/// ```ignore
/// let tracker = TrackerBuilder::new()
///     .store(InMemoryTaskStore::new())
///     .clock(FixedClock::on(today))
///     .build()?;
/// ```
///
/// # デフォルト
/// - clock: `SystemClock`
/// - ids: clock を使う `UlidGenerator`
/// - events: `NoopEventSink`
/// - store は必須（無ければ `BuildError::MissingStore`）
#[derive(Default)]
pub struct TrackerBuilder {
    store: Option<Arc<dyn TaskStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    events: Option<Arc<dyn EventSink>>,
    config: SchedulerConfig,
}

/// BuildError は Tracker 構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no task store configured; call `store()` before `build()`")]
    MissingStore,

    #[error("invalid scheduler config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl TrackerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(mut self, store: impl TaskStore + 'static) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    pub fn shared_store(mut self, store: Arc<dyn TaskStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn id_generator(mut self, ids: impl IdGenerator + 'static) -> Self {
        self.ids = Some(Arc::new(ids));
        self
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// # 検証
    /// - store が設定されているか
    /// - config の各値が範囲内か
    pub fn build(self) -> Result<Tracker, BuildError> {
        let store = self.store.ok_or(BuildError::MissingStore)?;
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let events = self.events.unwrap_or_else(|| Arc::new(NoopEventSink));
        let calculator = RecurrenceCalculator::new(self.config.search);

        let completion = CompletionEngine::new(Arc::clone(&store), Arc::clone(&events), calculator)
            .with_ancestor_triggers(self.config.ancestors_fire_triggers);
        let overdue = OverdueProcessor::new(Arc::clone(&store), Arc::clone(&events), calculator);
        let maintainer =
            RelationshipGraphMaintainer::new(Arc::clone(&store), events, ids, calculator);

        Ok(Tracker::new(
            store,
            clock,
            completion,
            overdue,
            maintainer,
            self.config,
        ))
    }
}
