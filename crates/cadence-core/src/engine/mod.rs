//! Engine - スケジューリングと完了処理の本体
//!
//! # 主要コンポーネント
//! - **RecurrenceCalculator**: 次回日付の計算（純粋関数）
//! - **CompletionEngine**: 完了トグルと親・トリガーへのカスケード
//! - **OverdueProcessor**: 日付繰り越し時のストリーク・日付の調整
//! - **RelationshipGraphMaintainer**: 保存時の検証と関係グラフの整合

pub mod completion;
pub mod overdue;
pub mod recurrence;
pub mod relations;

pub use self::completion::{CompletionEngine, ToggleReport, Transition};
pub use self::overdue::{OverdueProcessor, Reschedule, RolloverReport};
pub use self::recurrence::{RecurrenceCalculator, Schedule, SearchLimits, next_due};
pub use self::relations::{Edge, RelationshipGraphMaintainer, SaveOutcome, SaveRequest};
