//! App - アプリケーション層
//!
//! このモジュールは、ports と engine を組み合わせて表示層向けの入口を提供します。
//!
//! # 主要コンポーネント
//! - **TrackerBuilder**: Tracker の構築とワイヤリング（Fail-fast 検証）
//! - **Tracker**: toggle / save / roll_over / 一覧取得のファサード
//! - **RolloverLoop**: 日付の変化を監視して繰り越し処理を起動

pub mod builder;
pub mod rollover_loop;
pub mod tracker;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, TrackerBuilder};
pub use self::rollover_loop::RolloverLoop;
pub use self::tracker::Tracker;
