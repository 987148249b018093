//! ハイパーパラメータ最適化
//!
//! - [`space`]: 探索空間の記述と候補のサンプリング
//! - [`ledger`]: 試行の台帳とベスト
//! - [`search`]: 探索アルゴリズム
//! - [`driver`]: 試行を回してデプロイする最適化ループ

pub mod driver;
pub mod ledger;
pub mod scratch;
pub mod search;
pub mod space;

pub use driver::{Optimizer, StopReason, TrialCallback};
pub use ledger::{OptimizationState, TrialRecord, TrialStatus};
pub use scratch::ScratchOptions;
pub use search::{RandomSearch, SearchAlgorithm};
pub use space::{Distribution, ParamSet, ParamValue, SearchSpace};
