//! 暗黙的フィードバック向け ALS モデルの学習ドライバとハイパーパラメータ最適化
//!
//! - [`data`]: 疎行列データソースとバッファ付きバッチフィーダ
//! - [`solver`]: 部分更新を担う外部ソルバのインターフェース
//! - [`als`]: rowwise/colwise を交互に回す学習ループ
//! - [`optimize`]: 試行履歴を持つ逐次ハイパーパラメータ探索

pub mod als;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod factors;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod optimize;
pub mod options;
pub mod solver;
pub mod traits;

pub use als::{Als, IterateReport, rmse};
pub use data::{Batch, BufferedFeeder, DataSource, Group, Header, SparseMatrix};
pub use error::{IalsError, Result};
pub use evaluate::{Evaluator, HoldoutEvaluator};
pub use factors::{FactorMatrix, Factors};
pub use logging::Logger;
pub use metrics::Metrics;
pub use model::AlsModel;
pub use optimize::{
    Distribution, OptimizationState, Optimizer, ParamSet, ParamValue, RandomSearch,
    SearchAlgorithm, SearchSpace, StopReason, TrialRecord, TrialStatus,
};
pub use options::{AlsOptions, FailurePolicy, OptimizeOptions, ValidationOptions};
pub use solver::Solver;
pub use traits::{Optimizable, Persistable, Trainable};
