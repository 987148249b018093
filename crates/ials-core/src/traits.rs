//! 学習ランを構成する能力インターフェース
//!
//! 具体的な学習ラン（[`crate::Als`]）はこれらを実装し、
//! 最適化ループは [`Optimizable`] だけを通して扱う。

use crate::error::Result;
use crate::logging::Logger;
use crate::metrics::Metrics;
use crate::optimize::ParamSet;
use crate::options::OptimizeOptions;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub trait Trainable {
    /// 因子行列を（再）確保する
    fn initialize(&mut self) -> Result<()>;

    /// 学習を最後まで実行し、メトリクスを返す
    fn train(&mut self) -> Result<Metrics>;

    /// 協調的な中断フラグ
    fn interrupt_flag(&self) -> Arc<AtomicBool>;
}

pub trait Persistable {
    /// 現在のモデルを `path` に保存する
    fn dump(&self, path: &Path) -> Result<()>;
}

pub trait Optimizable: Trainable + Persistable {
    fn optimize_options(&self) -> &OptimizeOptions;

    fn model_path(&self) -> Option<&Path>;

    fn logger(&self) -> &Logger;

    /// 1 試行: `params` を反映したオプションを `scratch` に書き出し、
    /// 再初期化して学習する。`params` が空なら現在のオプションのまま。
    fn run_trial(&mut self, params: &ParamSet, scratch: &Path) -> Result<Metrics>;
}
