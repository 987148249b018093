//! 部分更新ソルバのインターフェース
//!
//! 数値カーネル本体は外部実装。学習ループは因子行列を所有したまま、
//! 各呼び出しに参照として渡す。

use crate::data::{Batch, Group};
use crate::error::Result;
use crate::factors::Factors;
use std::path::Path;

pub trait Solver {
    /// オプションファイルを読み込む。解釈できなければ `false`
    fn init(&mut self, options_path: &Path) -> Result<bool>;

    /// 新しく確保された因子行列を受け取る
    fn initialize_model(&mut self, factors: &Factors) -> Result<()>;

    /// 外側の反復ごと・グループごとに 1 回だけ呼ばれる前計算
    /// （固定側の行列から作るグラム行列など）
    fn precompute(&mut self, factors: &Factors, group: Group) -> Result<()>;

    /// バッチのセグメントに属する行を更新し、累積誤差を返す
    fn partial_update(&mut self, factors: &mut Factors, batch: &Batch, group: Group)
    -> Result<f64>;
}
