//! 学習・最適化オプション
//!
//! オプションは JSON ファイルとして読み書きする。ハイパーパラメータの
//! 上書きは JSON オブジェクト表現の上で行い、型の合わない値は
//! デシリアライズ時に `Validation` エラーとして弾く。

use crate::error::{IalsError, Result};
use crate::optimize::{ParamSet, ParamValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// 探索空間の 1 パラメータ分の記述: `["uniform", ["label", low, high]]`
pub type SpaceEntry = (String, Vec<serde_json::Value>);

/// 試行が失敗したときの扱い
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// ソルバの失敗をそのまま伝播して最適化を打ち切る
    #[default]
    Abort,
    /// 失敗した試行を損失 +inf で台帳に記録して続行する
    Record,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationOptions {
    /// ランキング指標の上位件数
    pub topk: usize,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self { topk: 10 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    /// 最小化するメトリクス名（`train_loss`, `val_rmse` など）
    pub loss: String,
    /// 試行回数の上限。負値は無制限
    pub max_trials: i64,
    /// この試行番号までの改善のみデプロイする。0 / null はゲートなし
    pub min_trials: Option<usize>,
    pub deployment: bool,
    pub start_with_default_parameters: bool,
    pub space: BTreeMap<String, SpaceEntry>,
    pub on_failure: FailurePolicy,
    /// 探索アルゴリズムの乱数シード（未指定時は random_seed を使う）
    pub seed: Option<u64>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            loss: "train_loss".to_string(),
            max_trials: 100,
            min_trials: None,
            deployment: true,
            start_with_default_parameters: true,
            space: BTreeMap::new(),
            on_failure: FailurePolicy::Abort,
            seed: None,
        }
    }
}

impl OptimizeOptions {
    /// 残り試行数。`None` は無制限
    pub fn budget(&self) -> Option<usize> {
        usize::try_from(self.max_trials).ok()
    }

    /// デプロイを許す最大試行番号
    pub fn min_trials_gate(&self) -> Option<usize> {
        self.min_trials.filter(|&n| n > 0)
    }
}

/// ALS の全オプション
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlsOptions {
    pub num_iters: usize,
    /// 因子の次元
    pub d: usize,
    pub reg_u: f64,
    pub reg_i: f64,
    /// 信頼度の重み（c = 1 + alpha * r）
    pub alpha: f64,
    pub eps: f64,
    pub num_workers: usize,
    /// 1 バッチあたりの最大エントリ数
    pub batch_size: usize,
    pub random_seed: u64,
    /// None で検証なし
    pub validation: Option<ValidationOptions>,
    pub evaluation_on_learning: bool,
    pub evaluation_period: usize,
    /// 連続して損失が悪化したら打ち切る回数。0 で無効
    pub early_stopping_rounds: usize,
    pub save_best: bool,
    pub save_period: usize,
    pub model_path: Option<PathBuf>,
    /// 進捗バーを表示するか
    pub progress: bool,
    pub optimize: OptimizeOptions,
}

impl Default for AlsOptions {
    fn default() -> Self {
        Self {
            num_iters: 10,
            d: 20,
            reg_u: 0.1,
            reg_i: 0.1,
            alpha: 8.0,
            eps: 1e-10,
            num_workers: 1,
            batch_size: 1 << 20,
            random_seed: 0,
            validation: None,
            evaluation_on_learning: true,
            evaluation_period: 1,
            early_stopping_rounds: 0,
            save_best: false,
            save_period: 1,
            model_path: None,
            progress: false,
            optimize: OptimizeOptions::default(),
        }
    }
}

impl AlsOptions {
    /// JSON ファイルから読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let p = path.as_ref();
        let file = File::open(p).map_err(|e| {
            IalsError::Configuration(format!("cannot open option file {}: {e}", p.display()))
        })?;
        let opt: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            IalsError::Configuration(format!("cannot parse option file {}: {e}", p.display()))
        })?;
        opt.validate()
            .map_err(|e| IalsError::Configuration(format!("{}: {e}", p.display())))?;
        Ok(opt)
    }

    /// JSON ファイルとして書き出す
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut w = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut w, self)?;
        w.flush()?;
        Ok(())
    }

    /// 値の整合性チェック
    pub fn validate(&self) -> Result<()> {
        if self.num_iters == 0 {
            return Err(IalsError::Configuration("num_iters must be >= 1".to_string()));
        }
        if self.d == 0 {
            return Err(IalsError::Configuration("d must be >= 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(IalsError::Configuration("batch_size must be >= 1".to_string()));
        }
        if self.validation.is_some() && self.evaluation_on_learning && self.evaluation_period == 0
        {
            return Err(IalsError::Configuration(
                "evaluation_period must be >= 1".to_string(),
            ));
        }
        if self.save_best && self.save_period == 0 {
            return Err(IalsError::Configuration("save_period must be >= 1".to_string()));
        }
        Ok(())
    }

    /// 探索アルゴリズムの乱数シード
    pub fn search_seed(&self) -> u64 {
        self.optimize.seed.unwrap_or(self.random_seed)
    }

    /// トップレベルのオプション名として存在するか
    pub fn recognizes(&self, name: &str) -> Result<bool> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map.contains_key(name)),
            _ => Ok(false),
        }
    }

    /// パラメータを上書きした新しいオプションを返す
    pub fn with_params(&self, params: &ParamSet) -> Result<Self> {
        let serde_json::Value::Object(mut map) = serde_json::to_value(self)? else {
            return Err(IalsError::Runtime("options must serialize to an object".to_string()));
        };
        for (name, value) in params {
            let Some(current) = map.get(name) else {
                return Err(IalsError::Validation(format!("Unexpected parameter: {name}")));
            };
            let next = coerce(current, value)?;
            map.insert(name.clone(), next);
        }
        let opt: Self = serde_json::from_value(serde_json::Value::Object(map))
            .map_err(|e| IalsError::Validation(format!("invalid parameters {params:?}: {e}")))?;
        opt.validate()
            .map_err(|e| IalsError::Validation(format!("invalid parameters {params:?}: {e}")))?;
        Ok(opt)
    }
}

/// 整数型のオプションへ整数値の浮動小数を入れる場合は整数に直す
fn coerce(current: &serde_json::Value, value: &ParamValue) -> Result<serde_json::Value> {
    let int_slot = current.is_i64() || current.is_u64();
    match value {
        ParamValue::Float(f) if int_slot && f.fract() == 0.0 => Ok((*f as i64).into()),
        _ => value.to_json(),
    }
}
