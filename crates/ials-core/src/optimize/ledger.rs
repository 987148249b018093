//! 試行の台帳
//!
//! 追記のみ。記録済みの試行は書き換えない。

use super::space::ParamSet;
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    Ok,
    /// 学習が失敗した試行（損失は +inf）
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// 記録順の通し番号（0 始まり）
    pub index: usize,
    pub parameters: ParamSet,
    pub loss: f64,
    pub metrics: Metrics,
    pub status: TrialStatus,
    pub timestamp: DateTime<Utc>,
    /// 既定パラメータでの試行
    pub is_default: bool,
}

impl TrialRecord {
    fn eligible(&self) -> bool {
        self.status == TrialStatus::Ok && !self.loss.is_nan()
    }
}

/// 台帳と現在のベスト
#[derive(Clone, Debug, Default, Serialize)]
pub struct OptimizationState {
    trials: Vec<TrialRecord>,
    best: Option<usize>,
}

impl OptimizationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 試行を追記する。ベストを更新したら true
    ///
    /// ベストは損失が厳密に小さいときだけ入れ替わる（同点なら先の試行のまま）。
    /// 失敗した試行と損失が NaN の試行はベストにならない。
    pub fn record(&mut self, mut record: TrialRecord) -> bool {
        record.index = self.trials.len();
        let improved = record.eligible()
            && self
                .best()
                .is_none_or(|best| record.loss < best.loss);
        if improved {
            self.best = Some(record.index);
        }
        self.trials.push(record);
        improved
    }

    pub fn trials(&self) -> &[TrialRecord] {
        &self.trials
    }

    pub fn last(&self) -> Option<&TrialRecord> {
        self.trials.last()
    }

    pub fn best(&self) -> Option<&TrialRecord> {
        self.best.map(|i| &self.trials[i])
    }

    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// 記録順の損失
    pub fn losses(&self) -> Vec<f64> {
        self.trials.iter().map(|t| t.loss).collect()
    }
}
