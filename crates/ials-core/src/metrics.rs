//! 学習 1 回分のメトリクス

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const TRAIN_LOSS: &str = "train_loss";

/// `train_loss` と `val_*` を持つメトリクスレコード
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<String, f64>);

impl Metrics {
    pub fn with_train_loss(loss: f64) -> Self {
        let mut m = Self::default();
        m.insert(TRAIN_LOSS, loss);
        m
    }

    pub fn insert(&mut self, name: &str, value: f64) {
        self.0.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn train_loss(&self) -> Option<f64> {
        self.get(TRAIN_LOSS)
    }

    /// 検証結果を `val_` 接頭辞付きで取り込む
    pub fn merge_validation(&mut self, results: &BTreeMap<String, f64>) {
        for (k, v) in results {
            self.0.insert(format!("val_{k}"), *v);
        }
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (k, v) in &self.0 {
            if !first {
                f.write_str(" ")?;
            }
            write!(f, "{k}:{v:0.5}")?;
            first = false;
        }
        Ok(())
    }
}
