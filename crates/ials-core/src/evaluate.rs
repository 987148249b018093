//! 検証
//!
//! 学習中に周期的に呼ばれる検証のインターフェースと、
//! 保留データ（held-out）に対する標準実装。

use crate::data::Header;
use crate::error::{IalsError, Result};
use crate::factors::{Factors, dot};
use std::collections::BTreeMap;

pub trait Evaluator {
    /// 学習開始前に 1 回呼ばれる
    fn prepare(&mut self, header: &Header) -> Result<()>;

    /// 現在の因子で検証し、指標名 → 値 を返す（`val_` 接頭辞なし）
    fn evaluate(&mut self, factors: &Factors) -> Result<BTreeMap<String, f64>>;
}

/// 保留した (user, item, value) に対する検証
///
/// - `rmse`: スコアと値の二乗誤差
/// - `ndcg`, `map`, `accuracy`: 上位 `topk` 件のランキング指標
pub struct HoldoutEvaluator {
    entries: Vec<(u32, u32, f32)>,
    topk: usize,
    by_user: BTreeMap<u32, Vec<u32>>,
}

impl HoldoutEvaluator {
    pub fn new(entries: Vec<(u32, u32, f32)>, topk: usize) -> Self {
        Self {
            entries,
            topk: topk.max(1),
            by_user: BTreeMap::new(),
        }
    }
}

impl Evaluator for HoldoutEvaluator {
    fn prepare(&mut self, header: &Header) -> Result<()> {
        if self.entries.is_empty() {
            return Err(IalsError::Configuration("validation data is empty".to_string()));
        }
        self.by_user.clear();
        for &(u, i, _) in &self.entries {
            if u as usize >= header.num_users || i as usize >= header.num_items {
                return Err(IalsError::Configuration(format!(
                    "validation entry ({u}, {i}) is out of bounds"
                )));
            }
            self.by_user.entry(u).or_default().push(i);
        }
        for items in self.by_user.values_mut() {
            items.sort_unstable();
            items.dedup();
        }
        Ok(())
    }

    fn evaluate(&mut self, factors: &Factors) -> Result<BTreeMap<String, f64>> {
        if self.by_user.is_empty() {
            return Err(IalsError::Runtime("evaluator is not prepared".to_string()));
        }

        let sq_err: f64 = self
            .entries
            .iter()
            .map(|&(u, i, v)| {
                let diff = (factors.score(u as usize, i as usize) - v) as f64;
                diff * diff
            })
            .sum();
        let rmse = (sq_err / self.entries.len() as f64).sqrt();

        let mut ndcg_sum = 0.0;
        let mut ap_sum = 0.0;
        let mut hits_total = 0usize;
        let mut denom_total = 0usize;
        for (&user, truth) in &self.by_user {
            let ranked = topk_items(factors, user as usize, self.topk);
            let denom = truth.len().min(self.topk);

            let mut dcg = 0.0;
            let mut hits = 0usize;
            let mut precision_sum = 0.0;
            for (rank, item) in ranked.iter().enumerate() {
                if truth.binary_search(&(*item as u32)).is_ok() {
                    hits += 1;
                    dcg += 1.0 / ((rank + 2) as f64).log2();
                    precision_sum += hits as f64 / (rank + 1) as f64;
                }
            }
            let idcg: f64 = (0..denom).map(|r| 1.0 / ((r + 2) as f64).log2()).sum();

            ndcg_sum += dcg / idcg;
            ap_sum += precision_sum / denom as f64;
            hits_total += hits;
            denom_total += denom;
        }
        let n_users = self.by_user.len() as f64;

        Ok(BTreeMap::from([
            ("rmse".to_string(), rmse),
            ("ndcg".to_string(), ndcg_sum / n_users),
            ("map".to_string(), ap_sum / n_users),
            ("accuracy".to_string(), hits_total as f64 / denom_total as f64),
        ]))
    }
}

/// スコア上位 `k` 件のアイテム（同点は番号の小さい順）
pub fn topk_items(factors: &Factors, user: usize, k: usize) -> Vec<usize> {
    let p = factors.p.row(user);
    let scores: Vec<f32> = (0..factors.q.rows()).map(|i| dot(p, factors.q.row(i))).collect();
    rank_by_score(&scores, k)
}

/// スコア降順（同点は番号順）に上位 `k` 件を返す。NaN は最下位
pub(crate) fn rank_by_score(scores: &[f32], k: usize) -> Vec<usize> {
    let key = |i: usize| {
        let s = scores[i];
        if s.is_nan() { f32::NEG_INFINITY } else { s }
    };
    let mut order: Vec<usize> = (0..scores.len()).collect();
    let by_score = |a: &usize, b: &usize| key(*b).total_cmp(&key(*a)).then(a.cmp(b));
    let k = k.min(order.len());
    if k < order.len() {
        order.select_nth_unstable_by(k, by_score);
        order.truncate(k);
    }
    order.sort_by(by_score);
    order
}
