//! 結合テスト用のソルバとデータ

#![allow(dead_code)]

use ials_core::factors::dot;
use ials_core::{AlsOptions, Batch, Factors, Group, IalsError, Result, Solver, SparseMatrix};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// 行ごとに 1 ステップの勾配更新を行う決定的なソルバ
pub struct GradientSolver {
    pub lr: f32,
}

impl Solver for GradientSolver {
    fn init(&mut self, options_path: &Path) -> Result<bool> {
        Ok(AlsOptions::load(options_path).is_ok())
    }

    fn initialize_model(&mut self, _factors: &Factors) -> Result<()> {
        Ok(())
    }

    fn precompute(&mut self, _factors: &Factors, _group: Group) -> Result<()> {
        Ok(())
    }

    fn partial_update(&mut self, factors: &mut Factors, batch: &Batch, group: Group) -> Result<f64> {
        let (target, fixed) = factors.split_mut(group);
        let mut error = 0.0;
        for row in batch.segment_start..batch.segment_end {
            let (keys, values) = batch.row(row);
            for (&k, &v) in keys.iter().zip(values) {
                let fixed_row = fixed.row(k as usize);
                let e = v - dot(target.row(row), fixed_row);
                for (t, f) in target.row_mut(row).iter_mut().zip(fixed_row) {
                    *t += self.lr * e * f;
                }
                error += (e * e) as f64;
            }
        }
        Ok(error)
    }
}

/// colwise パスの損失を `losses` の順に返すソルバ
///
/// 1 反復の RMSE が `losses[i]` になるよう、エントリあたり `losses[i]^2` の誤差を返す。
/// colwise パスでは Q の先頭要素にその反復の損失を書き込む（保存されたモデルの識別用）。
pub struct ScriptedSolver {
    pub losses: Vec<f64>,
    pub colwise_passes: Arc<AtomicUsize>,
}

impl Solver for ScriptedSolver {
    fn init(&mut self, _options_path: &Path) -> Result<bool> {
        Ok(true)
    }

    fn initialize_model(&mut self, _factors: &Factors) -> Result<()> {
        self.colwise_passes.store(0, Ordering::SeqCst);
        Ok(())
    }

    fn precompute(&mut self, _factors: &Factors, group: Group) -> Result<()> {
        if group == Group::Colwise {
            self.colwise_passes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn partial_update(&mut self, factors: &mut Factors, batch: &Batch, group: Group) -> Result<f64> {
        let i = self.colwise_passes.load(Ordering::SeqCst).saturating_sub(1);
        let loss = self.losses[i.min(self.losses.len() - 1)];
        if group == Group::Colwise {
            factors.q.row_mut(0)[0] = loss as f32;
        }
        Ok(loss * loss * batch.len() as f64)
    }
}

/// 最初のバッチで失敗するソルバ
pub struct FailingSolver;

impl Solver for FailingSolver {
    fn init(&mut self, _options_path: &Path) -> Result<bool> {
        Ok(true)
    }

    fn initialize_model(&mut self, _factors: &Factors) -> Result<()> {
        Ok(())
    }

    fn precompute(&mut self, _factors: &Factors, _group: Group) -> Result<()> {
        Ok(())
    }

    fn partial_update(&mut self, _factors: &mut Factors, _batch: &Batch, _group: Group) -> Result<f64> {
        Err(IalsError::Solver("factorization failed".to_string()))
    }
}

/// 4 ユーザ × 5 アイテムの小さな行列
pub fn small_matrix() -> SparseMatrix {
    SparseMatrix::from_triples(
        4,
        5,
        vec![
            (0, 0, 1.0),
            (0, 1, 1.0),
            (0, 3, 1.0),
            (1, 1, 1.0),
            (1, 2, 1.0),
            (2, 0, 1.0),
            (2, 3, 1.0),
            (2, 4, 1.0),
            (3, 2, 1.0),
            (3, 4, 1.0),
        ],
    )
    .unwrap()
}

pub fn small_options() -> AlsOptions {
    AlsOptions {
        num_iters: 5,
        d: 4,
        batch_size: 3,
        random_seed: 7,
        ..AlsOptions::default()
    }
}

/// オプションをファイルに書き出してパスを返す
pub fn write_options(dir: &Path, name: &str, opt: &AlsOptions) -> PathBuf {
    let path = dir.join(name);
    opt.save(&path).unwrap();
    path
}
