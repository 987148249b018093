//! 因子行列 P (num_users x d), Q (num_items x d)

use crate::data::{Group, Header};
use crate::error::{IalsError, Result};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// 行優先の密行列
#[derive(Clone, Debug, PartialEq)]
pub struct FactorMatrix {
    rows: usize,
    dim: usize,
    data: Vec<f32>,
}

impl FactorMatrix {
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self {
            rows,
            dim,
            data: vec![0.0; rows * dim],
        }
    }

    pub fn from_vec(rows: usize, dim: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != rows * dim {
            return Err(IalsError::Runtime(format!(
                "factor size mismatch: expected {}x{}={}, got {}",
                rows,
                dim,
                rows * dim,
                data.len()
            )));
        }
        Ok(Self { rows, dim, data })
    }

    /// |N(0, 1/d²)| で初期化する
    pub fn random<R: Rng>(rows: usize, dim: usize, rng: &mut R) -> Result<Self> {
        let scale = 1.0 / (dim as f32 * dim as f32);
        let normal = Normal::new(0.0f32, scale)
            .map_err(|e| IalsError::Configuration(format!("invalid factor scale: {e}")))?;
        let data = (0..rows * dim).map(|_| normal.sample(rng).abs()).collect();
        Ok(Self { rows, dim, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dim..(i + 1) * self.dim]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f32] {
        &mut self.data[i * self.dim..(i + 1) * self.dim]
    }

    /// 各行を L2 正規化する（ゼロ行はそのまま）
    pub fn normalize_rows(&mut self) {
        for row in self.data.chunks_mut(self.dim.max(1)) {
            let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                row.iter_mut().for_each(|x| *x /= norm);
            }
        }
    }
}

/// 1 回の学習ランが専有する因子行列の組
#[derive(Clone, Debug, PartialEq)]
pub struct Factors {
    pub p: FactorMatrix,
    pub q: FactorMatrix,
}

impl Factors {
    pub fn random<R: Rng>(header: &Header, dim: usize, rng: &mut R) -> Result<Self> {
        if dim == 0 {
            return Err(IalsError::Configuration("d must be >= 1".to_string()));
        }
        let p = FactorMatrix::random(header.num_users, dim, rng)?;
        let q = FactorMatrix::random(header.num_items, dim, rng)?;
        Ok(Self { p, q })
    }

    pub fn dim(&self) -> usize {
        self.p.dim()
    }

    /// (更新対象, 固定側) を返す
    pub fn split_mut(&mut self, group: Group) -> (&mut FactorMatrix, &FactorMatrix) {
        match group {
            Group::Rowwise => (&mut self.p, &self.q),
            Group::Colwise => (&mut self.q, &self.p),
        }
    }

    pub fn score(&self, user: usize, item: usize) -> f32 {
        dot(self.p.row(user), self.q.row(item))
    }
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
