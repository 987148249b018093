//! 学習済みモデルの保存・読み込みと問い合わせ
//!
//! ファイル形式:
//! - マジック `IALSMDL1` (8 bytes)
//! - JSON ヘッダ長 (u32 LE) と JSON ヘッダ（オプションと行列サイズ）
//! - P, Q の要素 (f32 LE, 行優先)

use crate::data::Group;
use crate::error::{IalsError, Result};
use crate::evaluate::{rank_by_score, topk_items};
use crate::factors::{FactorMatrix, Factors, dot};
use crate::options::AlsOptions;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 8] = b"IALSMDL1";
/// JSON ヘッダの上限（壊れたファイルで巨大確保しないため）
const MAX_HEADER_BYTES: u32 = 16 << 20;
/// 1 行列あたりの要素数の上限 (4 GiB 分の f32)
const MAX_FACTOR_ELEMENTS: usize = 1 << 30;

#[derive(Serialize, Deserialize)]
struct FileHeader {
    options: AlsOptions,
    num_users: usize,
    num_items: usize,
    d: usize,
}

/// オプションと因子行列の組
#[derive(Clone, Debug, PartialEq)]
pub struct AlsModel {
    pub options: AlsOptions,
    pub factors: Factors,
}

impl AlsModel {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let header = FileHeader {
            options: self.options.clone(),
            num_users: self.factors.p.rows(),
            num_items: self.factors.q.rows(),
            d: self.factors.dim(),
        };
        let json = serde_json::to_vec(&header)?;
        w.write_all(MAGIC)?;
        w.write_u32::<LittleEndian>(json.len() as u32)?;
        w.write_all(&json)?;
        for m in [&self.factors.p, &self.factors.q] {
            for &x in m.as_slice() {
                w.write_f32::<LittleEndian>(x)?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; 8];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(IalsError::Configuration("not an ials model file".to_string()));
        }
        let len = r.read_u32::<LittleEndian>()?;
        if len > MAX_HEADER_BYTES {
            return Err(IalsError::Configuration(format!("model header too large: {len}")));
        }
        let mut json = vec![0u8; len as usize];
        r.read_exact(&mut json)?;
        let header: FileHeader = serde_json::from_slice(&json)?;

        let mut read_matrix = |rows: usize| -> Result<FactorMatrix> {
            let len = rows
                .checked_mul(header.d)
                .filter(|&n| n <= MAX_FACTOR_ELEMENTS)
                .ok_or_else(|| {
                    IalsError::Configuration(format!(
                        "factor matrix too large: {rows} x {}",
                        header.d
                    ))
                })?;
            let mut data = vec![0f32; len];
            r.read_f32_into::<LittleEndian>(&mut data)?;
            FactorMatrix::from_vec(rows, header.d, data)
        };
        let p = read_matrix(header.num_users)?;
        let q = read_matrix(header.num_items)?;
        Ok(Self {
            options: header.options,
            factors: Factors { p, q },
        })
    }

    pub fn score(&self, user: usize, item: usize) -> f32 {
        self.factors.score(user, item)
    }

    /// ユーザごとの上位 `k` アイテム
    pub fn topk_recommendation(&self, users: &[usize], k: usize) -> Vec<(usize, Vec<usize>)> {
        users
            .iter()
            .map(|&u| (u, topk_items(&self.factors, u, k)))
            .collect()
    }

    /// コサイン類似度で `item` に近いアイテム（自分自身は除く）
    pub fn most_similar(&self, item: usize, k: usize) -> Vec<(usize, f32)> {
        let mut q = self.factors.q.clone();
        q.normalize_rows();
        let target = q.row(item);
        let mut scores: Vec<f32> = (0..q.rows()).map(|i| dot(target, q.row(i))).collect();
        scores[item] = f32::NEG_INFINITY;
        rank_by_score(&scores, k)
            .into_iter()
            .filter(|&i| i != item)
            .map(|i| (i, scores[i]))
            .collect()
    }

    /// 指定グループ側の因子を L2 正規化する
    pub fn normalize(&mut self, group: Group) {
        match group {
            Group::Rowwise => self.factors.p.normalize_rows(),
            Group::Colwise => self.factors.q.normalize_rows(),
        }
    }
}
