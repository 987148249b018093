//! 学習データ
//!
//! 疎行列データソースと、それを rowwise / colwise の単位で
//! 切り出して供給するバッファ付きフィーダ。

mod feeder;
mod matrix;
pub mod mm;

pub use feeder::BufferedFeeder;
pub use matrix::SparseMatrix;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 学習行列の件数情報（データ生成後は不変）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub num_users: usize,
    pub num_items: usize,
    pub num_nnz: usize,
}

/// 走査グループ
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Group {
    /// ユーザ（行）方向。P を更新する
    Rowwise,
    /// アイテム（列）方向。Q を更新する
    Colwise,
}

impl Group {
    /// ソルバに渡す整数表現（0=rowwise, 1=colwise）
    pub fn index(self) -> usize {
        match self {
            Group::Rowwise => 0,
            Group::Colwise => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Group::Rowwise => "rowwise",
            Group::Colwise => "colwise",
        }
    }

    /// グループの走査対象行数
    pub fn num_rows(self, header: &Header) -> usize {
        match self {
            Group::Rowwise => header.num_users,
            Group::Colwise => header.num_items,
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// 1 回の partial update に渡すバッチ
///
/// `indptr` はバッチ先頭を 0 とした相対位置で、長さは
/// `segment_end - segment_start + 1`、末尾はエントリ数に等しい。
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Batch {
    pub segment_start: usize,
    pub segment_end: usize,
    pub indptr: Vec<u64>,
    pub keys: Vec<u32>,
    pub values: Vec<f32>,
}

impl Batch {
    /// エントリ数
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// セグメントに含まれる行数
    pub fn num_rows(&self) -> usize {
        self.segment_end - self.segment_start
    }

    /// セグメント内 `row`（絶対行番号）のキーと値
    pub fn row(&self, row: usize) -> (&[u32], &[f32]) {
        let local = row - self.segment_start;
        let beg = self.indptr[local] as usize;
        let end = self.indptr[local + 1] as usize;
        (&self.keys[beg..end], &self.values[beg..end])
    }
}

/// 圧縮行形式の読み取りビュー
#[derive(Clone, Copy, Debug)]
pub struct GroupView<'a> {
    pub indptr: &'a [u64],
    pub keys: &'a [u32],
    pub values: &'a [f32],
}

impl GroupView<'_> {
    pub fn num_rows(&self) -> usize {
        self.indptr.len().saturating_sub(1)
    }
}

/// データソースのインターフェース
///
/// `create()` で実体化するまで `header()` / `group()` はエラーを返す。
pub trait DataSource {
    /// ストレージを実体化する（何度呼んでもよい）
    fn create(&mut self) -> Result<()>;

    fn is_created(&self) -> bool;

    fn header(&self) -> Result<Header>;

    fn group(&self, group: Group) -> Result<GroupView<'_>>;

    /// ログ用の概要
    fn show_info(&self) -> String {
        match self.header() {
            Ok(h) => format!(
                "users={} items={} nnz={}",
                h.num_users, h.num_items, h.num_nnz
            ),
            Err(_) => "not created".to_string(),
        }
    }
}
