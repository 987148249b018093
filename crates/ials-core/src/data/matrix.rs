//! メモリ上の疎行列データソース

use super::{DataSource, Group, GroupView, Header};
use crate::error::{IalsError, Result};

/// 圧縮形式（CSR / CSC 共通）
#[derive(Clone, Debug, Default)]
struct Compressed {
    indptr: Vec<u64>,
    keys: Vec<u32>,
    values: Vec<f32>,
}

impl Compressed {
    /// (major, minor, value) 昇順ソート済みの三つ組から構築する
    fn build(num_major: usize, sorted: &[(u32, u32, f32)]) -> Self {
        let mut indptr = vec![0u64; num_major + 1];
        let mut keys = Vec::with_capacity(sorted.len());
        let mut values = Vec::with_capacity(sorted.len());
        for &(major, minor, value) in sorted {
            indptr[major as usize + 1] += 1;
            keys.push(minor);
            values.push(value);
        }
        for i in 0..num_major {
            indptr[i + 1] += indptr[i];
        }
        Self {
            indptr,
            keys,
            values,
        }
    }

    fn view(&self) -> GroupView<'_> {
        GroupView {
            indptr: &self.indptr,
            keys: &self.keys,
            values: &self.values,
        }
    }
}

/// (user, item, value) の三つ組から作る疎行列
///
/// 重複エントリは `create()` 時に合算される。
#[derive(Clone, Debug)]
pub struct SparseMatrix {
    num_users: usize,
    num_items: usize,
    triples: Vec<(u32, u32, f32)>,
    rows: Option<Compressed>,
    cols: Option<Compressed>,
}

impl SparseMatrix {
    pub fn from_triples(
        num_users: usize,
        num_items: usize,
        triples: Vec<(u32, u32, f32)>,
    ) -> Result<Self> {
        if let Some(&(u, i, _)) = triples
            .iter()
            .find(|&&(u, i, _)| u as usize >= num_users || i as usize >= num_items)
        {
            return Err(IalsError::Configuration(format!(
                "entry ({u}, {i}) is out of bounds for a {num_users}x{num_items} matrix"
            )));
        }
        Ok(Self {
            num_users,
            num_items,
            triples,
            rows: None,
            cols: None,
        })
    }

    /// 生成済みの三つ組から実体化まで行う
    pub fn create_from_triples(
        num_users: usize,
        num_items: usize,
        triples: Vec<(u32, u32, f32)>,
    ) -> Result<Self> {
        let mut m = Self::from_triples(num_users, num_items, triples)?;
        m.create()?;
        Ok(m)
    }
}

impl DataSource for SparseMatrix {
    fn create(&mut self) -> Result<()> {
        if self.is_created() {
            return Ok(());
        }

        let mut entries = std::mem::take(&mut self.triples);
        entries.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        entries.dedup_by(|next, kept| {
            if next.0 == kept.0 && next.1 == kept.1 {
                kept.2 += next.2;
                true
            } else {
                false
            }
        });
        let rows = Compressed::build(self.num_users, &entries);

        let mut transposed: Vec<(u32, u32, f32)> =
            entries.iter().map(|&(u, i, v)| (i, u, v)).collect();
        transposed.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        let cols = Compressed::build(self.num_items, &transposed);

        self.rows = Some(rows);
        self.cols = Some(cols);
        Ok(())
    }

    fn is_created(&self) -> bool {
        self.rows.is_some() && self.cols.is_some()
    }

    fn header(&self) -> Result<Header> {
        let rows = self
            .rows
            .as_ref()
            .ok_or_else(|| IalsError::Configuration("data is not created".to_string()))?;
        Ok(Header {
            num_users: self.num_users,
            num_items: self.num_items,
            num_nnz: rows.keys.len(),
        })
    }

    fn group(&self, group: Group) -> Result<GroupView<'_>> {
        let c = match group {
            Group::Rowwise => self.rows.as_ref(),
            Group::Colwise => self.cols.as_ref(),
        };
        c.map(Compressed::view)
            .ok_or_else(|| IalsError::Configuration("data is not created".to_string()))
    }
}
