//! バッファ付きバッチフィーダ
//!
//! 行単位でバッファ容量（エントリ数）に収まるだけ詰めたバッチを
//! 1 つずつ切り出す。バッファは 1 枚だけで、`fetch_batch()` と `get()` は
//! 必ず交互に呼ぶ。

use super::{Batch, DataSource, Group};
use crate::error::{IalsError, Result};
use std::sync::Arc;

pub struct BufferedFeeder {
    data: Arc<dyn DataSource>,
    capacity: usize,
    group: Group,
    next_row: usize,
    buffer: Batch,
    /// fetch 済みで未 get のバッチがあるか
    pending: bool,
}

impl BufferedFeeder {
    /// `capacity` は 1 バッチあたりの最大エントリ数
    pub fn new(data: Arc<dyn DataSource>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(IalsError::Configuration(
                "batch_size must be >= 1".to_string(),
            ));
        }
        if !data.is_created() {
            return Err(IalsError::Configuration("data is not created".to_string()));
        }
        Ok(Self {
            data,
            capacity,
            group: Group::Rowwise,
            next_row: 0,
            buffer: Batch::default(),
            pending: false,
        })
    }

    pub fn group(&self) -> Group {
        self.group
    }

    /// 走査グループを選択し、先頭から走査し直す
    pub fn set_group(&mut self, group: Group) {
        self.group = group;
        self.next_row = 0;
        self.pending = false;
        self.buffer.indptr.clear();
        self.buffer.keys.clear();
        self.buffer.values.clear();
    }

    /// 次のバッチをバッファに読み込み、そのエントリ数を返す
    ///
    /// 走査が終わっていれば `None`。直前に fetch したバッチを `get()` せずに
    /// 呼ぶとエラー。
    pub fn fetch_batch(&mut self) -> Result<Option<usize>> {
        if self.pending {
            return Err(IalsError::Runtime(format!(
                "{} batch [{}, {}) was fetched but never consumed",
                self.group, self.buffer.segment_start, self.buffer.segment_end
            )));
        }

        let view = self.data.group(self.group)?;
        let num_rows = view.num_rows();
        if self.next_row >= num_rows {
            return Ok(None);
        }

        let start = self.next_row;
        let base = view.indptr[start];
        let mut end = start;
        while end < num_rows {
            let taken = (view.indptr[end] - base) as usize;
            let row_len = (view.indptr[end + 1] - view.indptr[end]) as usize;
            // 1 行も入っていないバッチは容量を超えても受け入れる
            if end > start && taken + row_len > self.capacity {
                break;
            }
            end += 1;
        }

        let beg = base as usize;
        let fin = view.indptr[end] as usize;
        let buf = &mut self.buffer;
        buf.segment_start = start;
        buf.segment_end = end;
        buf.indptr.clear();
        buf.indptr
            .extend(view.indptr[start..=end].iter().map(|&p| p - base));
        buf.keys.clear();
        buf.keys.extend_from_slice(&view.keys[beg..fin]);
        buf.values.clear();
        buf.values.extend_from_slice(&view.values[beg..fin]);

        self.next_row = end;
        self.pending = true;
        Ok(Some(fin - beg))
    }

    /// 直前に fetch したバッチを取り出す
    pub fn get(&mut self) -> Result<&Batch> {
        if !self.pending {
            return Err(IalsError::Runtime(format!(
                "no {} batch has been fetched",
                self.group
            )));
        }
        self.pending = false;
        Ok(&self.buffer)
    }
}
