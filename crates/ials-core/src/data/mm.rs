//! Matrix Market 形式の読み込み（gzip対応）

use super::SparseMatrix;
use crate::error::{IalsError, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

const READER_BUF_CAP: usize = 128 * 1024; // 128 KiB
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// 先頭 2 バイトが gzip のマジックなら伸長して読む
fn sniff_gzip<R: BufRead + 'static>(mut inner: R) -> io::Result<Box<dyn BufRead>> {
    if inner.fill_buf()?.starts_with(&GZIP_MAGIC) {
        let dec = flate2::bufread::MultiGzDecoder::new(inner);
        return Ok(Box::new(BufReader::with_capacity(READER_BUF_CAP, dec)));
    }
    Ok(Box::new(inner))
}

/// coordinate 形式の行列を読み込む
///
/// パスが `-` なら標準入力から読む。gzip は拡張子ではなく内容で判定する。
/// 添字は 1 始まり。値の列が無い行は 1.0 として扱う。
/// 戻り値は未実体化の [`SparseMatrix`]（`create()` は呼び出し側）。
pub fn load_matrix_market<P: AsRef<Path>>(path: P) -> Result<SparseMatrix> {
    let p = path.as_ref();
    let reader = if p.as_os_str() == "-" {
        sniff_gzip(BufReader::with_capacity(READER_BUF_CAP, io::stdin().lock()))?
    } else {
        sniff_gzip(BufReader::with_capacity(READER_BUF_CAP, File::open(p)?))?
    };
    parse_matrix_market(reader, &p.display().to_string())
}

pub(crate) fn parse_matrix_market<R: BufRead>(reader: R, source: &str) -> Result<SparseMatrix> {
    let bad = |line_no: usize, what: &str| {
        IalsError::Configuration(format!("{source}:{line_no}: {what}"))
    };

    let mut dims: Option<(usize, usize, usize)> = None;
    let mut triples = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        let cols: Vec<&str> = trimmed.split_whitespace().collect();

        let Some((rows, ncols, _)) = dims else {
            if cols.len() < 3 {
                return Err(bad(line_no, "size line needs 'rows cols nnz'"));
            }
            let parse = |s: &str| s.parse::<usize>().map_err(|_| bad(line_no, "invalid size"));
            let size = (parse(cols[0])?, parse(cols[1])?, parse(cols[2])?);
            triples.reserve(size.2);
            dims = Some(size);
            continue;
        };

        if cols.len() < 2 {
            return Err(bad(line_no, "entry needs 'row col [value]'"));
        }
        let r = cols[0].parse::<usize>().map_err(|_| bad(line_no, "invalid row index"))?;
        let c = cols[1].parse::<usize>().map_err(|_| bad(line_no, "invalid column index"))?;
        if r == 0 || c == 0 || r > rows || c > ncols {
            return Err(bad(line_no, "index out of range"));
        }
        let v = match cols.get(2) {
            Some(s) => s.parse::<f32>().map_err(|_| bad(line_no, "invalid value"))?,
            None => 1.0,
        };
        triples.push(((r - 1) as u32, (c - 1) as u32, v));
    }

    let (rows, ncols, _) = dims.ok_or_else(|| bad(0, "missing size line"))?;
    SparseMatrix::from_triples(rows, ncols, triples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataSource;
    use std::io::{Cursor, Write};

    const SAMPLE: &str = "%%MatrixMarket matrix coordinate real general\n\
                          % comment\n\
                          3 4 4\n\
                          1 1 2.0\n\
                          1 4 1\n\
                          3 2\n\
                          2 3 0.5\n";

    #[test]
    fn test_parse_sample() {
        let mut m = parse_matrix_market(Cursor::new(SAMPLE), "sample").unwrap();
        m.create().unwrap();
        let h = m.header().unwrap();
        assert_eq!((h.num_users, h.num_items, h.num_nnz), (3, 4, 4));
    }

    #[test]
    fn test_out_of_range_index() {
        let text = "2 2 1\n3 1 1.0\n";
        let err = parse_matrix_market(Cursor::new(text), "bad").unwrap_err();
        assert!(err.to_string().contains("bad:2"));
    }

    #[test]
    fn test_load_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.mtx.gz");
        let f = File::create(&path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(f, flate2::Compression::default());
        enc.write_all(SAMPLE.as_bytes()).unwrap();
        enc.finish().unwrap();

        let mut m = load_matrix_market(&path).unwrap();
        m.create().unwrap();
        assert_eq!(m.header().unwrap().num_nnz, 4);
    }

    #[test]
    fn test_gzip_detected_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.mtx");
        let f = File::create(&path).unwrap();
        let mut enc = flate2::write::GzEncoder::new(f, flate2::Compression::default());
        enc.write_all(SAMPLE.as_bytes()).unwrap();
        enc.finish().unwrap();

        let mut m = load_matrix_market(&path).unwrap();
        m.create().unwrap();
        assert_eq!(m.header().unwrap().num_nnz, 4);
    }

    #[test]
    fn test_plain_file_with_gz_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.mtx.gz");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut m = load_matrix_market(&path).unwrap();
        m.create().unwrap();
        assert_eq!(m.header().unwrap().num_users, 3);
    }

    #[test]
    fn test_empty_file_reports_missing_size_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.mtx");
        std::fs::write(&path, "").unwrap();
        let err = load_matrix_market(&path).unwrap_err();
        assert!(err.to_string().contains("missing size line"));
    }
}
