use crate::error::Result;
use std::path::Path;
use tempfile::NamedTempFile;

/// 試行ごとのオプションを書き出す一時ファイル
///
/// ドロップ時に削除される（エラーで抜けた場合も含む）。
#[derive(Debug)]
pub struct ScratchOptions {
    file: NamedTempFile,
}

impl ScratchOptions {
    pub fn new() -> Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("ials-opt-")
            .suffix(".json")
            .tempfile()?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let scratch = ScratchOptions::new().unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.exists());
        std::fs::write(&path, "{}").unwrap();
        drop(scratch);
        assert!(!path.exists());
    }
}
