//! ials のエラー型

/// 学習・最適化で発生するエラー
#[derive(thiserror::Error, Debug)]
pub enum IalsError {
    /// データ未設定やオプションファイル不正などの構成エラー
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 提案されたハイパーパラメータが受理できない
    #[error("validation error: {0}")]
    Validation(String),

    /// 続行不能な実行時エラー
    #[error("runtime error: {0}")]
    Runtime(String),

    /// ソルバ内部の失敗（この層では再試行しない）
    #[error("solver failure: {0}")]
    Solver(String),

    /// 割り込みフラグによる中断
    #[error("interrupted")]
    Interrupted,

    /// File I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl IalsError {
    /// 試行単位で回復可能な失敗かどうか（ソルバ失敗のみ）
    pub fn is_trial_failure(&self) -> bool {
        matches!(self, IalsError::Solver(_))
    }
}

/// Result type for ials operations
pub type Result<T> = std::result::Result<T, IalsError>;
