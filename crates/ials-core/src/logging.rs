//! 注入型ロガー
//!
//! グローバルなロガーオブジェクトを直接参照せず、各コンポーネントは生成時に
//! [`Logger`] を受け取る。出力自体は `log` ファサード経由で、初期化は
//! バイナリ側（env_logger）が行う。
//!
//! しきい値は `child()` で派生したハンドル間で共有されるため、
//! [`Logger::suppress`] で一時的に抑制すると配下のコンポーネント全体に効く。

use log::{Level, LevelFilter};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// ターゲット名と共有しきい値を持つロガーハンドル
#[derive(Clone, Debug)]
pub struct Logger {
    target: Arc<str>,
    threshold: Arc<AtomicUsize>,
}

impl Logger {
    pub fn new(target: &str) -> Self {
        Self {
            target: Arc::from(target),
            threshold: Arc::new(AtomicUsize::new(LevelFilter::Trace as usize)),
        }
    }

    /// しきい値を共有する別ターゲットのハンドルを作る
    pub fn child(&self, target: &str) -> Self {
        Self {
            target: Arc::from(target),
            threshold: Arc::clone(&self.threshold),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// 現在のしきい値
    pub fn threshold(&self) -> LevelFilter {
        level_filter_from(self.threshold.load(Ordering::Relaxed))
    }

    /// しきい値だけで判定した通過可否（`log` 側の max_level は見ない）
    pub fn passes(&self, level: Level) -> bool {
        level as usize <= self.threshold.load(Ordering::Relaxed)
    }

    /// `filter` より詳細なログを guard の生存中だけ抑制する
    ///
    /// 既により厳しいしきい値が設定されている場合はそれを維持する。
    pub fn suppress(&self, filter: LevelFilter) -> SuppressGuard {
        let previous = self.threshold.load(Ordering::Relaxed);
        self.threshold.store(previous.min(filter as usize), Ordering::Relaxed);
        SuppressGuard {
            threshold: Arc::clone(&self.threshold),
            previous,
        }
    }

    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        if self.passes(level) {
            log::log!(target: &*self.target, level, "{args}");
        }
    }

    pub fn error(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Error, args);
    }

    pub fn warn(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Warn, args);
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }

    pub fn debug(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Debug, args);
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("ials")
    }
}

/// drop 時に直前のしきい値へ戻す
#[must_use = "suppression ends when the guard is dropped"]
pub struct SuppressGuard {
    threshold: Arc<AtomicUsize>,
    previous: usize,
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        self.threshold.store(self.previous, Ordering::Relaxed);
    }
}

fn level_filter_from(v: usize) -> LevelFilter {
    match v {
        0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
