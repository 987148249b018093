//! 早期終了と周期判定

/// `i`（0 始まり）回目の反復が `period` 周期に当たるか
#[inline]
pub fn periodical(period: usize, i: usize) -> bool {
    period > 0 && (i + 1) % period == 0
}

/// 損失が `rounds` 回連続で前回より悪化したら停止する
///
/// `rounds == 0` の場合は無効。NaN は悪化として数える。
#[derive(Clone, Debug)]
pub struct EarlyStopping {
    rounds: usize,
    previous: Option<f64>,
    streak: usize,
}

impl EarlyStopping {
    pub fn new(rounds: usize) -> Self {
        Self {
            rounds,
            previous: None,
            streak: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.rounds > 0
    }

    /// 損失を記録し、停止すべきなら `true`
    pub fn update(&mut self, loss: f64) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let worse = loss.is_nan() || self.previous.is_some_and(|prev| loss > prev);
        if worse {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.previous = Some(loss);
        self.streak >= self.rounds
    }
}
