//! 探索アルゴリズム

use super::ledger::OptimizationState;
use super::space::{ParamSet, SearchSpace};
use crate::error::Result;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// 次に試すパラメータを提案する
///
/// `evaluation` は 1 始まりの評価番号（台帳の長さ + 1）。
pub trait SearchAlgorithm {
    fn suggest(
        &mut self,
        space: &SearchSpace,
        history: &OptimizationState,
        evaluation: usize,
    ) -> Result<ParamSet>;
}

/// 履歴を使わない乱択探索
pub struct RandomSearch {
    rng: ChaCha8Rng,
}

impl RandomSearch {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl SearchAlgorithm for RandomSearch {
    fn suggest(
        &mut self,
        space: &SearchSpace,
        _history: &OptimizationState,
        _evaluation: usize,
    ) -> Result<ParamSet> {
        Ok(space.sample(&mut self.rng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::SpaceEntry;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut raw: BTreeMap<String, SpaceEntry> = BTreeMap::new();
        raw.insert(
            "alpha".to_string(),
            ("uniform".to_string(), vec![json!("alpha"), json!(1.0), json!(16.0)]),
        );
        let space = SearchSpace::resolve(&raw).unwrap();
        let state = OptimizationState::new();

        let mut a = RandomSearch::new(7);
        let mut b = RandomSearch::new(7);
        for n in 1..=5 {
            assert_eq!(
                a.suggest(&space, &state, n).unwrap(),
                b.suggest(&space, &state, n).unwrap()
            );
        }
    }

    #[test]
    fn test_empty_space() {
        let mut search = RandomSearch::new(0);
        let params = search
            .suggest(&SearchSpace::default(), &OptimizationState::new(), 1)
            .unwrap();
        assert!(params.is_empty());
    }
}
