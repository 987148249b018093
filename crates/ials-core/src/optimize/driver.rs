//! 最適化ループ
//!
//! 1 試行ずつ探索アルゴリズムに候補を尋ね、[`Optimizable`] に学習させ、
//! 台帳に記録する。ベストが更新されたらデプロイ条件を満たす場合に限り
//! モデルを保存する。

use super::ledger::{OptimizationState, TrialRecord, TrialStatus};
use super::scratch::ScratchOptions;
use super::search::SearchAlgorithm;
use super::space::{ParamSet, SearchSpace};
use crate::error::{IalsError, Result};
use crate::logging::Logger;
use crate::metrics::Metrics;
use crate::options::{FailurePolicy, OptimizeOptions};
use crate::traits::Optimizable;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use std::path::Path;
use std::sync::atomic::Ordering;

/// 試行ごとに呼ばれるコールバック
pub type TrialCallback = Box<dyn FnMut(&OptimizationState)>;

/// 最適化ループが止まった理由
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// 試行回数を使い切った
    Exhausted,
    /// 中断フラグが立った
    Interrupted,
}

pub struct Optimizer<S: SearchAlgorithm> {
    search: S,
    state: OptimizationState,
    scratch: ScratchOptions,
    callback: Option<TrialCallback>,
    logger: Logger,
    progress: bool,
    deployed: usize,
}

impl<S: SearchAlgorithm> Optimizer<S> {
    pub fn new(search: S, logger: Logger) -> Result<Self> {
        Ok(Self {
            search,
            state: OptimizationState::new(),
            scratch: ScratchOptions::new()?,
            callback: None,
            logger,
            progress: false,
            deployed: 0,
        })
    }

    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&OptimizationState) + 'static,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> &OptimizationState {
        &self.state
    }

    /// 試行用オプションファイルの場所
    pub fn scratch_path(&self) -> &Path {
        self.scratch.path()
    }

    /// デプロイした回数
    pub fn deployed(&self) -> usize {
        self.deployed
    }

    pub fn optimize<M: Optimizable>(&mut self, model: &mut M) -> Result<StopReason> {
        let opt = model.optimize_options().clone();
        let space = SearchSpace::resolve(&opt.space)?;
        let interrupted = model.interrupt_flag();
        let mut budget = opt.budget();
        let gate = opt.min_trials_gate();

        if opt.start_with_default_parameters {
            let outcome = {
                let _quiet = model.logger().suppress(LevelFilter::Warn);
                self.run_trial(model, ParamSet::new(), true, &opt)?
            };
            match outcome {
                Some(_) => {
                    if let Some(rec) = self.state.last() {
                        self.logger.info(format_args!(
                            "Starting with default parameter result: {:.5}",
                            rec.loss
                        ));
                    }
                }
                None => return Ok(StopReason::Interrupted),
            }
        }

        let progress = match budget {
            Some(n) if self.progress => ProgressBar::new(n as u64),
            None if self.progress => ProgressBar::new_spinner(),
            _ => ProgressBar::hidden(),
        };
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.green/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut iteration = 0usize;
        while budget != Some(0) {
            if interrupted.load(Ordering::SeqCst) {
                progress.abandon();
                return Ok(StopReason::Interrupted);
            }
            let had_best = self.state.best().is_some();
            let evaluation = self.state.len() + 1;
            let params = self.search.suggest(&space, &self.state, evaluation)?;
            iteration += 1;

            let Some(improved) = self.run_trial(model, params, false, &opt)? else {
                progress.abandon();
                return Ok(StopReason::Interrupted);
            };

            if improved {
                if let Some(best) = self.state.best() {
                    self.logger.info(format_args!(
                        "Found new best parameters: {:?} @ iter {iteration}",
                        best.parameters
                    ));
                    progress.set_message(format!("best {:.5}", best.loss));
                }
                let within_gate = gate.is_none_or(|n| iteration <= n);
                if opt.deployment && (!had_best || within_gate) {
                    self.deploy(model)?;
                }
            }

            if let Some(callback) = self.callback.as_mut() {
                callback(&self.state);
            }
            progress.inc(1);
            if let Some(n) = budget.as_mut() {
                *n -= 1;
            }
        }
        progress.finish_and_clear();
        Ok(StopReason::Exhausted)
    }

    /// 1 試行を実行して台帳に記録する
    ///
    /// 戻り値はベストを更新したかどうか。中断された試行は記録せず `None`。
    fn run_trial<M: Optimizable>(
        &mut self,
        model: &mut M,
        params: ParamSet,
        is_default: bool,
        opt: &OptimizeOptions,
    ) -> Result<Option<bool>> {
        let (metrics, loss, status) = match model.run_trial(&params, self.scratch.path()) {
            Ok(metrics) => {
                let loss = metrics.get(&opt.loss).ok_or_else(|| {
                    IalsError::Configuration(format!(
                        "loss metric '{}' is not reported by training (got: {metrics})",
                        opt.loss
                    ))
                })?;
                (metrics, loss, TrialStatus::Ok)
            }
            Err(IalsError::Interrupted) => return Ok(None),
            Err(e) if e.is_trial_failure() && opt.on_failure == FailurePolicy::Record => {
                self.logger
                    .warn(format_args!("trial failed with parameters {params:?}: {e}"));
                (Metrics::default(), f64::INFINITY, TrialStatus::Failed)
            }
            Err(e) => {
                self.logger
                    .error(format_args!("trial failed with parameters {params:?}: {e}"));
                return Err(e);
            }
        };

        self.logger.debug(format_args!(
            "Params({params:?}) Losses({loss:.5}) Metrics({metrics})"
        ));
        let improved = self.state.record(TrialRecord {
            index: 0,
            parameters: params,
            loss,
            metrics,
            status,
            timestamp: Utc::now(),
            is_default,
        });
        Ok(Some(improved))
    }

    fn deploy<M: Optimizable>(&mut self, model: &M) -> Result<()> {
        let path = model.model_path().ok_or_else(|| {
            IalsError::Runtime("Failed to deploy model: model path is not defined".to_string())
        })?;
        model.dump(path)?;
        self.deployed += 1;
        self.logger
            .info(format_args!("Deployed the best model to {}", path.display()));
        Ok(())
    }
}
