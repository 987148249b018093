//! 学習ループ
//!
//! 1 反復は rowwise パス（P の更新）と colwise パス（Q の更新）からなる。
//! 損失として報告するのは colwise パスの累積誤差のみで、rowwise パスの
//! 誤差は捨てる。

mod stopping;

pub use stopping::{EarlyStopping, periodical};

use crate::data::{BufferedFeeder, DataSource, Group, Header};
use crate::error::{IalsError, Result};
use crate::evaluate::Evaluator;
use crate::factors::Factors;
use crate::logging::Logger;
use crate::metrics::Metrics;
use crate::model::AlsModel;
use crate::optimize::ParamSet;
use crate::options::{AlsOptions, OptimizeOptions};
use crate::solver::Solver;
use crate::traits::{Optimizable, Persistable, Trainable};
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// 累積二乗誤差から RMSE を計算する
#[inline]
pub fn rmse(error: f64, num_nnz: usize) -> f64 {
    (error / num_nnz as f64).sqrt()
}

/// 1 グループ分のパスの結果
#[derive(Clone, Copy, Debug, Default)]
pub struct IterateReport {
    /// partial update が返した誤差の合計
    pub error: f64,
    /// 処理したエントリ数
    pub processed: usize,
    pub feed_time: Duration,
    pub update_time: Duration,
}

/// ALS の学習ラン
///
/// 因子行列・データ・ソルバ・検証器を所有し、[`Trainable`],
/// [`Persistable`], [`Optimizable`] を実装する。
pub struct Als {
    opt: AlsOptions,
    opt_path: PathBuf,
    solver: Box<dyn Solver>,
    data: Option<Arc<dyn DataSource>>,
    evaluator: Option<Box<dyn Evaluator>>,
    factors: Option<Factors>,
    logger: Logger,
    interrupted: Arc<AtomicBool>,
    best_loss: f64,
    validation_result: BTreeMap<String, f64>,
}

impl Als {
    /// オプションファイルを読み込み、ソルバにも同じファイルを渡す
    pub fn new<P: AsRef<Path>>(
        opt_path: P,
        mut solver: Box<dyn Solver>,
        logger: Logger,
    ) -> Result<Self> {
        let opt_path = opt_path.as_ref().to_path_buf();
        let opt = AlsOptions::load(&opt_path)?;
        if !solver.init(&opt_path)? {
            return Err(IalsError::Configuration(format!(
                "cannot parse option file: {}",
                opt_path.display()
            )));
        }
        logger.info(format_args!("ALS({})", serde_json::to_string_pretty(&opt)?));
        Ok(Self {
            opt,
            opt_path,
            solver,
            data: None,
            evaluator: None,
            factors: None,
            logger,
            interrupted: Arc::new(AtomicBool::new(false)),
            best_loss: f64::MAX,
            validation_result: BTreeMap::new(),
        })
    }

    /// データを結び付ける。未実体化なら `create()` する
    pub fn set_data(&mut self, mut data: Box<dyn DataSource>) -> Result<()> {
        if !data.is_created() {
            data.create()?;
        }
        self.logger.info(format_args!("{}", data.show_info()));
        self.data = Some(Arc::from(data));
        Ok(())
    }

    pub fn set_evaluator(&mut self, evaluator: Box<dyn Evaluator>) {
        self.evaluator = Some(evaluator);
    }

    pub fn options(&self) -> &AlsOptions {
        &self.opt
    }

    /// 直近に読み込んだオプションファイル
    pub fn options_path(&self) -> &Path {
        &self.opt_path
    }

    pub fn factors(&self) -> Option<&Factors> {
        self.factors.as_ref()
    }

    /// この学習ランで最も良かった学習損失
    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// 直近の検証結果
    pub fn validation_result(&self) -> &BTreeMap<String, f64> {
        &self.validation_result
    }

    pub fn header(&self) -> Result<Header> {
        self.data
            .as_ref()
            .ok_or_else(|| IalsError::Configuration("data not set".to_string()))?
            .header()
    }

    fn init_factors(&mut self) -> Result<()> {
        let header = self.header()?;
        self.factors = None;
        let mut rng = ChaCha8Rng::seed_from_u64(self.opt.random_seed);
        let factors = Factors::random(&header, self.opt.d, &mut rng)?;
        self.solver.initialize_model(&factors)?;
        self.factors = Some(factors);
        Ok(())
    }

    /// 1 グループ分のパス
    ///
    /// 前計算を 1 回行ったあと、フィーダのバッチを最後まで
    /// fetch → get → partial update の順に処理する。
    pub fn iterate(&mut self, feeder: &mut BufferedFeeder, group: Group) -> Result<IterateReport> {
        let header = self.header()?;
        let Self {
            solver,
            factors,
            logger,
            interrupted,
            opt,
            ..
        } = self;
        let factors = factors
            .as_mut()
            .ok_or_else(|| IalsError::Configuration("model is not initialized".to_string()))?;

        solver.precompute(factors, group)?;
        feeder.set_group(group);

        let progress = if opt.progress {
            ProgressBar::new(header.num_nnz as u64)
        } else {
            ProgressBar::hidden()
        };
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.set_message(group.label());

        let mut report = IterateReport::default();
        let mut start_t = Instant::now();
        while let Some(sz) = feeder.fetch_batch()? {
            if interrupted.load(Ordering::SeqCst) {
                progress.abandon();
                return Err(IalsError::Interrupted);
            }
            report.processed += sz;
            let batch = feeder.get()?;
            report.feed_time += start_t.elapsed();

            start_t = Instant::now();
            report.error += solver.partial_update(factors, batch, group)?;
            report.update_time += start_t.elapsed();

            progress.inc(sz as u64);
            start_t = Instant::now();
        }
        progress.finish_and_clear();

        logger.debug(format_args!(
            "{} updated: processed({}) elapsed(data feed: {:0.3}s update: {:0.3}s)",
            group,
            report.processed,
            report.feed_time.as_secs_f64(),
            report.update_time.as_secs_f64()
        ));
        Ok(report)
    }

    fn validation_enabled(&self) -> bool {
        self.opt.validation.is_some() && self.opt.evaluation_on_learning
    }

    fn prepare_evaluation(&mut self, header: &Header) -> Result<()> {
        if !self.validation_enabled() {
            return Ok(());
        }
        let evaluator = self.evaluator.as_mut().ok_or_else(|| {
            IalsError::Configuration("validation is enabled but no evaluator is set".to_string())
        })?;
        evaluator.prepare(header)
    }

    fn run_validation(&mut self) -> Result<()> {
        let (Some(evaluator), Some(factors)) = (self.evaluator.as_mut(), self.factors.as_ref())
        else {
            return Ok(());
        };
        let start_t = Instant::now();
        self.validation_result = evaluator.evaluate(factors)?;
        let val_str = self
            .validation_result
            .iter()
            .map(|(k, v)| format!("{k}:{v:0.5}"))
            .collect::<Vec<_>>()
            .join(" ");
        self.logger.info(format_args!(
            "Validation: {val_str} Elapsed {:0.3} secs",
            start_t.elapsed().as_secs_f64()
        ));
        Ok(())
    }

    /// 損失が改善し、保存周期に当たればチェックポイントを書く
    ///
    /// NaN の損失は改善とみなさない。
    fn save_best_only(&mut self, loss: f64, i: usize) -> Result<()> {
        if loss.is_nan() || loss >= self.best_loss {
            return Ok(());
        }
        self.best_loss = loss;
        if self.opt.save_best && periodical(self.opt.save_period, i) {
            let path = self.opt.model_path.clone().ok_or_else(|| {
                IalsError::Runtime(
                    "Failed to save the best model: model path is not defined".to_string(),
                )
            })?;
            self.dump(&path)?;
            self.logger
                .info(format_args!("Saved the best model ({loss:.5}) to {}", path.display()));
        }
        Ok(())
    }

    pub fn to_model(&self) -> Result<AlsModel> {
        let factors = self
            .factors
            .clone()
            .ok_or_else(|| IalsError::Runtime("model is not initialized".to_string()))?;
        Ok(AlsModel {
            options: self.opt.clone(),
            factors,
        })
    }
}

impl Trainable for Als {
    fn initialize(&mut self) -> Result<()> {
        self.init_factors()
    }

    fn train(&mut self) -> Result<Metrics> {
        let data = self
            .data
            .clone()
            .ok_or_else(|| IalsError::Configuration("data not set".to_string()))?;
        let header = data.header()?;
        if header.num_nnz == 0 {
            return Err(IalsError::Configuration("training data has no entries".to_string()));
        }
        if self.factors.is_none() {
            return Err(IalsError::Configuration(
                "model is not initialized; call initialize() first".to_string(),
            ));
        }
        let mut feeder = BufferedFeeder::new(data, self.opt.batch_size)?;

        self.best_loss = f64::MAX;
        self.validation_result.clear();
        self.prepare_evaluation(&header)?;
        let mut early_stopping = EarlyStopping::new(self.opt.early_stopping_rounds);

        let mut loss = f64::NAN;
        for i in 0..self.opt.num_iters {
            if self.interrupted.load(Ordering::SeqCst) {
                return Err(IalsError::Interrupted);
            }
            let start_t = Instant::now();
            self.iterate(&mut feeder, Group::Rowwise)?;
            let report = self.iterate(&mut feeder, Group::Colwise)?;
            let train_t = start_t.elapsed();

            loss = rmse(report.error, header.num_nnz);
            let mut metrics = Metrics::with_train_loss(loss);
            if self.validation_enabled() && periodical(self.opt.evaluation_period, i) {
                self.run_validation()?;
                metrics.merge_validation(&self.validation_result);
            }
            self.logger.info(format_args!(
                "Iteration {}: RMSE {:.3} Elapsed {:.3} secs",
                i + 1,
                loss,
                train_t.as_secs_f64()
            ));
            self.logger.debug(format_args!("metrics {metrics}"));

            self.save_best_only(loss, i)?;
            if early_stopping.update(loss) {
                self.logger
                    .info(format_args!("Early stopping at iteration {}", i + 1));
                break;
            }
        }

        let mut ret = Metrics::with_train_loss(loss);
        ret.merge_validation(&self.validation_result);
        Ok(ret)
    }

    fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }
}

impl Persistable for Als {
    fn dump(&self, path: &Path) -> Result<()> {
        self.to_model()?.save(path)
    }
}

impl Optimizable for Als {
    fn optimize_options(&self) -> &OptimizeOptions {
        &self.opt.optimize
    }

    fn model_path(&self) -> Option<&Path> {
        self.opt.model_path.as_deref()
    }

    fn logger(&self) -> &Logger {
        &self.logger
    }

    fn run_trial(&mut self, params: &ParamSet, scratch: &Path) -> Result<Metrics> {
        let next = self.opt.with_params(params)?;
        next.save(scratch)?;
        if !self.solver.init(scratch)? {
            return Err(IalsError::Configuration(format!(
                "cannot parse option file: {}",
                scratch.display()
            )));
        }
        self.opt = next;
        self.opt_path = scratch.to_path_buf();
        self.logger.info(format_args!("{params:?}"));
        self.initialize()?;
        self.train()
    }
}
