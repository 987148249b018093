//! オプションファイルの検査と探索空間のサンプル出力
//!
//! ```text
//! ials-opt-check als.json --samples 5
//! ```
//!
//! 標準出力には候補パラメータを 1 行 1 JSON で出す。

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use ials_core::metrics::TRAIN_LOSS;
use ials_core::{AlsOptions, OptimizationState, RandomSearch, SearchAlgorithm, SearchSpace};
use log::info;

/// `HoldoutEvaluator` が報告する指標
const VALIDATION_METRICS: [&str; 4] = ["rmse", "ndcg", "map", "accuracy"];

#[derive(Parser, Debug)]
#[command(author, version, about = "Check an ials option file and sample its search space")]
struct Cli {
    /// オプションファイル（JSON）
    options: PathBuf,

    /// 出力する候補数
    #[arg(long, default_value_t = 5)]
    samples: usize,

    /// 乱数シード（未指定時: optimize.seed → random_seed）
    #[arg(long)]
    seed: Option<u64>,
}

/// 最小化する指標が学習ランから報告されるか
fn check_loss_metric(opt: &AlsOptions) -> Result<()> {
    let loss = opt.optimize.loss.as_str();
    if loss == TRAIN_LOSS {
        return Ok(());
    }
    match loss.strip_prefix("val_") {
        Some(name) if VALIDATION_METRICS.contains(&name) => {
            if opt.validation.is_none() || !opt.evaluation_on_learning {
                bail!("optimize.loss '{loss}' needs validation with evaluation_on_learning");
            }
            Ok(())
        }
        _ => bail!("optimize.loss '{loss}' is not a reported metric"),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let opt = AlsOptions::load(&cli.options)
        .with_context(|| format!("failed to load {}", cli.options.display()))?;
    check_loss_metric(&opt)?;

    for name in opt.optimize.space.keys() {
        if !opt.recognizes(name)? {
            bail!("Unexpected parameter: {name}");
        }
    }
    let space = SearchSpace::resolve(&opt.optimize.space)?;
    info!(
        "{}: {} parameter(s), max_trials={}",
        cli.options.display(),
        space.len(),
        opt.optimize.max_trials
    );

    let mut search = RandomSearch::new(cli.seed.unwrap_or_else(|| opt.search_seed()));
    let state = OptimizationState::new();
    for n in 1..=cli.samples {
        let params = search.suggest(&space, &state, n)?;
        opt.with_params(&params)
            .with_context(|| format!("candidate {n} is not applicable: {params:?}"))?;
        println!("{}", serde_json::to_string(&params)?);
    }
    Ok(())
}
