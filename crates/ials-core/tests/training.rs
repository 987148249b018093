mod common;

use common::{
    FailingSolver, GradientSolver, ScriptedSolver, small_matrix, small_options, write_options,
};
use ials_core::{
    Als, AlsModel, HoldoutEvaluator, IalsError, Logger, Trainable, ValidationOptions,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn gradient_run(dir: &std::path::Path, opt: &ials_core::AlsOptions) -> Als {
    let path = write_options(dir, "als.json", opt);
    let mut als = Als::new(&path, Box::new(GradientSolver { lr: 0.05 }), Logger::new("test")).unwrap();
    als.set_data(Box::new(small_matrix())).unwrap();
    als
}

#[test]
fn train_reports_finite_loss() {
    let dir = tempfile::tempdir().unwrap();
    let mut als = gradient_run(dir.path(), &small_options());
    als.initialize().unwrap();
    let metrics = als.train().unwrap();

    let loss = metrics.train_loss().unwrap();
    assert!(loss.is_finite());
    assert!(loss > 0.0);
    assert_eq!(als.header().unwrap().num_nnz, 10);
    assert_eq!(als.factors().unwrap().p.rows(), 4);
    assert_eq!(als.factors().unwrap().q.rows(), 5);
}

#[test]
fn retraining_reproduces_loss() {
    let dir = tempfile::tempdir().unwrap();
    let mut als = gradient_run(dir.path(), &small_options());
    als.initialize().unwrap();
    let first = als.train().unwrap();
    als.initialize().unwrap();
    let second = als.train().unwrap();
    assert_eq!(first.train_loss(), second.train_loss());
}

#[test]
fn train_without_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_options(dir.path(), "als.json", &small_options());
    let mut als = Als::new(&path, Box::new(GradientSolver { lr: 0.05 }), Logger::new("test")).unwrap();

    let err = als.train().unwrap_err();
    assert!(matches!(err, IalsError::Configuration(ref m) if m.contains("data not set")));
    assert!(matches!(als.initialize(), Err(IalsError::Configuration(_))));
}

#[test]
fn solver_failure_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_options(dir.path(), "als.json", &small_options());
    let mut als = Als::new(&path, Box::new(FailingSolver), Logger::new("test")).unwrap();
    als.set_data(Box::new(small_matrix())).unwrap();
    als.initialize().unwrap();
    assert!(matches!(als.train(), Err(IalsError::Solver(_))));
}

#[test]
fn malformed_option_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, "{ num_iters: ").unwrap();
    let err = Als::new(&path, Box::new(FailingSolver), Logger::new("test")).err().unwrap();
    assert!(matches!(err, IalsError::Configuration(_)));
}

#[test]
fn early_stopping_after_consecutive_increases() {
    let dir = tempfile::tempdir().unwrap();
    let opt = ials_core::AlsOptions {
        num_iters: 10,
        early_stopping_rounds: 2,
        ..small_options()
    };
    let path = write_options(dir.path(), "als.json", &opt);
    let passes = Arc::new(AtomicUsize::new(0));
    let losses = vec![2.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
    let solver = ScriptedSolver {
        losses: losses.clone(),
        colwise_passes: Arc::clone(&passes),
    };
    let mut als = Als::new(&path, Box::new(solver), Logger::new("test")).unwrap();
    als.set_data(Box::new(small_matrix())).unwrap();
    als.initialize().unwrap();
    let metrics = als.train().unwrap();

    let stopped_at = passes.load(Ordering::SeqCst);
    assert!((3..=4).contains(&stopped_at), "stopped at {stopped_at}");
    let loss = metrics.train_loss().unwrap();
    assert!((loss - losses[stopped_at - 1]).abs() < 1e-9);
    assert!((als.best_loss() - 1.0).abs() < 1e-9);
}

fn scripted_run(
    dir: &std::path::Path,
    opt: &ials_core::AlsOptions,
    losses: Vec<f64>,
) -> (Als, Arc<AtomicUsize>) {
    let path = write_options(dir, "als.json", opt);
    let passes = Arc::new(AtomicUsize::new(0));
    let solver = ScriptedSolver {
        losses,
        colwise_passes: Arc::clone(&passes),
    };
    let mut als = Als::new(&path, Box::new(solver), Logger::new("test")).unwrap();
    als.set_data(Box::new(small_matrix())).unwrap();
    als.initialize().unwrap();
    (als, passes)
}

#[test]
fn nan_loss_does_not_replace_best_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("best.bin");
    let opt = ials_core::AlsOptions {
        num_iters: 3,
        save_best: true,
        model_path: Some(model_path.clone()),
        ..small_options()
    };
    let (mut als, _) = scripted_run(dir.path(), &opt, vec![1.0, f64::NAN, 5.0]);
    let metrics = als.train().unwrap();

    assert_eq!(metrics.train_loss(), Some(5.0));
    assert_eq!(als.best_loss(), 1.0);
    // 保存されているのは 1 反復目の状態
    let saved = AlsModel::load(&model_path).unwrap();
    assert_eq!(saved.factors.q.row(0)[0], 1.0);
}

#[test]
fn nan_loss_counts_toward_early_stopping() {
    let dir = tempfile::tempdir().unwrap();
    let opt = ials_core::AlsOptions {
        num_iters: 10,
        early_stopping_rounds: 2,
        ..small_options()
    };
    let (mut als, passes) = scripted_run(dir.path(), &opt, vec![1.0, f64::NAN]);
    let metrics = als.train().unwrap();
    assert_eq!(passes.load(Ordering::SeqCst), 3);
    assert!(metrics.train_loss().unwrap().is_nan());
}

#[test]
fn save_best_writes_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let model_path = dir.path().join("best.bin");
    let opt = ials_core::AlsOptions {
        save_best: true,
        model_path: Some(model_path.clone()),
        ..small_options()
    };
    let mut als = gradient_run(dir.path(), &opt);
    als.initialize().unwrap();
    als.train().unwrap();

    let model = AlsModel::load(&model_path).unwrap();
    assert_eq!(model.factors.dim(), 4);
    assert_eq!(model.factors.p.rows(), 4);
    assert_eq!(model.options.d, 4);
}

#[test]
fn validation_metrics_are_merged() {
    let dir = tempfile::tempdir().unwrap();
    let opt = ials_core::AlsOptions {
        validation: Some(ValidationOptions { topk: 2 }),
        evaluation_period: 2,
        ..small_options()
    };
    let mut als = gradient_run(dir.path(), &opt);
    als.set_evaluator(Box::new(HoldoutEvaluator::new(vec![(0, 4, 1.0), (1, 0, 1.0)], 2)));
    als.initialize().unwrap();
    let metrics = als.train().unwrap();

    // 最終反復（5 回目）は周期外だが、4 回目の結果が引き継がれる
    for name in ["val_rmse", "val_ndcg", "val_map", "val_accuracy"] {
        assert!(metrics.get(name).is_some(), "{name} missing");
    }
    assert!(metrics.train_loss().is_some());
}

#[test]
fn validation_without_evaluator() {
    let dir = tempfile::tempdir().unwrap();
    let opt = ials_core::AlsOptions {
        validation: Some(ValidationOptions::default()),
        ..small_options()
    };
    let mut als = gradient_run(dir.path(), &opt);
    als.initialize().unwrap();
    assert!(matches!(als.train(), Err(IalsError::Configuration(_))));
}

#[test]
fn interrupted_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut als = gradient_run(dir.path(), &small_options());
    als.initialize().unwrap();
    als.interrupt_flag().store(true, Ordering::SeqCst);
    assert!(matches!(als.train(), Err(IalsError::Interrupted)));
}
