// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Fine-tunes NerModel with Burn's DataLoader and Adam / AdamW.
//
// Per optimizer step:
//   lr   = schedule.lr_at(step)
//   loss = masked cross entropy over first word pieces
//   backward → GradientsParams → optim.step(lr, ...)
//   LossLogger every loss_log_interval steps
//   Evaluator  every steps_per_epoch steps (on model.valid())
//
// Per epoch: print a summary line and save a checkpoint.
//
// Backend selection:
//   default           → Autodiff<Wgpu>        (f32)
//   --mixed_precision → Autodiff<Wgpu<f16>>
//   --local_rank N    → WgpuDevice::DiscreteGpu(N)
//
// model.valid() returns the model on B::InnerBackend, which shares
// B's device type, so the evaluator batches onto the same device.

use anyhow::Result;
use burn::{
    backend::{wgpu::WgpuDevice, Autodiff, Wgpu},
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, AdamConfig, AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, f16},
};
use std::{path::PathBuf, sync::Arc};

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{NerBatch, NerBatcher},
    dataset::{NerDataset, NerSample},
};
use crate::domain::{error::NerError, sentence::TaggedSentence, tag_vocab::TagVocab};
use crate::infra::{
    checkpoint::{load_encoder_weights, CheckpointManager},
    metrics::MetricsLogger,
};
use crate::ml::{
    bert::BertConfig,
    callbacks::{Evaluator, LossLogger},
    model::NerModel,
    schedule::LrSchedule,
};

type FullPrecisionBackend = Autodiff<Wgpu>;
type HalfPrecisionBackend = Autodiff<Wgpu<f16>>;

const ADAM_EPSILON: f32 = 1e-8;

// ─── Optimizer Choice ─────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Adam,
    AdamW,
}

impl OptimizerKind {
    /// Parse the `--optimizer_kind` flag value
    pub fn parse(name: &str) -> Result<Self, NerError> {
        match name {
            "adam"  => Ok(Self::Adam),
            "adamw" => Ok(Self::AdamW),
            other   => Err(NerError::InvalidOptimizer(other.to_string())),
        }
    }
}

/// Where the encoder's starting weights come from
#[derive(Debug, Clone, PartialEq)]
pub enum EncoderWeights {
    /// A BertEncoder record written by CompactRecorder
    Record(PathBuf),
    /// No record available: keep the random initialisation
    Random,
}

// ─── Training Run ─────────────────────────────────────────────────────────────
/// Everything the use case prepared for the driver.
pub struct TrainingRun {
    pub bert:            BertConfig,
    pub weights:         EncoderWeights,
    pub tag_vocab:       TagVocab,
    pub train_dataset:   NerDataset,
    pub eval_samples:    Vec<NerSample>,
    pub eval_sentences:  Vec<TaggedSentence>,
    pub schedule:        LrSchedule,
    pub steps_per_epoch: usize,
    pub optimizer:       OptimizerKind,
    pub checkpoints:     CheckpointManager,
    pub metrics:         Option<MetricsLogger>,
}

pub fn run_training(cfg: &TrainConfig, run: TrainingRun) -> Result<()> {
    let device = match cfg.local_rank {
        Some(rank) => WgpuDevice::DiscreteGpu(rank),
        None       => WgpuDevice::default(),
    };
    tracing::info!("Using WGPU device: {:?}", device);

    if cfg.num_gpus > 1 {
        tracing::warn!(
            "num_gpus={} only scales steps_per_epoch; training runs on a single device",
            cfg.num_gpus
        );
    }

    if cfg.mixed_precision {
        tracing::info!("Mixed precision: training in f16");
        train_loop::<HalfPrecisionBackend>(cfg, run, device)
    } else {
        train_loop::<FullPrecisionBackend>(cfg, run, device)
    }
}

fn train_loop<B: AutodiffBackend>(cfg: &TrainConfig, run: TrainingRun, device: B::Device) -> Result<()> {

    // ── Build model ───────────────────────────────────────────────────────────
    let NerModel { encoder, classifier } = NerModel::<B>::new(
        &run.bert,
        run.tag_vocab.len(),
        cfg.classification_dropout,
        &device,
    );
    let encoder = match &run.weights {
        EncoderWeights::Record(path) => load_encoder_weights(encoder, path, &device)?,
        EncoderWeights::Random       => encoder,
    };
    let model = NerModel { encoder, classifier };
    tracing::info!(
        "Model ready: {} layers, hidden_size={}, {} labels",
        run.bert.num_hidden_layers,
        run.bert.hidden_size,
        run.tag_vocab.len()
    );

    // ── Optimiser ─────────────────────────────────────────────────────────────
    // Adam:  g = g + wd * θ before the moment updates (L2 penalty)
    // AdamW: θ = θ - lr * (m / (√v + ε) + wd * θ)
    let optimizer = run.optimizer;
    match optimizer {
        OptimizerKind::Adam => {
            let mut optim_cfg = AdamConfig::new().with_epsilon(ADAM_EPSILON);
            if cfg.weight_decay > 0.0 {
                optim_cfg = optim_cfg
                    .with_weight_decay(Some(WeightDecayConfig::new(cfg.weight_decay as f32)));
            }
            let optim = optim_cfg.init::<B, NerModel<B>>();
            fit(cfg, run, model, optim, device)
        }
        OptimizerKind::AdamW => {
            let optim = AdamWConfig::new()
                .with_epsilon(ADAM_EPSILON)
                .with_weight_decay(cfg.weight_decay as f32)
                .init::<B, NerModel<B>>();
            fit(cfg, run, model, optim, device)
        }
    }
}

fn fit<B, O>(
    cfg:       &TrainConfig,
    run:       TrainingRun,
    mut model: NerModel<B>,
    mut optim: O,
    device:    B::Device,
) -> Result<()>
where
    B: AutodiffBackend,
    O: Optimizer<NerModel<B>, B>,
{
    let TrainingRun {
        tag_vocab,
        train_dataset,
        eval_samples,
        eval_sentences,
        schedule,
        steps_per_epoch,
        checkpoints,
        metrics,
        ..
    } = run;

    // ── Training data loader (no shuffling) ───────────────────────────────────
    let train_loader: Arc<dyn DataLoader<B, NerBatch<B>>> = DataLoaderBuilder::new(NerBatcher::new())
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .set_device(device.clone())
        .build(train_dataset);

    // ── Callbacks ─────────────────────────────────────────────────────────────
    let loss_logger = LossLogger::new(cfg.loss_log_interval, metrics.as_ref());
    let evaluator   = Evaluator::new(
        eval_samples,
        eval_sentences,
        &tag_vocab,
        cfg.batch_size,
        steps_per_epoch.max(1),
        &cfg.output_filename,
        metrics.as_ref(),
    );

    // ── Epoch loop ────────────────────────────────────────────────────────────
    let mut step      = 0usize;
    let mut last_eval = None;

    for epoch in 1..=cfg.num_epochs {
        let mut train_loss_sum = 0.0f64;
        let mut train_batches  = 0usize;

        for batch in train_loader.iter() {
            let lr = schedule.lr_at(step);

            let (loss, _) = model.forward_loss(
                batch.input_ids,
                batch.input_type_ids,
                batch.input_mask,
                batch.labels,
                batch.label_mask,
            );

            let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
            train_loss_sum += loss_val;
            train_batches  += 1;

            // Backward pass + optimizer update
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(lr, model, grads);

            loss_logger.on_step(step, loss_val, lr)?;
            step += 1;

            if evaluator.is_due(step) {
                evaluator.evaluate(step, &model.valid(), &device)?;
                last_eval = Some(step);
            }
        }

        let avg_train_loss = if train_batches > 0 {
            train_loss_sum / train_batches as f64
        } else { f64::NAN };

        println!(
            "Epoch {:>3}/{} | train_loss={:.4} | steps={} | lr={:.3e}",
            epoch, cfg.num_epochs, avg_train_loss, step, schedule.lr_at(step),
        );

        checkpoints.save_model(&model, epoch)?;
        tracing::info!("Checkpoint saved for epoch {}", epoch);
    }

    // A partial last epoch (or an empty horizon) still gets scored once
    if last_eval != Some(step) {
        evaluator.evaluate(step, &model.valid(), &device)?;
    }

    tracing::info!("Training complete after {} steps", step);
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::features::FeatureBuilder;
    use crate::infra::{checkpoint::save_encoder_weights, metrics::SCALARS_FILE};
    use crate::infra::tokenizer_store::word_level_tokenizer;
    use crate::ml::bert::tests::tiny_config;
    use crate::ml::schedule::{steps_per_epoch, LrPolicy};
    use burn::backend::NdArray;
    use std::path::Path;

    type TestBackend = Autodiff<NdArray>;

    /// Five one-word sentences: three batches of two per epoch,
    /// while the schedule counts two steps per epoch.
    fn tiny_run(dir: &Path, num_epochs: usize, weights: EncoderWeights) -> (TrainConfig, TrainingRun) {
        let pairs = [
            ("EU", "B-ORG"),
            ("rejects", "O"),
            ("German", "B-MISC"),
            ("call", "O"),
            ("Peter", "B-PER"),
        ];
        let words: Vec<&str> = pairs.iter().map(|(w, _)| *w).collect();
        let tok = word_level_tokenizer(&words);
        let sentences: Vec<TaggedSentence> = pairs
            .iter()
            .map(|(w, t)| TaggedSentence::new(vec![w.to_string()], vec![t.to_string()]))
            .collect();
        let tag_vocab = TagVocab::from_sentences(&sentences);
        let samples = FeatureBuilder::new(&tok, 6)
            .unwrap()
            .build(&sentences, &tag_vocab, Path::new("train.txt"))
            .unwrap();

        let cfg = TrainConfig {
            batch_size:        2,
            num_epochs,
            lr:                1e-3,
            max_seq_length:    6,
            loss_log_interval: 1,
            output_filename:   dir.join("output.txt").to_string_lossy().into_owned(),
            ..TrainConfig::default()
        };
        let steps = steps_per_epoch(samples.len(), cfg.batch_size, cfg.num_gpus);
        assert_eq!(steps, 2);

        let run = TrainingRun {
            bert:            tiny_config(),
            weights,
            tag_vocab,
            train_dataset:   NerDataset::new(samples.clone()),
            eval_samples:    samples,
            eval_sentences:  sentences,
            schedule:        LrSchedule::new(LrPolicy::Warmup { warmup_ratio: 0.1 }, cfg.lr, num_epochs * steps),
            steps_per_epoch: steps,
            optimizer:       OptimizerKind::Adam,
            checkpoints:     CheckpointManager::new(dir.join("ckpt")).unwrap(),
            metrics:         Some(MetricsLogger::new(dir.join("tb")).unwrap()),
        };
        (cfg, run)
    }

    /// Steps at which a scalar with this tag was recorded
    fn logged_steps(dir: &Path, tag: &str) -> Vec<usize> {
        let text = std::fs::read_to_string(dir.join("tb").join(SCALARS_FILE)).unwrap();
        text.lines()
            .skip(1)
            .filter_map(|line| {
                let mut cols = line.split(',');
                let step = cols.next()?.parse().ok()?;
                (cols.next()? == tag).then_some(step)
            })
            .collect()
    }

    #[test]
    fn test_parse_optimizer_kind() {
        assert_eq!(OptimizerKind::parse("adam").unwrap(), OptimizerKind::Adam);
        assert_eq!(OptimizerKind::parse("adamw").unwrap(), OptimizerKind::AdamW);
    }

    #[test]
    fn test_unknown_optimizer_is_rejected() {
        let err = OptimizerKind::parse("novograd").unwrap_err();
        assert!(matches!(err, NerError::InvalidOptimizer(ref k) if k == "novograd"));
    }

    #[test]
    fn test_two_epochs_evaluate_on_step_cadence_and_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, run) = tiny_run(dir.path(), 2, EncoderWeights::Random);

        train_loop::<TestBackend>(&cfg, run, Default::default()).unwrap();

        // Three batches per epoch, evaluation every two steps
        assert_eq!(logged_steps(dir.path(), "f1"), vec![2, 4, 6]);
        assert_eq!(logged_steps(dir.path(), "loss"), vec![0, 1, 2, 3, 4, 5]);

        let ckpt = CheckpointManager::open(dir.path().join("ckpt")).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);
        assert!(dir.path().join("ckpt").join("model_epoch_1.mpk.gz").is_file());

        let output = std::fs::read_to_string(dir.path().join("output.txt")).unwrap();
        assert!(output.lines().any(|l| l.starts_with("EU B-ORG ")));
    }

    #[test]
    fn test_partial_last_epoch_gets_a_final_evaluation() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, run) = tiny_run(dir.path(), 1, EncoderWeights::Random);

        train_loop::<TestBackend>(&cfg, run, Default::default()).unwrap();

        assert_eq!(logged_steps(dir.path(), "f1"), vec![2, 3]);
        let ckpt = CheckpointManager::open(dir.path().join("ckpt")).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 1);
    }

    #[test]
    fn test_training_starts_from_encoder_record() {
        let dir    = tempfile::tempdir().unwrap();
        let record = dir.path().join("encoder.mpk.gz");
        let device = Default::default();
        save_encoder_weights(&tiny_config().init::<NdArray>(&device), &record).unwrap();

        let (cfg, run) = tiny_run(dir.path(), 1, EncoderWeights::Record(record));
        train_loop::<TestBackend>(&cfg, run, Default::default()).unwrap();

        assert!(dir.path().join("ckpt").join("model_epoch_1.mpk.gz").is_file());
    }

    #[test]
    fn test_missing_encoder_record_fails_before_training() {
        let dir = tempfile::tempdir().unwrap();
        let (cfg, run) = tiny_run(
            dir.path(),
            1,
            EncoderWeights::Record(dir.path().join("missing.mpk.gz")),
        );

        assert!(train_loop::<TestBackend>(&cfg, run, Default::default()).is_err());
        assert!(!dir.path().join("ckpt").join("model_epoch_1.mpk.gz").exists());
    }
}
