// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full fine-tuning pipeline in order:
//
//   Step 1: Validate dataset and flags     (before any model work)
//   Step 2: Tokenizer + encoder config     (Layer 6 - infra, 5 - ml)
//   Step 3: Training features              (Layer 4 - data)
//   Step 4: Evaluation features            (Layer 4 - data)
//   Step 5: Learning-rate schedule         (Layer 5 - ml)
//   Step 6: Save run metadata              (Layer 6 - infra)
//   Step 7: Run training loop              (Layer 5 - ml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

use crate::data::{dataset::NerDataset, features::FeatureBuilder, loader::ConllLoader};
use crate::domain::{error::NerError, tag_vocab::TagVocab, traits::SentenceSource};
use crate::infra::{
    checkpoint::{record_exists, CheckpointManager},
    metrics::MetricsLogger,
    tokenizer_store::{load_with_special_tokens, padded_vocab_size, TokenizerStore},
};
use crate::ml::{
    bert::BertConfig,
    schedule::{steps_per_epoch, LrPolicy, LrSchedule},
    trainer::{run_training, EncoderWeights, OptimizerKind, TrainingRun},
};

const TRAIN_FILE: &str = "train.txt";
const DEV_FILE:   &str = "dev.txt";

/// Files expected inside a --pretrained_bert_model directory
const PRETRAINED_CONFIG_FILE: &str = "config.json";
const PRETRAINED_ENCODER:     &str = "encoder.mpk.gz";

// ─── Training Configuration ──────────────────────────────────────────────────
// Every flag of the `train` command. Saved as run_config.json so the
// `tag` command can rebuild features exactly as training did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub local_rank:             Option<usize>,
    pub batch_size:             usize,
    pub num_gpus:               usize,
    pub num_epochs:             usize,
    pub lr_warmup_proportion:   f64,
    pub lr:                     f64,
    pub weight_decay:           f64,
    pub optimizer_kind:         String,
    pub mixed_precision:        bool,
    pub lr_policy:              String,
    pub pretrained_bert_model:  String,
    pub data_dir:               String,
    pub classification_dropout: f64,
    pub max_seq_length:         usize,
    pub output_filename:        String,
    pub tensorboard_filename:   String,
    pub bert_checkpoint:        Option<String>,
    pub bert_config:            Option<String>,
    pub tokenizer_model:        String,
    pub checkpoint_dir:         String,
    pub loss_log_interval:      usize,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            local_rank:             None,
            batch_size:             32,
            num_gpus:               1,
            num_epochs:             1,
            lr_warmup_proportion:   0.1,
            lr:                     5e-5,
            weight_decay:           0.0,
            optimizer_kind:         "adam".to_string(),
            mixed_precision:        false,
            lr_policy:              "lr_warmup".to_string(),
            pretrained_bert_model:  "bert-base-cased".to_string(),
            data_dir:               "./conll2003".to_string(),
            classification_dropout: 0.1,
            max_seq_length:         128,
            output_filename:        "output.txt".to_string(),
            tensorboard_filename:   "ner_tensorboard".to_string(),
            bert_checkpoint:        None,
            bert_config:            None,
            tokenizer_model:        "tokenizer.json".to_string(),
            checkpoint_dir:         "checkpoints".to_string(),
            loss_log_interval:      25,
        }
    }
}

/// Flags that were checked before anything expensive happened
struct Validated {
    train_path: PathBuf,
    policy:     LrPolicy,
    optimizer:  OptimizerKind,
}

/// Tokenizer, encoder architecture and starting weights
struct EncoderParts {
    tokenizer: Tokenizer,
    bert:      BertConfig,
    weights:   EncoderWeights,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        let Validated { train_path, policy, optimizer } = self.validate()?;

        // ── Step 2: Tokenizer and encoder ─────────────────────────────────────
        let EncoderParts { tokenizer, bert, weights } = self.encoder_parts()?;

        // ── Step 3: Training features ─────────────────────────────────────────
        println!("Loading training data...");
        let train_sentences = ConllLoader::new(&train_path).load_all()?;
        let tag_vocab       = TagVocab::from_sentences(&train_sentences);
        tracing::info!("{} tags: {}", tag_vocab.len(), tag_vocab.tags().join(" "));

        let features      = FeatureBuilder::new(&tokenizer, cfg.max_seq_length)?;
        let train_samples = features.build(&train_sentences, &tag_vocab, &train_path)?;
        tracing::info!("Built {} training samples", train_samples.len());

        // ── Step 4: Evaluation features ───────────────────────────────────────
        println!("Loading eval data...");
        let dev_path       = Path::new(&cfg.data_dir).join(DEV_FILE);
        let eval_sentences = ConllLoader::new(&dev_path).load_all()?;
        let eval_samples   = features.build(&eval_sentences, &tag_vocab, &dev_path)?;
        tracing::info!("Built {} evaluation samples", eval_samples.len());

        // ── Step 5: Learning-rate schedule ────────────────────────────────────
        let steps_per_epoch = steps_per_epoch(train_samples.len(), cfg.batch_size, cfg.num_gpus);
        println!("steps_per_epoch = {}", steps_per_epoch);
        let schedule = LrSchedule::new(policy, cfg.lr, cfg.num_epochs * steps_per_epoch);

        // ── Step 6: Save run metadata for `tag` ───────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.checkpoint_dir)?;
        checkpoints.save_run_config(cfg)?;
        checkpoints.save_bert_config(&bert)?;
        checkpoints.save_tag_vocab(&tag_vocab)?;
        TokenizerStore::new(&cfg.checkpoint_dir).save(&tokenizer)?;

        let metrics = match MetricsLogger::new(&cfg.tensorboard_filename) {
            Ok(m) => Some(m),
            Err(e) => {
                tracing::warn!("metrics logging is not available: {e:#}");
                None
            }
        };

        // ── Step 7: Run training loop (Layer 5) ───────────────────────────────
        run_training(
            cfg,
            TrainingRun {
                bert,
                weights,
                tag_vocab,
                train_dataset: NerDataset::new(train_samples),
                eval_samples,
                eval_sentences,
                schedule,
                steps_per_epoch,
                optimizer,
                checkpoints,
                metrics,
            },
        )
    }

    fn validate(&self) -> Result<Validated> {
        let cfg = &self.config;

        let train_path = Path::new(&cfg.data_dir).join(TRAIN_FILE);
        if !train_path.is_file() {
            return Err(NerError::DatasetNotFound(train_path).into());
        }

        let policy    = LrPolicy::parse(&cfg.lr_policy, cfg.lr_warmup_proportion)?;
        let optimizer = OptimizerKind::parse(&cfg.optimizer_kind)?;

        if cfg.bert_checkpoint.is_some() && cfg.bert_config.is_none() {
            return Err(NerError::MissingBertConfig.into());
        }
        anyhow::ensure!(cfg.batch_size > 0, "batch_size must be at least 1");
        anyhow::ensure!(cfg.num_gpus > 0, "num_gpus must be at least 1");
        anyhow::ensure!(
            cfg.max_seq_length > 2,
            "max_seq_length ({}) must leave room for [CLS] and [SEP]",
            cfg.max_seq_length
        );

        Ok(Validated { train_path, policy, optimizer })
    }

    fn encoder_parts(&self) -> Result<EncoderParts> {
        let cfg = &self.config;

        let parts = match (&cfg.bert_checkpoint, &cfg.bert_config) {
            (Some(checkpoint), Some(config)) => {
                tracing::info!("Restoring encoder from checkpoint '{}'", checkpoint);
                EncoderParts {
                    tokenizer: load_with_special_tokens(Path::new(&cfg.tokenizer_model))?,
                    bert:      BertConfig::load(Path::new(config))?,
                    weights:   EncoderWeights::Record(PathBuf::from(checkpoint)),
                }
            }
            (Some(_), None) => return Err(NerError::MissingBertConfig.into()),
            (None, _) => {
                let dir = Path::new(&cfg.pretrained_bert_model);
                tracing::info!("Loading pretrained model from '{}'", dir.display());

                let record  = dir.join(PRETRAINED_ENCODER);
                let weights = if record_exists(&record) {
                    EncoderWeights::Record(record)
                } else {
                    tracing::warn!(
                        "No encoder weights at '{}', starting from random initialisation",
                        record.display()
                    );
                    EncoderWeights::Random
                };
                EncoderParts {
                    tokenizer: TokenizerStore::new(dir).load()?,
                    bert:      BertConfig::load(&dir.join(PRETRAINED_CONFIG_FILE))?,
                    weights,
                }
            }
        };

        let vocab_size = parts.tokenizer.get_vocab_size(true);
        tracing::info!("vocab_size = {} (padded: {})", vocab_size, padded_vocab_size(vocab_size));
        anyhow::ensure!(
            vocab_size <= parts.bert.vocab_size,
            "Tokenizer has {} tokens but the encoder embeds only {}",
            vocab_size,
            parts.bert.vocab_size
        );
        anyhow::ensure!(
            cfg.max_seq_length <= parts.bert.max_position_embeddings,
            "max_seq_length ({}) exceeds max_position_embeddings ({})",
            cfg.max_seq_length,
            parts.bert.max_position_embeddings
        );

        Ok(parts)
    }
}
