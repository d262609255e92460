// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores everything needed to rebuild a fine-tuned
// tagger, using Burn's CompactRecorder for the weights.
//
// Directory layout:
//   checkpoints/
//     run_config.json        ← every CLI flag of the training run
//     bert_config.json       ← encoder architecture
//     tag_vocab.json         ← tag ↔ id mapping
//     tokenizer.json         ← tokenizer (written by TokenizerStore)
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     ...
//     latest_epoch.json      ← number of the newest weights file
//
// Encoder-only records (a pretrained encoder.mpk.gz or a
// --bert_checkpoint file) are loaded through load_encoder_weights.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::tag_vocab::TagVocab;
use crate::ml::bert::{BertConfig, BertEncoder};
use crate::ml::model::NerModel;

/// Extension CompactRecorder appends to record paths
pub const RECORD_EXTENSION: &str = "mpk.gz";

const RUN_CONFIG_FILE:   &str = "run_config.json";
const BERT_CONFIG_FILE:  &str = "bert_config.json";
const TAG_VOCAB_FILE:    &str = "tag_vocab.json";
const LATEST_EPOCH_FILE: &str = "latest_epoch.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating anything
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        anyhow::ensure!(
            dir.is_dir(),
            "Checkpoint directory '{}' does not exist. Have you run 'train' first?",
            dir.display()
        );
        Ok(Self { dir })
    }

    // ─── Weights ──────────────────────────────────────────────────────────────
    pub fn save_model<B: Backend>(&self, model: &NerModel<B>, epoch: usize) -> Result<()> {
        let path = self.dir.join(format!("model_epoch_{epoch}"));

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        self.write_json(LATEST_EPOCH_FILE, &epoch)?;
        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Restore the newest epoch's weights into `model`, whose
    /// architecture must match the saved one.
    pub fn load_model<B: Backend>(&self, model: NerModel<B>, device: &B::Device) -> Result<NerModel<B>> {
        let epoch = self.latest_epoch()?;
        let path  = self.dir.join(format!("model_epoch_{epoch}"));
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", path.display()))?;
        Ok(model.load_record(record))
    }

    pub fn latest_epoch(&self) -> Result<usize> {
        self.read_json(LATEST_EPOCH_FILE)
            .context("No finished epoch in this checkpoint directory. Have you run 'train' first?")
    }

    // ─── Metadata ─────────────────────────────────────────────────────────────
    pub fn save_run_config(&self, cfg: &TrainConfig) -> Result<()> {
        self.write_json(RUN_CONFIG_FILE, cfg)
    }

    pub fn load_run_config(&self) -> Result<TrainConfig> {
        self.read_json(RUN_CONFIG_FILE)
    }

    pub fn save_bert_config(&self, cfg: &BertConfig) -> Result<()> {
        cfg.save(&self.dir.join(BERT_CONFIG_FILE))
    }

    pub fn load_bert_config(&self) -> Result<BertConfig> {
        BertConfig::load(&self.dir.join(BERT_CONFIG_FILE))
    }

    pub fn save_tag_vocab(&self, vocab: &TagVocab) -> Result<()> {
        self.write_json(TAG_VOCAB_FILE, vocab)
    }

    pub fn load_tag_vocab(&self) -> Result<TagVocab> {
        self.read_json(TAG_VOCAB_FILE)
    }

    fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))
    }

    fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("Malformed '{}'", path.display()))
    }
}

// ─── Encoder Records ──────────────────────────────────────────────────────────
/// `foo.mpk.gz` → `foo`; the recorder appends the extension itself
pub fn record_stem(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_suffix(&format!(".{RECORD_EXTENSION}")) {
        Some(stem) => PathBuf::from(stem),
        None       => path.to_path_buf(),
    }
}

/// Does a record exist at `path` (with or without its extension)?
pub fn record_exists(path: &Path) -> bool {
    record_stem(path).with_extension(RECORD_EXTENSION).is_file()
}

pub fn load_encoder_weights<B: Backend>(
    encoder: BertEncoder<B>,
    path:    &Path,
    device:  &B::Device,
) -> Result<BertEncoder<B>> {
    let stem   = record_stem(path);
    let record = CompactRecorder::new()
        .load(stem.clone(), device)
        .with_context(|| format!("Cannot restore encoder weights from '{}'", path.display()))?;
    tracing::info!("Restored encoder weights from '{}'", path.display());
    Ok(encoder.load_record(record))
}

#[cfg(test)]
pub fn save_encoder_weights<B: Backend>(encoder: &BertEncoder<B>, path: &Path) -> Result<()> {
    let stem = record_stem(path);
    CompactRecorder::new()
        .record(encoder.clone().into_record(), stem)
        .with_context(|| format!("Failed to save encoder weights to '{}'", path.display()))?;
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::bert::tests::tiny_config;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_record_stem_strips_extension() {
        assert_eq!(record_stem(Path::new("ckpt/bert.mpk.gz")), PathBuf::from("ckpt/bert"));
        assert_eq!(record_stem(Path::new("ckpt/bert")), PathBuf::from("ckpt/bert"));
    }

    #[test]
    fn test_metadata_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path().join("checkpoints")).unwrap();

        let cfg = TrainConfig { num_epochs: 3, ..TrainConfig::default() };
        ckpt.save_run_config(&cfg).unwrap();
        assert_eq!(ckpt.load_run_config().unwrap().num_epochs, 3);

        let bert = tiny_config();
        ckpt.save_bert_config(&bert).unwrap();
        assert_eq!(ckpt.load_bert_config().unwrap(), bert);

        let vocab = TagVocab::from_sentences(&[]);
        ckpt.save_tag_vocab(&vocab).unwrap();
        assert_eq!(ckpt.load_tag_vocab().unwrap(), vocab);
    }

    #[test]
    fn test_missing_epoch_is_reported() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let err  = ckpt.latest_epoch().unwrap_err();
        assert!(err.to_string().contains("Have you run 'train' first?"));
    }

    #[test]
    fn test_open_requires_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CheckpointManager::open(dir.path().join("missing")).is_err());
        assert!(CheckpointManager::open(dir.path()).is_ok());
    }

    #[test]
    fn test_encoder_weights_round_trip() {
        let device = Default::default();
        let dir    = tempfile::tempdir().unwrap();
        let path   = dir.path().join("encoder.mpk.gz");

        let saved = tiny_config().init::<TestBackend>(&device);
        save_encoder_weights(&saved, &path).unwrap();
        assert!(record_exists(&path));

        let fresh    = tiny_config().init::<TestBackend>(&device);
        let restored = load_encoder_weights(fresh, &path, &device).unwrap();

        let a = saved.embeddings.word.weight.val();
        let b = restored.embeddings.word.weight.val();
        // CompactRecorder stores half precision
        let diff: f32 = (a - b).abs().max().into_scalar().elem();
        assert!(diff < 1e-2);
    }
}
