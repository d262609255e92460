// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Rebuilds a fine-tuned NerModel from a checkpoint directory and
// tags whitespace-separated words with it.
//
// Words go through the same FeatureBuilder used in training, so
// long inputs are windowed identically; each word's tag is read at
// its first word piece.

use anyhow::Result;
use burn::{data::dataloader::batcher::Batcher, prelude::*};
use std::path::Path;
use tokenizers::Tokenizer;

use crate::data::{batcher::NerBatcher, features::FeatureBuilder};
use crate::domain::{sentence::TaggedSentence, tag_vocab::{TagVocab, OUTSIDE_TAG}, traits::TokenTagger};
use crate::infra::{checkpoint::CheckpointManager, tokenizer_store::TokenizerStore};
use crate::ml::model::{predicted_ids, NerModel};

pub struct Inferencer<B: Backend> {
    model:          NerModel<B>,
    tokenizer:      Tokenizer,
    tag_vocab:      TagVocab,
    max_seq_length: usize,
    device:         B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn from_checkpoint(dir: &Path, device: B::Device) -> Result<Self> {
        let ckpt      = CheckpointManager::open(dir)?;
        let run_cfg   = ckpt.load_run_config()?;
        let bert      = ckpt.load_bert_config()?;
        let tag_vocab = ckpt.load_tag_vocab()?;
        let tokenizer = TokenizerStore::new(dir).load()?;

        let model = NerModel::<B>::new(&bert, tag_vocab.len(), 0.0, &device);
        let model = ckpt.load_model(model, &device)?;
        tracing::info!(
            "Model loaded from checkpoint ({} tags: {})",
            tag_vocab.len(),
            tag_vocab.tags().join(" ")
        );

        Ok(Self {
            model,
            tokenizer,
            tag_vocab,
            max_seq_length: run_cfg.max_seq_length,
            device,
        })
    }

    pub fn tag_vocab(&self) -> &TagVocab {
        &self.tag_vocab
    }
}

impl<B: Backend> TokenTagger for Inferencer<B> {
    fn tag(&self, words: &[String]) -> Result<Vec<String>> {
        if words.is_empty() {
            return Ok(Vec::new());
        }

        // Untagged words carry "O", which every vocabulary contains
        let sentence = TaggedSentence::untagged(words.to_vec());
        let samples  = FeatureBuilder::new(&self.tokenizer, self.max_seq_length)?.build(
            std::slice::from_ref(&sentence),
            &self.tag_vocab,
            Path::new("<input>"),
        )?;

        let batch   = Batcher::<B, _, _>::batch(&NerBatcher::new(), samples, &self.device);
        let seq_len = batch.input_ids.dims()[1];
        let logits  = self.model.forward(batch.input_ids, batch.input_type_ids, batch.input_mask);
        let ids     = predicted_ids(logits);

        let mut tags = vec![OUTSIDE_TAG.to_string(); words.len()];
        for (row, sample) in batch.samples.iter().enumerate() {
            for (k, pos) in sample.label_positions().enumerate() {
                if let Some(slot) = tags.get_mut(sample.first_word + k) {
                    *slot = self.tag_vocab.tag(ids[row * seq_len + pos] as u32).to_string();
                }
            }
        }

        tracing::debug!("Tagged {} words", words.len());
        Ok(tags)
    }
}
