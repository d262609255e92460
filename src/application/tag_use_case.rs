// ============================================================
// Layer 2 — Tag Use Case
// ============================================================
// Labels raw text with a fine-tuned checkpoint:
//   1. Split each line on whitespace into words
//   2. Ask the TokenTagger for one tag per word
//   3. Hand (word, tag) pairs back to the CLI for printing

use anyhow::{Context, Result};
use burn::backend::{wgpu::WgpuDevice, Wgpu};
use std::{fs, path::Path};

use crate::domain::{sentence::TaggedSentence, traits::TokenTagger};
use crate::ml::inferencer::Inferencer;

pub struct TagUseCase {
    tagger: Box<dyn TokenTagger>,
}

impl TagUseCase {
    /// Load the latest checkpoint in `checkpoint_dir` onto the default GPU
    pub fn from_checkpoint(checkpoint_dir: &Path) -> Result<Self> {
        let inferencer = Inferencer::<Wgpu>::from_checkpoint(checkpoint_dir, WgpuDevice::default())?;
        Ok(Self::with_tagger(Box::new(inferencer)))
    }

    pub fn with_tagger(tagger: Box<dyn TokenTagger>) -> Self {
        Self { tagger }
    }

    pub fn tag_text(&self, text: &str) -> Result<TaggedSentence> {
        let words: Vec<String> = text.split_whitespace().map(String::from).collect();
        let tags = self.tagger.tag(&words)?;
        Ok(TaggedSentence::new(words, tags))
    }

    /// One sentence per line; blank lines are skipped
    pub fn tag_file(&self, path: &Path) -> Result<Vec<TaggedSentence>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;

        let sentences = text
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.tag_text(line))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!("Tagged {} sentences from '{}'", sentences.len(), path.display());
        Ok(sentences)
    }
}
