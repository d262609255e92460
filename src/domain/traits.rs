// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to these traits, not to the
// concrete loader or model types behind them.

use anyhow::Result;

use crate::domain::sentence::TaggedSentence;

// ─── SentenceSource ───────────────────────────────────────────────────────────
/// Anything that can produce tagged sentences.
///
/// Implementations:
///   - ConllLoader → reads a CoNLL-2003 formatted file
pub trait SentenceSource {
    fn load_all(&self) -> Result<Vec<TaggedSentence>>;
}

// ─── TokenTagger ──────────────────────────────────────────────────────────────
/// Anything that assigns one NER tag to each word of a sentence.
///
/// Implementations:
///   - Inferencer → runs the fine-tuned encoder from a checkpoint
pub trait TokenTagger {
    fn tag(&self, words: &[String]) -> Result<Vec<String>>;
}
