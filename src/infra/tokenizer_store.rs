// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Loads and saves the word-piece tokenizer.
//
// Two ways a tokenizer enters a training run:
//   1. Pretrained model directory → <dir>/tokenizer.json as shipped
//   2. --bert_checkpoint run      → the --tokenizer_model file, with
//                                   [MASK] [CLS] [SEP] registered as
//                                   special tokens (sentencepiece style
//                                   vocabularies do not carry them)
//
// Whatever was used is copied into the checkpoint directory so
// the `tag` command decodes with the exact same vocabulary.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokenizers::{AddedToken, Tokenizer};

use crate::domain::error::NerError;

pub const TOKENIZER_FILE: &str = "tokenizer.json";

const CHECKPOINT_SPECIAL_TOKENS: [&str; 3] = ["[MASK]", "[CLS]", "[SEP]"];

/// Tokenizer persistence rooted at one directory.
pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    /// Load `<dir>/tokenizer.json`
    pub fn load(&self) -> Result<Tokenizer> {
        load_file(&self.path())
    }

    pub fn save(&self, tokenizer: &Tokenizer) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create '{}'", self.dir.display()))?;
        let path = self.path();
        tokenizer
            .save(&path, false)
            .map_err(|e| anyhow::anyhow!("Cannot write tokenizer to '{}': {}", path.display(), e))?;
        tracing::debug!("Saved tokenizer to '{}'", path.display());
        Ok(())
    }
}

/// Load a tokenizer file and register the special tokens a BERT
/// encoder restored from a raw checkpoint expects.
pub fn load_with_special_tokens(path: &Path) -> Result<Tokenizer> {
    let mut tokenizer = load_file(path)?;
    let added: Vec<AddedToken> = CHECKPOINT_SPECIAL_TOKENS
        .iter()
        .map(|t| AddedToken::from(*t, true))
        .collect();
    let n = tokenizer.add_special_tokens(&added);
    tracing::info!("Registered {} special tokens on '{}'", n, path.display());
    Ok(tokenizer)
}

fn load_file(path: &Path) -> Result<Tokenizer> {
    Tokenizer::from_file(path)
        .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
}

/// Embedding tables are sized to a multiple of 8 for tensor-core friendly shapes.
pub fn padded_vocab_size(vocab_size: usize) -> usize {
    vocab_size.div_ceil(8) * 8
}

// ─── Special Token Ids ────────────────────────────────────────────────────────
/// Ids the feature builder needs around every sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub cls: u32,
    pub sep: u32,
    pub pad: u32,
    pub unk: u32,
}

impl SpecialTokens {
    pub fn from_tokenizer(tokenizer: &Tokenizer) -> Result<Self, NerError> {
        let require = |token: &str| {
            tokenizer
                .token_to_id(token)
                .ok_or_else(|| NerError::MissingSpecialToken(token.to_string()))
        };
        let cls = require("[CLS]")?;
        let sep = require("[SEP]")?;
        let pad = tokenizer
            .token_to_id("[PAD]")
            .or_else(|| tokenizer.token_to_id("<pad>"))
            .unwrap_or(0);
        let unk = tokenizer
            .token_to_id("[UNK]")
            .or_else(|| tokenizer.token_to_id("<unk>"))
            .unwrap_or(pad);
        Ok(Self { cls, sep, pad, unk })
    }
}

// ─── Test Support ─────────────────────────────────────────────────────────────
/// Build a small word-level tokenizer in HuggingFace JSON format.
/// The whitespace pre-tokenizer splits punctuation off, so "U.S."
/// becomes four pieces and exercises multi-piece words.
#[cfg(test)]
pub fn word_level_tokenizer(words: &[&str]) -> Tokenizer {
    use std::str::FromStr;

    let mut vocab = serde_json::json!({
        "[PAD]":  0,
        "[UNK]":  1,
        "[CLS]":  2,
        "[SEP]":  3,
        "[MASK]": 4,
    });
    for (i, word) in words.iter().enumerate() {
        vocab[*word] = serde_json::json!(5 + i);
    }

    let special = |id: u32, content: &str| {
        serde_json::json!({
            "id": id, "content": content, "single_word": false, "lstrip": false,
            "rstrip": false, "normalized": false, "special": true
        })
    };

    let json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            special(0, "[PAD]"), special(1, "[UNK]"), special(2, "[CLS]"),
            special(3, "[SEP]"), special(4, "[MASK]")
        ],
        "normalizer": null,
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": { "type": "WordLevel", "vocab": vocab, "unk_token": "[UNK]" }
    });

    Tokenizer::from_str(&json.to_string()).expect("valid tokenizer json")
}
