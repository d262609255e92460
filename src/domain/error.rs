use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the checks this crate performs itself.
/// Failures inside Burn, the tokenizer or the filesystem travel as
/// `anyhow::Error` with context instead.
#[derive(Debug, Error)]
pub enum NerError {
    #[error(
        "CoNLL-2003 dataset not found at '{}'. Dataset can be obtained at \
         https://github.com/kyzhouhzau/BERT-NER/tree/master/data and should be \
         put in the folder passed as --data_dir.",
        .0.display()
    )]
    DatasetNotFound(PathBuf),

    #[error("Invalid lr_policy '{0}', must be lr_warmup, lr_poly or lr_cosine")]
    InvalidLrPolicy(String),

    #[error("Invalid optimizer_kind '{0}', must be adam or adamw")]
    InvalidOptimizer(String),

    #[error("{}:{line}: expected at least a word and a tag, got '{content}'", .path.display())]
    MalformedLine {
        path:    PathBuf,
        line:    usize,
        content: String,
    },

    #[error("Tag '{tag}' in '{}' does not occur in the training data", .path.display())]
    UnknownTag { tag: String, path: PathBuf },

    #[error("Tokenizer has no '{0}' token")]
    MissingSpecialToken(String),

    #[error("--bert_config is required when --bert_checkpoint is given")]
    MissingBertConfig,
}
