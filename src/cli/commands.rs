// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `tag`, and their flags.
//
// Flag names are snake_case (--batch_size, --lr_policy, ...) so
// existing NER fine-tuning scripts keep working unchanged.

use clap::{ArgGroup, Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune a BERT encoder for named entity recognition on CoNLL-2003
    Train(TrainArgs),

    /// Tag text with a fine-tuned checkpoint
    Tag(TagArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// GPU index to train on (default device if unset)
    #[arg(long = "local_rank")]
    pub local_rank: Option<usize>,

    #[arg(long = "batch_size", default_value_t = 32)]
    pub batch_size: usize,

    /// Only scales steps_per_epoch; training itself uses one device
    #[arg(long = "num_gpus", default_value_t = 1)]
    pub num_gpus: usize,

    #[arg(long = "num_epochs", default_value_t = 1)]
    pub num_epochs: usize,

    /// Fraction of all steps spent warming up (lr_warmup policy only)
    #[arg(long = "lr_warmup_proportion", default_value_t = 0.1)]
    pub lr_warmup_proportion: f64,

    /// Peak learning rate
    #[arg(long = "lr", default_value_t = 5e-5)]
    pub lr: f64,

    #[arg(long = "weight_decay", default_value_t = 0.0)]
    pub weight_decay: f64,

    /// adam or adamw
    #[arg(long = "optimizer_kind", default_value = "adam")]
    pub optimizer_kind: String,

    /// Train in half precision (f16)
    #[arg(long = "mixed_precision")]
    pub mixed_precision: bool,

    /// lr_warmup, lr_poly or lr_cosine
    #[arg(long = "lr_policy", default_value = "lr_warmup")]
    pub lr_policy: String,

    /// Directory with tokenizer.json, config.json and optionally encoder.mpk.gz
    #[arg(long = "pretrained_bert_model", default_value = "bert-base-cased")]
    pub pretrained_bert_model: String,

    /// Directory holding train.txt and dev.txt
    #[arg(long = "data_dir", default_value = "./conll2003")]
    pub data_dir: String,

    #[arg(long = "classification_dropout", default_value_t = 0.1)]
    pub classification_dropout: f64,

    /// Word pieces per sample, including [CLS] and [SEP]
    #[arg(long = "max_seq_length", default_value_t = 128)]
    pub max_seq_length: usize,

    /// Where the evaluator writes `word gold predicted` lines
    #[arg(long = "output_filename", default_value = "output.txt")]
    pub output_filename: String,

    /// Directory for the scalar metrics CSV
    #[arg(long = "tensorboard_filename", default_value = "ner_tensorboard")]
    pub tensorboard_filename: String,

    /// Encoder record to restore instead of a pretrained model directory
    #[arg(long = "bert_checkpoint")]
    pub bert_checkpoint: Option<String>,

    /// Encoder config.json; required with --bert_checkpoint
    #[arg(long = "bert_config")]
    pub bert_config: Option<String>,

    /// Tokenizer used together with --bert_checkpoint
    #[arg(long = "tokenizer_model", default_value = "tokenizer.json")]
    pub tokenizer_model: String,

    /// Where checkpoints, configs and the tokenizer are saved
    #[arg(long = "checkpoint_dir", default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Print the training loss every N steps
    #[arg(long = "loss_log_interval", default_value_t = 25)]
    pub loss_log_interval: usize,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            local_rank:             a.local_rank,
            batch_size:             a.batch_size,
            num_gpus:               a.num_gpus,
            num_epochs:             a.num_epochs,
            lr_warmup_proportion:   a.lr_warmup_proportion,
            lr:                     a.lr,
            weight_decay:           a.weight_decay,
            optimizer_kind:         a.optimizer_kind,
            mixed_precision:        a.mixed_precision,
            lr_policy:              a.lr_policy,
            pretrained_bert_model:  a.pretrained_bert_model,
            data_dir:               a.data_dir,
            classification_dropout: a.classification_dropout,
            max_seq_length:         a.max_seq_length,
            output_filename:        a.output_filename,
            tensorboard_filename:   a.tensorboard_filename,
            bert_checkpoint:        a.bert_checkpoint,
            bert_config:            a.bert_config,
            tokenizer_model:        a.tokenizer_model,
            checkpoint_dir:         a.checkpoint_dir,
            loss_log_interval:      a.loss_log_interval,
        }
    }
}

/// All arguments for the `tag` command
#[derive(Args, Debug)]
#[command(group(ArgGroup::new("input").required(true).args(["text", "input_file"])))]
pub struct TagArgs {
    /// Directory written by `train`
    #[arg(long = "checkpoint_dir", default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// One sentence to tag
    #[arg(long)]
    pub text: Option<String>,

    /// File with one sentence per line
    #[arg(long = "input_file")]
    pub input_file: Option<PathBuf>,
}
