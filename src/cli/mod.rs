// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses command line arguments with clap and delegates all work
// to Layer 2 (application).
//
//   1. `train` — fine-tunes the encoder + tagger on CoNLL-2003
//   2. `tag`   — loads a checkpoint and tags sentences

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TagArgs, TrainArgs};

use crate::domain::sentence::TaggedSentence;

#[derive(Parser, Debug)]
#[command(
    name = "bert-ner",
    version,
    about = "Fine-tune a BERT encoder for named entity recognition, then tag text with it."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Tag(args)   => run_tag(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Fine-tuning on CoNLL-2003 data in: {}", args.data_dir);
    let checkpoint_dir = args.checkpoint_dir.clone();

    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints saved to '{}'.", checkpoint_dir);
    Ok(())
}

fn run_tag(args: TagArgs) -> Result<()> {
    use crate::application::tag_use_case::TagUseCase;

    let use_case = TagUseCase::from_checkpoint(&args.checkpoint_dir)?;

    let sentences = match (args.text, args.input_file) {
        (Some(text), _)    => vec![use_case.tag_text(&text)?],
        (None, Some(path)) => use_case.tag_file(&path)?,
        (None, None)       => anyhow::bail!("Pass --text or --input_file"),
    };

    for sentence in &sentences {
        println!("{}", format_tagged(sentence));
    }
    Ok(())
}

/// `EU/B-ORG rejects/O German/B-MISC`
fn format_tagged(sentence: &TaggedSentence) -> String {
    sentence
        .words
        .iter()
        .zip(&sentence.tags)
        .map(|(word, tag)| format!("{word}/{tag}"))
        .collect::<Vec<_>>()
        .join(" ")
}
