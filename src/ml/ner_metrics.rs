// ============================================================
// Layer 5 — NER Metrics
// ============================================================
// Entity-level scoring the way the CoNLL shared task scores it:
// a predicted entity counts only if its type AND its exact word
// span match a gold entity.
//
// Chunk boundaries follow conlleval's rules, so both IOB1 data
// (the raw CoNLL-2003 files, where I- may start an entity) and
// IOB2 data (every entity starts with B-) are handled.
//
//   tags:   B-PER I-PER O I-LOC I-LOC B-LOC
//   chunks: PER[0..2)      LOC[3..5) LOC[5..6)

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use crate::domain::sentence::TaggedSentence;

/// One entity: its type and the half-open word range it covers
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk {
    pub kind:  String,
    pub start: usize,
    pub end:   usize,
}

/// "B-PER" → ("B", "PER"), "O" → ("O", "")
fn split_tag(tag: &str) -> (&str, &str) {
    match tag.split_once('-') {
        Some((prefix, kind)) => (prefix, kind),
        None                 => (tag, ""),
    }
}

fn end_of_chunk(prev_tag: &str, tag: &str, prev_kind: &str, kind: &str) -> bool {
    matches!(
        (prev_tag, tag),
        ("E", _) | ("S", _)
            | ("B", "B") | ("B", "S") | ("B", "O")
            | ("I", "B") | ("I", "S") | ("I", "O")
    ) || (prev_tag != "O" && prev_kind != kind)
}

fn start_of_chunk(prev_tag: &str, tag: &str, prev_kind: &str, kind: &str) -> bool {
    matches!(
        (prev_tag, tag),
        (_, "B") | (_, "S")
            | ("E", "E") | ("E", "I")
            | ("S", "E") | ("S", "I")
            | ("O", "E") | ("O", "I")
    ) || (tag != "O" && prev_kind != kind)
}

/// Extract entity chunks from one sentence's tags
pub fn chunks<S: AsRef<str>>(tags: &[S]) -> Vec<Chunk> {
    let mut out                             = Vec::new();
    let mut open: Option<(usize, &str)>     = None;
    let (mut prev_tag, mut prev_kind)       = ("O", "");

    for (i, tag) in tags.iter().enumerate() {
        let (tag, kind) = split_tag(tag.as_ref());

        if let Some((start, open_kind)) = open {
            if end_of_chunk(prev_tag, tag, prev_kind, kind) {
                out.push(Chunk { kind: open_kind.to_string(), start, end: i });
                open = None;
            }
        }
        if start_of_chunk(prev_tag, tag, prev_kind, kind) {
            open = Some((i, kind));
        }

        prev_tag  = tag;
        prev_kind = kind;
    }
    if let Some((start, kind)) = open {
        out.push(Chunk { kind: kind.to_string(), start, end: tags.len() });
    }
    out
}

// ─── Scores ───────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ChunkScores {
    pub gold:      usize,
    pub predicted: usize,
    pub correct:   usize,
}

impl ChunkScores {
    pub fn precision(&self) -> f64 {
        ratio(self.correct, self.predicted)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.correct, self.gold)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Everything the evaluator reports after one pass over the dev set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvalReport {
    pub loss:     f64,
    pub accuracy: f64,
    pub overall:  ChunkScores,
    pub per_type: BTreeMap<String, ChunkScores>,
}

impl EvalReport {
    /// Score predicted tags against gold sentences. `predicted[i]`
    /// must have one tag per word of `gold[i]`.
    pub fn score(gold: &[TaggedSentence], predicted: &[Vec<String>], loss: f64) -> Self {
        let mut report        = Self { loss, ..Self::default() };
        let mut words         = 0usize;
        let mut correct_words = 0usize;

        for (sentence, pred_tags) in gold.iter().zip(predicted) {
            words         += sentence.tags.len();
            correct_words += sentence.tags.iter().zip(pred_tags).filter(|(g, p)| g == p).count();

            let gold_chunks = chunks(&sentence.tags);
            let pred_chunks = chunks(pred_tags);
            let gold_set: HashSet<&Chunk> = gold_chunks.iter().collect();

            for c in &gold_chunks {
                report.overall.gold += 1;
                report.per_type.entry(c.kind.clone()).or_default().gold += 1;
            }
            for c in &pred_chunks {
                let hit   = gold_set.contains(c);
                let entry = report.per_type.entry(c.kind.clone()).or_default();
                entry.predicted        += 1;
                report.overall.predicted += 1;
                if hit {
                    entry.correct          += 1;
                    report.overall.correct += 1;
                }
            }
        }

        report.accuracy = ratio(correct_words, words);
        report
    }

    pub fn log(&self) {
        tracing::info!(
            "Eval loss={:.4} accuracy={:.2}% precision={:.2}% recall={:.2}% F1={:.2}%",
            self.loss,
            self.accuracy * 100.0,
            self.overall.precision() * 100.0,
            self.overall.recall() * 100.0,
            self.overall.f1() * 100.0,
        );
        for (kind, s) in &self.per_type {
            tracing::info!(
                "  {:<6} precision={:.2}% recall={:.2}% F1={:.2}% ({} gold, {} predicted)",
                kind,
                s.precision() * 100.0,
                s.recall() * 100.0,
                s.f1() * 100.0,
                s.gold,
                s.predicted,
            );
        }
    }
}

/// Write `word gold predicted` lines with a blank line between sentences,
/// the input format conlleval expects.
pub fn write_predictions(
    path:      &Path,
    gold:      &[TaggedSentence],
    predicted: &[Vec<String>],
) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Cannot create output file '{}'", path.display()))?;
    let mut out = BufWriter::new(file);

    for (sentence, pred_tags) in gold.iter().zip(predicted) {
        for ((word, gold_tag), pred_tag) in sentence.words.iter().zip(&sentence.tags).zip(pred_tags) {
            writeln!(out, "{word} {gold_tag} {pred_tag}")?;
        }
        writeln!(out)?;
    }
    out.flush()?;

    tracing::debug!("Wrote predictions to '{}'", path.display());
    Ok(())
}
