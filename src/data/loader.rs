// ============================================================
// Layer 4 — CoNLL-2003 Loader
// ============================================================
// Reads a CoNLL-2003 formatted file into TaggedSentences.
//
// File format (one token per line, space separated columns):
//
//   -DOCSTART- -X- -X- O
//
//   EU NNP B-NP B-ORG
//   rejects VBZ B-VP O
//   German JJ B-NP B-MISC
//
// Rules:
//   - the FIRST column is the word, the LAST column is the NER tag
//   - a blank line ends the current sentence
//   - -DOCSTART- lines are document separators and are skipped
//   - a line with fewer than two columns is malformed

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::error::NerError;
use crate::domain::sentence::TaggedSentence;
use crate::domain::traits::SentenceSource;

const DOCSTART: &str = "-DOCSTART-";

/// Loads one CoNLL file. Implements the SentenceSource trait from Layer 3.
pub struct ConllLoader {
    path: PathBuf,
}

impl ConllLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SentenceSource for ConllLoader {
    fn load_all(&self) -> Result<Vec<TaggedSentence>> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read '{}'", self.path.display()))?;

        let sentences = parse_conll(&text, &self.path)?;
        tracing::info!(
            "Loaded {} sentences ({} words) from '{}'",
            sentences.len(),
            sentences.iter().map(TaggedSentence::len).sum::<usize>(),
            self.path.display()
        );
        Ok(sentences)
    }
}

/// Parse CoNLL text. `source` is only used in error messages.
pub fn parse_conll(text: &str, source: &Path) -> Result<Vec<TaggedSentence>, NerError> {
    let mut sentences = Vec::new();
    let mut words     = Vec::new();
    let mut tags      = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();

        if line.is_empty() {
            flush(&mut sentences, &mut words, &mut tags);
            continue;
        }
        if line.starts_with(DOCSTART) {
            flush(&mut sentences, &mut words, &mut tags);
            continue;
        }

        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 2 {
            return Err(NerError::MalformedLine {
                path:    source.to_path_buf(),
                line:    idx + 1,
                content: line.to_string(),
            });
        }

        words.push(columns[0].to_string());
        tags.push(columns[columns.len() - 1].to_string());
    }
    // Files do not always end with a blank line
    flush(&mut sentences, &mut words, &mut tags);

    Ok(sentences)
}

fn flush(out: &mut Vec<TaggedSentence>, words: &mut Vec<String>, tags: &mut Vec<String>) {
    if !words.is_empty() {
        out.push(TaggedSentence::new(std::mem::take(words), std::mem::take(tags)));
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
-DOCSTART- -X- -X- O

EU NNP B-NP B-ORG
rejects VBZ B-VP O
German JJ B-NP B-MISC

Peter NNP B-NP B-PER
Blackburn NNP I-NP I-PER
";

    #[test]
    fn test_parses_sentences_and_skips_docstart() {
        let sentences = parse_conll(SAMPLE, Path::new("train.txt")).unwrap();
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].words, vec!["EU", "rejects", "German"]);
        assert_eq!(sentences[0].tags, vec!["B-ORG", "O", "B-MISC"]);
        // The last sentence has no trailing blank line
        assert_eq!(sentences[1].tags, vec!["B-PER", "I-PER"]);
    }

    #[test]
    fn test_two_column_lines_are_accepted() {
        let sentences = parse_conll("Paris B-LOC\nis O\n", Path::new("x")).unwrap();
        assert_eq!(sentences[0].tags, vec!["B-LOC", "O"]);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = parse_conll("Paris B-LOC\nbroken\n", Path::new("dev.txt")).unwrap_err();
        match err {
            NerError::MalformedLine { line, content, .. } => {
                assert_eq!(line, 2);
                assert_eq!(content, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_all_reads_file() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.txt");
        fs::write(&path, SAMPLE).unwrap();

        let sentences = ConllLoader::new(&path).load_all().unwrap();
        assert_eq!(sentences.len(), 2);
    }

    #[test]
    fn test_blank_input_gives_no_sentences() {
        assert!(parse_conll("\n\n", Path::new("x")).unwrap().is_empty());
    }
}
