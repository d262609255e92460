// ============================================================
// Layer 4 — Feature Builder
// ============================================================
// Turns TaggedSentences into fixed-length NerSamples.
//
// Word pieces vs. tags:
//   The tokenizer may split one word into several pieces
//   ("Blackburn" → "Black", "##burn"). Only the FIRST piece of
//   a word is trained on and predicted; the others are masked
//   out of the loss through label_mask.
//
//   words:      EU      rejects          German
//   pieces:  [CLS] EU  rejects  German  [SEP] [PAD] ...
//   labels:    0   3     0        5       0     0
//   label_mask:0   1     1        1       0     0
//
// Long sentences:
//   A sentence with more than max_seq_length - 2 pieces is split
//   at word boundaries into consecutive windows. Each window is
//   its own sample and remembers which word it starts at.
//   A single word longer than a whole window keeps only as many
//   pieces as fit.

use anyhow::Result;
use std::path::Path;
use tokenizers::Tokenizer;

use crate::data::dataset::NerSample;
use crate::domain::error::NerError;
use crate::domain::sentence::TaggedSentence;
use crate::domain::tag_vocab::TagVocab;
use crate::infra::tokenizer_store::SpecialTokens;

pub struct FeatureBuilder<'a> {
    tokenizer:      &'a Tokenizer,
    special:        SpecialTokens,
    max_seq_length: usize,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(tokenizer: &'a Tokenizer, max_seq_length: usize) -> Result<Self> {
        anyhow::ensure!(
            max_seq_length > 2,
            "max_seq_length ({}) must leave room for [CLS] and [SEP]",
            max_seq_length
        );
        let special = SpecialTokens::from_tokenizer(tokenizer)?;
        Ok(Self { tokenizer, special, max_seq_length })
    }

    /// Pieces available between [CLS] and [SEP]
    fn window(&self) -> usize {
        self.max_seq_length - 2
    }

    fn word_pieces(&self, word: &str) -> Result<Vec<u32>> {
        let enc = self
            .tokenizer
            .encode(word, false)
            .map_err(|e| anyhow::anyhow!("Tokenisation error on '{word}': {e}"))?;
        let mut ids = enc.get_ids().to_vec();
        if ids.is_empty() {
            ids.push(self.special.unk);
        }
        ids.truncate(self.window());
        Ok(ids)
    }

    /// Build samples for every sentence. Tags are resolved through
    /// `vocab`; `source` names the file in UnknownTag errors.
    pub fn build(
        &self,
        sentences: &[TaggedSentence],
        vocab:     &TagVocab,
        source:    &Path,
    ) -> Result<Vec<NerSample>> {
        let mut samples = Vec::new();

        for (sentence_idx, sentence) in sentences.iter().enumerate() {
            let label_ids: Vec<u32> = sentence
                .tags
                .iter()
                .map(|tag| {
                    vocab.id(tag).ok_or_else(|| NerError::UnknownTag {
                        tag:  tag.clone(),
                        path: source.to_path_buf(),
                    })
                })
                .collect::<Result<_, _>>()?;

            let pieces: Vec<Vec<u32>> = sentence
                .words
                .iter()
                .map(|w| self.word_pieces(w))
                .collect::<Result<_>>()?;

            let mut start = 0usize;
            while start < pieces.len() {
                // Greedily take whole words while they fit in the window.
                // Every word fits on its own because pieces were truncated.
                let mut end  = start;
                let mut used = 0usize;
                while end < pieces.len() && used + pieces[end].len() <= self.window() {
                    used += pieces[end].len();
                    end  += 1;
                }

                samples.push(self.sample(
                    &pieces[start..end],
                    &label_ids[start..end],
                    sentence_idx,
                    start,
                ));
                start = end;
            }
        }

        tracing::debug!(
            "Built {} samples from {} sentences",
            samples.len(),
            sentences.len()
        );
        Ok(samples)
    }

    fn sample(
        &self,
        pieces:     &[Vec<u32>],
        labels:     &[u32],
        sentence:   usize,
        first_word: usize,
    ) -> NerSample {
        let len = self.max_seq_length;

        let mut input_ids  = Vec::with_capacity(len);
        let mut label_ids  = Vec::with_capacity(len);
        let mut label_mask = Vec::with_capacity(len);

        input_ids.push(self.special.cls);
        label_ids.push(0);
        label_mask.push(0);

        for (word_pieces, &label) in pieces.iter().zip(labels) {
            for (i, &id) in word_pieces.iter().enumerate() {
                input_ids.push(id);
                label_ids.push(if i == 0 { label } else { 0 });
                label_mask.push(u32::from(i == 0));
            }
        }

        input_ids.push(self.special.sep);
        label_ids.push(0);
        label_mask.push(0);

        let real = input_ids.len();
        let mut input_mask = vec![1u32; real];

        input_ids.resize(len, self.special.pad);
        label_ids.resize(len, 0);
        label_mask.resize(len, 0);
        input_mask.resize(len, 0);

        NerSample {
            input_ids,
            input_type_ids: vec![0; len],
            input_mask,
            labels: label_ids,
            label_mask,
            sentence,
            first_word,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::tokenizer_store::word_level_tokenizer;

    fn sentence(pairs: &[(&str, &str)]) -> TaggedSentence {
        TaggedSentence::new(
            pairs.iter().map(|(w, _)| w.to_string()).collect(),
            pairs.iter().map(|(_, t)| t.to_string()).collect(),
        )
    }

    fn vocab() -> TagVocab {
        TagVocab::from_sentences(&[sentence(&[("a", "B-LOC"), ("b", "B-PER")])])
    }

    #[test]
    fn test_window_too_small_for_special_tokens_is_an_error() {
        let tok = word_level_tokenizer(&["Paris"]);
        assert!(FeatureBuilder::new(&tok, 2).is_err());
        assert!(FeatureBuilder::new(&tok, 0).is_err());
        assert!(FeatureBuilder::new(&tok, 3).is_ok());
    }

    #[test]
    fn test_single_piece_words_are_aligned() {
        let tok     = word_level_tokenizer(&["Paris", "is", "nice"]);
        let builder = FeatureBuilder::new(&tok, 8).unwrap();
        let s       = sentence(&[("Paris", "B-LOC"), ("is", "O"), ("nice", "O")]);

        let samples = builder.build(&[s], &vocab(), Path::new("t")).unwrap();
        assert_eq!(samples.len(), 1);
        let f = &samples[0];

        // [CLS]=2 Paris=5 is=6 nice=7 [SEP]=3 then [PAD]=0
        assert_eq!(f.input_ids, vec![2, 5, 6, 7, 3, 0, 0, 0]);
        assert_eq!(f.input_mask, vec![1, 1, 1, 1, 1, 0, 0, 0]);
        assert_eq!(f.label_mask, vec![0, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(f.labels, vec![0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(f.input_type_ids, vec![0; 8]);
        assert_eq!(f.word_count(), 3);
    }

    #[test]
    fn test_only_first_piece_is_labelled() {
        let tok     = word_level_tokenizer(&["U", ".", "S", "wins"]);
        let builder = FeatureBuilder::new(&tok, 10).unwrap();
        let s       = sentence(&[("U.S.", "B-LOC"), ("wins", "O")]);

        let f = &builder.build(&[s], &vocab(), Path::new("t")).unwrap()[0];
        // [CLS] U . S . wins [SEP]
        assert_eq!(&f.input_ids[..7], &[2, 5, 6, 7, 6, 8, 3]);
        assert_eq!(&f.label_mask[..7], &[0, 1, 0, 0, 0, 1, 0]);
        assert_eq!(f.label_positions().collect::<Vec<_>>(), vec![1, 5]);
    }

    #[test]
    fn test_long_sentence_splits_at_word_boundaries() {
        let tok     = word_level_tokenizer(&["a", "b", "c", "d", "e"]);
        // window of 2 pieces
        let builder = FeatureBuilder::new(&tok, 4).unwrap();
        let s = sentence(&[("a", "O"), ("b", "O"), ("c", "O"), ("d", "O"), ("e", "O")]);

        let samples = builder.build(&[s], &vocab(), Path::new("t")).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(
            samples.iter().map(|s| s.first_word).collect::<Vec<_>>(),
            vec![0, 2, 4]
        );
        assert_eq!(
            samples.iter().map(NerSample::word_count).sum::<usize>(),
            5
        );
        assert!(samples.iter().all(|s| s.input_ids.len() == 4));
    }

    #[test]
    fn test_oversized_word_is_truncated() {
        let tok     = word_level_tokenizer(&["U", ".", "S"]);
        let builder = FeatureBuilder::new(&tok, 4).unwrap();
        let s       = sentence(&[("U.S.", "B-LOC")]);

        let samples = builder.build(&[s], &vocab(), Path::new("t")).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].input_ids, vec![2, 5, 6, 3]);
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let tok     = word_level_tokenizer(&["x"]);
        let builder = FeatureBuilder::new(&tok, 8).unwrap();
        let s       = sentence(&[("x", "B-ORG")]);

        let err = builder.build(&[s], &vocab(), Path::new("dev.txt")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NerError>(),
            Some(NerError::UnknownTag { tag, .. }) if tag == "B-ORG"
        ));
    }

    #[test]
    fn test_out_of_vocabulary_word_maps_to_unk() {
        let tok     = word_level_tokenizer(&["known"]);
        let builder = FeatureBuilder::new(&tok, 6).unwrap();
        let s       = sentence(&[("mystery", "O")]);

        let f = &builder.build(&[s], &vocab(), Path::new("t")).unwrap()[0];
        assert_eq!(&f.input_ids[..3], &[2, 1, 3]);
    }
}
