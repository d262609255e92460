// ============================================================
// Layer 3 — Tag Vocabulary
// ============================================================
// Maps NER tag strings to the integer class ids the classifier
// predicts. The mapping is built once from the training file
// and then reused for the dev file and for inference, so a
// checkpoint always carries its own copy (tag_vocab.json).
//
// Ordering rule:
//   "O" is always id 0, every other tag gets the next free id
//   in order of first appearance.

use serde::{Deserialize, Serialize};

use crate::domain::sentence::TaggedSentence;

pub const OUTSIDE_TAG: &str = "O";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagVocab {
    tags: Vec<String>,
}

impl TagVocab {
    pub fn from_sentences(sentences: &[TaggedSentence]) -> Self {
        let mut tags = vec![OUTSIDE_TAG.to_string()];
        for tag in sentences.iter().flat_map(|s| s.tags.iter()) {
            if !tags.iter().any(|t| t == tag) {
                tags.push(tag.clone());
            }
        }
        Self { tags }
    }

    pub fn id(&self, tag: &str) -> Option<u32> {
        self.tags.iter().position(|t| t == tag).map(|i| i as u32)
    }

    /// Unknown ids fall back to the outside tag.
    pub fn tag(&self, id: u32) -> &str {
        self.tags
            .get(id as usize)
            .map(String::as_str)
            .unwrap_or(OUTSIDE_TAG)
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}
