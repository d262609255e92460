// ============================================================
// Layer 3 — TaggedSentence Domain Type
// ============================================================
// One sentence from a CoNLL file: the words in order and the
// NER tag attached to each of them.
//
// Example:
//   words: ["EU", "rejects", "German", "call"]
//   tags:  ["B-ORG", "O", "B-MISC", "O"]

use serde::{Deserialize, Serialize};

/// A sentence with exactly one tag per word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedSentence {
    pub words: Vec<String>,
    pub tags:  Vec<String>,
}

impl TaggedSentence {
    pub fn new(words: Vec<String>, tags: Vec<String>) -> Self {
        debug_assert_eq!(words.len(), tags.len());
        Self { words, tags }
    }

    /// A sentence with every word tagged `O`. Used when tagging raw text.
    pub fn untagged(words: Vec<String>) -> Self {
        let tags = vec!["O".to_string(); words.len()];
        Self { words, tags }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_sentence_uses_outside_tag() {
        let s = TaggedSentence::untagged(vec!["Paris".into(), "rocks".into()]);
        assert_eq!(s.len(), 2);
        assert!(s.tags.iter().all(|t| t == "O"));
    }
}
