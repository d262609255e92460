use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One fully tokenised and padded model input.
/// Sequence format: [CLS] word pieces... [SEP] [PAD]...
///
/// `labels[i]` is only meaningful where `label_mask[i] == 1`, which
/// is the first piece of every word. `sentence` and `first_word`
/// locate the covered words inside the source file so predictions
/// can be stitched back per sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NerSample {
    pub input_ids:      Vec<u32>,
    pub input_type_ids: Vec<u32>,
    pub input_mask:     Vec<u32>,
    pub labels:         Vec<u32>,
    pub label_mask:     Vec<u32>,
    pub sentence:       usize,
    pub first_word:     usize,
}

impl NerSample {
    /// Number of words (not pieces) this sample carries labels for
    pub fn word_count(&self) -> usize {
        self.label_mask.iter().filter(|&&m| m == 1).count()
    }

    /// Sequence positions holding the first piece of each word, in word order
    pub fn label_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.label_mask
            .iter()
            .enumerate()
            .filter(|(_, &m)| m == 1)
            .map(|(i, _)| i)
    }
}

#[derive(Clone)]
pub struct NerDataset {
    samples: Vec<NerSample>,
}

impl NerDataset {
    pub fn new(samples: Vec<NerSample>) -> Self { Self { samples } }
}

impl Dataset<NerSample> for NerDataset {
    fn get(&self, index: usize) -> Option<NerSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}
