// ============================================================
// Layer 4 — NER Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<NerSample>
// into device tensors.
//
//   Input:  N NerSamples, each padded to length S
//   Output: NerBatch with [N, S] tensors
//
// All samples are already padded to max_seq_length by the
// FeatureBuilder, so stacking is a flatten + reshape.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::NerSample;

/// A batch of NER samples ready for the forward pass.
#[derive(Debug, Clone)]
pub struct NerBatch<B: Backend> {
    /// Word-piece ids — [batch, seq]
    pub input_ids: Tensor<B, 2, Int>,

    /// Segment ids, all zero for single-sentence input — [batch, seq]
    pub input_type_ids: Tensor<B, 2, Int>,

    /// 1 = real token, 0 = padding — [batch, seq]
    pub input_mask: Tensor<B, 2, Int>,

    /// Tag ids, meaningful only where label_mask is 1 — [batch, seq]
    pub labels: Tensor<B, 2, Int>,

    /// 1.0 at the first piece of each word — [batch, seq]
    pub label_mask: Tensor<B, 2>,

    /// Host-side copy of the stacked samples, in batch order.
    /// The evaluator needs them to map positions back to words.
    pub samples: Vec<NerSample>,
}

#[derive(Clone, Debug, Default)]
pub struct NerBatcher;

impl NerBatcher {
    pub fn new() -> Self {
        Self
    }
}

impl<B: Backend> Batcher<B, NerSample, NerBatch<B>> for NerBatcher {
    fn batch(&self, items: Vec<NerSample>, device: &B::Device) -> NerBatch<B> {
        let batch_size = items.len();
        let seq_len    = items.first().map(|s| s.input_ids.len()).unwrap_or(0);

        let stack_ints = |field: fn(&NerSample) -> &Vec<u32>| {
            let flat: Vec<i64> = items
                .iter()
                .flat_map(|s| field(s).iter().map(|&x| x as i64))
                .collect();
            Tensor::<B, 2, Int>::from_ints(TensorData::new(flat, [batch_size, seq_len]), device)
        };

        let input_ids      = stack_ints(|s| &s.input_ids);
        let input_type_ids = stack_ints(|s| &s.input_type_ids);
        let input_mask     = stack_ints(|s| &s.input_mask);
        let labels         = stack_ints(|s| &s.labels);

        let mask_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.label_mask.iter().map(|&m| m as f32))
            .collect();
        let label_mask = Tensor::<B, 2>::from_floats(
            TensorData::new(mask_flat, [batch_size, seq_len]),
            device,
        );

        NerBatch {
            input_ids,
            input_type_ids,
            input_mask,
            labels,
            label_mask,
            samples: items,
        }
    }
}
