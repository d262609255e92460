// ============================================================
// Layer 5 — NER Model
// ============================================================
// Chains the BERT encoder into a token classification head:
//
//   input_ids, input_type_ids, input_mask
//        │
//        ▼
//   BertEncoder      → hidden states [batch, seq, hidden]
//        │
//        ▼
//   TokenClassifier  → logits [batch, seq, num_labels]
//        │
//        ▼
//   masked cross entropy over first word pieces → loss

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::ml::bert::{BertConfig, BertEncoder};

// ─── Token Classifier ─────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct TokenClassifierConfig {
    pub d_model:    usize,
    pub num_labels: usize,
    #[config(default = 0.1)]
    pub dropout:    f64,
}

impl TokenClassifierConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> TokenClassifier<B> {
        TokenClassifier {
            dropout: DropoutConfig::new(self.dropout).init(),
            output:  LinearConfig::new(self.d_model, self.num_labels).init(device),
        }
    }
}

#[derive(Module, Debug)]
pub struct TokenClassifier<B: Backend> {
    pub dropout: Dropout,
    pub output:  Linear<B>,
}

impl<B: Backend> TokenClassifier<B> {
    pub fn forward(&self, hidden_states: Tensor<B, 3>) -> Tensor<B, 3> {
        self.output.forward(self.dropout.forward(hidden_states))
    }

    /// Returns (loss, logits)
    pub fn forward_loss(
        &self,
        hidden_states: Tensor<B, 3>,
        labels:        Tensor<B, 2, Int>,
        label_mask:    Tensor<B, 2>,
    ) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let logits = self.forward(hidden_states);
        let loss   = masked_cross_entropy(logits.clone(), labels, label_mask);
        (loss, logits)
    }
}

/// Mean cross entropy over the positions where `mask` is 1.0.
/// An all-zero mask yields a loss of 0 rather than NaN.
pub fn masked_cross_entropy<B: Backend>(
    logits: Tensor<B, 3>,
    labels: Tensor<B, 2, Int>,
    mask:   Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [batch_size, seq_len, num_labels] = logits.dims();
    let n = batch_size * seq_len;

    let log_probs = log_softmax(logits.reshape([n, num_labels]), 1);
    let picked    = log_probs
        .gather(1, labels.reshape([n, 1]))
        .reshape([n]);

    let mask  = mask.reshape([n]);
    let count = mask.clone().sum().clamp_min(1.0);
    (picked * mask).sum().neg() / count
}

// ─── Full Model ───────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct NerModel<B: Backend> {
    pub encoder:    BertEncoder<B>,
    pub classifier: TokenClassifier<B>,
}

impl<B: Backend> NerModel<B> {
    pub fn new(
        bert:                   &BertConfig,
        num_labels:             usize,
        classification_dropout: f64,
        device:                 &B::Device,
    ) -> Self {
        let classifier = TokenClassifierConfig::new(bert.hidden_size, num_labels)
            .with_dropout(classification_dropout)
            .init(device);
        Self { encoder: bert.init(device), classifier }
    }

    /// → logits [batch, seq, num_labels]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        input_type_ids: Tensor<B, 2, Int>,
        input_mask:     Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let hidden = self.encoder.forward(input_ids, input_type_ids, input_mask);
        self.classifier.forward(hidden)
    }

    /// Returns (loss, logits)
    pub fn forward_loss(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        input_type_ids: Tensor<B, 2, Int>,
        input_mask:     Tensor<B, 2, Int>,
        labels:         Tensor<B, 2, Int>,
        label_mask:     Tensor<B, 2>,
    ) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let hidden = self.encoder.forward(input_ids, input_type_ids, input_mask);
        self.classifier.forward_loss(hidden, labels, label_mask)
    }
}

/// Arg-max tag id for every position, flattened row-major as [batch * seq]
pub fn predicted_ids<B: Backend>(logits: Tensor<B, 3>) -> Vec<i64> {
    logits.argmax(2).into_data().iter::<i64>().collect()
}
