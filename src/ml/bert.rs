// ============================================================
// Layer 5 — BERT Encoder
// ============================================================
// A BERT-style transformer encoder:
//
//   word piece ids ─┐
//   position ids   ─┼─► sum ─► LayerNorm ─► Dropout ─► N × EncoderLayer
//   token type ids ─┘
//
// Each EncoderLayer is post-LN, as in Devlin et al. (2019):
//   x = LN(x + Dropout(SelfAttention(x, padding mask)))
//   x = LN(x + Dropout(W2 · GELU(W1 · x)))
//
// Hyper-parameters come from a HuggingFace style config.json so
// the same file that ships with a pretrained model describes the
// architecture here.

use anyhow::{Context, Result};
use burn::{
    nn::{
        attention::{MhaInput, MultiHeadAttention, MultiHeadAttentionConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        LayerNorm, LayerNormConfig,
        Linear, LinearConfig,
    },
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

// ─── Configuration ────────────────────────────────────────────────────────────
/// Encoder hyper-parameters. Unknown keys in config.json are ignored,
/// missing ones fall back to bert-base-cased values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BertConfig {
    pub vocab_size:                   usize,
    pub hidden_size:                  usize,
    pub num_hidden_layers:            usize,
    pub num_attention_heads:          usize,
    pub intermediate_size:            usize,
    pub hidden_dropout_prob:          f64,
    pub attention_probs_dropout_prob: f64,
    pub max_position_embeddings:      usize,
    pub type_vocab_size:              usize,
    pub layer_norm_eps:               f64,
}

impl Default for BertConfig {
    fn default() -> Self {
        Self {
            vocab_size:                   28996,
            hidden_size:                  768,
            num_hidden_layers:            12,
            num_attention_heads:          12,
            intermediate_size:            3072,
            hidden_dropout_prob:          0.1,
            attention_probs_dropout_prob: 0.1,
            max_position_embeddings:      512,
            type_vocab_size:              2,
            layer_norm_eps:               1e-12,
        }
    }
}

impl BertConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read BERT config '{}'", path.display()))?;
        let cfg: Self = serde_json::from_str(&json)
            .with_context(|| format!("Malformed BERT config '{}'", path.display()))?;
        anyhow::ensure!(
            cfg.num_attention_heads > 0 && cfg.hidden_size % cfg.num_attention_heads == 0,
            "hidden_size ({}) must be divisible by num_attention_heads ({})",
            cfg.hidden_size,
            cfg.num_attention_heads
        );
        Ok(cfg)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> BertEncoder<B> {
        let embeddings = BertEmbeddings {
            word:       EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device),
            position:   EmbeddingConfig::new(self.max_position_embeddings, self.hidden_size).init(device),
            token_type: EmbeddingConfig::new(self.type_vocab_size, self.hidden_size).init(device),
            norm:       self.layer_norm(device),
            dropout:    DropoutConfig::new(self.hidden_dropout_prob).init(),
        };
        let layers = (0..self.num_hidden_layers)
            .map(|_| self.build_layer(device))
            .collect();
        BertEncoder { embeddings, layers }
    }

    fn layer_norm<B: Backend>(&self, device: &B::Device) -> LayerNorm<B> {
        LayerNormConfig::new(self.hidden_size)
            .with_epsilon(self.layer_norm_eps)
            .init(device)
    }

    fn build_layer<B: Backend>(&self, device: &B::Device) -> EncoderLayer<B> {
        EncoderLayer {
            attention: MultiHeadAttentionConfig::new(self.hidden_size, self.num_attention_heads)
                .with_dropout(self.attention_probs_dropout_prob)
                .init(device),
            attention_norm: self.layer_norm(device),
            intermediate:   LinearConfig::new(self.hidden_size, self.intermediate_size).init(device),
            output:         LinearConfig::new(self.intermediate_size, self.hidden_size).init(device),
            output_norm:    self.layer_norm(device),
            dropout:        DropoutConfig::new(self.hidden_dropout_prob).init(),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Cannot write BERT config '{}'", path.display()))
    }
}

// ─── Modules ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct BertEmbeddings<B: Backend> {
    pub word:       Embedding<B>,
    pub position:   Embedding<B>,
    pub token_type: Embedding<B>,
    pub norm:       LayerNorm<B>,
    pub dropout:    Dropout,
}

impl<B: Backend> BertEmbeddings<B> {
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_len] = input_ids.dims();
        let device = input_ids.device();

        let positions = Tensor::<B, 1, Int>::arange(0..seq_len as i64, &device)
            .unsqueeze::<2>()
            .expand([batch_size, seq_len]);

        let x = self.word.forward(input_ids)
            + self.position.forward(positions)
            + self.token_type.forward(token_type_ids);
        self.dropout.forward(self.norm.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct EncoderLayer<B: Backend> {
    pub attention:      MultiHeadAttention<B>,
    pub attention_norm: LayerNorm<B>,
    pub intermediate:   Linear<B>,
    pub output:         Linear<B>,
    pub output_norm:    LayerNorm<B>,
    pub dropout:        Dropout,
}

impl<B: Backend> EncoderLayer<B> {
    /// `mask_pad` is true at padding positions
    pub fn forward(&self, x: Tensor<B, 3>, mask_pad: Tensor<B, 2, Bool>) -> Tensor<B, 3> {
        let attn = self
            .attention
            .forward(MhaInput::self_attn(x.clone()).mask_pad(mask_pad))
            .context;
        let x = self.attention_norm.forward(x + self.dropout.forward(attn));

        let ffn = self.output.forward(burn::tensor::activation::gelu(
            self.intermediate.forward(x.clone()),
        ));
        self.output_norm.forward(x + self.dropout.forward(ffn))
    }
}

#[derive(Module, Debug)]
pub struct BertEncoder<B: Backend> {
    pub embeddings: BertEmbeddings<B>,
    pub layers:     Vec<EncoderLayer<B>>,
}

impl<B: Backend> BertEncoder<B> {
    /// input_ids, token_type_ids, attention_mask: [batch, seq]
    /// → hidden states [batch, seq, hidden_size]
    pub fn forward(
        &self,
        input_ids:      Tensor<B, 2, Int>,
        token_type_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let mask_pad = attention_mask.equal_elem(0);

        let mut x = self.embeddings.forward(input_ids, token_type_ids);
        for layer in &self.layers {
            x = layer.forward(x, mask_pad.clone());
        }
        x
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    pub(crate) fn tiny_config() -> BertConfig {
        BertConfig {
            vocab_size:                   16,
            hidden_size:                  8,
            num_hidden_layers:            2,
            num_attention_heads:          2,
            intermediate_size:            16,
            hidden_dropout_prob:          0.0,
            attention_probs_dropout_prob: 0.0,
            max_position_embeddings:      12,
            type_vocab_size:              2,
            layer_norm_eps:               1e-12,
        }
    }

    #[test]
    fn test_hidden_state_shape() {
        let device  = Default::default();
        let encoder = tiny_config().init::<TestBackend>(&device);

        let ids   = Tensor::<TestBackend, 2, Int>::from_ints([[2, 5, 6, 3, 0], [2, 7, 3, 0, 0]], &device);
        let types = Tensor::<TestBackend, 2, Int>::zeros([2, 5], &device);
        let mask  = Tensor::<TestBackend, 2, Int>::from_ints([[1, 1, 1, 1, 0], [1, 1, 1, 0, 0]], &device);

        let hidden = encoder.forward(ids, types, mask);
        assert_eq!(hidden.dims(), [2, 5, 8]);
    }

    #[test]
    fn test_padding_does_not_change_real_positions() {
        let device  = Default::default();
        let encoder = tiny_config().init::<TestBackend>(&device);

        // Same sentence, padded with different junk ids
        let a = Tensor::<TestBackend, 2, Int>::from_ints([[2, 5, 3, 0, 0]], &device);
        let b = Tensor::<TestBackend, 2, Int>::from_ints([[2, 5, 3, 9, 11]], &device);
        let types = Tensor::<TestBackend, 2, Int>::zeros([1, 5], &device);
        let mask  = Tensor::<TestBackend, 2, Int>::from_ints([[1, 1, 1, 0, 0]], &device);

        let ha = encoder.forward(a, types.clone(), mask.clone()).slice([0..1, 0..3, 0..8]);
        let hb = encoder.forward(b, types, mask).slice([0..1, 0..3, 0..8]);

        let diff: f32 = (ha - hb).abs().max().into_scalar().elem();
        assert!(diff < 1e-4, "padding leaked into real positions: {diff}");
    }

    #[test]
    fn test_config_reads_huggingface_json() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"architectures": ["BertForMaskedLM"], "hidden_size": 8,
                "num_attention_heads": 2, "num_hidden_layers": 1, "vocab_size": 24}"#,
        )
        .unwrap();

        let cfg = BertConfig::load(&path).unwrap();
        assert_eq!(cfg.hidden_size, 8);
        assert_eq!(cfg.vocab_size, 24);
        // Missing keys fall back to the defaults
        assert_eq!(cfg.max_position_embeddings, 512);
    }

    #[test]
    fn test_config_rejects_indivisible_heads() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"hidden_size": 10, "num_attention_heads": 3}"#).unwrap();
        assert!(BertConfig::load(&path).is_err());
    }
}
