// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Model architecture, training and inference.
//
//   bert.rs        — BERT encoder (embeddings + post-LN layers),
//                    configured from a HuggingFace config.json
//
//   model.rs       — token classification head and masked
//                    cross entropy, chained onto the encoder
//
//   schedule.rs    — lr_warmup / lr_poly / lr_cosine policies
//                    and steps_per_epoch
//
//   ner_metrics.rs — conlleval style entity scoring
//
//   callbacks.rs   — loss logger and dev set evaluator
//
//   trainer.rs     — the training loop and backend selection
//
//   inferencer.rs  — rebuilds a checkpoint and tags words
//
// Reference: Devlin et al. (2019) BERT
//            Burn Book §5 (Training)

/// BERT encoder architecture
pub mod bert;

/// Token classifier and full NER model
pub mod model;

/// Learning-rate policies
pub mod schedule;

/// Entity-level precision / recall / F1
pub mod ner_metrics;

/// Training callbacks
pub mod callbacks;

/// Full training loop with evaluation and checkpointing
pub mod trainer;

/// Inference engine — loads checkpoint and predicts tags
pub mod inferencer;
