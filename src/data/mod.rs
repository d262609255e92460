// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a CoNLL-2003 text file to device tensors.
//
//   train.txt / dev.txt
//       │
//       ▼
//   ConllLoader       → words + tags per sentence
//       │
//       ▼
//   FeatureBuilder    → word pieces, labels, label mask, windows
//       │
//       ▼
//   NerDataset        → implements Burn's Dataset trait
//       │
//       ▼
//   NerBatcher        → stacks samples into tensor batches
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop

/// Reads CoNLL-2003 formatted files
pub mod loader;

/// Aligns NER tags with word pieces and pads to max_seq_length
pub mod features;

/// Implements Burn's Dataset trait for NER samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;
