// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence shared by training and tagging:
//
//   checkpoint.rs      — model weights through Burn's
//                        CompactRecorder, plus the run config,
//                        encoder config and tag vocabulary as
//                        JSON so `tag` can rebuild the model.
//
//   tokenizer_store.rs — loads the word-piece tokenizer and
//                        copies it next to the checkpoints so
//                        training and tagging share a vocabulary.
//
//   metrics.rs         — step-level scalars (loss, lr, eval
//                        scores) appended to a CSV file.

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer loading and saving
pub mod tokenizer_store;

/// Training metrics CSV logger
pub mod metrics;
