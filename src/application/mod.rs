// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates the other layers to accomplish one
// goal (fine-tuning or tagging).
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing of results (that's Layer 1)
//   - Only workflow coordination

// The fine-tuning workflow
pub mod train_use_case;

// Tagging new text with a checkpoint
pub mod tag_use_case;
