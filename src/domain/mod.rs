// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs and traits that describe the NER problem.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Everything else (CoNLL parsing, tokenisation, tensors) is
// expressed in terms of the types defined here.

// A sentence with one NER tag per word
pub mod sentence;

// The ordered tag → id mapping shared by training and evaluation
pub mod tag_vocab;

// Typed errors for the checks the pipeline performs itself
pub mod error;

// Core abstractions (traits) that other layers implement
pub mod traits;
