//! Pipeline stages for quiz generation.
//!
//! Each submodule implements exactly one transformation step, so each can
//! be tested without the others and without a live model.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ clean ──▶ (prompts) ──▶ llm ──▶ extract ──▶ normalize
//! (file/URL)  (text)               (HTTP)   (JSON)      (Quiz)
//! ```
//!
//! 1. [`input`]: read abstracts from a local file or an HTTP(S) URL
//! 2. [`clean`]: whitespace/character normalisation of raw abstracts
//! 3. [`llm`]: drive the completion call with a fixed-wait retry loop.
//!    The only stage with network I/O.
//! 4. [`extract`]: salvage a JSON object from free-form completion text
//! 5. [`normalize`]: map either accepted JSON shape onto [`crate::quiz::Quiz`]

pub mod clean;
pub mod extract;
pub mod input;
pub mod llm;
pub mod normalize;
