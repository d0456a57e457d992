//! Pipeline stages for gallery extraction.
//!
//! Each submodule implements exactly one step. The orchestrator in
//! [`crate::extract`] wires them together and owns the run state.
//!
//! ## Data Flow
//!
//! ```text
//!                               ┌─▶ archive  (zip)
//! input ──▶ locate ──▶ fetch ───┤
//! (page)   (assets)   (bytes)   └─▶ assemble (pdf, via layout)
//!                        │
//!                        └─ on network failure: render ──▶ encode
//! ```
//!
//! 1. [`input`]    — resolve a path or URL to a [`input::PageDocument`]
//! 2. [`title`]    — logical title and sanitised artifact name
//! 3. [`locate`]   — matcher strategies, best-source choice, dedup, filters
//! 4. [`fetch`]    — network retrieval with the re-encoding fallback
//! 5. [`render`]   — off-screen surface for the fallback; decodes in
//!    `spawn_blocking`
//! 6. [`encode`]   — surface pixels back to JPEG or PNG bytes
//! 7. [`archive`]  — one zip entry per asset, ordinal order
//! 8. [`layout`]   — fit-and-centre placement on a fixed page
//! 9. [`assemble`] — one PDF page per placed asset

pub mod archive;
pub mod assemble;
pub mod encode;
pub mod fetch;
pub mod input;
pub mod layout;
pub mod locate;
pub mod render;
pub mod title;
