//! Pipeline stages for image generation.
//!
//! Each submodule implements exactly one step. Keeping stages separate makes
//! each independently testable.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ transform ──▶ text ──▶ encode ──▶ archive
//! (files)   (overlay prep) (draw)   (PNG)      (ZIP)
//! ```
//!
//! 1. [`input`]     — load template, font and overlays as RGBA8
//! 2. [`transform`] — color-key, trim, fit and center overlays
//! 3. [`text`]      — draw the multi-line text block
//! 4. [`encode`]    — PNG-encode the composed canvas
//! 5. [`archive`]   — package batch output into a ZIP

pub mod archive;
pub mod encode;
pub mod input;
pub mod text;
pub mod transform;
