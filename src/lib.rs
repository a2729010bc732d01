//! # imprint
//!
//! Stamp text, logos and county maps onto a template image, one at a time or
//! in batches packaged as a ZIP.
//!
//! ## Pipeline Overview
//!
//! ```text
//! template + overlay + text
//!  │
//!  ├─ 1. Input      load template, font and named overlays (PNG/JPEG)
//!  ├─ 2. Transform  color key → trim transparent border → fit into box
//!  ├─ 3. Composite  alpha-blend the overlay, centered in its box
//!  ├─ 4. Text       draw multi-line text with alignment and spacing
//!  ├─ 5. Encode     PNG bytes (or a data URI)
//!  └─ 6. Archive    one ZIP entry per batch line or county
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imprint::{generate_batch_to_file, Assets, ComposeConfig};
//! use std::path::{Path, PathBuf};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let assets = Assets::load(
//!         Path::new("template.png"),
//!         Some(Path::new("DejaVuSans.ttf")),
//!         &[PathBuf::from("logo.png")],
//!     )?;
//!     let lines = "acme | Acme Corp | Springfield | logo.png\nzen | Zen Ltd";
//!     let output = generate_batch_to_file(lines, &assets, "images.zip", &ComposeConfig::default()).await?;
//!     eprintln!("{} images, {} skipped", output.stats.generated, output.stats.skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `imprint` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! imprint = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod compose;
pub mod config;
pub mod county;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    generate_batch, generate_batch_sync, generate_batch_to_file, parse_batch, parse_batch_line,
    write_individual, BatchEntry,
};
pub use compose::{
    compose, generate, generate_png, generate_to_file, generate_to_file_sync, write_png,
};
pub use config::{
    ColorKey, ComposeConfig, ComposeConfigBuilder, CountyConfig, CountyFields, HexColor,
    MapStyle, OverlayPlacement, TextAlign, TextStyle,
};
pub use county::{
    generate_county_batch, generate_county_batch_sync, generate_county_batch_to_file,
    inspect_shapefile, County, StateSummary,
};
pub use error::{ImprintError, LineError};
pub use output::{BatchImage, BatchOutput, BatchStats, GeneratedImage, WhitespaceReport};
pub use pipeline::input::{Assets, OverlaySet};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
