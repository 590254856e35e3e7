//! Hero-image composition engine.
//!
//! A [`Composition`] is a fixed-size canvas plus a z-ordered stack of typed
//! layers (background, central object, text overlay, logo) and publication
//! metadata. The crate renders compositions to premultiplied RGBA8 on the
//! CPU, keeps a linear undo history with crash recovery, checks compositions
//! against an accessibility/SEO rule engine with auto-fixes, and exports to
//! AVIF, WebP, JPEG, and PNG with IPTC/EXIF metadata embedded where the
//! container supports it.
//!
//! ```no_run
//! use heroshot::{
//!     AssetCache, Compositor, Composition, ExportFormat, FsFetcher, pipeline,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let json = std::fs::read_to_string("composition.json")?;
//! let comp: Composition = serde_json::from_str(&json)?;
//!
//! let mut compositor = Compositor::new();
//! let mut assets = AssetCache::new(Box::new(FsFetcher));
//! let out = pipeline::export(&comp, &mut compositor, &mut assets, ExportFormat::Webp, None)?;
//! std::fs::write(&out.file_name, &out.bytes)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod assets;
pub mod color;
pub mod edit;
pub mod error;
pub mod export;
pub mod history;
pub mod jpeg_meta;
pub mod metadata;
pub mod model;
pub mod pipeline;
pub mod presets;
pub mod render;
pub mod session;
pub mod store;
pub mod svg_raster;
pub mod text;
pub mod validate;

pub use assets::{AssetCache, FsFetcher, ImageFetcher, MemoryFetcher};
pub use color::Color;
pub use error::{HeroshotError, HeroshotResult};
pub use export::ExportFormat;
pub use history::History;
pub use metadata::{BusinessProfile, Metadata};
pub use model::{
    Canvas, Composition, HeroContext, Layer, LayerKind, LayerRect,
};
pub use pipeline::ExportOutput;
pub use render::{Compositor, Frame};
pub use session::EditSession;
pub use store::{FsRecoveryStore, MemoryRecoveryStore, RecoveryStore};
pub use validate::{FixContext, ValidationReport};
