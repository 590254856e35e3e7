use std::{collections::HashMap, sync::Arc};

use anyhow::Context as _;

use crate::error::{HeroshotError, HeroshotResult};

/// Decoded raster image, premultiplied once at decode time.
#[derive(Clone)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl std::fmt::Debug for PreparedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.rgba8_premul.len())
            .finish()
    }
}

/// A resolved image source: raster pixels or a parsed SVG tree (logos are
/// commonly SVG, rasterized at draw size to avoid blurry upscaling).
#[derive(Clone, Debug)]
pub enum PreparedSource {
    Raster(PreparedImage),
    Svg(Arc<usvg::Tree>),
}

/// Seam for obtaining source bytes. Network fetching is the caller's
/// concern; the engine ships filesystem and in-memory implementations.
pub trait ImageFetcher {
    fn fetch(&mut self, url: &str) -> HeroshotResult<Vec<u8>>;
}

/// Treats the URL as a filesystem path.
#[derive(Default)]
pub struct FsFetcher;

impl ImageFetcher for FsFetcher {
    fn fetch(&mut self, url: &str) -> HeroshotResult<Vec<u8>> {
        std::fs::read(url)
            .with_context(|| format!("read image source {url}"))
            .map_err(HeroshotError::from)
    }
}

/// Preloaded byte map, used in tests and for data-URL-style callers.
#[derive(Default)]
pub struct MemoryFetcher {
    sources: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.sources.insert(url.into(), bytes);
    }
}

impl ImageFetcher for MemoryFetcher {
    fn fetch(&mut self, url: &str) -> HeroshotResult<Vec<u8>> {
        self.sources
            .get(url)
            .cloned()
            .ok_or_else(|| HeroshotError::render(format!("no source registered for {url}")))
    }
}

/// Decode-and-cache layer image sources, keyed by URL.
///
/// Also tracks a per-layer generation counter so a fetch superseded by a
/// newer edit to the same layer discards its stale result when it resolves
/// (last-write-wins per layer).
pub struct AssetCache {
    fetcher: Box<dyn ImageFetcher>,
    sources: HashMap<String, PreparedSource>,
    generations: HashMap<String, u64>,
}

impl AssetCache {
    pub fn new(fetcher: Box<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            sources: HashMap::new(),
            generations: HashMap::new(),
        }
    }

    /// Fetch + decode + cache. Errors here are resource errors: the renderer
    /// skips the layer rather than aborting the composite.
    pub fn get_or_load(&mut self, url: &str) -> HeroshotResult<PreparedSource> {
        if let Some(prepared) = self.sources.get(url) {
            return Ok(prepared.clone());
        }
        let bytes = self.fetcher.fetch(url)?;
        let prepared = decode_source(&bytes)?;
        self.sources.insert(url.to_string(), prepared.clone());
        Ok(prepared)
    }

    /// Start a load for a layer, superseding any outstanding one.
    pub fn begin_load(&mut self, layer_id: &str) -> u64 {
        let generation = self.generations.entry(layer_id.to_string()).or_insert(0);
        *generation += 1;
        *generation
    }

    /// Complete a load started with [`begin_load`](Self::begin_load). Returns
    /// `false` (and caches nothing) when a newer load superseded this one.
    pub fn complete_load(
        &mut self,
        layer_id: &str,
        generation: u64,
        url: &str,
        bytes: &[u8],
    ) -> HeroshotResult<bool> {
        let current = self.generations.get(layer_id).copied().unwrap_or(0);
        if generation != current {
            tracing::warn!(
                layer = layer_id,
                stale = generation,
                current,
                "discarding stale image load"
            );
            return Ok(false);
        }
        let prepared = decode_source(bytes)?;
        self.sources.insert(url.to_string(), prepared);
        Ok(true)
    }

    /// Drop a cached source (e.g. after the layer now points elsewhere).
    pub fn evict(&mut self, url: &str) {
        self.sources.remove(url);
    }
}

/// Sniff SVG vs raster and decode accordingly.
pub fn decode_source(bytes: &[u8]) -> HeroshotResult<PreparedSource> {
    if looks_like_svg(bytes) {
        let opts = usvg::Options::default();
        let tree = usvg::Tree::from_data(bytes, &opts).context("parse svg tree")?;
        return Ok(PreparedSource::Svg(Arc::new(tree)));
    }
    decode_image(bytes).map(PreparedSource::Raster)
}

pub fn decode_image(bytes: &[u8]) -> HeroshotResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(256)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    trimmed.starts_with("<svg") || trimmed.starts_with("<?xml")
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}
