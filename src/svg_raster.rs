use crate::error::{HeroshotError, HeroshotResult};

// Compositions are bounded by canvas size, but an SVG logo scaled to a huge
// rect could still ask for a pathological allocation.
const MAX_DIM: u32 = 16_384;

/// Rasterize an SVG tree to premultiplied RGBA8 at exactly `width`×`height`.
///
/// The tree's aspect ratio is the caller's concern; the compositor computes a
/// fit-within rect before calling this, so rasterizing at the target size
/// keeps vector logos crisp instead of upscaling a small raster.
pub fn rasterize_svg_to_premul_rgba8(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> HeroshotResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(HeroshotError::render("svg raster size must be > 0"));
    }
    if width > MAX_DIM || height > MAX_DIM {
        return Err(HeroshotError::render(format!(
            "svg raster size too large: {width}x{height} (max {MAX_DIM}x{MAX_DIM})"
        )));
    }

    let size = tree.size();
    if !(size.width() > 0.0 && size.height() > 0.0) {
        return Err(HeroshotError::render("svg has invalid width/height"));
    }

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| HeroshotError::render("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / size.width();
    let sy = (height as f32) / size.height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.data().to_vec())
}
